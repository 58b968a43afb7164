use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;

use flux_embed::engine::ValueKind;
use flux_embed::{BridgeError, DynValue, ErrorKind, Func, Interpreter};

fn escalated<T>(f: impl FnOnce() -> T) -> BridgeError {
    let payload = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("expected the call to escalate"),
        Err(payload) => payload,
    };
    match payload.downcast::<BridgeError>() {
        Ok(err) => *err,
        Err(_) => panic!("panic payload was not a BridgeError"),
    }
}

#[test]
fn syntax_errors_come_back_from_eval() {
    let interp = Interpreter::new();
    let err = interp.run("1 = 2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    insta::assert_snapshot!(err.to_string().trim_end(), @r"
    syntax error at flux-embed.eval line 1, column 3: cannot assign to 1
    1 | 1 = 2
      |   ^
    Hint: Only names, indexes and members can be assigned.
    ");
}

#[test]
fn runtime_errors_come_back_from_eval() {
    let interp = Interpreter::new();
    let err = interp.bind::<i64>("let x = 1;\nmissing(x)").unwrap_err();
    assert!(err.is_recoverable());
    assert!(err.to_string().contains("line 2"), "{}", err);
}

#[test]
fn exception_goes_to_the_error_slot() {
    let interp = Interpreter::new();
    let f: Func<(), Result<(), BridgeError>> = interp.bind(r#"fun() { die("tippy\n") }"#).unwrap();
    let err = f.call(()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    assert_eq!(err.to_string(), "tippy\n");

    let g: Func<(), Result<i64, BridgeError>> = interp.bind("fun() { die(\"oops\") }").unwrap();
    assert_eq!(
        g.call(()).unwrap_err().to_string(),
        "oops at flux-embed.eval line 1.\n"
    );
}

#[test]
fn exception_without_a_slot_escalates() {
    let interp = Interpreter::new();
    let f: Func<(), i64> = interp.bind(r#"fun() { die("tippy\n") }"#).unwrap();
    let err = escalated(|| f.call(()));
    assert_eq!(err.to_string(), "tippy\n");

    // The interpreter is still usable afterwards.
    assert_eq!(interp.bind::<i64>("1 + 1").unwrap(), 2);
}

#[test]
fn raised_values_keep_their_shape() {
    let interp = Interpreter::new();
    let f: Func<(), Result<i64, BridgeError>> = interp.bind(r#"fun() { die({"code": 7}) }"#).unwrap();
    let err = f.call(()).unwrap_err();
    let dyn_err = err.as_dynamic().unwrap();
    let value: &DynValue = dyn_err.value().unwrap();
    assert_eq!(value.kind(), ValueKind::Mapping);
    assert_eq!(value.as_string(), r#"{"code": 7}"#);
}

#[test]
fn exceptions_pass_through_host_code_unchanged() {
    let interp = Interpreter::new();
    let inner: Func<(), i64> = interp.bind(r#"fun() { die({"code": 7}) }"#).unwrap();
    let relay = Func::<(), i64>::from_fn(move || inner.call(()));
    let outer: Func<(Func<(), i64>,), Result<i64, BridgeError>> =
        interp.bind("fun(f) { f() + 1 }").unwrap();

    let err = outer.call((relay,)).unwrap_err();
    let value = err.as_dynamic().and_then(|e| e.value()).unwrap();
    assert_eq!(value.kind(), ValueKind::Mapping);
    assert_eq!(err.to_string(), r#"{"code": 7}"#);
}

#[test]
fn conversion_failures_are_recoverable() {
    let interp = Interpreter::new();
    let f: Func<(), Result<i64, BridgeError>> = interp.bind("fun() { [1] }").unwrap();
    let err = f.call(()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConversion);
    assert!(err.is_recoverable());
}

#[test]
fn unsupported_types_always_escalate() {
    let interp = Interpreter::new();
    let err = escalated(|| interp.bind::<*const u8>("1"));
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    assert!(!err.is_recoverable());
    assert_eq!(interp.bind::<i64>("1 + 1").unwrap(), 2);

    let f: Func<(mpsc::Sender<i32>,), Result<i64, BridgeError>> =
        interp.bind("fun(ch) { 1 }").unwrap();
    let (tx, _rx) = mpsc::channel();
    let err = escalated(|| f.call((tx,)));
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
}

#[test]
fn misshapen_functions_escalate_from_eval() {
    let interp = Interpreter::new();
    interp.run("let kept = nil;").unwrap();
    let keep: Func<(Func<(i64,), i64>,), ()> = interp.bind("fun(f) { kept = f; }").unwrap();
    keep.call((Func::from_fn(|x: i64| x + 1),));

    let err = escalated(|| interp.bind::<Func<(i64, i64), i64>>("kept"));
    assert_eq!(err.kind(), ErrorKind::ArityMismatch);

    let same: Func<(i64,), i64> = interp.bind("kept").unwrap();
    assert_eq!(same.call((1,)), 2);
}

#[test]
fn host_panics_keep_unwinding() {
    let interp = Interpreter::new();
    let boom = Func::<(), i64>::from_fn(|| -> i64 { panic!("host bug") });
    let call: Func<(Func<(), i64>,), Result<i64, BridgeError>> = interp.bind("fun(f) { f() }").unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| call.call((boom,))));
    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"host bug"));

    assert_eq!(interp.bind::<i64>("2 * 21").unwrap(), 42);
}

#[test]
fn call_depth_is_limited() {
    let interp = Interpreter::new();
    let err = interp
        .bind::<i64>("let down = fun(n) { down(n + 1) }; down(0)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    assert!(err.to_string().contains("deep recursion limit exceeded"), "{}", err);
}
