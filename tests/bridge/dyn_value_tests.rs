use flux_embed::engine::ValueKind;
use flux_embed::{DynValue, ErrorKind, Func, Interpreter};

#[test]
fn scalar_accessors() {
    let interp = Interpreter::new();
    let v: DynValue = interp.bind("\"42\"").unwrap();
    assert_eq!(v.kind(), ValueKind::String);
    assert_eq!(v.as_int(), 42);
    assert_eq!(v.as_uint(), 42);
    assert_eq!(v.as_float(), 42.0);
    assert!(v.as_bool());
    assert_eq!(v.as_string(), "42");

    let f: DynValue = interp.bind("2.5").unwrap();
    assert_eq!(f.kind(), ValueKind::Float);
    assert_eq!(f.as_int(), 2);
    assert_eq!(f.as_string(), "2.5");
}

#[test]
fn containers_display_like_the_engine() {
    let interp = Interpreter::new();
    let list: DynValue = interp.bind("[1, 2, 3]").unwrap();
    assert_eq!(list.kind(), ValueKind::Sequence);
    assert_eq!(list.as_string(), "[1, 2, 3]");

    let hash: DynValue = interp.bind(r#"{"b": 2, "a": 1}"#).unwrap();
    assert_eq!(hash.kind(), ValueKind::Mapping);
    assert_eq!(hash.as_string(), r#"{"a": 1, "b": 2}"#);
}

#[test]
fn undef_and_errors() {
    let interp = Interpreter::new();
    let nothing: DynValue = interp.bind("nil").unwrap();
    assert!(nothing.is_undef());
    assert!(nothing.as_error().is_none());

    let oops: DynValue = interp.bind("\"oops\"").unwrap();
    let err = oops.as_error().unwrap();
    assert_eq!(err.message(), "oops");
    assert_eq!(err.value().map(|v| v.kind()), Some(ValueKind::String));
}

#[test]
fn method_calls() {
    let interp = Interpreter::new();
    let obj: DynValue = interp
        .bind(r#"{"n": 4, "add": fun(self, x) { self.n + x }}"#)
        .unwrap();
    assert_eq!(obj.call("add", (3,)).unwrap().as_int(), 7);
    assert_eq!(obj.call("add", (1.5,)).unwrap().as_float(), 5.5);

    let err = obj.call("nope", ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    assert!(err.to_string().starts_with("Can't locate method \"nope\""), "{}", err);
}

#[test]
fn release_is_idempotent() {
    let interp = Interpreter::new();
    let before = interp.live();
    let v: DynValue = interp.bind("[1, 2]").unwrap();
    assert!(interp.live() > before);

    v.release();
    assert!(v.is_released());
    assert_eq!(interp.live(), before);

    v.release();
    drop(v);
    assert_eq!(interp.live(), before);
}

#[test]
fn clones_hold_their_own_reference() {
    let interp = Interpreter::new();
    let before = interp.live();
    let v: DynValue = interp.bind("[1, 2]").unwrap();
    let w = v.clone();

    drop(v);
    assert_eq!(w.as_string(), "[1, 2]");
    drop(w);
    assert_eq!(interp.live(), before);
}

#[test]
fn values_pass_back_into_functions() {
    let interp = Interpreter::new();
    let v: DynValue = interp.bind("[4, 5, 6]").unwrap();
    let len: Func<(DynValue,), i64> = interp.bind("fun(a) { len(a) }").unwrap();
    assert_eq!(len.call((v.clone(),)), 3);

    let push: Func<(DynValue, i64), ()> = interp.bind("fun(a, x) { push(a, x); }").unwrap();
    push.call((v.clone(), 7));
    assert_eq!(v.as_string(), "[4, 5, 6, 7]");
}

#[test]
fn released_values_cannot_cross() {
    let interp = Interpreter::new();
    let v: DynValue = interp.bind("1").unwrap();
    let w = v.clone();
    w.release();

    let id: Func<(DynValue,), Result<i64, flux_embed::BridgeError>> =
        interp.bind("fun(x) { x }").unwrap();
    let err = id.call((w,)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConversion);
    assert_eq!(v.as_int(), 1);
}

#[test]
fn values_stay_with_their_interpreter() {
    let a = Interpreter::new();
    let b = Interpreter::new();
    assert!(!a.ptr_eq(&b));
    assert!(a.ptr_eq(&a.clone()));

    let v: DynValue = a.bind("[1]").unwrap();
    let len: Func<(DynValue,), i64> = b.bind("fun(x) { len(x) }").unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| len.call((v,))));
    assert!(outcome.is_err());
}
