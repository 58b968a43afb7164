use flux_embed::{BridgeError, ErrorKind, Func, Interpreter};

const XGCD: &str = r#"
fun(u, v) {
    let s = 0; let old_s = 1;
    let t = 1; let old_t = 0;
    let r = v; let old_r = u;
    let tmp = 0;
    while r != 0 {
        let q = int(old_r / r);
        tmp = r; r = old_r - q * r; old_r = tmp;
        tmp = s; s = old_s - q * s; old_s = tmp;
        tmp = t; t = old_t - q * t; old_t = tmp;
    }
    if old_s > 0 {
        return (old_s, u, 0 - old_t, v, old_r);
    }
    (0 - old_s, u, old_t, v, old_r)
}
"#;

#[test]
fn dynamic_function_called_from_host() {
    let interp = Interpreter::new();
    let add: Func<(i64,), i64> = interp.bind("fun(x) { x + 54321 }").unwrap();
    assert!(add.is_dynamic());
    assert_eq!(add.call((18,)), 54339);
    assert_eq!(add.call((-54321,)), 0);
}

#[test]
fn host_function_called_from_engine() {
    let interp = Interpreter::new();
    let add = Func::<(i64,), i64>::from_fn(|x: i64| x + 54321);
    assert!(!add.is_dynamic());

    let apply: Func<(Func<(i64,), i64>, i64), i64> = interp.bind("fun(f, x) { f(x) }").unwrap();
    assert_eq!(apply.call((add.clone(), 18)), 54339);
    assert_eq!(interp.stats().registry_entries, 0);
}

#[test]
fn several_inputs_and_outputs() {
    let interp = Interpreter::new();
    let xgcd: Func<(i64, i64), (i64, i64, i64, i64, i64)> = interp.bind(XGCD).unwrap();
    assert_eq!(xgcd.call((12345, 54321)), (3617, 12345, 822, 54321, 3));
}

#[test]
fn no_inputs_no_outputs() {
    let interp = Interpreter::new();
    let touch: Func<(), ()> = interp.bind("fun() { let x = 1; }").unwrap();
    touch.call(());

    let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = seen.clone();
    let tick = Func::<(), ()>::from_fn(move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    let thrice: Func<(Func<(), ()>,), ()> = interp.bind("fun(f) { f(); f(); f(); }").unwrap();
    thrice.call((tick,));
    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[test]
fn host_function_returns_several_values() {
    let interp = Interpreter::new();
    let divmod = Func::<(i64, i64), (i64, i64)>::from_fn(|a: i64, b: i64| (a / b, a % b));
    let use_divmod: Func<(Func<(i64, i64), (i64, i64)>,), String> =
        interp.bind(r#"fun(f) { let qr = [f(17, 5)]; str(qr[0]) + "r" + str(qr[1]) }"#).unwrap();
    assert_eq!(use_divmod.call((divmod,)), "3r2");
}

#[test]
fn host_function_comes_back_as_itself() {
    let interp = Interpreter::new();
    let double = Func::<(i64,), i64>::from_fn(|x: i64| x * 2);
    let identity: Func<(Func<(i64,), i64>,), Func<(i64,), i64>> =
        interp.bind("fun(f) { f }").unwrap();

    let back = identity.call((double.clone(),));
    assert!(back.ptr_eq(&double));
    assert!(!back.is_dynamic());
    assert_eq!(back.call((21,)), 42);
}

#[test]
fn dynamic_function_round_trips() {
    let interp = Interpreter::new();
    let make_adder: Func<(i64,), Func<(i64,), i64>> =
        interp.bind("fun(n) { fun(x) { x + n } }").unwrap();
    let add5 = make_adder.call((5,));
    assert!(add5.is_dynamic());
    assert_eq!(add5.call((1,)), 6);

    let twice: Func<(Func<(i64,), i64>, i64), i64> =
        interp.bind("fun(f, x) { f(f(x)) }").unwrap();
    assert_eq!(twice.call((add5, 1)), 11);
}

#[test]
fn host_and_engine_functions_nest() {
    let interp = Interpreter::new();
    let square: Func<(i64,), i64> = interp.bind("fun(x) { x * x }").unwrap();
    let sum_squares = Func::<(i64, i64), i64>::from_fn(move |a: i64, b: i64| {
        square.call((a,)) + square.call((b,))
    });
    let caller: Func<(Func<(i64, i64), i64>,), i64> =
        interp.bind("fun(f) { f(3, 4) + 1 }").unwrap();
    assert_eq!(caller.call((sum_squares,)), 26);
}

#[test]
fn host_closure_errors_become_engine_exceptions() {
    let interp = Interpreter::new();
    let checked = Func::<(i64,), Result<i64, BridgeError>>::from_fn(|x: i64| {
        if x < 0 {
            Err(BridgeError::invalid("natural number", x))
        } else {
            Ok(x)
        }
    });
    let apply: Func<(Func<(i64,), Result<i64, BridgeError>>, i64), Result<i64, BridgeError>> =
        interp.bind("fun(f, x) { f(x) }").unwrap();

    assert_eq!(apply.call((checked.clone(), 4)).unwrap(), 4);
    let err = apply.call((checked, -1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    assert_eq!(
        err.to_string(),
        "cannot convert -1 to natural number at flux-embed.eval line 1.\n"
    );
}

#[test]
fn retyping_a_host_closure_checks_its_shape() {
    let interp = Interpreter::new();
    let one = Func::<(i64,), i64>::from_fn(|x: i64| x);
    let launder: Func<(Func<(i64,), i64>,), Result<Func<(i64, i64), i64>, BridgeError>> =
        interp.bind("fun(f) { f }").unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| launder.call((one,))));
    let payload = outcome.unwrap_err();
    let err = payload.downcast::<BridgeError>().unwrap();
    assert_eq!(err.kind(), ErrorKind::ArityMismatch);
}

#[test]
fn functions_are_not_other_values() {
    let interp = Interpreter::new();
    let err = interp.bind::<Func<(), i64>>("42").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConversion);
}
