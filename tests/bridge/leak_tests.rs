//! Repeated crossings must not grow the number of live engine values.

use std::collections::HashMap;

use flux_embed::{Func, Interpreter, Reflect, reflect_struct};
use num_complex::Complex;

const ROUNDS: usize = 256;

#[derive(Debug, Default, Clone, PartialEq)]
struct Pair {
    i: i64,
    f: f64,
}

reflect_struct!(Pair { i: i64, f: f64 });

/// Sends `value` in and pulls `literal` out `ROUNDS` times each, checking
/// that the live count stays flat.
fn check<T: Reflect + Clone>(value: T, literal: &str) {
    let interp = Interpreter::new();
    let (sink, source): (Func<(T,), ()>, Func<(), T>) = interp
        .eval(&format!("(fun(x) {{ }}, fun() {{ {} }})", literal))
        .unwrap();

    // Lazily bound helpers are not leaks.
    source.call(());
    sink.call((value.clone(),));

    let before = interp.live();
    for _ in 0..ROUNDS {
        source.call(());
    }
    let after_out = interp.live();
    assert!(
        after_out.saturating_sub(before) < ROUNDS,
        "{}: grew from {} to {} pulling values out",
        literal,
        before,
        after_out
    );

    for _ in 0..ROUNDS {
        sink.call((value.clone(),));
    }
    let after_in = interp.live();
    assert!(
        after_in.saturating_sub(after_out) < ROUNDS,
        "{}: grew from {} to {} pushing values in",
        literal,
        after_out,
        after_in
    );
    assert_eq!(interp.stats().registry_entries, 0);
}

#[test]
fn bools() {
    check(true, "1");
}

#[test]
fn ints() {
    check(12i64, "21");
    check(12u64, "21");
}

#[test]
fn floats() {
    check(1.5f64, "2.5");
}

#[test]
fn complex_numbers() {
    check(Complex::new(0.0, 12.2), "complex(0, 21.1)");
}

#[test]
fn strings() {
    check("uuu".to_string(), "\"vvv\"");
}

#[test]
fn sequences() {
    check(vec![17i64, 18], "[19, 20]");
}

#[test]
fn mappings() {
    check(HashMap::from([(37i64, 17i64)]), "{38: 18}");
}

#[test]
fn structs() {
    check(Pair { i: 2, f: 3.4 }, r#"{"i": 5, "f": 6.8}"#);
}

#[test]
fn functions() {
    check(Func::<(i64,), i64>::from_fn(|x: i64| x + 1), "fun(x) { x }");
}

#[test]
fn struct_proxies_used_by_the_engine() {
    let interp = Interpreter::new();
    let touch: Func<(Pair,), f64> = interp.bind("fun(p) { p.i = p.i + 1; p.i * p.f }").unwrap();
    touch.call((Pair::default(),));

    let before = interp.live();
    for i in 0..ROUNDS {
        let p = Pair { i: i as i64, f: 0.5 };
        assert_eq!(touch.call((p,)), (i as f64 + 1.0) * 0.5);
    }
    assert_eq!(interp.live(), before);
    assert_eq!(interp.stats().registry_entries, 0);
}
