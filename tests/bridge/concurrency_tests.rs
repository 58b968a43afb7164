use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use flux_embed::{Func, Interpreter};
use num_complex::Complex;
use rayon::prelude::*;

#[test]
fn threads_share_one_interpreter() {
    let interp = Interpreter::new();
    let handles: Vec<_> = (0..4i64)
        .map(|t| {
            let interp = interp.clone();
            thread::spawn(move || {
                for i in 0..50i64 {
                    let n = t * 1000 + i;
                    let (a, b): (i64, i64) = interp.eval(&format!("({}, {} * 2)", n, n)).unwrap();
                    assert_eq!((a, b), (n, n * 2));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn whole_evaluations_do_not_interleave() {
    let interp = Interpreter::new();
    interp.run("let total = 0;").unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let interp = interp.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    interp
                        .run("let before = total; total = before + 1; total = before + 2;")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(interp.bind::<i64>("total").unwrap(), 200);
}

#[test]
fn functions_are_callable_from_a_thread_pool() {
    let interp = Interpreter::new();
    let square: Func<(i64,), i64> = interp.bind("fun(x) { x * x }").unwrap();
    let sum: i64 = (0..200i64).into_par_iter().map(|i| square.call((i,))).sum();
    assert_eq!(sum, (0..200i64).map(|i| i * i).sum::<i64>());
}

#[test]
fn host_functions_run_on_pool_threads() {
    let interp = Interpreter::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let inc = Func::<(i64,), i64>::from_fn(move |x: i64| {
        seen.fetch_add(1, Ordering::SeqCst);
        x + 1
    });
    let apply: Func<(Func<(i64,), i64>, i64), i64> = interp.bind("fun(f, x) { f(x) * 10 }").unwrap();

    let results: Vec<i64> = (0..64i64)
        .into_par_iter()
        .map(|i| apply.call((inc.clone(), i)))
        .collect();
    assert_eq!(results, (0..64i64).map(|i| (i + 1) * 10).collect::<Vec<_>>());
    assert_eq!(calls.load(Ordering::SeqCst), 64);
    assert_eq!(interp.stats().registry_entries, 0);
}

#[test]
fn host_code_may_use_the_engine_from_another_thread() {
    let interp = Interpreter::new();
    let other = interp.clone();
    let cross = Func::<(i64,), i64>::from_fn(move |x: i64| {
        let interp = other.clone();
        thread::spawn(move || interp.bind::<i64>(&format!("{} * 10", x)).unwrap())
            .join()
            .unwrap()
    });
    let apply: Func<(Func<(i64,), i64>, i64), i64> = interp.bind("fun(f, x) { f(x) + 1 }").unwrap();
    assert_eq!(apply.call((cross, 4)), 41);
}

#[test]
fn host_code_may_reenter_on_the_same_thread() {
    let interp = Interpreter::new();
    let inner = interp.clone();
    let nested = Func::<(i64,), i64>::from_fn(move |x: i64| inner.bind::<i64>(&format!("{} + 100", x)).unwrap());
    let apply: Func<(Func<(i64,), i64>, i64), i64> = interp.bind("fun(f, x) { f(f(x)) }").unwrap();
    assert_eq!(apply.call((nested, 1)), 201);
}

#[test]
fn handles_drop_on_other_threads() {
    let interp = Interpreter::new();
    let before = interp.live();
    let values: Vec<flux_embed::DynValue> = (0..32)
        .map(|i| interp.bind(&format!("[{}]", i)).unwrap())
        .collect();
    assert!(interp.live() > before);

    values.into_par_iter().for_each(drop);
    assert_eq!(interp.live(), before);
}

#[test]
fn complex_helpers_bind_while_other_threads_convert_sequences() {
    for _ in 0..20 {
        let interp = Interpreter::new();
        let barrier = Arc::new(std::sync::Barrier::new(2));

        let single = {
            let interp = interp.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                interp.bind::<Complex<f64>>("complex(1, 2)").unwrap()
            })
        };
        let many = {
            let interp = interp.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                interp
                    .bind::<Vec<Complex<f64>>>("[complex(3, 4), complex(5, 6)]")
                    .unwrap()
            })
        };

        assert_eq!(single.join().unwrap(), Complex::new(1.0, 2.0));
        assert_eq!(
            many.join().unwrap(),
            vec![Complex::new(3.0, 4.0), Complex::new(5.0, 6.0)]
        );
        assert_eq!(interp.stats().complex_helper_binds, 1);
    }
}
