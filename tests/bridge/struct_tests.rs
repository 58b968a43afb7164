use flux_embed::engine::ValueKind;
use flux_embed::{BridgeError, DynValue, ErrorKind, Func, Interpreter, reflect_struct};

#[derive(Debug, Default, Clone, PartialEq)]
struct Sample {
    count: i64,
    ratio: f64,
}

reflect_struct!(Sample { count: i64, ratio: f64 });

#[derive(Debug, Default, Clone, PartialEq)]
struct Counter {
    label: String,
    total: i64,
}

impl Counter {
    fn bump(&mut self, by: i64) -> i64 {
        self.total += by;
        self.total
    }

    fn describe(&mut self) -> String {
        format!("{}={}", self.label, self.total)
    }
}

reflect_struct!(Counter { label: String, total: i64 } methods {
    bump => Counter::bump,
    describe => Counter::describe,
});

#[test]
fn structs_round_trip() {
    let interp = Interpreter::new();
    let identity: Func<(Sample,), Sample> = interp.bind("fun(s) { s }").unwrap();
    for sample in [Sample::default(), Sample { count: 2, ratio: 3.4 }] {
        assert_eq!(identity.call((sample.clone(),)), sample);
    }
    assert_eq!(interp.stats().registry_entries, 0);
}

#[test]
fn plain_hashes_convert_field_by_field() {
    let interp = Interpreter::new();
    let sample: Sample = interp
        .bind(r#"{"count": 5, "ratio": 6.8, "other": 1}"#)
        .unwrap();
    assert_eq!(sample, Sample { count: 5, ratio: 6.8 });

    let partial: Sample = interp.bind(r#"{"count": 1}"#).unwrap();
    assert_eq!(partial, Sample { count: 1, ratio: 0.0 });

    let err = interp.bind::<Sample>(r#"{"count": [1]}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConversion);
    assert!(interp.bind::<Sample>("[1, 2]").is_err());
}

#[test]
fn engine_reads_fields() {
    let interp = Interpreter::new();
    let product: Func<(Sample,), f64> = interp.bind("fun(s) { s.count * s.ratio }").unwrap();
    assert_eq!(product.call((Sample { count: 2, ratio: 3.4 },)), 6.8);

    let keys: Func<(Sample,), Vec<String>> = interp.bind("fun(s) { keys(s) }").unwrap();
    let mut names = keys.call((Sample::default(),));
    names.sort();
    assert_eq!(names, vec!["count", "ratio"]);
}

#[test]
fn engine_writes_fields() {
    let interp = Interpreter::new();
    let grow: Func<(Sample,), Sample> = interp
        .bind("fun(s) { s.count = s.count + 1; s[\"ratio\"] = 0.5; s }")
        .unwrap();
    assert_eq!(
        grow.call((Sample { count: 41, ratio: 9.0 },)),
        Sample { count: 42, ratio: 0.5 }
    );
}

#[test]
fn field_writes_are_converted() {
    let interp = Interpreter::new();
    let spoil: Func<(Sample,), Result<Sample, BridgeError>> =
        interp.bind("fun(s) { s.count = [1]; s }").unwrap();
    let err = spoil.call((Sample::default(),)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    assert!(err.to_string().starts_with("cannot convert array to i64"), "{}", err);
}

#[test]
fn unknown_fields_are_rejected() {
    let interp = Interpreter::new();
    let read: Func<(Sample,), Result<i64, BridgeError>> = interp.bind("fun(s) { s.nope }").unwrap();
    let err = read.call((Sample::default(),)).unwrap_err();
    assert!(
        err.to_string()
            .starts_with("Attempt to access disallowed key 'nope' in a restricted hash"),
        "{}",
        err
    );

    let write: Func<(Sample,), Result<(), BridgeError>> =
        interp.bind("fun(s) { s.nope = 1; }").unwrap();
    assert!(write.call((Sample::default(),)).is_err());
}

#[test]
fn engine_calls_methods() {
    let interp = Interpreter::new();
    let run: Func<(Counter,), (i64, String, Counter)> = interp
        .bind("fun(c) { let n = c.bump(5); c.bump(2); (n, c.describe(), c) }")
        .unwrap();
    let counter = Counter { label: "hits".to_string(), total: 10 };

    let (first, text, after) = run.call((counter,));
    assert_eq!(first, 15);
    assert_eq!(text, "hits=17");
    assert_eq!(after, Counter { label: "hits".to_string(), total: 17 });
}

#[test]
fn unknown_methods_raise() {
    let interp = Interpreter::new();
    let run: Func<(Counter,), Result<i64, BridgeError>> = interp.bind("fun(c) { c.reset() }").unwrap();
    let err = run.call((Counter::default(),)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DynamicException);
    assert!(err.to_string().contains("reset"), "{}", err);
}

#[test]
fn proxies_are_objects() {
    let interp = Interpreter::new();
    let wrap: Func<(Sample,), DynValue> = interp.bind("fun(s) { s }").unwrap();
    let proxy = wrap.call((Sample::default(),));
    assert_eq!(proxy.kind(), ValueKind::Object);
    assert_eq!(interp.stats().registry_entries, 1);

    drop(proxy);
    assert_eq!(interp.stats().registry_entries, 0);
}

#[test]
fn structs_do_not_convert_into_other_structs() {
    let interp = Interpreter::new();
    let pass: Func<(Counter,), Result<Sample, BridgeError>> = interp.bind("fun(c) { c }").unwrap();
    let err = pass.call((Counter::default(),)).unwrap_err();
    assert_eq!(err.to_string(), "cannot convert Counter to Sample");
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Ledger {
    balance: i64,
}

impl Ledger {
    fn deposit(&mut self, amount: i64) -> i64 {
        let before = self.balance;
        std::thread::sleep(std::time::Duration::from_millis(20));
        self.balance = before + amount;
        self.balance
    }
}

reflect_struct!(Ledger { balance: i64 } methods { deposit => Ledger::deposit });

#[test]
fn concurrent_method_calls_on_one_proxy_keep_every_update() {
    let interp = Interpreter::new();
    interp.run("let ledger = nil;").unwrap();
    let store: Func<(Ledger,), ()> = interp.bind("fun(l) { ledger = l; }").unwrap();
    store.call((Ledger::default(),));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let interp = interp.clone();
            std::thread::spawn(move || {
                for _ in 0..3 {
                    interp.run("ledger.deposit(5);").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    interp.run(r#"ledger["balance"] = ledger.balance + 1;"#).unwrap();
    assert_eq!(interp.bind::<Ledger>("ledger").unwrap(), Ledger { balance: 61 });
}
