use std::sync::Arc;

use parking_lot::Mutex;

use flux_embed::config::InterpreterOptions;
use flux_embed::engine::{Engine, HookError, HostHooks, ProxyId, RawValue, ValueKind};
use flux_embed::script::ScriptEngine;

fn eval(engine: &ScriptEngine, code: &str) -> Result<String, String> {
    eval_n(engine, code, 1).map(|mut values| values.remove(0))
}

fn eval_n(engine: &ScriptEngine, code: &str, outputs: usize) -> Result<Vec<String>, String> {
    match engine.evaluate(code, outputs) {
        Ok(raws) => {
            let texts = raws.iter().map(|raw| engine.get_string(*raw)).collect();
            for raw in raws {
                engine.dec_ref(raw);
            }
            Ok(texts)
        }
        Err(raw) => {
            let text = engine.get_string(raw);
            engine.dec_ref(raw);
            Err(text)
        }
    }
}

#[test]
fn arithmetic_follows_dynamic_rules() {
    let engine = ScriptEngine::new();
    let cases = [
        ("1 + 2 * 3", "7"),
        ("7 / 2", "3"),
        ("7.0 / 2", "3.5"),
        ("-7 % 3", "-1"),
        ("\"a\" + 1", "a1"),
        ("\"40\" * 1 + 2", "42"),
        ("1 < 2", "1"),
        ("1 == \"1.0\"", "1"),
        ("!0", "1"),
        ("nil", ""),
    ];
    for (code, expected) in cases {
        assert_eq!(eval(&engine, code), Ok(expected.to_string()), "code: {}", code);
    }
}

#[test]
fn closures_recursion_and_args() {
    let engine = ScriptEngine::new();
    eval(
        &engine,
        "let fib = fun(n) { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } };",
    )
    .unwrap();
    assert_eq!(eval(&engine, "fib(15)"), Ok("610".to_string()));

    eval(&engine, "let count = fun() { len(args) };").unwrap();
    assert_eq!(eval(&engine, "count(1, \"two\", [3])"), Ok("3".to_string()));

    eval(&engine, "let adder = fun(n) { fun(x) { x + n } };").unwrap();
    assert_eq!(eval(&engine, "adder(10)(5)"), Ok("15".to_string()));
}

#[test]
fn while_and_assignment() {
    let engine = ScriptEngine::new();
    let code = "let i = 0; let s = 0; while i < 5 { s = s + i; i = i + 1; } s";
    assert_eq!(eval(&engine, code), Ok("10".to_string()));
    assert_eq!(
        eval(&engine, "undeclared = 1"),
        Err("assignment to undeclared variable `undeclared` at flux-embed.eval line 1.\n".to_string())
    );
}

#[test]
fn arrays_and_hashes() {
    let engine = ScriptEngine::new();
    let code = "let a = [1, 2, 3]; a[-1] = 9; a[5] = 1; push(a, 7); (len(a), a[2], a[4], a[-1])";
    assert_eq!(
        eval_n(&engine, code, 4),
        Ok(vec!["7".to_string(), "9".to_string(), String::new(), "7".to_string()])
    );

    let code = "let h = {\"b\": 2, \"a\": 1}; h.c = 3; h[\"a\"] = 10; (keys(h), h.a + h.b + h.c)";
    assert_eq!(
        eval_n(&engine, code, 2),
        Ok(vec!["[a, b, c]".to_string(), "15".to_string()])
    );
}

#[test]
fn methods_on_plain_hashes_receive_the_hash() {
    let engine = ScriptEngine::new();
    eval(
        &engine,
        "let o = {\"n\": 21, \"twice\": fun(self) { self.n * 2 }};",
    )
    .unwrap();
    assert_eq!(eval(&engine, "o.twice()"), Ok("42".to_string()));
    assert_eq!(
        eval(&engine, "o.missing()"),
        Err("Can't locate method \"missing\" at flux-embed.eval line 1.\n".to_string())
    );

    let invocant = engine.evaluate("o", 1).unwrap()[0];
    let results = engine.call_method(invocant, "twice", Vec::new(), 1).unwrap();
    assert_eq!(engine.get_int(results[0]), 42);
    engine.dec_ref(results[0]);
    engine.dec_ref(invocant);
}

#[test]
fn list_results_are_padded_with_undef() {
    let engine = ScriptEngine::new();
    assert_eq!(
        eval_n(&engine, "(1, \"two\", 3.5)", 3),
        Ok(vec!["1".to_string(), "two".to_string(), "3.5".to_string()])
    );

    let raws = engine.evaluate("1", 3).unwrap();
    assert_eq!(engine.kind(raws[0]), ValueKind::Int);
    assert_eq!(engine.kind(raws[1]), ValueKind::Undef);
    assert_eq!(engine.kind(raws[2]), ValueKind::Undef);
    for raw in raws {
        engine.dec_ref(raw);
    }
    assert!(engine.evaluate("let x = 1;", 0).unwrap().is_empty());
}

#[test]
fn complex_builtins() {
    let engine = ScriptEngine::new();
    assert_eq!(eval(&engine, "complex(1, -2)"), Ok("1-2i".to_string()));
    assert_eq!(
        eval_n(&engine, "let z = complex(1, 2) * complex(3, 4); (re(z), im(z))", 2),
        Ok(vec!["-5".to_string(), "10".to_string()])
    );
}

#[test]
fn runtime_errors_carry_location() {
    let engine = ScriptEngine::new();
    assert_eq!(
        eval(&engine, "let a = 1;\na / 0"),
        Err("Illegal division by zero at flux-embed.eval line 2.\n".to_string())
    );
    assert_eq!(
        eval(&engine, "die(\"exact\\n\")"),
        Err("exact\n".to_string())
    );
    assert_eq!(eval(&engine, "die()"), Err("Died at flux-embed.eval line 1.\n".to_string()));
    assert_eq!(
        eval(&engine, "len(1, 2)"),
        Err("wrong number of arguments to len: got=2, want=1 at flux-embed.eval line 1.\n".to_string())
    );
    assert_eq!(
        eval(&engine, "5(1)"),
        Err("Not a CODE reference (Int) at flux-embed.eval line 1.\n".to_string())
    );
}

#[test]
fn die_with_a_reference_raises_it_unchanged() {
    let engine = ScriptEngine::new();
    let err = engine.evaluate("die([1, 2])", 1).unwrap_err();
    assert_eq!(engine.kind(err), ValueKind::Sequence);
    engine.dec_ref(err);
}

#[test]
fn syntax_errors_render_the_first_diagnostic() {
    let engine = ScriptEngine::new();
    let err = eval(&engine, "let = 1;").unwrap_err();
    insta::assert_snapshot!(err.trim_end(), @r"
    syntax error at flux-embed.eval line 1, column 5: expected IDENT, got =
      unexpected token
    1 | let = 1;
      |     ^
    ");
}

#[test]
fn options_set_source_name_and_depth() {
    let options = InterpreterOptions::new()
        .with_source_name("calc.flx")
        .with_max_call_depth(32);
    let engine = ScriptEngine::with_options(&options);
    assert_eq!(eval(&engine, "die(\"x\")"), Err("x at calc.flx line 1.\n".to_string()));

    eval(&engine, "let down = fun(n) { down(n + 1) };").unwrap();
    let err = eval(&engine, "down(0)").unwrap_err();
    assert!(err.starts_with("deep recursion limit exceeded at calc.flx"), "{}", err);
    assert_eq!(eval(&engine, "1 + 1"), Ok("2".to_string()));
}

#[test]
fn walks_see_elements_and_sorted_pairs() {
    let engine = ScriptEngine::new();
    let seq = engine.evaluate("[1, \"b\", 2.5]", 1).unwrap()[0];
    let mut seen = Vec::new();
    assert!(engine.walk_sequence(seq, &mut |raw| seen.push(engine.get_string(raw))));
    assert_eq!(seen, ["1", "b", "2.5"]);
    assert!(!engine.walk_mapping(seq, &mut |_, _| {}));
    engine.dec_ref(seq);

    let map = engine.evaluate("{88: 8, 66: 12}", 1).unwrap()[0];
    let mut pairs = Vec::new();
    assert!(engine.walk_mapping(map, &mut |k, v| pairs.push((engine.get_int(k), engine.get_int(v)))));
    assert_eq!(pairs, [(66, 12), (88, 8)]);
    engine.dec_ref(map);
}

#[test]
fn calls_release_their_temporaries() {
    let engine = ScriptEngine::new();
    eval(&engine, "let wrap = fun(s) { [s, {\"s\": s}] };").unwrap();
    let wrap = engine.evaluate("wrap", 1).unwrap()[0];
    let base = engine.count_live();
    let heap = engine.live_stats();

    for i in 0..200 {
        let arg = engine.new_string(&format!("value {}", i));
        let results = engine.call(wrap, vec![arg], 1).unwrap();
        engine.dec_ref(results[0]);
    }
    assert_eq!(engine.count_live(), base);
    let after = engine.live_stats();
    assert_eq!(after.live, heap.live);
    assert!(after.allocated > heap.allocated);

    let uint = engine.new_uint(u64::MAX);
    assert_eq!(engine.get_uint(uint), u64::MAX);
    assert_eq!(engine.get_string(uint), "18446744073709551615");
    engine.dec_ref(uint);
    engine.dec_ref(wrap);
}

#[derive(Default)]
struct Recorder {
    invoked: Mutex<Vec<(ProxyId, usize)>>,
    released: Mutex<Vec<ProxyId>>,
}

impl HostHooks for Recorder {
    fn invoke(&self, id: ProxyId, args: &[RawValue], _outputs: usize) -> Result<Vec<RawValue>, HookError> {
        self.invoked.lock().push((id, args.len()));
        if id == 13 {
            return Err(HookError::Message("unlucky".to_string()));
        }
        Ok(Vec::new())
    }

    fn get_field(&self, _id: ProxyId, name: &str) -> Result<RawValue, HookError> {
        Err(HookError::Message(format!("cannot read {}\n", name)))
    }

    fn set_field(&self, _id: ProxyId, _name: &str, _value: RawValue) -> Result<(), HookError> {
        Ok(())
    }

    fn call_method(
        &self,
        _id: ProxyId,
        name: &str,
        _args: &[RawValue],
        _outputs: usize,
    ) -> Result<Vec<RawValue>, HookError> {
        Err(HookError::Message(format!("no method {}\n", name)))
    }

    fn release(&self, id: ProxyId) {
        self.released.lock().push(id);
    }
}

#[test]
fn callable_proxies_forward_to_hooks() {
    let engine = ScriptEngine::new();
    let hooks = Arc::new(Recorder::default());
    engine.install_hooks(hooks.clone());

    let call_with = engine.evaluate("fun(f) { f(1, 2) }", 1).unwrap()[0];
    let proxy = engine.new_callable_proxy(7, 2, 1);
    assert_eq!(engine.proxy_id(proxy), Some(7));
    assert_eq!(engine.kind(proxy), ValueKind::Code);

    let results = engine.call(call_with, vec![proxy], 1).unwrap();
    assert_eq!(engine.kind(results[0]), ValueKind::Undef);
    engine.dec_ref(results[0]);
    assert_eq!(*hooks.invoked.lock(), [(7, 2)]);
    assert_eq!(*hooks.released.lock(), [7]);

    let unlucky = engine.new_callable_proxy(13, 2, 1);
    let err = engine.call(call_with, vec![unlucky], 1).unwrap_err();
    assert_eq!(engine.get_string(err), "unlucky at flux-embed.eval line 1.\n");
    engine.dec_ref(err);

    let strict = engine.new_callable_proxy(8, 1, 1);
    let err = engine.call(call_with, vec![strict], 1).unwrap_err();
    assert_eq!(
        engine.get_string(err),
        "host function expects 1 argument(s), got 2 at flux-embed.eval line 1.\n"
    );
    engine.dec_ref(err);
    engine.dec_ref(call_with);
}

#[test]
fn object_proxies_are_restricted_hashes() {
    let engine = ScriptEngine::new();
    let hooks = Arc::new(Recorder::default());
    engine.install_hooks(hooks.clone());

    let read = engine.evaluate("fun(o, k) { o[k] }", 1).unwrap()[0];

    let object = engine.new_object_proxy(3, &["x".to_string(), "y".to_string()]);
    assert_eq!(engine.kind(object), ValueKind::Object);
    assert_eq!(engine.proxy_id(object), Some(3));

    engine.inc_ref(object);
    let unknown = engine.new_string("z");
    let err = engine.call(read, vec![object, unknown], 1).unwrap_err();
    assert_eq!(
        engine.get_string(err),
        "Attempt to access disallowed key 'z' in a restricted hash at flux-embed.eval line 1.\n"
    );
    engine.dec_ref(err);

    engine.inc_ref(object);
    let known = engine.new_string("x");
    let err = engine.call(read, vec![object, known], 1).unwrap_err();
    assert_eq!(engine.get_string(err), "cannot read x\n");
    engine.dec_ref(err);

    let err = engine.call_method(object, "poke", Vec::new(), 1).unwrap_err();
    assert_eq!(engine.get_string(err), "no method poke\n");
    engine.dec_ref(err);

    assert!(hooks.released.lock().is_empty());
    engine.dec_ref(object);
    assert_eq!(*hooks.released.lock(), [3, 3, 3]);
    engine.dec_ref(read);
}
