use super::ScriptEngine;
use super::eval::{Flow, Unwind};
use super::hash_key::HashKey;
use super::value::{Builtin, Value};

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "die",
        func: builtin_die,
    },
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "complex",
        func: builtin_complex,
    },
    Builtin {
        name: "re",
        func: builtin_re,
    },
    Builtin {
        name: "im",
        func: builtin_im,
    },
    Builtin {
        name: "int",
        func: builtin_int,
    },
    Builtin {
        name: "str",
        func: builtin_str,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
    Builtin {
        name: "keys",
        func: builtin_keys,
    },
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}

fn check_arity(engine: &ScriptEngine, name: &str, args: &[Value], expected: usize) -> Flow<()> {
    if args.len() == expected {
        Ok(())
    } else {
        engine.die(format!(
            "wrong number of arguments to {}: got={}, want={}",
            name,
            args.len(),
            expected
        ))
    }
}

/// `die(x)` raises `x`. Strings get a location suffix unless they end with a
/// newline; any other value is raised as is.
fn builtin_die(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    match args.as_slice() {
        [] => engine.die("Died"),
        [Value::Str(s)] => engine.die(s.as_str()),
        [value] if !value.kind().is_scalar() => Err(Unwind::Die(value.clone())),
        values => {
            let text: String = values.iter().map(Value::to_display).collect();
            engine.die(text)
        }
    }
}

fn builtin_len(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "len", &args, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        Value::Hash(table) => table.borrow().entries.len(),
        other => {
            return engine.die(format!("argument to `len` not supported, got {}", other.type_name()));
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_complex(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "complex", &args, 2)?;
    Ok(engine.complex(args[0].to_float(), args[1].to_float()))
}

fn builtin_re(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "re", &args, 1)?;
    Ok(Value::Float(match &args[0] {
        Value::Complex(c) => c.re,
        other => other.to_float(),
    }))
}

fn builtin_im(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "im", &args, 1)?;
    Ok(Value::Float(match &args[0] {
        Value::Complex(c) => c.im,
        _ => 0.0,
    }))
}

fn builtin_int(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "int", &args, 1)?;
    Ok(match &args[0] {
        Value::Uint(v) => Value::Uint(*v),
        other => Value::Int(other.to_int()),
    })
}

fn builtin_str(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "str", &args, 1)?;
    Ok(engine.string(args[0].to_display()))
}

fn builtin_push(engine: &ScriptEngine, mut args: Vec<Value>) -> Flow<Value> {
    if args.is_empty() {
        return engine.die("wrong number of arguments to push: got=0, want at least 1");
    }
    let rest = args.split_off(1);
    let Value::Array(items) = &args[0] else {
        return engine.die(format!(
            "argument to `push` must be Array, got {}",
            args[0].type_name()
        ));
    };
    let mut items = items.borrow_mut();
    items.extend(rest);
    Ok(Value::Int(items.len() as i64))
}

fn builtin_keys(engine: &ScriptEngine, args: Vec<Value>) -> Flow<Value> {
    check_arity(engine, "keys", &args, 1)?;
    let Value::Hash(table) = &args[0] else {
        return engine.die(format!(
            "argument to `keys` must be Hash, got {}",
            args[0].type_name()
        ));
    };
    let mut keys: Vec<HashKey> = table.borrow().entries.keys().cloned().collect();
    keys.sort();
    let items = keys.iter().map(|key| engine.key_value(key)).collect();
    Ok(engine.array(items))
}
