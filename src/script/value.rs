use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::engine::{HostHooks, ProxyId, ValueKind};

use super::env::Env;
use super::eval::Flow;
use super::hash_key::HashKey;
use super::live::Tracked;
use super::statement::Block;
use super::ScriptEngine;

/// Shared, counted heap object.
pub type Obj<T> = Rc<Tracked<T>>;

/// Runtime value of the script engine.
///
/// ## Memory Management Model
///
/// Scalars (undef, booleans, numbers) are unboxed. Strings, arrays, hashes,
/// code, complex numbers and proxy pieces live on the heap behind `Rc` and
/// are counted by the engine's live counter, so dropping the last reference
/// is what frees a value. Arrays and hashes are reference types: copies of a
/// `Value` share the same container.
///
/// ### No-Cycle Invariant
///
/// `Rc` cannot reclaim cycles. A closure stored into the scope it captured,
/// or a container that holds itself, stays alive until the engine is torn
/// down, at which point the global scope is cleared to break the common
/// cycles.
#[derive(Clone)]
pub enum Value {
    Undef,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(Obj<String>),
    Array(Obj<RefCell<Vec<Value>>>),
    Hash(Obj<RefCell<HashTable>>),
    Code(Obj<Code>),
    Complex(Obj<ComplexParts>),
    /// Member of a host object proxy. Reads and writes go to the host.
    Field(Obj<FieldStub>),
    /// Multiple results, produced by `(a, b)` and host calls.
    List(Rc<[Value]>),
}

#[derive(Default)]
pub struct HashTable {
    pub entries: HashMap<HashKey, Value>,
    /// Set on host object proxies; such hashes refuse unknown keys.
    pub proxy: Option<ProxyLink>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexParts {
    pub re: f64,
    pub im: f64,
}

pub struct FieldStub {
    pub name: String,
    pub link: ProxyLink,
}

pub enum Code {
    Closure(Closure),
    Builtin(Builtin),
    Host(HostCallable),
}

pub struct Closure {
    pub parameters: Rc<[String]>,
    pub body: Rc<Block>,
    pub env: Env,
}

pub type BuiltinFn = fn(&ScriptEngine, Vec<Value>) -> Flow<Value>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

pub struct HostCallable {
    pub link: ProxyLink,
    pub inputs: usize,
    pub outputs: usize,
}

/// One engine-side reference to a host proxy. Dropping it reports the
/// release to the host.
pub struct ProxyLink {
    pub id: ProxyId,
    pub hooks: Option<Arc<dyn HostHooks>>,
}

impl Drop for ProxyLink {
    fn drop(&mut self) {
        if let Some(hooks) = &self.hooks {
            hooks.release(self.id);
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "undef",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Uint(_) => "Uint",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Hash(h) if h.borrow().proxy.is_some() => "Object",
            Value::Hash(_) => "Hash",
            Value::Code(_) => "Code",
            Value::Complex(_) => "Complex",
            Value::Field(_) => "Field",
            Value::List(_) => "List",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undef => ValueKind::Undef,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Uint(_) => ValueKind::Uint,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Sequence,
            Value::Hash(h) if h.borrow().proxy.is_some() => ValueKind::Object,
            Value::Hash(_) => ValueKind::Mapping,
            Value::Code(_) => ValueKind::Code,
            Value::Complex(_) => ValueKind::Complex,
            Value::Field(_) => ValueKind::Undef,
            Value::List(items) => items.last().map_or(ValueKind::Undef, Value::kind),
        }
    }

    /// Collapses a multi-value list to the single value a scalar slot sees.
    pub fn into_scalar(self) -> Value {
        match self {
            Value::List(items) => items.last().cloned().unwrap_or(Value::Undef),
            other => other,
        }
    }

    /// Spreads a value into exactly `n` results, padding with undef.
    pub fn spread(self, n: usize) -> Vec<Value> {
        let mut values = match self {
            Value::List(items) => items.to_vec(),
            other => vec![other],
        };
        values.resize(n, Value::Undef);
        values
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undef => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Uint(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !(s.is_empty() || s.as_str() == "0"),
            Value::List(items) => items.last().is_some_and(Value::is_truthy),
            Value::Field(_) => false,
            _ => true,
        }
    }

    pub fn to_int(&self) -> i64 {
        match self {
            Value::Bool(b) => i64::from(*b),
            Value::Int(v) => *v,
            Value::Uint(v) => *v as i64,
            Value::Float(v) => *v as i64,
            Value::Str(s) => match numify(s) {
                Value::Float(f) => f as i64,
                other => other.to_int(),
            },
            Value::Complex(c) => c.re as i64,
            Value::List(items) => items.last().map_or(0, Value::to_int),
            _ => 0,
        }
    }

    pub fn to_uint(&self) -> u64 {
        match self {
            Value::Uint(v) => *v,
            Value::Float(v) => *v as u64,
            Value::Str(s) => match numify(s) {
                Value::Uint(u) => u,
                Value::Float(f) => f as u64,
                other => other.to_int() as u64,
            },
            other => other.to_int() as u64,
        }
    }

    pub fn to_float(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(v) => *v as f64,
            Value::Uint(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Str(s) => numify(s).to_float(),
            Value::Complex(c) => c.re,
            Value::List(items) => items.last().map_or(0.0, Value::to_float),
            _ => 0.0,
        }
    }

    /// String form used by `str()`, string concatenation and error text.
    pub fn to_display(&self) -> String {
        match self {
            Value::Undef => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(v) => v.to_string(),
            Value::Uint(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Str(s) => s.as_str().to_string(),
            Value::Array(items) => {
                let items = items.borrow();
                let parts: Vec<String> = items.iter().map(Value::to_display).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Hash(h) => {
                let table = h.borrow();
                let mut pairs: Vec<(&HashKey, &Value)> = table.entries.iter().collect();
                pairs.sort_by(|a, b| a.0.cmp(b.0));
                let parts: Vec<String> = pairs
                    .into_iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_display()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Code(code) => match &***code {
                Code::Builtin(b) => format!("<builtin {}>", b.name),
                Code::Host(h) => format!("<host fn #{}>", h.link.id),
                Code::Closure(_) => "<fun>".to_string(),
            },
            Value::Complex(c) => format_complex(c.re, c.im),
            Value::Field(f) => format!("<field {}>", f.name),
            Value::List(items) => items.last().map(Value::to_display).unwrap_or_default(),
        }
    }

    /// Identity for references, value equality for scalars.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Code(a), Value::Code(b)) => Rc::ptr_eq(a, b),
            (Value::Field(a), Value::Field(b)) => Rc::ptr_eq(a, b),
            (Value::Complex(a), Value::Complex(b)) => ***a == ***b,
            (Value::Str(a), Value::Str(b)) => a.as_str() == b.as_str(),
            (Value::Undef, Value::Undef) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.to_float() == b.to_float(),
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({:?})", s.as_str()),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            other => write!(f, "{}({})", other.type_name(), other.to_display()),
        }
    }
}

/// Parses the leading number of a string. Non-numeric text is zero.
pub fn numify(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::Int(v);
    }
    if let Ok(v) = trimmed.parse::<u64>() {
        return Value::Uint(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Value::Float(v);
    }

    let end = trimmed
        .char_indices()
        .take_while(|&(i, c)| {
            c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || (i == 0 && matches!(c, '-' | '+'))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);

    // Shrink until the prefix parses, e.g. "12e" -> "12"
    let mut prefix = &trimmed[..end];
    while !prefix.is_empty() {
        if let Ok(v) = prefix.parse::<i64>() {
            return Value::Int(v);
        }
        if let Ok(v) = prefix.parse::<f64>() {
            return Value::Float(v);
        }
        prefix = &prefix[..prefix.len() - 1];
    }
    Value::Int(0)
}

pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{:?}", value)
}

fn format_complex(re: f64, im: f64) -> String {
    if im.is_sign_negative() {
        format!("{}-{}i", format_float(re), format_float(-im))
    } else {
        format!("{}+{}i", format_float(re), format_float(im))
    }
}
