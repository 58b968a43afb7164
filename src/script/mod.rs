//! Reference engine: a small dynamic language with closures, arrays, hashes
//! and exceptions, exposed through the [`Engine`] trait.
//!
//! ```text
//! let add = fun(a, b) { a + b };
//! let point = {"x": 1, "y": 2};
//! if (add(point.x, point.y) != 3) { die("bad math"); }
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::InterpreterOptions;
use crate::engine::{Engine, HostHooks, ProxyId, RawValue, ValueKind};

mod builtins;
mod env;
mod eval;
mod hash_key;
mod live;
mod slots;
mod value;

pub mod diagnostic;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod precedence;
pub mod statement;
pub mod token;
pub mod token_type;

pub use live::LiveStats;

use env::{Env, Scope};
use eval::Unwind;
use hash_key::HashKey;
use live::LiveCounter;
use slots::Slots;
use value::{Code, FieldStub, HashTable, HostCallable, ProxyLink, Value};

/// Single-threaded interpreter for the embedded language.
///
/// Values handed to the host live in a slot table with per-slot reference
/// counts. Everything else is reclaimed by `Rc` as soon as the script drops
/// it, so [`Engine::count_live`] is exact apart from reference cycles.
pub struct ScriptEngine {
    slots: RefCell<Slots>,
    live: LiveCounter,
    globals: Env,
    hooks: RefCell<Option<Arc<dyn HostHooks>>>,
    source_name: String,
    max_call_depth: usize,
    depth: Cell<usize>,
    line: Cell<usize>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_options(&InterpreterOptions::default())
    }

    pub fn with_options(options: &InterpreterOptions) -> Self {
        Self {
            slots: RefCell::new(Slots::new()),
            live: LiveCounter::new(),
            globals: Scope::global(),
            hooks: RefCell::new(None),
            source_name: options.source_name.clone(),
            max_call_depth: options.max_call_depth,
            depth: Cell::new(0),
            line: Cell::new(0),
        }
    }

    /// Heap counters, useful when chasing leaks in tests.
    pub fn live_stats(&self) -> LiveStats {
        self.live.snapshot()
    }

    fn hooks(&self) -> Option<Arc<dyn HostHooks>> {
        self.hooks.borrow().clone()
    }

    fn store(&self, value: Value) -> RawValue {
        self.slots.borrow_mut().insert(value)
    }

    fn store_all(&self, values: Vec<Value>) -> Vec<RawValue> {
        values.into_iter().map(|value| self.store(value)).collect()
    }

    fn load(&self, raw: RawValue) -> Value {
        self.slots.borrow().get(raw).cloned().unwrap_or(Value::Undef)
    }

    fn release(&self, raw: RawValue) {
        let freed = self.slots.borrow_mut().dec(raw);
        drop(freed);
    }

    fn release_all(&self, raws: &[RawValue]) {
        for raw in raws {
            self.release(*raw);
        }
    }

    /// Reads a slot and gives up the reference to it.
    fn take(&self, raw: RawValue) -> Value {
        let value = self.load(raw);
        self.release(raw);
        value
    }

    fn key_value(&self, key: &HashKey) -> Value {
        match key {
            HashKey::Integer(v) => Value::Int(*v),
            HashKey::Boolean(v) => Value::Bool(*v),
            HashKey::String(v) => self.string(v.clone()),
        }
    }

    fn finish(&self, outcome: eval::Flow<Value>, outputs: usize) -> Result<Vec<RawValue>, RawValue> {
        match outcome {
            Ok(value) | Err(Unwind::Return(value)) => Ok(self.store_all(value.spread(outputs))),
            Err(Unwind::Die(error)) => Err(self.store(error)),
        }
    }

    fn clear(&self) {
        // Closures stored in globals capture the global scope
        let vars = std::mem::take(&mut *self.globals.borrow_mut());
        drop(vars);
        let values = self.slots.borrow_mut().drain();
        drop(values);
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Engine for ScriptEngine {
    fn name(&self) -> &'static str {
        "flux-script"
    }

    fn fini(&self) {
        debug!(live = self.count_live(), "script engine shutting down");
        self.clear();
    }

    fn install_hooks(&self, hooks: Arc<dyn HostHooks>) {
        *self.hooks.borrow_mut() = Some(hooks);
    }

    fn evaluate(&self, code: &str, outputs: usize) -> Result<Vec<RawValue>, RawValue> {
        let program = match parser::parse(code) {
            Ok(program) => program,
            Err(diagnostics) => {
                let text = diagnostics
                    .first()
                    .map(|diag| diag.render(Some(code), &self.source_name))
                    .unwrap_or_else(|| format!("syntax error at {}\n", self.source_name));
                return Err(self.store(self.string(text)));
            }
        };

        let saved = self.line.replace(0);
        let outcome = self.run_program(&program);
        self.line.set(saved);
        self.finish(outcome, outputs)
    }

    fn call(
        &self,
        callable: RawValue,
        args: Vec<RawValue>,
        outputs: usize,
    ) -> Result<Vec<RawValue>, RawValue> {
        let callee = self.load(callable);
        let args = args.into_iter().map(|raw| self.take(raw)).collect();
        let outcome = self.call_value(&callee, args);
        self.finish(outcome, outputs)
    }

    fn call_method(
        &self,
        invocant: RawValue,
        name: &str,
        args: Vec<RawValue>,
        outputs: usize,
    ) -> Result<Vec<RawValue>, RawValue> {
        let invocant = self.load(invocant);
        let args = args.into_iter().map(|raw| self.take(raw)).collect();
        let outcome = self.call_method_value(&invocant, name, args, outputs);
        self.finish(outcome, outputs)
    }

    fn inc_ref(&self, value: RawValue) {
        self.slots.borrow_mut().inc(value);
    }

    fn dec_ref(&self, value: RawValue) {
        self.release(value);
    }

    fn count_live(&self) -> usize {
        self.live.live() + self.slots.borrow().live_count()
    }

    fn kind(&self, value: RawValue) -> ValueKind {
        self.load(value).kind()
    }

    fn walk_sequence(&self, value: RawValue, each: &mut dyn FnMut(RawValue)) -> bool {
        let Value::Array(items) = self.load(value) else {
            return false;
        };
        let snapshot: Vec<Value> = items.borrow().clone();
        for item in snapshot {
            let raw = self.store(item);
            each(raw);
            self.release(raw);
        }
        true
    }

    fn walk_mapping(&self, value: RawValue, each: &mut dyn FnMut(RawValue, RawValue)) -> bool {
        let Value::Hash(table) = self.load(value) else {
            return false;
        };
        let mut pairs: Vec<(HashKey, Value)> = table
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, value) in pairs {
            let value = self.materialize(value).unwrap_or(Value::Undef);
            let key = self.store(self.key_value(&key));
            let value = self.store(value);
            each(key, value);
            self.release(key);
            self.release(value);
        }
        true
    }

    fn new_undef(&self) -> RawValue {
        self.store(Value::Undef)
    }

    fn new_bool(&self, value: bool) -> RawValue {
        self.store(Value::Bool(value))
    }

    fn new_int(&self, value: i64) -> RawValue {
        self.store(Value::Int(value))
    }

    fn new_uint(&self, value: u64) -> RawValue {
        self.store(Value::Uint(value))
    }

    fn new_float(&self, value: f64) -> RawValue {
        self.store(Value::Float(value))
    }

    fn new_string(&self, value: &str) -> RawValue {
        self.store(self.string(value))
    }

    fn new_sequence(&self, items: Vec<RawValue>) -> RawValue {
        let items = items.into_iter().map(|raw| self.take(raw)).collect();
        self.store(self.array(items))
    }

    fn new_mapping(&self, pairs: Vec<(RawValue, RawValue)>) -> RawValue {
        let mut entries = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key = HashKey::from_value(&self.take(key));
            let value = self.take(value);
            entries.insert(key, value);
        }
        self.store(self.hash(HashTable {
            entries,
            proxy: None,
        }))
    }

    fn new_callable_proxy(&self, id: ProxyId, inputs: usize, outputs: usize) -> RawValue {
        let code = Code::Host(HostCallable {
            link: ProxyLink {
                id,
                hooks: self.hooks(),
            },
            inputs,
            outputs,
        });
        self.store(Value::Code(self.live.track(code)))
    }

    fn new_object_proxy(&self, id: ProxyId, fields: &[String]) -> RawValue {
        let hooks = self.hooks();
        let mut entries = HashMap::with_capacity(fields.len());
        for name in fields {
            let stub = FieldStub {
                name: name.clone(),
                link: ProxyLink {
                    id,
                    hooks: hooks.clone(),
                },
            };
            entries.insert(
                HashKey::String(name.clone()),
                Value::Field(self.live.track(stub)),
            );
        }
        self.store(self.hash(HashTable {
            entries,
            proxy: Some(ProxyLink { id, hooks }),
        }))
    }

    fn proxy_id(&self, value: RawValue) -> Option<ProxyId> {
        match self.load(value) {
            Value::Code(code) => match &**code {
                Code::Host(host) => Some(host.link.id),
                _ => None,
            },
            Value::Hash(table) => table.borrow().proxy.as_ref().map(|link| link.id),
            _ => None,
        }
    }

    fn get_bool(&self, value: RawValue) -> bool {
        self.load(value).is_truthy()
    }

    fn get_int(&self, value: RawValue) -> i64 {
        self.load(value).to_int()
    }

    fn get_uint(&self, value: RawValue) -> u64 {
        self.load(value).to_uint()
    }

    fn get_float(&self, value: RawValue) -> f64 {
        self.load(value).to_float()
    }

    fn get_string(&self, value: RawValue) -> String {
        self.load(value).to_display()
    }
}
