use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::call::{self, Dispatcher};
use super::complex::ComplexHelpers;
use super::gate::{Gate, GateGuard};
use super::registry::{Entry, LiveRegistry};
use super::reflect::Reflect;
use super::tuple::{Outputs, escalate};
use crate::config::InterpreterOptions;
use crate::engine::{Engine, RawValue};
use crate::error::BridgeError;
use crate::script::ScriptEngine;

/// State shared by every handle into one engine instance.
pub(crate) struct Shared {
    gate: Gate,
    engine: Box<dyn Engine>,
    pub(crate) registry: LiveRegistry,
    pub(crate) complex: ComplexHelpers,
    /// Decrements issued while this thread held the gate; applied on the
    /// next entry.
    pending: Mutex<Vec<RawValue>>,
    /// Registry entries whose last engine reference is gone. Dropping one may
    /// release engine values, so they are dropped outside the gate.
    graveyard: Mutex<Vec<Entry>>,
    options: InterpreterOptions,
}

// SAFETY: the engine is only touched through `enter`/`engine_op`, which hold
// the gate for the calling thread, so engine state is never accessed from
// two threads at once. Engines come either from `with_engine`, which requires
// `Send`, or are the built-in `ScriptEngine`, whose `Rc` state is created by
// the engine and never handed out; the host only sees `RawValue` indices.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    /// Takes the gate and applies any deferred decrements.
    pub(crate) fn enter(&self) -> EngineGuard<'_> {
        let gate = self.gate.enter();
        let pending = std::mem::take(&mut *self.pending.lock());
        for raw in pending {
            self.engine.dec_ref(raw);
        }
        EngineGuard {
            shared: self,
            gate: Some(gate),
        }
    }

    /// Runs `op` against the engine, taking the gate unless this thread
    /// already holds it.
    pub(crate) fn engine_op<T>(&self, op: impl FnOnce(&dyn Engine) -> T) -> T {
        if self.gate.held_by_current() {
            op(&*self.engine)
        } else {
            let guard = self.enter();
            op(&*guard)
        }
    }

    pub(crate) fn gate(&self) -> &Gate {
        &self.gate
    }

    pub(crate) fn dec_ref(&self, raw: RawValue) {
        if self.gate.held_by_current() {
            self.pending.lock().push(raw);
        } else {
            self.enter().dec_ref(raw);
        }
    }

    pub(crate) fn release_all(&self, raws: &[RawValue]) {
        if raws.is_empty() {
            return;
        }
        self.engine_op(|engine| {
            for raw in raws {
                engine.dec_ref(*raw);
            }
        });
    }

    pub(crate) fn bury(&self, entry: Entry) {
        self.graveyard.lock().push(entry);
    }

    fn reap(&self) {
        loop {
            let dead = std::mem::take(&mut *self.graveyard.lock());
            if dead.is_empty() {
                return;
            }
            drop(dead);
        }
    }

    /// Applies every deferred decrement and drops every dead entry.
    fn settle(&self) {
        loop {
            drop(self.enter());
            if self.pending.lock().is_empty() && self.graveyard.lock().is_empty() {
                return;
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for raw in std::mem::take(self.pending.get_mut()) {
            self.engine.dec_ref(raw);
        }
        self.engine.fini();
        debug!(engine = self.engine.name(), "interpreter torn down");
    }
}

/// Exclusive access to the engine for the current thread.
pub(crate) struct EngineGuard<'a> {
    shared: &'a Shared,
    gate: Option<GateGuard<'a>>,
}

impl Deref for EngineGuard<'_> {
    type Target = dyn Engine;

    fn deref(&self) -> &Self::Target {
        &*self.shared.engine
    }
}

impl Drop for EngineGuard<'_> {
    fn drop(&mut self) {
        drop(self.gate.take());
        self.shared.reap();
    }
}

/// Counters describing the bridge state of one interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    /// Host closures and structs the engine can still reach.
    pub registry_entries: usize,
    /// How many times a complex-number helper was bound.
    pub complex_helper_binds: usize,
    /// Engine values still referenced.
    pub live: usize,
}

/// Handle to one embedded engine instance.
///
/// Cloning is cheap and every clone talks to the same engine. All access is
/// serialized, so an `Interpreter` can be shared freely between threads. The
/// engine is finalized when the last clone is dropped.
#[derive(Clone)]
pub struct Interpreter {
    shared: Arc<Shared>,
}

impl Interpreter {
    /// Starts an interpreter running the built-in script engine.
    ///
    /// # Panics
    ///
    /// If the engine fails to initialize.
    pub fn new() -> Self {
        Self::with_options(InterpreterOptions::default())
    }

    pub fn with_options(options: InterpreterOptions) -> Self {
        let engine = ScriptEngine::with_options(&options);
        Self::start(Box::new(engine), options)
    }

    /// Starts an interpreter on a custom engine.
    ///
    /// The engine is only ever used by one thread at a time but may move
    /// between threads, so it must be `Send`. The built-in engine keeps
    /// `Rc` state and is only reachable through [`Interpreter::new`]:
    ///
    /// ```compile_fail
    /// use flux_embed::script::ScriptEngine;
    /// use flux_embed::{Interpreter, InterpreterOptions};
    ///
    /// let engine = Box::new(ScriptEngine::new());
    /// let interp = Interpreter::with_engine(engine, InterpreterOptions::default());
    /// ```
    ///
    /// # Panics
    ///
    /// If the engine fails to initialize.
    pub fn with_engine(engine: Box<dyn Engine + Send>, options: InterpreterOptions) -> Self {
        Self::start(engine, options)
    }

    fn start(engine: Box<dyn Engine>, options: InterpreterOptions) -> Self {
        let shared = Arc::new_cyclic(|weak| {
            engine.install_hooks(Arc::new(Dispatcher::new(weak.clone())));
            Shared {
                gate: Gate::new(),
                engine,
                registry: LiveRegistry::new(),
                complex: ComplexHelpers::new(),
                pending: Mutex::new(Vec::new()),
                graveyard: Mutex::new(Vec::new()),
                options,
            }
        });

        let name = shared.engine.name();
        if let Err(message) = shared.engine_op(|engine| engine.init()) {
            panic!("failed to initialize {} engine: {}", name, message);
        }
        debug!(engine = name, source = %shared.options.source_name, "interpreter started");

        Self { shared }
    }

    /// Evaluates `code` and converts its results to `O`.
    ///
    /// `O` is `()` for no results, a single [`Reflect`] type for one, or a
    /// tuple for several. An engine exception comes back as
    /// [`BridgeError::Dynamic`] carrying the engine's error text.
    ///
    /// # Panics
    ///
    /// With the [`BridgeError`] as payload when `O` names an unsupported type
    /// or a function of the wrong shape.
    pub fn eval<O: Outputs>(&self, code: &str) -> Result<O, BridgeError> {
        let descs = O::describe();
        let results = {
            let engine = self.shared.enter();
            engine
                .evaluate(code, descs.len())
                .map_err(|err| call::raised(&self.shared, &*engine, err))?
        };
        match call::collect_outputs(&self.shared, results, &descs).and_then(O::from_hosts) {
            Err(err) if !err.is_recoverable() => escalate(err),
            outcome => outcome,
        }
    }

    /// Evaluates `code` for a single value.
    pub fn bind<T: Reflect>(&self, code: &str) -> Result<T, BridgeError> {
        self.eval::<T>(code)
    }

    /// Evaluates `code` for its effects only.
    pub fn run(&self, code: &str) -> Result<(), BridgeError> {
        self.eval::<()>(code)
    }

    /// Number of engine values still referenced, after deferred releases
    /// have been applied.
    pub fn live(&self) -> usize {
        self.shared.settle();
        self.shared.engine_op(|engine| engine.count_live())
    }

    pub fn stats(&self) -> BridgeStats {
        let live = self.live();
        BridgeStats {
            registry_entries: self.shared.registry.len(),
            complex_helper_binds: self.shared.complex.binds(),
            live,
        }
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.shared.options
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Whether two handles point at the same engine.
    pub fn ptr_eq(&self, other: &Interpreter) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("engine", &self.shared.engine.name())
            .field("source_name", &self.shared.options.source_name)
            .finish()
    }
}
