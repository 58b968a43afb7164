use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::call::raised;
use super::handle::DynValue;
use super::interpreter::Shared;
use crate::engine::{Engine, RawValue};
use crate::error::BridgeError;

const MAKE_COMPLEX: &str = "fun(re, im) { complex(re, im) }";
const COMPLEX_PARTS: &str = "fun(z) { (re(z), im(z)) }";

/// Engine functions that build and take apart complex numbers, bound the
/// first time they are needed and kept for the life of the interpreter.
///
/// The slots are only locked by the thread holding the gate, so binding a
/// helper never waits on another thread while the gate is held.
pub(crate) struct ComplexHelpers {
    make: Mutex<Option<DynValue>>,
    parts: Mutex<Option<DynValue>>,
    binds: AtomicUsize,
}

impl ComplexHelpers {
    pub(crate) fn new() -> Self {
        Self {
            make: Mutex::new(None),
            parts: Mutex::new(None),
            binds: AtomicUsize::new(0),
        }
    }

    /// Number of helpers bound so far.
    pub(crate) fn binds(&self) -> usize {
        self.binds.load(Ordering::Relaxed)
    }

    /// Looks up or binds a helper. Must run under the gate.
    fn helper(
        &self,
        slot: &Mutex<Option<DynValue>>,
        shared: &Arc<Shared>,
        engine: &dyn Engine,
        code: &str,
    ) -> Result<RawValue, BridgeError> {
        let mut slot = slot.lock();
        if let Some(helper) = slot.as_ref() {
            return Ok(helper.raw());
        }
        let results = engine
            .evaluate(code, 1)
            .map_err(|err| raised(shared, engine, err))?;
        let Some(raw) = results.into_iter().next() else {
            return Err(BridgeError::arity("complex helper", 1, 0));
        };
        self.binds.fetch_add(1, Ordering::Relaxed);
        debug!(helper = code, "bound complex helper");
        *slot = Some(DynValue::adopt(shared, raw));
        Ok(raw)
    }

    /// Builds an engine complex number; the result is owned by the caller.
    pub(crate) fn make(&self, shared: &Arc<Shared>, re: f64, im: f64) -> Result<RawValue, BridgeError> {
        let results = shared.engine_op(|engine| {
            let helper = self.helper(&self.make, shared, engine, MAKE_COMPLEX)?;
            let args = vec![engine.new_float(re), engine.new_float(im)];
            engine
                .call(helper, args, 1)
                .map_err(|err| raised(shared, engine, err))
        })?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::arity("complex constructor", 1, 0))
    }

    /// Reads the real and imaginary parts of a borrowed engine value.
    pub(crate) fn parts(&self, shared: &Arc<Shared>, value: RawValue) -> Result<(f64, f64), BridgeError> {
        shared.engine_op(|engine| {
            let helper = self.helper(&self.parts, shared, engine, COMPLEX_PARTS)?;
            engine.inc_ref(value);
            let results = engine
                .call(helper, vec![value], 2)
                .map_err(|err| raised(shared, engine, err))?;
            let parts = match results.as_slice() {
                [re, im] => Ok((engine.get_float(*re), engine.get_float(*im))),
                _ => Err(BridgeError::arity("complex parts", 2, results.len())),
            };
            for raw in results {
                engine.dec_ref(raw);
            }
            parts
        })
    }
}
