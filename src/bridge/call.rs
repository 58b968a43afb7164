//! The two call paths across the boundary.
//!
//! Host code calls engine functions through [`call_dynamic`]. Engine code
//! calls host closures and struct members through [`Dispatcher`], which the
//! engine reaches via [`HostHooks`] with the gate held; the dispatcher
//! suspends the gate for as long as host code runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tracing::trace;

use super::from_dynamic::from_dynamic;
use super::handle::{DynError, DynValue};
use super::host_value::HostValue;
use super::interpreter::Shared;
use super::object::HostObject;
use super::registry::Entry;
use super::to_dynamic::{to_dynamic, to_dynamic_all};
use super::types::{Signature, TypeDesc};
use crate::engine::{Engine, HookError, ProxyId, RawValue};
use crate::error::BridgeError;

/// Wraps an owned engine exception value as a [`BridgeError`].
pub(crate) fn raised(shared: &Arc<Shared>, engine: &dyn Engine, err: RawValue) -> BridgeError {
    let message = engine.get_string(err);
    BridgeError::Dynamic(DynError::with_value(message, DynValue::adopt(shared, err)))
}

/// Converts owned engine results to host values, then releases them.
pub(crate) fn collect_outputs(
    shared: &Arc<Shared>,
    raws: Vec<RawValue>,
    descs: &[TypeDesc],
) -> Result<Vec<HostValue>, BridgeError> {
    let converted = raws
        .iter()
        .zip(descs)
        .map(|(raw, desc)| from_dynamic(shared, *raw, desc))
        .collect();
    shared.release_all(&raws);
    converted
}

/// Host calls engine: marshal the arguments, call, marshal the results.
pub(crate) fn call_dynamic(
    callable: &DynValue,
    sig: &Signature,
    args: Vec<HostValue>,
) -> Result<Vec<HostValue>, BridgeError> {
    if args.len() != sig.inputs.len() {
        return Err(BridgeError::arity(
            "dynamic function arguments",
            sig.inputs.len(),
            args.len(),
        ));
    }

    let shared = callable.interpreter();
    let raws = to_dynamic_all(&shared, &args)?;
    drop(args);

    trace!(callable = %callable.raw(), inputs = raws.len(), outputs = sig.outputs.len(), "calling engine function");
    let results = {
        let engine = shared.enter();
        engine
            .call(callable.raw(), raws, sig.outputs.len())
            .map_err(|err| raised(&shared, &*engine, err))?
    };
    collect_outputs(&shared, results, &sig.outputs)
}

/// Engine-to-host callbacks for one interpreter.
pub(crate) struct Dispatcher {
    shared: Weak<Shared>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// Runs host code with the gate suspended.
    ///
    /// Bridge errors, including ones escalated as panics by nested typed
    /// calls, become engine exceptions. Any other panic keeps unwinding once
    /// the gate is back.
    fn dispatch<T>(
        &self,
        op: impl FnOnce(&Arc<Shared>) -> Result<T, BridgeError>,
    ) -> Result<T, HookError> {
        let Some(shared) = self.shared.upgrade() else {
            return Err(HookError::Message("interpreter is shutting down".to_string()));
        };

        let outcome = {
            let _suspended = shared.gate().suspend();
            panic::catch_unwind(AssertUnwindSafe(|| op(&shared)))
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(to_hook_error(&shared, err)),
            Err(payload) => match payload.downcast::<BridgeError>() {
                Ok(err) => Err(to_hook_error(&shared, *err)),
                Err(payload) => panic::resume_unwind(payload),
            },
        }
    }
}

/// Re-raises an engine exception as itself; anything else as its message.
fn to_hook_error(shared: &Arc<Shared>, err: BridgeError) -> HookError {
    if let BridgeError::Dynamic(dyn_err) = &err
        && let Some(value) = dyn_err.value()
        && value.belongs_to(shared)
        && !value.is_released()
    {
        let raw = value.raw();
        shared.engine_op(|engine| engine.inc_ref(raw));
        return HookError::Raise(raw);
    }
    HookError::Message(err.to_string())
}

fn resolve_object(shared: &Shared, id: ProxyId) -> Result<Arc<HostObject>, BridgeError> {
    match shared.registry.resolve(id) {
        Some(Entry::Object(object)) => Ok(object),
        _ => Err(BridgeError::StaleProxy(id)),
    }
}

fn convert_args(
    shared: &Arc<Shared>,
    args: &[RawValue],
    descs: &[TypeDesc],
    context: &str,
) -> Result<Vec<HostValue>, BridgeError> {
    if args.len() != descs.len() {
        return Err(BridgeError::arity(context, descs.len(), args.len()));
    }
    args.iter()
        .zip(descs)
        .map(|(raw, desc)| from_dynamic(shared, *raw, desc))
        .collect()
}

impl crate::engine::HostHooks for Dispatcher {
    fn invoke(
        &self,
        id: ProxyId,
        args: &[RawValue],
        _outputs: usize,
    ) -> Result<Vec<RawValue>, HookError> {
        self.dispatch(|shared| {
            let Some(Entry::Callable(func)) = shared.registry.resolve(id) else {
                return Err(BridgeError::StaleProxy(id));
            };
            trace!(id, args = args.len(), "engine calling host function");
            let inputs = convert_args(shared, args, &func.signature().inputs, "host function")?;
            let outputs = func.invoke(inputs)?;
            to_dynamic_all(shared, &outputs)
        })
    }

    fn get_field(&self, id: ProxyId, name: &str) -> Result<RawValue, HookError> {
        self.dispatch(|shared| {
            let object = resolve_object(shared, id)?;
            let value = object.get_field(name)?;
            to_dynamic(shared, &value)
        })
    }

    fn set_field(&self, id: ProxyId, name: &str, value: RawValue) -> Result<(), HookError> {
        self.dispatch(|shared| {
            let object = resolve_object(shared, id)?;
            let desc = object.field_desc(name)?;
            let value = from_dynamic(shared, value, &desc)?;
            object.set_field(name, value)
        })
    }

    fn call_method(
        &self,
        id: ProxyId,
        name: &str,
        args: &[RawValue],
        _outputs: usize,
    ) -> Result<Vec<RawValue>, HookError> {
        self.dispatch(|shared| {
            let object = resolve_object(shared, id)?;
            let method = object.method(name)?;
            trace!(id, method = name, "engine calling host method");
            let inputs = convert_args(shared, args, &method.signature().inputs, name)?;
            let outputs = object.call_method(&method, inputs)?;
            to_dynamic_all(shared, &outputs)
        })
    }

    fn release(&self, id: ProxyId) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if let Some(entry) = shared.registry.release(id) {
            shared.bury(entry);
        }
    }
}
