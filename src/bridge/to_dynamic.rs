use std::sync::Arc;

use tracing::trace;

use super::handle::DynValue;
use super::host_value::{FnImpl, HostValue};
use super::interpreter::Shared;
use super::object::HostObject;
use super::registry::Entry;
use crate::engine::RawValue;
use crate::error::BridgeError;

/// Converts a host value into a new engine value owned by the caller.
///
/// The gate is taken once per engine operation and dropped in between, so
/// nothing here holds it while other host code runs.
pub(crate) fn to_dynamic(shared: &Arc<Shared>, value: &HostValue) -> Result<RawValue, BridgeError> {
    match value {
        HostValue::Bool(v) => Ok(shared.engine_op(|e| e.new_bool(*v))),
        HostValue::Int(v) => Ok(shared.engine_op(|e| e.new_int(*v))),
        HostValue::Uint(v) => Ok(shared.engine_op(|e| e.new_uint(*v))),
        HostValue::Float(v) => Ok(shared.engine_op(|e| e.new_float(*v))),
        HostValue::String(v) => Ok(shared.engine_op(|e| e.new_string(v))),
        HostValue::Complex(re, im) => shared.complex.make(shared, *re, *im),
        HostValue::Sequence(items) => {
            let raws = to_dynamic_all(shared, items)?;
            Ok(shared.engine_op(|e| e.new_sequence(raws)))
        }
        HostValue::Mapping(pairs) => {
            let mut raws = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                let pair = to_dynamic(shared, key).and_then(|key| match to_dynamic(shared, value) {
                    Ok(value) => Ok((key, value)),
                    Err(err) => {
                        shared.release_all(&[key]);
                        Err(err)
                    }
                });
                match pair {
                    Ok(pair) => raws.push(pair),
                    Err(err) => {
                        let flat: Vec<RawValue> = raws.iter().flat_map(|(k, v)| [*k, *v]).collect();
                        shared.release_all(&flat);
                        return Err(err);
                    }
                }
            }
            Ok(shared.engine_op(|e| e.new_mapping(raws)))
        }
        HostValue::Function(func) => match func.imp() {
            FnImpl::Dynamic(callable) => share(shared, callable),
            FnImpl::Host(_) => {
                let sig = func.signature();
                let (inputs, outputs) = (sig.inputs.len(), sig.outputs.len());
                let id = shared.registry.register(Entry::Callable(func.clone()), 1);
                trace!(id, %sig, "exposing host function");
                Ok(shared.engine_op(|e| e.new_callable_proxy(id, inputs, outputs)))
            }
        },
        HostValue::Struct(value) => {
            let fields = value.field_names();
            let live = fields.len() + 1;
            let object = Arc::new(HostObject::new(value.clone()));
            let id = shared.registry.register(Entry::Object(object), live);
            trace!(id, name = value.name(), "exposing host struct");
            Ok(shared.engine_op(|e| e.new_object_proxy(id, &fields)))
        }
        HostValue::Dynamic(handle) => share(shared, handle),
        HostValue::Unsupported(name) => Err(BridgeError::unsupported(*name)),
    }
}

/// Converts values in order. On failure the ones already converted are
/// released again.
pub(crate) fn to_dynamic_all(
    shared: &Arc<Shared>,
    values: &[HostValue],
) -> Result<Vec<RawValue>, BridgeError> {
    let mut raws = Vec::with_capacity(values.len());
    for value in values {
        match to_dynamic(shared, value) {
            Ok(raw) => raws.push(raw),
            Err(err) => {
                shared.release_all(&raws);
                return Err(err);
            }
        }
    }
    Ok(raws)
}

/// Hands an existing engine value back to the engine with a new reference.
fn share(shared: &Arc<Shared>, handle: &DynValue) -> Result<RawValue, BridgeError> {
    if !handle.belongs_to(shared) {
        return Err(BridgeError::invalid(
            "value of this interpreter",
            "value from another interpreter",
        ));
    }
    if handle.is_released() {
        return Err(BridgeError::invalid("live dynamic value", "released dynamic value"));
    }
    let raw = handle.raw();
    shared.engine_op(|e| e.inc_ref(raw));
    Ok(raw)
}
