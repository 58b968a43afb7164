use std::sync::Arc;

use super::handle::DynValue;
use super::host_value::{FieldValue, HostFn, HostValue, StructValue};
use super::interpreter::Shared;
use super::registry::Entry;
use super::types::{Signature, StructDesc, TypeDesc};
use crate::engine::{Engine, RawValue, ValueKind};
use crate::error::BridgeError;

/// Converts a borrowed engine value into the host shape `desc` asks for.
///
/// The caller keeps its reference; anything the result needs to hold on to
/// takes a reference of its own.
pub(crate) fn from_dynamic(
    shared: &Arc<Shared>,
    raw: RawValue,
    desc: &TypeDesc,
) -> Result<HostValue, BridgeError> {
    let kind = shared.engine_op(|e| e.kind(raw));
    match desc {
        TypeDesc::Bool => scalar(shared, raw, kind, desc, |e, raw| HostValue::Bool(e.get_bool(raw))),
        TypeDesc::Int(_) => scalar(shared, raw, kind, desc, |e, raw| match kind {
            ValueKind::Uint => HostValue::Uint(e.get_uint(raw)),
            _ => HostValue::Int(e.get_int(raw)),
        }),
        TypeDesc::Uint(_) => {
            if kind == ValueKind::Int || kind == ValueKind::Float || kind == ValueKind::String {
                let signed = shared.engine_op(|e| e.get_float(raw));
                if signed < 0.0 {
                    return Err(BridgeError::invalid(desc, format!("negative {}", kind)));
                }
            }
            scalar(shared, raw, kind, desc, |e, raw| HostValue::Uint(e.get_uint(raw)))
        }
        TypeDesc::Float(_) => scalar(shared, raw, kind, desc, |e, raw| HostValue::Float(e.get_float(raw))),
        TypeDesc::String => scalar(shared, raw, kind, desc, |e, raw| HostValue::String(e.get_string(raw))),
        TypeDesc::Complex(_) => match kind {
            ValueKind::Complex => {
                let (re, im) = shared.complex.parts(shared, raw)?;
                Ok(HostValue::Complex(re, im))
            }
            k if k.is_scalar() => Ok(HostValue::Complex(shared.engine_op(|e| e.get_float(raw)), 0.0)),
            other => Err(BridgeError::invalid(desc, other)),
        },
        TypeDesc::Sequence(item) => sequence(shared, raw, kind, desc, item),
        TypeDesc::Mapping(key, value) => mapping(shared, raw, kind, desc, key, value),
        TypeDesc::Function(sig) => function(shared, raw, kind, sig),
        TypeDesc::Struct(sd) => structure(shared, raw, kind, sd),
        TypeDesc::Opaque => Ok(HostValue::Dynamic(DynValue::acquire(shared, raw))),
        TypeDesc::Unsupported(name) => Err(BridgeError::unsupported(*name)),
    }
}

fn scalar(
    shared: &Arc<Shared>,
    raw: RawValue,
    kind: ValueKind,
    desc: &TypeDesc,
    read: impl FnOnce(&dyn Engine, RawValue) -> HostValue,
) -> Result<HostValue, BridgeError> {
    if !kind.is_scalar() {
        return Err(BridgeError::invalid(desc, kind));
    }
    Ok(shared.engine_op(|e| read(e, raw)))
}

fn sequence(
    shared: &Arc<Shared>,
    raw: RawValue,
    kind: ValueKind,
    desc: &TypeDesc,
    item: &TypeDesc,
) -> Result<HostValue, BridgeError> {
    match kind {
        ValueKind::Undef => return Ok(HostValue::Sequence(Vec::new())),
        ValueKind::Sequence => {}
        other => return Err(BridgeError::invalid(desc, other)),
    }

    let mut items = Vec::new();
    let mut failure = None;
    shared.engine_op(|e| {
        e.walk_sequence(raw, &mut |element| {
            if failure.is_some() {
                return;
            }
            match from_dynamic(shared, element, item) {
                Ok(value) => items.push(value),
                Err(err) => failure = Some(err),
            }
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(HostValue::Sequence(items)),
    }
}

fn mapping(
    shared: &Arc<Shared>,
    raw: RawValue,
    kind: ValueKind,
    desc: &TypeDesc,
    key: &TypeDesc,
    value: &TypeDesc,
) -> Result<HostValue, BridgeError> {
    match kind {
        ValueKind::Undef => return Ok(HostValue::Mapping(Vec::new())),
        ValueKind::Mapping | ValueKind::Object => {}
        other => return Err(BridgeError::invalid(desc, other)),
    }

    let mut pairs = Vec::new();
    let mut failure = None;
    shared.engine_op(|e| {
        e.walk_mapping(raw, &mut |k, v| {
            if failure.is_some() {
                return;
            }
            let pair = from_dynamic(shared, k, key)
                .and_then(|k| from_dynamic(shared, v, value).map(|v| (k, v)));
            match pair {
                Ok(pair) => pairs.push(pair),
                Err(err) => failure = Some(err),
            }
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(HostValue::Mapping(pairs)),
    }
}

/// A proxy for a host closure comes back as that closure; any other engine
/// callable is wrapped so calling it goes through the engine.
fn function(
    shared: &Arc<Shared>,
    raw: RawValue,
    kind: ValueKind,
    sig: &Arc<Signature>,
) -> Result<HostValue, BridgeError> {
    if kind != ValueKind::Code {
        return Err(BridgeError::invalid(TypeDesc::Function(sig.clone()), kind));
    }
    if let Some(id) = shared.engine_op(|e| e.proxy_id(raw))
        && let Some(Entry::Callable(func)) = shared.registry.resolve(id)
    {
        return func.retyped(sig.clone()).map(HostValue::Function);
    }
    Ok(HostValue::Function(HostFn::dynamic(
        sig.clone(),
        DynValue::acquire(shared, raw),
    )))
}

/// Object proxies resolve to the current state of the host struct. Plain
/// mappings are matched field by field; keys the struct lacks are ignored
/// and missing fields are left out.
fn structure(
    shared: &Arc<Shared>,
    raw: RawValue,
    kind: ValueKind,
    sd: &Arc<StructDesc>,
) -> Result<HostValue, BridgeError> {
    if !matches!(kind, ValueKind::Mapping | ValueKind::Object) {
        return Err(BridgeError::invalid(sd.name, kind));
    }

    if let Some(id) = shared.engine_op(|e| e.proxy_id(raw)) {
        return match shared.registry.resolve(id) {
            Some(Entry::Object(object)) if object.name() == sd.name => {
                Ok(HostValue::Struct(object.snapshot()))
            }
            Some(Entry::Object(object)) => Err(BridgeError::invalid(sd.name, object.name())),
            _ => Err(BridgeError::StaleProxy(id)),
        };
    }

    let mut fields = Vec::new();
    let mut failure = None;
    shared.engine_op(|e| {
        e.walk_mapping(raw, &mut |k, v| {
            if failure.is_some() {
                return;
            }
            if e.kind(k) != ValueKind::String {
                return;
            }
            let name = e.get_string(k);
            let Some(field) = sd.field(&name) else {
                return;
            };
            match from_dynamic(shared, v, &field.desc) {
                Ok(value) => fields.push(FieldValue::new(field.name, field.desc.clone(), value)),
                Err(err) => failure = Some(err),
            }
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(HostValue::Struct(StructValue::new(sd.name, fields, Vec::new()))),
    }
}
