use std::fmt;
use std::sync::Arc;

use super::call;
use super::handle::DynValue;
use super::object::Method;
use super::types::{Kind, Signature, TypeDesc};
use crate::error::BridgeError;

/// Host closure body: reflected arguments in, reflected results out.
pub type HostImpl = Arc<dyn Fn(Vec<HostValue>) -> Result<Vec<HostValue>, BridgeError> + Send + Sync>;

/// A host value after reflection, ready for either converter.
#[derive(Clone)]
pub enum HostValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    String(String),
    Sequence(Vec<HostValue>),
    Mapping(Vec<(HostValue, HostValue)>),
    Function(HostFn),
    Struct(StructValue),
    Dynamic(DynValue),
    Unsupported(&'static str),
}

impl HostValue {
    pub fn kind(&self) -> Kind {
        match self {
            HostValue::Bool(_) => Kind::Bool,
            HostValue::Int(_) => Kind::Int,
            HostValue::Uint(_) => Kind::Uint,
            HostValue::Float(_) => Kind::Float,
            HostValue::Complex(_, _) => Kind::Complex,
            HostValue::String(_) => Kind::String,
            HostValue::Sequence(_) => Kind::Sequence,
            HostValue::Mapping(_) => Kind::Mapping,
            HostValue::Function(_) => Kind::Function,
            HostValue::Struct(_) => Kind::Struct,
            HostValue::Dynamic(_) => Kind::Opaque,
            HostValue::Unsupported(_) => Kind::Unsupported,
        }
    }

    /// Short description for conversion errors.
    pub fn describe(&self) -> String {
        match self {
            HostValue::Int(v) => format!("integer {}", v),
            HostValue::Uint(v) => format!("unsigned integer {}", v),
            HostValue::Float(v) => format!("float {}", v),
            HostValue::Struct(s) => s.name().to_string(),
            HostValue::Unsupported(name) => name.to_string(),
            other => format!("{:?}", other.kind()).to_lowercase(),
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Bool(v) => write!(f, "Bool({})", v),
            HostValue::Int(v) => write!(f, "Int({})", v),
            HostValue::Uint(v) => write!(f, "Uint({})", v),
            HostValue::Float(v) => write!(f, "Float({})", v),
            HostValue::Complex(re, im) => write!(f, "Complex({}, {})", re, im),
            HostValue::String(v) => write!(f, "String({:?})", v),
            HostValue::Sequence(items) => f.debug_list().entries(items).finish(),
            HostValue::Mapping(pairs) => f
                .debug_map()
                .entries(pairs.iter().map(|(k, v)| (k, v)))
                .finish(),
            HostValue::Function(func) => write!(f, "Function({})", func.signature()),
            HostValue::Struct(s) => f.debug_tuple("Struct").field(s).finish(),
            HostValue::Dynamic(value) => write!(f, "{:?}", value),
            HostValue::Unsupported(name) => write!(f, "Unsupported({})", name),
        }
    }
}

#[derive(Clone)]
pub(crate) enum FnImpl {
    /// Rust closure; exposed to the engine through the live registry.
    Host(HostImpl),
    /// Engine callable; invoked through the call bridge.
    Dynamic(Arc<DynValue>),
}

/// A function value on the host side, whichever side implements it.
#[derive(Clone)]
pub struct HostFn {
    sig: Arc<Signature>,
    imp: FnImpl,
}

impl HostFn {
    pub fn new(sig: Arc<Signature>, imp: HostImpl) -> Self {
        Self {
            sig,
            imp: FnImpl::Host(imp),
        }
    }

    pub(crate) fn dynamic(sig: Arc<Signature>, callable: DynValue) -> Self {
        Self {
            sig,
            imp: FnImpl::Dynamic(Arc::new(callable)),
        }
    }

    pub fn signature(&self) -> &Arc<Signature> {
        &self.sig
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.imp, FnImpl::Dynamic(_))
    }

    pub(crate) fn imp(&self) -> &FnImpl {
        &self.imp
    }

    pub fn invoke(&self, args: Vec<HostValue>) -> Result<Vec<HostValue>, BridgeError> {
        match &self.imp {
            FnImpl::Host(f) => {
                if args.len() != self.sig.inputs.len() {
                    return Err(BridgeError::arity(
                        "host function arguments",
                        self.sig.inputs.len(),
                        args.len(),
                    ));
                }
                f(args)
            }
            FnImpl::Dynamic(callable) => call::call_dynamic(callable, &self.sig, args),
        }
    }

    /// Views this function through another signature.
    ///
    /// Engine callables accept any shape, so they simply take the new one.
    /// Host closures keep their identity and must already match in shape.
    pub fn retyped(&self, sig: Arc<Signature>) -> Result<HostFn, BridgeError> {
        match &self.imp {
            FnImpl::Dynamic(_) => Ok(HostFn {
                sig,
                imp: self.imp.clone(),
            }),
            FnImpl::Host(_) if self.sig.inputs.len() != sig.inputs.len() => Err(BridgeError::arity(
                format!("function {} used as {}", self.sig, sig),
                sig.inputs.len(),
                self.sig.inputs.len(),
            )),
            FnImpl::Host(_) if self.sig.outputs.len() != sig.outputs.len() => Err(BridgeError::arity(
                format!("function {} used as {}", self.sig, sig),
                sig.outputs.len(),
                self.sig.outputs.len(),
            )),
            FnImpl::Host(_) => Ok(self.clone()),
        }
    }

    /// True when both values are the same Rust closure, or the same engine
    /// callable.
    pub fn ptr_eq(&self, other: &HostFn) -> bool {
        match (&self.imp, &other.imp) {
            (FnImpl::Host(a), FnImpl::Host(b)) => Arc::ptr_eq(a, b),
            (FnImpl::Dynamic(a), FnImpl::Dynamic(b)) => Arc::ptr_eq(a, b) || a.same_value(b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldValue {
    pub name: &'static str,
    pub desc: TypeDesc,
    pub value: HostValue,
}

impl FieldValue {
    pub fn new(name: &'static str, desc: TypeDesc, value: HostValue) -> Self {
        Self { name, desc, value }
    }
}

/// A reflected struct: its fields by name and the methods it exposes.
#[derive(Clone)]
pub struct StructValue {
    name: &'static str,
    fields: Vec<FieldValue>,
    methods: Arc<[Method]>,
}

impl StructValue {
    pub fn new(name: &'static str, fields: Vec<FieldValue>, methods: Vec<Method>) -> Self {
        Self {
            name,
            fields,
            methods: methods.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub fn field_desc(&self, name: &str) -> Option<&TypeDesc> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.desc)
    }

    /// Replaces a field's value. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: HostValue) -> bool {
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    pub fn take(&mut self, name: &str) -> Option<HostValue> {
        let index = self.fields.iter().position(|field| field.name == name)?;
        Some(self.fields.swap_remove(index).value)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name() == name)
    }
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.name);
        for field in &self.fields {
            s.field(field.name, &field.value);
        }
        s.finish()
    }
}
