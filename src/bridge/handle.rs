use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::call;
use super::interpreter::Shared;
use super::to_dynamic;
use super::tuple::Args;
use crate::engine::{RawValue, ValueKind};
use crate::error::BridgeError;

/// Owned handle to one engine value.
///
/// The handle holds exactly one engine reference and gives it back once,
/// either through [`DynValue::release`] or on drop, whichever comes first.
/// It does not keep the interpreter alive; using it after the interpreter is
/// gone panics.
pub struct DynValue {
    shared: Weak<Shared>,
    raw: RawValue,
    released: AtomicBool,
}

impl DynValue {
    /// Takes over a reference the caller already owns.
    pub(crate) fn adopt(shared: &Arc<Shared>, raw: RawValue) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            raw,
            released: AtomicBool::new(false),
        }
    }

    /// Takes a new reference to a value the caller only borrows.
    pub(crate) fn acquire(shared: &Arc<Shared>, raw: RawValue) -> Self {
        shared.engine_op(|engine| engine.inc_ref(raw));
        Self::adopt(shared, raw)
    }

    pub(crate) fn raw(&self) -> RawValue {
        self.raw
    }

    pub(crate) fn interpreter(&self) -> Arc<Shared> {
        assert!(!self.is_released(), "dynamic value {} used after release", self.raw);
        match self.shared.upgrade() {
            Some(shared) => shared,
            None => panic!("dynamic value {} used after its interpreter was dropped", self.raw),
        }
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        std::ptr::eq(self.shared.as_ptr(), Arc::as_ptr(shared))
    }

    /// Same engine value in the same interpreter.
    pub(crate) fn same_value(&self, other: &DynValue) -> bool {
        self.raw == other.raw && Weak::ptr_eq(&self.shared, &other.shared)
    }

    pub fn as_bool(&self) -> bool {
        let raw = self.raw;
        self.interpreter().engine_op(|e| e.get_bool(raw))
    }

    pub fn as_int(&self) -> i64 {
        let raw = self.raw;
        self.interpreter().engine_op(|e| e.get_int(raw))
    }

    pub fn as_uint(&self) -> u64 {
        let raw = self.raw;
        self.interpreter().engine_op(|e| e.get_uint(raw))
    }

    pub fn as_float(&self) -> f64 {
        let raw = self.raw;
        self.interpreter().engine_op(|e| e.get_float(raw))
    }

    pub fn as_string(&self) -> String {
        let raw = self.raw;
        self.interpreter().engine_op(|e| e.get_string(raw))
    }

    /// The value read as an error condition; `None` when it is undef.
    pub fn as_error(&self) -> Option<DynError> {
        if self.is_undef() {
            return None;
        }
        Some(DynError::with_value(self.as_string(), self.clone()))
    }

    pub fn kind(&self) -> ValueKind {
        let raw = self.raw;
        self.interpreter().engine_op(|e| e.kind(raw))
    }

    pub fn is_undef(&self) -> bool {
        self.kind() == ValueKind::Undef
    }

    /// Calls method `name` with this value as invocant, in scalar context.
    pub fn call<A: Args>(&self, name: &str, args: A) -> Result<DynValue, BridgeError> {
        let shared = self.interpreter();
        let raws = to_dynamic::to_dynamic_all(&shared, &args.into_hosts())?;
        let raw = self.raw;
        let results = shared.engine_op(|engine| {
            engine
                .call_method(raw, name, raws, 1)
                .map_err(|err| call::raised(&shared, engine, err))
        })?;
        match results.into_iter().next() {
            Some(result) => Ok(DynValue::adopt(&shared, result)),
            None => Err(BridgeError::arity(format!("method {}", name), 1, 0)),
        }
    }

    /// Gives the engine reference back. Later calls do nothing.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.dec_ref(self.raw);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Clone for DynValue {
    fn clone(&self) -> Self {
        match self.shared.upgrade() {
            Some(shared) if !self.is_released() => DynValue::acquire(&shared, self.raw),
            _ => Self {
                shared: self.shared.clone(),
                raw: self.raw,
                released: AtomicBool::new(true),
            },
        }
    }
}

impl Drop for DynValue {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_released() {
            write!(f, "DynValue({}, released)", self.raw)
        } else {
            write!(f, "DynValue({})", self.raw)
        }
    }
}

/// An exception raised by the engine.
///
/// Displays as the engine's own error text, so `die("tippy\n")` reads back
/// as exactly `tippy\n`.
#[derive(Clone)]
pub struct DynError {
    message: String,
    value: Option<DynValue>,
}

impl DynError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: None,
        }
    }

    pub(crate) fn with_value(message: String, value: DynValue) -> Self {
        Self {
            message,
            value: Some(value),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The raised engine value, when there is one.
    pub fn value(&self) -> Option<&DynValue> {
        self.value.as_ref()
    }
}

impl fmt::Display for DynError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for DynError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynError")
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for DynError {}
