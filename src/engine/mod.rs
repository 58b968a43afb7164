//! The narrow interface between the bridge and an embedded engine.
//!
//! The bridge never looks inside engine memory. Everything it needs goes
//! through [`Engine`] (host to engine) and [`HostHooks`] (engine to host).
//!
//! ## Ownership protocol
//!
//! A [`RawValue`] names one engine-side reference. Every operation documents
//! whether the references it hands out are *owned* (the receiver must
//! eventually issue exactly one [`Engine::dec_ref`]) or *borrowed* (valid
//! only for the duration of the callback that received it).
//!
//! - Constructors, `evaluate`, `call` and `call_method` return owned
//!   references, including the error value on failure.
//! - `call`, `call_method`, `new_sequence` and `new_mapping` consume the
//!   references passed to them.
//! - Walk callbacks and hook arguments receive borrowed references.
//! - Hook results are owned by the engine once returned.
//!
//! ## Re-entrancy
//!
//! All methods take `&self`. An engine must not hold an internal borrow while
//! it runs a walk callback or a [`HostHooks`] method, because the host side
//! may call straight back into it.

use std::fmt;
use std::sync::Arc;

mod value_kind;

pub use value_kind::ValueKind;

/// Id of a host object exposed to the engine through the live registry.
pub type ProxyId = u64;

/// Engine-side reference handed across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawValue(u32);

impl RawValue {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the engine slot index backing this reference.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failure reported by a host hook.
#[derive(Debug)]
pub enum HookError {
    /// Raise this (owned) engine value as the exception.
    Raise(RawValue),
    /// Raise a string exception with this text.
    Message(String),
}

/// Operations the bridge needs from an embedded engine.
pub trait Engine {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Prepares the engine for use. Failure is unrecoverable for the caller.
    fn init(&self) -> Result<(), String> {
        Ok(())
    }

    /// Releases engine-global state ahead of drop.
    fn fini(&self) {}

    /// Installs the callbacks used by host proxies. Called once, before `init`.
    fn install_hooks(&self, hooks: Arc<dyn HostHooks>);

    /// Compiles and runs `code`, producing exactly `outputs` results.
    fn evaluate(&self, code: &str, outputs: usize) -> Result<Vec<RawValue>, RawValue>;

    /// Calls `callable` with `args`, producing exactly `outputs` results.
    ///
    /// `outputs == 0` runs in void context, `1` in scalar context and more in
    /// list context. Missing results are padded with undef.
    fn call(
        &self,
        callable: RawValue,
        args: Vec<RawValue>,
        outputs: usize,
    ) -> Result<Vec<RawValue>, RawValue>;

    /// Calls method `name` on `invocant`. Same conventions as [`Engine::call`].
    fn call_method(
        &self,
        invocant: RawValue,
        name: &str,
        args: Vec<RawValue>,
        outputs: usize,
    ) -> Result<Vec<RawValue>, RawValue>;

    fn inc_ref(&self, value: RawValue);
    fn dec_ref(&self, value: RawValue);

    /// Number of engine values that are still referenced.
    fn count_live(&self) -> usize;

    fn kind(&self, value: RawValue) -> ValueKind;

    /// Feeds every element of a sequence to `each`. Returns `false` when the
    /// value is not a sequence.
    fn walk_sequence(&self, value: RawValue, each: &mut dyn FnMut(RawValue)) -> bool;

    /// Feeds every key/value pair of a mapping to `each`. Returns `false`
    /// when the value is not a mapping.
    fn walk_mapping(&self, value: RawValue, each: &mut dyn FnMut(RawValue, RawValue)) -> bool;

    fn new_undef(&self) -> RawValue;
    fn new_bool(&self, value: bool) -> RawValue;
    fn new_int(&self, value: i64) -> RawValue;
    fn new_uint(&self, value: u64) -> RawValue;
    fn new_float(&self, value: f64) -> RawValue;
    fn new_string(&self, value: &str) -> RawValue;
    fn new_sequence(&self, items: Vec<RawValue>) -> RawValue;
    fn new_mapping(&self, pairs: Vec<(RawValue, RawValue)>) -> RawValue;

    /// Builds a callable that forwards to [`HostHooks::invoke`] with `id`.
    fn new_callable_proxy(&self, id: ProxyId, inputs: usize, outputs: usize) -> RawValue;

    /// Builds an object whose `fields` and methods resolve through
    /// [`HostHooks`] with `id`. The engine reports one [`HostHooks::release`]
    /// per field plus one for the object itself.
    fn new_object_proxy(&self, id: ProxyId, fields: &[String]) -> RawValue;

    /// Returns the registry id carried by a proxy value.
    fn proxy_id(&self, value: RawValue) -> Option<ProxyId>;

    fn get_bool(&self, value: RawValue) -> bool;
    fn get_int(&self, value: RawValue) -> i64;
    fn get_uint(&self, value: RawValue) -> u64;
    fn get_float(&self, value: RawValue) -> f64;
    fn get_string(&self, value: RawValue) -> String;
}

/// Callbacks from the engine into the host.
///
/// Arguments are borrowed; returned values are owned by the engine.
pub trait HostHooks: Send + Sync {
    fn invoke(
        &self,
        id: ProxyId,
        args: &[RawValue],
        outputs: usize,
    ) -> Result<Vec<RawValue>, HookError>;

    fn get_field(&self, id: ProxyId, name: &str) -> Result<RawValue, HookError>;

    fn set_field(&self, id: ProxyId, name: &str, value: RawValue) -> Result<(), HookError>;

    fn call_method(
        &self,
        id: ProxyId,
        name: &str,
        args: &[RawValue],
        outputs: usize,
    ) -> Result<Vec<RawValue>, HookError>;

    /// The engine dropped one reference to the proxy identified by `id`.
    fn release(&self, id: ProxyId);
}
