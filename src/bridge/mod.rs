//! Typed conversion between host values and engine values.
//!
//! # Ownership
//! Every engine reference held on the host side is owned by exactly one
//! [`DynValue`] or by a registry entry. Borrowed references handed to hooks
//! never outlive the hook call; converters that need to keep one take a
//! fresh reference.
//!
//! # Locking
//! One gate per interpreter serializes engine access. Host code called back
//! from the engine runs with the gate suspended, so it may call into the
//! engine again from any thread.
mod call;
mod complex;
mod from_dynamic;
mod to_dynamic;

pub mod func;
pub mod gate;
pub mod handle;
pub mod host_value;
pub mod interpreter;
pub mod object;
pub mod reflect;
pub mod registry;
pub mod tuple;
pub mod types;

pub use func::{Func, HostCallable};
pub use handle::{DynError, DynValue};
pub use host_value::{FieldValue, HostFn, HostImpl, HostValue, StructValue};
pub use interpreter::{BridgeStats, Interpreter};
pub use object::{HostMethod, HostObject, Method};
pub use reflect::Reflect;
pub use tuple::{Args, Outputs, Returns, escalate};
pub use types::{FieldDesc, Kind, Signature, StructDesc, TypeDesc};
