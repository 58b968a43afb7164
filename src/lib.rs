//! Embeds the Flux script engine in a Rust host and moves typed values
//! across the boundary in both directions.
//!
//! ```
//! use flux_embed::Interpreter;
//!
//! let interp = Interpreter::new();
//! let (q, r): (i64, i64) = interp.eval("(17 / 5, 17 % 5)").unwrap();
//! assert_eq!((q, r), (3, 2));
//! ```
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod script;

pub use bridge::{
    Args, BridgeStats, DynError, DynValue, FieldDesc, FieldValue, Func, HostFn, HostValue,
    Interpreter, Kind, Method, Outputs, Reflect, Returns, Signature, StructDesc, StructValue,
    TypeDesc, escalate,
};
pub use config::InterpreterOptions;
pub use error::{BridgeError, ErrorKind};
