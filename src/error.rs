use std::fmt;

use thiserror::Error;

use crate::bridge::DynError;
use crate::engine::ProxyId;

/// Broad failure category, stable across error payload changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedType,
    DynamicException,
    ArityMismatch,
    InvalidConversion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnsupportedType => "unsupported type",
            ErrorKind::DynamicException => "dynamic exception",
            ErrorKind::ArityMismatch => "arity mismatch",
            ErrorKind::InvalidConversion => "invalid conversion",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host type has no dynamic counterpart (channels, raw pointers).
    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    /// The engine raised an exception. Displays as the exception text.
    #[error("{0}")]
    Dynamic(DynError),

    #[error("{context}: expected {expected} value(s), found {found}")]
    ArityMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot convert {found} to {expected}")]
    InvalidConversion { expected: String, found: String },

    #[error("{type_name} has no field or method `{member}`")]
    MissingMember { type_name: String, member: String },

    /// A proxy outlived the registry entry it pointed at.
    #[error("host object #{0} is no longer registered")]
    StaleProxy(ProxyId),
}

impl BridgeError {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        BridgeError::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    pub fn invalid(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        BridgeError::InvalidConversion {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn arity(context: impl Into<String>, expected: usize, found: usize) -> Self {
        BridgeError::ArityMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    pub fn missing_member(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        BridgeError::MissingMember {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            BridgeError::Dynamic(_) => ErrorKind::DynamicException,
            BridgeError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            BridgeError::InvalidConversion { .. }
            | BridgeError::MissingMember { .. }
            | BridgeError::StaleProxy(_) => ErrorKind::InvalidConversion,
        }
    }

    /// Whether the error may be handed to an error slot instead of aborting
    /// the call. Type and arity errors are programming mistakes and are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DynamicException | ErrorKind::InvalidConversion
        )
    }

    /// The engine exception carried by this error, if any.
    pub fn as_dynamic(&self) -> Option<&DynError> {
        match self {
            BridgeError::Dynamic(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DynError> for BridgeError {
    fn from(err: DynError) -> Self {
        BridgeError::Dynamic(err)
    }
}
