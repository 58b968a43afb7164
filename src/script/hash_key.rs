use std::fmt;

use super::value::Value;

/// Key of a script hash. Everything else is stringified on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl HashKey {
    pub fn from_value(value: &Value) -> HashKey {
        match value {
            Value::Int(v) => HashKey::Integer(*v),
            Value::Uint(v) => match i64::try_from(*v) {
                Ok(v) => HashKey::Integer(v),
                Err(_) => HashKey::String(v.to_string()),
            },
            Value::Bool(v) => HashKey::Boolean(*v),
            other => HashKey::String(other.to_display()),
        }
    }

    /// Key as the plain string a member access would use.
    pub fn as_name(&self) -> String {
        match self {
            HashKey::Integer(v) => v.to_string(),
            HashKey::Boolean(true) => "1".to_string(),
            HashKey::Boolean(false) => String::new(),
            HashKey::String(v) => v.clone(),
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Integer(v) => write!(f, "{}", v),
            HashKey::Boolean(v) => write!(f, "{}", v),
            HashKey::String(v) => write!(f, "\"{}\"", v),
        }
    }
}
