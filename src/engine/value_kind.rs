use std::fmt;

/// Runtime shape of an engine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undef,
    Bool,
    Int,
    Uint,
    Float,
    String,
    Complex,
    Sequence,
    Mapping,
    Code,
    Object,
}

impl ValueKind {
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueKind::Undef
                | ValueKind::Bool
                | ValueKind::Int
                | ValueKind::Uint
                | ValueKind::Float
                | ValueKind::String
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Undef => "undef",
            ValueKind::Bool => "boolean",
            ValueKind::Int => "integer",
            ValueKind::Uint => "unsigned integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Complex => "complex",
            ValueKind::Sequence => "array",
            ValueKind::Mapping => "hash",
            ValueKind::Code => "code",
            ValueKind::Object => "object",
        };
        write!(f, "{}", s)
    }
}
