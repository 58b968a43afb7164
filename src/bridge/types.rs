use std::fmt;
use std::sync::Arc;

/// Category of a host type, the closed set the converters dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    String,
    Sequence,
    Mapping,
    Function,
    Struct,
    Opaque,
    Unsupported,
}

/// Reflected description of a host type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Bool,
    Int(u8),
    Uint(u8),
    Float(u8),
    /// Complex number whose parts are floats of this width.
    Complex(u8),
    String,
    Sequence(Box<TypeDesc>),
    Mapping(Box<TypeDesc>, Box<TypeDesc>),
    Function(Arc<Signature>),
    Struct(Arc<StructDesc>),
    /// A raw dynamic value, handed over without conversion.
    Opaque,
    Unsupported(&'static str),
}

impl TypeDesc {
    pub fn kind(&self) -> Kind {
        match self {
            TypeDesc::Bool => Kind::Bool,
            TypeDesc::Int(_) => Kind::Int,
            TypeDesc::Uint(_) => Kind::Uint,
            TypeDesc::Float(_) => Kind::Float,
            TypeDesc::Complex(_) => Kind::Complex,
            TypeDesc::String => Kind::String,
            TypeDesc::Sequence(_) => Kind::Sequence,
            TypeDesc::Mapping(_, _) => Kind::Mapping,
            TypeDesc::Function(_) => Kind::Function,
            TypeDesc::Struct(_) => Kind::Struct,
            TypeDesc::Opaque => Kind::Opaque,
            TypeDesc::Unsupported(_) => Kind::Unsupported,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Int(bits) => write!(f, "i{}", bits),
            TypeDesc::Uint(bits) => write!(f, "u{}", bits),
            TypeDesc::Float(bits) => write!(f, "f{}", bits),
            TypeDesc::Complex(bits) => write!(f, "complex<f{}>", bits),
            TypeDesc::String => write!(f, "string"),
            TypeDesc::Sequence(elem) => write!(f, "[{}]", elem),
            TypeDesc::Mapping(key, value) => write!(f, "map<{}, {}>", key, value),
            TypeDesc::Function(sig) => write!(f, "{}", sig),
            TypeDesc::Struct(desc) => write!(f, "{}", desc.name),
            TypeDesc::Opaque => write!(f, "dynamic value"),
            TypeDesc::Unsupported(name) => write!(f, "{}", name),
        }
    }
}

/// Shape of a function as seen across the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub inputs: Vec<TypeDesc>,
    pub outputs: Vec<TypeDesc>,
    /// The host side receives failures as a trailing `Result` error instead
    /// of a panic.
    pub error_slot: bool,
}

impl Signature {
    /// Same input and output counts, which is all the engine can check.
    pub fn same_shape(&self, other: &Signature) -> bool {
        self.inputs.len() == other.inputs.len() && self.outputs.len() == other.outputs.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<String> = self.inputs.iter().map(ToString::to_string).collect();
        let outputs: Vec<String> = self.outputs.iter().map(ToString::to_string).collect();
        let outputs = match outputs.len() {
            1 => outputs[0].clone(),
            _ => format!("({})", outputs.join(", ")),
        };
        if self.error_slot {
            write!(f, "fn({}) -> Result<{}>", inputs.join(", "), outputs)
        } else {
            write!(f, "fn({}) -> {}", inputs.join(", "), outputs)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: &'static str,
    pub desc: TypeDesc,
}

impl FieldDesc {
    pub fn new(name: &'static str, desc: TypeDesc) -> Self {
        Self { name, desc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDesc {
    pub name: &'static str,
    pub fields: Vec<FieldDesc>,
}

impl StructDesc {
    pub fn new(name: &'static str, fields: Vec<FieldDesc>) -> Self {
        Self { name, fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        self.fields.iter().find(|field| field.name == name)
    }
}
