//! Schema model.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Primitive attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Blob,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex32,
    Complex64,
    Timestamp,
    Xml,
    Rstring,
    Ustring,
}

impl PrimitiveType {
    pub const ALL: [Self; 18] = [
        Self::Boolean,
        Self::Blob,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Float32,
        Self::Float64,
        Self::Complex32,
        Self::Complex64,
        Self::Timestamp,
        Self::Xml,
        Self::Rstring,
        Self::Ustring,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Blob => "blob",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex32 => "complex32",
            Self::Complex64 => "complex64",
            Self::Timestamp => "timestamp",
            Self::Xml => "xml",
            Self::Rstring => "rstring",
            Self::Ustring => "ustring",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Type of a single tuple attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Primitive(PrimitiveType),
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>, Box<AttributeType>),
    Tuple(Schema),
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::List(elem) => write!(f, "list<{elem}>"),
            Self::Set(elem) => write!(f, "set<{elem}>"),
            Self::Map(key, value) => write!(f, "map<{key}, {value}>"),
            Self::Tuple(schema) => write!(f, "{schema}"),
        }
    }
}

/// Named attribute within a tuple schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
}

/// A tuple schema: ordered, uniquely named attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    /// Parse a schema string such as `tuple<int32 a, int64 b>`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        super::parser::parse_schema(input)
    }

    pub(crate) const fn from_attributes(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("tuple<")?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", attr.ty, attr.name)?;
        }
        f.write_str(">")
    }
}

impl FromStr for Schema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
