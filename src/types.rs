use std::fmt;

/// Declared type of a result column, as described by the layer descriptor.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeType {
    String,
    Integer,
    Double,
    Geometry,
    Geography,
    /// A type the cursor cannot read. Carries the declared type name.
    Unknown(String),
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Integer => write!(f, "Integer"),
            Self::Double => write!(f, "Double"),
            Self::Geometry => write!(f, "Geometry"),
            Self::Geography => write!(f, "Geography"),
            Self::Unknown(declared) => write!(f, "Unknown({declared})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub attribute_type: AttributeType,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

/// Ordered description of the columns a query returns.
///
/// The order of `descriptors` must match the column order of the result set.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerDescriptor {
    pub descriptors: Vec<AttributeDescriptor>,
    pub encoding: String,
}

impl LayerDescriptor {
    pub fn new(encoding: impl Into<String>) -> Self {
        Self {
            descriptors: Vec::new(),
            encoding: encoding.into(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.descriptors
            .push(AttributeDescriptor::new(name, attribute_type));
        self
    }
}

/// Owned scalar attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Double(f64),
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
        }
    }
}
