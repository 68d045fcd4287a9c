//! Typed node attributes.

use crate::types::{DataType, TensorShape};

/// A dense host tensor with raw little-endian element bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorValue {
    pub dtype: DataType,
    pub shape: TensorShape,
    pub content: Vec<u8>,
}

impl TensorValue {
    /// A zero-filled tensor.
    pub fn zeros(dtype: DataType, shape: TensorShape) -> Self {
        let len = shape.num_elements() * dtype.size_in_bytes();
        Self {
            dtype,
            shape,
            content: vec![0; len],
        }
    }

    /// A `float` tensor built from host values.
    pub fn from_f32(shape: TensorShape, values: &[f32]) -> Self {
        Self {
            dtype: DataType::Float,
            shape,
            content: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Returns `true` if the content length matches dtype and shape.
    pub fn is_consistent(&self) -> bool {
        self.content.len() == self.shape.num_elements().saturating_mul(self.dtype.size_in_bytes())
    }
}

/// An ordered, named attribute list (the payload of a function attribute).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameAttrList {
    pub name: String,
    pub attrs: Vec<(String, AttrValue)>,
}

impl NameAttrList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    /// Appends an attribute, keeping insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: AttrValue) {
        self.attrs.push((key.into(), value));
    }

    /// First attribute named `key`.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A single attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    Str(String),
    Type(DataType),
    Shape(TensorShape),
    Tensor(TensorValue),
    Func(NameAttrList),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strs(Vec<String>),
    Types(Vec<DataType>),
    Funcs(Vec<NameAttrList>),
}

impl AttrValue {
    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Type(_) => "type",
            Self::Shape(_) => "shape",
            Self::Tensor(_) => "tensor",
            Self::Func(_) => "func",
            Self::Ints(_) => "list(int)",
            Self::Floats(_) => "list(float)",
            Self::Strs(_) => "list(string)",
            Self::Types(_) => "list(type)",
            Self::Funcs(_) => "list(func)",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<DataType> {
        match self {
            Self::Type(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Self::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            Self::Strs(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&TensorShape> {
        match self {
            Self::Shape(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorValue> {
        match self {
            Self::Tensor(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&NameAttrList> {
        match self {
            Self::Func(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_funcs(&self) -> Option<&[NameAttrList]> {
        match self {
            Self::Funcs(v) => Some(v),
            _ => None,
        }
    }
}
