//! Element types and tensor shapes shared by the host graph and the IR.

use std::fmt;
use std::str::FromStr;

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum DataType {
    Float,
    Double,
    Int64,
    Int32,
    Int16,
    UInt16,
    Int8,
}

impl DataType {
    pub const ALL: [DataType; 7] = [
        Self::Float,
        Self::Double,
        Self::Int64,
        Self::Int32,
        Self::Int16,
        Self::UInt16,
        Self::Int8,
    ];

    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::Double | Self::Int64 => 8,
            Self::Float | Self::Int32 => 4,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int8 => 1,
        }
    }

    /// Stable lowercase name, used by the text dumps and the wire format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Double => "double",
            Self::Int64 => "int64",
            Self::Int32 => "int32",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int8 => "int8",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" | "f32" => Ok(Self::Float),
            "double" | "f64" => Ok(Self::Double),
            "int64" | "i64" => Ok(Self::Int64),
            "int32" | "i32" => Ok(Self::Int32),
            "int16" | "i16" => Ok(Self::Int16),
            "uint16" | "u16" => Ok(Self::UInt16),
            "int8" | "i8" => Ok(Self::Int8),
            _ => Err(format!("unknown data type '{s}'")),
        }
    }
}

/// Dimensions of a host tensor.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct TensorShape {
    pub dims: Vec<usize>,
}

impl TensorShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of all dimensions (1 for a scalar), saturating at
    /// `usize::MAX`.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().fold(1, |n, &d| n.saturating_mul(d))
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("]")
    }
}

/// Result type of an IR instruction: element type plus dimensions.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Shape {
    pub dtype: DataType,
    pub dims: Vec<usize>,
}

impl Shape {
    pub fn new(dtype: DataType, dims: impl Into<Vec<usize>>) -> Self {
        Self {
            dtype,
            dims: dims.into(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().fold(1, |n, &d| n.saturating_mul(d))
    }

    /// Bytes needed to hold one dense value of this shape.
    pub fn byte_size(&self) -> usize {
        self.num_elements().saturating_mul(self.dtype.size_in_bytes())
    }

    pub fn tensor_shape(&self) -> TensorShape {
        TensorShape::new(self.dims.clone())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dtype, TensorShape::new(self.dims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_widths() {
        assert_eq!(DataType::Float.size_in_bytes(), 4);
        assert_eq!(DataType::Double.size_in_bytes(), 8);
        assert_eq!(DataType::UInt16.size_in_bytes(), 2);
        assert_eq!(DataType::Int8.size_in_bytes(), 1);
    }

    #[test]
    fn data_type_names_parse_back() {
        for dt in DataType::ALL {
            assert_eq!(dt.as_str().parse::<DataType>(), Ok(dt));
        }
        assert_eq!("f32".parse::<DataType>(), Ok(DataType::Float));
        assert!("complex64".parse::<DataType>().is_err());
    }

    #[test]
    fn shape_sizes() {
        let s = Shape::new(DataType::Float, vec![1, 3, 4, 4]);
        assert_eq!(s.rank(), 4);
        assert_eq!(s.num_elements(), 48);
        assert_eq!(s.byte_size(), 192);
        assert_eq!(format!("{s}"), "float[1, 3, 4, 4]");
    }

    #[test]
    fn scalar_shape_has_one_element() {
        assert_eq!(TensorShape::default().num_elements(), 1);
        assert_eq!(format!("{}", TensorShape::default()), "[]");
    }
}
