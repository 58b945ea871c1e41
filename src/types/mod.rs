//! Element types and shapes shared by graph nodes and data handles.
//!
//! # Example
//! ```
//! use mind_lazy::types::{Shape, ScalarType};
//! let shape = Shape::new(ScalarType::F32, vec![2, 3]);
//! assert_eq!(shape.rank(), 2);
//! assert_eq!(shape.element_count(), 6);
//! assert_eq!(shape.to_string(), "f32[2,3]");
//! ```

pub mod value;

use std::fmt;
use std::str::FromStr;

pub use value::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    Bool,
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        ScalarType::Bool,
        ScalarType::U8,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::F32,
        ScalarType::F64,
    ];

    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::U8 => 1,
            ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::F64 => 8,
        }
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::U8 => "u8",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown element type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scalar type '{0}'")]
pub struct ParseScalarTypeError(pub String);

impl FromStr for ScalarType {
    type Err = ParseScalarTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" => Ok(ScalarType::Bool),
            "u8" | "uint8" => Ok(ScalarType::U8),
            "i32" | "int32" => Ok(ScalarType::I32),
            "i64" | "int64" | "long" => Ok(ScalarType::I64),
            "f32" | "float32" | "float" => Ok(ScalarType::F32),
            "f64" | "float64" | "double" => Ok(ScalarType::F64),
            other => Err(ParseScalarTypeError(other.to_string())),
        }
    }
}

/// Immutable description of a tensor: element type and dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    scalar_type: ScalarType,
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(scalar_type: ScalarType, dims: Vec<usize>) -> Self {
        Self { scalar_type, dims }
    }

    /// Rank-0 shape of the given element type.
    pub fn scalar(scalar_type: ScalarType) -> Self {
        Self::new(scalar_type, Vec::new())
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn byte_size(&self) -> usize {
        self.element_count() * self.scalar_type.size_in_bytes()
    }

    /// Same dims with a different element type.
    pub fn with_scalar_type(&self, scalar_type: ScalarType) -> Self {
        Self::new(scalar_type, self.dims.clone())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.scalar_type)?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}
