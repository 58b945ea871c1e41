// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Host tensors and the backend data handle contract.
//!
//! A [`DataHandle`] is a shared reference to tensor data owned by a backend.
//! It is either materialized (backed by a physical buffer) or a placeholder
//! that only becomes readable once a computation result is assigned into it.
//! [`HostTensor`] is the host-memory form used for transfers in both
//! directions; its payload is raw little-endian bytes so a round trip through
//! any backend that keeps the element type is bit-for-bit exact.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::runtime::device::BackendDevice;
use crate::runtime::types::RuntimeError;
use crate::types::{Scalar, ScalarType, Shape};

/// Whether a handle is backed by a physical buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    Materialized,
    Placeholder,
}

/// Backend-owned tensor data.
///
/// Implementations are free to keep device buffers, host copies, or queue
/// entries behind this trait. `as_any` lets a backend recover its own concrete
/// type; a handle produced by a different backend must be rejected, not
/// reinterpreted.
pub trait BackendData: fmt::Debug + Send + Sync {
    fn shape(&self) -> &Shape;

    fn device(&self) -> &BackendDevice;

    /// True once the handle is backed by a buffer.
    fn has_value(&self) -> bool;

    /// Replaces this handle's contents with `other`'s buffer. This is how a
    /// placeholder receives the output of the computation that produces it.
    fn assign(&self, other: &dyn BackendData) -> Result<(), RuntimeError>;

    fn as_any(&self) -> &dyn Any;

    fn residency(&self) -> Residency {
        if self.has_value() {
            Residency::Materialized
        } else {
            Residency::Placeholder
        }
    }
}

/// Reference-counted handle shared by the graph and the owning backend.
pub type DataHandle = Arc<dyn BackendData>;

/// Identity of the allocation behind a handle, stable for its lifetime.
pub fn handle_address(handle: &DataHandle) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

/// Rust element types that map onto a [`ScalarType`].
pub trait Element: Copy {
    const SCALAR_TYPE: ScalarType;

    fn write_le(self, out: &mut Vec<u8>);

    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! numeric_element {
    ($ty:ty, $scalar:expr) => {
        impl Element for $ty {
            const SCALAR_TYPE: ScalarType = $scalar;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

numeric_element!(u8, ScalarType::U8);
numeric_element!(i32, ScalarType::I32);
numeric_element!(i64, ScalarType::I64);
numeric_element!(f32, ScalarType::F32);
numeric_element!(f64, ScalarType::F64);

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Decoded element, wide enough to hold any supported type exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Wide {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Wide {
    fn render(self) -> String {
        match self {
            Wide::Bool(b) => b.to_string(),
            Wide::Int(v) => v.to_string(),
            Wide::Float(v) => v.to_string(),
        }
    }
}

impl From<Scalar> for Wide {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => Wide::Bool(b),
            Scalar::Int(v) => Wide::Int(v),
            Scalar::Float(v) => Wide::Float(v),
        }
    }
}

/// Host-resident tensor: element type, dims and little-endian bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct HostTensor {
    shape: Shape,
    data: Vec<u8>,
}

impl HostTensor {
    /// Wraps raw bytes; the length must match the shape's byte size.
    pub fn from_bytes(shape: Shape, data: Vec<u8>) -> Result<Self, RuntimeError> {
        if data.len() != shape.byte_size() {
            return Err(RuntimeError::shape_mismatch(
                format!("{} bytes for {shape}", shape.byte_size()),
                format!("{} bytes", data.len()),
            ));
        }
        Ok(Self { shape, data })
    }

    pub fn from_slice<T: Element>(dims: Vec<usize>, values: &[T]) -> Result<Self, RuntimeError> {
        let shape = Shape::new(T::SCALAR_TYPE, dims);
        if values.len() != shape.element_count() {
            return Err(RuntimeError::shape_mismatch(
                format!("{} elements for {shape}", shape.element_count()),
                format!("{} elements", values.len()),
            ));
        }
        let mut data = Vec::with_capacity(shape.byte_size());
        for value in values {
            value.write_le(&mut data);
        }
        Ok(Self { shape, data })
    }

    /// Rank-0 tensor holding `value` converted to `scalar_type`.
    pub fn scalar(value: Scalar, scalar_type: ScalarType) -> Result<Self, RuntimeError> {
        Self::filled(Shape::scalar(scalar_type), value)
    }

    /// Tensor of `shape` with every element set to `value`.
    pub fn filled(shape: Shape, value: Scalar) -> Result<Self, RuntimeError> {
        let mut element = Vec::with_capacity(shape.scalar_type().size_in_bytes());
        encode(Wide::from(value), shape.scalar_type(), &mut element)?;
        let data = element.repeat(shape.element_count());
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.shape.scalar_type()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn element_count(&self) -> usize {
        self.shape.element_count()
    }

    /// Typed copy of the elements; `T` must match the element type exactly.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, RuntimeError> {
        if T::SCALAR_TYPE != self.scalar_type() {
            return Err(RuntimeError::shape_mismatch(T::SCALAR_TYPE, self.scalar_type()));
        }
        let width = self.scalar_type().size_in_bytes();
        Ok(self.data.chunks_exact(width).map(T::read_le).collect())
    }

    /// Elements widened to `f64`, booleans as 0/1.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.elements()
            .map(|element| match element {
                Wide::Bool(b) => f64::from(u8::from(b)),
                Wide::Int(v) => v as f64,
                Wide::Float(v) => v,
            })
            .collect()
    }

    /// The single element of a one-element tensor.
    pub fn item(&self) -> Result<Scalar, RuntimeError> {
        if self.element_count() != 1 {
            return Err(RuntimeError::shape_mismatch(
                "a single-element tensor",
                &self.shape,
            ));
        }
        let element = self.elements().next().ok_or_else(|| {
            RuntimeError::shape_mismatch("a single-element tensor", &self.shape)
        })?;
        Ok(match element {
            Wide::Bool(b) => Scalar::Bool(b),
            Wide::Int(v) => Scalar::Int(v),
            Wide::Float(v) => Scalar::Float(v),
        })
    }

    /// Converts to another element type.
    ///
    /// Casting to the same type is an exact copy. Integer targets reject
    /// out-of-range values and non-finite floats; floating values truncate
    /// toward zero. Any value casts to `bool` as "non-zero".
    pub fn cast(&self, target: ScalarType) -> Result<HostTensor, RuntimeError> {
        if target == self.scalar_type() {
            return Ok(self.clone());
        }
        let shape = self.shape.with_scalar_type(target);
        let mut data = Vec::with_capacity(shape.byte_size());
        for element in self.elements() {
            encode(element, target, &mut data)?;
        }
        Ok(Self { shape, data })
    }

    fn elements(&self) -> impl Iterator<Item = Wide> + '_ {
        let scalar_type = self.scalar_type();
        self.data
            .chunks_exact(scalar_type.size_in_bytes())
            .map(move |bytes| decode(bytes, scalar_type))
    }
}

impl fmt::Debug for HostTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        let values: Vec<String> = self
            .elements()
            .take(PREVIEW)
            .map(Wide::render)
            .collect();
        let more = if self.element_count() > PREVIEW { ", .." } else { "" };
        write!(f, "HostTensor({} [{}{}])", self.shape, values.join(", "), more)
    }
}

fn decode(bytes: &[u8], scalar_type: ScalarType) -> Wide {
    match scalar_type {
        ScalarType::Bool => Wide::Bool(bool::read_le(bytes)),
        ScalarType::U8 => Wide::Int(i64::from(u8::read_le(bytes))),
        ScalarType::I32 => Wide::Int(i64::from(i32::read_le(bytes))),
        ScalarType::I64 => Wide::Int(i64::read_le(bytes)),
        ScalarType::F32 => Wide::Float(f64::from(f32::read_le(bytes))),
        ScalarType::F64 => Wide::Float(f64::read_le(bytes)),
    }
}

fn encode(value: Wide, target: ScalarType, out: &mut Vec<u8>) -> Result<(), RuntimeError> {
    let unrepresentable = || RuntimeError::shape_mismatch(format!("a {target} value"), value.render());
    match target {
        ScalarType::Bool => {
            let b = match value {
                Wide::Bool(b) => b,
                Wide::Int(v) => v != 0,
                Wide::Float(v) => v != 0.0,
            };
            b.write_le(out);
        }
        ScalarType::F32 => {
            let v = match value {
                Wide::Bool(b) => f32::from(u8::from(b)),
                Wide::Int(v) => v as f32,
                Wide::Float(v) => {
                    let narrowed = v as f32;
                    if v.is_finite() && narrowed.is_infinite() {
                        return Err(unrepresentable());
                    }
                    narrowed
                }
            };
            v.write_le(out);
        }
        ScalarType::F64 => {
            let v = match value {
                Wide::Bool(b) => f64::from(u8::from(b)),
                Wide::Int(v) => v as f64,
                Wide::Float(v) => v,
            };
            v.write_le(out);
        }
        ScalarType::U8 | ScalarType::I32 | ScalarType::I64 => {
            let wide = match value {
                Wide::Bool(b) => i128::from(b),
                Wide::Int(v) => i128::from(v),
                Wide::Float(v) => {
                    if !v.is_finite() {
                        return Err(unrepresentable());
                    }
                    let truncated = v.trunc();
                    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                        return Err(unrepresentable());
                    }
                    truncated as i128
                }
            };
            match target {
                ScalarType::U8 => u8::try_from(wide).map_err(|_| unrepresentable())?.write_le(out),
                ScalarType::I32 => i32::try_from(wide).map_err(|_| unrepresentable())?.write_le(out),
                _ => i64::try_from(wide).map_err(|_| unrepresentable())?.write_le(out),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::ErrorKind;

    #[test]
    fn from_slice_checks_element_count() {
        let err = HostTensor::from_slice(vec![2, 2], &[1.0f32, 2.0, 3.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn typed_access_requires_matching_type() {
        let t = HostTensor::from_slice(vec![2], &[1i32, -2]).unwrap();
        assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, -2]);
        assert!(t.to_vec::<i64>().is_err());
        assert_eq!(t.to_f64_vec(), vec![1.0, -2.0]);
    }

    #[test]
    fn scalar_tensor_item() {
        let t = HostTensor::scalar(Scalar::Float(3.5), ScalarType::F32).unwrap();
        assert_eq!(t.shape(), &Shape::scalar(ScalarType::F32));
        assert_eq!(t.item().unwrap(), Scalar::Float(3.5));
    }

    #[test]
    fn cast_to_same_type_is_exact() {
        let t = HostTensor::from_slice(vec![3], &[f32::NAN, -0.0, 1e-40]).unwrap();
        let cast = t.cast(ScalarType::F32).unwrap();
        assert_eq!(cast.as_bytes(), t.as_bytes());
    }

    #[test]
    fn cast_float_to_int_truncates() {
        let t = HostTensor::from_slice(vec![3], &[1.9f64, -2.7, 0.0]).unwrap();
        let cast = t.cast(ScalarType::I32).unwrap();
        assert_eq!(cast.to_vec::<i32>().unwrap(), vec![1, -2, 0]);
    }

    #[test]
    fn cast_rejects_unrepresentable_values() {
        let nan = HostTensor::from_slice(vec![1], &[f32::NAN]).unwrap();
        assert_eq!(nan.cast(ScalarType::I64).unwrap_err().kind(), ErrorKind::ShapeMismatch);
        let big = HostTensor::from_slice(vec![1], &[300i64]).unwrap();
        assert!(big.cast(ScalarType::U8).is_err());
        assert!(big.cast(ScalarType::I32).is_ok());
    }

    #[test]
    fn narrowing_to_f32_rejects_overflow() {
        let huge = HostTensor::from_slice(vec![2], &[1.0f64, 1e300]).unwrap();
        let err = huge.cast(ScalarType::F32).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

        let special = HostTensor::from_slice(vec![3], &[f64::INFINITY, f64::MAX / 1e300, 1e-300]).unwrap();
        let cast = special.cast(ScalarType::F32).unwrap().to_vec::<f32>().unwrap();
        assert_eq!(cast[0], f32::INFINITY);
        assert_eq!(cast[2], 0.0);
    }

    #[test]
    fn cast_to_bool_is_nonzero() {
        let t = HostTensor::from_slice(vec![3], &[0i64, 5, -1]).unwrap();
        let cast = t.cast(ScalarType::Bool).unwrap();
        assert_eq!(cast.to_vec::<bool>().unwrap(), vec![false, true, true]);
    }

    #[test]
    fn filled_repeats_element() {
        let t = HostTensor::filled(Shape::new(ScalarType::I64, vec![2, 2]), Scalar::Int(7)).unwrap();
        assert_eq!(t.to_vec::<i64>().unwrap(), vec![7; 4]);
    }

    #[test]
    fn debug_preview_is_bounded() {
        let t = HostTensor::from_slice(vec![10], &[1u8; 10]).unwrap();
        let rendered = format!("{t:?}");
        assert!(rendered.starts_with("HostTensor(u8[10]"));
        assert!(rendered.ends_with(", ..])"));
    }
}
