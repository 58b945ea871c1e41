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

//! Host kernels used by the interpreter backend.

use crate::ir::BinOp;
use crate::runtime::data::{Element, HostTensor};
use crate::runtime::types::RuntimeError;
use crate::types::{Scalar, ScalarType, Shape};

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("expected {expected}, found {found}")]
    Shape { expected: String, found: String },
    #[error("arithmetic error: {0}")]
    Math(String),
}

impl From<ExecError> for RuntimeError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Shape { expected, found } => RuntimeError::ShapeMismatch { expected, found },
            other => RuntimeError::execution(other.to_string()),
        }
    }
}

type R<T> = Result<T, ExecError>;

fn shape_error(expected: impl ToString, found: impl ToString) -> ExecError {
    ExecError::Shape {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Tensor of `shape` filled with `value`.
pub fn exec_fill(shape: &Shape, value: Scalar) -> R<HostTensor> {
    HostTensor::filled(shape.clone(), value).map_err(|err| ExecError::Unsupported(err.to_string()))
}

/// Whether `op` is defined for `scalar_type`.
pub fn binary_supported(op: BinOp, scalar_type: ScalarType) -> bool {
    !(scalar_type == ScalarType::Bool && matches!(op, BinOp::Sub | BinOp::Div))
}

/// Elementwise `lhs op rhs` over equally shaped tensors.
///
/// Integer arithmetic wraps and integer division truncates toward zero;
/// dividing an integer by zero fails. Booleans support `add` (or) and
/// `mul` (and).
pub fn exec_binary(op: BinOp, lhs: &HostTensor, rhs: &HostTensor) -> R<HostTensor> {
    if lhs.shape() != rhs.shape() {
        return Err(shape_error(lhs.shape(), rhs.shape()));
    }
    let scalar_type = lhs.scalar_type();
    if !binary_supported(op, scalar_type) {
        return Err(ExecError::Unsupported(format!("{} on {scalar_type}", op.kind())));
    }
    match scalar_type {
        ScalarType::F32 => zip_map(lhs, rhs, |a: f32, b: f32| Ok(float_op(op, a, b))),
        ScalarType::F64 => zip_map(lhs, rhs, |a: f64, b: f64| Ok(float_op(op, a, b))),
        ScalarType::U8 => zip_map(lhs, rhs, |a: u8, b: u8| match op {
            BinOp::Add => Ok(a.wrapping_add(b)),
            BinOp::Sub => Ok(a.wrapping_sub(b)),
            BinOp::Mul => Ok(a.wrapping_mul(b)),
            BinOp::Div => a.checked_div(b).ok_or_else(division_by_zero),
        }),
        ScalarType::I32 => zip_map(lhs, rhs, |a: i32, b: i32| match op {
            BinOp::Add => Ok(a.wrapping_add(b)),
            BinOp::Sub => Ok(a.wrapping_sub(b)),
            BinOp::Mul => Ok(a.wrapping_mul(b)),
            BinOp::Div => int_div(b == 0, || a.wrapping_div(b)),
        }),
        ScalarType::I64 => zip_map(lhs, rhs, |a: i64, b: i64| match op {
            BinOp::Add => Ok(a.wrapping_add(b)),
            BinOp::Sub => Ok(a.wrapping_sub(b)),
            BinOp::Mul => Ok(a.wrapping_mul(b)),
            BinOp::Div => int_div(b == 0, || a.wrapping_div(b)),
        }),
        ScalarType::Bool => zip_map(lhs, rhs, |a: bool, b: bool| match op {
            BinOp::Add => Ok(a || b),
            _ => Ok(a && b),
        }),
    }
}

fn float_op<T>(op: BinOp, a: T, b: T) -> T
where
    T: std::ops::Add<Output = T> + std::ops::Sub<Output = T> + std::ops::Mul<Output = T> + std::ops::Div<Output = T>,
{
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
    }
}

fn int_div<T>(zero_divisor: bool, div: impl FnOnce() -> T) -> R<T> {
    if zero_divisor {
        Err(division_by_zero())
    } else {
        Ok(div())
    }
}

fn division_by_zero() -> ExecError {
    ExecError::Math("integer division by zero".to_string())
}

fn zip_map<T: Element>(lhs: &HostTensor, rhs: &HostTensor, f: impl Fn(T, T) -> R<T>) -> R<HostTensor> {
    let a = lhs.to_vec::<T>().map_err(|err| shape_error(T::SCALAR_TYPE, err))?;
    let b = rhs.to_vec::<T>().map_err(|err| shape_error(T::SCALAR_TYPE, err))?;
    let out = a
        .into_iter()
        .zip(b)
        .map(|(x, y)| f(x, y))
        .collect::<R<Vec<T>>>()?;
    HostTensor::from_slice(lhs.dims().to_vec(), &out).map_err(|err| shape_error(lhs.shape(), err))
}
