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

//! Backend-opaque computations.
//!
//! A computation is produced by [`LoweringContext::build`] in the uncompiled
//! state, turned into its compiled form by [`Backend::compile`], and may then
//! be executed any number of times with different argument bindings. It is
//! never mutated after construction.
//!
//! [`LoweringContext::build`]: crate::runtime::lowering::LoweringContext::build
//! [`Backend::compile`]: crate::runtime::backend::Backend::compile

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::runtime::data::DataHandle;
use crate::runtime::device::BackendDevice;
use crate::runtime::types::RuntimeError;
use crate::types::Shape;

pub trait Computation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Device the computation was lowered for.
    fn device(&self) -> &BackendDevice;

    /// Declared inputs, in binding order.
    fn parameter_shapes(&self) -> &[Shape];

    /// Declared outputs, in result order.
    fn result_shapes(&self) -> &[Shape];

    fn is_compiled(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

pub type ComputationRef = Arc<dyn Computation>;

/// Positional binding check shared by backends before execution.
///
/// The argument count must equal the declared parameter count, every argument
/// must carry the declared shape, and no argument may be an unproduced
/// placeholder.
pub fn check_arguments(computation: &dyn Computation, arguments: &[DataHandle]) -> Result<(), RuntimeError> {
    let params = computation.parameter_shapes();
    if arguments.len() != params.len() {
        return Err(RuntimeError::execution(format!(
            "computation '{}' expects {} arguments, got {}",
            computation.name(),
            params.len(),
            arguments.len()
        )));
    }
    for (position, (argument, expected)) in arguments.iter().zip(params).enumerate() {
        if argument.shape() != expected {
            return Err(RuntimeError::shape_mismatch(
                format!("{expected} for argument {position}"),
                argument.shape(),
            ));
        }
        if !argument.has_value() {
            return Err(RuntimeError::UnmaterializedData {
                shape: argument.shape().to_string(),
                device: argument.device().to_string(),
            });
        }
    }
    Ok(())
}
