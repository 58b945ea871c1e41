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

//! Straight-line programs executed by the interpreter backend.
//!
//! Every step produces exactly one value, addressed by the step's index.

use std::any::Any;
use std::fmt::Write;
use std::sync::Arc;

use crate::exec::cpu::{binary_supported, exec_binary, exec_fill, ExecError};
use crate::ir::BinOp;
use crate::runtime::computation::Computation;
use crate::runtime::data::HostTensor;
use crate::runtime::device::BackendDevice;
use crate::types::{Scalar, Shape};

#[derive(Debug, Clone)]
pub enum Step {
    /// Positional argument `slot`.
    Parameter { slot: usize, shape: Shape },
    /// Scalar broadcast to `shape`.
    Constant { value: Scalar, shape: Shape },
    /// Value computed at compile time.
    Literal { tensor: Arc<HostTensor> },
    Binary { op: BinOp, lhs: usize, rhs: usize, shape: Shape },
}

impl Step {
    pub fn shape(&self) -> &Shape {
        match self {
            Step::Parameter { shape, .. } | Step::Constant { shape, .. } | Step::Binary { shape, .. } => shape,
            Step::Literal { tensor } => tensor.shape(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub steps: Vec<Step>,
    pub results: Vec<usize>,
}

impl Program {
    /// Type and shape check; the message names the offending step.
    pub fn validate(&self, parameter_count: usize) -> Result<(), String> {
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::Parameter { slot, .. } => {
                    if *slot >= parameter_count {
                        return Err(format!("step {index} reads parameter {slot} of {parameter_count}"));
                    }
                }
                Step::Constant { value, shape } => {
                    HostTensor::scalar(*value, shape.scalar_type())
                        .map_err(|err| format!("step {index}: constant {value} does not fit {shape}: {err}"))?;
                }
                Step::Literal { .. } => {}
                Step::Binary { op, lhs, rhs, shape } => {
                    let (lhs_shape, rhs_shape) = match (self.steps.get(*lhs), self.steps.get(*rhs)) {
                        (Some(l), Some(r)) if *lhs < index && *rhs < index => (l.shape(), r.shape()),
                        _ => return Err(format!("step {index} reads a value that is not yet defined")),
                    };
                    if lhs_shape != rhs_shape || lhs_shape != shape {
                        return Err(format!(
                            "step {index}: {} operands {lhs_shape} and {rhs_shape} do not match result {shape}",
                            op.kind()
                        ));
                    }
                    if !binary_supported(*op, shape.scalar_type()) {
                        return Err(format!("step {index}: {} is not defined for {}", op.kind(), shape.scalar_type()));
                    }
                }
            }
        }
        if let Some(bad) = self.results.iter().find(|r| **r >= self.steps.len()) {
            return Err(format!("result refers to undefined step {bad}"));
        }
        Ok(())
    }

    /// Replaces constants, and binary steps over constants, with literals.
    ///
    /// A step whose evaluation fails is left in place so the failure is
    /// reported when the program runs.
    pub fn fold_constants(&mut self) -> usize {
        let mut folded = 0;
        for index in 0..self.steps.len() {
            let tensor = match &self.steps[index] {
                Step::Constant { value, shape } => exec_fill(shape, *value).ok(),
                Step::Binary { op, lhs, rhs, .. } => match (&self.steps[*lhs], &self.steps[*rhs]) {
                    (Step::Literal { tensor: a }, Step::Literal { tensor: b }) => exec_binary(*op, a, b).ok(),
                    _ => None,
                },
                _ => None,
            };
            if let Some(tensor) = tensor {
                self.steps[index] = Step::Literal { tensor: Arc::new(tensor) };
                folded += 1;
            }
        }
        folded
    }

    pub fn run(&self, arguments: &[Arc<HostTensor>]) -> Result<Vec<HostTensor>, ExecError> {
        let mut values: Vec<Arc<HostTensor>> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let value = match step {
                Step::Parameter { slot, .. } => arguments
                    .get(*slot)
                    .cloned()
                    .ok_or_else(|| ExecError::Unsupported(format!("missing argument {slot}")))?,
                Step::Constant { value, shape } => Arc::new(exec_fill(shape, *value)?),
                Step::Literal { tensor } => Arc::clone(tensor),
                Step::Binary { op, lhs, rhs, .. } => Arc::new(exec_binary(*op, &values[*lhs], &values[*rhs])?),
            };
            values.push(value);
        }
        Ok(self.results.iter().map(|r| values[*r].as_ref().clone()).collect())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, step) in self.steps.iter().enumerate() {
            let line = match step {
                Step::Parameter { slot, shape } => format!("%{index} = parameter({slot}) : {shape}"),
                Step::Constant { value, shape } => format!("%{index} = constant({value}) : {shape}"),
                Step::Literal { tensor } => format!("%{index} = literal {tensor:?}"),
                Step::Binary { op, lhs, rhs, shape } => {
                    format!("%{index} = {}(%{lhs}, %{rhs}) : {shape}", op.kind())
                }
            };
            writeln!(&mut out, "  {line}").expect("write to string cannot fail");
        }
        let results: Vec<String> = self.results.iter().map(|r| format!("%{r}")).collect();
        writeln!(&mut out, "  return ({})", results.join(", ")).expect("write to string cannot fail");
        out
    }
}

/// Interpreter computation: a program plus its declared signature.
#[derive(Debug, Clone)]
pub struct CpuComputation {
    name: String,
    device: BackendDevice,
    program: Program,
    parameter_shapes: Vec<Shape>,
    result_shapes: Vec<Shape>,
    compiled: bool,
}

impl CpuComputation {
    pub fn new(name: String, device: BackendDevice, program: Program, parameter_shapes: Vec<Shape>) -> Self {
        let result_shapes = program
            .results
            .iter()
            .filter_map(|r| program.steps.get(*r).map(|step| step.shape().clone()))
            .collect();
        Self {
            name,
            device,
            program,
            parameter_shapes,
            result_shapes,
            compiled: false,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Validated, constant-folded copy.
    pub fn compiled(&self) -> Result<CpuComputation, String> {
        self.program.validate(self.parameter_shapes.len())?;
        let mut program = self.program.clone();
        let folded = program.fold_constants();
        tracing::trace!(computation = %self.name, folded, "folded constant steps");
        Ok(CpuComputation {
            program,
            compiled: true,
            ..self.clone()
        })
    }

    pub fn render(&self) -> String {
        let params: Vec<String> = self.parameter_shapes.iter().map(ToString::to_string).collect();
        let results: Vec<String> = self.result_shapes.iter().map(ToString::to_string).collect();
        format!(
            "computation {} on {} ({}) -> ({}) [{}]\n{}",
            self.name,
            self.device,
            params.join(", "),
            results.join(", "),
            if self.compiled { "compiled" } else { "lowered" },
            self.program.render()
        )
    }
}

impl Computation for CpuComputation {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &BackendDevice {
        &self.device
    }

    fn parameter_shapes(&self) -> &[Shape] {
        &self.parameter_shapes
    }

    fn result_shapes(&self) -> &[Shape] {
        &self.result_shapes
    }

    fn is_compiled(&self) -> bool {
        self.compiled
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
