//! Lowering of graph nodes into interpreter programs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::exec::program::{CpuComputation, Program, Step};
use crate::ir::{EmissionSet, NodeId, NodeOp, NodeRef, Output};
use crate::runtime::computation::ComputationRef;
use crate::runtime::data::{handle_address, DataHandle};
use crate::runtime::device::BackendDevice;
use crate::runtime::lowering::LoweringContext;
use crate::runtime::types::RuntimeError;

pub struct CpuLoweringContext {
    name: String,
    device: BackendDevice,
    program: Program,
    values: HashMap<(NodeId, usize), usize>,
    emitted: EmissionSet,
    parameters: Vec<DataHandle>,
    parameter_slots: HashMap<usize, usize>,
    last_lowered: Option<NodeId>,
}

impl CpuLoweringContext {
    pub fn new(name: &str, device: BackendDevice, emitted: EmissionSet) -> Self {
        Self {
            name: name.to_string(),
            device,
            program: Program::default(),
            values: HashMap::new(),
            emitted,
            parameters: Vec::new(),
            parameter_slots: HashMap::new(),
            last_lowered: None,
        }
    }

    fn value_of(&self, output: &Output) -> Result<usize, RuntimeError> {
        self.values
            .get(&(output.node.id(), output.index))
            .copied()
            .ok_or_else(|| {
                let reason = if self.emitted.contains(&output.node.id()) {
                    "was emitted outside this context and has no value"
                } else {
                    "was not lowered"
                };
                RuntimeError::compilation(format!(
                    "{} output {} of {} {reason} in '{}'",
                    output.node.kind(),
                    output.index,
                    output.node.id(),
                    self.name
                ))
            })
    }

    fn parameter_slot(&mut self, data: &DataHandle) -> usize {
        let address = handle_address(data);
        if let Some(slot) = self.parameter_slots.get(&address) {
            return *slot;
        }
        let slot = self.parameters.len();
        self.parameters.push(Arc::clone(data));
        self.parameter_slots.insert(address, slot);
        slot
    }

    fn push(&mut self, step: Step) -> usize {
        self.program.steps.push(step);
        self.program.steps.len() - 1
    }
}

impl LoweringContext for CpuLoweringContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &BackendDevice {
        &self.device
    }

    fn lower_node(&mut self, node: &NodeRef) -> Result<(), RuntimeError> {
        if self.values.contains_key(&(node.id(), 0)) {
            return Ok(());
        }
        if node.num_outputs() != 1 {
            return Err(RuntimeError::compilation(format!(
                "{} produces {} outputs; the interpreter lowers single-output nodes only",
                node.kind(),
                node.num_outputs()
            )));
        }
        let shape = node.shape().clone();
        let step = match node.op() {
            NodeOp::Constant(value) => Step::Constant { value: *value, shape },
            NodeOp::DeviceData(data) => {
                if data.device() != &self.device {
                    return Err(RuntimeError::compilation(format!(
                        "data on {} used in a computation for {}",
                        data.device(),
                        self.device
                    )));
                }
                Step::Parameter {
                    slot: self.parameter_slot(data),
                    shape,
                }
            }
            NodeOp::Binary(op) => {
                let [lhs, rhs] = node.operands() else {
                    return Err(RuntimeError::compilation(format!(
                        "{} expects 2 operands, found {}",
                        node.kind(),
                        node.operands().len()
                    )));
                };
                Step::Binary {
                    op: *op,
                    lhs: self.value_of(lhs)?,
                    rhs: self.value_of(rhs)?,
                    shape,
                }
            }
        };
        let value = self.push(step);
        self.values.insert((node.id(), 0), value);
        self.emitted.insert(node.id());
        self.last_lowered = Some(node.id());
        tracing::trace!(context = %self.name, node = %node, value, "lowered node");
        Ok(())
    }

    fn emitted(&self) -> &EmissionSet {
        &self.emitted
    }

    fn add_result(&mut self, output: &Output) -> Result<usize, RuntimeError> {
        let value = self.value_of(output)?;
        self.program.results.push(value);
        Ok(self.program.results.len() - 1)
    }

    fn parameters(&self) -> &[DataHandle] {
        &self.parameters
    }

    fn build(mut self: Box<Self>) -> Result<ComputationRef, RuntimeError> {
        if self.program.results.is_empty() {
            let value = self
                .last_lowered
                .and_then(|last| self.values.get(&(last, 0)).copied())
                .ok_or_else(|| RuntimeError::compilation(format!("lowering context '{}' is empty", self.name)))?;
            self.program.results.push(value);
        }
        let parameter_shapes = self.parameters.iter().map(|p| p.shape().clone()).collect();
        let this = *self;
        tracing::debug!(
            context = %this.name,
            steps = this.program.steps.len(),
            parameters = this.parameters.len(),
            results = this.program.results.len(),
            "built computation"
        );
        Ok(Arc::new(CpuComputation::new(this.name, this.device, this.program, parameter_shapes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::data::CpuData;
    use crate::ir::{ops, post_order, BinOp};
    use crate::runtime::data::HostTensor;
    use crate::types::{Scalar, ScalarType};

    fn cpu_data(values: &[f32]) -> DataHandle {
        Arc::new(CpuData::materialized(
            BackendDevice::cpu(0),
            HostTensor::from_slice(vec![values.len()], values).unwrap(),
        ))
    }

    #[test]
    fn shared_handles_become_one_parameter() {
        let x = cpu_data(&[1.0, 2.0]);
        let a = ops::device_data(Arc::clone(&x));
        let b = ops::device_data(Arc::clone(&x));
        let sum = ops::binary(BinOp::Add, a.into(), b.into());

        let mut ctx = Box::new(CpuLoweringContext::new("t", BackendDevice::cpu(0), EmissionSet::new()));
        ctx.lower_post_order(&post_order(&[sum])).unwrap();
        assert_eq!(ctx.parameters().len(), 1);
        let computation = ctx.build().unwrap();
        assert_eq!(computation.parameter_shapes().len(), 1);
        assert_eq!(computation.result_shapes().len(), 1);
    }

    #[test]
    fn data_from_other_device_is_rejected() {
        let node = ops::device_data(cpu_data(&[1.0]));
        let mut ctx = CpuLoweringContext::new("t", BackendDevice::cpu(1), EmissionSet::new());
        let err = ctx.lower_node(&node).unwrap_err();
        assert_eq!(err.kind(), crate::runtime::ErrorKind::Compilation);
    }

    #[test]
    fn unlowered_operand_is_a_compilation_error() {
        let a = ops::scalar_of_type(Scalar::Float(1.0), ScalarType::F32);
        let sum = ops::binary(BinOp::Add, a.clone().into(), a.into());
        let mut ctx = CpuLoweringContext::new("t", BackendDevice::cpu(0), EmissionSet::new());
        assert!(ctx.lower_node(&sum).is_err());
    }

    #[test]
    fn operand_emitted_elsewhere_has_no_value() {
        let a = ops::scalar_of_type(Scalar::Float(1.0), ScalarType::F32);
        let sum = ops::binary(BinOp::Add, a.clone().into(), a.clone().into());
        let emitted: EmissionSet = [a.id()].into_iter().collect();
        let mut ctx = CpuLoweringContext::new("t", BackendDevice::cpu(0), emitted);
        let err = ctx.lower_post_order(&[sum]).unwrap_err();
        assert_eq!(err.kind(), crate::runtime::ErrorKind::Compilation);
        assert!(err.to_string().contains("emitted outside this context"), "{err}");
    }

    #[test]
    fn incremental_lowering_reuses_earlier_values() {
        let a = ops::scalar_of_type(Scalar::Float(1.5), ScalarType::F32);
        let sum = ops::binary(BinOp::Add, a.clone().into(), a.clone().into());
        let mut ctx = Box::new(CpuLoweringContext::new("t", BackendDevice::cpu(0), EmissionSet::new()));
        ctx.lower_post_order(&[a.clone()]).unwrap();
        ctx.lower_post_order(&[sum.clone()]).unwrap();
        assert!(ctx.emitted().contains(&a.id()));
        assert!(ctx.emitted().contains(&sum.id()));
        assert_eq!(ctx.build().unwrap().result_shapes().len(), 1);
    }

    #[test]
    fn empty_context_cannot_build() {
        let ctx = Box::new(CpuLoweringContext::new("empty", BackendDevice::cpu(0), EmissionSet::new()));
        assert!(ctx.build().is_err());
    }

    #[test]
    fn explicit_results_keep_declared_order() {
        let a = ops::scalar_of_type(Scalar::Int(1), ScalarType::I64);
        let b = ops::scalar_of_type(Scalar::Int(2), ScalarType::I64);
        let mut ctx = Box::new(CpuLoweringContext::new("t", BackendDevice::cpu(0), EmissionSet::new()));
        ctx.lower_post_order(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(ctx.add_result(&b.into()).unwrap(), 0);
        assert_eq!(ctx.add_result(&a.into()).unwrap(), 1);
        let computation = ctx.build().unwrap();
        assert_eq!(computation.result_shapes().len(), 2);
    }
}
