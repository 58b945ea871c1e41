// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! The backend contract exercised through a minimal out-of-crate backend.
//!
//! `ConstBackend` only understands scalar constants. It exists to show that
//! the trait seam is implementable without touching crate internals.

use std::any::Any;
use std::sync::{Arc, Mutex};

use mind_lazy::ir::{ops, post_order, EmissionSet, NodeOp, NodeRef, Output};
use mind_lazy::runtime::{
    check_arguments, Backend, BackendData, BackendDevice, BackendRegistry, Computation, ComputationRef,
    DataHandle, DeviceKind, ErrorKind, HostTensor, LoweringContext, RuntimeError, VirtualDevice,
};
use mind_lazy::types::{Scalar, ScalarType, Shape};

#[derive(Debug)]
struct ConstData {
    device: BackendDevice,
    shape: Shape,
    value: Mutex<Option<HostTensor>>,
}

impl BackendData for ConstData {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn device(&self) -> &BackendDevice {
        &self.device
    }

    fn has_value(&self) -> bool {
        self.value.lock().unwrap().is_some()
    }

    fn assign(&self, other: &dyn BackendData) -> Result<(), RuntimeError> {
        let other = other.as_any().downcast_ref::<ConstData>().unwrap();
        let value = other.value.lock().unwrap().clone();
        *self.value.lock().unwrap() = value;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct ConstComputation {
    name: String,
    device: BackendDevice,
    parameters: Vec<Shape>,
    constants: Vec<(Scalar, Shape)>,
    results: Vec<Shape>,
    compiled: bool,
}

impl Computation for ConstComputation {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &BackendDevice {
        &self.device
    }

    fn parameter_shapes(&self) -> &[Shape] {
        &self.parameters
    }

    fn result_shapes(&self) -> &[Shape] {
        &self.results
    }

    fn is_compiled(&self) -> bool {
        self.compiled
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ConstContext {
    name: String,
    device: BackendDevice,
    emitted: EmissionSet,
    lowered: Vec<(Scalar, Shape)>,
    results: Vec<usize>,
    parameters: Vec<DataHandle>,
}

impl LoweringContext for ConstContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &BackendDevice {
        &self.device
    }

    fn lower_node(&mut self, node: &NodeRef) -> Result<(), RuntimeError> {
        match node.op() {
            NodeOp::Constant(value) => self.lowered.push((*value, node.shape().clone())),
            NodeOp::DeviceData(data) => self.parameters.push(Arc::clone(data)),
            NodeOp::Binary(_) => return Err(RuntimeError::compilation("constants only")),
        }
        self.emitted.insert(node.id());
        Ok(())
    }

    fn emitted(&self) -> &EmissionSet {
        &self.emitted
    }

    fn add_result(&mut self, _output: &Output) -> Result<usize, RuntimeError> {
        self.results.push(self.lowered.len() - 1);
        Ok(self.results.len() - 1)
    }

    fn parameters(&self) -> &[DataHandle] {
        &self.parameters
    }

    fn build(self: Box<Self>) -> Result<ComputationRef, RuntimeError> {
        let picked: Vec<usize> = if self.results.is_empty() {
            vec![self.lowered.len() - 1]
        } else {
            self.results.clone()
        };
        let constants: Vec<(Scalar, Shape)> = picked.iter().map(|i| self.lowered[*i].clone()).collect();
        Ok(Arc::new(ConstComputation {
            name: self.name,
            device: self.device,
            parameters: self.parameters.iter().map(|p| p.shape().clone()).collect(),
            results: constants.iter().map(|(_, shape)| shape.clone()).collect(),
            constants,
            compiled: false,
        }))
    }
}

struct ConstBackend {
    device: BackendDevice,
}

impl ConstBackend {
    fn new() -> Self {
        Self {
            device: BackendDevice::cpu(0),
        }
    }
}

impl Backend for ConstBackend {
    fn name(&self) -> &str {
        "const"
    }

    fn prepare_to_exit(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn set_rng_seed(&self, _seed: u64) {}

    fn to_device_data(
        &self,
        tensor: &HostTensor,
        shape: &Shape,
        device: &BackendDevice,
    ) -> Result<DataHandle, RuntimeError> {
        if tensor.shape() != shape {
            return Err(RuntimeError::shape_mismatch(shape, tensor.shape()));
        }
        Ok(Arc::new(ConstData {
            device: *device,
            shape: shape.clone(),
            value: Mutex::new(Some(tensor.clone())),
        }))
    }

    fn make_placeholder(&self, device: &BackendDevice, shape: Shape) -> Result<DataHandle, RuntimeError> {
        Ok(Arc::new(ConstData {
            device: *device,
            shape,
            value: Mutex::new(None),
        }))
    }

    fn from_device_data(
        &self,
        data: &DataHandle,
        logical_type: Option<ScalarType>,
    ) -> Result<HostTensor, RuntimeError> {
        let data = data.as_any().downcast_ref::<ConstData>().unwrap();
        let tensor = data
            .value
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RuntimeError::UnmaterializedData {
                shape: data.shape.to_string(),
                device: data.device.to_string(),
            })?;
        match logical_type {
            Some(target) => tensor.cast(target),
            None => Ok(tensor),
        }
    }

    fn create_lowering_context(
        &self,
        name: &str,
        device: &BackendDevice,
        post_order: &[NodeRef],
        emitted: EmissionSet,
    ) -> Result<Box<dyn LoweringContext>, RuntimeError> {
        let mut context = self.create_empty_lowering_context(name, device)?;
        for node in post_order.iter().filter(|node| !emitted.contains(&node.id())) {
            context.lower_node(node)?;
        }
        Ok(context)
    }

    fn create_empty_lowering_context(
        &self,
        name: &str,
        device: &BackendDevice,
    ) -> Result<Box<dyn LoweringContext>, RuntimeError> {
        Ok(Box::new(ConstContext {
            name: name.to_string(),
            device: *device,
            emitted: EmissionSet::new(),
            lowered: Vec::new(),
            results: Vec::new(),
            parameters: Vec::new(),
        }))
    }

    fn compilation_devices(&self, device: &BackendDevice, _devices: &[BackendDevice]) -> Vec<BackendDevice> {
        vec![*device]
    }

    fn compile(&self, instances: Vec<ComputationRef>) -> Vec<Result<ComputationRef, RuntimeError>> {
        instances
            .into_iter()
            .map(|instance| {
                let lowered = instance
                    .as_any()
                    .downcast_ref::<ConstComputation>()
                    .ok_or_else(|| RuntimeError::compilation("foreign computation"))?;
                Ok(Arc::new(ConstComputation {
                    name: lowered.name.clone(),
                    device: lowered.device,
                    parameters: lowered.parameters.clone(),
                    constants: lowered.constants.clone(),
                    results: lowered.results.clone(),
                    compiled: true,
                }) as ComputationRef)
            })
            .collect()
    }

    fn execute(
        &self,
        computation: &dyn Computation,
        arguments: &[DataHandle],
        device: &BackendDevice,
    ) -> Result<Vec<DataHandle>, RuntimeError> {
        check_arguments(computation, arguments)?;
        let computation = computation.as_any().downcast_ref::<ConstComputation>().unwrap();
        computation
            .constants
            .iter()
            .map(|(value, shape)| {
                let tensor = HostTensor::filled(shape.clone(), *value)?;
                self.to_device_data(&tensor, shape, device)
            })
            .collect()
    }

    fn default_device_type(&self) -> DeviceKind {
        DeviceKind::Cpu
    }

    fn set_default_device_type(&self, kind: &str) -> Result<(), RuntimeError> {
        match kind.parse::<DeviceKind>()? {
            DeviceKind::Cpu => Ok(()),
            other => Err(RuntimeError::configuration(format!("no {other} devices"))),
        }
    }

    fn devices(&self) -> Vec<BackendDevice> {
        vec![self.device]
    }

    fn map_device(&self, device: &VirtualDevice) -> Result<BackendDevice, RuntimeError> {
        match device {
            VirtualDevice::Lazy(0) => Ok(self.device),
            VirtualDevice::Concrete(d) if *d == self.device => Ok(*d),
            other => Err(RuntimeError::configuration(format!("unknown device {other}"))),
        }
    }

    fn hardware_device_type(&self) -> DeviceKind {
        DeviceKind::Cpu
    }

    fn computation_text(&self, computation: &dyn Computation) -> String {
        format!("{computation:?}")
    }
}

fn registered() -> Arc<dyn Backend> {
    let registry = BackendRegistry::new();
    registry.register(Arc::new(ConstBackend::new())).unwrap();
    registry.get().unwrap()
}

#[test]
fn constant_materializes_through_the_contract() {
    let backend = registered();
    let device = backend.map_device(&VirtualDevice::Lazy(0)).unwrap();
    assert_eq!(device, BackendDevice::cpu(0));

    let node = ops::scalar_of_type(Scalar::Float(3.5), ScalarType::F32);
    assert_eq!(node.to_string(), "prim::Constant, shape=f32[], value=3.5");

    let context = backend
        .create_lowering_context("constant", &device, &post_order(&[node]), EmissionSet::new())
        .unwrap();
    assert!(context.parameters().is_empty());
    let lowered = context.build().unwrap();
    assert!(!lowered.is_compiled());

    let compiled = backend.compile(vec![lowered]).remove(0).unwrap();
    assert!(compiled.is_compiled());

    let outputs = backend.execute(compiled.as_ref(), &[], &device).unwrap();
    assert_eq!(outputs.len(), 1);
    let host = backend.from_device_data(&outputs[0], None).unwrap();
    assert_eq!(host.to_vec::<f32>().unwrap(), vec![3.5]);
}

#[test]
fn too_few_arguments_is_an_execution_error() {
    let backend = registered();
    let device = BackendDevice::cpu(0);
    let tensor = HostTensor::from_slice(vec![2], &[1.0f32, 2.0]).unwrap();
    let handle = backend.to_device_data(&tensor, tensor.shape(), &device).unwrap();

    let mut context = backend.create_empty_lowering_context("param", &device).unwrap();
    context.lower_node(&ops::device_data(handle)).unwrap();
    context
        .lower_node(&ops::scalar_of_type(Scalar::Float(0.0), ScalarType::F32))
        .unwrap();
    assert_eq!(context.parameters().len(), 1);
    let compiled = backend.compile(vec![context.build().unwrap()]).remove(0).unwrap();

    let err = backend.execute(compiled.as_ref(), &[], &device).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn placeholder_argument_is_rejected() {
    let backend = registered();
    let device = BackendDevice::cpu(0);
    let shape = Shape::new(ScalarType::F32, vec![2]);
    let slot = backend.make_placeholder(&device, shape.clone()).unwrap();
    let tensor = HostTensor::filled(shape, Scalar::Float(1.0)).unwrap();
    let real = backend.to_device_data(&tensor, tensor.shape(), &device).unwrap();

    let mut context = backend.create_empty_lowering_context("p", &device).unwrap();
    context.lower_node(&ops::device_data(real)).unwrap();
    context
        .lower_node(&ops::scalar_of_type(Scalar::Float(0.0), ScalarType::F32))
        .unwrap();
    let compiled = backend.compile(vec![context.build().unwrap()]).remove(0).unwrap();

    let err = backend.execute(compiled.as_ref(), &[slot], &device).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnmaterializedData);
}

#[test]
fn mapping_is_pure() {
    let backend = registered();
    let first = backend.map_device(&VirtualDevice::Lazy(0)).unwrap();
    for _ in 0..4 {
        assert_eq!(backend.map_device(&VirtualDevice::Lazy(0)).unwrap(), first);
    }
    assert_eq!(
        backend.map_device(&VirtualDevice::Lazy(1)).unwrap_err().kind(),
        ErrorKind::Configuration
    );
}
