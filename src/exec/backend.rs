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

//! Reference host interpreter implementing the full backend contract.
//!
//! Every device the interpreter exposes is host memory; the device list only
//! decides which device identities it accepts. This makes it usable as a
//! stand-in for multi-device backends in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::exec::data::{self, CpuData};
use crate::exec::lowering::CpuLoweringContext;
use crate::exec::program::CpuComputation;
use crate::ir::{EmissionSet, NodeRef};
use crate::runtime::backend::Backend;
use crate::runtime::computation::{check_arguments, Computation, ComputationRef};
use crate::runtime::data::{DataHandle, HostTensor};
use crate::runtime::device::{BackendDevice, DeviceKind, VirtualDevice};
use crate::runtime::lowering::LoweringContext;
use crate::runtime::types::RuntimeError;
use crate::types::{ScalarType, Shape};

pub const BACKEND_NAME: &str = "interpreter";

#[derive(Debug)]
pub struct CpuBackend {
    devices: Vec<BackendDevice>,
    default_kind: RwLock<DeviceKind>,
    rng_seed: AtomicU64,
    exited: AtomicBool,
}

impl CpuBackend {
    /// Interpreter with a single `cpu:0` device.
    pub fn new() -> Self {
        Self::from_sorted(vec![BackendDevice::cpu(0)])
    }

    /// Interpreter exposing `devices`. The default kind is the first kind in
    /// device order, so `cpu` when present.
    pub fn with_devices(mut devices: Vec<BackendDevice>) -> Result<Self, RuntimeError> {
        devices.sort();
        devices.dedup();
        if devices.is_empty() {
            return Err(RuntimeError::configuration("interpreter needs at least one device"));
        }
        Ok(Self::from_sorted(devices))
    }

    fn from_sorted(devices: Vec<BackendDevice>) -> Self {
        let default_kind = devices[0].kind();
        Self {
            devices,
            default_kind: RwLock::new(default_kind),
            rng_seed: AtomicU64::new(0),
            exited: AtomicBool::new(false),
        }
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed.load(Ordering::Relaxed)
    }

    fn ensure_live(&self) -> Result<(), RuntimeError> {
        if self.exited.load(Ordering::Acquire) {
            return Err(RuntimeError::execution("backend has been shut down"));
        }
        Ok(())
    }

    fn ensure_owned(&self, device: &BackendDevice) -> Result<(), RuntimeError> {
        if self.devices.contains(device) {
            Ok(())
        } else {
            Err(RuntimeError::configuration(format!(
                "device {device} is not provided by the {BACKEND_NAME} backend"
            )))
        }
    }

    fn compile_one(&self, instance: ComputationRef) -> Result<ComputationRef, RuntimeError> {
        let computation = instance
            .as_any()
            .downcast_ref::<CpuComputation>()
            .ok_or_else(|| {
                RuntimeError::compilation(format!(
                    "computation '{}' was not lowered by the {BACKEND_NAME} backend",
                    instance.name()
                ))
            })?;
        if computation.is_compiled() {
            return Ok(instance);
        }
        let compiled = computation.compiled().map_err(|message| {
            RuntimeError::compilation(format!("computation '{}': {message}", computation.name()))
        })?;
        Ok(Arc::new(compiled))
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn prepare_to_exit(&self) -> Result<(), RuntimeError> {
        self.exited.store(true, Ordering::Release);
        tracing::info!(backend = BACKEND_NAME, "backend prepared to exit");
        Ok(())
    }

    fn set_rng_seed(&self, seed: u64) {
        self.rng_seed.store(seed, Ordering::Relaxed);
        tracing::debug!(seed, "rng seed set");
    }

    fn to_device_data(
        &self,
        tensor: &HostTensor,
        shape: &Shape,
        device: &BackendDevice,
    ) -> Result<DataHandle, RuntimeError> {
        self.ensure_live()?;
        self.ensure_owned(device)?;
        if tensor.shape() != shape {
            return Err(RuntimeError::shape_mismatch(shape, tensor.shape()));
        }
        Ok(Arc::new(CpuData::materialized(*device, tensor.clone())))
    }

    fn make_placeholder(&self, device: &BackendDevice, shape: Shape) -> Result<DataHandle, RuntimeError> {
        self.ensure_owned(device)?;
        Ok(Arc::new(CpuData::placeholder(*device, shape)))
    }

    fn from_device_data(
        &self,
        handle: &DataHandle,
        logical_type: Option<ScalarType>,
    ) -> Result<HostTensor, RuntimeError> {
        self.ensure_live()?;
        let tensor = data::downcast(handle)?.read()?;
        match logical_type {
            Some(target) => tensor.cast(target),
            None => Ok(HostTensor::clone(&tensor)),
        }
    }

    fn create_lowering_context(
        &self,
        name: &str,
        device: &BackendDevice,
        post_order: &[NodeRef],
        emitted: EmissionSet,
    ) -> Result<Box<dyn LoweringContext>, RuntimeError> {
        self.ensure_owned(device)?;
        let mut context = CpuLoweringContext::new(name, *device, emitted);
        context.lower_post_order(post_order)?;
        tracing::debug!(context = name, device = %device, nodes = post_order.len(), "created lowering context");
        Ok(Box::new(context))
    }

    fn create_empty_lowering_context(
        &self,
        name: &str,
        device: &BackendDevice,
    ) -> Result<Box<dyn LoweringContext>, RuntimeError> {
        self.ensure_owned(device)?;
        Ok(Box::new(CpuLoweringContext::new(name, *device, EmissionSet::new())))
    }

    fn compilation_devices(&self, device: &BackendDevice, devices: &[BackendDevice]) -> Vec<BackendDevice> {
        if devices.is_empty() {
            return vec![*device];
        }
        let mut chosen: Vec<BackendDevice> = devices
            .iter()
            .filter(|candidate| candidate.kind() == device.kind())
            .copied()
            .chain(std::iter::once(*device))
            .collect();
        chosen.sort();
        chosen.dedup();
        chosen
    }

    fn compile(&self, instances: Vec<ComputationRef>) -> Vec<Result<ComputationRef, RuntimeError>> {
        instances
            .into_iter()
            .map(|instance| {
                let name = instance.name().to_string();
                let result = self.compile_one(instance);
                match &result {
                    Ok(_) => tracing::debug!(computation = %name, "compiled"),
                    Err(err) => tracing::warn!(computation = %name, error = %err, "compilation failed"),
                }
                result
            })
            .collect()
    }

    fn execute(
        &self,
        computation: &dyn Computation,
        arguments: &[DataHandle],
        device: &BackendDevice,
    ) -> Result<Vec<DataHandle>, RuntimeError> {
        self.ensure_live()?;
        self.ensure_owned(device)?;
        let computation = computation
            .as_any()
            .downcast_ref::<CpuComputation>()
            .ok_or_else(|| {
                RuntimeError::execution(format!(
                    "computation '{}' was not compiled by the {BACKEND_NAME} backend",
                    computation.name()
                ))
            })?;
        if !computation.is_compiled() {
            return Err(RuntimeError::execution(format!(
                "computation '{}' must be compiled before execution",
                computation.name()
            )));
        }
        check_arguments(computation, arguments)?;

        let inputs = arguments
            .iter()
            .map(|argument| data::downcast(argument)?.read())
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = computation.program().run(&inputs)?;
        tracing::debug!(
            computation = computation.name(),
            device = %device,
            arguments = arguments.len(),
            results = outputs.len(),
            "executed"
        );
        Ok(outputs
            .into_iter()
            .map(|tensor| Arc::new(CpuData::materialized(*device, tensor)) as DataHandle)
            .collect())
    }

    fn default_device_type(&self) -> DeviceKind {
        *self.default_kind.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_default_device_type(&self, kind: &str) -> Result<(), RuntimeError> {
        let kind: DeviceKind = kind.parse()?;
        if !self.devices.iter().any(|device| device.kind() == kind) {
            return Err(RuntimeError::configuration(format!(
                "the {BACKEND_NAME} backend has no {kind} devices"
            )));
        }
        *self.default_kind.write().unwrap_or_else(PoisonError::into_inner) = kind;
        tracing::info!(kind = %kind, "default device type set");
        Ok(())
    }

    fn devices(&self) -> Vec<BackendDevice> {
        self.devices.clone()
    }

    fn map_device(&self, device: &VirtualDevice) -> Result<BackendDevice, RuntimeError> {
        let concrete = match device {
            VirtualDevice::Lazy(ordinal) => BackendDevice::new(self.default_device_type(), *ordinal),
            VirtualDevice::Concrete(device) => *device,
        };
        self.ensure_owned(&concrete)?;
        Ok(concrete)
    }

    fn hardware_device_type(&self) -> DeviceKind {
        DeviceKind::Cpu
    }

    fn computation_text(&self, computation: &dyn Computation) -> String {
        match computation.as_any().downcast_ref::<CpuComputation>() {
            Some(computation) => computation.render(),
            None => format!("<computation '{}' from another backend>", computation.name()),
        }
    }
}
