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

//! The backend capability contract.
//!
//! This module defines the interface every lazy tensor backend implements.
//! The frontend only ever talks to `dyn Backend`; it never names a concrete
//! backend type. All calls are blocking: when `execute` returns, its result
//! handles are safe to pass to further `execute` or `from_device_data` calls.

use crate::ir::{EmissionSet, NodeRef};
use crate::runtime::computation::{Computation, ComputationRef};
use crate::runtime::data::{DataHandle, HostTensor};
use crate::runtime::device::{BackendDevice, DeviceKind, VirtualDevice};
use crate::runtime::lowering::LoweringContext;
use crate::runtime::types::RuntimeError;
use crate::types::{ScalarType, Shape};

/// Abstract contract for lazy tensor execution backends.
///
/// A concrete implementation owns device memory, decides how graph nodes are
/// lowered and compiled, and maps frontend devices onto its own devices.
pub trait Backend: Send + Sync {
    /// Short backend name used in logs and diagnostics.
    fn name(&self) -> &str;

    // Lifecycle and configuration.

    /// Teardown hook called once before the process exits.
    fn prepare_to_exit(&self) -> Result<(), RuntimeError>;

    fn set_rng_seed(&self, seed: u64);

    // Data transfer.

    /// Copies a host tensor onto `device`. Fails with a shape mismatch when
    /// `shape` does not describe `tensor`.
    fn to_device_data(
        &self,
        tensor: &HostTensor,
        shape: &Shape,
        device: &BackendDevice,
    ) -> Result<DataHandle, RuntimeError>;

    /// Allocates an unmaterialized handle; valid only as an output binding
    /// until a computation result is assigned into it.
    fn make_placeholder(&self, device: &BackendDevice, shape: Shape) -> Result<DataHandle, RuntimeError>;

    /// Copies a handle back to host memory, optionally casting the element
    /// type. Fails on placeholders and on unrepresentable casts.
    fn from_device_data(
        &self,
        data: &DataHandle,
        logical_type: Option<ScalarType>,
    ) -> Result<HostTensor, RuntimeError>;

    // Lowering, compilation, execution.

    /// Creates a context seeded with `post_order`, lowering every node not in
    /// `emitted`.
    fn create_lowering_context(
        &self,
        name: &str,
        device: &BackendDevice,
        post_order: &[NodeRef],
        emitted: EmissionSet,
    ) -> Result<Box<dyn LoweringContext>, RuntimeError>;

    /// Creates a context with no nodes, for incremental lowering.
    fn create_empty_lowering_context(
        &self,
        name: &str,
        device: &BackendDevice,
    ) -> Result<Box<dyn LoweringContext>, RuntimeError>;

    /// Devices that may jointly host one computation for `device`.
    /// Deterministic for identical inputs.
    fn compilation_devices(&self, device: &BackendDevice, devices: &[BackendDevice]) -> Vec<BackendDevice>;

    /// Compiles each instance. The result has the same length and order as
    /// the input; a malformed instance fails on its own without affecting its
    /// siblings.
    fn compile(&self, instances: Vec<ComputationRef>) -> Vec<Result<ComputationRef, RuntimeError>>;

    /// Runs a compiled computation with positional `arguments` and returns one
    /// handle per declared result.
    fn execute(
        &self,
        computation: &dyn Computation,
        arguments: &[DataHandle],
        device: &BackendDevice,
    ) -> Result<Vec<DataHandle>, RuntimeError>;

    // Device configuration.

    fn default_device_type(&self) -> DeviceKind;

    /// Not synchronized against concurrent execution; callers configure
    /// devices before work starts.
    fn set_default_device_type(&self, kind: &str) -> Result<(), RuntimeError>;

    /// All concrete devices, in a stable order.
    fn devices(&self) -> Vec<BackendDevice>;

    /// Resolves a frontend device. Pure for a fixed configuration.
    fn map_device(&self, device: &VirtualDevice) -> Result<BackendDevice, RuntimeError>;

    /// Physical device family behind this backend.
    ///
    /// Backend-implementation-specific escape hatch for callers that need a
    /// hardware-specific code path. New code should not depend on it.
    fn hardware_device_type(&self) -> DeviceKind;

    // Diagnostics.

    /// Human-readable dump of a computation. Format is unspecified and only
    /// meant for debugging.
    fn computation_text(&self, computation: &dyn Computation) -> String;
}
