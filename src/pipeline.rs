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

//! Frontend side of the lazy runtime: turning pending graphs into data.
//!
//! [`LazyGraphExecutor`] drives the backend contract end to end. It computes
//! the post-order of the requested roots, lowers and compiles it once per
//! distinct graph shape, executes it, and writes the results into
//! placeholder handles that the caller can keep using as graph inputs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::hash::{ContentHash, ContentHasher};
use crate::ir::{ops, post_order, EmissionSet, NodeRef, Output};
use crate::runtime::backend::Backend;
use crate::runtime::computation::ComputationRef;
use crate::runtime::data::{handle_address, DataHandle, HostTensor};
use crate::runtime::device::{BackendDevice, VirtualDevice};
use crate::runtime::registry::BackendRegistry;
use crate::runtime::types::RuntimeError;
use crate::types::ScalarType;

/// Executes lazy graphs on an injected backend, caching compiled
/// computations by graph key.
pub struct LazyGraphExecutor {
    backend: Arc<dyn Backend>,
    cache: Mutex<HashMap<ContentHash, ComputationRef>>,
}

impl LazyGraphExecutor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Executor bound to the registry's active backend.
    pub fn from_registry(registry: &BackendRegistry) -> Result<Self, RuntimeError> {
        Ok(Self::new(registry.get()?))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Uploads `tensor` and wraps the handle in a device-data node.
    pub fn to_device(&self, tensor: &HostTensor, device: &VirtualDevice) -> Result<NodeRef, RuntimeError> {
        let device = self.backend.map_device(device)?;
        let handle = self.backend.to_device_data(tensor, tensor.shape(), &device)?;
        Ok(ops::device_data(handle))
    }

    /// Copies `handle` back to the host, optionally casting it.
    pub fn materialize(
        &self,
        handle: &DataHandle,
        logical_type: Option<ScalarType>,
    ) -> Result<HostTensor, RuntimeError> {
        self.backend.from_device_data(handle, logical_type)
    }

    /// Computes `roots` on `device` and returns one materialized handle per
    /// root, in order.
    pub fn sync(&self, roots: &[NodeRef], device: &VirtualDevice) -> Result<Vec<DataHandle>, RuntimeError> {
        if roots.is_empty() {
            return Ok(Vec::new());
        }
        let device = self.backend.map_device(device)?;
        let order = post_order(roots);
        let key = graph_key(&order, roots, &device);

        let (computation, arguments) = match self.cached(&key) {
            Some(computation) => {
                tracing::debug!(key = %key, computation = computation.name(), "computation cache hit");
                (computation, collect_parameters(&order))
            }
            None => {
                let (computation, arguments) = self.build(&key, &order, roots, &device)?;
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, Arc::clone(&computation));
                (computation, arguments)
            }
        };

        let placeholders = roots
            .iter()
            .map(|root| self.backend.make_placeholder(&device, root.shape().clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let results = self.backend.execute(computation.as_ref(), &arguments, &device)?;
        if results.len() != placeholders.len() {
            return Err(RuntimeError::execution(format!(
                "computation '{}' returned {} results for {} roots",
                computation.name(),
                results.len(),
                placeholders.len()
            )));
        }
        for (placeholder, result) in placeholders.iter().zip(&results) {
            placeholder.assign(result.as_ref())?;
        }
        Ok(placeholders)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn cached(&self, key: &ContentHash) -> Option<ComputationRef> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn build(
        &self,
        key: &ContentHash,
        order: &[NodeRef],
        roots: &[NodeRef],
        device: &BackendDevice,
    ) -> Result<(ComputationRef, Vec<DataHandle>), RuntimeError> {
        let name = format!("sync_{}", &key.to_hex()[..12]);
        let mut context = self
            .backend
            .create_lowering_context(&name, device, order, EmissionSet::new())?;
        for root in roots {
            context.add_result(&Output::from(root))?;
        }
        let arguments = context.parameters().to_vec();
        let lowered = context.build()?;
        let compiled = self
            .backend
            .compile(vec![lowered])
            .into_iter()
            .next()
            .unwrap_or_else(|| Err(RuntimeError::compilation(format!("backend returned nothing for '{name}'"))))?;
        tracing::debug!(
            key = %key,
            computation = %name,
            nodes = order.len(),
            parameters = arguments.len(),
            "computation cache miss"
        );
        Ok((compiled, arguments))
    }
}

impl std::fmt::Debug for LazyGraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyGraphExecutor")
            .field("backend", &self.backend.name())
            .field("cached", &self.cache_len())
            .finish()
    }
}

/// Device-data handles in first-use post-order, deduplicated by identity.
fn collect_parameters(order: &[NodeRef]) -> Vec<DataHandle> {
    let mut seen = HashSet::new();
    let mut parameters = Vec::new();
    for handle in order.iter().filter_map(ops::device_data_handle) {
        if seen.insert(handle_address(&handle)) {
            parameters.push(handle);
        }
    }
    parameters
}

/// Key under which a compiled computation can be reused.
///
/// Node hashes ignore the data behind device-data nodes, so two graphs that
/// differ only in input values share a key. Node hashes also see operands by
/// content only, so the key records each operand's producer position in the
/// post-order, and which device-data nodes alias the same handle.
fn graph_key(order: &[NodeRef], roots: &[NodeRef], device: &BackendDevice) -> ContentHash {
    let positions: HashMap<_, _> = order.iter().enumerate().map(|(i, node)| (node.id(), i)).collect();
    let position_of = |node: &NodeRef| positions.get(&node.id()).copied().unwrap_or(usize::MAX) as u64;

    let mut hasher = ContentHasher::new();
    hasher.write_str(&device.to_string());
    let mut first_use: HashMap<usize, usize> = HashMap::new();
    for (position, node) in order.iter().enumerate() {
        hasher.write_hash(node.hash());
        for operand in node.operands() {
            hasher
                .write_u64(position_of(&operand.node))
                .write_u64(operand.index as u64);
        }
        if let Some(handle) = ops::device_data_handle(node) {
            let first = *first_use.entry(handle_address(&handle)).or_insert(position);
            hasher.write_u64(first as u64);
        }
    }
    for root in roots {
        hasher.write_u64(position_of(root));
    }
    hasher.finish()
}
