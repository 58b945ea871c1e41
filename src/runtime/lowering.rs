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

//! Backend-owned lowering contexts.

use crate::ir::{verify_post_order, EmissionSet, NodeRef, Output};
use crate::runtime::computation::ComputationRef;
use crate::runtime::data::DataHandle;
use crate::runtime::device::BackendDevice;
use crate::runtime::types::RuntimeError;

/// Transient builder that turns frontend nodes into a backend computation.
///
/// Contract for implementations:
/// - [`emitted`](Self::emitted) holds the nodes whose values this context
///   already owns. Seeding it at creation only skips those nodes; an operand
///   that was emitted into some other context has no value here and fails
///   with a compilation error. Incremental lowering goes through an empty
///   context and repeated [`lower_post_order`](Self::lower_post_order) calls.
/// - `lower_node` marks the node in [`emitted`](Self::emitted) and fails with a
///   compilation error when an operand has not been lowered.
/// - Device-data nodes become parameters, numbered in first-use order and
///   deduplicated by handle identity. [`parameters`](Self::parameters) returns
///   them in that order; they are the arguments for `execute`.
/// - `build` consumes the context. With no declared results, the outputs of
///   the last lowered node are the results.
pub trait LoweringContext: Send {
    fn name(&self) -> &str;

    fn device(&self) -> &BackendDevice;

    fn lower_node(&mut self, node: &NodeRef) -> Result<(), RuntimeError>;

    fn emitted(&self) -> &EmissionSet;

    /// Declares `output` as a computation result; returns its result index.
    fn add_result(&mut self, output: &Output) -> Result<usize, RuntimeError>;

    fn parameters(&self) -> &[DataHandle];

    fn build(self: Box<Self>) -> Result<ComputationRef, RuntimeError>;

    /// Verifies `post_order` and lowers every node not yet emitted.
    fn lower_post_order(&mut self, post_order: &[NodeRef]) -> Result<(), RuntimeError> {
        verify_post_order(post_order, self.emitted())?;
        for node in post_order {
            if !self.emitted().contains(&node.id()) {
                self.lower_node(node)?;
            }
        }
        Ok(())
    }
}
