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

use std::collections::BTreeSet;

use crate::ir::{EmissionSet, NodeId, NodeRef};

/// Structured errors returned by the post-order verifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IrVerifyError {
    /// The same node appears twice in the sequence.
    #[error("node {0} appears more than once in the post-order")]
    DuplicateNode(NodeId),
    /// A node was listed before one of its operands.
    #[error("node {node} at position {position} uses {operand} before it is lowered")]
    UseBeforeDefinition {
        node: NodeId,
        operand: NodeId,
        position: usize,
    },
    /// An operand refers to an output index the producer does not have.
    #[error("node {node} reads output {index} of {operand}, which has {available} outputs")]
    OutputIndexOutOfRange {
        node: NodeId,
        operand: NodeId,
        index: usize,
        available: usize,
    },
}

/// Verify that `post_order` lists dependencies before dependents.
///
/// Operands must either precede their user in the sequence or already be in
/// `emitted` (lowered by an earlier, incremental pass). Returns structured
/// errors instead of panicking on invalid input.
pub fn verify_post_order(post_order: &[NodeRef], emitted: &EmissionSet) -> Result<(), IrVerifyError> {
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();

    for (position, node) in post_order.iter().enumerate() {
        for operand in node.operands() {
            let producer = &operand.node;
            if operand.index >= producer.num_outputs() {
                return Err(IrVerifyError::OutputIndexOutOfRange {
                    node: node.id(),
                    operand: producer.id(),
                    index: operand.index,
                    available: producer.num_outputs(),
                });
            }
            if !seen.contains(&producer.id()) && !emitted.contains(&producer.id()) {
                return Err(IrVerifyError::UseBeforeDefinition {
                    node: node.id(),
                    operand: producer.id(),
                    position,
                });
            }
        }
        if !seen.insert(node.id()) {
            return Err(IrVerifyError::DuplicateNode(node.id()));
        }
    }

    Ok(())
}
