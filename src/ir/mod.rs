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

//! Lazy graph nodes as handed to backends.
//!
//! Nodes are immutable once created and shared through [`NodeRef`]. Each node
//! carries a process-unique [`NodeId`] (its identity inside one graph, used
//! for post-order traversal and emission tracking) and a [`ContentHash`]
//! (its structural identity, used for deduplication and caching).

pub mod ops;
pub mod print;
pub mod verify;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::hash::{scalar_hash, ContentHash, ContentHasher};
use crate::runtime::data::DataHandle;
use crate::types::{Scalar, Shape};

pub use print::format_post_order;
pub use verify::{verify_post_order, IrVerifyError};

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Set of nodes already lowered into a context.
pub type EmissionSet = HashSet<NodeId>;

/// Operator name as `namespace::op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpKind(&'static str);

impl OpKind {
    pub const CONSTANT: OpKind = OpKind("prim::Constant");
    pub const DEVICE_DATA: OpKind = OpKind("lazy::device_data");
    pub const ADD: OpKind = OpKind("aten::add");
    pub const SUB: OpKind = OpKind("aten::sub");
    pub const MUL: OpKind = OpKind("aten::mul");
    pub const DIV: OpKind = OpKind("aten::div");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn kind(self) -> OpKind {
        match self {
            BinOp::Add => OpKind::ADD,
            BinOp::Sub => OpKind::SUB,
            BinOp::Mul => OpKind::MUL,
            BinOp::Div => OpKind::DIV,
        }
    }
}

/// Node payload, one variant per node kind.
#[derive(Debug, Clone)]
pub enum NodeOp {
    /// A scalar constant broadcast to the node's shape.
    Constant(Scalar),
    /// Tensor data already resident on a backend; lowered as a parameter.
    DeviceData(DataHandle),
    /// Elementwise binary operator over two equally shaped operands.
    Binary(BinOp),
}

impl NodeOp {
    pub fn kind(&self) -> OpKind {
        match self {
            NodeOp::Constant(_) => OpKind::CONSTANT,
            NodeOp::DeviceData(_) => OpKind::DEVICE_DATA,
            NodeOp::Binary(op) => op.kind(),
        }
    }

    /// Hash of the payload value.
    ///
    /// Device data hashes to zero: its shape is part of the node hash, and
    /// leaving the buffer out lets graphs over different inputs share one
    /// compiled computation.
    pub fn content_hash(&self) -> ContentHash {
        match self {
            NodeOp::Constant(value) => scalar_hash(value),
            NodeOp::DeviceData(_) | NodeOp::Binary(_) => ContentHash::ZERO,
        }
    }
}

/// An immutable graph node.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    op: NodeOp,
    operands: Vec<Output>,
    shape: Shape,
    num_outputs: usize,
    hash: ContentHash,
}

pub type NodeRef = Arc<Node>;

impl Node {
    pub fn new(op: NodeOp, operands: Vec<Output>, shape: Shape, num_outputs: usize) -> NodeRef {
        let mut hasher = ContentHasher::new();
        hasher
            .write_str(op.kind().as_str())
            .write_shape(&shape)
            .write_u64(num_outputs as u64)
            .write_hash(op.content_hash());
        for operand in &operands {
            hasher
                .write_hash(operand.node.hash())
                .write_u64(operand.index as u64);
        }
        Arc::new(Node {
            id: NodeId::fresh(),
            op,
            operands,
            shape,
            num_outputs,
            hash: hasher.finish(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> &NodeOp {
        &self.op
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }

    pub fn operands(&self) -> &[Output] {
        &self.operands
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Structural hash over kind, shape, payload and operands.
    pub fn hash(&self) -> ContentHash {
        self.hash
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, shape={}", self.kind(), self.shape)?;
        if self.num_outputs != 1 {
            write!(f, ", num_outputs={}", self.num_outputs)?;
        }
        match &self.op {
            NodeOp::Constant(value) => write!(f, ", value={value}"),
            NodeOp::DeviceData(data) => write!(f, ", device={}", data.device()),
            NodeOp::Binary(_) => Ok(()),
        }
    }
}

/// One output of a node.
#[derive(Debug, Clone)]
pub struct Output {
    pub node: NodeRef,
    pub index: usize,
}

impl Output {
    pub fn new(node: NodeRef, index: usize) -> Self {
        Self { node, index }
    }

    pub fn shape(&self) -> &Shape {
        self.node.shape()
    }
}

impl From<NodeRef> for Output {
    fn from(node: NodeRef) -> Self {
        Output::new(node, 0)
    }
}

impl From<&NodeRef> for Output {
    fn from(node: &NodeRef) -> Self {
        Output::new(Arc::clone(node), 0)
    }
}

/// Topological order of everything reachable from `roots`, operands first.
///
/// Each node appears once even when reachable along several paths.
pub fn post_order(roots: &[NodeRef]) -> Vec<NodeRef> {
    let mut order = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<(NodeRef, usize)> = Vec::new();

    for root in roots {
        if visited.contains(&root.id()) {
            continue;
        }
        stack.push((Arc::clone(root), 0));
        while let Some((node, next)) = stack.pop() {
            if visited.contains(&node.id()) {
                continue;
            }
            if let Some(operand) = node.operands().get(next) {
                let child = Arc::clone(&operand.node);
                stack.push((node, next + 1));
                if !visited.contains(&child.id()) {
                    stack.push((child, 0));
                }
            } else {
                visited.insert(node.id());
                order.push(node);
            }
        }
    }
    order
}
