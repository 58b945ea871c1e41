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

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::ir::{NodeId, NodeOp, NodeRef, Output};

/// Format a post-order into a stable, human-readable string.
///
/// Values are numbered by position so the text does not depend on global
/// node ids. Operands produced outside the sequence print as `@<id>`.
pub fn format_post_order(nodes: &[NodeRef]) -> String {
    let positions: HashMap<NodeId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(pos, node)| (node.id(), pos))
        .collect();

    let mut out = String::new();
    write_graph(&mut out, nodes, &positions).expect("write to string cannot fail");
    out
}

fn write_graph(out: &mut String, nodes: &[NodeRef], positions: &HashMap<NodeId, usize>) -> fmt::Result {
    writeln!(out, "graph {{")?;
    for (pos, node) in nodes.iter().enumerate() {
        let operands: Vec<String> = node
            .operands()
            .iter()
            .map(|operand| operand_name(operand, positions))
            .collect();
        write!(out, "  %{pos} = {} {}", node.kind(), node.shape())?;
        if !operands.is_empty() {
            write!(out, " ({})", operands.join(", "))?;
        }
        match node.op() {
            NodeOp::Constant(value) => write!(out, " value={value}")?,
            NodeOp::DeviceData(data) => write!(out, " device={}", data.device())?,
            NodeOp::Binary(_) => {}
        }
        writeln!(out, "  // hash={}", node.hash())?;
    }
    writeln!(out, "}}  // nodes = {}", nodes.len())
}

fn operand_name(operand: &Output, positions: &HashMap<NodeId, usize>) -> String {
    let base = match positions.get(&operand.node.id()) {
        Some(pos) => format!("%{pos}"),
        None => format!("@{}", operand.node.id().0),
    };
    if operand.index == 0 {
        base
    } else {
        format!("{base}.{}", operand.index)
    }
}
