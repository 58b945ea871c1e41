//! Constructors for the node kinds backends understand.

use std::sync::Arc;

use crate::ir::{BinOp, Node, NodeOp, NodeRef, Output};
use crate::runtime::data::DataHandle;
use crate::types::{Scalar, ScalarType, Shape};

/// Constant node broadcasting `value` over `shape`.
pub fn scalar(value: Scalar, shape: Shape) -> NodeRef {
    Node::new(NodeOp::Constant(value), Vec::new(), shape, 1)
}

/// Rank-0 constant of the given element type.
pub fn scalar_of_type(value: Scalar, scalar_type: ScalarType) -> NodeRef {
    scalar(value, Shape::scalar(scalar_type))
}

/// Leaf wrapping backend-resident data. Lowered as a computation parameter.
pub fn device_data(data: DataHandle) -> NodeRef {
    let shape = data.shape().clone();
    Node::new(NodeOp::DeviceData(data), Vec::new(), shape, 1)
}

/// Elementwise binary node. The result takes the left operand's shape;
/// operand agreement is checked by the backend at compile time.
pub fn binary(op: BinOp, lhs: Output, rhs: Output) -> NodeRef {
    let shape = lhs.shape().clone();
    Node::new(NodeOp::Binary(op), vec![lhs, rhs], shape, 1)
}

/// The data handle behind a device-data node.
pub fn device_data_handle(node: &NodeRef) -> Option<DataHandle> {
    match node.op() {
        NodeOp::DeviceData(data) => Some(Arc::clone(data)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::scalar_hash;
    use crate::ir::OpKind;

    #[test]
    fn scalar_node_renders_value() {
        let node = scalar_of_type(Scalar::Float(3.5), ScalarType::F32);
        assert_eq!(node.to_string(), "prim::Constant, shape=f32[], value=3.5");
        assert_eq!(node.kind(), OpKind::CONSTANT);
        assert_eq!(node.num_outputs(), 1);
        assert_eq!(node.op().content_hash(), scalar_hash(&Scalar::Float(3.5)));
    }

    #[test]
    fn scalar_nodes_with_equal_content_share_hash() {
        let shape = Shape::new(ScalarType::F64, vec![4]);
        let a = scalar(Scalar::Float(2.0), shape.clone());
        let b = scalar(Scalar::Float(2.0), shape.clone());
        let c = scalar(Scalar::Int(2), shape.clone());
        let d = scalar(Scalar::Float(2.0), Shape::new(ScalarType::F64, vec![5]));
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn binary_takes_left_shape() {
        let lhs = scalar(Scalar::Int(1), Shape::new(ScalarType::I32, vec![3]));
        let rhs = scalar(Scalar::Int(2), Shape::new(ScalarType::I32, vec![3]));
        let node = binary(BinOp::Add, lhs.into(), rhs.into());
        assert_eq!(node.shape().dims(), &[3]);
        assert_eq!(node.operands().len(), 2);
        assert!(device_data_handle(&node).is_none());
    }
}
