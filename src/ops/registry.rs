use std::fmt::Debug;

use crate::error::Result;
use crate::graph::NodeRef;
use crate::lowering::LoweringContext;
use crate::model::{OperationIndex, OperationKind};

/// Contract every operator lowering rule satisfies.
///
/// `validate` is a pure predicate over the operand records reachable from the
/// rule's operation; returning false is an expected outcome the compiler
/// branches on, never an error. `create_node` is only invoked after `validate`
/// returned true and yields the operation's single output node.
pub trait OperationLowering: Debug {
    fn validate(&self, ctx: &LoweringContext) -> bool;
    fn create_node(&self, ctx: &mut LoweringContext) -> Result<NodeRef>;
}

/// Resolve the lowering rule for an operation kind
pub fn rule_for(kind: OperationKind, operation_index: OperationIndex) -> Box<dyn OperationLowering> {
    match kind {
        OperationKind::Pad => Box::new(crate::ops::pad::Pad::new(operation_index)),
        OperationKind::PadV2 => Box::new(crate::ops::pad::PadV2::new(operation_index)),
        OperationKind::Relu => Box::new(crate::ops::activations::Relu::new(operation_index)),
    }
}
