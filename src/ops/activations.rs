use crate::error::Result;
use crate::graph::{Node, NodeRef};
use crate::lowering::LoweringContext;
use crate::model::{OperandType, OperationIndex};
use crate::ops::registry::OperationLowering;

/// RELU, elementwise max(x, 0)
#[derive(Debug)]
pub struct Relu {
    operation_index: OperationIndex,
}

impl Relu {
    pub fn new(operation_index: OperationIndex) -> Self {
        Self { operation_index }
    }
}

impl OperationLowering for Relu {
    fn validate(&self, ctx: &LoweringContext) -> bool {
        if !ctx.check_output_operand_type(self.operation_index, 0, OperandType::TensorFloat32) {
            return false;
        }
        if !ctx.check_input_operand_type(self.operation_index, 0, OperandType::TensorFloat32) {
            return false;
        }

        match ctx.input_operand_dimensions(self.operation_index, 0) {
            Ok(dims) => !dims.is_empty(),
            Err(_) => false,
        }
    }

    fn create_node(&self, ctx: &mut LoweringContext) -> Result<NodeRef> {
        let input = ctx.input_node(self.operation_index, 0)?;
        let output = Node::relu(input);
        ctx.register_if_model_output(self.operation_index, 0, &output)?;
        Ok(output)
    }
}
