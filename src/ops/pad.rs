use log::error;

use crate::error::{Error, Result};
use crate::graph::{Node, NodeRef};
use crate::lowering::LoweringContext;
use crate::model::{OperandType, OperationIndex};
use crate::ops::registry::OperationLowering;

/// PAD with an implicit zero fill value
#[derive(Debug)]
pub struct Pad {
    operation_index: OperationIndex,
}

impl Pad {
    pub fn new(operation_index: OperationIndex) -> Self {
        Self { operation_index }
    }
}

impl OperationLowering for Pad {
    fn validate(&self, ctx: &LoweringContext) -> bool {
        validate_pad_common(ctx, self.operation_index)
    }

    fn create_node(&self, ctx: &mut LoweringContext) -> Result<NodeRef> {
        let input = ctx.input_node(self.operation_index, 0)?;
        let (before, after) = split_paddings(ctx, self.operation_index)?;

        let output = Node::pad(input, before, after, None)?;
        ctx.register_if_model_output(self.operation_index, 0, &output)?;
        Ok(output)
    }
}

/// PAD_V2 with an explicit scalar fill value
#[derive(Debug)]
pub struct PadV2 {
    operation_index: OperationIndex,
}

impl PadV2 {
    pub fn new(operation_index: OperationIndex) -> Self {
        Self { operation_index }
    }
}

impl OperationLowering for PadV2 {
    fn validate(&self, ctx: &LoweringContext) -> bool {
        if !validate_pad_common(ctx, self.operation_index) {
            return false;
        }
        // Fill value is a scalar float constant input
        if !ctx.check_input_operand_type(self.operation_index, 2, OperandType::Float32) {
            return false;
        }
        let Ok(fill_operand) = ctx.operation_input(self.operation_index, 2) else {
            return false;
        };
        if !ctx.is_operand_const(fill_operand) {
            error!("PadV2: only constant fill values are supported");
            return false;
        }
        true
    }

    fn create_node(&self, ctx: &mut LoweringContext) -> Result<NodeRef> {
        let input = ctx.input_node(self.operation_index, 0)?;
        let (before, after) = split_paddings(ctx, self.operation_index)?;
        let fill: f32 = ctx.parse_operation_input(self.operation_index, 2)?;

        let output = Node::pad(input, before, after, Some(fill))?;
        ctx.register_if_model_output(self.operation_index, 0, &output)?;
        Ok(output)
    }
}

fn validate_pad_common(ctx: &LoweringContext, operation_index: OperationIndex) -> bool {
    // Check output type
    if !ctx.check_output_operand_type(operation_index, 0, OperandType::TensorFloat32) {
        return false;
    }

    // Check data and paddings input types
    if !ctx.check_input_operand_type(operation_index, 0, OperandType::TensorFloat32) {
        return false;
    }
    if !ctx.check_input_operand_type(operation_index, 1, OperandType::TensorInt32) {
        return false;
    }

    // Check input rank
    let input_rank = match ctx.input_operand_dimensions(operation_index, 0) {
        Ok(dims) => dims.len(),
        Err(_) => return false,
    };
    if input_rank > 4 {
        return false;
    }
    if input_rank < 2 {
        return false;
    }

    // Padding amounts must be resolvable at lowering time
    let Ok(pad_operand) = ctx.operation_input(operation_index, 1) else {
        return false;
    };
    if !ctx.is_operand_const(pad_operand) {
        error!("Pad: only constant paddings are supported");
        return false;
    }

    true
}

/// Split the flat [rank, 2] paddings constant into before/after vectors of
/// length equal to the input rank
fn split_paddings(
    ctx: &LoweringContext,
    operation_index: OperationIndex,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let rank = ctx.input_operand_dimensions(operation_index, 0)?.len();
    let pad_operand = ctx.operation_input(operation_index, 1)?;
    let flat = ctx.const_i32_array(pad_operand)?;
    if flat.len() != 2 * rank {
        return Err(Error::InvalidModel(format!(
            "paddings operand holds {} values, expected {}",
            flat.len(),
            2 * rank
        )));
    }

    let mut before = Vec::with_capacity(rank);
    let mut after = Vec::with_capacity(rank);
    for pair in flat.chunks_exact(2) {
        if pair[0] < 0 || pair[1] < 0 {
            return Err(Error::InvalidModel(format!(
                "negative padding amount ({}, {})",
                pair[0], pair[1]
            )));
        }
        before.push(pair[0] as usize);
        after.push(pair[1] as usize);
    }
    Ok((before, after))
}
