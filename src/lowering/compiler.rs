use log::{error, info};

use crate::error::{Error, Result};
use crate::graph::Network;
use crate::lowering::LoweringContext;
use crate::model::ModelInfo;
use crate::ops::registry;

/// Drives whole-model compilation: validate every operation, then lower the
/// graph through the shared operand cache.
pub struct GraphCompiler;

impl GraphCompiler {
    pub fn compile(model: &ModelInfo) -> Result<Network> {
        let mut ctx = LoweringContext::new(model);

        // Every operation must pass validation before any node is constructed;
        // a single rejection fails the whole compile.
        for index in 0..model.operation_count() {
            let operation = model.operation(index)?;
            let rule = registry::rule_for(operation.kind, index);
            if !rule.validate(&ctx) {
                error!("operation {} ({}) failed validation", index, operation.kind);
                return Err(Error::UnsupportedOperation {
                    index,
                    kind: operation.kind.to_string(),
                });
            }
        }

        for index in 0..model.operation_count() {
            let outputs = model.operation(index)?.outputs.clone();
            for operand in outputs {
                ctx.operand_node(operand)?;
            }
        }

        let network = ctx.into_network();
        info!(
            "lowered {} operations into {} parameters and {} results",
            model.operation_count(),
            network.parameters().len(),
            network.results().len()
        );
        Ok(network)
    }
}
