use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::graph::{ElementType, Network, Node, NodeRef};
use crate::model::{
    ConstScalar, ModelInfo, OperandIndex, OperandLifetime, OperandType, OperationIndex,
};
use crate::ops::registry;

/// Per-compilation lowering state shared by every operator rule.
///
/// Holds the backend graph under construction, plus the operand-to-node cache
/// that guarantees each operand is lowered at most once regardless of fan-out.
pub struct LoweringContext<'m> {
    model: &'m ModelInfo,
    network: Network,
    node_cache: HashMap<OperandIndex, NodeRef>,
    visiting: HashSet<OperandIndex>,
}

impl<'m> LoweringContext<'m> {
    pub fn new(model: &'m ModelInfo) -> Self {
        Self {
            model,
            network: Network::new(),
            node_cache: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    pub fn model(&self) -> &ModelInfo {
        self.model
    }

    /// Hand the finished graph back to the caller
    pub fn into_network(self) -> Network {
        self.network
    }

    /// Operand index bound to an operation's input slot
    pub fn operation_input(&self, operation: OperationIndex, slot: usize) -> Result<OperandIndex> {
        self.model.operation_input(operation, slot)
    }

    /// Operand index bound to an operation's output slot
    pub fn operation_output(&self, operation: OperationIndex, slot: usize) -> Result<OperandIndex> {
        self.model.operation_output(operation, slot)
    }

    /// Check an input operand's element type against an expectation
    pub fn check_input_operand_type(
        &self,
        operation: OperationIndex,
        slot: usize,
        expected: OperandType,
    ) -> bool {
        match self
            .model
            .operation_input(operation, slot)
            .and_then(|index| self.model.operand(index))
        {
            Ok(operand) => operand.operand_type == expected,
            Err(_) => false,
        }
    }

    /// Check an output operand's element type against an expectation
    pub fn check_output_operand_type(
        &self,
        operation: OperationIndex,
        slot: usize,
        expected: OperandType,
    ) -> bool {
        match self
            .model
            .operation_output(operation, slot)
            .and_then(|index| self.model.operand(index))
        {
            Ok(operand) => operand.operand_type == expected,
            Err(_) => false,
        }
    }

    /// Dimension sequence of the operand bound to an input slot
    pub fn input_operand_dimensions(
        &self,
        operation: OperationIndex,
        slot: usize,
    ) -> Result<&'m [usize]> {
        let index = self.model.operation_input(operation, slot)?;
        self.model.operand_dimensions(index)
    }

    pub fn is_operand_const(&self, index: OperandIndex) -> bool {
        self.model.is_operand_const(index)
    }

    /// Read a compile-time-constant scalar bound to an input slot
    pub fn parse_operation_input<T: ConstScalar>(
        &self,
        operation: OperationIndex,
        slot: usize,
    ) -> Result<T> {
        self.model.parse_operation_input(operation, slot)
    }

    /// Read a compile-time-constant i32 tensor as a flat vector
    pub fn const_i32_array(&self, index: OperandIndex) -> Result<Vec<i32>> {
        self.model.const_i32_array(index)
    }

    /// Fetch the node for an operation's input slot, lowering the producing
    /// operation first if it has not been built yet
    pub fn input_node(&mut self, operation: OperationIndex, slot: usize) -> Result<NodeRef> {
        let index = self.model.operation_input(operation, slot)?;
        self.operand_node(index)
    }

    /// Fetch (or build and cache) the node holding an operand's value
    pub fn operand_node(&mut self, index: OperandIndex) -> Result<NodeRef> {
        if let Some(node) = self.node_cache.get(&index) {
            return Ok(node.clone());
        }
        // Guard against malformed cyclic models: the descent must terminate
        if !self.visiting.insert(index) {
            return Err(Error::CyclicGraph(index));
        }
        let built = self.build_operand_node(index);
        self.visiting.remove(&index);
        let node = built?;
        self.node_cache.insert(index, node.clone());
        Ok(node)
    }

    fn build_operand_node(&mut self, index: OperandIndex) -> Result<NodeRef> {
        let operand = self.model.operand(index)?;
        match operand.lifetime {
            OperandLifetime::Constant => {
                let data = operand.data.clone().ok_or_else(|| {
                    Error::InvalidModel(format!("constant operand {} has no payload", index))
                })?;
                Ok(Node::constant(
                    backend_element_type(operand.operand_type),
                    operand.shape.clone(),
                    data,
                ))
            }
            OperandLifetime::ModelInput => {
                let node = Node::parameter(
                    format!("input_{}", index),
                    backend_element_type(operand.operand_type),
                    operand.shape.clone(),
                );
                self.network.add_parameter(node.clone());
                Ok(node)
            }
            OperandLifetime::Temporary | OperandLifetime::ModelOutput => {
                let producer = self.model.producer_of(index).ok_or_else(|| {
                    Error::InvalidGraph(format!("operand {} has no producing operation", index))
                })?;
                let operation = self.model.operation(producer)?;
                let rule = registry::rule_for(operation.kind, producer);
                rule.create_node(self)
            }
        }
    }

    /// Register the node as a named graph result if the operation's output
    /// operand has `ModelOutput` lifetime
    pub fn register_if_model_output(
        &mut self,
        operation: OperationIndex,
        slot: usize,
        node: &NodeRef,
    ) -> Result<()> {
        let index = self.model.operation_output(operation, slot)?;
        if self.model.operand(index)?.lifetime == OperandLifetime::ModelOutput {
            self.network.add_result(index, node.clone());
        }
        Ok(())
    }
}

fn backend_element_type(operand_type: OperandType) -> ElementType {
    match operand_type {
        OperandType::Float32 | OperandType::TensorFloat32 => ElementType::F32,
        OperandType::TensorFloat16 => ElementType::F16,
        OperandType::Int32 | OperandType::TensorInt32 => ElementType::I32,
        OperandType::TensorQuant8Asymm => ElementType::U8,
        OperandType::Bool => ElementType::Boolean,
    }
}
