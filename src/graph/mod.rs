pub mod fold;

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use log::debug;

use crate::error::{Error, Result};

/// Shared handle to a backend node; the graph owns nodes once created
pub type NodeRef = Arc<Node>;

/// Element types the backend graph understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F16,
    I32,
    U8,
    Boolean,
}

/// What a backend node computes
#[derive(Debug)]
pub enum NodeKind {
    /// Named graph input fed at inference time
    Parameter { name: String },
    /// Compile-time constant payload
    Constant { data: Bytes },
    /// Constant-mode padding; `value` of None means a zero fill
    Pad {
        before: Vec<usize>,
        after: Vec<usize>,
        value: Option<f32>,
    },
    /// Elementwise max(x, 0)
    Relu,
}

/// One value node in the backend computation graph
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub element_type: ElementType,
    pub shape: Vec<usize>,
    pub inputs: Vec<NodeRef>,
}

impl Node {
    /// Create a named graph input
    pub fn parameter(name: impl Into<String>, element_type: ElementType, shape: Vec<usize>) -> NodeRef {
        Arc::new(Node {
            kind: NodeKind::Parameter { name: name.into() },
            element_type,
            shape,
            inputs: Vec::new(),
        })
    }

    /// Create a constant node from an immutable payload
    pub fn constant(element_type: ElementType, shape: Vec<usize>, data: Bytes) -> NodeRef {
        Arc::new(Node {
            kind: NodeKind::Constant { data },
            element_type,
            shape,
            inputs: Vec::new(),
        })
    }

    /// Create a constant-fill pad of `input` by (before, after) per dimension
    pub fn pad(
        input: NodeRef,
        before: Vec<usize>,
        after: Vec<usize>,
        value: Option<f32>,
    ) -> Result<NodeRef> {
        let rank = input.shape.len();
        if before.len() != rank || after.len() != rank {
            return Err(Error::InvalidGraph(format!(
                "pad vectors of length {}/{} do not match input rank {}",
                before.len(),
                after.len(),
                rank
            )));
        }
        let shape = input
            .shape
            .iter()
            .zip(before.iter().zip(after.iter()))
            .map(|(&dim, (&b, &a))| dim + b + a)
            .collect();
        let element_type = input.element_type;
        Ok(Arc::new(Node {
            kind: NodeKind::Pad { before, after, value },
            element_type,
            shape,
            inputs: vec![input],
        }))
    }

    /// Create an elementwise relu of `input`
    pub fn relu(input: NodeRef) -> NodeRef {
        let element_type = input.element_type;
        let shape = input.shape.clone();
        Arc::new(Node {
            kind: NodeKind::Relu,
            element_type,
            shape,
            inputs: vec![input],
        })
    }

    /// Name of a parameter node, if this is one
    pub fn parameter_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Parameter { name } => Some(name),
            _ => None,
        }
    }
}

/// A graph result registered under the name used during tensor exchange
#[derive(Debug, Clone)]
pub struct NamedResult {
    pub operand_index: usize,
    pub name: String,
    pub node: NodeRef,
}

/// The backend computation graph being assembled during lowering
#[derive(Debug, Default)]
pub struct Network {
    parameters: Vec<NodeRef>,
    results: Vec<NamedResult>,
    registered: HashSet<usize>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(&mut self, node: NodeRef) {
        self.parameters.push(node);
    }

    /// Register a node as a named graph result.
    ///
    /// Idempotent per operand index: repeat registrations are ignored.
    pub fn add_result(&mut self, operand_index: usize, node: NodeRef) {
        if !self.registered.insert(operand_index) {
            debug!("result for operand {} already registered", operand_index);
            return;
        }
        self.results.push(NamedResult {
            operand_index,
            name: format!("output_{}", operand_index),
            node,
        });
    }

    pub fn parameters(&self) -> &[NodeRef] {
        &self.parameters
    }

    pub fn results(&self) -> &[NamedResult] {
        &self.results
    }

    /// Look up a registered result by its exchange name
    pub fn result(&self, name: &str) -> Option<&NodeRef> {
        self.results
            .iter()
            .find(|result| result.name == name)
            .map(|result| &result.node)
    }
}
