use bytes::Bytes;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};

/// Index of an operand within the model
pub type OperandIndex = usize;

/// Index of an operation within the model
pub type OperationIndex = usize;

/// Element types an operand can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperandType {
    Float32,
    Int32,
    Bool,
    TensorFloat32,
    TensorFloat16,
    TensorInt32,
    TensorQuant8Asymm,
}

impl OperandType {
    /// Width of one element in bytes
    pub fn byte_width(&self) -> usize {
        match self {
            OperandType::Float32 | OperandType::Int32 | OperandType::TensorFloat32 | OperandType::TensorInt32 => 4,
            OperandType::TensorFloat16 => 2,
            OperandType::Bool | OperandType::TensorQuant8Asymm => 1,
        }
    }

    /// Check if the type describes a tensor rather than a scalar
    pub fn is_tensor(&self) -> bool {
        matches!(
            self,
            OperandType::TensorFloat32
                | OperandType::TensorFloat16
                | OperandType::TensorInt32
                | OperandType::TensorQuant8Asymm
        )
    }
}

/// How an operand's value comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLifetime {
    ModelInput,
    ModelOutput,
    Temporary,
    Constant,
}

/// A typed tensor or scalar value in the model graph
#[derive(Debug, Clone)]
pub struct Operand {
    pub operand_type: OperandType,
    pub shape: Vec<usize>,
    pub lifetime: OperandLifetime,
    /// Immutable payload, present only for `Constant` operands
    pub data: Option<Bytes>,
}

impl Operand {
    /// Number of elements described by the shape (1 for scalars)
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Operator kinds the lowering catalog knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum OperationKind {
    Pad,
    PadV2,
    Relu,
}

/// A single computational step referencing operands by index
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub inputs: Vec<OperandIndex>,
    pub outputs: Vec<OperandIndex>,
}

/// Scalar values readable from a constant operand at lowering time
pub trait ConstScalar: Sized {
    fn operand_type() -> OperandType;
    fn read_le(bytes: &[u8]) -> Option<Self>;
}

impl ConstScalar for f32 {
    fn operand_type() -> OperandType {
        OperandType::Float32
    }

    fn read_le(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.try_into().ok()?;
        Some(f32::from_le_bytes(raw))
    }
}

impl ConstScalar for i32 {
    fn operand_type() -> OperandType {
        OperandType::Int32
    }

    fn read_le(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.try_into().ok()?;
        Some(i32::from_le_bytes(raw))
    }
}

/// Read-only queryable store of the operands and operations that make up a model.
///
/// Assembled once by the loader, then treated as immutable input to lowering.
#[derive(Debug, Default)]
pub struct ModelInfo {
    operands: Vec<Operand>,
    operations: Vec<Operation>,
}

impl ModelInfo {
    /// Assemble a model, enforcing structural invariants on the way in
    pub fn new(operands: Vec<Operand>, operations: Vec<Operation>) -> Result<Self> {
        for (index, operand) in operands.iter().enumerate() {
            match operand.lifetime {
                OperandLifetime::Constant => {
                    let data = operand.data.as_ref().ok_or_else(|| {
                        Error::InvalidModel(format!("constant operand {} has no payload", index))
                    })?;
                    let expected = operand.element_count() * operand.operand_type.byte_width();
                    if data.len() != expected {
                        return Err(Error::InvalidModel(format!(
                            "constant operand {} payload is {} bytes, expected {}",
                            index,
                            data.len(),
                            expected
                        )));
                    }
                }
                _ => {
                    if operand.data.is_some() {
                        return Err(Error::InvalidModel(format!(
                            "non-constant operand {} carries a payload",
                            index
                        )));
                    }
                }
            }
        }

        for (index, operation) in operations.iter().enumerate() {
            for &operand in operation.inputs.iter().chain(operation.outputs.iter()) {
                if operand >= operands.len() {
                    return Err(Error::InvalidModel(format!(
                        "operation {} references operand {} out of range",
                        index, operand
                    )));
                }
            }
        }

        Ok(Self { operands, operations })
    }

    /// Fetch an operand by index
    pub fn operand(&self, index: OperandIndex) -> Result<&Operand> {
        self.operands
            .get(index)
            .ok_or_else(|| Error::InvalidModel(format!("operand {} out of range", index)))
    }

    /// Fetch an operation by index
    pub fn operation(&self, index: OperationIndex) -> Result<&Operation> {
        self.operations
            .get(index)
            .ok_or_else(|| Error::InvalidModel(format!("operation {} out of range", index)))
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Operand index bound to an operation's input slot
    pub fn operation_input(&self, operation: OperationIndex, slot: usize) -> Result<OperandIndex> {
        let op = self.operation(operation)?;
        op.inputs.get(slot).copied().ok_or_else(|| {
            Error::InvalidModel(format!("operation {} has no input slot {}", operation, slot))
        })
    }

    /// Operand index bound to an operation's output slot
    pub fn operation_output(&self, operation: OperationIndex, slot: usize) -> Result<OperandIndex> {
        let op = self.operation(operation)?;
        op.outputs.get(slot).copied().ok_or_else(|| {
            Error::InvalidModel(format!("operation {} has no output slot {}", operation, slot))
        })
    }

    /// Check whether an operand's value is fixed at compile time
    pub fn is_operand_const(&self, index: OperandIndex) -> bool {
        self.operands
            .get(index)
            .map(|operand| operand.lifetime == OperandLifetime::Constant)
            .unwrap_or(false)
    }

    /// Dimension sequence of an operand
    pub fn operand_dimensions(&self, index: OperandIndex) -> Result<&[usize]> {
        Ok(&self.operand(index)?.shape)
    }

    /// Operation producing the given operand, if any
    pub fn producer_of(&self, operand: OperandIndex) -> Option<OperationIndex> {
        self.operations
            .iter()
            .position(|operation| operation.outputs.contains(&operand))
    }

    /// Read a compile-time-constant scalar bound to an operation input slot
    pub fn parse_operation_input<T: ConstScalar>(
        &self,
        operation: OperationIndex,
        slot: usize,
    ) -> Result<T> {
        let index = self.operation_input(operation, slot)?;
        let operand = self.operand(index)?;
        if operand.lifetime != OperandLifetime::Constant {
            return Err(Error::InvalidModel(format!(
                "operand {} is not a compile-time constant",
                index
            )));
        }
        if operand.operand_type != T::operand_type() {
            return Err(Error::InvalidModel(format!(
                "operand {} is {}, expected {}",
                index,
                operand.operand_type,
                T::operand_type()
            )));
        }
        let data = operand.data.as_ref().ok_or_else(|| {
            Error::InvalidModel(format!("constant operand {} has no payload", index))
        })?;
        T::read_le(data).ok_or_else(|| {
            Error::InvalidModel(format!("constant operand {} payload is malformed", index))
        })
    }

    /// Read a compile-time-constant i32 tensor as a flat vector
    pub fn const_i32_array(&self, index: OperandIndex) -> Result<Vec<i32>> {
        let operand = self.operand(index)?;
        if operand.lifetime != OperandLifetime::Constant {
            return Err(Error::InvalidModel(format!(
                "operand {} is not a compile-time constant",
                index
            )));
        }
        if operand.operand_type != OperandType::TensorInt32 {
            return Err(Error::InvalidModel(format!(
                "operand {} is {}, expected TensorInt32",
                index, operand.operand_type
            )));
        }
        let data = operand.data.as_ref().ok_or_else(|| {
            Error::InvalidModel(format!("constant operand {} has no payload", index))
        })?;
        Ok(data
            .chunks_exact(4)
            .map(|raw| i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect())
    }
}
