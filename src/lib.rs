pub mod client;
pub mod error;
pub mod graph;
pub mod lowering;
pub mod model;
pub mod ops;
pub mod proto;

// Re-export commonly used types
pub use client::{ClientState, OffloadClient, OffloadConfig, PackagePaths, CHUNK_SIZE};
pub use client::grpc::GrpcTransport;
pub use client::transport::{ChunkSink, InferenceTransport, TensorRecord, UploadAck};
pub use error::{Error, Result};
pub use graph::{ElementType, NamedResult, Network, Node, NodeKind, NodeRef};
pub use lowering::{GraphCompiler, LoweringContext};
pub use model::{
    ModelInfo, Operand, OperandIndex, OperandLifetime, OperandType, Operation, OperationIndex,
    OperationKind,
};
pub use ops::registry::OperationLowering;
