// Include the generated protobuf and service code
pub mod offload {
    include!(concat!(env!("OUT_DIR"), "/offload.v1.rs"));
}

// Re-export commonly used wire types
pub use offload::{
    // Service stubs
    inference_client::InferenceClient,
    inference_server::{Inference, InferenceServer},

    // Call payloads
    ArtifactChunk,
    InferReply,
    InferRequest,
    PrepareRequest,
    StatusReply,
    TensorBlob,
};
