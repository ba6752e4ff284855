use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A named, shaped, byte-serialized tensor crossing the inference boundary
#[derive(Debug, Clone, PartialEq)]
pub struct TensorRecord {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Bytes,
}

/// Acknowledgement collected when an upload stream is closed
#[derive(Debug, Clone, Copy)]
pub struct UploadAck {
    pub accepted: bool,
}

/// Write side of one artifact upload stream.
///
/// Mirrors the discipline of a streaming RPC writer: `write` pushes one chunk
/// and reports a broken stream as false, `finish` closes the write side and
/// collects the server's final status. `finish` must be reached on every exit
/// path so the stream is never leaked half-open.
pub trait ChunkSink {
    fn write(&mut self, chunk: Bytes) -> bool;
    fn finish(self: Box<Self>) -> Result<UploadAck>;
}

/// Opaque bidirectional channel to the inference server.
///
/// One outstanding call at a time; calls block until completion or deadline.
pub trait InferenceTransport {
    /// Empty readiness probe
    fn prepare(&mut self, timeout: Duration) -> Result<bool>;

    /// Open the upload stream for the topology artifact
    fn open_topology_stream(&mut self) -> Result<Box<dyn ChunkSink>>;

    /// Open the upload stream for the weights artifact
    fn open_weights_stream(&mut self) -> Result<Box<dyn ChunkSink>>;

    /// Single tensor-exchange inference call
    fn infer(&mut self, inputs: &[TensorRecord], timeout: Duration) -> Result<Vec<TensorRecord>>;
}
