use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status};

use crate::client::transport::{ChunkSink, InferenceTransport, TensorRecord, UploadAck};
use crate::error::{Error, Result};
use crate::proto::{ArtifactChunk, InferRequest, InferenceClient, PrepareRequest, StatusReply, TensorBlob};

/// Streaming-RPC transport to the inference server.
///
/// Owns its runtime so the public surface stays blocking; the channel connects
/// lazily and the readiness probe is the first real exchange.
pub struct GrpcTransport {
    runtime: Runtime,
    client: InferenceClient<Channel>,
}

enum UploadKind {
    Topology,
    Weights,
}

impl GrpcTransport {
    pub fn connect(endpoint: &str) -> Result<Self> {
        let runtime = Builder::new_multi_thread().enable_all().build()?;
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| Error::Transport(format!("invalid endpoint {}: {}", endpoint, e)))?
            .connect_lazy();
        Ok(Self {
            runtime,
            client: InferenceClient::new(channel),
        })
    }

    fn open_stream(&mut self, kind: UploadKind) -> Result<Box<dyn ChunkSink>> {
        let (tx, rx) = mpsc::channel::<ArtifactChunk>(8);
        let mut client = self.client.clone();
        let outbound = ReceiverStream::new(rx);
        let call = self.runtime.spawn(async move {
            match kind {
                UploadKind::Topology => client.upload_topology(Request::new(outbound)).await,
                UploadKind::Weights => client.upload_weights(Request::new(outbound)).await,
            }
        });
        Ok(Box::new(GrpcChunkSink {
            tx: Some(tx),
            handle: self.runtime.handle().clone(),
            call,
        }))
    }
}

impl InferenceTransport for GrpcTransport {
    fn prepare(&mut self, timeout: Duration) -> Result<bool> {
        let mut request = Request::new(PrepareRequest { value: String::new() });
        request.set_timeout(timeout);
        let call = self.client.prepare(request);
        let reply = self.runtime.block_on(async {
            tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| deadline_exceeded(timeout))?
                .map_err(Error::from)
        })?;
        Ok(reply.into_inner().status)
    }

    fn open_topology_stream(&mut self) -> Result<Box<dyn ChunkSink>> {
        self.open_stream(UploadKind::Topology)
    }

    fn open_weights_stream(&mut self) -> Result<Box<dyn ChunkSink>> {
        self.open_stream(UploadKind::Weights)
    }

    fn infer(&mut self, inputs: &[TensorRecord], timeout: Duration) -> Result<Vec<TensorRecord>> {
        let data_tensors = inputs
            .iter()
            .map(|record| TensorBlob {
                node_name: record.name.clone(),
                tensor_shape: record.shape.iter().map(|&dim| dim as u64).collect(),
                data: record.data.to_vec(),
            })
            .collect();
        let mut request = Request::new(InferRequest { data_tensors });
        request.set_timeout(timeout);
        let call = self.client.infer(request);
        let reply = self.runtime.block_on(async {
            tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| deadline_exceeded(timeout))?
                .map_err(Error::from)
        })?;
        Ok(reply
            .into_inner()
            .data_tensors
            .into_iter()
            .map(|blob| TensorRecord {
                name: blob.node_name,
                shape: blob.tensor_shape.into_iter().map(|dim| dim as usize).collect(),
                data: Bytes::from(blob.data),
            })
            .collect())
    }
}

fn deadline_exceeded(timeout: Duration) -> Error {
    Error::Transport(format!("deadline of {:?} exceeded", timeout))
}

struct GrpcChunkSink {
    tx: Option<mpsc::Sender<ArtifactChunk>>,
    handle: Handle,
    call: JoinHandle<std::result::Result<Response<StatusReply>, Status>>,
}

impl ChunkSink for GrpcChunkSink {
    fn write(&mut self, chunk: Bytes) -> bool {
        match &self.tx {
            Some(tx) => tx.blocking_send(ArtifactChunk { data: chunk.to_vec() }).is_ok(),
            None => false,
        }
    }

    fn finish(mut self: Box<Self>) -> Result<UploadAck> {
        // Dropping the sender closes the write side of the stream
        self.tx.take();
        let call = self.call;
        let reply = self
            .handle
            .block_on(call)
            .map_err(|e| Error::Transport(format!("upload task failed: {}", e)))??;
        Ok(UploadAck {
            accepted: reply.into_inner().status,
        })
    }
}
