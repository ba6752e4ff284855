pub mod grpc;
pub mod transport;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info};

use crate::client::transport::{ChunkSink, InferenceTransport, TensorRecord, UploadAck};
use crate::error::{Error, Result};

/// Fixed chunk size for artifact uploads
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Where the two compiled-model artifacts live on disk
#[derive(Debug, Clone)]
pub struct PackagePaths {
    pub topology: PathBuf,
    pub weights: PathBuf,
}

/// Client configuration: package location plus per-call deadlines
#[derive(Debug, Clone)]
pub struct OffloadConfig {
    pub package: PackagePaths,
    pub probe_timeout: Duration,
    pub infer_timeout: Duration,
}

impl OffloadConfig {
    pub fn new(package: PackagePaths) -> Self {
        Self {
            package,
            probe_timeout: Duration::from_secs(1),
            infer_timeout: Duration::from_secs(1),
        }
    }
}

/// Client lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Preparing,
    Uploading,
    Ready,
    Inferring,
    Failed,
}

/// Offloads a compiled-model package to a remote inference server and runs
/// tensor-exchange inference calls against it.
///
/// One outstanding call at a time; every remote call blocks until completion
/// or deadline.
pub struct OffloadClient<T: InferenceTransport> {
    transport: T,
    config: OffloadConfig,
    state: ClientState,
    package_uploaded: bool,
    inputs: Vec<TensorRecord>,
    outputs: Vec<TensorRecord>,
    last_infer_ok: bool,
}

impl<T: InferenceTransport> OffloadClient<T> {
    pub fn new(transport: T, config: OffloadConfig) -> Self {
        Self {
            transport,
            config,
            state: ClientState::Disconnected,
            package_uploaded: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            last_infer_ok: false,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// One-shot readiness probe.
    ///
    /// `Ok(bool)` reflects the server's reported status; a transport failure
    /// surfaces the transport's message and leaves the client disconnected.
    pub fn prepare(&mut self) -> Result<bool> {
        self.state = ClientState::Preparing;
        match self.transport.prepare(self.config.probe_timeout) {
            Ok(ready) => {
                info!("server readiness: {}", ready);
                Ok(ready)
            }
            Err(e) => {
                self.state = ClientState::Disconnected;
                Err(e)
            }
        }
    }

    /// Stream the two-artifact package to the server: topology first, then
    /// weights only after the topology upload is acknowledged.
    pub fn upload_package(&mut self) -> Result<()> {
        self.state = ClientState::Uploading;
        match self.upload_both() {
            Ok(()) => {
                self.package_uploaded = true;
                self.state = ClientState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("package upload failed: {}", e);
                self.state = ClientState::Failed;
                Err(e)
            }
        }
    }

    fn upload_both(&mut self) -> Result<()> {
        let topology = self.config.package.topology.clone();
        let file = open_artifact(&topology)?;
        let sink = self.transport.open_topology_stream()?;
        let ack = send_artifact(&topology, file, sink)?;
        if !ack.accepted {
            return Err(Error::UploadRejected(topology.display().to_string()));
        }

        let weights = self.config.package.weights.clone();
        let file = open_artifact(&weights)?;
        let sink = self.transport.open_weights_stream()?;
        let ack = send_artifact(&weights, file, sink)?;
        if !ack.accepted {
            return Err(Error::UploadRejected(weights.display().to_string()));
        }
        Ok(())
    }

    /// Attach one input record to the pending inference request
    pub fn add_input(&mut self, name: &str, shape: &[usize], data: &[u8]) {
        self.inputs.push(TensorRecord {
            name: name.to_string(),
            shape: shape.to_vec(),
            data: Bytes::copy_from_slice(data),
        });
    }

    /// Issue one inference call carrying all accumulated input records.
    ///
    /// `Ok` means the call transported; an empty reply is logged as a
    /// suspected server-side failure but still reported as call success, and
    /// is observable through `has_outputs`.
    pub fn infer(&mut self) -> Result<()> {
        self.state = ClientState::Inferring;
        match self.transport.infer(&self.inputs, self.config.infer_timeout) {
            Ok(outputs) => {
                if outputs.is_empty() {
                    error!("inference reply carried no tensors, server-side failure?");
                }
                self.last_infer_ok = !outputs.is_empty();
                self.outputs = outputs;
                self.state = ClientState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("inference call failed: {}", e);
                self.last_infer_ok = false;
                self.outputs.clear();
                self.state = ClientState::Failed;
                Err(e)
            }
        }
    }

    /// True when the last inference call transported and returned at least
    /// one output record
    pub fn has_outputs(&self) -> bool {
        self.last_infer_ok
    }

    /// Copy the payload of the named output record into the caller's buffer.
    ///
    /// The buffer is expected to be sized to the product of `shape` times the
    /// element width; it is left untouched when no record matches.
    pub fn get_output(&self, name: &str, dst: &mut [u8], shape: &[usize]) {
        let expected = shape.iter().product::<usize>() * std::mem::size_of::<f32>();
        if let Some(record) = self.outputs.iter().find(|record| record.name == name) {
            let len = record.data.len().min(dst.len()).min(expected);
            dst[..len].copy_from_slice(&record.data[..len]);
        }
    }

    /// Clear accumulated input and output records so the client can be reused
    /// without reconnecting or re-uploading the package
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.last_infer_ok = false;
        self.state = if self.package_uploaded {
            ClientState::Ready
        } else {
            ClientState::Disconnected
        };
    }
}

fn open_artifact(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::ArtifactError(path.to_path_buf(), e.to_string()))
}

/// Stream one artifact through a chunk sink, one fixed-size buffer at a time.
///
/// A write failure aborts the loop immediately; the stream is still finished
/// (write side closed, final status collected) on every exit path.
fn send_artifact(path: &Path, mut file: File, mut sink: Box<dyn ChunkSink>) -> Result<UploadAck> {
    debug!("streaming {} in {} byte chunks", path.display(), CHUNK_SIZE);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut failure: Option<Error> = None;

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                if !sink.write(Bytes::copy_from_slice(&buffer[..read])) {
                    error!("broken stream while uploading {}", path.display());
                    failure = Some(Error::Transport(format!(
                        "broken upload stream for {}",
                        path.display()
                    )));
                    break;
                }
            }
            Err(e) => {
                failure = Some(Error::ArtifactError(path.to_path_buf(), e.to_string()));
                break;
            }
        }
    }

    let ack = sink.finish();
    match failure {
        // Prefer the transport's own account of the broken stream when the
        // close reports one
        Some(fallback) => Err(ack.err().unwrap_or(fallback)),
        None => {
            debug!("completed upload of {}", path.display());
            ack
        }
    }
}
