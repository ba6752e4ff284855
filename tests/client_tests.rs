use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;

use nn_offload::{
    ChunkSink, ClientState, Error, InferenceTransport, OffloadClient, OffloadConfig, PackagePaths,
    Result, TensorRecord, UploadAck, CHUNK_SIZE,
};

/// Shared script + observations for the mock transport
#[derive(Debug, Default)]
struct MockScript {
    prepare_ready: bool,
    prepare_fails: bool,
    /// Fail the topology stream at this chunk index
    topology_fail_at: Option<usize>,
    upload_accepted: bool,
    infer_reply: Vec<TensorRecord>,
    infer_fails: bool,

    topology_chunks: Vec<usize>,
    weights_chunks: Vec<usize>,
    weights_opens: usize,
    streams_finished: usize,
}

#[derive(Clone)]
struct MockTransport {
    script: Arc<Mutex<MockScript>>,
}

impl MockTransport {
    fn new(script: MockScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }
}

struct MockSink {
    script: Arc<Mutex<MockScript>>,
    weights: bool,
    fail_at: Option<usize>,
    written: usize,
    broken: bool,
    finished: Arc<AtomicBool>,
}

impl ChunkSink for MockSink {
    fn write(&mut self, chunk: Bytes) -> bool {
        if self.fail_at == Some(self.written) {
            self.broken = true;
            return false;
        }
        let mut script = self.script.lock().unwrap();
        if self.weights {
            script.weights_chunks.push(chunk.len());
        } else {
            script.topology_chunks.push(chunk.len());
        }
        self.written += 1;
        true
    }

    fn finish(self: Box<Self>) -> Result<UploadAck> {
        self.finished.store(true, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        script.streams_finished += 1;
        if self.broken {
            return Err(Error::Transport("stream closed by peer".to_string()));
        }
        Ok(UploadAck {
            accepted: script.upload_accepted,
        })
    }
}

impl InferenceTransport for MockTransport {
    fn prepare(&mut self, _timeout: Duration) -> Result<bool> {
        let script = self.script.lock().unwrap();
        if script.prepare_fails {
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(script.prepare_ready)
    }

    fn open_topology_stream(&mut self) -> Result<Box<dyn ChunkSink>> {
        let fail_at = self.script.lock().unwrap().topology_fail_at;
        Ok(Box::new(MockSink {
            script: self.script.clone(),
            weights: false,
            fail_at,
            written: 0,
            broken: false,
            finished: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn open_weights_stream(&mut self) -> Result<Box<dyn ChunkSink>> {
        self.script.lock().unwrap().weights_opens += 1;
        Ok(Box::new(MockSink {
            script: self.script.clone(),
            weights: true,
            fail_at: None,
            written: 0,
            broken: false,
            finished: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn infer(&mut self, _inputs: &[TensorRecord], _timeout: Duration) -> Result<Vec<TensorRecord>> {
        let script = self.script.lock().unwrap();
        if script.infer_fails {
            return Err(Error::Transport("deadline exceeded".to_string()));
        }
        Ok(script.infer_reply.clone())
    }
}

fn package_in(dir: &TempDir, topology_len: usize, weights_len: usize) -> PackagePaths {
    let topology = dir.path().join("model.topology");
    let weights = dir.path().join("model.weights");
    fs::write(&topology, vec![0xABu8; topology_len]).unwrap();
    fs::write(&weights, vec![0xCDu8; weights_len]).unwrap();
    PackagePaths { topology, weights }
}

fn client_with(
    script: MockScript,
    package: PackagePaths,
) -> (OffloadClient<MockTransport>, Arc<Mutex<MockScript>>) {
    let transport = MockTransport::new(script);
    let observations = transport.script.clone();
    let client = OffloadClient::new(transport, OffloadConfig::new(package));
    (client, observations)
}

#[test]
fn prepare_reports_server_readiness() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        prepare_ready: true,
        ..Default::default()
    };
    let (mut client, _) = client_with(script, package_in(&dir, 10, 10));

    assert_eq!(client.prepare().unwrap(), true);
}

#[test]
fn prepare_transport_failure_leaves_disconnected() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        prepare_fails: true,
        ..Default::default()
    };
    let (mut client, _) = client_with(script, package_in(&dir, 10, 10));

    let err = client.prepare().unwrap_err();
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[test]
fn upload_chunks_both_artifacts_in_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    // Topology spans two full chunks plus a remainder; weights fit in one
    let script = MockScript {
        upload_accepted: true,
        ..Default::default()
    };
    let (mut client, observations) = client_with(script, package_in(&dir, 2 * CHUNK_SIZE + 100, 64));

    client.upload_package()?;
    assert_eq!(client.state(), ClientState::Ready);

    let script = observations.lock().unwrap();
    assert_eq!(script.topology_chunks, vec![CHUNK_SIZE, CHUNK_SIZE, 100]);
    assert_eq!(script.weights_chunks, vec![64]);
    assert_eq!(script.weights_opens, 1);
    assert_eq!(script.streams_finished, 2);
    Ok(())
}

#[test]
fn topology_write_failure_skips_weights() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        upload_accepted: true,
        topology_fail_at: Some(1),
        ..Default::default()
    };
    let (mut client, observations) = client_with(script, package_in(&dir, 3 * CHUNK_SIZE, 64));

    let err = client.upload_package().unwrap_err();
    assert!(!err.to_string().is_empty());
    assert_eq!(client.state(), ClientState::Failed);

    let script = observations.lock().unwrap();
    // Weights upload is never attempted, but the broken topology stream was
    // still closed and its final status collected
    assert_eq!(script.weights_opens, 0);
    assert!(script.weights_chunks.is_empty());
    assert_eq!(script.streams_finished, 1);
}

#[test]
fn rejected_topology_ack_skips_weights() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        upload_accepted: false,
        ..Default::default()
    };
    let (mut client, observations) = client_with(script, package_in(&dir, 100, 64));

    assert!(matches!(
        client.upload_package(),
        Err(Error::UploadRejected(_))
    ));
    assert_eq!(client.state(), ClientState::Failed);
    assert_eq!(observations.lock().unwrap().weights_opens, 0);
}

fn infer_reply(name: &str, shape: &[usize], values: &[f32]) -> TensorRecord {
    let mut raw = Vec::with_capacity(values.len() * 4);
    for value in values {
        raw.extend_from_slice(&value.to_le_bytes());
    }
    TensorRecord {
        name: name.to_string(),
        shape: shape.to_vec(),
        data: Bytes::from(raw),
    }
}

#[test]
fn infer_roundtrip_copies_named_output() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        infer_reply: vec![infer_reply("x", &[1, 3], &[1.0, 2.0, 3.0])],
        ..Default::default()
    };
    let (mut client, _) = client_with(script, package_in(&dir, 10, 10));

    client.add_input("x", &[1, 3], &[0u8; 12]);
    client.infer().unwrap();
    assert!(client.has_outputs());

    let mut buf = [0u8; 12];
    client.get_output("x", &mut buf, &[1, 3]);
    assert_eq!(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 1.0);
    assert_eq!(f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]), 3.0);

    // Unmatched name leaves the destination untouched
    let mut untouched = [0xEEu8; 12];
    client.get_output("y", &mut untouched, &[1, 3]);
    assert_eq!(untouched, [0xEEu8; 12]);
}

#[test]
fn empty_reply_is_call_success_but_not_semantic_success() {
    let dir = TempDir::new().unwrap();
    let script = MockScript::default();
    let (mut client, _) = client_with(script, package_in(&dir, 10, 10));

    client.add_input("x", &[1, 3], &[0u8; 12]);
    assert!(client.infer().is_ok());
    assert!(!client.has_outputs());
}

#[test]
fn infer_transport_failure_is_recoverable_via_reset() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        upload_accepted: true,
        infer_fails: true,
        ..Default::default()
    };
    let (mut client, observations) = client_with(script, package_in(&dir, 10, 10));

    client.upload_package().unwrap();
    assert!(client.infer().is_err());
    assert_eq!(client.state(), ClientState::Failed);

    observations.lock().unwrap().infer_fails = false;
    client.reset();
    assert_eq!(client.state(), ClientState::Ready);
    assert!(client.infer().is_ok());
}

#[test]
fn reset_drops_stale_output_records() {
    let dir = TempDir::new().unwrap();
    let script = MockScript {
        infer_reply: vec![infer_reply("x", &[1, 3], &[1.0, 2.0, 3.0])],
        ..Default::default()
    };
    let (mut client, observations) = client_with(script, package_in(&dir, 10, 10));

    client.add_input("x", &[1, 3], &[0u8; 12]);
    client.infer().unwrap();
    assert!(client.has_outputs());

    client.reset();
    assert!(!client.has_outputs());
    let mut buf = [0x55u8; 12];
    client.get_output("x", &mut buf, &[1, 3]);
    assert_eq!(buf, [0x55u8; 12]);

    // A fresh call after reset sees only the new reply
    observations.lock().unwrap().infer_reply = vec![infer_reply("y", &[1, 1], &[7.0])];
    client.infer().unwrap();
    let mut fresh = [0u8; 4];
    client.get_output("y", &mut fresh, &[1, 1]);
    assert_eq!(f32::from_le_bytes(fresh), 7.0);
}
