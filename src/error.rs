use thiserror::Error;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Operation {index} ({kind}) rejected by validation")]
    UnsupportedOperation { index: usize, kind: String },

    #[error("Cycle detected while lowering operand {0}")]
    CyclicGraph(usize),

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Failed to read artifact {0}: {1}")]
    ArtifactError(PathBuf, String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Upload of {0} rejected by server")]
    UploadRejected(String),
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Error::Transport(format!("{:?}: {}", status.code(), status.message()))
    }
}
