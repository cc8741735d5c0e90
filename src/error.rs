use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Kubernetes error: {0}")]
    KubernetesError(String),

    #[error("failed to sync node cache within {0:?}")]
    CacheSyncTimeout(Duration),

    #[error("node cache sync cancelled before completion")]
    CacheSyncCancelled,

    #[error("failed to get node labels: can't find node {name} in the store")]
    NodeNotFound { name: String },

    #[error("failed to get metrics from node exporter: {0}")]
    FetchError(String),

    #[error("failed to get metrics from node exporter: node exporter returned HTTP status {status}")]
    UpstreamStatus { status: String },

    #[error("failed to append node labels to metric: malformed sample line {line:?}, expected 2 space-separated fields but found {fields}")]
    MalformedSample { line: String, fields: usize },

    #[error("metrics body is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("expected to write {expected} bytes into buffer, but actually wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LabelerError {
    /// Errors that must stop the process before it serves traffic.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            LabelerError::ConfigError(_)
                | LabelerError::KubernetesError(_)
                | LabelerError::CacheSyncTimeout(_)
                | LabelerError::CacheSyncCancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, LabelerError>;
