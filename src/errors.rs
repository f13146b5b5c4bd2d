//! Typed error hierarchy for the fanout job runner.
//!
//! Everything that can fail before the external tool is spawned is returned
//! to the submitter. Failures after spawn are `ProcessRuntime` errors, which
//! are only ever logged: the submitter already holds a token and sees the
//! tool's own output through polling.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("invalid patch name: {name}")]
    InvalidJobType { name: String },

    #[error("Failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read random bytes: {0}")]
    RandomSource(String),

    #[error("Failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no stream found for name {token}")]
    NotFound { token: String },

    #[error("command finished with error: {0}")]
    ProcessRuntime(String),

    #[error("Patch lookup task failed: {0}")]
    BlockingTask(#[from] tokio::task::JoinError),
}

pub type Result<T, E = FanoutError> = std::result::Result<T, E>;
