//! Error taxonomy of the engine.
//!
//! Per-record decode failures are isolated, broker failures are retried and configuration
//! failures are fatal at startup.
use std::path::PathBuf;

use thiserror::Error;

/// A single payload could not be turned into a call record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not UTF-8, not JSON or not a JSON object
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised by a [crate::sources::BatchSource].
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The connection to the broker was lost or a poll failed. Retryable.
    #[error("Connection to broker lost")]
    ConnectionLost(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The broker could not be reached within the startup timeout. Fatal.
    #[error("Could not connect to broker within {0:?}")]
    ConnectTimeout(std::time::Duration, #[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BrokerError {
    /// Whether polling again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::ConnectionLost(_))
    }
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The reference file is unreadable or malformed. Fatal before the stream starts.
    #[error("Failed to load reference file `{path}`")]
    ReferenceLoadFailed {
        /// Path as configured
        path: PathBuf,
        /// What went wrong
        #[source]
        source: ReferenceError,
    },
}

/// Why a reference file could not be loaded
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// The file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A document or line is not valid JSON
    #[error("Invalid JSON on line {line}")]
    Json {
        /// 1-based line of the offending document
        line: usize,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },
    /// An entry lacks its code
    #[error("Entry {index} has no `disposition_code`")]
    MissingCode {
        /// 0-based position of the entry
        index: usize,
    },
    /// Neither an array, an object nor objects per line
    #[error("Expected a JSON array or JSON objects, one per line")]
    UnexpectedShape,
}

/// Errors terminating a running job
#[derive(Debug, Error)]
pub enum JobError {
    /// Polling failed and could not be recovered by retrying
    #[error("Broker failed and retries are exhausted")]
    Broker(#[from] BrokerError),
    /// The sink could not write a snapshot
    #[error("Failed to write snapshot")]
    Sink(#[source] std::io::Error),
}
