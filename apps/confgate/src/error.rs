//! Crate-wide error type for request-shape and I/O failures.
//!
//! Content problems are never errors: validators return reports and the
//! rule engine returns verdicts. `Error` covers what a caller did wrong
//! (unknown ids, bad checksum input) and what the environment did wrong
//! (I/O, corrupt snapshots).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid config type '{0}'; expected one of K8S_YAML, TERRAFORM, GENERIC_YAML")]
    InvalidConfigType(String),

    #[error("config '{0}' already exists")]
    DuplicateConfig(String),

    #[error("invalid checksum '{0}': expected at least 8 hex characters")]
    InvalidChecksum(String),

    #[error("checksum mismatch for version {version_number} of config {config_id}")]
    ChecksumMismatch {
        config_id: String,
        version_number: u32,
    },

    #[error("store inconsistency for config {config_id}: {reason}")]
    Inconsistent { config_id: String, reason: String },

    #[error("invalid policy '{name}': {reason}")]
    InvalidPolicy { name: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
