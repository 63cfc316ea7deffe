//! PD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PdError>;

/// Top-level error type for pairdiff.
#[derive(Debug, Error)]
pub enum PdError {
    #[error("[PD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PD-1004] required setting `{key}` is not defined; there is nothing to compare")]
    MissingSetting { key: &'static str },

    #[error("[PD-2001] cannot list directory {path}: {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PD-2002] not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("[PD-3001] comparator `{program}` failed: {details}")]
    Invocation { program: String, details: String },

    #[error("[PD-3002] comparator `{program}` exited with status {code}")]
    ComparatorExit { program: String, code: i32 },

    #[error("[PD-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[PD-3102] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PD-1001",
            Self::MissingConfig { .. } => "PD-1002",
            Self::ConfigParse { .. } => "PD-1003",
            Self::MissingSetting { .. } => "PD-1004",
            Self::DirectoryAccess { .. } => "PD-2001",
            Self::NotADirectory { .. } => "PD-2002",
            Self::Invocation { .. } => "PD-3001",
            Self::ComparatorExit { .. } => "PD-3002",
            Self::Serialization { .. } => "PD-3101",
            Self::Io { .. } => "PD-3102",
        }
    }

    /// Whether the failure must abort the whole run.
    ///
    /// Configuration and traversal failures are fatal; a failed comparison only
    /// affects its own entry.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Invocation { .. } | Self::ComparatorExit { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a directory that could not be listed.
    #[must_use]
    pub fn directory_access(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for PdError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
