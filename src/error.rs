//! Error types for kiln_cache

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kiln_cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kiln_cache operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot combine an empty sequence of checksums")]
    EmptyInput,

    #[error("File doesn't exist at path {}", path.display())]
    FileDoesntExist { path: PathBuf },

    #[error("Checksum for {} is empty", path.display())]
    ZeroChecksum { path: PathBuf },

    #[error("Unable to enumerate {}: {reason}", path.display())]
    UnableToEnumerateDirectory { path: PathBuf, reason: String },

    #[error("No valid product name for target {target}")]
    EmptyProductName { target: String },

    #[error("Product name {name:?} cannot be used as a cache path component")]
    UnsafeProductName { name: String },

    #[error("Dependency cycle detected at target {target}")]
    DependencyCycle { target: String },

    #[error("Target {target} depends on unknown target {dependency}")]
    UnknownDependency { target: String, dependency: String },

    #[error("Target name {name} is declared more than once")]
    DuplicateTarget { name: String },

    #[error("No checksum for target {target_name}")]
    EmptyTargetChecksum { target_name: String },

    #[error("No checksum for product {product_name}")]
    EmptyProductChecksum { product_name: String },

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Coarse classification of an error, deciding how far it propagates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input to a checksum run; the whole run fails
    Input,
    /// A target or product is missing from a checksum tree
    Graph,
    /// Local cache I/O failed; only the offending call fails
    Storage,
    /// The remote cache service is unreachable or misbehaving
    Network,
}

impl Error {
    /// Wrap an I/O error with the path it happened at
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyInput
            | Error::FileDoesntExist { .. }
            | Error::ZeroChecksum { .. }
            | Error::UnableToEnumerateDirectory { .. }
            | Error::EmptyProductName { .. }
            | Error::UnsafeProductName { .. }
            | Error::DependencyCycle { .. }
            | Error::UnknownDependency { .. }
            | Error::DuplicateTarget { .. }
            | Error::InvalidHash(_)
            | Error::Json(_)
            | Error::Config(_) => ErrorCategory::Input,
            Error::EmptyTargetChecksum { .. } | Error::EmptyProductChecksum { .. } => {
                ErrorCategory::Graph
            }
            Error::Io(_) | Error::Serialization(_) | Error::Storage { .. } | Error::Corruption(_) => {
                ErrorCategory::Storage
            }
            Error::Http(_) | Error::Network(_) => ErrorCategory::Network,
        }
    }
}
