use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid declaration for service {service:?}: {source}")]
    Validation {
        service: String,
        #[source]
        source: ValidationError,
    },

    #[error("Couldn't list service declarations: {0}")]
    Discovery(String),

    #[error("Couldn't resolve endpoints of service {service:?} on network {network:?}: {reason}")]
    Resolution {
        service: String,
        network: String,
        reason: String,
    },

    #[error("Couldn't render configuration: {0}")]
    Render(String),

    #[error("Couldn't write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't signal managed process: {0}")]
    Signal(String),

    #[error("Couldn't launch {binary}: {reason}")]
    Launch { binary: String, reason: String },

    #[error("Managed process exited: {0}")]
    ProcessExited(String),
}

/// Shape errors found while normalizing a declaration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name required")]
    NameRequired,

    #[error("id required")]
    IdRequired,

    #[error("network required")]
    NetworkRequired,

    #[error("{attribute} length mismatch. Expected {expected} or 1, got {actual}")]
    LengthMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
}
