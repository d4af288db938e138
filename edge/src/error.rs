//! Error types for the edge daemon.
//!
//! Mirrors the taxonomy in the specification's error-handling design:
//! configuration errors are fatal at startup, transport errors (Modbus,
//! HTTP, spool I/O) are recovered locally via retry/backoff and never
//! bubble up as a process failure once the supervisor is running.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EdgeError>;

/// Main error type for the edge daemon.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// configuration-fatal: startup parameter missing or invalid.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// transient-transport: Modbus I/O.
    #[error("modbus error: {message}")]
    Modbus { message: String },

    /// transient-transport: spool I/O.
    #[error("spool error: {message}")]
    Spool { message: String },

    /// transient-transport: upload HTTP I/O.
    #[error("upload error: {message}")]
    Upload { message: String },

    /// logic-bug: normalization failed for reasons other than an
    /// out-of-range reading (missing required source register).
    #[error("normalization error: {message}")]
    Normalize { message: String },

    /// generic I/O (heartbeat file, spool directory).
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("timeout: {message}")]
    Timeout { message: String },
}

impl EdgeError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn modbus<S: Into<String>>(message: S) -> Self {
        Self::Modbus {
            message: message.into(),
        }
    }

    pub fn spool<S: Into<String>>(message: S) -> Self {
        Self::Spool {
            message: message.into(),
        }
    }

    pub fn upload<S: Into<String>>(message: S) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    pub fn normalize<S: Into<String>>(message: S) -> Self {
        Self::Normalize {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for EdgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EdgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for EdgeError {
    fn from(err: sqlx::Error) -> Self {
        Self::Spool {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for EdgeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upload {
            message: err.to_string(),
        }
    }
}
