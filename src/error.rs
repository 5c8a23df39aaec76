//! # Error Types
//!
//! Error handling for the pooled push-notification relay.
//!
//! The taxonomy mirrors how faults are actually handled:
//! - **Transient transport faults** (`Io`, `ConnectionClosed`) are recovered by
//!   replacing the leased connection and retrying the write exactly once.
//! - **Cache faults** (`CacheUnavailable`) degrade the caller to unpooled mode
//!   and are never surfaced from the coordinator's probe/grow/shrink paths.
//! - **Request faults** (`InvalidToken`, `OversizedPayload`) are reported to the
//!   caller without any retry.
//! - **Fatal transport faults** (`Tls`, `Handshake`, a second consecutive write
//!   failure) propagate to the caller; the connection is not returned to the pool.
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Primary error type for all relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("shared cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("mutual-TLS handshake failed: {0}")]
    Handshake(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("invalid device token: {0}")]
    InvalidToken(String),

    #[error("notification payload too large: {0} bytes (limit 256)")]
    OversizedPayload(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether a failed write on an otherwise-valid leased connection may be
    /// retried once on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Io(_) | RelayError::ConnectionClosed)
    }
}

/// Type alias for Results using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
