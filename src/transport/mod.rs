//! # Transport Layer
//!
//! The seam between the pool coordinator and whatever carries bytes to the
//! gateway.
//!
//! The coordinator never touches sockets directly; it works against two
//! traits. [`PoolableConnection`] is a transport session that can report
//! closure, write a frame, and cross the shared-cache serialization boundary.
//! [`ConnectionFactory`] dials and authenticates new sessions. The production
//! pair lives in [`tls`]; tests substitute in-memory fakes.

pub mod tls;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// A transport session the pool can lease, cache, and restore.
#[async_trait]
pub trait PoolableConnection: Send + Sized {
    /// Whether the session can no longer carry writes. A cached connection
    /// that restores as closed is replaced, never repaired.
    fn is_closed(&self) -> bool;

    /// Write one complete frame. A failure here marks the connection closed;
    /// recovery is the caller's single retry on a fresh connection.
    async fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Shut the session down. Dropping without closing is tolerated; the
    /// remote end reaps idle sockets on its own schedule.
    async fn close(&mut self);

    /// Serialize the session for shared-cache storage, consuming it.
    fn into_cache_bytes(self) -> Result<Bytes>;

    /// Restore a session previously stored with
    /// [`into_cache_bytes`](Self::into_cache_bytes).
    fn from_cache_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Opens and authenticates new connections to one fixed destination.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    type Conn: PoolableConnection;

    /// Open a socket and complete the handshake. Any failure is fatal for the
    /// current send attempt; there is no retry at this level.
    async fn connect(&self) -> Result<Self::Conn>;
}

#[async_trait]
impl<F: ConnectionFactory> ConnectionFactory for std::sync::Arc<F> {
    type Conn = F::Conn;

    async fn connect(&self) -> Result<Self::Conn> {
        (**self).connect().await
    }
}
