//! Shared test doubles: an in-memory poolable connection and its factory.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use apns_pool::error::{RelayError, Result};
use apns_pool::transport::{ConnectionFactory, PoolableConnection};

/// A fake transport session. Identity is carried by `id`, which survives the
/// cache round trip the way a real connection's state does.
#[derive(Debug, Serialize, Deserialize)]
pub struct MockConnection {
    pub id: u64,
    pub closed: bool,
    /// Writes remaining to fail with a transient error. Not serialized:
    /// failure injection belongs to freshly built connections.
    #[serde(skip)]
    pub fail_writes: u32,
    /// Sink shared with the factory so tests can inspect written frames.
    #[serde(skip)]
    pub sink: Option<Arc<Mutex<Vec<Vec<u8>>>>>,
}

#[async_trait]
impl PoolableConnection for MockConnection {
    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            self.closed = true;
            return Err(RelayError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        if let Some(sink) = &self.sink {
            sink.lock().unwrap().push(frame.to_vec());
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn into_cache_bytes(self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(&self)?))
    }

    fn from_cache_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Factory producing [`MockConnection`]s with sequential ids.
#[derive(Debug, Default)]
pub struct MockFactory {
    next_id: AtomicU64,
    created: AtomicU64,
    /// Each unit makes the next created connection fail its first write.
    fail_next_first_writes: AtomicU64,
    pub sink: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total connections built so far.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Make the next `n` created connections fail their first write.
    pub fn fail_first_write_of_next(&self, n: u64) {
        self.fail_next_first_writes.store(n, Ordering::SeqCst);
    }

    /// All frames successfully written through any connection.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.sink.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Conn = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.created.fetch_add(1, Ordering::SeqCst);

        let fail_writes = {
            let remaining = self.fail_next_first_writes.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next_first_writes
                    .store(remaining - 1, Ordering::SeqCst);
                1
            } else {
                0
            }
        };

        Ok(MockConnection {
            id,
            closed: false,
            fail_writes,
            sink: Some(self.sink.clone()),
        })
    }
}
