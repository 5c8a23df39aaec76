//! # Notification Sender
//!
//! Delivery of a batch of notification requests over one leased connection.
//!
//! One lease per batch: acquire, frame and write every request, release
//! whatever connection survives. A transient write failure is recovered by
//! replacing the connection and retrying that write exactly once; the
//! replacement is what gets released back to the slot. A second consecutive
//! failure is fatal — the slot's lock is deliberately left to its 60-second
//! TTL, which bounds the damage from a worker dying mid-send.

use std::sync::Arc;

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::{debug, instrument, warn};

use crate::cache::SharedCache;
use crate::config::RelayConfig;
use crate::core::frame::NotificationCodec;
use crate::core::request::NotificationRequest;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::pool::PoolCoordinator;
use crate::transport::tls::TlsConnectionFactory;
use crate::transport::{ConnectionFactory, PoolableConnection};

/// Sends framed notification requests through the pooled transport.
pub struct NotificationSender<F: ConnectionFactory> {
    pool: PoolCoordinator<F>,
}

impl<F: ConnectionFactory> NotificationSender<F> {
    pub fn new(pool: PoolCoordinator<F>) -> Self {
        Self { pool }
    }

    /// The coordinator backing this sender.
    pub fn pool(&self) -> &PoolCoordinator<F> {
        &self.pool
    }

    /// Deliver a batch of requests over one leased connection.
    ///
    /// Returns the number of frames written. On a fatal transport error the
    /// lease is not released; its lock expires on its own.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn send(&self, requests: &[NotificationRequest]) -> Result<usize> {
        if requests.is_empty() {
            return Ok(0);
        }

        let (slot, mut connection) = self.pool.acquire().await?;
        let mut codec = NotificationCodec;
        let mut frame = BytesMut::new();
        let mut delivered = 0;

        for request in requests {
            frame.clear();
            codec.encode(request, &mut frame)?;

            if let Err(e) = connection.write(&frame).await {
                if !e.is_transient() {
                    return Err(e);
                }
                // The cached socket has probably expired; one fresh
                // connection, one retry, and a second failure is fatal.
                warn!(error = %e, "write failed on leased connection, retrying once");
                connection = self.pool.fresh_connection().await?;
                connection.write(&frame).await?;
            }
            delivered += 1;
        }

        debug!(delivered, "batch written");
        self.pool.release(slot, connection).await?;
        Ok(delivered)
    }
}

impl NotificationSender<TlsConnectionFactory> {
    /// Assemble the production sender: TLS factory, derived pool name, and
    /// the given shared cache and credential store.
    pub fn from_config(
        config: &RelayConfig,
        cache: Arc<dyn SharedCache>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let factory = TlsConnectionFactory::from_config(&config.gateway, credentials);
        let name = config
            .pool
            .name
            .clone()
            .unwrap_or_else(|| config.gateway.derived_pool_name());
        Self::new(PoolCoordinator::new(cache, factory, name, &config.pool))
    }
}
