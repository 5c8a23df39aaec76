//! # Pool Coordinator
//!
//! Lease/release protocol and dynamic sizing for a pool of gateway
//! connections shared by many stateless workers through the shared cache.
//!
//! ## Cache Key Layout
//! Per pool `name`, the coordinator owns three key families:
//! ```text
//! pool:{name}:size       counter, current pool size
//! pool:{name}:slot:{n}   serialized connection payload, TTL 120 s
//! pool:{name}:lock:{n}   lease marker, TTL 60 s
//! ```
//!
//! ## Protocol
//! `acquire` reads the size, probes a bounded window of slots for free locks,
//! grows the pool when none are free (+2 on an established pool, +1 on a cold
//! one), occasionally shrinks a fully idle pool, then claims one free slot with
//! an atomic add-if-absent. Losing that race is not an error: the call is
//! served by an unpooled connection and the pool grows by one, since
//! contention signals undercapacity. `release` stores the connection payload
//! and only then deletes the lock, so an unlocked slot never hides a payload
//! it actually has.
//!
//! ## Consistency
//! The only hard guarantee used is the exclusivity of `add`. Every other read
//! may be stale, and any entry may vanish before its TTL; both merely cost a
//! redundant connection, never a double lease. Cache outages degrade each call
//! to unpooled mode instead of failing it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use crate::cache::SharedCache;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::transport::{ConnectionFactory, PoolableConnection};

/// Value stored under lock keys; only presence matters.
const LOCK_MARKER: &[u8] = b"1";

/// Coordinates connection leases across workers through the shared cache.
pub struct PoolCoordinator<F: ConnectionFactory> {
    cache: Arc<dyn SharedCache>,
    factory: F,
    name: String,
    lock_ttl: Duration,
    connection_ttl: Duration,
    probe_window: u64,
    shrink_probability: f64,
}

impl<F: ConnectionFactory> PoolCoordinator<F> {
    pub fn new(
        cache: Arc<dyn SharedCache>,
        factory: F,
        name: impl Into<String>,
        config: &PoolConfig,
    ) -> Self {
        Self {
            cache,
            factory,
            name: name.into(),
            lock_ttl: config.lock_ttl(),
            connection_ttl: config.connection_ttl(),
            probe_window: config.probe_window.max(1),
            shrink_probability: config.shrink_probability,
        }
    }

    /// Lease a connection.
    ///
    /// Returns the leased slot id together with the connection, or `None` for
    /// the slot when this call is served outside the pool (cache outage or
    /// lost lock race). An unpooled connection is simply dropped after use.
    #[instrument(skip(self), fields(pool = %self.name))]
    pub async fn acquire(&self) -> Result<(Option<u64>, F::Conn)> {
        let size = self.read_size().await;

        // Probe a bounded window on large pools; the whole pool otherwise.
        let probe: Vec<u64> = if size > self.probe_window {
            let start = rand::random_range(0..=size - self.probe_window);
            (start..start + self.probe_window).collect()
        } else {
            (0..size).collect()
        };
        let whole_pool_probed = probe.len() as u64 == size;

        let mut available = Vec::with_capacity(probe.len());
        for slot in probe.iter().copied() {
            // A probe error reads as "slot busy"; if the cache is down the
            // grow path below degrades this call to unpooled mode anyway.
            match self.cache.get(&self.lock_key(slot)).await {
                Ok(None) => available.push(slot),
                Ok(Some(_)) => {}
                Err(e) => debug!(slot, error = %e, "lock probe failed"),
            }
        }

        if available.is_empty() {
            // Not enough slots: grow, faster than we shrink, so repeated
            // undersizing does not thrash.
            let increment = if size > 0 { 2 } else { 1 };
            match self.cache.incr(&self.size_key(), increment, 0).await {
                Ok(new_size) => {
                    info!(increment, new_size, "pool too small, increased");
                    for i in 0..increment {
                        available.push(new_size.saturating_sub(1 + i));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to grow pool; serving this call unpooled");
                    return Ok((None, self.factory.connect().await?));
                }
            }
        } else if available.len() > 1 && available.len() == probe.len() && whole_pool_probed {
            // Entire pool verified idle: occasionally hand back one slot.
            if rand::random::<f64>() < self.shrink_probability {
                info!(size, "pool fully idle, reducing size by 1");
                let _ = self.cache.decr(&self.size_key(), 1).await;
            }
        }

        // Uniform pick keeps concurrent workers from converging on one slot.
        let slot = available[rand::random_range(0..available.len())];

        match self
            .cache
            .add(&self.lock_key(slot), Bytes::from_static(LOCK_MARKER), self.lock_ttl)
            .await
        {
            Ok(true) => match self.fetch_or_connect(slot).await {
                Ok(conn) => Ok((Some(slot), conn)),
                Err(e) => {
                    // Never leave a slot locked with nothing behind it.
                    let _ = self.cache.delete(&self.lock_key(slot)).await;
                    Err(e)
                }
            },
            Ok(false) | Err(_) => {
                // Lost the race. No retry on this slot; contention means the
                // pool is undersized, so grow and serve this call unpooled.
                warn!(slot, "slot lock contended; growing pool, serving unpooled");
                let _ = self.cache.incr(&self.size_key(), 1, 0).await;
                Ok((None, self.factory.connect().await?))
            }
        }
    }

    /// Return a leased connection to its slot and free the lock.
    ///
    /// Payload first, lock second: a slot must never look unlocked while the
    /// payload it does have is still unwritten. Cache failures here are
    /// absorbed; the lock TTL recovers the slot either way.
    #[instrument(skip(self, connection), fields(pool = %self.name))]
    pub async fn release(&self, slot: Option<u64>, connection: F::Conn) -> Result<()> {
        let Some(slot) = slot else {
            // Unpooled connection: used once and discarded.
            drop(connection);
            return Ok(());
        };

        match connection.into_cache_bytes() {
            Ok(bytes) => {
                if let Err(e) = self
                    .cache
                    .set(&self.slot_key(slot), bytes, self.connection_ttl)
                    .await
                {
                    warn!(slot, error = %e, "failed to store connection payload");
                }
            }
            Err(e) => warn!(slot, error = %e, "failed to serialize connection"),
        }

        if let Err(e) = self.cache.delete(&self.lock_key(slot)).await {
            warn!(slot, error = %e, "failed to delete slot lock; TTL will recover it");
        }
        Ok(())
    }

    /// Open a connection outside the pool, for the sender's single retry.
    pub async fn fresh_connection(&self) -> Result<F::Conn> {
        self.factory.connect().await
    }

    /// Current pool size; zero when unset or the cache is unreachable.
    pub async fn current_size(&self) -> u64 {
        self.read_size().await
    }

    async fn read_size(&self) -> u64 {
        match self.cache.get(&self.size_key()).await {
            Ok(Some(bytes)) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                debug!(error = %e, "failed to read pool size");
                0
            }
        }
    }

    async fn fetch_or_connect(&self, slot: u64) -> Result<F::Conn> {
        if let Some(bytes) = self.cache.get(&self.slot_key(slot)).await? {
            let cached = F::Conn::from_cache_bytes(&bytes)?;
            if !cached.is_closed() {
                debug!(slot, "re-using cached connection");
                return Ok(cached);
            }
            debug!(slot, "cached connection closed, opening a new one");
        } else {
            debug!(slot, "no cached connection, opening a new one");
        }
        self.factory.connect().await
    }

    /// Size counter key for this pool.
    pub fn size_key(&self) -> String {
        format!("pool:{}:size", self.name)
    }

    /// Connection payload key for a slot.
    pub fn slot_key(&self, slot: u64) -> String {
        format!("pool:{}:slot:{}", self.name, slot)
    }

    /// Lease lock key for a slot.
    pub fn lock_key(&self, slot: u64) -> String {
        format!("pool:{}:lock:{}", self.name, slot)
    }
}
