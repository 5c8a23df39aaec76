//! # Shared Cache
//!
//! The coordination substrate for the connection pool: an atomic key-value
//! store with per-entry TTLs, shared by every worker.
//!
//! ## Required Semantics
//! - `add` is the only strong primitive: it succeeds iff the key is absent,
//!   atomically. Slot mutual exclusion rests entirely on it.
//! - Everything else is best-effort. The store may silently evict any entry
//!   before its nominal TTL; every caller must treat a missing key as a normal
//!   outcome, never as an error.
//! - Counters are ASCII decimal values operated on by `incr`/`decr`, the
//!   memcached convention. `incr` on an absent key starts from `initial`;
//!   `decr` floors at zero.
//!
//! Implementations over a networked store (memcached, Redis `SET NX`/`INCR`)
//! plug in behind the [`SharedCache`] trait; [`memory::MemoryCache`] covers
//! single-process deployments and tests.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Atomic key-value store with TTL, shared across workers.
///
/// Calls are issued concurrently by independent callers with no coordination
/// beyond what `add` provides. Any store-level failure surfaces as
/// [`RelayError::CacheUnavailable`](crate::error::RelayError::CacheUnavailable).
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Fetch a value. Expired and evicted entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store a value, overwriting any previous one, with the given TTL.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Store a value only if the key is absent. Returns whether the add won.
    /// This is the sole atomic primitive the pool's locking relies on.
    async fn add(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool>;

    /// Increment a counter by `delta`, creating it from `initial` if absent.
    /// Returns the new value.
    async fn incr(&self, key: &str, delta: u64, initial: u64) -> Result<u64>;

    /// Decrement a counter by `delta`, flooring at zero. Absent keys are left
    /// absent. Returns the new value.
    async fn decr(&self, key: &str, delta: u64) -> Result<u64>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
