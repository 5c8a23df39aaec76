//! # apns-pool
//!
//! Pooled mutual-TLS delivery of binary push notifications, coordinated
//! across many stateless workers through a shared cache.
//!
//! Handshakes are expensive and workers are ephemeral, so live connections
//! are kept between uses in a best-effort distributed cache and handed from
//! worker to worker using nothing but that cache's atomic add-if-absent.
//! There are no true locks and no shared address space; the protocol
//! tolerates stale reads and silent evictions, and the only structural
//! guarantee it depends on is per-slot lease exclusivity.
//!
//! ## Components
//! - **cache**: the [`SharedCache`](cache::SharedCache) trait and an
//!   in-process backend
//! - **digest**: restartable SHA-1/MD5 whose mid-stream state serializes
//!   with the connection that owns it
//! - **credentials**: populate-once store of parsed client certificates
//! - **transport**: the poolable-connection seam and its TLS implementation
//! - **pool**: the lease/release protocol and dynamic pool sizing
//! - **core**: request construction and the gateway's binary frame
//! - **sender**: batch delivery with a single replace-and-retry
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use apns_pool::cache::memory::MemoryCache;
//! use apns_pool::config::RelayConfig;
//! use apns_pool::core::request::{NotificationOptions, NotificationRequest};
//! use apns_pool::credentials::CredentialStore;
//! use apns_pool::sender::NotificationSender;
//!
//! # async fn run() -> apns_pool::Result<()> {
//! let mut config = RelayConfig::default();
//! config.gateway.credential_path = "/etc/apns/songpop.dev.pem".into();
//!
//! let sender = NotificationSender::from_config(
//!     &config,
//!     Arc::new(MemoryCache::new()),
//!     Arc::new(CredentialStore::new()),
//! );
//!
//! let request = NotificationRequest::build(
//!     &"ab".repeat(32),
//!     "You're up!",
//!     &NotificationOptions::default(),
//! )?;
//! sender.send(&[request]).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod credentials;
pub mod digest;
pub mod error;
pub mod logging;
pub mod pool;
pub mod sender;
pub mod transport;

pub use error::{RelayError, Result};
