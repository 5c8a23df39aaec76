//! # TLS Gateway Transport
//!
//! Mutual-TLS connections to the push gateway, built for a life spent mostly
//! inside the shared cache.
//!
//! A [`GatewayConnection`] is two things: a live `tokio-rustls` client stream,
//! and a plain-data [`ConnectionState`] holding everything that must survive
//! the cache round trip — destination, credential path, closed flag, and the
//! restartable digest transcript of all bytes written. Serializing a
//! connection parks its live stream in a process-wide registry keyed by
//! connection id and emits only the state; deserializing in the same process
//! reclaims the identical socket. A different worker process misses the
//! registry, observes the connection as closed, and lets the coordinator build
//! a fresh one — the degradation the lease protocol already tolerates.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use rustls::{ClientConfig, RootCertStore, ServerName};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument, warn};

use crate::config::{GatewayConfig, DEFAULT_CONNECTION_TTL};
use crate::credentials::CredentialStore;
use crate::digest::{Md5, Sha1};
use crate::error::{RelayError, Result};
use crate::transport::{ConnectionFactory, PoolableConnection};

/// Running digests over every byte written on a connection.
///
/// The pair mirrors the MD5+SHA-1 transcript hashing of the TLS generation the
/// gateway speaks. Because both digests are restartable, the transcript
/// resumes bit-exactly after the connection state crosses the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficTranscript {
    sha1: Sha1,
    md5: Md5,
}

impl TrafficTranscript {
    pub fn update(&mut self, data: &[u8]) {
        self.sha1.update(data);
        self.md5.update(data);
    }

    /// SHA-1 fingerprint of the traffic so far. Stable across suspensions.
    pub fn sha1_hex(&self) -> String {
        self.sha1.hexdigest()
    }

    pub fn md5_hex(&self) -> String {
        self.md5.hexdigest()
    }
}

/// The serializable half of a connection.
#[derive(Debug, Serialize, Deserialize)]
struct ConnectionState {
    id: u64,
    host: String,
    port: u16,
    credential_path: PathBuf,
    closed: bool,
    transcript: TrafficTranscript,
}

/// A mutual-TLS session with the gateway.
pub struct GatewayConnection {
    state: ConnectionState,
    stream: Option<TlsStream<TcpStream>>,
}

impl GatewayConnection {
    fn established(
        host: String,
        port: u16,
        credential_path: PathBuf,
        stream: TlsStream<TcpStream>,
    ) -> Self {
        Self {
            state: ConnectionState {
                id: rand::random(),
                host,
                port,
                credential_path,
                closed: false,
                transcript: TrafficTranscript::default(),
            },
            stream: Some(stream),
        }
    }

    /// Process-unique id; also the parked-stream registry key.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Digest transcript of all bytes written so far.
    pub fn transcript(&self) -> &TrafficTranscript {
        &self.state.transcript
    }
}

#[async_trait]
impl PoolableConnection for GatewayConnection {
    fn is_closed(&self) -> bool {
        self.state.closed || self.stream.is_none()
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RelayError::ConnectionClosed)?;

        if let Err(e) = stream.write_all(frame).await {
            self.state.closed = true;
            return Err(e.into());
        }
        if let Err(e) = stream.flush().await {
            self.state.closed = true;
            return Err(e.into());
        }

        self.state.transcript.update(frame);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.state.closed = true;
    }

    fn into_cache_bytes(mut self) -> Result<Bytes> {
        if let Some(stream) = self.stream.take() {
            park_stream(self.state.id, stream);
            debug!(
                id = self.state.id,
                traffic_sha1 = %self.state.transcript.sha1_hex(),
                "connection parked for reuse"
            );
        }
        Ok(Bytes::from(bincode::serialize(&self.state)?))
    }

    fn from_cache_bytes(bytes: &[u8]) -> Result<Self> {
        let state: ConnectionState = bincode::deserialize(bytes)?;
        let stream = reclaim_stream(state.id);
        if stream.is_none() {
            debug!(id = state.id, "no local stream for cached connection");
        }
        Ok(Self { state, stream })
    }
}

struct ParkedStream {
    stream: TlsStream<TcpStream>,
    parked_at: Instant,
}

/// Live sockets owned by connections currently serialized into the cache.
///
/// Cache entries expire after the connection TTL; parked sockets are pruned on
/// the same horizon so abandoned slots do not pin file descriptors.
fn registry() -> &'static Mutex<HashMap<u64, ParkedStream>> {
    static PARKED: OnceLock<Mutex<HashMap<u64, ParkedStream>>> = OnceLock::new();
    PARKED.get_or_init(|| Mutex::new(HashMap::new()))
}

fn park_stream(id: u64, stream: TlsStream<TcpStream>) {
    let mut parked = registry()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    parked.retain(|_, entry| entry.parked_at.elapsed() < DEFAULT_CONNECTION_TTL);
    parked.insert(
        id,
        ParkedStream {
            stream,
            parked_at: Instant::now(),
        },
    );
}

fn reclaim_stream(id: u64) -> Option<TlsStream<TcpStream>> {
    let mut parked = registry()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    parked.retain(|_, entry| entry.parked_at.elapsed() < DEFAULT_CONNECTION_TTL);
    parked.remove(&id).map(|entry| entry.stream)
}

/// Opens sockets to one gateway and performs the mutual-TLS handshake with a
/// credential resolved through the injected [`CredentialStore`].
pub struct TlsConnectionFactory {
    host: String,
    port: u16,
    credential_path: PathBuf,
    credentials: Arc<CredentialStore>,
    accept_invalid_certs: bool,
}

impl TlsConnectionFactory {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credential_path: impl Into<PathBuf>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            credential_path: credential_path.into(),
            credentials,
            accept_invalid_certs: false,
        }
    }

    pub fn from_config(config: &GatewayConfig, credentials: Arc<CredentialStore>) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.credential_path.clone(),
            credentials,
        )
        .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
    }

    /// Skip server certificate verification. Loopback testing only.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        if accept {
            warn!("server certificate verification disabled");
        }
        self.accept_invalid_certs = accept;
        self
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let credential = self.credentials.load(&self.credential_path)?;
        let cert_chain = credential.cert_chain.clone();
        let private_key = credential.private_key.clone();

        if self.accept_invalid_certs {
            struct AcceptAnyServerCert;

            impl rustls::client::ServerCertVerifier for AcceptAnyServerCert {
                fn verify_server_cert(
                    &self,
                    _end_entity: &rustls::Certificate,
                    _intermediates: &[rustls::Certificate],
                    _server_name: &ServerName,
                    _scts: &mut dyn Iterator<Item = &[u8]>,
                    _ocsp_response: &[u8],
                    _now: std::time::SystemTime,
                ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error>
                {
                    Ok(rustls::client::ServerCertVerified::assertion())
                }
            }

            return ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_client_auth_cert(cert_chain, private_key)
                .map_err(|e| RelayError::Tls(format!("failed to set client certificate: {e}")));
        }

        let mut root_store = RootCertStore::empty();
        let native_certs = rustls_native_certs::load_native_certs()
            .map_err(|e| RelayError::Tls(format!("failed to load native certs: {e}")))?;
        for cert in native_certs {
            root_store
                .add(&rustls::Certificate(cert.0))
                .map_err(|e| RelayError::Tls(format!("failed to add cert to root store: {e}")))?;
        }

        ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_client_auth_cert(cert_chain, private_key)
            .map_err(|e| RelayError::Tls(format!("failed to set client certificate: {e}")))
    }
}

#[async_trait]
impl ConnectionFactory for TlsConnectionFactory {
    type Conn = GatewayConnection;

    #[instrument(skip(self), fields(host = %self.host, port = self.port))]
    async fn connect(&self) -> Result<GatewayConnection> {
        let config = Arc::new(self.client_config()?);
        let connector = TlsConnector::from(config);

        let tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let server_name = ServerName::try_from(self.host.as_str())
            .map_err(|_| RelayError::Tls(format!("invalid server name: {}", self.host)))?;

        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| RelayError::Handshake(e.to_string()))?;

        debug!("mutual-TLS connection established");
        Ok(GatewayConnection::established(
            self.host.clone(),
            self.port,
            self.credential_path.clone(),
            stream,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_resumes_after_serialization() {
        let mut live = TrafficTranscript::default();
        live.update(b"frame one");

        let bytes = bincode::serialize(&live).unwrap();
        let mut restored: TrafficTranscript = bincode::deserialize(&bytes).unwrap();

        live.update(b"frame two");
        restored.update(b"frame two");

        assert_eq!(live.sha1_hex(), restored.sha1_hex());
        assert_eq!(live.md5_hex(), restored.md5_hex());
    }

    #[test]
    fn reclaiming_an_unknown_id_misses() {
        assert!(reclaim_stream(u64::MAX).is_none());
    }
}
