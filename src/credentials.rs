//! # Credential Store
//!
//! Process-wide cache of parsed client credentials, keyed by PEM file path.
//!
//! Parsing a certificate chain and private key is paid once per path for the
//! lifetime of the process; credential files are assumed static, so entries
//! are never invalidated. Concurrent first population is benign: every
//! populator parses the identical file, and the last write simply overwrites
//! an equal value.
//!
//! The store is an explicit object injected into the connection factory, not
//! ambient global state.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rustls::{Certificate, PrivateKey};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use tracing::debug;

use crate::error::{RelayError, Result};

/// A parsed client credential: certificate chain plus private key.
#[derive(Debug, Clone)]
pub struct Credential {
    pub cert_chain: Vec<Certificate>,
    pub private_key: PrivateKey,
}

/// Populate-once cache mapping credential-file paths to parsed credentials.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: RwLock<HashMap<PathBuf, Arc<Credential>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the credential for `path`, parsing the PEM file on first access.
    pub fn load(&self, path: &Path) -> Result<Arc<Credential>> {
        {
            // A poisoned map still holds valid parsed credentials.
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(credential) = entries.get(path) {
                return Ok(credential.clone());
            }
        }

        let credential = Arc::new(Self::parse_pem_file(path)?);
        debug!(path = %path.display(), certs = credential.cert_chain.len(), "credential parsed");

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(path.to_path_buf(), credential.clone());
        Ok(credential)
    }

    /// Number of cached credentials.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn parse_pem_file(path: &Path) -> Result<Credential> {
        let file = File::open(path).map_err(|e| {
            RelayError::Handshake(format!(
                "failed to open credential file {}: {e}",
                path.display()
            ))
        })?;
        let mut reader = BufReader::new(file);

        let cert_chain: Vec<Certificate> = certs(&mut reader)
            .map_err(|_| {
                RelayError::Handshake(format!("failed to parse certificates in {}", path.display()))
            })?
            .into_iter()
            .map(Certificate)
            .collect();
        if cert_chain.is_empty() {
            return Err(RelayError::Handshake(format!(
                "no certificates found in {}",
                path.display()
            )));
        }

        let private_key = Self::parse_private_key(&mut reader, path)?;

        Ok(Credential {
            cert_chain,
            private_key,
        })
    }

    /// PKCS#8 first, then the RSA format older gateway credentials ship with.
    fn parse_private_key(reader: &mut BufReader<File>, path: &Path) -> Result<PrivateKey> {
        reader.seek(SeekFrom::Start(0)).map_err(RelayError::Io)?;
        let keys = pkcs8_private_keys(reader).map_err(|_| {
            RelayError::Handshake(format!("failed to parse private key in {}", path.display()))
        })?;
        if let Some(key) = keys.into_iter().next() {
            return Ok(PrivateKey(key));
        }

        reader.seek(SeekFrom::Start(0)).map_err(RelayError::Io)?;
        let keys = rsa_private_keys(reader).map_err(|_| {
            RelayError::Handshake(format!("failed to parse private key in {}", path.display()))
        })?;
        if let Some(key) = keys.into_iter().next() {
            return Ok(PrivateKey(key));
        }

        Err(RelayError::Handshake(format!(
            "no private key found in {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_credential_pem() -> tempfile::NamedTempFile {
        let certified = rcgen::generate_simple_self_signed(vec!["client".to_string()]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}{}",
            certified.cert.pem(),
            certified.signing_key.serialize_pem()
        )
        .unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_combined_pem_once() {
        let pem = write_credential_pem();
        let store = CredentialStore::new();

        let first = store.load(pem.path()).unwrap();
        assert_eq!(first.cert_chain.len(), 1);
        assert!(!first.private_key.0.is_empty());

        let second = store.load(pem.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_file_reports_handshake_error() {
        let store = CredentialStore::new();
        let err = store.load(Path::new("/nonexistent/cred.pem")).unwrap_err();
        assert!(matches!(err, RelayError::Handshake(_)));
    }

    #[test]
    fn file_without_key_rejected() {
        let certified = rcgen::generate_simple_self_signed(vec!["client".to_string()]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", certified.cert.pem()).unwrap();
        file.flush().unwrap();

        let store = CredentialStore::new();
        let err = store.load(file.path()).unwrap_err();
        assert!(matches!(err, RelayError::Handshake(_)));
    }
}
