//! TLS configuration boundary.
//!
//! The core does not terminate TLS itself; it loads certificate and key
//! material, carries the protocol policy and the ALPN advertisement list,
//! and hands the bundle to the transport layer. Load failures are fatal to
//! startup.

use crate::config::TlsSettings;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {path}")]
    EmptyCertChain { path: PathBuf },
    #[error("no private key found in {path}")]
    MissingPrivateKey { path: PathBuf },
}

/// Minimum protocol version advertised to the transport layer. SSLv2/v3
/// and TLS < 1.2 are never offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub enum MinTlsVersion {
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

/// Certificate/key material plus negotiation policy, ready for the
/// transport layer.
pub struct TlsMaterial {
    /// DER-encoded certificate chain, leaf first.
    pub cert_chain: Vec<Vec<u8>>,
    /// DER-encoded private key.
    pub private_key: Vec<u8>,
    /// Protocols advertised during ALPN, preference order.
    pub alpn_protocols: Vec<Vec<u8>>,
    pub min_version: MinTlsVersion,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes are deliberately not printed.
        f.debug_struct("TlsMaterial")
            .field("cert_chain_len", &self.cert_chain.len())
            .field("alpn_protocols", &self.alpn_protocols.len())
            .field("min_version", &self.min_version)
            .finish()
    }
}

/// Load and validate TLS material from PEM files.
pub fn load_tls_material(settings: &TlsSettings) -> Result<TlsMaterial, TlsError> {
    let cert_chain = load_cert_chain(&settings.cert_path)?;
    let private_key = load_private_key(&settings.key_path)?;
    let alpn_protocols = settings
        .alpn_protocols
        .iter()
        .map(|p| p.as_bytes().to_vec())
        .collect();
    info!(
        cert_path = %settings.cert_path.display(),
        certs = cert_chain.len(),
        "TLS material loaded"
    );
    Ok(TlsMaterial {
        cert_chain,
        private_key,
        alpn_protocols,
        min_version: settings.min_tls_version,
    })
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_cert_chain(path: &Path) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::EmptyCertChain {
            path: path.to_path_buf(),
        });
    }
    Ok(certs.into_iter().map(|c| c.as_ref().to_vec()).collect())
}

fn load_private_key(path: &Path) -> Result<Vec<u8>, TlsError> {
    let mut reader = open(path)?;
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::MissingPrivateKey {
            path: path.to_path_buf(),
        })?;
    Ok(key.secret_der().to_vec())
}
