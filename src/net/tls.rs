//! TLS key and certificate material.
//!
//! Material is read from disk once at process start and kept as opaque PEM
//! bytes. Parsing is deferred until a listener is actually bound so that a
//! malformed certificate surfaces as a fatal bind error.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Error type for TLS material handling.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path:?}")]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed PEM {kind}: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in certificate PEM")]
    NoCertificates,

    #[error("no private key found in key PEM")]
    NoPrivateKey,

    #[error("rejected by rustls: {0}")]
    Rejected(#[source] io::Error),
}

/// PEM-encoded certificate chain and private key.
#[derive(Clone)]
pub struct TlsMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl TlsMaterial {
    /// Wrap already loaded PEM bytes.
    pub fn from_pem(cert_pem: impl Into<Vec<u8>>, key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        }
    }

    /// Read certificate chain and key from disk.
    pub async fn load(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        let cert_pem = read_pem("certificate", cert_path).await?;
        let key_pem = read_pem("private key", key_path).await?;

        tracing::debug!(
            cert_path = %cert_path.display(),
            key_path = %key_path.display(),
            "TLS material loaded"
        );

        Ok(Self { cert_pem, key_pem })
    }

    /// Check that the PEM blobs contain a certificate chain and a private key.
    pub fn validate(&self) -> Result<(), TlsError> {
        let mut reader: &[u8] = &self.cert_pem;
        let certs = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| TlsError::Malformed { kind: "certificate", source })?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificates);
        }

        let mut reader: &[u8] = &self.key_pem;
        rustls_pemfile::private_key(&mut reader)
            .map_err(|source| TlsError::Malformed { kind: "private key", source })?
            .ok_or(TlsError::NoPrivateKey)?;

        Ok(())
    }

    /// Build the rustls server configuration used by the listener.
    pub async fn to_rustls_config(&self) -> Result<RustlsConfig, TlsError> {
        self.validate()?;
        RustlsConfig::from_pem(self.cert_pem.clone(), self.key_pem.clone())
            .await
            .map_err(TlsError::Rejected)
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

async fn read_pem(kind: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TlsError::NotFound {
            kind,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(TlsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
