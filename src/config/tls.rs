use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use native_tls::{Certificate, TlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use thiserror::Error;
use tracing::debug;

use crate::error::{NeonPgError, TransportPolicy};

/// Error types for building the TLS connector
#[derive(Debug, Error)]
pub enum TlsError {
    /// Failed to read the root certificate file
    #[error("failed to load root certificate from {path}: {source}")]
    RootCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    /// The root certificate is not valid PEM
    #[error("invalid root certificate: {0}")]
    InvalidRootCert(native_tls::Error),

    /// The platform TLS backend refused the configuration
    #[error("TLS configuration error: {0}")]
    Connector(native_tls::Error),
}

/// libpq `sslmode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    Allow,
    /// libpq's default when `sslmode` is absent.
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized `sslmode` value. Deliberately carries no input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognized sslmode")]
pub struct UnknownSslMode;

impl FromStr for SslMode {
    type Err = UnknownSslMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "allow" => Ok(SslMode::Allow),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            _ => Err(UnknownSslMode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plaintext,
    Tls,
}

/// The ordered transports a connection attempt walks through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    pub primary: Transport,
    pub fallbacks: Vec<Transport>,
}

/// Transport security settings owned by this crate rather than the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub mode: SslMode,
    /// PEM bundle used to verify the server (`sslrootcert`).
    pub root_cert: Option<PathBuf>,
}

impl TlsSettings {
    #[must_use]
    pub fn negotiation(&self) -> Negotiation {
        let (primary, fallbacks) = match self.mode {
            SslMode::Disable => (Transport::Plaintext, vec![]),
            SslMode::Allow => (Transport::Plaintext, vec![Transport::Tls]),
            SslMode::Prefer => (Transport::Tls, vec![Transport::Plaintext]),
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => (Transport::Tls, vec![]),
        };
        Negotiation { primary, fallbacks }
    }

    /// Reject any plan that could end up on an unencrypted socket.
    ///
    /// # Errors
    /// Returns [`NeonPgError::InsecureTransport`] for a plaintext primary
    /// path or any plaintext fallback.
    pub fn enforce_encrypted(&self) -> Result<(), NeonPgError> {
        let plan = self.negotiation();
        if plan.primary == Transport::Plaintext {
            return Err(NeonPgError::InsecureTransport(TransportPolicy::PlaintextPrimary));
        }
        if plan.fallbacks.contains(&Transport::Plaintext) {
            return Err(NeonPgError::InsecureTransport(TransportPolicy::PlaintextFallback));
        }
        Ok(())
    }

    /// The closest mode tokio-postgres itself understands.
    #[must_use]
    pub fn driver_mode(&self) -> tokio_postgres::config::SslMode {
        use tokio_postgres::config::SslMode as Driver;
        match self.mode {
            SslMode::Disable => Driver::Disable,
            SslMode::Allow | SslMode::Prefer => Driver::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => Driver::Require,
        }
    }

    /// Build the connector handed to tokio-postgres.
    ///
    /// Verification follows libpq: `require` without a root certificate
    /// encrypts but does not authenticate the server, `verify-ca` (or
    /// `require` with a root certificate) checks the chain only, and
    /// `verify-full` also checks the hostname.
    ///
    /// # Errors
    /// Returns [`TlsError`] if the root certificate cannot be loaded or the
    /// TLS backend rejects the configuration.
    pub fn connector(&self) -> Result<MakeTlsConnector, TlsError> {
        let mut builder = TlsConnector::builder();
        self.configure_verification(&mut builder);

        if let Some(path) = &self.root_cert {
            debug!(path = %path.display(), "loading root certificate");
            let pem = fs::read(path).map_err(|source| TlsError::RootCertLoadFailed {
                path: path.display().to_string(),
                source,
            })?;
            let cert = Certificate::from_pem(&pem).map_err(TlsError::InvalidRootCert)?;
            builder.add_root_certificate(cert);
        }

        let connector = builder.build().map_err(TlsError::Connector)?;
        Ok(MakeTlsConnector::new(connector))
    }

    fn configure_verification(&self, builder: &mut TlsConnectorBuilder) {
        match self.mode {
            SslMode::VerifyFull => {}
            SslMode::VerifyCa => {
                builder.danger_accept_invalid_hostnames(true);
            }
            SslMode::Require if self.root_cert.is_some() => {
                builder.danger_accept_invalid_hostnames(true);
            }
            SslMode::Disable | SslMode::Allow | SslMode::Prefer | SslMode::Require => {
                builder.danger_accept_invalid_certs(true);
                builder.danger_accept_invalid_hostnames(true);
            }
        }
    }
}
