//! HTTP transport to the catalog.
//!
//! [`Transport`] is the seam between the client and the network: one blocking
//! GET per call, returning the raw body bytes. [`HttpTransport`] is the real
//! implementation on top of a `ureq` agent.
//!
//! Legacy catalog endpoints frequently present self-signed or otherwise
//! unverifiable certificates. When asked to, [`HttpTransport`] accepts them,
//! but only on its own agent: the TLS configuration is built per transport
//! and no process-wide default is touched.

use crate::error::{OpcError, Result, TransportError};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ureq::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use ureq::rustls::crypto::{ring, CryptoProvider};
use ureq::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use ureq::rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};

/// Blocking HTTP GET used by the client.
pub trait Transport: Send + Sync {
    /// Fetch `url`, failing if no complete response arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Status`] for non-2xx responses and
    /// [`TransportError::Io`] for every other failure.
    fn get(&self, url: &str, timeout: Duration) -> std::result::Result<Vec<u8>, TransportError>;
}

#[derive(Debug)]
struct AcceptAllServerCertVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAllServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// [`Transport`] backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport with certificate verification enabled.
    #[must_use]
    pub fn new() -> Self {
        HttpTransport {
            agent: Self::agent_builder().build(),
        }
    }

    /// Create a transport that accepts any server certificate.
    ///
    /// # Errors
    ///
    /// Returns [`OpcError::Config`] if the TLS configuration cannot be built.
    pub fn accepting_invalid_certs() -> Result<Self> {
        let provider = Arc::new(ring::default_provider());
        let tls_config = ureq::rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| OpcError::Config(format!("TLS setup failed: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAllServerCertVerifier { provider }))
            .with_no_client_auth();
        Ok(HttpTransport {
            agent: Self::agent_builder().tls_config(Arc::new(tls_config)).build(),
        })
    }

    /// Create a transport for the given trust setting.
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::accepting_invalid_certs`].
    pub fn for_trust(accept_invalid_certs: bool) -> Result<Self> {
        if accept_invalid_certs {
            Self::accepting_invalid_certs()
        } else {
            Ok(Self::new())
        }
    }

    fn agent_builder() -> ureq::AgentBuilder {
        ureq::AgentBuilder::new().user_agent(concat!("opc-connector/", env!("CARGO_PKG_VERSION")))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> std::result::Result<Vec<u8>, TransportError> {
        debug!(url, "Open URL");
        match self.agent.get(url).timeout(timeout).call() {
            Ok(response) => {
                let mut body = Vec::new();
                response
                    .into_reader()
                    .read_to_end(&mut body)
                    .map_err(|err| TransportError::Io {
                        url: url.to_string(),
                        message: err.to_string(),
                    })?;
                Ok(body)
            },
            Err(ureq::Error::Status(status, _)) => Err(TransportError::Status {
                url: url.to_string(),
                status,
            }),
            Err(ureq::Error::Transport(err)) => Err(TransportError::Io {
                url: url.to_string(),
                message: err.to_string(),
            }),
        }
    }
}
