use crate::{CancellationToken, Error, Result};
use futures::future::BoxFuture;
use std::sync::Mutex;

/// Certificate is a DER-encoded X.509 certificate presented by a TLS peer.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate(bytes::Bytes);

impl Certificate {
    pub fn from_der(der: impl Into<bytes::Bytes>) -> Self {
        Self(der.into())
    }

    pub fn der(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Certificate({} bytes)", self.0.len())
    }
}

/// TlsConnection exposes the client certificate of a TLS (or mTLS) connection.
pub trait TlsConnection: Send + Sync {
    /// Client certificate which has already been received, if any.
    fn client_certificate(&self) -> Option<Certificate>;
    fn set_client_certificate(&self, certificate: Option<Certificate>);

    /// Obtain the client certificate, which may require renegotiation
    /// with the peer. The returned future completes with Error::Cancelled
    /// if `cancel` fires first.
    fn fetch_client_certificate(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Option<Certificate>>>;
}

/// TlsState is an in-memory TlsConnection which never renegotiates:
/// fetching a certificate yields the one already held.
#[derive(Debug, Default)]
pub struct TlsState {
    certificate: Mutex<Option<Certificate>>,
}

impl TlsState {
    pub fn new(certificate: Option<Certificate>) -> Self {
        Self {
            certificate: Mutex::new(certificate),
        }
    }
}

impl TlsConnection for TlsState {
    fn client_certificate(&self) -> Option<Certificate> {
        self.certificate.lock().unwrap().clone()
    }

    fn set_client_certificate(&self, certificate: Option<Certificate>) {
        *self.certificate.lock().unwrap() = certificate;
    }

    fn fetch_client_certificate(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Option<Certificate>>> {
        let certificate = self.client_certificate();

        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Ok(certificate)
        })
    }
}
