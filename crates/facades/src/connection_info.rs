use crate::{Error, FeatureReferences, Resolve, Result, Reusable, Slot};
use features::{
    CancellationToken, Certificate, ConnectionState, Features, HttpConnection, TlsConnection,
    TlsState,
};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// ConnectionInfo is a reusable view of the connection which carries a request:
/// its identifier, endpoints, and TLS client certificate.
///
/// If the transport doesn't offer connection metadata or TLS features,
/// in-memory defaults are installed into the collection on first use.
#[derive(Default)]
pub struct ConnectionInfo {
    features: FeatureReferences<ConnectionFeatures>,
}

#[derive(Default)]
struct ConnectionFeatures {
    connection: Slot<Arc<dyn HttpConnection>>,
    tls: Slot<Arc<dyn TlsConnection>>,
}

fn new_connection() -> Arc<dyn HttpConnection> {
    Arc::new(ConnectionState::default())
}
fn new_tls() -> Arc<dyn TlsConnection> {
    Arc::new(TlsState::default())
}

const CONNECTION: Resolve<Arc<dyn HttpConnection>> = Resolve::OrInsert(new_connection);
const TLS: Resolve<Arc<dyn TlsConnection>> = Resolve::OrInsert(new_tls);

impl ConnectionInfo {
    pub fn new(features: Arc<Features>) -> Self {
        Self {
            features: FeatureReferences::new(features),
        }
    }

    fn connection(&mut self) -> Result<&dyn HttpConnection> {
        match self.features.fetch(|f| &mut f.connection, &CONNECTION)? {
            Some(connection) => Ok(&**connection),
            None => Err(Error::Unsupported("connection metadata")),
        }
    }

    fn tls(&mut self) -> Result<&dyn TlsConnection> {
        match self.features.fetch(|f| &mut f.tls, &TLS)? {
            Some(tls) => Ok(&**tls),
            None => Err(Error::Unsupported("TLS")),
        }
    }

    pub fn id(&mut self) -> Result<String> {
        Ok(self.connection()?.connection_id())
    }
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        self.connection()?.set_connection_id(id.into());
        Ok(())
    }

    pub fn remote_ip(&mut self) -> Result<Option<IpAddr>> {
        Ok(self.connection()?.remote_ip())
    }
    pub fn set_remote_ip(&mut self, ip: Option<IpAddr>) -> Result<()> {
        self.connection()?.set_remote_ip(ip);
        Ok(())
    }
    pub fn remote_port(&mut self) -> Result<u16> {
        Ok(self.connection()?.remote_port())
    }
    pub fn set_remote_port(&mut self, port: u16) -> Result<()> {
        self.connection()?.set_remote_port(port);
        Ok(())
    }

    pub fn local_ip(&mut self) -> Result<Option<IpAddr>> {
        Ok(self.connection()?.local_ip())
    }
    pub fn set_local_ip(&mut self, ip: Option<IpAddr>) -> Result<()> {
        self.connection()?.set_local_ip(ip);
        Ok(())
    }
    pub fn local_port(&mut self) -> Result<u16> {
        Ok(self.connection()?.local_port())
    }
    pub fn set_local_port(&mut self, port: u16) -> Result<()> {
        self.connection()?.set_local_port(port);
        Ok(())
    }

    /// Remote endpoint, if its address is known.
    pub fn remote_addr(&mut self) -> Result<Option<SocketAddr>> {
        let connection = self.connection()?;
        Ok(connection
            .remote_ip()
            .map(|ip| SocketAddr::new(ip, connection.remote_port())))
    }

    /// Local endpoint, if its address is known.
    pub fn local_addr(&mut self) -> Result<Option<SocketAddr>> {
        let connection = self.connection()?;
        Ok(connection
            .local_ip()
            .map(|ip| SocketAddr::new(ip, connection.local_port())))
    }

    pub fn client_certificate(&mut self) -> Result<Option<Certificate>> {
        Ok(self.tls()?.client_certificate())
    }
    pub fn set_client_certificate(&mut self, certificate: Option<Certificate>) -> Result<()> {
        self.tls()?.set_client_certificate(certificate);
        Ok(())
    }

    /// Obtain the client certificate, which may require a renegotiation.
    /// The TLS feature is resolved immediately, and the returned future
    /// doesn't borrow this ConnectionInfo.
    pub fn fetch_client_certificate(
        &mut self,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Option<Certificate>>> + Send + 'static {
        let fetch = self
            .tls()
            .map(|tls| tls.fetch_client_certificate(cancel));

        async move { Ok::<_, Error>(fetch?.await?) }
    }
}

impl Reusable for ConnectionInfo {
    fn initialize(&mut self, features: Arc<Features>) {
        self.features.initialize(features);
    }
    fn uninitialize(&mut self) {
        self.features.uninitialize();
    }
}
