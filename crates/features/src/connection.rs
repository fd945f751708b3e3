use std::net::IpAddr;
use std::sync::Mutex;

/// HttpConnection exposes the identity and endpoints of the underlying connection.
///
/// Implementations are shared between the transport and any number of
/// request façades, and use interior mutability for their setters.
pub trait HttpConnection: Send + Sync {
    fn connection_id(&self) -> String;
    fn set_connection_id(&self, id: String);

    fn remote_ip(&self) -> Option<IpAddr>;
    fn set_remote_ip(&self, ip: Option<IpAddr>);
    fn remote_port(&self) -> u16;
    fn set_remote_port(&self, port: u16);

    fn local_ip(&self) -> Option<IpAddr>;
    fn set_local_ip(&self, ip: Option<IpAddr>);
    fn local_port(&self) -> u16;
    fn set_local_port(&self, port: u16);
}

/// ConnectionState is an in-memory HttpConnection, used where the
/// transport doesn't provide connection metadata of its own.
#[derive(Debug, Default)]
pub struct ConnectionState {
    inner: Mutex<Endpoints>,
}

#[derive(Debug, Default, Clone)]
struct Endpoints {
    id: String,
    remote_ip: Option<IpAddr>,
    remote_port: u16,
    local_ip: Option<IpAddr>,
    local_port: u16,
}

impl ConnectionState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Endpoints {
                id: id.into(),
                ..Default::default()
            }),
        }
    }

    /// Set the remote endpoint of this ConnectionState.
    pub fn with_remote(self, addr: std::net::SocketAddr) -> Self {
        self.set_remote_ip(Some(addr.ip()));
        self.set_remote_port(addr.port());
        self
    }

    /// Set the local endpoint of this ConnectionState.
    pub fn with_local(self, addr: std::net::SocketAddr) -> Self {
        self.set_local_ip(Some(addr.ip()));
        self.set_local_port(addr.port());
        self
    }
}

impl HttpConnection for ConnectionState {
    fn connection_id(&self) -> String {
        self.inner.lock().unwrap().id.clone()
    }
    fn set_connection_id(&self, id: String) {
        self.inner.lock().unwrap().id = id;
    }

    fn remote_ip(&self) -> Option<IpAddr> {
        self.inner.lock().unwrap().remote_ip
    }
    fn set_remote_ip(&self, ip: Option<IpAddr>) {
        self.inner.lock().unwrap().remote_ip = ip;
    }
    fn remote_port(&self) -> u16 {
        self.inner.lock().unwrap().remote_port
    }
    fn set_remote_port(&self, port: u16) {
        self.inner.lock().unwrap().remote_port = port;
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.inner.lock().unwrap().local_ip
    }
    fn set_local_ip(&self, ip: Option<IpAddr>) {
        self.inner.lock().unwrap().local_ip = ip;
    }
    fn local_port(&self) -> u16 {
        self.inner.lock().unwrap().local_port
    }
    fn set_local_port(&self, port: u16) {
        self.inner.lock().unwrap().local_port = port;
    }
}
