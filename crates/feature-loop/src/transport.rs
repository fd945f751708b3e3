use anyhow::Context;
use features::{
    AcceptContext, Certificate, ConnectionState, Features, HttpConnection, HttpRequest,
    TlsConnection, TlsState, Upgraded, WebSocketUpgrade,
};
use futures::future::BoxFuture;
use http::header;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Config shapes the synthetic requests produced by accept().
#[derive(Debug, Clone)]
pub struct Config {
    /// Every Nth request is a websocket upgrade handshake.
    pub upgrade_every: u64,
    /// Every Nth request arrives over TLS with a client certificate.
    pub tls_every: u64,
    /// Every Nth request arrives through a proxy which sets X-Forwarded-For.
    pub forwarded_every: u64,
}

pub const LOCAL_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
    8080,
);

/// Build the Features of synthetic request `n`, as a transport would
/// upon reading a request head from a new connection.
pub fn accept(n: u64, config: &Config) -> anyhow::Result<Arc<Features>> {
    let upgrade = n % config.upgrade_every == 0;
    let tls = n % config.tls_every == 0;
    let forwarded = n % config.forwarded_every == 0;

    let remote = SocketAddr::from((
        Ipv4Addr::new(10, (n >> 16) as u8, (n >> 8) as u8, n as u8),
        (30000 + n % 30000) as u16,
    ));
    let connection = ConnectionState::new(format!("{n:016x}"))
        .with_remote(remote)
        .with_local(LOCAL_ADDR);

    let mut builder = http::Request::get(if upgrade { "/events" } else { "/" });
    if upgrade {
        builder = builder
            .header(header::CONNECTION, "keep-alive, Upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_PROTOCOL, "chat, superchat");
    }
    if forwarded {
        builder = builder.header("x-forwarded-for", "203.0.113.7, 10.255.0.1");
    }
    let (head, ()) = builder
        .body(())
        .context("failed to build request head")?
        .into_parts();

    let features = Features::new().with::<Arc<dyn HttpConnection>>(Arc::new(connection));

    if features::is_websocket_handshake(&head.headers) {
        features.insert::<Arc<dyn WebSocketUpgrade>>(Arc::new(Loopback));
    }
    features.insert::<Arc<dyn HttpRequest>>(Arc::new(head));

    if tls {
        let certificate = Certificate::from_der(n.to_be_bytes().to_vec());
        features.insert::<Arc<dyn TlsConnection>>(Arc::new(TlsState::new(Some(certificate))));
    }

    Ok(Arc::new(features))
}

/// Loopback is a WebSocketUpgrade whose upgraded stream echoes
/// back everything written to it.
pub struct Loopback;

impl WebSocketUpgrade for Loopback {
    fn is_upgrade_request(&self) -> bool {
        true
    }

    fn accept(&self, context: AcceptContext) -> BoxFuture<'static, features::Result<Upgraded>> {
        Box::pin(async move {
            let (ours, peer) = tokio::io::duplex(4096);

            tokio::spawn(async move {
                let (mut reader, mut writer) = tokio::io::split(peer);
                if let Err(error) = tokio::io::copy(&mut reader, &mut writer).await {
                    tracing::debug!(%error, "loopback echo ended");
                }
            });

            Ok(Upgraded {
                sub_protocol: context.sub_protocol,
                io: Box::new(ours),
            })
        })
    }
}
