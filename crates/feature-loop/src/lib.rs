use anyhow::Context;
use facades::{ConnectionInfo, Pool, PoolStats, UpgradeManager};
use features::{CancellationToken, ConnectionState, Features, HttpConnection, HttpRequest};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub mod transport;

/// Server serves requests through pooled façades.
pub struct Server {
    infos: Pool<ConnectionInfo>,
    upgrades: Pool<UpgradeManager>,
    cancel: CancellationToken,
    stats: Stats,
}

/// Stats are counters of served requests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub requests: u64,
    pub forwarded: u64,
    pub client_certificates: u64,
    pub upgrades: u64,
}

const GREETING: &[u8] = b"hello";

impl Server {
    pub fn new(pool_capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            infos: Pool::new(pool_capacity),
            upgrades: Pool::new(pool_capacity),
            cancel,
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Pool statistics of ConnectionInfo and UpgradeManager façades.
    pub fn pool_stats(&self) -> (PoolStats, PoolStats) {
        (self.infos.stats(), self.upgrades.stats())
    }

    /// Serve a request having `features`.
    pub async fn serve(&mut self, features: Arc<Features>) -> anyhow::Result<()> {
        let mut info = self.infos.take(features.clone());
        let mut upgrade = self.upgrades.take(features.clone());

        let result = self.handle(&features, &mut info, &mut upgrade).await;

        self.infos.give(info);
        self.upgrades.give(upgrade);
        result
    }

    async fn handle(
        &mut self,
        features: &Features,
        info: &mut ConnectionInfo,
        upgrade: &mut UpgradeManager,
    ) -> anyhow::Result<()> {
        self.stats.requests += 1;

        // Requests which arrive through a proxy are re-attributed to the
        // original client by swapping in a new connection feature.
        if let Some(client) = forwarded_for(features) {
            let proxied = ConnectionState::new(info.id()?)
                .with_remote(SocketAddr::new(client, info.remote_port()?));
            let proxied = match info.local_addr()? {
                Some(local) => proxied.with_local(local),
                None => proxied,
            };
            features.insert::<Arc<dyn HttpConnection>>(Arc::new(proxied));
            self.stats.forwarded += 1;
        }

        tracing::debug!(
            id = %info.id()?,
            remote = ?info.remote_addr()?,
            "serving request"
        );

        let certificate = info
            .fetch_client_certificate(self.cancel.clone())
            .await
            .context("failed to obtain client certificate")?;

        if let Some(certificate) = certificate {
            tracing::trace!(der_len = certificate.der().len(), "client certificate");
            self.stats.client_certificates += 1;
        }

        if !upgrade.is_upgrade_request()? {
            return Ok(());
        }
        let sub_protocol = upgrade.requested_sub_protocols()?.into_iter().next();

        let mut upgraded = upgrade
            .accept(sub_protocol)
            .await
            .context("failed to accept upgrade")?;

        upgraded.io.write_all(GREETING).await?;
        let mut echo = [0u8; GREETING.len()];
        upgraded.io.read_exact(&mut echo).await?;
        anyhow::ensure!(echo == GREETING, "upgraded stream did not echo greeting");

        tracing::debug!(sub_protocol = ?upgraded.sub_protocol, "upgraded connection");
        self.stats.upgrades += 1;

        Ok(())
    }
}

// Original client address of an X-Forwarded-For header.
fn forwarded_for(features: &Features) -> Option<IpAddr> {
    let request = features.get::<Arc<dyn HttpRequest>>()?;
    let values = facades::split_values(request.headers().get_all("x-forwarded-for"));

    values.first()?.parse().ok()
}
