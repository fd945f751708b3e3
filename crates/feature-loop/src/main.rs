use anyhow::Context;
use clap::Parser;
use feature_loop::{transport, Server};
use features::CancellationToken;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Serve synthetic requests through pooled, feature-caching façades.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Number of requests to serve.
    #[arg(long, env = "REQUESTS", default_value = "10000")]
    requests: u64,
    /// Maximum number of idle façades retained by each pool.
    #[arg(long, env = "POOL_CAPACITY", default_value = "64")]
    pool_capacity: usize,
    /// Every Nth request is a websocket upgrade.
    #[arg(long, env = "UPGRADE_EVERY", default_value = "4", value_parser = clap::value_parser!(u64).range(1..))]
    upgrade_every: u64,
    /// Every Nth request arrives over TLS with a client certificate.
    #[arg(long, env = "TLS_EVERY", default_value = "3", value_parser = clap::value_parser!(u64).range(1..))]
    tls_every: u64,
    /// Every Nth request arrives through a forwarding proxy.
    #[arg(long, env = "FORWARDED_EVERY", default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    forwarded_every: u64,
    /// Emit logs as JSON.
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into()) // Otherwise it's ERROR.
        .from_env_lossy();

    let builder = tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!(?cli, "starting feature-loop");

    let Cli {
        requests,
        pool_capacity,
        upgrade_every,
        tls_every,
        forwarded_every,
        log_json: _,
    } = cli;

    let config = transport::Config {
        upgrade_every,
        tls_every,
        forwarded_every,
    };

    // Cancel pending operations and stop serving upon Ctrl-C.
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("caught signal to exit");
            signal.cancel();
        }
    });

    let mut server = Server::new(pool_capacity, cancel.clone());
    let started = std::time::Instant::now();

    for n in 0..requests {
        if cancel.is_cancelled() {
            break;
        }
        let features = transport::accept(n, &config)?;

        server
            .serve(features)
            .await
            .with_context(|| format!("failed to serve request {n}"))?;
    }

    let (infos, upgrades) = server.pool_stats();
    tracing::info!(
        stats = ?server.stats(),
        ?infos,
        ?upgrades,
        elapsed = ?started.elapsed(),
        "finished serving requests"
    );

    Ok(())
}
