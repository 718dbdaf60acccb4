//! gossamer-node - membership mesh daemon
//!
//! Binds the gossip listeners, optionally joins seed nodes, and runs the
//! protocol loops until SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gossamer::{Cluster, ClusterConfig, EventDelegate, NodeAddress, NodeInfo};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "gossamer-node")]
#[command(about = "Gossamer membership mesh daemon")]
#[command(version)]
struct Cli {
    /// Address to bind the UDP and TCP listeners to
    #[arg(long, default_value = "0.0.0.0:9632")]
    bind: SocketAddr,

    /// Address advertised to peers (defaults to the bind address)
    #[arg(long)]
    advertise: Option<SocketAddr>,

    /// Human-readable node name
    #[arg(long, env = "GOSSAMER_NODE_NAME")]
    name: Option<String>,

    /// Seed nodes to join, as ip:port (repeatable)
    #[arg(long = "join")]
    seeds: Vec<NodeAddress>,

    /// Probe interval in milliseconds
    #[arg(long, default_value_t = 500)]
    probe_interval_ms: u64,

    /// Gossip interval in milliseconds
    #[arg(long, default_value_t = 500)]
    gossip_interval_ms: u64,

    /// Anti-entropy interval in seconds
    #[arg(long, default_value_t = 20)]
    push_pull_interval_secs: u64,

    /// Peers probed and gossiped to per round
    #[arg(long, default_value_t = 3)]
    fanout: usize,
}

/// Logs membership transitions as structured events.
struct LogDelegate;

impl EventDelegate for LogDelegate {
    fn on_join(&self, node: &NodeInfo) {
        info!(node = %node.addr, version = node.version, "member joined");
    }

    fn on_alive(&self, node: &NodeInfo) {
        info!(node = %node.addr, version = node.version, "member alive");
    }

    fn on_dead(&self, node: &NodeInfo) {
        warn!(node = %node.addr, version = node.version, "member dead");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("gossamer=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = ClusterConfig::new()
        .with_bind_addr(cli.bind)
        .with_probe_interval(Duration::from_millis(cli.probe_interval_ms))
        .with_gossip_interval(Duration::from_millis(cli.gossip_interval_ms))
        .with_push_pull_interval(Duration::from_secs(cli.push_pull_interval_secs))
        .with_fanout(cli.fanout);
    if let Some(advertise) = cli.advertise {
        config = config.with_advertise_addr(advertise);
    }
    if let Some(name) = cli.name {
        config = config.with_name(name);
    }

    let cluster = Cluster::bind_with_delegate(config, Some(Arc::new(LogDelegate))).await?;
    info!(node = %cluster.local_addr(), "listeners bound");

    for seed in &cli.seeds {
        if let Err(e) = cluster.join(seed).await {
            warn!(seed = %seed, error = %e, "failed to join seed");
        }
    }

    let shutdown = Arc::clone(&cluster);
    tokio::spawn(async move {
        if matches!(tokio::signal::ctrl_c().await, Ok(())) {
            info!("received SIGINT, initiating shutdown");
            shutdown.shutdown();
        }
    });

    cluster.run().await;
    Ok(())
}
