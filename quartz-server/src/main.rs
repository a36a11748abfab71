//! QuartzDB replica process.
//!
//! Boots one replica: opens its persistent store, binds its TCP
//! transport, constructs the HNSW state machine, and runs the Raft event
//! loop until the process receives a shutdown signal. Configuration is
//! read from `QUARTZ_*` environment variables, an env-var convention
//! rather than a config file.

use quartz_core::raft::RaftConfig;
use quartz_core::ServerId;
use quartz_network::TcpTransport;
use quartz_server::{NodeConfig, QuartzNode};
use quartz_vector::HnswConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `node_id=host:port` pairs separated by `,`, e.g.
/// `node-1=127.0.0.1:7001,node-2=127.0.0.1:7002`.
fn parse_cluster(spec: &str) -> anyhow::Result<HashMap<ServerId, SocketAddr>> {
    let mut addresses = HashMap::new();
    for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (id, addr) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("malformed cluster entry: {entry}"))?;
        addresses.insert(ServerId::new(id), addr.parse::<SocketAddr>()?);
    }
    Ok(addresses)
}

fn hnsw_config(dimension: usize) -> HnswConfig {
    match std::env::var("QUARTZ_HNSW_PRESET").as_deref() {
        Ok("fast") => HnswConfig::fast(dimension),
        Ok("high_quality") => HnswConfig::high_quality(dimension),
        _ => HnswConfig::balanced(dimension),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let node_id = ServerId::new(std::env::var("QUARTZ_NODE_ID").unwrap_or_else(|_| "node-1".into()));
    let log_dir = std::env::var("QUARTZ_LOG_DIR").unwrap_or_else(|_| format!("./logs/{node_id}"));
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "quartz-server.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quartz_server=info,quartz_core=info,quartz_vector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    tracing::info!("starting QuartzDB replica");
    let cluster_spec = std::env::var("QUARTZ_CLUSTER").unwrap_or_else(|_| format!("{node_id}=127.0.0.1:7001"));
    let addresses = parse_cluster(&cluster_spec)?;
    let cluster: Vec<ServerId> = addresses.keys().cloned().collect();

    let listen_addr = *addresses
        .get(&node_id)
        .ok_or_else(|| anyhow::anyhow!("QUARTZ_NODE_ID {node_id} has no entry in QUARTZ_CLUSTER"))?;

    let data_path = std::env::var("QUARTZ_DATA_PATH").unwrap_or_else(|_| format!("./data/{node_id}"));
    let dimension: usize = std::env::var("QUARTZ_DIMENSION")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(128);

    tracing::info!(%node_id, %listen_addr, data_path = %data_path, dimension, "replica configuration");

    let peer_addresses: HashMap<ServerId, SocketAddr> = addresses
        .iter()
        .filter(|(id, _)| **id != node_id)
        .map(|(id, addr)| (id.clone(), *addr))
        .collect();
    let transport = Arc::new(TcpTransport::bind(listen_addr, peer_addresses).await?);

    let config = NodeConfig {
        id: node_id.clone(),
        cluster,
        data_path: data_path.into(),
        hnsw: hnsw_config(dimension),
        raft: RaftConfig::default(),
    };

    let node = QuartzNode::start(config, transport).await?;
    tracing::info!(%node_id, "replica started, awaiting shutdown signal");

    let mut fault = node.watch_fault();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!(%node_id, "shutdown signal received");
            node.shutdown().await;
            tracing::info!(%node_id, "replica shutdown complete");
            Ok(())
        }
        _ = fault.changed() => {
            let reason = fault.borrow().clone().unwrap_or_default();
            // The replica's event loop has already stopped itself; this
            // process exit is what actually gets it restarted, since
            // recovery from a persistence fault is external (spec.md §7).
            Err(anyhow::anyhow!("replica {node_id} stopped after a fault: {reason}"))
        }
    }
}
