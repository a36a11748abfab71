//! A single-process node embedded directly in an application: no socket,
//! no HTTP client, just `QuartzNode` driven in-process over the in-memory
//! transport. Inserts a handful of vectors and runs a nearest-neighbor
//! query against them.

use quartz_core::raft::RaftConfig;
use quartz_core::ServerId;
use quartz_network::InProcessHub;
use quartz_server::{NodeConfig, QuartzNode};
use quartz_vector::HnswConfig;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let data_path = tempdir()?;
    let hub = InProcessHub::new();
    let id = ServerId::new("embedded");
    let transport = Arc::new(hub.transport_for(id.clone()));

    let node = QuartzNode::start(
        NodeConfig {
            id: id.clone(),
            cluster: vec![id],
            data_path: data_path.path().to_path_buf(),
            hnsw: HnswConfig::balanced(3),
            raft: RaftConfig::default(),
        },
        transport,
    )
    .await?;

    let corpus = [
        ("red", vec![1.0, 0.0, 0.0]),
        ("green", vec![0.0, 1.0, 0.0]),
        ("blue", vec![0.0, 0.0, 1.0]),
        ("orange", vec![0.9, 0.4, 0.0]),
    ];
    for (label, vector) in &corpus {
        let id = node.insert(vector.clone(), None).await?;
        println!("inserted {label:>6} as id {id}");
    }

    let query = vec![0.8, 0.3, 0.0];
    let results = node.search(&query, 2).await?;
    println!("\nnearest neighbors of {query:?}:");
    for result in results {
        println!("  id {} at distance {:.4}", result.id, result.distance);
    }

    let metrics = node.metrics().await;
    println!("\n{} vectors indexed, role = {:?}", metrics.index.node_count, metrics.replica.role);

    node.shutdown().await;
    Ok(())
}
