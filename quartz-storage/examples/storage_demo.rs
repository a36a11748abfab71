//! Demonstrates `RaftStore` directly, outside of a running replica:
//! durably record a term/vote, append a log tail, then save and reload a
//! snapshot, the three regions a replica's persistence depends on.

use quartz_core::raft::{LogEntry, PersistentStore, SnapshotMeta};
use quartz_core::{Command, ServerId};
use quartz_storage::RaftStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = RaftStore::open(dir.path())?;

    println!("recording a vote for term 1...");
    store.save_term_vote(1, Some(ServerId::new("node-1"))).await?;
    let (term, voted_for) = store.load_term_vote().await?;
    println!("   loaded back: term={term} voted_for={voted_for:?}");

    println!("\nappending a small log tail...");
    let entries: Vec<LogEntry> = (0..3)
        .map(|i| LogEntry {
            term: 1,
            index: i,
            command: Command::Insert {
                vector: vec![i as f32, 0.0, 0.0],
                id: Some(i),
                level: 0,
            },
        })
        .collect();
    store.append_entries(&entries).await?;
    println!("   {} entries on disk", store.load_log().await?.len());

    println!("\ntruncating from index 2...");
    store.truncate_from(2).await?;
    println!("   {} entries remain", store.load_log().await?.len());

    println!("\nsaving a snapshot covering index 1...");
    let meta = SnapshotMeta {
        last_included_index: 1,
        last_included_term: 1,
        cluster_config: vec![ServerId::new("node-1")],
    };
    store.save_snapshot(meta, b"serialized index state".to_vec()).await?;

    let (meta, state) = store.load_snapshot().await?.expect("snapshot just saved");
    println!(
        "   snapshot covers up to index {} ({} bytes of state)",
        meta.last_included_index,
        state.len()
    );

    Ok(())
}
