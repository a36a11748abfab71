//! Adapter wiring an [`HnswIndex`] up as a Raft state machine (spec.md §6).
//!
//! Dispatches the log's `Insert`/`Delete`/`Update` commands onto the
//! index; membership commands never reach here — the replica applies
//! those to its own cluster configuration instead (see
//! `quartz_core::raft::replica`). Grounded in the `riffcc-lis`
//! state-machine reference's `apply`/`snapshot`/`restore` shape.

use crate::hnsw::{HnswConfig, HnswIndex};
use crate::VectorId;
use async_trait::async_trait;
use quartz_core::raft::StateMachine;
use quartz_core::Command;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Drives an in-memory [`HnswIndex`] from a replicated command log.
///
/// The index lives behind an `Arc<RwLock<_>>` rather than being owned
/// outright: reads (`search`/`stats`) are local per spec.md §6 and must
/// not go through the log, so the embedding application holds its own
/// clone of the same handle (see [`VectorStateMachine::handle`]) and
/// reads it directly while `apply` — driven only from the replica's own
/// event loop — holds the write lock for the duration of one mutation
/// (spec.md §5: writes serialize with all other graph accesses, reads
/// may run in parallel with each other).
pub struct VectorStateMachine {
    index: Arc<RwLock<HnswIndex>>,
}

impl VectorStateMachine {
    pub fn new(config: HnswConfig) -> crate::Result<Self> {
        Ok(Self::shared(Arc::new(RwLock::new(HnswIndex::new(config)?))))
    }

    /// Build a state machine driving an index handle the caller already
    /// holds, so it can keep a clone for local reads.
    pub fn shared(index: Arc<RwLock<HnswIndex>>) -> Self {
        Self { index }
    }

    /// A clone of the shared index handle, for local `search`/`stats`
    /// reads that bypass the replicated log entirely.
    pub fn handle(&self) -> Arc<RwLock<HnswIndex>> {
        self.index.clone()
    }

    pub async fn index(&self) -> RwLockReadGuard<'_, HnswIndex> {
        self.index.read().await
    }
}

#[async_trait]
impl StateMachine for VectorStateMachine {
    async fn apply(&mut self, command: &Command) -> Option<VectorId> {
        let mut index = self.index.write().await;
        match command {
            Command::Insert { vector, id, level } => match index.insert_at_level(vector, *id, *level) {
                Ok(assigned) => Some(assigned),
                Err(e) => {
                    tracing::warn!(error = %e, "insert command rejected by state machine");
                    None
                }
            },
            Command::Delete { id } => {
                if let Err(e) = index.delete(*id) {
                    tracing::warn!(error = %e, "delete command rejected by state machine");
                }
                None
            }
            Command::Update { id, vector, level } => {
                // Modeled as delete + re-insert of the same id (spec.md
                // §4.3 Update), atomic within this one apply call.
                let _ = index.delete(*id);
                match index.insert_at_level(vector, Some(*id), *level) {
                    Ok(assigned) => Some(assigned),
                    Err(e) => {
                        tracing::error!(error = %e, "update command rejected by state machine");
                        None
                    }
                }
            }
            Command::AddServer { .. } | Command::RemoveServer { .. } | Command::ChangeConfig { .. } => None,
        }
    }

    async fn snapshot(&self) -> Vec<u8> {
        match self.index.read().await.to_snapshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to snapshot index, emitting empty snapshot");
                Vec::new()
            }
        }
    }

    async fn restore(&mut self, bytes: &[u8]) {
        match HnswIndex::from_snapshot(bytes) {
            Ok(restored) => *self.index.write().await = restored,
            Err(e) => tracing::error!(error = %e, "failed to restore index from snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> VectorStateMachine {
        VectorStateMachine::new(HnswConfig::balanced(4)).unwrap()
    }

    #[tokio::test]
    async fn insert_then_delete_round_trips_through_apply() {
        let mut sm = machine();
        sm.apply(&Command::Insert {
            vector: vec![1.0, 0.0, 0.0, 0.0],
            id: Some(1),
            level: 0,
        })
        .await;
        assert_eq!(sm.index().await.len(), 1);

        sm.apply(&Command::Delete { id: 1 }).await;
        assert_eq!(sm.index().await.len(), 0);
    }

    #[tokio::test]
    async fn update_replaces_the_stored_vector() {
        let mut sm = machine();
        sm.apply(&Command::Insert {
            vector: vec![1.0, 0.0, 0.0, 0.0],
            id: Some(7),
            level: 0,
        })
        .await;
        sm.apply(&Command::Update {
            id: 7,
            vector: vec![0.0, 1.0, 0.0, 0.0],
            level: 0,
        })
        .await;
        assert_eq!(sm.index().await.len(), 1);
        let results = sm.index().await.search(&[0.0, 1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].id, 7);
    }

    #[tokio::test]
    async fn snapshot_and_restore_preserve_contents() {
        let mut sm = machine();
        for i in 0..5u64 {
            sm.apply(&Command::Insert {
                vector: vec![i as f32, 0.0, 0.0, 0.0],
                id: Some(i),
                level: 0,
            })
            .await;
        }
        let snapshot = sm.snapshot().await;

        let mut restored = machine();
        restored.restore(&snapshot).await;
        assert_eq!(restored.index().await.len(), 5);
    }

    #[tokio::test]
    async fn membership_commands_are_ignored() {
        let mut sm = machine();
        sm.apply(&Command::AddServer {
            server: quartz_core::ServerId::new("node-2"),
        })
        .await;
        assert_eq!(sm.index().await.len(), 0);
    }
}
