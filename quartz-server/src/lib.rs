//! Replica lifecycle: wires the persistent store, the network transport,
//! the vector state machine, and the Raft replica into one running node,
//! and exposes the embedding application's surface commands (spec.md §6)
//! over that wiring.
//!
//! Everything outside this surface — HTTP routing, JSON framing over the
//! wire, a web UI, SQLite persistence of raw vectors — is an external
//! collaborator and not part of the core this crate assembles.

use quartz_core::raft::{
    CommitOutcome, PersistentStore, RaftConfig, Replica, ReplicaHandle, ReplicaStatus, Transport,
};
use quartz_core::{Command, ServerId};
use quartz_storage::RaftStore;
use quartz_vector::{HnswConfig, HnswIndex, IndexStats, SearchResult, VectorError, VectorId, VectorStateMachine};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors surfaced by a running node's public API (spec.md §6 "Surface
/// commands"). Combines the two error domains a surface command can fail
/// with: Raft's (`NotLeader`, transport/persistence) and the vector
/// index's (`DimensionMismatch`, `DuplicateId`, `NodeNotFound`, ...).
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Raft(#[from] quartz_core::Error),
    #[error(transparent)]
    Vector(#[from] VectorError),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Everything needed to bootstrap one replica.
pub struct NodeConfig {
    pub id: ServerId,
    pub cluster: Vec<ServerId>,
    pub data_path: PathBuf,
    pub hnsw: HnswConfig,
    pub raft: RaftConfig,
}

/// A counters snapshot alongside the graph's own stats (spec.md §6
/// `metrics()`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeMetrics {
    pub index: IndexStats,
    pub commands_submitted: u64,
    pub replica: ReplicaStatus,
}

/// One running replica, plus the shared index handle used to serve local
/// reads. `search`/`metrics` never touch the log (spec.md §6: "always
/// local"); `insert`/`delete`/`update` submit a command and wait for it
/// to commit and apply.
pub struct QuartzNode {
    id: ServerId,
    handle: ReplicaHandle,
    index: Arc<RwLock<HnswIndex>>,
    commands_submitted: AtomicU64,
    join: tokio::task::JoinHandle<()>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl QuartzNode {
    /// Restore persistent state from `config.data_path` (creating it if
    /// this is a fresh node) and start the replica's event loop on a
    /// background task.
    pub async fn start(config: NodeConfig, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_path)?;
        let store: Arc<dyn PersistentStore> = Arc::new(RaftStore::open(&config.data_path)?);

        let index = Arc::new(RwLock::new(HnswIndex::new(config.hnsw)?));
        let state_machine = VectorStateMachine::shared(index.clone());

        let replica = Replica::new(
            config.id.clone(),
            config.cluster,
            config.raft,
            store,
            transport,
            Box::new(state_machine),
        )
        .await?;

        let (handle, join, shutdown) = replica.spawn();

        Ok(Self {
            id: config.id,
            handle,
            index,
            commands_submitted: AtomicU64::new(0),
            join,
            shutdown: Some(shutdown),
        })
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    /// Insert `vector`, assigning `id` if none is given.
    ///
    /// Only `level` is resolved here, against the current local index,
    /// and stamped into the command before submission; level has no
    /// uniqueness constraint, so two concurrent inserts each drawing
    /// their own value is harmless. The id itself is *not* pre-resolved:
    /// stamping an auto-assigned id from a snapshot read of the index
    /// would let two concurrent `insert(_, None)` calls both observe the
    /// same next-free id and submit duplicate commands, silently
    /// dropping the second (spec.md §5). Instead `id` is passed through
    /// as given and the state machine's `apply` resolves it: the single
    /// serialized path every replica runs in the same order, handing the
    /// actual stored id back via [`CommitOutcome::resolved_id`].
    pub async fn insert(&self, vector: Vec<f32>, id: Option<VectorId>) -> Result<VectorId> {
        let level = {
            let index = self.index.read().await;
            if let Some(id) = id
                && index.contains(id)
            {
                return Err(VectorError::DuplicateId(id).into());
            }
            if vector.len() != index.config().dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: index.config().dimension,
                    actual: vector.len(),
                }
                .into());
            }
            index.draw_level()
        };

        let outcome = self.submit(Command::Insert { vector, id, level }).await?;
        outcome.resolved_id.ok_or_else(|| {
            id.map(VectorError::DuplicateId)
                .unwrap_or(VectorError::NotApplied)
                .into()
        })
    }

    pub async fn delete(&self, id: VectorId) -> Result<()> {
        if !self.index.read().await.contains(id) {
            return Err(VectorError::NodeNotFound(id).into());
        }
        self.submit(Command::Delete { id }).await?;
        Ok(())
    }

    /// Replace the vector stored at `id`, modeled as delete + re-insert
    /// of the same id (spec.md §4.3 Update), atomic with respect to the
    /// log since both halves live in one committed command. As with
    /// `insert`, the up-front `contains` check is a fast-fail convenience
    /// only; the authoritative result comes from whether `apply` actually
    /// resolved an id for this command.
    pub async fn update(&self, id: VectorId, vector: Vec<f32>) -> Result<()> {
        let level = {
            let index = self.index.read().await;
            if !index.contains(id) {
                return Err(VectorError::NodeNotFound(id).into());
            }
            if vector.len() != index.config().dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: index.config().dimension,
                    actual: vector.len(),
                }
                .into());
            }
            index.draw_level()
        };
        let outcome = self.submit(Command::Update { id, vector, level }).await?;
        outcome.resolved_id.map(|_| ()).ok_or(VectorError::NotApplied.into())
    }

    /// Always served from the local index, regardless of role or how far
    /// this replica's applied index lags the leader's.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        Ok(self.index.read().await.search(query, k)?)
    }

    pub async fn metrics(&self) -> NodeMetrics {
        NodeMetrics {
            index: self.index.read().await.stats(),
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            replica: self.handle.status(),
        }
    }

    /// This replica's current role and, if known, who it believes the
    /// leader is. Cheap to poll; callers waiting on election convergence
    /// should prefer [`QuartzNode::watch_status`] instead.
    pub fn status(&self) -> ReplicaStatus {
        self.handle.status()
    }

    /// A receiver that wakes on every role/leader/commit-index change,
    /// for tests and operators waiting on a particular transition (e.g.
    /// "this cluster has elected a leader").
    pub fn watch_status(&self) -> tokio::sync::watch::Receiver<ReplicaStatus> {
        self.handle.watch_status()
    }

    /// This replica's fault, if its event loop has stopped itself after
    /// a persistence failure (spec.md §7). `None` while the replica is
    /// healthy.
    pub fn fault(&self) -> Option<String> {
        self.handle.fault()
    }

    /// A receiver that wakes once a fault is recorded, for a supervising
    /// process that wants to restart the node rather than poll
    /// [`QuartzNode::fault`].
    pub fn watch_fault(&self) -> tokio::sync::watch::Receiver<Option<String>> {
        self.handle.watch_fault()
    }

    async fn submit(&self, command: Command) -> quartz_core::Result<CommitOutcome> {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
        self.handle.submit(command).await
    }

    /// Signal the replica's event loop to stop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}
