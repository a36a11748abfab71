//! Shared test harness for the Raft integration suites (`raft_safety.rs`,
//! `scenarios.rs`): an in-memory `Transport`/`PersistentStore` pair so a
//! cluster of `Replica`s can be driven end to end within one test process,
//! without pulling in `quartz-network`'s sockets or `quartz-storage`'s
//! RocksDB. Mirrors `quartz-network::InProcessHub`'s shape (a shared map of
//! per-peer inbound queues) one layer further down, since `quartz-core`
//! cannot depend on `quartz-network` without a cycle.

use async_trait::async_trait;
use quartz_core::command::Command;
use quartz_core::raft::{
    Envelope, LogEntry, PersistentStore, RaftConfig, Replica, ReplicaHandle, SnapshotMeta,
    StateMachine, Transport, TransportError,
};
use quartz_core::{LogIndex, Result as CoreResult, ServerId, Term};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

/// A shared switchboard of per-replica inbound queues. `send` looks the
/// destination up and forwards; a replica with no registered queue (never
/// joined, or [`InMemoryHub::disconnect`]ed to simulate a crash) silently
/// drops the message, matching the "send is non-blocking, never retried by
/// the core itself" contract `Transport` documents.
pub struct InMemoryHub {
    senders: StdMutex<HashMap<ServerId, mpsc::UnboundedSender<Envelope>>>,
}

impl InMemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            senders: StdMutex::new(HashMap::new()),
        })
    }

    /// Register `id` and hand back the transport its replica should run
    /// with. Registering an id a second time (e.g. after
    /// [`InMemoryHub::disconnect`], to simulate a restart) replaces its
    /// queue; messages sent to the stale queue are simply never read.
    pub fn transport_for(self: &Arc<Self>, id: ServerId) -> Arc<InMemoryTransport> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().insert(id, tx);
        Arc::new(InMemoryTransport {
            hub: self.clone(),
            inbound: AsyncMutex::new(rx),
        })
    }

    /// Simulate a replica crashing: further sends to `id` are dropped until
    /// it (or a restarted replica with the same id) calls
    /// [`InMemoryHub::transport_for`] again.
    pub fn disconnect(&self, id: &ServerId) {
        self.senders.lock().unwrap().remove(id);
    }
}

pub struct InMemoryTransport {
    hub: Arc<InMemoryHub>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Envelope>>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let sender = self.hub.senders.lock().unwrap().get(&envelope.to).cloned();
        if let Some(tx) = sender {
            let _ = tx.send(envelope);
        }
        Ok(())
    }

    async fn recv(&self) -> Option<Envelope> {
        self.inbound.lock().await.recv().await
    }
}

#[derive(Default)]
struct StoreState {
    term: Term,
    voted_for: Option<ServerId>,
    log: Vec<LogEntry>,
    snapshot: Option<(SnapshotMeta, Vec<u8>)>,
}

/// An in-memory stand-in for `quartz-storage::RaftStore`. Kept behind an
/// `Arc` so a test can hand the same store to a freshly constructed
/// `Replica` after simulating a restart, exercising the same
/// recover-from-persisted-state path `Replica::new` uses against the real
/// RocksDB backing.
pub struct InMemoryStore {
    state: StdMutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: StdMutex::new(StoreState::default()),
        })
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn load_term_vote(&self) -> CoreResult<(Term, Option<ServerId>)> {
        let s = self.state.lock().unwrap();
        Ok((s.term, s.voted_for.clone()))
    }

    async fn save_term_vote(&self, term: Term, voted_for: Option<ServerId>) -> CoreResult<()> {
        let mut s = self.state.lock().unwrap();
        s.term = term;
        s.voted_for = voted_for;
        Ok(())
    }

    async fn load_log(&self) -> CoreResult<Vec<LogEntry>> {
        Ok(self.state.lock().unwrap().log.clone())
    }

    async fn append_entries(&self, entries: &[LogEntry]) -> CoreResult<()> {
        self.state.lock().unwrap().log.extend_from_slice(entries);
        Ok(())
    }

    async fn truncate_from(&self, from_index: LogIndex) -> CoreResult<()> {
        self.state.lock().unwrap().log.retain(|e| e.index < from_index);
        Ok(())
    }

    async fn load_snapshot(&self) -> CoreResult<Option<(SnapshotMeta, Vec<u8>)>> {
        Ok(self.state.lock().unwrap().snapshot.clone())
    }

    async fn save_snapshot(&self, meta: SnapshotMeta, state: Vec<u8>) -> CoreResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.retain(|e| e.index > meta.last_included_index);
        s.snapshot = Some((meta, state));
        Ok(())
    }
}

/// A state machine that just records the commands it is asked to apply, in
/// order. Standing in for `quartz_vector::VectorStateMachine` so these
/// tests exercise Raft's own safety properties without needing a real HNSW
/// index or vector payloads.
pub struct RecordingStateMachine {
    applied: Arc<StdMutex<Vec<Command>>>,
}

impl RecordingStateMachine {
    pub fn new() -> (Self, Arc<StdMutex<Vec<Command>>>) {
        let applied = Arc::new(StdMutex::new(Vec::new()));
        (
            Self {
                applied: applied.clone(),
            },
            applied,
        )
    }
}

#[async_trait]
impl StateMachine for RecordingStateMachine {
    async fn apply(&mut self, command: &Command) -> Option<quartz_core::command::VectorId> {
        self.applied.lock().unwrap().push(command.clone());
        None
    }

    async fn snapshot(&self) -> Vec<u8> {
        serde_json::to_vec(&*self.applied.lock().unwrap()).expect("command log is serializable")
    }

    async fn restore(&mut self, bytes: &[u8]) {
        if let Ok(commands) = serde_json::from_slice::<Vec<Command>>(bytes) {
            *self.applied.lock().unwrap() = commands;
        }
    }
}

/// A running replica plus the handles a test needs to drive and inspect it.
pub struct TestReplica {
    pub id: ServerId,
    pub handle: ReplicaHandle,
    pub join: tokio::task::JoinHandle<()>,
    pub shutdown: oneshot::Sender<()>,
    pub applied: Arc<StdMutex<Vec<Command>>>,
    pub store: Arc<InMemoryStore>,
}

impl TestReplica {
    pub fn applied_commands(&self) -> Vec<Command> {
        self.applied.lock().unwrap().clone()
    }
}

/// Spawn a fresh replica (no prior persisted state) registered on `hub`.
pub async fn spawn_replica(
    id: ServerId,
    cluster: Vec<ServerId>,
    config: RaftConfig,
    hub: &Arc<InMemoryHub>,
) -> TestReplica {
    spawn_replica_with_store(id, cluster, config, hub, InMemoryStore::new()).await
}

/// Spawn a replica against a caller-supplied store, so a "restart after
/// crash" scenario can reuse the same persisted term/vote/log.
pub async fn spawn_replica_with_store(
    id: ServerId,
    cluster: Vec<ServerId>,
    config: RaftConfig,
    hub: &Arc<InMemoryHub>,
    store: Arc<InMemoryStore>,
) -> TestReplica {
    let transport = hub.transport_for(id.clone());
    let (state_machine, applied) = RecordingStateMachine::new();
    let replica = Replica::new(
        id.clone(),
        cluster,
        config,
        store.clone(),
        transport,
        Box::new(state_machine),
    )
    .await
    .expect("replica restores from a fresh in-memory store");
    let (handle, join, shutdown) = replica.spawn();
    TestReplica {
        id,
        handle,
        join,
        shutdown,
        applied,
        store,
    }
}

/// Poll every replica's status until each one names the same, non-empty
/// leader, or panic once `timeout` elapses. Returns the agreed leader id.
pub async fn wait_for_leader(replicas: &[TestReplica], timeout: std::time::Duration) -> ServerId {
    tokio::time::timeout(timeout, async {
        loop {
            let leaders: Vec<Option<ServerId>> = replicas
                .iter()
                .map(|r| r.handle.status().current_leader)
                .collect();
            if let Some(first) = leaders.first().cloned().flatten() {
                if leaders.iter().all(|l| l.as_ref() == Some(&first)) {
                    return first;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("cluster did not converge on a leader in time")
}
