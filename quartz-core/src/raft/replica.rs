//! The single-threaded cooperative event loop driving one replica
//! (spec.md §4.3, §5, §9 "Async submission on the leader").
//!
//! Everything — timer fires, inbound RPC handling, client submission, the
//! apply loop, snapshotting, and membership change — is interleaved on
//! one logical task via [`Replica::run`]. There is no internal locking:
//! mutation happens only on the task driving this loop. Grounded in the
//! `riffcc-lis` `Replica` reference (`append_log_entry`,
//! `apply_committed_entries`, `update_commit_index`) generalized into the
//! full protocol, and on `StorageEngine::start_compaction`'s "one spawned
//! background loop per concern" idiom.

use crate::command::{Command, VectorId};
use crate::raft::log::{LogEntry, PersistentStore, RaftLog, SnapshotMeta};
use crate::raft::role::{self, LeaderState, Role};
use crate::raft::rpc::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest,
    InstallSnapshotResponse, RpcMessage, VoteRequest, VoteResponse,
};
use crate::raft::state_machine::StateMachine;
use crate::raft::transport::{Envelope, Transport};
use crate::{Error, LogIndex, Result, ServerId, Term};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Duration, Instant};

use super::config::RaftConfig;

/// A command submitted by the embedding application, along with the
/// channel the replica wakes once it is committed and applied (or once
/// it is rejected outright).
pub struct ClientRequest {
    pub command: Command,
    pub ack: oneshot::Sender<Result<CommitOutcome>>,
}

/// What committing and applying a submitted command actually produced.
///
/// `resolved_id` is the id the state machine's `apply` resolved the
/// command to (the auto-assigned or stamped id for a successful
/// `Insert`/`Update`), or `None` for commands that don't resolve one
/// (`Delete`, membership changes) or that `apply` rejected internally.
/// This is the only authoritative source for an auto-assigned id: it
/// comes from the single serialized apply path every replica runs in the
/// same log order, not from a pre-submission snapshot read of the index,
/// which two concurrent submissions could observe identically and both
/// stamp with the same id (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub index: LogIndex,
    pub resolved_id: Option<VectorId>,
}

/// A point-in-time view of a replica's role, published over a
/// [`watch`] channel so the embedding application can observe election
/// convergence and leader redirection without reaching into the event
/// loop (spec.md §6 "who is leader", §8 "exactly one replica is
/// leader and the others name it").
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReplicaStatus {
    pub role: Role,
    pub current_leader: Option<ServerId>,
    pub commit_index: LogIndex,
}

/// A handle client code holds to submit commands into a running
/// [`Replica`] without sharing its internals. Cloning shares the same
/// channel into the replica's task.
#[derive(Clone)]
pub struct ReplicaHandle {
    requests: mpsc::Sender<ClientRequest>,
    status: watch::Receiver<ReplicaStatus>,
    fault: watch::Receiver<Option<String>>,
}

impl ReplicaHandle {
    /// Submit `command` and wait for it to be committed and applied.
    /// Fails with [`Error::NotLeader`] immediately if this replica isn't
    /// the leader; on a single-node cluster the commit is synchronous
    /// within this call (spec.md §4.3 "Client submissions").
    pub async fn submit(&self, command: Command) -> Result<CommitOutcome> {
        let (ack, rx) = oneshot::channel();
        self.requests
            .send(ClientRequest { command, ack })
            .await
            .map_err(|_| Error::Transport("replica task is no longer running".into()))?;
        rx.await
            .map_err(|_| Error::Transport("replica task is no longer running".into()))?
    }

    /// The replica's role/leader/commit-index as of the last published
    /// transition. Cheap and non-blocking; does not round-trip through
    /// the event loop.
    pub fn status(&self) -> ReplicaStatus {
        self.status.borrow().clone()
    }

    /// A receiver that wakes on every status change, for callers that
    /// want to await convergence (e.g. a test waiting for a leader to be
    /// elected) rather than poll [`ReplicaHandle::status`].
    pub fn watch_status(&self) -> watch::Receiver<ReplicaStatus> {
        self.status.clone()
    }

    /// The replica's fault, if it has stopped itself after a persistence
    /// failure (spec.md §7: "the replica stops participating and
    /// surfaces the fault; recovery requires external restart"). `None`
    /// means the replica is still running normally.
    pub fn fault(&self) -> Option<String> {
        self.fault.borrow().clone()
    }

    /// A receiver that wakes once, when the replica records a fault and
    /// exits its event loop, for an owner that wants to await it rather
    /// than poll [`ReplicaHandle::fault`].
    pub fn watch_fault(&self) -> watch::Receiver<Option<String>> {
        self.fault.clone()
    }
}

pub struct Replica {
    id: ServerId,
    config: RaftConfig,
    store: Arc<dyn PersistentStore>,
    transport: Arc<dyn Transport>,
    state_machine: Box<dyn StateMachine>,

    log: RaftLog,
    current_term: Term,
    voted_for: Option<ServerId>,
    role: Role,
    cluster: Vec<ServerId>,
    current_leader: Option<ServerId>,

    commit_index: LogIndex,
    last_applied: LogIndex,
    leader_state: Option<LeaderState>,
    votes_received: HashSet<ServerId>,
    config_change_in_progress: bool,

    pending_acks: BTreeMap<LogIndex, oneshot::Sender<Result<CommitOutcome>>>,
    status_tx: watch::Sender<ReplicaStatus>,
    fault_tx: watch::Sender<Option<String>>,
}

impl Replica {
    /// Restore persistent state (term, vote, log, snapshot) from `store`
    /// and construct a replica ready to [`run`](Replica::run), starting
    /// as a Follower.
    pub async fn new(
        id: ServerId,
        cluster: Vec<ServerId>,
        config: RaftConfig,
        store: Arc<dyn PersistentStore>,
        transport: Arc<dyn Transport>,
        mut state_machine: Box<dyn StateMachine>,
    ) -> Result<Self> {
        let (current_term, voted_for) = store.load_term_vote().await?;
        let snapshot = store.load_snapshot().await?;

        let (log, last_applied, cluster) = match snapshot {
            Some((meta, state)) => {
                state_machine.restore(&state).await;
                let entries = store.load_log().await?;
                let cluster = if meta.cluster_config.is_empty() {
                    cluster
                } else {
                    meta.cluster_config.clone()
                };
                (
                    RaftLog::from_entries(entries, meta.last_included_index, meta.last_included_term),
                    meta.last_included_index,
                    cluster,
                )
            }
            None => {
                let entries = store.load_log().await?;
                (RaftLog::from_entries(entries, 0, 0), 0, cluster)
            }
        };

        let (status_tx, _) = watch::channel(ReplicaStatus {
            role: Role::Follower,
            current_leader: None,
            commit_index: last_applied,
        });
        let (fault_tx, _) = watch::channel(None);

        Ok(Self {
            id,
            config,
            store,
            transport,
            state_machine,
            log,
            current_term,
            voted_for,
            role: Role::Follower,
            cluster,
            current_leader: None,
            commit_index: last_applied,
            last_applied,
            leader_state: None,
            votes_received: HashSet::new(),
            config_change_in_progress: false,
            pending_acks: BTreeMap::new(),
            status_tx,
            fault_tx,
        })
    }

    /// Push the current role/leader/commit-index to every
    /// [`ReplicaHandle::watch_status`] subscriber. A no-op (beyond the
    /// comparison) when nothing actually changed, since `watch` only
    /// wakes receivers on a new value.
    fn publish_status(&self) {
        self.status_tx.send_replace(ReplicaStatus {
            role: self.role,
            current_leader: self.current_leader.clone(),
            commit_index: self.commit_index,
        });
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current_leader(&self) -> Option<&ServerId> {
        self.current_leader.as_ref()
    }

    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    /// Run the event loop until `shutdown` fires, returning a
    /// [`ReplicaHandle`] callers use to submit commands. Consumes
    /// `self`; the replica only exists inside this task from here on.
    pub fn spawn(self) -> (ReplicaHandle, tokio::task::JoinHandle<()>, oneshot::Sender<()>) {
        let (tx, rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let status = self.status_tx.subscribe();
        let fault = self.fault_tx.subscribe();
        let handle = tokio::spawn(self.run(rx, shutdown_rx));
        (ReplicaHandle { requests: tx, status, fault }, handle, shutdown_tx)
    }

    /// Record a fatal fault and stop participating (spec.md §7:
    /// persistence write failures are "treated as fatal to the replica:
    /// the safety of the protocol depends on these writes being
    /// durable"). Published once over `fault_tx` rather than returned
    /// from the RPC handler, so every observer — the owning application,
    /// tests, an operator dashboard — sees it the same way regardless of
    /// which event triggered it.
    fn record_fault(&self, err: &Error) {
        tracing::error!(id = %self.id, error = %err, "replica fault: stopping event loop");
        self.fault_tx.send_replace(Some(err.to_string()));
    }

    pub async fn run(mut self, mut requests: mpsc::Receiver<ClientRequest>, mut shutdown: oneshot::Receiver<()>) {
        let mut election_deadline = Instant::now() + self.random_election_timeout();
        let mut heartbeat = time::interval(self.config.heartbeat_timeout);
        heartbeat.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(id = %self.id, "replica shutting down");
                    break;
                }
                _ = time::sleep_until(election_deadline) => {
                    if self.role != Role::Leader {
                        if let Err(e) = self.start_election().await {
                            self.record_fault(&e);
                            break;
                        }
                    }
                    election_deadline = Instant::now() + self.random_election_timeout();
                }
                _ = heartbeat.tick() => {
                    if self.role == Role::Leader {
                        self.send_heartbeats().await;
                    }
                }
                Some(envelope) = self.transport.recv() => {
                    match self.handle_message(envelope).await {
                        Ok(true) => election_deadline = Instant::now() + self.random_election_timeout(),
                        Ok(false) => {}
                        Err(e) => {
                            self.record_fault(&e);
                            break;
                        }
                    }
                }
                Some(request) = requests.recv() => {
                    if let Err(e) = self.handle_submit(request.command, request.ack).await {
                        self.record_fault(&e);
                        break;
                    }
                }
                else => break,
            }
        }
    }

    fn random_election_timeout(&self) -> Duration {
        let min = self.config.election_timeout_min.as_millis() as u64;
        let max = self.config.election_timeout_max.as_millis() as u64;
        let millis = rand::rng().random_range(min..=max.max(min));
        Duration::from_millis(millis)
    }

    fn peers(&self) -> Vec<ServerId> {
        self.cluster.iter().filter(|s| **s != self.id).cloned().collect()
    }

    // ---- client submission -------------------------------------------

    /// Errors returned here are fatal (a persistence write failed) and
    /// propagate up to [`Replica::run`], which stops the event loop; the
    /// ack channel is always signalled first so the submitting client
    /// never hangs waiting on a replica that has gone quiet.
    async fn handle_submit(&mut self, command: Command, ack: oneshot::Sender<Result<CommitOutcome>>) -> Result<()> {
        if self.role != Role::Leader {
            let _ = ack.send(Err(Error::NotLeader {
                leader_hint: self.current_leader.clone(),
            }));
            return Ok(());
        }
        if command.is_membership_change() && self.config_change_in_progress {
            let _ = ack.send(Err(Error::ConfigChangeInProgress));
            return Ok(());
        }

        let index = self.log.next_index();
        let entry = LogEntry {
            term: self.current_term,
            index,
            command: command.clone(),
        };
        if let Err(e) = self.store.append_entries(std::slice::from_ref(&entry)).await {
            let _ = ack.send(Err(Error::Persistence(e.to_string())));
            return Err(e);
        }
        self.log.append(entry);
        if command.is_membership_change() {
            self.config_change_in_progress = true;
        }
        self.pending_acks.insert(index, ack);

        if self.cluster.len() <= 1 {
            self.commit_index = index;
            self.apply_committed().await?;
        } else {
            self.replicate_to_peers().await;
        }
        Ok(())
    }

    // ---- election -------------------------------------------------------

    async fn start_election(&mut self) -> Result<()> {
        self.role = Role::Candidate;
        self.current_term += 1;
        self.voted_for = Some(self.id.clone());
        self.store
            .save_term_vote(self.current_term, self.voted_for.clone())
            .await?;
        self.votes_received = [self.id.clone()].into_iter().collect();
        self.current_leader = None;
        self.publish_status();
        tracing::info!(id = %self.id, term = self.current_term, "starting election");

        let peers = self.peers();
        if peers.is_empty() {
            return self.become_leader().await;
        }

        let request = VoteRequest {
            term: self.current_term,
            candidate_id: self.id.clone(),
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        };
        for peer in peers {
            let _ = self
                .transport
                .send(Envelope {
                    from: self.id.clone(),
                    to: peer,
                    message: RpcMessage::VoteRequest(request.clone()),
                })
                .await;
        }
        Ok(())
    }

    async fn become_leader(&mut self) -> Result<()> {
        self.role = Role::Leader;
        self.current_leader = Some(self.id.clone());
        self.leader_state = Some(LeaderState::new(self.peers(), self.log.next_index()));
        self.publish_status();
        tracing::info!(id = %self.id, term = self.current_term, "became leader");
        self.send_heartbeats().await;
        Ok(())
    }

    async fn become_follower(&mut self, term: Term, leader_hint: Option<ServerId>) -> Result<()> {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            self.store.save_term_vote(term, None).await?;
        }
        if self.role != Role::Follower {
            tracing::info!(id = %self.id, term = self.current_term, "stepping down to follower");
        }
        self.role = Role::Follower;
        self.leader_state = None;
        if leader_hint.is_some() {
            self.current_leader = leader_hint;
        }
        self.publish_status();
        Ok(())
    }

    // ---- replication (leader side) --------------------------------------

    async fn send_heartbeats(&mut self) {
        self.replicate_to_peers().await;
    }

    async fn replicate_to_peers(&mut self) {
        let peers = self.peers();
        for peer in peers {
            self.replicate_to(&peer).await;
        }
    }

    async fn replicate_to(&self, peer: &ServerId) {
        let Some(leader_state) = &self.leader_state else { return };
        let next = *leader_state.next_index.get(peer).unwrap_or(&self.log.next_index());

        if next <= self.log.last_included_index() && self.log.last_included_index() > 0 {
            self.send_install_snapshot_to(peer).await;
            return;
        }

        let prev_log_index = if next == 0 { None } else { Some(next - 1) };
        let prev_log_term = match prev_log_index {
            None => 0,
            Some(idx) => self.log.term_at(idx).unwrap_or(0),
        };
        let entries: Vec<LogEntry> = self
            .log
            .entries_from(next)
            .into_iter()
            .take(self.config.batch_size)
            .collect();

        let request = AppendEntriesRequest {
            term: self.current_term,
            leader_id: self.id.clone(),
            prev_log_index,
            prev_log_term,
            entries,
            leader_commit: self.commit_index,
        };
        let _ = self
            .transport
            .send(Envelope {
                from: self.id.clone(),
                to: peer.clone(),
                message: RpcMessage::AppendEntries(request),
            })
            .await;
    }

    async fn send_install_snapshot_to(&self, peer: &ServerId) {
        let Ok(Some((meta, state))) = self.store.load_snapshot().await else {
            return;
        };
        let request = InstallSnapshotRequest {
            term: self.current_term,
            leader_id: self.id.clone(),
            last_included_index: meta.last_included_index,
            last_included_term: meta.last_included_term,
            cluster_config: meta.cluster_config,
            state,
        };
        let _ = self
            .transport
            .send(Envelope {
                from: self.id.clone(),
                to: peer.clone(),
                message: RpcMessage::InstallSnapshot(request),
            })
            .await;
    }

    fn advance_commit_index(&mut self) {
        let Some(leader_state) = &self.leader_state else { return };
        let matches: Vec<LogIndex> = self
            .cluster
            .iter()
            .map(|s| {
                if *s == self.id {
                    self.log.last_index()
                } else {
                    *leader_state.match_index.get(s).unwrap_or(&0)
                }
            })
            .collect();
        let n = role::majority_match_index(matches);
        if n > self.commit_index && self.log.term_at(n) == Some(self.current_term) {
            self.commit_index = n;
        }
    }

    // ---- inbound message dispatch ---------------------------------------

    /// Returns whether the election timer should be reset.
    async fn handle_message(&mut self, envelope: Envelope) -> Result<bool> {
        let Envelope { from, message, .. } = envelope;
        match message {
            RpcMessage::VoteRequest(req) => self.handle_vote_request(from, req).await,
            RpcMessage::VoteResponse(resp) => {
                self.handle_vote_response(from, resp).await?;
                Ok(false)
            }
            RpcMessage::AppendEntries(req) => {
                let (response, reset) = self.handle_append_entries(req).await?;
                let _ = self
                    .transport
                    .send(Envelope {
                        from: self.id.clone(),
                        to: from,
                        message: RpcMessage::AppendEntriesResponse(response),
                    })
                    .await;
                Ok(reset)
            }
            RpcMessage::AppendEntriesResponse(resp) => {
                self.handle_append_response(from, resp).await?;
                Ok(false)
            }
            RpcMessage::InstallSnapshot(req) => {
                let (response, reset) = self.handle_install_snapshot(req).await?;
                let _ = self
                    .transport
                    .send(Envelope {
                        from: self.id.clone(),
                        to: from,
                        message: RpcMessage::InstallSnapshotResponse(response),
                    })
                    .await;
                Ok(reset)
            }
            RpcMessage::InstallSnapshotResponse(resp) => {
                if resp.term > self.current_term {
                    self.become_follower(resp.term, None).await?;
                }
                Ok(false)
            }
        }
    }

    async fn handle_vote_request(&mut self, from: ServerId, req: VoteRequest) -> Result<bool> {
        if req.term > self.current_term {
            self.become_follower(req.term, None).await?;
        }

        let granted = req.term >= self.current_term
            && (self.voted_for.is_none() || self.voted_for.as_ref() == Some(&req.candidate_id))
            && role::candidate_log_is_up_to_date(
                req.last_log_term,
                req.last_log_index,
                self.log.last_term(),
                self.log.last_index(),
            );

        if granted {
            self.voted_for = Some(req.candidate_id.clone());
            self.store
                .save_term_vote(self.current_term, self.voted_for.clone())
                .await?;
        }

        let response = VoteResponse {
            term: self.current_term,
            vote_granted: granted,
        };
        let _ = self
            .transport
            .send(Envelope {
                from: self.id.clone(),
                to: from,
                message: RpcMessage::VoteResponse(response),
            })
            .await;
        Ok(granted)
    }

    async fn handle_vote_response(&mut self, from: ServerId, resp: VoteResponse) -> Result<()> {
        if resp.term > self.current_term {
            return self.become_follower(resp.term, None).await;
        }
        if self.role != Role::Candidate || resp.term != self.current_term || !resp.vote_granted {
            return Ok(());
        }
        self.votes_received.insert(from);
        let majority = self.cluster.len() / 2 + 1;
        if self.votes_received.len() >= majority {
            self.become_leader().await?;
        }
        Ok(())
    }

    async fn handle_append_entries(
        &mut self,
        req: AppendEntriesRequest,
    ) -> Result<(AppendEntriesResponse, bool)> {
        if req.term < self.current_term {
            return Ok((
                AppendEntriesResponse {
                    term: self.current_term,
                    success: false,
                    match_index: 0,
                },
                false,
            ));
        }

        if req.term > self.current_term || self.role != Role::Follower {
            self.become_follower(req.term, Some(req.leader_id.clone())).await?;
        } else {
            self.current_leader = Some(req.leader_id.clone());
            self.publish_status();
        }

        let prev_ok = match req.prev_log_index {
            None => true,
            Some(idx) => self.log.term_at(idx) == Some(req.prev_log_term),
        };
        if !prev_ok {
            return Ok((
                AppendEntriesResponse {
                    term: self.current_term,
                    success: false,
                    match_index: 0,
                },
                true,
            ));
        }

        for entry in &req.entries {
            match self.log.term_at(entry.index) {
                Some(existing_term) if existing_term == entry.term => {
                    // Already present identically; skip.
                }
                Some(_) => {
                    self.log.truncate_from(entry.index);
                    self.store.truncate_from(entry.index).await?;
                    self.log.append(entry.clone());
                    self.store.append_entries(std::slice::from_ref(entry)).await?;
                }
                None => {
                    self.log.append(entry.clone());
                    self.store.append_entries(std::slice::from_ref(entry)).await?;
                }
            }
        }

        let last_new_index = req
            .entries
            .last()
            .map(|e| e.index)
            .unwrap_or_else(|| req.prev_log_index.unwrap_or(0));

        if req.leader_commit > self.commit_index {
            self.commit_index = req.leader_commit.min(last_new_index);
            self.apply_committed().await?;
        }

        Ok((
            AppendEntriesResponse {
                term: self.current_term,
                success: true,
                match_index: last_new_index,
            },
            true,
        ))
    }

    async fn handle_append_response(&mut self, from: ServerId, resp: AppendEntriesResponse) -> Result<()> {
        if resp.term > self.current_term {
            return self.become_follower(resp.term, None).await;
        }
        if self.role != Role::Leader {
            return Ok(());
        }
        if let Some(leader_state) = &mut self.leader_state {
            if resp.success {
                leader_state.match_index.insert(from.clone(), resp.match_index);
                leader_state.next_index.insert(from, resp.match_index + 1);
            } else if let Some(next) = leader_state.next_index.get_mut(&from) {
                *next = next.saturating_sub(1).max(1);
            }
        }
        self.advance_commit_index();
        self.apply_committed().await
    }

    async fn handle_install_snapshot(
        &mut self,
        req: InstallSnapshotRequest,
    ) -> Result<(InstallSnapshotResponse, bool)> {
        if req.term < self.current_term {
            return Ok((
                InstallSnapshotResponse {
                    term: self.current_term,
                    success: false,
                },
                false,
            ));
        }
        if req.term > self.current_term || self.role != Role::Follower {
            self.become_follower(req.term, Some(req.leader_id.clone())).await?;
        }
        if req.last_included_index <= self.log.last_included_index() {
            return Ok((
                InstallSnapshotResponse {
                    term: self.current_term,
                    success: false,
                },
                true,
            ));
        }

        let meta = SnapshotMeta {
            last_included_index: req.last_included_index,
            last_included_term: req.last_included_term,
            cluster_config: req.cluster_config.clone(),
        };
        self.store.save_snapshot(meta.clone(), req.state.clone()).await?;
        self.log = RaftLog::from_entries(Vec::new(), meta.last_included_index, meta.last_included_term);
        self.cluster = req.cluster_config;
        self.state_machine.restore(&req.state).await;
        self.commit_index = self.commit_index.max(meta.last_included_index);
        self.last_applied = meta.last_included_index;

        Ok((
            InstallSnapshotResponse {
                term: self.current_term,
                success: true,
            },
            true,
        ))
    }

    // ---- apply loop & snapshotting ---------------------------------------

    async fn apply_committed(&mut self) -> Result<()> {
        while self.last_applied < self.commit_index {
            self.last_applied += 1;
            let index = self.last_applied;
            let mut resolved_id = None;
            if let Some(entry) = self.log.at(index).cloned() {
                resolved_id = self.apply_entry(&entry).await;
            }
            if let Some(ack) = self.pending_acks.remove(&index) {
                let _ = ack.send(Ok(CommitOutcome { index, resolved_id }));
            }
        }
        self.publish_status();
        self.maybe_snapshot().await
    }

    async fn apply_entry(&mut self, entry: &LogEntry) -> Option<VectorId> {
        match &entry.command {
            Command::AddServer { server } => {
                if !self.cluster.contains(server) {
                    self.cluster.push(server.clone());
                }
                self.config_change_in_progress = false;
                None
            }
            Command::RemoveServer { server } => {
                self.cluster.retain(|s| s != server);
                self.config_change_in_progress = false;
                None
            }
            Command::ChangeConfig { servers } => {
                self.cluster = servers.clone();
                self.config_change_in_progress = false;
                None
            }
            other => self.state_machine.apply(other).await,
        }
    }

    async fn maybe_snapshot(&mut self) -> Result<()> {
        if self.log.len() < self.config.snapshot_threshold {
            return Ok(());
        }
        let last_included_term = self
            .log
            .term_at(self.last_applied)
            .unwrap_or_else(|| self.log.last_included_term());
        let state = self.state_machine.snapshot().await;
        let meta = SnapshotMeta {
            last_included_index: self.last_applied,
            last_included_term,
            cluster_config: self.cluster.clone(),
        };
        self.store.save_snapshot(meta.clone(), state).await?;
        self.log.compact_through(meta.last_included_index, meta.last_included_term);
        tracing::info!(id = %self.id, index = meta.last_included_index, "compacted log via snapshot");
        Ok(())
    }
}
