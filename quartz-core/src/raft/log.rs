//! The in-memory log tail and the persistence trait that backs it.
//!
//! Grounded in the original `consensus::LogEntry` stub, generalized into
//! the full index/term/command shape and the truncate-from-index
//! operations AppendEntries and InstallSnapshot need.

use crate::command::Command;
use crate::{LogIndex, Result, ServerId, Term};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One immutable (once appended) log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: Term,
    pub index: LogIndex,
    pub command: Command,
}

/// Metadata recorded alongside a snapshot: the last log entry it covers
/// and the cluster configuration in effect at that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub last_included_index: LogIndex,
    pub last_included_term: Term,
    pub cluster_config: Vec<ServerId>,
}

/// The durable pieces of a replica's persistent state (spec.md §3):
/// current term, voted-for, the log tail, and the most recent snapshot.
/// Implemented by `quartz-storage::RaftStore`.
///
/// A write through this trait must be durable before any observable
/// message that depends on it is sent (vote grant, AppendEntries
/// response, commit acknowledgement) — the standard Raft durability
/// contract (spec.md §3, §7).
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn load_term_vote(&self) -> Result<(Term, Option<ServerId>)>;
    async fn save_term_vote(&self, term: Term, voted_for: Option<ServerId>) -> Result<()>;

    /// Load every entry after the last snapshot, in index order.
    async fn load_log(&self) -> Result<Vec<LogEntry>>;
    /// Durably append `entries` to the tail of the log.
    async fn append_entries(&self, entries: &[LogEntry]) -> Result<()>;
    /// Durably discard every entry at or after `from_index`.
    async fn truncate_from(&self, from_index: LogIndex) -> Result<()>;

    async fn load_snapshot(&self) -> Result<Option<(SnapshotMeta, Vec<u8>)>>;
    /// Atomically record a new snapshot and discard the log prefix it
    /// supersedes.
    async fn save_snapshot(&self, meta: SnapshotMeta, state: Vec<u8>) -> Result<()>;
}

/// The replica's in-memory view of its log: the tail not yet covered by a
/// snapshot. Indexes are absolute (not relative to `start_index`); the
/// snapshot boundary is `start_index - 1`.
pub struct RaftLog {
    entries: VecDeque<LogEntry>,
    /// Absolute index of `entries[0]`, i.e. `lastIncludedIndex + 1`.
    start_index: LogIndex,
    last_included_index: LogIndex,
    last_included_term: Term,
}

impl RaftLog {
    /// A bare, empty log starting at index 0. Only used directly by this
    /// module's own unit tests, which push hand-built entries without going
    /// through `next_index()`; a real replica always boots through
    /// [`RaftLog::from_entries`] instead, which reserves index 0 as the
    /// "before the log" sentinel.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            start_index: 0,
            last_included_index: 0,
            last_included_term: 0,
        }
    }

    /// Rebuild a log tail from entries loaded off disk. `start_index` is
    /// derived from the first loaded entry's own index when there is one
    /// (the source of truth), otherwise `last_included_index + 1` — which,
    /// for a replica that has never taken a snapshot, naturally yields 1:
    /// index 0 is reserved as the universal "before the log" sentinel
    /// (`commit_index`/`last_applied` start there, and `prevLogIndex`/
    /// `prevLogTerm` of 0/0 always matches), so the first real entry a
    /// fresh replica ever appends must be index 1, never 0.
    pub fn from_entries(
        entries: Vec<LogEntry>,
        last_included_index: LogIndex,
        last_included_term: Term,
    ) -> Self {
        let start_index = match entries.first() {
            Some(e) => e.index,
            None => last_included_index + 1,
        };
        Self {
            start_index,
            entries: entries.into(),
            last_included_index,
            last_included_term,
        }
    }

    pub fn last_included_index(&self) -> LogIndex {
        self.last_included_index
    }

    pub fn last_included_term(&self) -> Term {
        self.last_included_term
    }

    /// Index of the last entry in the log (snapshot boundary if empty).
    /// Saturates at 0 for a log built through [`RaftLog::from_entries`]
    /// that has never held an entry, since 0 is the reserved
    /// "before the log" sentinel and there is nothing earlier to report.
    pub fn last_index(&self) -> LogIndex {
        (self.start_index + self.entries.len() as LogIndex).saturating_sub(1)
    }

    /// Index the next appended entry will receive: `last_index() + 1`,
    /// computed directly rather than via `last_index` so it stays exact
    /// even where `last_index` would have saturated.
    pub fn next_index(&self) -> LogIndex {
        self.start_index + self.entries.len() as LogIndex
    }

    /// Term of the last entry in the log (the snapshot's term if empty).
    pub fn last_term(&self) -> Term {
        match self.entries.back() {
            Some(e) => e.term,
            None => self.last_included_term,
        }
    }

    /// Term at `index`, if still present (not yet compacted away).
    pub fn term_at(&self, index: LogIndex) -> Option<Term> {
        if index == self.last_included_index {
            return Some(self.last_included_term);
        }
        self.at(index).map(|e| e.term)
    }

    /// The entry at `index`, if still present.
    pub fn at(&self, index: LogIndex) -> Option<&LogEntry> {
        if index < self.start_index {
            return None;
        }
        let offset = (index - self.start_index) as usize;
        self.entries.get(offset)
    }

    /// Whether `index` falls entirely before the log's known range.
    pub fn contains(&self, index: LogIndex) -> bool {
        index >= self.last_included_index && index <= self.last_index()
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
    }

    /// Discard every entry at or after `from_index`.
    pub fn truncate_from(&mut self, from_index: LogIndex) {
        if from_index < self.start_index {
            self.entries.clear();
            return;
        }
        let keep = (from_index - self.start_index) as usize;
        self.entries.truncate(keep);
    }

    /// Entries starting at `from_index`, for replication or persistence.
    pub fn entries_from(&self, from_index: LogIndex) -> Vec<LogEntry> {
        if from_index < self.start_index {
            return self.entries.iter().cloned().collect();
        }
        let offset = (from_index - self.start_index) as usize;
        self.entries.iter().skip(offset).cloned().collect()
    }

    /// Drop every entry at or below `up_to_index`, recording the new
    /// snapshot boundary. Called after a snapshot has been durably saved.
    pub fn compact_through(&mut self, up_to_index: LogIndex, up_to_term: Term) {
        if up_to_index < self.start_index {
            return;
        }
        let drop_count = (up_to_index - self.start_index + 1) as usize;
        for _ in 0..drop_count.min(self.entries.len()) {
            self.entries.pop_front();
        }
        self.start_index = up_to_index + 1;
        self.last_included_index = up_to_index;
        self.last_included_term = up_to_term;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RaftLog {
    fn default() -> Self {
        Self::new()
    }
}
