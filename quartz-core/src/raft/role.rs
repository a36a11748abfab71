//! The Follower/Candidate/Leader state machine and its transition rules
//! (spec.md §4.3 "Role state machine").

use crate::{LogIndex, ServerId, Term};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Leader-only volatile state: per-peer replication progress, reset every
/// time a replica becomes leader.
#[derive(Debug, Default)]
pub struct LeaderState {
    pub next_index: HashMap<ServerId, LogIndex>,
    pub match_index: HashMap<ServerId, LogIndex>,
}

impl LeaderState {
    /// Initialize `nextIndex` to `next_index_seed` (the log's own
    /// [`RaftLog::next_index`](crate::raft::RaftLog::next_index)) and
    /// `matchIndex` to 0 for every peer, per spec.md §4.3.
    pub fn new(peers: impl IntoIterator<Item = ServerId>, next_index_seed: LogIndex) -> Self {
        let mut next_index = HashMap::new();
        let mut match_index = HashMap::new();
        for peer in peers {
            next_index.insert(peer.clone(), next_index_seed);
            match_index.insert(peer, 0);
        }
        Self { next_index, match_index }
    }
}

/// Whether a candidate's log is at least as up-to-date as ours: a
/// strictly later last-log term wins outright; on equal term, the longer
/// log wins (spec.md §4.3 VoteRequest).
pub fn candidate_log_is_up_to_date(
    candidate_last_term: Term,
    candidate_last_index: LogIndex,
    our_last_term: Term,
    our_last_index: LogIndex,
) -> bool {
    candidate_last_term > our_last_term
        || (candidate_last_term == our_last_term && candidate_last_index >= our_last_index)
}

/// The value N such that a majority of `match_index` values (including
/// the leader's own, which is always its `last_log_index`) are `>= N`:
/// the median of the multiset, per spec.md §4.3 "Commit advancement".
pub fn majority_match_index(mut match_indexes: Vec<LogIndex>) -> LogIndex {
    if match_indexes.is_empty() {
        return 0;
    }
    match_indexes.sort_unstable();
    match_indexes[(match_indexes.len() - 1) / 2]
}
