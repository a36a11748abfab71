//! Recognized Raft timing and batching parameters (spec.md §4.3).

use std::time::Duration;

/// Timing parameters for a replica's election and heartbeat timers, plus
/// the batching and compaction thresholds. Same idiom as `StorageConfig`/
/// `HnswConfig` elsewhere in this workspace: a plain struct with a
/// sensible `Default`.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// Interval at which a leader sends AppendEntries (including empty
    /// heartbeats) to every peer.
    pub heartbeat_timeout: Duration,
    /// Lower bound of the randomized follower/candidate election timeout.
    pub election_timeout_min: Duration,
    /// Upper bound of the randomized follower/candidate election timeout.
    pub election_timeout_max: Duration,
    /// Maximum number of log entries sent in a single AppendEntries.
    pub batch_size: usize,
    /// Log length at which a replica triggers snapshot compaction.
    pub snapshot_threshold: usize,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(50),
            election_timeout_min: Duration::from_millis(150),
            election_timeout_max: Duration::from_millis(300),
            batch_size: 64,
            snapshot_threshold: 10_000,
        }
    }
}

impl RaftConfig {
    /// A configuration with shorter timeouts, useful for tests that want
    /// elections to converge quickly without waiting out production
    /// timing.
    pub fn fast_test() -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(10),
            election_timeout_min: Duration::from_millis(30),
            election_timeout_max: Duration::from_millis(60),
            batch_size: 64,
            snapshot_threshold: 1_000,
        }
    }
}
