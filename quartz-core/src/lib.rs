//! QuartzDB core: the Raft-replicated log.
//!
//! A leader-elected state machine that totally orders mutating commands
//! across a small cluster. Each replica's applied log drives a local
//! state machine (the HNSW index, via `quartz-vector`); reads never go
//! through the log.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod command;
pub mod error;
pub mod raft;

pub use command::Command;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Identity of a replica. Assigned by the operator, not auto-generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Monotonically increasing election term.
pub type Term = u64;

/// Position of an entry in the replicated log, contiguous from 0 (or from
/// `lastIncludedIndex + 1` after compaction).
pub type LogIndex = u64;
