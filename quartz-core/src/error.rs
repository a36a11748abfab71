use crate::ServerId;
use thiserror::Error;

/// Errors surfaced by the replicated log.
///
/// Input-validation errors (dimension mismatch, duplicate id, ...)
/// originate in the state machine and never reach here: the apply
/// callback is total with respect to Raft (see [`crate::raft::StateMachine`]).
#[derive(Error, Debug)]
pub enum Error {
    /// The command was submitted to a non-leader. Carries the known
    /// leader, if any, so the caller can redirect.
    #[error("not leader{}", leader_hint.as_ref().map(|s| format!(" (leader is {s})")).unwrap_or_default())]
    NotLeader { leader_hint: Option<ServerId> },

    /// A second AddServer/RemoveServer was submitted while one was still
    /// in flight. Only one membership change is in flight at a time.
    #[error("a configuration change is already in progress")]
    ConfigChangeInProgress,

    /// A send failed or a peer was unreachable. Not retried from within
    /// the handler; the next heartbeat or election cycle makes progress.
    #[error("transport error: {0}")]
    Transport(String),

    /// A durable write (term, vote, log, snapshot) failed. Fatal to the
    /// replica: Raft's safety properties depend on these writes being
    /// durable before any observable response depends on them.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
