//! Vector search for QuartzDB.
//!
//! An in-memory HNSW index over fixed-dimension, L2-normalized vectors,
//! plus the SIMD-style kernel it's built on and the adapter that lets the
//! index be driven as a replicated state machine.
//!
//! # Example
//!
//! ```
//! use quartz_vector::{HnswConfig, HnswIndex};
//!
//! let mut index = HnswIndex::new(HnswConfig::balanced(4)).unwrap();
//! let id = index.insert(&[1.0, 0.0, 0.0, 0.0], None).unwrap();
//! let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
//! assert_eq!(results[0].id, id);
//! ```

pub mod kernel;

mod hnsw;
mod state_machine;
mod types;

pub use hnsw::{HnswConfig, HnswIndex, IndexStats};
pub use kernel::KernelError;
pub use state_machine::VectorStateMachine;
pub use types::{SearchResult, VectorId};

/// Errors raised by the vector index.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector {0} already exists")]
    DuplicateId(VectorId),

    #[error("vector {0} not found")]
    NodeNotFound(VectorId),

    #[error("operation undefined for a zero vector")]
    ZeroVector,

    #[error("k must be greater than zero")]
    InvalidK,

    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A command committed and applied but the state machine's `apply`
    /// didn't resolve an id for it (e.g. a concurrent command claimed the
    /// caller-supplied id first). Raft itself still succeeded; this is a
    /// domain-level rejection surfaced from [`CommitOutcome::resolved_id`]
    /// being `None`.
    ///
    /// [`CommitOutcome::resolved_id`]: quartz_core::raft::CommitOutcome
    #[error("command was committed but not applied by the state machine")]
    NotApplied,

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

pub type Result<T> = std::result::Result<T, VectorError>;
