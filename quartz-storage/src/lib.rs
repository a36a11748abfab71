//! Durable storage for QuartzDB: a RocksDB-backed implementation of
//! `quartz_core::raft::PersistentStore` — current term/vote, the log
//! tail, and the most recent snapshot, the only state a replica must
//! recover exactly after a crash (spec.md §3, §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

mod raft_store;

pub use raft_store::RaftStore;
