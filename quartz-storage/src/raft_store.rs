//! RocksDB-backed [`PersistentStore`]: the three durable regions a
//! replica needs (spec.md §3) — current term/vote, the log tail, and the
//! most recent snapshot — kept in one RocksDB instance under distinct
//! key prefixes, one `DB` rather than one file per concern.
//!
//! Every write that Raft depends on for a safety property (vote grant,
//! log append, truncate, snapshot install) goes through a single
//! `WriteBatch` so it lands durably or not at all.

use crate::Error as StorageError;
use async_trait::async_trait;
use quartz_core::raft::{LogEntry, PersistentStore, SnapshotMeta};
use quartz_core::{Error, LogIndex, Result, ServerId, Term};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::{Path, PathBuf};

const TERM_VOTE_KEY: &[u8] = b"meta:term_vote";
const SNAPSHOT_KEY: &[u8] = b"meta:snapshot";
const LOG_PREFIX: &[u8] = b"log:";

fn log_key(index: LogIndex) -> Vec<u8> {
    let mut key = LOG_PREFIX.to_vec();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn persistence_err(e: impl std::fmt::Display) -> Error {
    Error::Persistence(e.to_string())
}

fn serialization_err(e: impl std::fmt::Display) -> Error {
    Error::Serialization(e.to_string())
}

/// The RocksDB-backed implementation of `quartz_core::raft::PersistentStore`
/// every replica is built on.
pub struct RaftStore {
    db: DB,
    path: PathBuf,
}

impl RaftStore {
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &path)?;
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistentStore for RaftStore {
    async fn load_term_vote(&self) -> Result<(Term, Option<ServerId>)> {
        match self.db.get(TERM_VOTE_KEY).map_err(persistence_err)? {
            Some(bytes) => bincode::deserialize(&bytes).map_err(serialization_err),
            None => Ok((0, None)),
        }
    }

    async fn save_term_vote(&self, term: Term, voted_for: Option<ServerId>) -> Result<()> {
        let bytes = bincode::serialize(&(term, voted_for)).map_err(serialization_err)?;
        self.db.put(TERM_VOTE_KEY, bytes).map_err(persistence_err)
    }

    async fn load_log(&self) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(LOG_PREFIX, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(persistence_err)?;
            if !key.starts_with(LOG_PREFIX) {
                break;
            }
            entries.push(bincode::deserialize(&value).map_err(serialization_err)?);
        }
        Ok(entries)
    }

    async fn append_entries(&self, entries: &[LogEntry]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for entry in entries {
            let bytes = bincode::serialize(entry).map_err(serialization_err)?;
            batch.put(log_key(entry.index), bytes);
        }
        self.db.write(batch).map_err(persistence_err)
    }

    async fn truncate_from(&self, from_index: LogIndex) -> Result<()> {
        let mut batch = WriteBatch::default();
        let iter = self
            .db
            .iterator(IteratorMode::From(&log_key(from_index), Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(persistence_err)?;
            if !key.starts_with(LOG_PREFIX) {
                break;
            }
            batch.delete(key);
        }
        self.db.write(batch).map_err(persistence_err)
    }

    async fn load_snapshot(&self) -> Result<Option<(SnapshotMeta, Vec<u8>)>> {
        match self.db.get(SNAPSHOT_KEY).map_err(persistence_err)? {
            Some(bytes) => bincode::deserialize(&bytes).map_err(serialization_err).map(Some),
            None => Ok(None),
        }
    }

    async fn save_snapshot(&self, meta: SnapshotMeta, state: Vec<u8>) -> Result<()> {
        let last_included_index = meta.last_included_index;
        let snapshot_bytes = bincode::serialize(&(meta, state)).map_err(serialization_err)?;

        let mut batch = WriteBatch::default();
        batch.put(SNAPSHOT_KEY, snapshot_bytes);

        let iter = self
            .db
            .iterator(IteratorMode::From(LOG_PREFIX, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(persistence_err)?;
            if !key.starts_with(LOG_PREFIX) {
                break;
            }
            let index_bytes = &key[LOG_PREFIX.len()..];
            if index_bytes.len() == 8 {
                let index = LogIndex::from_be_bytes(index_bytes.try_into().unwrap());
                if index > last_included_index {
                    break;
                }
            }
            batch.delete(key);
        }

        self.db.write(batch).map_err(persistence_err)
    }
}
