//! Concrete `quartz_core::raft::Transport` implementations: [`TcpTransport`]
//! for real clusters, [`InProcessHub`]/[`InProcessTransport`] for tests
//! and single-process deployments. The trait itself lives in
//! `quartz_core::raft::transport` so the core crate never depends on
//! this one.

mod inprocess;
mod tcp;

pub use inprocess::{InProcessHub, InProcessTransport};
pub use tcp::TcpTransport;
