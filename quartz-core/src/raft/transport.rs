//! Core-in: the transport interface a replica's event loop depends on
//! (spec.md §6). `quartz-network` supplies the concrete implementations
//! (`TcpTransport` for production, `InProcessTransport` for tests); the
//! interface lives here so the replica can depend on it without the core
//! depending on the network crate.

use crate::raft::rpc::RpcMessage;
use crate::ServerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One message in flight, addressed to a specific peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub from: ServerId,
    pub to: ServerId,
    pub message: RpcMessage,
}

/// A message-passing channel with per-peer send and a single inbound
/// stream (spec.md §6 "Core-in: transport").
///
/// `send` is non-blocking: failure is reported but never retried by the
/// core itself. The transport is expected to queue, reconnect, or drop
/// according to its own policy; Raft's own heartbeat/election cycle is
/// what drives eventual progress.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Pull the next inbound message, if any is queued. Returns `None`
    /// only when the transport has been shut down.
    async fn recv(&self) -> Option<Envelope>;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("transport send failed: {0}")]
pub struct TransportError(pub String);
