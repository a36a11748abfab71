//! An in-memory `Transport` for tests: a shared hub routing envelopes
//! between replicas running in the same process, with no serialization
//! or I/O. Used to exercise election/replication/snapshot scenarios
//! (spec.md §8) without binding real sockets.

use async_trait::async_trait;
use quartz_core::raft::{Envelope, Transport, TransportError};
use quartz_core::ServerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};

type Routes = Arc<StdMutex<HashMap<ServerId, mpsc::UnboundedSender<Envelope>>>>;

/// Shared switchboard: every replica in a test cluster registers with
/// the same hub, then gets its own [`InProcessTransport`] handle.
#[derive(Clone, Default)]
pub struct InProcessHub {
    routes: Routes,
}

impl InProcessHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return the transport handle it should drive its
    /// replica with.
    pub fn transport_for(&self, id: ServerId) -> InProcessTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.lock().unwrap().insert(id, tx);
        InProcessTransport {
            routes: self.routes.clone(),
            inbound: Mutex::new(rx),
        }
    }
}

pub struct InProcessTransport {
    routes: Routes,
    inbound: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let sender = self.routes.lock().unwrap().get(&envelope.to).cloned();
        match sender {
            Some(tx) => tx
                .send(envelope)
                .map_err(|_| TransportError("peer's inbound channel closed".into())),
            None => Err(TransportError(format!("unknown peer {}", envelope.to))),
        }
    }

    async fn recv(&self) -> Option<Envelope> {
        self.inbound.lock().await.recv().await
    }
}
