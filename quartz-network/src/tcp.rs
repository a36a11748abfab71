//! TCP implementation of `quartz_core::raft::Transport`: one
//! length-delimited, bincode-framed connection per outbound send, and a
//! background accept loop feeding a single inbound queue.
//!
//! Grounded in the original `NetworkTransport` connect/send/receive
//! shape, rebuilt on `tokio_util::codec::LengthDelimitedCodec` (this
//! workspace's `tokio-util` dependency was already pulled in for this
//! framing) instead of a bespoke length prefix.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use quartz_core::raft::{Envelope, Transport, TransportError};
use quartz_core::ServerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// A Raft transport backed by one TCP listener per replica and one
/// outbound connection per send. Simple rather than pooled: the
/// heartbeat/election cadence tolerates a fresh handshake per message,
/// and a failed dial is just a dropped heartbeat, not a fatal error.
pub struct TcpTransport {
    addresses: HashMap<ServerId, SocketAddr>,
    inbound: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl TcpTransport {
    /// Bind `listen_addr` and start accepting connections from peers.
    /// `addresses` maps every peer this replica may need to contact to
    /// its listen address; it need not include this replica's own id.
    pub async fn bind(
        listen_addr: SocketAddr,
        addresses: HashMap<ServerId, SocketAddr>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::accept_loop(listener, tx));
        Ok(Self {
            addresses,
            inbound: Mutex::new(rx),
        })
    }

    async fn accept_loop(listener: TcpListener, tx: mpsc::UnboundedSender<Envelope>) {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let tx = tx.clone();
                    tokio::spawn(Self::handle_connection(stream, tx));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed, retrying");
                }
            }
        }
    }

    async fn handle_connection(stream: TcpStream, tx: mpsc::UnboundedSender<Envelope>) {
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        while let Some(frame) = framed.next().await {
            let bytes = match frame {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "connection read error");
                    return;
                }
            };
            match bincode::deserialize::<Envelope>(&bytes) {
                Ok(envelope) => {
                    if tx.send(envelope).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to decode inbound envelope"),
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let addr = self
            .addresses
            .get(&envelope.to)
            .ok_or_else(|| TransportError(format!("no known address for {}", envelope.to)))?;

        let bytes = bincode::serialize(&envelope).map_err(|e| TransportError(e.to_string()))?;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        framed
            .send(Bytes::from(bytes))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn recv(&self) -> Option<Envelope> {
        self.inbound.lock().await.recv().await
    }
}
