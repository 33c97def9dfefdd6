//! In-memory duplex transport.
//!
//! The reference "reliable bidirectional byte-message channel": two
//! endpoints wired back to back over unbounded mpsc queues. Used by the
//! crate tests and the end-to-end dispatch scenarios.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{EventReceiver, Result, Transport, TransportError, TransportEvent};

/// One side of an in-memory duplex connection.
pub struct MemoryTransport {
    peer: mpsc::UnboundedSender<TransportEvent>,
    closed: Arc<AtomicBool>,
}

/// An endpoint: the send half plus the ordered inbound event stream.
pub struct MemoryEndpoint {
    pub transport: Arc<MemoryTransport>,
    pub events: EventReceiver,
}

/// Create a connected endpoint pair. Both sides observe `Connected` as their
/// first event.
pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    let _ = a_tx.send(TransportEvent::Connected);
    let _ = b_tx.send(TransportEvent::Connected);

    let a = MemoryEndpoint {
        transport: Arc::new(MemoryTransport {
            peer: b_tx,
            closed: Arc::clone(&closed),
        }),
        events: a_rx,
    };
    let b = MemoryEndpoint {
        transport: Arc::new(MemoryTransport {
            peer: a_tx,
            closed,
        }),
        events: b_rx,
    };
    (a, b)
}

impl MemoryTransport {
    /// Tear the connection down; both sides start failing with `Closed` and
    /// the peer observes a `Closed` event.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.peer.send(TransportEvent::Closed);
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.peer
            .send(TransportEvent::Frame(frame))
            .map_err(|_| TransportError::Closed)
    }
}
