//! Transport seam between the dispatch core and the socket layer.
//!
//! The core assumes a reliable bidirectional text-frame channel already
//! exists; establishing and tearing down the underlying socket belongs to
//! the collaborator implementing [`Transport`]. Inbound traffic arrives as
//! an ordered stream of [`TransportEvent`]s.

use std::sync::Arc;

use {async_trait::async_trait, tokio::sync::mpsc, tracing::warn};

use shoal_protocol::{Envelope, ProtocolError, encode};

pub mod memory;

/// Crate-wide result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is gone. Reported to the caller; in-flight dispatch of
    /// other envelopes continues.
    #[error("send on closed connection")]
    Closed,

    /// The outbound envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// What the socket layer delivers, in arrival order. A reconnect surfaces as
/// a fresh `Connected`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Frame(String),
    Closed,
}

/// Receiver half of the inbound event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Outbound half of the socket collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: String) -> Result<()>;
}

/// Cheap-to-clone handle handlers use to emit envelopes.
///
/// Sends are fire-and-forget with respect to the dispatch loop: a failure is
/// logged and returned to the immediate caller but never tears down
/// processing of other envelopes.
#[derive(Clone)]
pub struct OutboundHandle {
    transport: Arc<dyn Transport>,
}

impl OutboundHandle {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        let frame = encode(envelope)?;
        if let Err(e) = self.transport.send(frame).await {
            warn!(code = envelope.code, error = %e, "outbound send failed");
            return Err(e);
        }
        Ok(())
    }
}
