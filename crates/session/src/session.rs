use std::collections::VecDeque;

use tracing::{debug, info, warn};

use {
    shoal_protocol::Envelope,
    shoal_transport::{OutboundHandle, Result},
};

/// Envelopes held back while the handshake is outstanding, flushed in the
/// order they were queued.
#[derive(Debug, Default)]
pub struct PendingOutbox {
    queue: VecDeque<Envelope>,
}

impl PendingOutbox {
    pub fn push(&mut self, envelope: Envelope) {
        self.queue.push_back(envelope);
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// One logical connection and its authentication gate.
///
/// The session starts unauthenticated. [`open`](Self::open) sends the
/// deployment's identity handshake past the gate; everything else queues
/// until [`confirm`](Self::confirm). A `Closed` transport event shuts the
/// gate again, so a reconnect always re-runs the handshake.
pub struct ConnectionSession {
    identity: String,
    authenticated: bool,
    channels: Vec<String>,
    outbox: PendingOutbox,
    outbound: OutboundHandle,
}

impl ConnectionSession {
    pub fn new(identity: impl Into<String>, outbound: OutboundHandle) -> Self {
        Self {
            identity: identity.into(),
            authenticated: false,
            channels: Vec::new(),
            outbox: PendingOutbox::default(),
            outbound,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn outbound(&self) -> OutboundHandle {
        self.outbound.clone()
    }

    /// Run the handshake for a fresh link. The handshake envelope itself
    /// bypasses the gate; the gate stays shut for everything else until
    /// [`confirm`](Self::confirm).
    pub async fn open(&mut self, handshake: Envelope) -> Result<()> {
        self.authenticated = false;
        info!(identity = %self.identity, "connection open, sending handshake");
        self.outbound.send(&handshake).await
    }

    /// The far side confirmed the handshake. Flush everything queued while
    /// the gate was shut, preserving order. A send failure mid-flush is
    /// logged and the flush continues.
    pub async fn confirm(&mut self) {
        self.authenticated = true;
        let queued = self.outbox.drain();
        if !queued.is_empty() {
            debug!(identity = %self.identity, n = queued.len(), "flushing pending outbox");
        }
        for envelope in queued {
            if let Err(e) = self.outbound.send(&envelope).await {
                warn!(code = envelope.code, error = %e, "pending flush failed");
            }
        }
    }

    /// The link went down. Shuts the gate; the next `Connected` must
    /// re-handshake before anything channel-scoped goes out.
    pub fn close(&mut self) {
        self.authenticated = false;
        debug!(identity = %self.identity, "connection closed");
    }

    /// Send through the gate: out immediately when authenticated, queued
    /// otherwise. Nothing channel-scoped ever rides a stale link.
    pub async fn send(&mut self, envelope: Envelope) -> Result<()> {
        if self.authenticated {
            self.outbound.send(&envelope).await
        } else {
            debug!(code = envelope.code, "gate shut, queueing envelope");
            self.outbox.push(envelope);
            Ok(())
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn set_channels(&mut self, channels: Vec<String>) {
        self.channels = channels;
    }

    pub fn note_joined(&mut self, channel_id: &str) {
        if !self.channels.iter().any(|c| c == channel_id) {
            self.channels.push(channel_id.to_owned());
        }
    }

    pub fn note_left(&mut self, channel_id: &str) {
        self.channels.retain(|c| c != channel_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        shoal_protocol::{codes, decode, keys},
        shoal_transport::{TransportEvent, memory},
    };

    use {super::*, crate::account};

    async fn next_frame(events: &mut shoal_transport::EventReceiver) -> Envelope {
        loop {
            match events.recv().await {
                Some(TransportEvent::Frame(raw)) => return decode(&raw).unwrap(),
                Some(_) => continue,
                None => panic!("transport closed"),
            }
        }
    }

    #[tokio::test]
    async fn handshake_bypasses_gate_and_traffic_queues_until_confirm() {
        let (ours, mut theirs) = memory::pair();
        let mut session = ConnectionSession::new("bot-1", OutboundHandle::new(ours.transport));

        session
            .open(account::login("bot-1@example.com", "pw"))
            .await
            .unwrap();
        session
            .send(Envelope::new(codes::MESSAGE_TO_SERVICE).with(keys::MSG_BODY, "first"))
            .await
            .unwrap();
        session
            .send(Envelope::new(codes::MESSAGE_TO_SERVICE).with(keys::MSG_BODY, "second"))
            .await
            .unwrap();

        // Only the handshake made it onto the wire.
        let handshake = next_frame(&mut theirs.events).await;
        assert_eq!(handshake.code, codes::OPERATION_LOGIN);
        assert!(theirs.events.try_recv().is_err());
        assert!(!session.is_authenticated());

        session.confirm().await;
        let first = next_frame(&mut theirs.events).await;
        let second = next_frame(&mut theirs.events).await;
        assert_eq!(first.str_field(keys::MSG_BODY).unwrap(), "first");
        assert_eq!(second.str_field(keys::MSG_BODY).unwrap(), "second");
    }

    #[tokio::test]
    async fn closing_shuts_the_gate_again() {
        let (ours, mut theirs) = memory::pair();
        let mut session = ConnectionSession::new("svc", OutboundHandle::new(ours.transport));

        session
            .open(account::service_reconnect("svc", vec!["C1".into()]))
            .await
            .unwrap();
        session.confirm().await;
        assert!(session.is_authenticated());

        session.close();
        session
            .send(Envelope::new(codes::MESSAGE_TO_SERVICE))
            .await
            .unwrap();

        let handshake = next_frame(&mut theirs.events).await;
        assert_eq!(handshake.code, codes::OPERATION_SERVICE_RECONNECT);
        // The post-close envelope is queued, not sent.
        assert!(theirs.events.try_recv().is_err());
    }

    #[test]
    fn channel_bookkeeping_is_duplicate_free() {
        let (ours, _theirs) = memory::pair();
        let mut session = ConnectionSession::new("bot", OutboundHandle::new(ours.transport));
        session.note_joined("C1");
        session.note_joined("C1");
        session.note_joined("C2");
        session.note_left("C1");
        assert_eq!(session.channels(), ["C2"]);
    }
}
