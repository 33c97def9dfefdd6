use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    tokio::sync::{Mutex, RwLock, mpsc},
    tracing::{debug, info, warn},
};

use {
    shoal_config::DeploymentConfig,
    shoal_dispatch::{
        DispatchContext, DispatchOptions, Dispatcher, HandlerRegistry, HandlerResult, Scheduling,
        UnhandledPolicy, handler,
    },
    shoal_protocol::{Envelope, codes, keys},
    shoal_session::{ConnectionSession, account},
    shoal_state::MembershipCache,
    shoal_transport::{EventReceiver, OutboundHandle, TransportEvent},
};

use crate::message::ChatMessage;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_id: String,
    pub password: String,
    /// Stamped into outgoing messages as `origin`.
    pub origin: String,
    pub policy: UnhandledPolicy,
    pub scheduling: Scheduling,
}

impl ClientConfig {
    /// Client-side defaults: envelopes nothing claims are logged and dropped.
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            origin: user_id.clone(),
            user_id,
            password: password.into(),
            policy: UnhandledPolicy::LogAndDrop,
            scheduling: Scheduling::Serial,
        }
    }

    pub fn from_deployment(config: &DeploymentConfig) -> Self {
        Self {
            user_id: config.identity.user_id.clone(),
            password: config.identity.password.clone(),
            origin: config.identity.origin().to_owned(),
            policy: config.policy.into(),
            scheduling: config.scheduling.into(),
        }
    }
}

struct ClientCore {
    config: ClientConfig,
    /// Channels this user is in, per the server's status traffic.
    channels: Mutex<Vec<String>>,
    /// Per-channel rosters, refreshed via fetch-member-list commands.
    rosters: Mutex<MembershipCache>,
    session: Mutex<ConnectionSession>,
    inbox: mpsc::UnboundedSender<ChatMessage>,
    seq: AtomicU64,
}

/// The relay client. Clones share all state.
#[derive(Clone)]
pub struct RelayClient {
    core: Arc<ClientCore>,
    dispatcher: Dispatcher,
}

impl RelayClient {
    /// Build a client plus the stream of pre-analyzed message deliveries.
    pub async fn new(
        outbound: OutboundHandle,
        config: ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (inbox, deliveries) = mpsc::unbounded_channel();
        let registry = Arc::new(RwLock::new(HandlerRegistry::new()));
        let core = Arc::new(ClientCore {
            channels: Mutex::new(Vec::new()),
            rosters: Mutex::new(MembershipCache::new()),
            session: Mutex::new(ConnectionSession::new(
                config.user_id.clone(),
                outbound.clone(),
            )),
            inbox,
            seq: AtomicU64::new(0),
            config: config.clone(),
        });
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            outbound,
            DispatchOptions {
                policy: config.policy,
                scheduling: config.scheduling,
                origin: config.origin,
            },
        );

        let client = Self { core, dispatcher };
        client.register_handlers(&registry).await;
        (client, deliveries)
    }

    async fn register_handlers(&self, registry: &Arc<RwLock<HandlerRegistry>>) {
        let mut registry = registry.write().await;

        let core = Arc::clone(&self.core);
        registry.set_status(handler(move |ctx| {
            let core = Arc::clone(&core);
            async move { core.on_status(ctx).await }
        }));

        let core = Arc::clone(&self.core);
        registry.set_delivery(handler(move |ctx| {
            let core = Arc::clone(&core);
            async move { core.on_delivery(ctx).await }
        }));

        let core = Arc::clone(&self.core);
        registry.set_basic_command(
            codes::COMMAND_DOWN_UPDATE_MEMBER_LIST,
            handler(move |ctx| {
                let core = Arc::clone(&core);
                async move { core.on_roster_update(ctx).await }
            }),
        );
        registry.set_basic_command(
            codes::COMMAND_DOWN_UPDATE_FEATURE_LIST,
            handler(|ctx| async move {
                debug!(
                    features = %ctx.envelope.field(keys::FEATURES).cloned().unwrap_or_default(),
                    "feature list updated"
                );
                Ok(())
            }),
        );
        registry.set_basic_command(
            codes::COMMAND_DOWN_DISPLAY_TEXT,
            handler(|ctx| async move {
                info!(
                    channel_id = ctx.envelope.channel_id()?,
                    body = ctx.envelope.str_field(keys::MSG_BODY)?,
                    "display"
                );
                Ok(())
            }),
        );
        registry.set_basic_command(
            codes::COMMAND_DOWN_DISPLAY_IMAGE,
            handler(|ctx| async move {
                info!(
                    channel_id = ctx.envelope.channel_id()?,
                    uri = ctx.envelope.str_field(keys::URI)?,
                    "display image"
                );
                Ok(())
            }),
        );
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub async fn channels(&self) -> Vec<String> {
        self.core.channels.lock().await.clone()
    }

    pub async fn roster(&self, channel_id: &str) -> Vec<String> {
        self.core.rosters.lock().await.members(channel_id)
    }

    // ── Send path ────────────────────────────────────────────────────────────

    pub async fn send_text(&self, channel_id: &str, body: &str) -> anyhow::Result<String> {
        self.send_message(codes::MESSAGE_UP_TEXT, channel_id, keys::MSG_BODY, body)
            .await
    }

    pub async fn send_image(&self, channel_id: &str, uri: &str) -> anyhow::Result<String> {
        self.send_message(codes::MESSAGE_UP_IMAGE, channel_id, keys::URI, uri)
            .await
    }

    pub async fn send_file(&self, channel_id: &str, uri: &str) -> anyhow::Result<String> {
        self.send_message(codes::MESSAGE_UP_FILE, channel_id, keys::URI, uri)
            .await
    }

    /// Emit one message envelope under a freshly minted provisional id and
    /// return that id; the service's copy notice later ties it to the
    /// authoritative one.
    async fn send_message(
        &self,
        type_code: u32,
        channel_id: &str,
        body_key: &'static str,
        body: &str,
    ) -> anyhow::Result<String> {
        let provisional_id = self.core.mint_provisional_id();
        let envelope = Envelope::new(codes::MESSAGE_TO_SERVICE)
            .with(keys::TYPE_CODE, type_code)
            .with(keys::CHANNEL_ID, channel_id)
            .with(keys::FROM_USER_ID, self.core.config.user_id.as_str())
            .with(keys::PROVISIONAL_ID, provisional_id.as_str())
            .with(keys::ORIGIN, self.core.config.origin.as_str())
            .with(body_key, body);
        self.core.session.lock().await.send(envelope).await?;
        Ok(provisional_id)
    }

    // ── Account operations ───────────────────────────────────────────────────

    pub async fn join_channel(&self, channel_id: &str) -> anyhow::Result<()> {
        self.send_op(account::join_channel(&self.core.config.user_id, channel_id))
            .await
    }

    pub async fn leave_channel(&self, channel_id: &str) -> anyhow::Result<()> {
        self.send_op(account::leave_channel(&self.core.config.user_id, channel_id))
            .await
    }

    pub async fn create_channel(&self, channel_id: &str) -> anyhow::Result<()> {
        self.send_op(account::create_channel(&self.core.config.user_id, channel_id))
            .await
    }

    pub async fn fetch_offline_messages(&self) -> anyhow::Result<()> {
        self.send_op(account::fetch_offline_messages(&self.core.config.user_id))
            .await
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        self.send_op(account::logout(&self.core.config.user_id)).await
    }

    async fn send_op(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.core.session.lock().await.send(envelope).await?;
        Ok(())
    }

    // ── Run loop ─────────────────────────────────────────────────────────────

    /// Drive the client from a transport event stream. Every `Connected`
    /// re-runs the login handshake; the gate opens when the server answers
    /// with the user's channel list.
    pub async fn run(&self, mut events: EventReceiver) -> anyhow::Result<()> {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected => {
                    let handshake = account::login(
                        &self.core.config.user_id,
                        &self.core.config.password,
                    );
                    if let Err(e) = self.core.session.lock().await.open(handshake).await {
                        warn!(error = %e, "login handshake failed");
                    }
                },
                TransportEvent::Frame(raw) => self.dispatcher.handle_frame(&raw).await?,
                TransportEvent::Closed => self.core.session.lock().await.close(),
            }
        }
        Ok(())
    }
}

impl ClientCore {
    fn mint_provisional_id(&self) -> String {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("temp_{millis}_{n}")
    }

    // ── Status bookkeeping ───────────────────────────────────────────────────

    async fn on_status(&self, ctx: DispatchContext) -> HandlerResult {
        match ctx.envelope.code {
            codes::STATUS_USER_CHANNEL_LIST => {
                let channels = ctx.envelope.str_list_field(keys::CHANNEL_IDS)?;
                info!(n = channels.len(), "channel list received");
                *self.channels.lock().await = channels.clone();
                // The channel list doubles as the login acknowledgement.
                self.session.lock().await.confirm().await;
                for channel_id in channels {
                    self.fetch_roster(&ctx, &channel_id).await?;
                }
            },
            codes::STATUS_JOIN_SUCCESS | codes::STATUS_CREATE_CHANNEL_SUCCESS => {
                let channel_id = ctx.envelope.channel_id()?.to_owned();
                let mut channels = self.channels.lock().await;
                if !channels.iter().any(|c| c == &channel_id) {
                    channels.push(channel_id.clone());
                }
                drop(channels);
                self.fetch_roster(&ctx, &channel_id).await?;
            },
            codes::STATUS_LEAVE_SUCCESS => {
                let channel_id = ctx.envelope.channel_id()?.to_owned();
                self.channels.lock().await.retain(|c| c != &channel_id);
                self.rosters.lock().await.drop_channel(&channel_id);
            },
            code => debug!(code, "unhandled status"),
        }
        Ok(())
    }

    async fn fetch_roster(&self, ctx: &DispatchContext, channel_id: &str) -> HandlerResult {
        let fetch = Envelope::new(codes::COMMAND_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::COMMAND_UP_FETCH_MEMBER_LIST)
            .with(keys::CHANNEL_ID, channel_id)
            .with(keys::USER_ID, self.config.user_id.as_str());
        ctx.outbound.send(&fetch).await?;
        Ok(())
    }

    async fn on_roster_update(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let users = ctx.envelope.str_list_field(keys::USER_IDS)?;
        self.rosters.lock().await.replace(&channel_id, users);
        Ok(())
    }

    async fn on_delivery(&self, ctx: DispatchContext) -> HandlerResult {
        let message = ChatMessage::from_delivery(&ctx.envelope)?;
        if self.inbox.send(message).is_err() {
            warn!("delivery receiver dropped, discarding message");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        shoal_protocol::decode,
        shoal_transport::memory,
    };

    use {super::*, crate::message::MessageKind};

    async fn setup() -> (
        RelayClient,
        mpsc::UnboundedReceiver<ChatMessage>,
        memory::MemoryEndpoint,
    ) {
        let (ours, theirs) = memory::pair();
        let (client, deliveries) = RelayClient::new(
            OutboundHandle::new(ours.transport),
            ClientConfig::new("bot-1", "pw"),
        )
        .await;
        (client, deliveries, theirs)
    }

    async fn next_envelope(events: &mut EventReceiver) -> Envelope {
        loop {
            match events.recv().await {
                Some(TransportEvent::Frame(raw)) => return decode(&raw).unwrap(),
                Some(_) => continue,
                None => panic!("transport closed"),
            }
        }
    }

    fn channel_list(channels: Vec<String>) -> Envelope {
        Envelope::new(codes::STATUS_USER_CHANNEL_LIST).with(keys::CHANNEL_IDS, channels)
    }

    #[tokio::test]
    async fn channel_list_status_confirms_login_and_fetches_rosters() {
        let (client, _deliveries, mut server) = setup().await;

        client
            .dispatcher()
            .dispatch(channel_list(vec!["C1".into(), "C2".into()]))
            .await
            .unwrap();

        assert_eq!(client.channels().await, ["C1", "C2"]);
        for expected in ["C1", "C2"] {
            let fetch = next_envelope(&mut server.events).await;
            assert_eq!(fetch.code, codes::COMMAND_TO_SERVICE);
            assert_eq!(
                fetch.type_code().unwrap(),
                codes::COMMAND_UP_FETCH_MEMBER_LIST
            );
            assert_eq!(fetch.channel_id().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn join_success_appends_and_leave_success_removes() {
        let (client, _deliveries, mut server) = setup().await;
        let dispatcher = client.dispatcher();

        dispatcher.dispatch(channel_list(vec![])).await.unwrap();
        dispatcher
            .dispatch(Envelope::new(codes::STATUS_JOIN_SUCCESS).with(keys::CHANNEL_ID, "C1"))
            .await
            .unwrap();
        assert_eq!(client.channels().await, ["C1"]);
        // The join triggers a roster fetch; answer it.
        next_envelope(&mut server.events).await;
        dispatcher
            .dispatch(
                Envelope::new(codes::COMMAND_FROM_SERVICE)
                    .with(keys::TYPE_CODE, codes::COMMAND_DOWN_UPDATE_MEMBER_LIST)
                    .with(keys::CHANNEL_ID, "C1")
                    .with(keys::USER_IDS, vec!["U1".to_owned(), "bot-1".to_owned()]),
            )
            .await
            .unwrap();
        assert_eq!(client.roster("C1").await, ["U1", "bot-1"]);

        dispatcher
            .dispatch(Envelope::new(codes::STATUS_LEAVE_SUCCESS).with(keys::CHANNEL_ID, "C1"))
            .await
            .unwrap();
        assert!(client.channels().await.is_empty());
        assert!(client.roster("C1").await.is_empty());
    }

    #[tokio::test]
    async fn deliveries_surface_as_chat_messages() {
        let (client, mut deliveries, _server) = setup().await;

        let delivery = Envelope::new(codes::MESSAGE_FROM_SERVICE)
            .with(keys::TYPE_CODE, codes::MESSAGE_DOWN_TEXT)
            .with(keys::MSG_ID, "M1")
            .with(keys::CHANNEL_ID, "C1")
            .with(keys::FROM_USER_ID, "U2")
            .with(keys::MSG_BODY, "hi bot")
            .with(keys::ORIGIN, "ControlService")
            .with(keys::N_RECIPIENTS, 2);
        client.dispatcher().dispatch(delivery).await.unwrap();

        let message = deliveries.recv().await.unwrap();
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.body, "hi bot");
        assert_eq!(message.sender, "U2");
    }

    #[tokio::test]
    async fn send_text_waits_for_login_and_mints_unique_provisional_ids() {
        let (client, _deliveries, mut server) = setup().await;

        // Gate shut: the message queues.
        let first = client.send_text("C1", "one").await.unwrap();
        client.dispatcher().dispatch(channel_list(vec![])).await.unwrap();
        let second = client.send_text("C1", "two").await.unwrap();
        assert_ne!(first, second);

        let one = next_envelope(&mut server.events).await;
        assert_eq!(one.code, codes::MESSAGE_TO_SERVICE);
        assert_eq!(one.type_code().unwrap(), codes::MESSAGE_UP_TEXT);
        assert_eq!(one.str_field(keys::MSG_BODY).unwrap(), "one");
        assert_eq!(one.str_field(keys::PROVISIONAL_ID).unwrap(), first);
        assert_eq!(one.str_field(keys::FROM_USER_ID).unwrap(), "bot-1");

        let two = next_envelope(&mut server.events).await;
        assert_eq!(two.str_field(keys::MSG_BODY).unwrap(), "two");
    }

    #[tokio::test]
    async fn unclaimed_envelopes_are_dropped_quietly() {
        let (client, _deliveries, _server) = setup().await;
        // No feature handlers are registered client-side.
        let feature = Envelope::new(codes::COMMAND_TO_SERVICE).with(keys::TYPE_CODE, 99_999);
        client.dispatcher().dispatch(feature).await.unwrap();
        // Unroutable top-level code, same story.
        client
            .dispatcher()
            .dispatch(Envelope::new(12_345))
            .await
            .unwrap();
    }
}
