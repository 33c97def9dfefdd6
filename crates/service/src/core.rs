//! The default handler set and the state it maintains.

use std::{future::Future, sync::Arc};

use {
    tokio::sync::{Mutex, RwLock},
    tracing::{info, warn},
};

use {
    shoal_dispatch::{DispatchContext, Handler, HandlerRegistry, HandlerResult, handler},
    shoal_protocol::{Envelope, codes, keys},
    shoal_state::{ChannelStore, MembershipCache, RecipientLedger},
};

/// The two state tables a deployment maintains, mutated together under one
/// lock so a dispatch turn observes a consistent view.
#[derive(Debug, Default)]
pub struct ChannelState {
    pub membership: MembershipCache,
    pub ledger: RecipientLedger,
}

/// Shared behavior behind every default handler. Cheap to share; handlers
/// capture an `Arc` of it.
pub struct ServiceCore {
    state: Mutex<ChannelState>,
    registry: Arc<RwLock<HandlerRegistry>>,
    /// Optional persistent mirror. Mirror failures are logged; the in-process
    /// view stays authoritative for the lifetime of the connection.
    store: Option<Arc<dyn ChannelStore>>,
    origin: String,
}

fn bind<F, Fut>(core: &Arc<ServiceCore>, f: F) -> Handler
where
    F: Fn(Arc<ServiceCore>, DispatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let core = Arc::clone(core);
    handler(move |ctx| f(Arc::clone(&core), ctx))
}

impl ServiceCore {
    pub fn new(
        registry: Arc<RwLock<HandlerRegistry>>,
        store: Option<Arc<dyn ChannelStore>>,
        origin: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChannelState::default()),
            registry,
            store,
            origin: origin.into(),
        })
    }

    /// Install the default handlers: the three basic commands, the six
    /// notices, and the message relay for all three message kinds.
    pub async fn register_defaults(self: &Arc<Self>) {
        let mut registry = self.registry.write().await;

        registry.set_basic_command(
            codes::COMMAND_UP_FETCH_MEMBER_LIST,
            bind(self, |c, ctx| async move { c.on_fetch_member_list(ctx).await }),
        );
        registry.set_basic_command(
            codes::COMMAND_UP_FETCH_FEATURE_LIST,
            bind(self, |c, ctx| async move { c.on_fetch_feature_list(ctx).await }),
        );
        registry.set_basic_command(
            codes::COMMAND_UP_FETCH_RECIPIENT_LIST,
            bind(self, |c, ctx| async move { c.on_fetch_recipient_list(ctx).await }),
        );

        registry.set_notice(
            codes::NOTICE_USER_JOINED,
            bind(self, |c, ctx| async move { c.on_user_joined(ctx).await }),
        );
        registry.set_notice(
            codes::NOTICE_USER_LEFT,
            bind(self, |c, ctx| async move { c.on_user_left(ctx).await }),
        );
        registry.set_notice(
            codes::NOTICE_MEMBER_ROSTER,
            bind(self, |c, ctx| async move { c.on_member_roster(ctx).await }),
        );
        registry.set_notice(
            codes::NOTICE_TAKE_OVER,
            bind(self, |c, ctx| async move { c.on_take_over(ctx).await }),
        );
        registry.set_notice(
            codes::NOTICE_RELEASE,
            bind(self, |c, ctx| async move { c.on_release(ctx).await }),
        );
        registry.set_notice(
            codes::NOTICE_DELIVERY_COPY,
            bind(self, |c, ctx| async move { c.on_delivery_copy(ctx).await }),
        );

        for code in [
            codes::MESSAGE_UP_TEXT,
            codes::MESSAGE_UP_IMAGE,
            codes::MESSAGE_UP_FILE,
        ] {
            registry.set_message(
                code,
                bind(self, |c, ctx| async move { c.on_relay_message(ctx).await }),
            );
        }
    }

    pub fn registry(&self) -> Arc<RwLock<HandlerRegistry>> {
        Arc::clone(&self.registry)
    }

    pub async fn members(&self, channel_id: &str) -> Vec<String> {
        self.state.lock().await.membership.members(channel_id)
    }

    pub async fn channel_ids(&self) -> Vec<String> {
        self.state.lock().await.membership.channel_ids()
    }

    pub async fn recipients(&self, channel_id: &str, message_id: &str) -> Vec<String> {
        self.state.lock().await.ledger.recipients(channel_id, message_id)
    }

    // ── Basic commands ───────────────────────────────────────────────────────

    /// Fetch-member-list doubles as join-if-absent: a user asking for the
    /// roster of a channel it is not in is treated as joining it.
    async fn on_fetch_member_list(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let user_id = ctx.envelope.str_field(keys::USER_ID)?.to_owned();

        let members = {
            let mut state = self.state.lock().await;
            if !state.membership.contains(&channel_id, &user_id) {
                state.membership.join(&channel_id, &user_id);
                self.mirror_add_member(&channel_id, &user_id).await;
            }
            state.membership.members(&channel_id)
        };
        ctx.outbound
            .send(&roster_update(&channel_id, members, vec![user_id]))
            .await?;
        Ok(())
    }

    async fn on_fetch_feature_list(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let user_id = ctx.envelope.str_field(keys::USER_ID)?.to_owned();
        let reply = self.feature_update(&channel_id, vec![user_id]).await?;
        ctx.outbound.send(&reply).await?;
        Ok(())
    }

    async fn on_fetch_recipient_list(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let message_id = ctx.envelope.str_field(keys::MSG_ID)?.to_owned();
        let user_id = ctx.envelope.str_field(keys::USER_ID)?.to_owned();

        let recipients = self.recipients(&channel_id, &message_id).await;
        let reply = Envelope::new(codes::COMMAND_FROM_SERVICE)
            .with(keys::TYPE_CODE, codes::COMMAND_DOWN_UPDATE_RECIPIENT_LIST)
            .with(keys::CHANNEL_ID, channel_id)
            .with(keys::MSG_ID, message_id)
            .with(keys::RECIPIENTS, recipients)
            .with(keys::TO_USER_IDS, vec![user_id]);
        ctx.outbound.send(&reply).await?;
        Ok(())
    }

    // ── Notices ──────────────────────────────────────────────────────────────

    async fn on_user_joined(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let user_id = ctx.envelope.str_field(keys::USER_ID)?.to_owned();

        let members = {
            let mut state = self.state.lock().await;
            state.membership.join(&channel_id, &user_id);
            state.membership.members(&channel_id)
        };
        self.mirror_add_member(&channel_id, &user_id).await;
        info!(channel_id, user_id, "user joined");

        ctx.outbound
            .send(&roster_update(&channel_id, members.clone(), members))
            .await?;
        let features = self.feature_update(&channel_id, vec![user_id]).await?;
        ctx.outbound.send(&features).await?;
        Ok(())
    }

    async fn on_user_left(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let user_id = ctx.envelope.str_field(keys::USER_ID)?.to_owned();

        let members = {
            let mut state = self.state.lock().await;
            state.membership.leave(&channel_id, &user_id);
            state.membership.members(&channel_id)
        };
        self.mirror_remove_member(&channel_id, &user_id).await;
        info!(channel_id, user_id, "user left");

        ctx.outbound
            .send(&roster_update(&channel_id, members.clone(), members))
            .await?;
        Ok(())
    }

    /// An authoritative roster supersedes the cached one, never merges.
    async fn on_member_roster(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let users = ctx.envelope.str_list_field(keys::USER_IDS)?;

        self.state
            .lock()
            .await
            .membership
            .replace(&channel_id, users.clone());
        self.mirror_set_members(&channel_id, users).await;
        Ok(())
    }

    /// Take over a channel: adopt the handed-over roster wholesale and start
    /// the recipient ledger fresh, then re-announce roster and features.
    async fn on_take_over(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let users = ctx.envelope.str_list_field(keys::USER_IDS)?;

        let members = {
            let mut state = self.state.lock().await;
            state.membership.replace(&channel_id, users.clone());
            state.ledger.reset_channel(&channel_id);
            state.membership.members(&channel_id)
        };
        self.mirror_set_members(&channel_id, users).await;
        self.mirror_reset_recipients(&channel_id).await;
        info!(channel_id, members = members.len(), "took over channel");

        ctx.outbound
            .send(&roster_update(&channel_id, members.clone(), members.clone()))
            .await?;
        let features = self.feature_update(&channel_id, members).await?;
        ctx.outbound.send(&features).await?;
        Ok(())
    }

    /// Release a channel: purge it from both tables.
    async fn on_release(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();

        {
            let mut state = self.state.lock().await;
            state.membership.drop_channel(&channel_id);
            state.ledger.reset_channel(&channel_id);
        }
        self.mirror_drop_channel(&channel_id).await;
        self.mirror_reset_recipients(&channel_id).await;
        info!(channel_id, "released channel");
        Ok(())
    }

    /// The upstream copy notice carries the authoritative message id for a
    /// provisional one; move the pending recipient record under it.
    async fn on_delivery_copy(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let provisional_id = ctx.envelope.str_field(keys::PROVISIONAL_ID)?.to_owned();
        let message_id = ctx.envelope.str_field(keys::MSG_ID)?.to_owned();

        let recipients = self
            .state
            .lock()
            .await
            .ledger
            .confirm(&channel_id, &provisional_id, &message_id)?;
        self.mirror_add_recipients(&channel_id, &message_id, recipients)
            .await;
        Ok(())
    }

    // ── Message relay ────────────────────────────────────────────────────────

    /// The dispatch engine already re-tagged the envelope into the outbound
    /// band and stamped `origin`; fan it out to everyone in the channel but
    /// the sender, recording the pending recipient set first.
    async fn on_relay_message(&self, ctx: DispatchContext) -> HandlerResult {
        let channel_id = ctx.envelope.channel_id()?.to_owned();
        let sender = ctx.envelope.str_field(keys::FROM_USER_ID)?.to_owned();
        let provisional_id = ctx.envelope.str_field(keys::PROVISIONAL_ID)?.to_owned();

        let recipients: Vec<String> = {
            let mut state = self.state.lock().await;
            let recipients: Vec<String> = state
                .membership
                .members(&channel_id)
                .into_iter()
                .filter(|m| *m != sender)
                .collect();
            state
                .ledger
                .record_pending(&channel_id, &provisional_id, recipients.clone());
            recipients
        };

        let delivery = ctx
            .envelope
            .clone()
            .with(keys::N_RECIPIENTS, recipients.len() as u64)
            .with(keys::TO_USER_IDS, recipients);
        ctx.outbound.send(&delivery).await?;
        Ok(())
    }

    // ── Outbound builders ────────────────────────────────────────────────────

    async fn feature_update(
        &self,
        channel_id: &str,
        to_user_ids: Vec<String>,
    ) -> anyhow::Result<Envelope> {
        let specs = self.registry.read().await.feature_specs().to_vec();
        Ok(Envelope::new(codes::COMMAND_FROM_SERVICE)
            .with(keys::TYPE_CODE, codes::COMMAND_DOWN_UPDATE_FEATURE_LIST)
            .with(keys::CHANNEL_ID, channel_id)
            .with(keys::FEATURES, serde_json::to_value(&specs)?)
            .with(keys::TO_USER_IDS, to_user_ids))
    }

    // ── Store mirroring ──────────────────────────────────────────────────────

    async fn mirror_add_member(&self, channel_id: &str, user_id: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.add_member(channel_id, user_id).await
        {
            warn!(channel_id, user_id, error = %e, "store mirror failed");
        }
    }

    async fn mirror_remove_member(&self, channel_id: &str, user_id: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.remove_member(channel_id, user_id).await
        {
            warn!(channel_id, user_id, error = %e, "store mirror failed");
        }
    }

    async fn mirror_set_members(&self, channel_id: &str, users: Vec<String>) {
        if let Some(store) = &self.store
            && let Err(e) = store.set_members(channel_id, users).await
        {
            warn!(channel_id, error = %e, "store mirror failed");
        }
    }

    async fn mirror_drop_channel(&self, channel_id: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.drop_channel(channel_id).await
        {
            warn!(channel_id, error = %e, "store mirror failed");
        }
    }

    async fn mirror_add_recipients(
        &self,
        channel_id: &str,
        message_id: &str,
        recipients: Vec<String>,
    ) {
        if let Some(store) = &self.store
            && let Err(e) = store.add_recipients(channel_id, message_id, recipients).await
        {
            warn!(channel_id, message_id, error = %e, "store mirror failed");
        }
    }

    async fn mirror_reset_recipients(&self, channel_id: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.reset_recipients(channel_id).await
        {
            warn!(channel_id, error = %e, "store mirror failed");
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Roster-update command addressed to `to_user_ids`.
fn roster_update(channel_id: &str, members: Vec<String>, to_user_ids: Vec<String>) -> Envelope {
    Envelope::new(codes::COMMAND_FROM_SERVICE)
        .with(keys::TYPE_CODE, codes::COMMAND_DOWN_UPDATE_MEMBER_LIST)
        .with(keys::CHANNEL_ID, channel_id)
        .with(keys::USER_IDS, members)
        .with(keys::TO_USER_IDS, to_user_ids)
}
