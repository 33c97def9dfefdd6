use std::sync::Arc;

use {
    tokio::sync::RwLock,
    tracing::{info, warn},
};

use {
    shoal_config::DeploymentConfig,
    shoal_dispatch::{
        DispatchOptions, Dispatcher, FeatureSpec, Handler, HandlerRegistry, Scheduling,
        UnhandledPolicy,
    },
    shoal_session::{ConnectionSession, account},
    shoal_state::ChannelStore,
    shoal_transport::{EventReceiver, OutboundHandle, TransportEvent},
};

use crate::{broadcast, core::ServiceCore};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_id: String,
    pub origin: String,
    pub policy: UnhandledPolicy,
    pub scheduling: Scheduling,
}

impl ServiceConfig {
    /// Service-side defaults: every envelope must find a handler.
    pub fn new(service_id: impl Into<String>) -> Self {
        let service_id = service_id.into();
        Self {
            origin: service_id.clone(),
            service_id,
            policy: UnhandledPolicy::Fatal,
            scheduling: Scheduling::Serial,
        }
    }

    pub fn from_deployment(config: &DeploymentConfig) -> Self {
        Self {
            service_id: config.identity.user_id.clone(),
            origin: config.identity.origin().to_owned(),
            policy: config.policy.into(),
            scheduling: config.scheduling.into(),
        }
    }
}

/// The channel control service: default handlers plus the feature surface,
/// driven by one transport event stream.
pub struct ControlService {
    core: Arc<ServiceCore>,
    dispatcher: Dispatcher,
    session: ConnectionSession,
    config: ServiceConfig,
}

impl ControlService {
    pub async fn new(outbound: OutboundHandle, config: ServiceConfig) -> Self {
        Self::with_store(outbound, config, None).await
    }

    /// Build with a persistent store the in-process state is mirrored into.
    pub async fn with_store(
        outbound: OutboundHandle,
        config: ServiceConfig,
        store: Option<Arc<dyn ChannelStore>>,
    ) -> Self {
        let registry = Arc::new(RwLock::new(HandlerRegistry::new()));
        let core = ServiceCore::new(Arc::clone(&registry), store, config.origin.clone());
        core.register_defaults().await;

        let dispatcher = Dispatcher::new(
            registry,
            outbound.clone(),
            DispatchOptions {
                policy: config.policy,
                scheduling: config.scheduling,
                origin: config.origin.clone(),
            },
        );
        let session = ConnectionSession::new(config.service_id.clone(), outbound);
        Self {
            core,
            dispatcher,
            session,
            config,
        }
    }

    pub fn core(&self) -> Arc<ServiceCore> {
        Arc::clone(&self.core)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    // ── Feature surface ──────────────────────────────────────────────────────

    /// Register an application feature. Registering the same feature code
    /// again replaces the previous registration.
    pub async fn add_feature(&self, spec: FeatureSpec, handler: Option<Handler>) {
        info!(name = %spec.name, code = spec.code, "registering feature");
        self.core.registry().write().await.add_feature(spec, handler);
    }

    pub async fn remove_feature(&self, code: u32) {
        self.core.registry().write().await.remove_feature(code);
    }

    // ── Display helpers ──────────────────────────────────────────────────────

    pub async fn broadcast_text(&self, channel_id: &str, text: &str) -> anyhow::Result<()> {
        let members = self.core.members(channel_id).await;
        broadcast::broadcast_text(&self.dispatcher.outbound(), channel_id, members, text).await?;
        Ok(())
    }

    pub async fn broadcast_image(&self, channel_id: &str, uri: &str) -> anyhow::Result<()> {
        let members = self.core.members(channel_id).await;
        broadcast::broadcast_image(&self.dispatcher.outbound(), channel_id, members, uri).await?;
        Ok(())
    }

    pub async fn reply_text(
        &self,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        broadcast::reply_text(&self.dispatcher.outbound(), channel_id, user_id, text).await?;
        Ok(())
    }

    pub async fn reply_image(
        &self,
        channel_id: &str,
        user_id: &str,
        uri: &str,
    ) -> anyhow::Result<()> {
        broadcast::reply_image(&self.dispatcher.outbound(), channel_id, user_id, uri).await?;
        Ok(())
    }

    /// One text for the acting user, a different one for the rest.
    pub async fn split_text(
        &self,
        channel_id: &str,
        user_id: &str,
        user_text: &str,
        others_text: &str,
    ) -> anyhow::Result<()> {
        let members = self.core.members(channel_id).await;
        broadcast::split_text(
            &self.dispatcher.outbound(),
            channel_id,
            user_id,
            members,
            user_text,
            others_text,
        )
        .await?;
        Ok(())
    }

    // ── Run loop ─────────────────────────────────────────────────────────────

    /// Drive the service from a transport event stream. Every `Connected`
    /// re-advertises identity and served channels before normal dispatch
    /// resumes. Returns when the stream ends, or with the first error the
    /// unhandled policy promotes to fatal.
    pub async fn run(&mut self, mut events: EventReceiver) -> anyhow::Result<()> {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected => {
                    let channels = self.core.channel_ids().await;
                    let handshake =
                        account::service_reconnect(&self.config.service_id, channels);
                    if let Err(e) = self.session.open(handshake).await {
                        warn!(error = %e, "reconnect handshake failed");
                        continue;
                    }
                    // The relay does not acknowledge service handshakes;
                    // the gate opens as soon as the advertisement is out.
                    self.session.confirm().await;
                },
                TransportEvent::Frame(raw) => self.dispatcher.handle_frame(&raw).await?,
                TransportEvent::Closed => self.session.close(),
            }
        }
        info!(service_id = %self.config.service_id, "event stream ended");
        Ok(())
    }
}
