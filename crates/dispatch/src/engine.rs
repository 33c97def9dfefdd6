use std::sync::Arc;

use {
    tokio::sync::{OwnedMutexGuard, RwLock},
    tracing::{debug, error, warn},
};

use {
    shoal_protocol::{Envelope, MESSAGE_DOWN_OFFSET, codes, decode, keys},
    shoal_state::ChannelLocks,
    shoal_transport::OutboundHandle,
};

use crate::{
    error::{DispatchError, Result},
    registry::{DispatchContext, HandlerRegistry},
    router::{Route, route},
};

/// What to do when an envelope cannot be matched to a handler: an unroutable
/// top-level code, an unclassified command `type_code`, or a missing table
/// entry. One policy per deployment, applied uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhandledPolicy {
    /// Surface the condition as an error; the run loop stops. The default
    /// for service deployments that require exhaustive coverage.
    Fatal,
    /// Log the envelope and drop it. The default for client deployments.
    LogAndDrop,
}

/// How envelopes are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Each envelope is processed to completion before the next.
    Serial,
    /// One cooperative task per envelope; same-channel state mutations stay
    /// serialized through the per-channel locks.
    TaskPerEnvelope,
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub policy: UnhandledPolicy,
    pub scheduling: Scheduling,
    /// Stamped into the `origin` field of relayed messages.
    pub origin: String,
}

struct DispatcherInner {
    registry: Arc<RwLock<HandlerRegistry>>,
    outbound: OutboundHandle,
    locks: ChannelLocks,
    opts: DispatchOptions,
}

/// The dispatch engine. Cheap to clone; clones share the registry, the
/// outbound handle, and the channel locks.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RwLock<HandlerRegistry>>,
        outbound: OutboundHandle,
        opts: DispatchOptions,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                outbound,
                locks: ChannelLocks::new(),
                opts,
            }),
        }
    }

    pub fn registry(&self) -> Arc<RwLock<HandlerRegistry>> {
        Arc::clone(&self.inner.registry)
    }

    pub fn outbound(&self) -> OutboundHandle {
        self.inner.outbound.clone()
    }

    /// Decode and dispatch one raw transport frame. A malformed frame is
    /// logged and dropped; it never takes the loop down.
    pub async fn handle_frame(&self, raw: &str) -> Result<()> {
        let envelope = match decode(raw) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound frame");
                return Ok(());
            },
        };
        self.dispatch(envelope).await
    }

    /// Dispatch one envelope according to the configured scheduling mode.
    ///
    /// The channel scope is entered here, before any handoff: two envelopes
    /// for the same channel are processed in arrival order in both
    /// scheduling modes, spawned tasks included.
    pub async fn dispatch(&self, envelope: Envelope) -> Result<()> {
        let lock_key = envelope
            .field(keys::CHANNEL_ID)
            .or_else(|| envelope.field(keys::TARGET_CHANNEL_ID))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let guard = match &lock_key {
            Some(channel_id) => Some(self.inner.locks.acquire(channel_id).await),
            None => None,
        };

        match self.inner.opts.scheduling {
            Scheduling::Serial => {
                let result = self.process(envelope).await;
                self.leave_scope(lock_key, guard).await;
                result
            },
            Scheduling::TaskPerEnvelope => {
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.process(envelope).await {
                        // Fatal-class conditions cannot unwind through a
                        // spawned task; they are surfaced at error level.
                        error!(error = %e, "envelope processing failed");
                    }
                    this.leave_scope(lock_key, guard).await;
                });
                Ok(())
            },
        }
    }

    /// Drop the channel guard and reclaim the lock entry when nothing else
    /// is holding or waiting on it.
    async fn leave_scope(&self, lock_key: Option<String>, guard: Option<OwnedMutexGuard<()>>) {
        drop(guard);
        if let Some(channel_id) = lock_key {
            self.inner.locks.remove(&channel_id).await;
        }
    }

    async fn process(&self, envelope: Envelope) -> Result<()> {
        let outcome = match route(&envelope) {
            Ok(r) => r,
            Err(e) => return self.apply_policy(e),
        };

        match outcome {
            Route::Command(table, type_code) => {
                let handler = self.inner.registry.read().await.command(table, type_code);
                match handler {
                    Some(h) => {
                        debug!(table = table.name(), type_code, "dispatching command");
                        self.invoke(h, envelope).await
                    },
                    None => self.apply_policy(DispatchError::UnregisteredHandler {
                        table: table.name(),
                        type_code,
                    }),
                }
            },
            Route::MessageInbound(type_code) => {
                let delivery = self.retag(envelope);
                let handler = self.inner.registry.read().await.message(type_code);
                match handler {
                    Some(h) => {
                        debug!(type_code, "dispatching message");
                        self.invoke(h, delivery).await
                    },
                    // No registered handler: relay the re-tagged delivery
                    // downstream as-is.
                    None => {
                        debug!(type_code, "relaying message without handler");
                        let _ = self.inner.outbound.send(&delivery).await;
                        Ok(())
                    },
                }
            },
            Route::Delivery => {
                let handler = self.inner.registry.read().await.delivery();
                match handler {
                    Some(h) => self.invoke(h, envelope).await,
                    None => self.apply_policy(DispatchError::UnregisteredHandler {
                        table: "delivery",
                        type_code: envelope.code,
                    }),
                }
            },
            Route::Status => {
                let handler = self.inner.registry.read().await.status();
                match handler {
                    Some(h) => self.invoke(h, envelope).await,
                    None => self.apply_policy(DispatchError::UnregisteredHandler {
                        table: "status",
                        type_code: envelope.code,
                    }),
                }
            },
        }
    }

    /// Re-tag an inbound message as a delivery: offset the `type_code` into
    /// the outbound band and stamp this deployment as `origin`.
    fn retag(&self, envelope: Envelope) -> Envelope {
        let mut delivery = envelope;
        delivery.code = codes::MESSAGE_FROM_SERVICE;
        if let Some(tc) = delivery.field(keys::TYPE_CODE).and_then(|v| v.as_u64()) {
            delivery.extra.insert(
                keys::TYPE_CODE.to_owned(),
                (tc + u64::from(MESSAGE_DOWN_OFFSET)).into(),
            );
        }
        delivery.extra.insert(
            keys::ORIGIN.to_owned(),
            self.inner.opts.origin.clone().into(),
        );
        delivery
    }

    async fn invoke(&self, handler: crate::registry::Handler, envelope: Envelope) -> Result<()> {
        let code = envelope.code;
        let ctx = DispatchContext {
            envelope,
            outbound: self.inner.outbound.clone(),
        };
        if let Err(e) = handler(ctx).await {
            // A failing handler does not stop the dispatch loop.
            warn!(code, error = %e, "handler failed");
        }
        Ok(())
    }

    fn apply_policy(&self, err: DispatchError) -> Result<()> {
        match self.inner.opts.policy {
            UnhandledPolicy::Fatal => Err(err),
            UnhandledPolicy::LogAndDrop => {
                warn!(error = %err, "dropping unhandled envelope");
                Ok(())
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use {
        shoal_transport::{TransportEvent, memory},
        tokio::sync::RwLock,
    };

    use {super::*, crate::registry::handler};

    fn dispatcher(
        policy: UnhandledPolicy,
        registry: HandlerRegistry,
    ) -> (Dispatcher, shoal_transport::EventReceiver) {
        let (ours, theirs) = memory::pair();
        let dispatcher = Dispatcher::new(
            Arc::new(RwLock::new(registry)),
            OutboundHandle::new(ours.transport),
            DispatchOptions {
                policy,
                scheduling: Scheduling::Serial,
                origin: "TestService".into(),
            },
        );
        (dispatcher, theirs.events)
    }

    async fn next_envelope(events: &mut shoal_transport::EventReceiver) -> Envelope {
        loop {
            match events.recv().await {
                Some(TransportEvent::Frame(raw)) => return decode(&raw).unwrap(),
                Some(_) => continue,
                None => panic!("transport closed"),
            }
        }
    }

    #[tokio::test]
    async fn feature_type_code_reaches_only_the_feature_handler() {
        let feature_hits = Arc::new(AtomicU32::new(0));
        let other_hits = Arc::new(AtomicU32::new(0));

        let mut registry = HandlerRegistry::new();
        let hits = Arc::clone(&feature_hits);
        registry.set_feature(
            99_001,
            handler(move |_ctx| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        for code in [99_001, 20_001] {
            let hits = Arc::clone(&other_hits);
            let h = handler(move |_ctx| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
            // Same type_code keyed into the wrong tables must never fire.
            registry.set_notice(code, h.clone());
            registry.set_basic_command(code, h);
        }

        let (dispatcher, _events) = dispatcher(UnhandledPolicy::Fatal, registry);
        let env = Envelope::new(codes::COMMAND_TO_SERVICE).with(keys::TYPE_CODE, 99_001);
        dispatcher.dispatch(env).await.unwrap();

        assert_eq!(feature_hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_feature_follows_declared_policy() {
        let (fatal, _events) = dispatcher(UnhandledPolicy::Fatal, HandlerRegistry::new());
        let env = Envelope::new(codes::COMMAND_TO_SERVICE).with(keys::TYPE_CODE, 99_999);
        assert!(matches!(
            fatal.dispatch(env.clone()).await,
            Err(DispatchError::UnregisteredHandler {
                table: "feature",
                type_code: 99_999,
            })
        ));

        let (lenient, _events) = dispatcher(UnhandledPolicy::LogAndDrop, HandlerRegistry::new());
        lenient.dispatch(env).await.unwrap();
    }

    #[tokio::test]
    async fn unroutable_code_is_fatal_by_default() {
        let (dispatcher, _events) = dispatcher(UnhandledPolicy::Fatal, HandlerRegistry::new());
        assert!(matches!(
            dispatcher.dispatch(Envelope::new(11_111)).await,
            Err(DispatchError::UnroutableCode { code: 11_111 })
        ));
    }

    #[tokio::test]
    async fn message_without_handler_is_relayed_retagged() {
        let (dispatcher, mut events) = dispatcher(UnhandledPolicy::Fatal, HandlerRegistry::new());
        let env = Envelope::new(codes::MESSAGE_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::MESSAGE_UP_TEXT)
            .with(keys::CHANNEL_ID, "C1")
            .with(keys::MSG_BODY, "hi");
        dispatcher.dispatch(env).await.unwrap();

        let out = next_envelope(&mut events).await;
        assert_eq!(out.code, codes::MESSAGE_FROM_SERVICE);
        assert_eq!(out.type_code().unwrap(), codes::MESSAGE_DOWN_TEXT);
        assert_eq!(out.str_field(keys::ORIGIN).unwrap(), "TestService");
        assert_eq!(out.str_field(keys::MSG_BODY).unwrap(), "hi");
    }

    #[tokio::test]
    async fn registered_message_handler_sees_the_retagged_delivery() {
        let seen = Arc::new(AtomicU32::new(0));
        let mut registry = HandlerRegistry::new();
        let seen_in = Arc::clone(&seen);
        registry.set_message(
            codes::MESSAGE_UP_TEXT,
            handler(move |ctx| {
                let seen = Arc::clone(&seen_in);
                async move {
                    assert_eq!(ctx.envelope.code, codes::MESSAGE_FROM_SERVICE);
                    assert_eq!(ctx.envelope.type_code()?, codes::MESSAGE_DOWN_TEXT);
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let (dispatcher, _events) = dispatcher(UnhandledPolicy::Fatal, registry);
        let env = Envelope::new(codes::MESSAGE_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::MESSAGE_UP_TEXT)
            .with(keys::CHANNEL_ID, "C1");
        dispatcher.dispatch(env).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn task_per_envelope_runs_the_handler_off_the_dispatch_path() {
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.set_notice(
            codes::NOTICE_USER_JOINED,
            handler(move |ctx| {
                let done = done_tx.clone();
                async move {
                    let _ = done.send(ctx.envelope.channel_id()?.to_owned());
                    Ok(())
                }
            }),
        );

        let (ours, _theirs) = memory::pair();
        let dispatcher = Dispatcher::new(
            Arc::new(RwLock::new(registry)),
            OutboundHandle::new(ours.transport),
            DispatchOptions {
                policy: UnhandledPolicy::Fatal,
                scheduling: Scheduling::TaskPerEnvelope,
                origin: "TestService".into(),
            },
        );
        let env = Envelope::new(codes::COMMAND_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::NOTICE_USER_JOINED)
            .with(keys::CHANNEL_ID, "C1");
        dispatcher.dispatch(env).await.unwrap();
        assert_eq!(done_rx.recv().await.unwrap(), "C1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn task_per_envelope_keeps_same_channel_arrival_order() {
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.set_notice(
            codes::NOTICE_USER_JOINED,
            handler(move |ctx| {
                let seen = seen_tx.clone();
                async move {
                    let seq = ctx.envelope.u32_field("seq")?;
                    // Earlier envelopes dawdle so an unserialized later task
                    // would overtake them.
                    tokio::time::sleep(std::time::Duration::from_millis(
                        u64::from(8 - seq % 8),
                    ))
                    .await;
                    let _ = seen.send(seq);
                    Ok(())
                }
            }),
        );

        let (ours, _theirs) = memory::pair();
        let dispatcher = Dispatcher::new(
            Arc::new(RwLock::new(registry)),
            OutboundHandle::new(ours.transport),
            DispatchOptions {
                policy: UnhandledPolicy::Fatal,
                scheduling: Scheduling::TaskPerEnvelope,
                origin: "TestService".into(),
            },
        );

        for seq in 0..16u32 {
            let env = Envelope::new(codes::COMMAND_TO_SERVICE)
                .with(keys::TYPE_CODE, codes::NOTICE_USER_JOINED)
                .with(keys::CHANNEL_ID, "C1")
                .with("seq", seq);
            dispatcher.dispatch(env).await.unwrap();
        }

        for expected in 0..16u32 {
            assert_eq!(seen_rx.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped_not_fatal() {
        let (dispatcher, _events) = dispatcher(UnhandledPolicy::Fatal, HandlerRegistry::new());
        dispatcher.handle_frame("{ not an envelope").await.unwrap();
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_dispatch() {
        let mut registry = HandlerRegistry::new();
        registry.set_notice(
            codes::NOTICE_USER_JOINED,
            handler(|_ctx| async { anyhow::bail!("boom") }),
        );
        let (dispatcher, _events) = dispatcher(UnhandledPolicy::Fatal, registry);
        let env = Envelope::new(codes::COMMAND_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::NOTICE_USER_JOINED)
            .with(keys::CHANNEL_ID, "C1");
        dispatcher.dispatch(env).await.unwrap();
    }
}
