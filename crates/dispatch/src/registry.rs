use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use {serde::Serialize, shoal_protocol::Envelope, shoal_transport::OutboundHandle};

use crate::router::SubTable;

/// Context passed to every handler.
pub struct DispatchContext {
    pub envelope: Envelope,
    pub outbound: OutboundHandle,
}

/// What a handler produces. Handler failures are logged by the engine and do
/// not stop the dispatch loop.
pub type HandlerResult = anyhow::Result<()>;

/// A shared async handler.
pub type Handler = Arc<
    dyn Fn(DispatchContext) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync,
>;

/// Wrap an async fn (or closure) into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(DispatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// An application-defined feature advertised to channel users.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSpec {
    pub name: String,
    pub code: u32,
    pub prompts: Vec<String>,
}

/// The four second-level dispatch tables plus the two single-band slots the
/// client side uses. Mutable for the lifetime of the owning deployment; no
/// persistence.
#[derive(Default)]
pub struct HandlerRegistry {
    basic_commands: HashMap<u32, Handler>,
    notices: HashMap<u32, Handler>,
    features: HashMap<u32, Handler>,
    messages: HashMap<u32, Handler>,
    feature_specs: Vec<FeatureSpec>,
    delivery: Option<Handler>,
    status: Option<Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_basic_command(&mut self, type_code: u32, h: Handler) {
        self.basic_commands.insert(type_code, h);
    }

    pub fn set_notice(&mut self, type_code: u32, h: Handler) {
        self.notices.insert(type_code, h);
    }

    pub fn set_feature(&mut self, type_code: u32, h: Handler) {
        self.features.insert(type_code, h);
    }

    pub fn set_message(&mut self, type_code: u32, h: Handler) {
        self.messages.insert(type_code, h);
    }

    /// Handler for final message deliveries (the 5xxxx band).
    pub fn set_delivery(&mut self, h: Handler) {
        self.delivery = Some(h);
    }

    /// Handler for status envelopes (the 6xxxx band).
    pub fn set_status(&mut self, h: Handler) {
        self.status = Some(h);
    }

    /// Register a feature: advertised spec plus, optionally, its handler.
    /// A feature registered without a handler falls under the deployment's
    /// unhandled policy when triggered.
    pub fn add_feature(&mut self, spec: FeatureSpec, h: Option<Handler>) {
        if let Some(h) = h {
            self.features.insert(spec.code, h);
        }
        self.feature_specs.retain(|f| f.code != spec.code);
        self.feature_specs.push(spec);
    }

    pub fn remove_feature(&mut self, code: u32) {
        self.features.remove(&code);
        self.feature_specs.retain(|f| f.code != code);
    }

    pub fn feature_specs(&self) -> &[FeatureSpec] {
        &self.feature_specs
    }

    pub fn command(&self, table: SubTable, type_code: u32) -> Option<Handler> {
        let map = match table {
            SubTable::BasicCommand => &self.basic_commands,
            SubTable::Notice => &self.notices,
            SubTable::Feature => &self.features,
        };
        map.get(&type_code).cloned()
    }

    pub fn message(&self, type_code: u32) -> Option<Handler> {
        self.messages.get(&type_code).cloned()
    }

    pub fn delivery(&self) -> Option<Handler> {
        self.delivery.clone()
    }

    pub fn status(&self) -> Option<Handler> {
        self.status.clone()
    }
}
