//! Envelope dispatch engine.
//!
//! One dispatch engine serves both deployments: the code-range router
//! classifies an envelope by its numeric band, the handler registry resolves
//! the second-level `type_code`, and the engine invokes the handler under
//! the owning channel's exclusion scope. Client and service are two
//! compositions of this engine, not subclasses of anything.

pub mod engine;
pub mod error;
pub mod registry;
pub mod router;

pub use {
    engine::{DispatchOptions, Dispatcher, Scheduling, UnhandledPolicy},
    error::DispatchError,
    registry::{DispatchContext, FeatureSpec, Handler, HandlerRegistry, HandlerResult, handler},
    router::{Route, SubTable, route},
};
