//! Service-side deployment: the channel control service.
//!
//! Owns the authoritative in-process view of channel membership and the
//! recipient ledger, registers the default handler set for the upstream
//! relay's commands and notices, relays messages downstream, and exposes the
//! broadcast/reply helpers application features build on.

pub mod broadcast;
pub mod core;
pub mod service;

pub use {
    core::{ChannelState, ServiceCore},
    service::{ControlService, ServiceConfig},
};
