//! Client-side deployment: a relay client for end users and bots.
//!
//! Keeps the user's channel list and per-channel rosters current from status
//! and command traffic, pre-analyzes message deliveries into [`ChatMessage`]s
//! for the application, and mints provisional ids on the send path. Envelopes
//! nothing claims are logged and dropped.

pub mod client;
pub mod message;

pub use {
    client::{ClientConfig, RelayClient},
    message::{ChatMessage, MessageKind},
};
