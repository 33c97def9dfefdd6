//! Connection lifecycle: the handshake gate and the account operations.
//!
//! A deployment owns one logical connection. Every `Connected` event, first
//! connect and reconnect alike, re-runs the identity handshake before any
//! channel-scoped traffic goes out; envelopes emitted while the gate is shut
//! wait in the pending outbox and flush in order once the far side confirms.

pub mod account;
pub mod session;

pub use session::{ConnectionSession, PendingOutbox};
