//! Channel-state cache for the relay core.
//!
//! Holds the two pieces of state every deployment maintains: per-channel
//! membership and the recipient ledger ("who received this message"),
//! plus the persistence seam ([`store::ChannelStore`]) and the per-channel
//! exclusion scopes that serialize same-channel mutations.

pub mod error;
pub mod ledger;
pub mod locks;
pub mod membership;
pub mod store;

pub use {
    error::{Result, StateError},
    ledger::RecipientLedger,
    locks::ChannelLocks,
    membership::MembershipCache,
    store::{ChannelStore, MemoryStore},
};
