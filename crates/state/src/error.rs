/// Crate-wide result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Typed state errors.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A pending recipient entry was confirmed twice, or never recorded.
    /// A logic error on the protocol level; reported, never a panic.
    #[error("no pending delivery for channel {channel_id} provisional id {provisional_id}")]
    StalePending {
        channel_id: String,
        provisional_id: String,
    },
}

impl StateError {
    #[must_use]
    pub fn stale_pending(
        channel_id: impl Into<String>,
        provisional_id: impl Into<String>,
    ) -> Self {
        Self::StalePending {
            channel_id: channel_id.into(),
            provisional_id: provisional_id.into(),
        }
    }
}
