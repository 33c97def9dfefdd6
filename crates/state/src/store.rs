use {anyhow::Result, async_trait::async_trait, tokio::sync::Mutex};

use crate::{ledger::RecipientLedger, membership::MembershipCache};

/// Persistent storage seam for channel state.
///
/// The relay core promises nothing stronger than read-then-write under the
/// per-channel exclusion scope; implementations may be backed by anything
/// that satisfies that.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn members(&self, channel_id: &str) -> Result<Vec<String>>;
    async fn set_members(&self, channel_id: &str, users: Vec<String>) -> Result<()>;
    async fn add_member(&self, channel_id: &str, user_id: &str) -> Result<()>;
    async fn remove_member(&self, channel_id: &str, user_id: &str) -> Result<()>;
    /// Forget a channel entirely (release-with-purge).
    async fn drop_channel(&self, channel_id: &str) -> Result<()>;

    async fn recipients(&self, channel_id: &str, message_id: &str) -> Result<Vec<String>>;
    async fn add_recipients(
        &self,
        channel_id: &str,
        message_id: &str,
        recipients: Vec<String>,
    ) -> Result<()>;
    /// Clear all recipient records for a channel (take-over reset).
    async fn reset_recipients(&self, channel_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    membership: MembershipCache,
    ledger: RecipientLedger,
}

/// In-process reference store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn members(&self, channel_id: &str) -> Result<Vec<String>> {
        Ok(self.inner.lock().await.membership.members(channel_id))
    }

    async fn set_members(&self, channel_id: &str, users: Vec<String>) -> Result<()> {
        self.inner.lock().await.membership.replace(channel_id, users);
        Ok(())
    }

    async fn add_member(&self, channel_id: &str, user_id: &str) -> Result<()> {
        self.inner.lock().await.membership.join(channel_id, user_id);
        Ok(())
    }

    async fn remove_member(&self, channel_id: &str, user_id: &str) -> Result<()> {
        self.inner.lock().await.membership.leave(channel_id, user_id);
        Ok(())
    }

    async fn drop_channel(&self, channel_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.membership.drop_channel(channel_id);
        inner.ledger.reset_channel(channel_id);
        Ok(())
    }

    async fn recipients(&self, channel_id: &str, message_id: &str) -> Result<Vec<String>> {
        Ok(self.inner.lock().await.ledger.recipients(channel_id, message_id))
    }

    async fn add_recipients(
        &self,
        channel_id: &str,
        message_id: &str,
        recipients: Vec<String>,
    ) -> Result<()> {
        self.inner
            .lock()
            .await
            .ledger
            .insert(channel_id, message_id, recipients);
        Ok(())
    }

    async fn reset_recipients(&self, channel_id: &str) -> Result<()> {
        self.inner.lock().await.ledger.reset_channel(channel_id);
        Ok(())
    }
}
