use std::collections::HashMap;

use tracing::debug;

/// Per-channel membership lists.
///
/// Members are kept in join order with duplicates forbidden. A channel comes
/// into existence on first join or bulk replace and disappears only on an
/// explicit [`MembershipCache::drop_channel`] (the release transition).
#[derive(Debug, Default)]
pub struct MembershipCache {
    channels: HashMap<String, Vec<String>>,
}

impl MembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert: joining twice leaves a single membership record.
    pub fn join(&mut self, channel_id: &str, user_id: &str) {
        let members = self.channels.entry(channel_id.to_owned()).or_default();
        if !members.iter().any(|m| m == user_id) {
            members.push(user_id.to_owned());
            debug!(channel_id, user_id, "membership: join");
        }
    }

    /// Idempotent remove: leaving a channel you are not in is a no-op.
    pub fn leave(&mut self, channel_id: &str, user_id: &str) {
        if let Some(members) = self.channels.get_mut(channel_id) {
            members.retain(|m| m != user_id);
            debug!(channel_id, user_id, "membership: leave");
        }
    }

    /// Atomic bulk overwrite, used for take-over and authoritative rosters.
    /// The new roster supersedes whatever was cached; duplicates in the input
    /// are collapsed.
    pub fn replace(&mut self, channel_id: &str, users: Vec<String>) {
        let mut deduped: Vec<String> = Vec::with_capacity(users.len());
        for user in users {
            if !deduped.contains(&user) {
                deduped.push(user);
            }
        }
        debug!(channel_id, members = deduped.len(), "membership: replace");
        self.channels.insert(channel_id.to_owned(), deduped);
    }

    /// Current roster. Unknown channels yield an empty list, never an error.
    pub fn members(&self, channel_id: &str) -> Vec<String> {
        self.channels.get(channel_id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, channel_id: &str, user_id: &str) -> bool {
        self.channels
            .get(channel_id)
            .is_some_and(|m| m.iter().any(|u| u == user_id))
    }

    /// Every channel with a cached roster, in no particular order.
    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Forget a channel entirely (release-with-purge).
    pub fn drop_channel(&mut self, channel_id: &str) {
        self.channels.remove(channel_id);
        debug!(channel_id, "membership: drop channel");
    }
}
