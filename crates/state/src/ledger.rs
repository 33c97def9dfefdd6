use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, StateError};

/// Recipient ledger: which users a delivered message was fanned out to.
///
/// A message is recorded under a locally minted provisional id the moment it
/// is sent downstream; the authoritative id only arrives later in a delivery
/// copy notice. The pending table bridges that gap and each entry in it is
/// consumed exactly once.
#[derive(Debug, Default)]
pub struct RecipientLedger {
    /// `(channel_id, message_id)` → recipients, confirmed ids only.
    confirmed: HashMap<(String, String), Vec<String>>,
    /// `(channel_id, provisional_id)` → recipients, awaiting confirmation.
    pending: HashMap<(String, String), Vec<String>>,
}

impl RecipientLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record recipients under a provisional id, before the copy notice.
    pub fn record_pending(
        &mut self,
        channel_id: &str,
        provisional_id: &str,
        recipients: Vec<String>,
    ) {
        debug!(channel_id, provisional_id, n = recipients.len(), "ledger: pending");
        self.pending
            .insert((channel_id.to_owned(), provisional_id.to_owned()), recipients);
    }

    /// Consume a pending entry, returning its recipients. Consuming an entry
    /// that does not exist is a [`StateError::StalePending`].
    pub fn take_pending(&mut self, channel_id: &str, provisional_id: &str) -> Result<Vec<String>> {
        self.pending
            .remove(&(channel_id.to_owned(), provisional_id.to_owned()))
            .ok_or_else(|| StateError::stale_pending(channel_id, provisional_id))
    }

    /// Move a pending entry under its authoritative message id. Returns the
    /// recipients so callers can mirror the confirmation into a persistent
    /// store.
    pub fn confirm(
        &mut self,
        channel_id: &str,
        provisional_id: &str,
        message_id: &str,
    ) -> Result<Vec<String>> {
        let recipients = self.take_pending(channel_id, provisional_id)?;
        debug!(channel_id, provisional_id, message_id, "ledger: confirmed");
        self.confirmed.insert(
            (channel_id.to_owned(), message_id.to_owned()),
            recipients.clone(),
        );
        Ok(recipients)
    }

    /// Insert directly under a confirmed id (authoritative writes from a
    /// store or a take-over reconstruction).
    pub fn insert(&mut self, channel_id: &str, message_id: &str, recipients: Vec<String>) {
        self.confirmed
            .insert((channel_id.to_owned(), message_id.to_owned()), recipients);
    }

    /// Confirmed recipients only. Ids still pending, or never seen, yield an
    /// empty list rather than an error.
    pub fn recipients(&self, channel_id: &str, message_id: &str) -> Vec<String> {
        self.confirmed
            .get(&(channel_id.to_owned(), message_id.to_owned()))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every entry (pending and confirmed) for a channel. Take-over
    /// starts the ledger fresh; release purges it.
    pub fn reset_channel(&mut self, channel_id: &str) {
        self.confirmed.retain(|(c, _), _| c != channel_id);
        self.pending.retain(|(c, _), _| c != channel_id);
        debug!(channel_id, "ledger: reset channel");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn pending_then_confirm_round_trip() {
        let mut ledger = RecipientLedger::new();
        ledger.record_pending("C1", "tmp-1", vec!["U1".into(), "U2".into()]);
        assert!(ledger.recipients("C1", "tmp-1").is_empty());

        let moved = ledger.confirm("C1", "tmp-1", "M9").unwrap();
        assert_eq!(moved, vec!["U1", "U2"]);
        assert_eq!(ledger.recipients("C1", "M9"), vec!["U1", "U2"]);
        // The provisional id is gone from both tables.
        assert!(ledger.recipients("C1", "tmp-1").is_empty());
        assert!(matches!(
            ledger.take_pending("C1", "tmp-1"),
            Err(StateError::StalePending { .. })
        ));
    }

    #[test]
    fn confirming_twice_is_stale() {
        let mut ledger = RecipientLedger::new();
        ledger.record_pending("C1", "tmp-1", vec!["U1".into()]);
        ledger.confirm("C1", "tmp-1", "M1").unwrap();
        assert!(ledger.confirm("C1", "tmp-1", "M1").is_err());
    }

    #[test]
    fn unknown_query_is_empty_not_error() {
        let ledger = RecipientLedger::new();
        assert!(ledger.recipients("C1", "never-sent").is_empty());
    }

    #[test]
    fn reset_channel_clears_both_tables() {
        let mut ledger = RecipientLedger::new();
        ledger.record_pending("C1", "tmp-1", vec!["U1".into()]);
        ledger.insert("C1", "M1", vec!["U1".into()]);
        ledger.insert("C2", "M2", vec!["U2".into()]);
        ledger.reset_channel("C1");
        assert!(ledger.recipients("C1", "M1").is_empty());
        assert!(ledger.take_pending("C1", "tmp-1").is_err());
        assert_eq!(ledger.recipients("C2", "M2"), vec!["U2"]);
    }
}
