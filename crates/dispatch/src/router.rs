use shoal_protocol::{Band, Envelope};

use crate::error::{DispatchError, Result};

/// Which of the three second-level tables a command envelope resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTable {
    BasicCommand,
    Notice,
    Feature,
}

impl SubTable {
    pub fn name(self) -> &'static str {
        match self {
            SubTable::BasicCommand => "basic-command",
            SubTable::Notice => "notice",
            SubTable::Feature => "feature",
        }
    }
}

/// Top-level routing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Command traffic; sub-table and `type_code` already resolved.
    Command(SubTable, u32),
    /// Inbound relay message, keyed by its (pre-offset) `type_code`.
    MessageInbound(u32),
    /// Final message delivery (service → client).
    Delivery,
    /// Client-local status bookkeeping.
    Status,
}

/// Classify an envelope. Pure function of `code` and, for the command band,
/// of `extra.type_code` — no hidden state.
pub fn route(envelope: &Envelope) -> Result<Route> {
    match Band::of_code(envelope.code) {
        Some(Band::Command) => {
            let type_code = envelope.type_code()?;
            let table = match Band::of_code(type_code) {
                Some(Band::BasicCommand) => SubTable::BasicCommand,
                Some(Band::Notice) => SubTable::Notice,
                Some(Band::Feature) => SubTable::Feature,
                _ => return Err(DispatchError::UnclassifiedCommand { type_code }),
            };
            Ok(Route::Command(table, type_code))
        },
        Some(Band::MessageInbound) => Ok(Route::MessageInbound(envelope.type_code()?)),
        Some(Band::MessageOutbound) => Ok(Route::Delivery),
        Some(Band::Status) => Ok(Route::Status),
        _ => Err(DispatchError::UnroutableCode {
            code: envelope.code,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use shoal_protocol::{codes, keys};

    use super::*;

    fn command(type_code: u32) -> Envelope {
        Envelope::new(codes::COMMAND_TO_SERVICE).with(keys::TYPE_CODE, type_code)
    }

    #[test]
    fn command_band_resolves_sub_tables() {
        assert_eq!(
            route(&command(codes::COMMAND_UP_FETCH_MEMBER_LIST)).unwrap(),
            Route::Command(SubTable::BasicCommand, codes::COMMAND_UP_FETCH_MEMBER_LIST)
        );
        assert_eq!(
            route(&command(codes::NOTICE_USER_JOINED)).unwrap(),
            Route::Command(SubTable::Notice, codes::NOTICE_USER_JOINED)
        );
        assert_eq!(
            route(&command(90_001)).unwrap(),
            Route::Command(SubTable::Feature, 90_001)
        );
    }

    #[test]
    fn command_type_code_outside_windows_is_unclassified() {
        assert!(matches!(
            route(&command(55_555)),
            Err(DispatchError::UnclassifiedCommand { type_code: 55_555 })
        ));
    }

    #[test]
    fn command_without_type_code_is_a_protocol_error() {
        let env = Envelope::new(codes::COMMAND_TO_SERVICE);
        assert!(matches!(route(&env), Err(DispatchError::Protocol(_))));
    }

    #[test]
    fn message_status_and_delivery_bands() {
        let msg = Envelope::new(codes::MESSAGE_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::MESSAGE_UP_TEXT);
        assert_eq!(
            route(&msg).unwrap(),
            Route::MessageInbound(codes::MESSAGE_UP_TEXT)
        );
        assert_eq!(
            route(&Envelope::new(codes::MESSAGE_FROM_SERVICE)).unwrap(),
            Route::Delivery
        );
        assert_eq!(
            route(&Envelope::new(codes::STATUS_JOIN_SUCCESS)).unwrap(),
            Route::Status
        );
    }

    #[test]
    fn codes_outside_all_bands_are_unroutable() {
        assert!(matches!(
            route(&Envelope::new(12_345)),
            Err(DispatchError::UnroutableCode { code: 12_345 })
        ));
        assert!(matches!(
            route(&Envelope::new(75_000)),
            Err(DispatchError::UnroutableCode { .. })
        ));
    }
}
