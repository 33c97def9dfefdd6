//! Code-band table.
//!
//! Range boundaries are data, not scattered comparisons: both the top-level
//! router and the command sub-dispatch resolve against [`BANDS`].

use std::ops::Range;

/// Traffic category selected by a code's numeric band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// [20000, 30000) — basic-command `type_code`s.
    BasicCommand,
    /// [30000, 40000) — inbound message family (client → service).
    MessageInbound,
    /// [40000, 50000) — command traffic (client ↔ service).
    Command,
    /// [50000, 60000) — final message delivery (service → client).
    MessageOutbound,
    /// [60000, 70000) — status traffic, client-local bookkeeping.
    Status,
    /// [80000, 90000) — notice `type_code`s.
    Notice,
    /// [90000, 100000) — feature `type_code`s.
    Feature,
}

/// Inclusive-exclusive band boundaries.
pub const BANDS: &[(Range<u32>, Band)] = &[
    (20_000..30_000, Band::BasicCommand),
    (30_000..40_000, Band::MessageInbound),
    (40_000..50_000, Band::Command),
    (50_000..60_000, Band::MessageOutbound),
    (60_000..70_000, Band::Status),
    (80_000..90_000, Band::Notice),
    (90_000..100_000, Band::Feature),
];

impl Band {
    /// Classify a code. Pure function of the code value; `None` means the
    /// code falls outside every agreed band.
    pub fn of_code(code: u32) -> Option<Band> {
        BANDS
            .iter()
            .find(|(range, _)| range.contains(&code))
            .map(|(_, band)| *band)
    }
}
