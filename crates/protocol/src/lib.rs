//! Relay wire protocol definitions.
//!
//! Every frame on the wire is one [`Envelope`]: a numeric `code` selecting
//! the top-level traffic category plus an open `extra` payload. Channel-scoped
//! envelopes additionally carry a secondary `type_code` inside `extra` that
//! drives second-level dispatch (see [`band`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod band;
pub mod codes;
pub mod keys;

pub use band::{BANDS, Band};

/// Offset applied when an inbound message (3xxxx `type_code`) is relayed
/// back out as a delivery (5xxxx).
pub const MESSAGE_DOWN_OFFSET: u32 = 20_000;

/// Crate-wide result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Inbound frame is not an envelope. Logged and dropped by the dispatch
    /// loop, never fatal.
    #[error("malformed envelope: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },

    /// Envelope serialization failed on the send path.
    #[error("failed to encode envelope: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },

    /// A payload field required by the envelope's code is absent.
    #[error("envelope {code}: missing field `{field}`")]
    MissingField { code: u32, field: &'static str },

    /// A payload field exists but has the wrong shape.
    #[error("envelope {code}: field `{field}` is not a {expected}")]
    InvalidField {
        code: u32,
        field: &'static str,
        expected: &'static str,
    },
}

// ── Envelope ─────────────────────────────────────────────────────────────────

/// One wire-level unit of the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u32,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            extra: Map::new(),
        }
    }

    /// Attach a payload field. Builder-style, used when assembling outbound
    /// envelopes.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// The secondary classifier nested in `extra`, required for every
    /// envelope that reaches second-level dispatch.
    pub fn type_code(&self) -> Result<u32> {
        self.u32_field(keys::TYPE_CODE)
    }

    pub fn channel_id(&self) -> Result<&str> {
        self.str_field(keys::CHANNEL_ID)
    }

    pub fn u32_field(&self, field: &'static str) -> Result<u32> {
        self.extra
            .get(field)
            .ok_or(ProtocolError::MissingField {
                code: self.code,
                field,
            })?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(ProtocolError::InvalidField {
                code: self.code,
                field,
                expected: "u32",
            })
    }

    pub fn str_field(&self, field: &'static str) -> Result<&str> {
        self.extra
            .get(field)
            .ok_or(ProtocolError::MissingField {
                code: self.code,
                field,
            })?
            .as_str()
            .ok_or(ProtocolError::InvalidField {
                code: self.code,
                field,
                expected: "string",
            })
    }

    /// A list-of-user-ids style field (`user_ids`, `to_user_ids`, ...).
    pub fn str_list_field(&self, field: &'static str) -> Result<Vec<String>> {
        let raw = self.extra.get(field).ok_or(ProtocolError::MissingField {
            code: self.code,
            field,
        })?;
        let arr = raw.as_array().ok_or(ProtocolError::InvalidField {
            code: self.code,
            field,
            expected: "array of strings",
        })?;
        arr.iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_owned)
                    .ok_or(ProtocolError::InvalidField {
                        code: self.code,
                        field,
                        expected: "array of strings",
                    })
            })
            .collect()
    }
}

// ── Codec ────────────────────────────────────────────────────────────────────

/// Decode a raw transport frame into an envelope.
pub fn decode(raw: &str) -> Result<Envelope> {
    serde_json::from_str(raw).map_err(|source| ProtocolError::Decode { source })
}

/// Encode an envelope for the transport. Key order is unspecified; only
/// round-trip fidelity is guaranteed.
pub fn encode(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope).map_err(|source| ProtocolError::Encode { source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields() {
        let env = Envelope::new(codes::COMMAND_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::NOTICE_USER_JOINED)
            .with(keys::CHANNEL_ID, "C1")
            .with(keys::USER_ID, "U1");
        let raw = encode(&env).unwrap();
        let back = decode(&raw).unwrap();
        assert_eq!(back, env);
        assert_eq!(back.type_code().unwrap(), codes::NOTICE_USER_JOINED);
        assert_eq!(back.channel_id().unwrap(), "C1");
    }

    #[test]
    fn decode_rejects_non_envelope() {
        assert!(matches!(
            decode("not json"),
            Err(ProtocolError::Decode { .. })
        ));
        assert!(matches!(
            decode(r#"{"no_code": 1}"#),
            Err(ProtocolError::Decode { .. })
        ));
    }

    #[test]
    fn missing_extra_defaults_to_empty() {
        let env = decode(r#"{"code": 60001}"#).unwrap();
        assert!(env.extra.is_empty());
    }

    #[test]
    fn typed_accessors_report_shape_errors() {
        let env = Envelope::new(codes::COMMAND_TO_SERVICE).with(keys::TYPE_CODE, "oops");
        assert!(matches!(
            env.type_code(),
            Err(ProtocolError::InvalidField { field: "type_code", .. })
        ));
        assert!(matches!(
            env.channel_id(),
            Err(ProtocolError::MissingField { field: "channel_id", .. })
        ));
    }

    #[test]
    fn str_list_field_rejects_mixed_arrays() {
        let env = Envelope::new(codes::COMMAND_FROM_SERVICE)
            .with(keys::TO_USER_IDS, serde_json::json!(["U1", 2]));
        assert!(env.str_list_field(keys::TO_USER_IDS).is_err());
    }
}
