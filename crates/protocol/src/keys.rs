//! Payload field names carried in `extra`.

pub const TYPE_CODE: &str = "type_code";
pub const CHANNEL_ID: &str = "channel_id";
pub const USER_ID: &str = "user_id";
pub const USER_IDS: &str = "user_ids";
pub const TO_USER_IDS: &str = "to_user_ids";
pub const FROM_USER_ID: &str = "from_user_id";
pub const MSG_ID: &str = "msg_id";
pub const MSG_BODY: &str = "msg_body";
pub const N_RECIPIENTS: &str = "n_recipients";
pub const ORIGIN: &str = "origin";
pub const PROVISIONAL_ID: &str = "provisional_id";
pub const RECIPIENTS: &str = "recipients";
pub const FEATURES: &str = "features";
pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";
pub const TOKEN: &str = "token";
pub const URI: &str = "uri";
pub const CHANNEL_IDS: &str = "channel_ids";
pub const TARGET_CHANNEL_ID: &str = "target_channel_id";
