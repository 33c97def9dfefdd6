//! Named protocol codes.
//!
//! Top-level codes select the traffic category an envelope belongs to;
//! `type_code` constants are the secondary classifiers carried in `extra`.
//! Band boundaries live in [`crate::band`] — keep new constants inside the
//! band their name implies.

// ── Account / session operations (client → server) ──────────────────────────

pub const OPERATION_REGISTER: u32 = 10_001;
pub const OPERATION_LOGIN: u32 = 10_002;
pub const OPERATION_LOGOUT: u32 = 10_003;
pub const OPERATION_RESET_PASSWORD: u32 = 10_004;
pub const OPERATION_JOIN_CHANNEL: u32 = 10_005;
pub const OPERATION_LEAVE_CHANNEL: u32 = 10_006;
pub const OPERATION_CREATE_CHANNEL: u32 = 10_007;
pub const OPERATION_FETCH_OFFLINE_MESSAGES: u32 = 10_008;
pub const OPERATION_FETCH_USER_CHANNEL_LIST: u32 = 10_009;

/// Service-side re-authentication issued on every (re)connect.
pub const OPERATION_SERVICE_RECONNECT: u32 = 10_011;
pub const OPERATION_SERVICE_LOGIN: u32 = 10_012;
pub const OPERATION_CONFIRM_AUTH_TOKEN: u32 = 10_013;

// ── Top-level traffic codes ──────────────────────────────────────────────────

/// Inbound "message to relay" family (client → service).
pub const MESSAGE_TO_SERVICE: u32 = 30_000;
/// Command traffic addressed to the control service.
pub const COMMAND_TO_SERVICE: u32 = 40_000;
/// Command traffic emitted by the control service.
pub const COMMAND_FROM_SERVICE: u32 = 40_001;
/// Final message delivery (service → client).
pub const MESSAGE_FROM_SERVICE: u32 = 50_000;

// ── Basic command type_codes [20000, 30000) ──────────────────────────────────

pub const COMMAND_UP_FETCH_MEMBER_LIST: u32 = 20_001;
pub const COMMAND_UP_FETCH_FEATURE_LIST: u32 = 20_002;
pub const COMMAND_UP_FETCH_RECIPIENT_LIST: u32 = 20_003;

pub const COMMAND_DOWN_UPDATE_MEMBER_LIST: u32 = 20_101;
pub const COMMAND_DOWN_UPDATE_FEATURE_LIST: u32 = 20_102;
pub const COMMAND_DOWN_UPDATE_RECIPIENT_LIST: u32 = 20_103;
pub const COMMAND_DOWN_DISPLAY_TEXT: u32 = 20_104;
pub const COMMAND_DOWN_DISPLAY_IMAGE: u32 = 20_105;

// ── Message type_codes [30000, 40000) up, [50000, 60000) down ────────────────

pub const MESSAGE_UP_TEXT: u32 = 30_001;
pub const MESSAGE_UP_IMAGE: u32 = 30_002;
pub const MESSAGE_UP_FILE: u32 = 30_003;

// Down codes are the up codes shifted by `MESSAGE_DOWN_OFFSET`.
pub const MESSAGE_DOWN_TEXT: u32 = 50_001;
pub const MESSAGE_DOWN_IMAGE: u32 = 50_002;
pub const MESSAGE_DOWN_FILE: u32 = 50_003;

// ── Status codes [60000, 70000), client-local bookkeeping ────────────────────

pub const STATUS_USER_CHANNEL_LIST: u32 = 60_001;
pub const STATUS_JOIN_SUCCESS: u32 = 60_002;
pub const STATUS_CREATE_CHANNEL_SUCCESS: u32 = 60_003;
pub const STATUS_LEAVE_SUCCESS: u32 = 60_004;

// ── Notice type_codes [80000, 90000) ─────────────────────────────────────────

pub const NOTICE_USER_JOINED: u32 = 80_101;
pub const NOTICE_USER_LEFT: u32 = 80_102;
pub const NOTICE_MEMBER_ROSTER: u32 = 80_103;
pub const NOTICE_TAKE_OVER: u32 = 80_104;
pub const NOTICE_RELEASE: u32 = 80_105;
pub const NOTICE_DELIVERY_COPY: u32 = 80_106;
pub const NOTICE_ASK_AUTH_TOKEN: u32 = 80_107;

// Feature type_codes occupy [90000, 100000) and are application-defined;
// deployments register them at runtime, so none are named here.
