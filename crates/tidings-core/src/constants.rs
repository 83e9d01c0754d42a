//! Protocol constants shared by the gateway and the delivery service.

// ── Request identifiers ─────────────────────────────────────────────

/// Fetch the newest sequence number (reserved).
pub const WS_GET_NEWEST_SEQ: i32 = 1001;
/// Pull messages by sequence list (reserved).
pub const WS_PULL_MSG_BY_SEQ_LIST: i32 = 1002;
/// Send a chat message.
pub const WS_SEND_MSG: i32 = 1003;
/// Client heartbeat.
pub const WS_HEARTBEAT: i32 = 1004;
/// Server push (reserved).
pub const WS_PUSH_MSG: i32 = 2001;
/// Kick another online device (reserved).
pub const WS_KICK_ONLINE_MSG: i32 = 2002;
/// Logout (reserved).
pub const WS_LOGOUT_MSG: i32 = 2003;
/// Data error notification (reserved).
pub const WS_DATA_ERROR: i32 = 3001;

// ── Response codes ──────────────────────────────────────────────────

/// Success.
pub const ERR_OK: i32 = 0;
/// Backend call failed after the connection was established.
pub const ERR_BACKEND_CALL: i32 = 200;
/// Backend unreachable, or the recipient mailbox publish failed.
pub const ERR_BACKEND_UNREACHABLE: i32 = 201;
/// Recipient mailbox committed, sender mailbox copy failed.
pub const ERR_PARTIAL_DELIVERY: i32 = 202;
/// Payload decode failure or unsupported session type.
pub const ERR_DECODE: i32 = 203;
/// Payload schema validation failure or unrecognised identifier in validation.
pub const ERR_VALIDATION: i32 = 204;
/// Request identifier has no registered handler.
pub const ERR_UNSUPPORTED_REQUEST: i32 = 205;

/// Whether a request identifier falls in the reserved server-push range.
pub fn is_reserved_identifier(identifier: i32) -> bool {
    matches!(
        identifier,
        WS_GET_NEWEST_SEQ
            | WS_PULL_MSG_BY_SEQ_LIST
            | WS_PUSH_MSG
            | WS_KICK_ONLINE_MSG
            | WS_LOGOUT_MSG
            | WS_DATA_ERROR
    )
}

// ── Session types ───────────────────────────────────────────────────

/// Conversation kind carried in `MsgData::session_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionType {
    /// One-to-one conversation.
    SingleChat,
    /// Group conversation.
    GroupChat,
    /// System notification.
    Notification,
}

impl SessionType {
    /// Wire tag for this session type.
    pub fn tag(self) -> i32 {
        match self {
            Self::SingleChat => 1,
            Self::GroupChat => 2,
            Self::Notification => 4,
        }
    }

    /// Map a wire tag back to a session type.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Self::SingleChat),
            2 => Some(Self::GroupChat),
            4 => Some(Self::Notification),
            _ => None,
        }
    }
}

// ── Content types ───────────────────────────────────────────────────

/// Plain text.
pub const CONTENT_TEXT: i32 = 101;
/// Picture.
pub const CONTENT_PICTURE: i32 = 102;
/// Voice clip.
pub const CONTENT_VOICE: i32 = 103;
/// Video.
pub const CONTENT_VIDEO: i32 = 104;
/// File attachment.
pub const CONTENT_FILE: i32 = 105;
/// Text mentioning users.
pub const CONTENT_AT_TEXT: i32 = 106;
/// Merged forward.
pub const CONTENT_MERGER: i32 = 107;
/// Contact card.
pub const CONTENT_CARD: i32 = 108;
/// Location.
pub const CONTENT_LOCATION: i32 = 109;
/// Application-defined payload.
pub const CONTENT_CUSTOM: i32 = 110;
/// Revoke a previous message.
pub const CONTENT_REVOKE: i32 = 111;
/// Read receipt.
pub const CONTENT_HAS_READ_RECEIPT: i32 = 112;
/// Typing indicator.
pub const CONTENT_TYPING: i32 = 113;
/// Quote reply.
pub const CONTENT_QUOTE: i32 = 114;
/// Common message.
pub const CONTENT_COMMON: i32 = 200;
/// Group message.
pub const CONTENT_GROUP_MSG: i32 = 201;

// ── Platforms ───────────────────────────────────────────────────────

/// Human-readable name of a platform id, for logs.
pub fn platform_name(platform_id: i32) -> &'static str {
    match platform_id {
        1 => "IOS",
        2 => "Android",
        3 => "Windows",
        4 => "OSX",
        5 => "Web",
        6 => "MiniWeb",
        7 => "Linux",
        8 => "APad",
        9 => "IPad",
        10 => "Admin",
        _ => "Unknown",
    }
}
