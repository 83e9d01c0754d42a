//! Chat service method names.

/// Commit one chat message to the recipient mailboxes.
pub const SEND_MESSAGE: &str = "chat.sendMessage";
/// Query a mailbox's sequence range.
pub const GET_MAX_AND_MIN_SEQ: &str = "chat.getMaxAndMinSeq";

/// HTTP path the delivery service serves RPC on.
pub const RPC_PATH: &str = "/rpc";
