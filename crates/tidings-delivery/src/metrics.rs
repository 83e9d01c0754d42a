//! Delivery metric names.

/// `chat.sendMessage` calls accepted (counter, labels: `session_type`).
pub const DELIVERY_REQUESTS_TOTAL: &str = "delivery_requests_total";
/// Mailbox copies published (counter).
pub const DELIVERY_PUBLISH_TOTAL: &str = "delivery_publish_total";
/// Mailbox publishes that failed after retry (counter, labels: copy).
pub const DELIVERY_PUBLISH_ERRORS_TOTAL: &str = "delivery_publish_errors_total";
/// Mailbox copies skipped as already published (counter).
pub const DELIVERY_DUPLICATES_TOTAL: &str = "delivery_duplicates_total";
