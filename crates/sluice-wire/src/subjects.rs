//! API subject templates.
//!
//! All management calls are request/reply over `<prefix><verb>`
//! subjects. The prefix defaults to [`DEFAULT_API_PREFIX`] and always
//! ends in a dot.

/// Default subject prefix for the management API.
pub const DEFAULT_API_PREFIX: &str = "$JS.API.";

/// Prefix of the structured reply subject on delivered messages.
pub const ACK_PREFIX: &str = "$JS.ACK";

/// Account information probe.
pub const ACCOUNT_INFO: &str = "INFO";

/// Stream lookup by subject.
pub const STREAM_NAMES: &str = "STREAM.NAMES";

/// Ephemeral consumer creation on `stream`.
pub fn consumer_create(stream: &str) -> String {
    format!("CONSUMER.CREATE.{stream}")
}

/// Durable consumer creation on `stream`.
pub fn durable_create(stream: &str, durable: &str) -> String {
    format!("CONSUMER.DURABLE.CREATE.{stream}.{durable}")
}

/// Consumer information lookup.
pub fn consumer_info(stream: &str, consumer: &str) -> String {
    format!("CONSUMER.INFO.{stream}.{consumer}")
}

/// Next-message request for a pull consumer.
pub fn consumer_msg_next(stream: &str, consumer: &str) -> String {
    format!("CONSUMER.MSG.NEXT.{stream}.{consumer}")
}

/// Consumer deletion.
pub fn consumer_delete(stream: &str, consumer: &str) -> String {
    format!("CONSUMER.DELETE.{stream}.{consumer}")
}
