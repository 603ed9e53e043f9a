//! Fixed acknowledgment payload tokens.

/// Positive acknowledgment: the message was processed.
pub const ACK: &[u8] = b"+ACK";
/// Negative acknowledgment: redeliver the message.
pub const NAK: &[u8] = b"-NAK";
/// Work in progress: reset the server's redelivery timer.
pub const IN_PROGRESS: &[u8] = b"+WPI";
/// Acknowledge and request the next message.
pub const NEXT: &[u8] = b"+NXT";
/// Terminate: never redeliver, regardless of the delivery cap.
pub const TERM: &[u8] = b"+TERM";
