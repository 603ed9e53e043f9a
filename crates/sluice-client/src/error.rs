use sluice_transport::TransportError;
use sluice_wire::policy::AckPolicy;
use sluice_wire::{ApiError, WireError};
use thiserror::Error;

/// Errors surfaced by the streaming client.
#[derive(Debug, Error)]
pub enum Error {
    /// A per-call cancellation scope and timeout were both supplied.
    #[error("cancellation scope and timeout are mutually exclusive")]
    ScopeAndTimeout,
    /// Durable names are single tokens; `.` is not allowed.
    #[error("invalid durable name")]
    InvalidDurableName,
    /// Pull consumers need per-message acknowledgment.
    #[error("invalid ack mode for pull consumers: {0}")]
    InvalidPullAck(AckPolicy),
    /// The context avoids the management API; the caller must supply
    /// an explicit stream binding or deliver subject.
    #[error("direct mode requires an explicit stream binding or deliver subject")]
    DirectModeRequired,
    /// The subject differs from the consumer's filter subject.
    #[error("subject does not match consumer filter subject")]
    SubjectMismatch,
    /// The account-info probe found no streaming responder.
    #[error("streaming not enabled")]
    NotEnabled,
    /// Nothing acknowledged the publish.
    #[error("no stream response")]
    NoStreamResponse,
    /// Zero or multiple streams bind the subject.
    #[error("no stream matches subject")]
    NoMatchingStream,
    /// The consumer had nothing to deliver.
    #[error("no messages")]
    NoMessages,
    /// Undecodable publish acknowledgment, or a repeated terminal ack.
    #[error("invalid stream acknowledgment")]
    InvalidAck,
    /// The reply subject is not a structured metadata subject.
    #[error("not a stream message")]
    NotStreamMessage,
    /// The message carries no reply subject to acknowledge on.
    #[error("message has no reply subject")]
    NoReplySubject,
    /// The operation does not apply to this subscription type.
    #[error("operation not supported by this subscription type")]
    WrongSubscriptionType,
    /// Fetch needs a batch of at least one message.
    #[error("fetch batch must be at least 1")]
    InvalidBatch,
    #[error("timed out")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    /// Server-reported error (code and description).
    #[error("{0}")]
    Server(ApiError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Wire(#[from] WireError),
}
