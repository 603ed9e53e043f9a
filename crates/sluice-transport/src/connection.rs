use async_trait::async_trait;
use sluice_core::Message;
use thiserror::Error;

/// Default cap on buffered deliveries per subscription.
pub const DEFAULT_PENDING_LIMIT: usize = 65_536;

/// Errors surfaced by a bus transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing is listening on the request subject.
    #[error("no responders available for request")]
    NoResponders,
    /// The connection is closed.
    #[error("connection closed")]
    Closed,
    /// The subscription is no longer receiving deliveries.
    #[error("subscription closed")]
    SubscriptionClosed,
    /// The subject is not well-formed.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),
}

/// A thread-safe pub/sub bus connection.
///
/// All methods may be called concurrently from any task.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Mints a fresh, unique reply subject.
    fn new_inbox(&self) -> String;

    /// Best-effort, fire-and-forget publish. The message's `reply`
    /// and headers travel with it verbatim.
    async fn publish(&self, msg: Message) -> Result<(), TransportError>;

    /// Publishes `msg` with a private reply inbox and resolves with
    /// the first reply. Fails with [`TransportError::NoResponders`]
    /// when nothing is listening on the subject. Callers bound the
    /// wait themselves.
    async fn request(&self, msg: Message) -> Result<Message, TransportError>;

    /// Opens a subscription on `subject`, optionally in a queue
    /// group. `subject` may contain wildcards.
    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<Box<dyn BusSubscription>, TransportError>;
}

/// A live subscription on a bus subject.
#[async_trait]
pub trait BusSubscription: Send + std::fmt::Debug {
    /// Subject the subscription listens on.
    fn subject(&self) -> &str;

    /// Awaits the next delivery. Returns `None` once the
    /// subscription's interest is gone and its buffer is empty.
    async fn next(&mut self) -> Option<Message>;

    /// Returns a buffered delivery without waiting.
    fn try_next(&mut self) -> Option<Message>;

    /// Caps total deliveries, counting those already made; interest
    /// is removed once the budget is consumed.
    async fn auto_unsubscribe(&mut self, max: usize) -> Result<(), TransportError>;

    /// Maximum buffered deliveries before the transport drops.
    fn pending_limit(&self) -> usize;

    /// Removes interest immediately and discards buffered deliveries.
    async fn unsubscribe(&mut self) -> Result<(), TransportError>;

    /// Removes interest but lets already-buffered deliveries be read.
    async fn drain(&mut self) -> Result<(), TransportError>;
}
