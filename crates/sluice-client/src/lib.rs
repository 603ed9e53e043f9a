//! Client for a durable, at-least-once streaming layer over a
//! lightweight subject-addressed pub/sub bus.
//!
//! The bus itself is best-effort and fire-and-forget; the streaming
//! layer adds server-side persistence ("streams") and server-side
//! cursors ("consumers"). This crate is the client side of that
//! layer: acknowledged publishes with deduplication and
//! optimistic-concurrency expectations, a subscription establishment
//! protocol that attaches to or creates consumers (push or pull,
//! ephemeral or durable), a batched pull-fetch protocol, and the
//! per-message acknowledgment engine.
//!
//! # Example
//!
//! ```ignore
//! let context = Context::connect(conn).await?;
//!
//! let ack = context
//!     .publish("ORDERS.new", payload, PublishOptions::new().msg_id("order-17"))
//!     .await?;
//!
//! let sub = context
//!     .pull_subscribe("ORDERS.new", SubscribeOptions::new().durable("worker"))
//!     .await?;
//! for msg in sub.fetch(10, FetchOptions::new()).await? {
//!     process(&msg);
//!     msg.ack().await?;
//! }
//! ```

pub mod context;
pub mod error;
pub mod message;
pub mod publish;
pub mod pull;
pub mod scope;
pub mod subscribe;

pub use context::{Context, ContextConfig};
pub use error::Error;
pub use message::{MessageMetadata, StreamMessage};
pub use publish::PublishOptions;
pub use pull::FetchOptions;
pub use scope::CancelScope;
pub use subscribe::{SubscribeOptions, Subscription, SubscriptionKind};

pub use sluice_wire::account::AccountInfo;
pub use sluice_wire::consumer::{ConsumerConfig, ConsumerInfo, SequencePair};
pub use sluice_wire::policy::{AckPolicy, DeliverPolicy, ReplayPolicy};
pub use sluice_wire::stream::PubAck;
