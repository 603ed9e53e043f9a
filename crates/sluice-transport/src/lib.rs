//! Transport abstractions for sluice.
//!
//! The client depends on the [`BusConnection`] contract: a thread-safe
//! pub/sub connection offering fire-and-forget publish, request/reply
//! with a canonical no-responders outcome, and message-level
//! subscriptions with auto-unsubscribe budgets and graceful drain.
//! [`MemoryBus`] is a complete in-process implementation used by tests
//! and simulations.

pub mod connection;
pub mod memory;

pub use connection::{BusConnection, BusSubscription, TransportError, DEFAULT_PENDING_LIMIT};
pub use memory::MemoryBus;
