//! In-process simulation of the streaming server side.
//!
//! [`StreamServer`] services the management API, ingests publishes
//! into named streams (with deduplication and optimistic-concurrency
//! checks), pushes deliveries to push consumers, answers pull
//! next-requests with no-wait and long-poll semantics, and absorbs
//! acknowledgment tokens. It exists so client behavior can be
//! exercised end-to-end over a [`sluice_transport::MemoryBus`]
//! without a real server.

pub mod server;

pub use server::StreamServer;
