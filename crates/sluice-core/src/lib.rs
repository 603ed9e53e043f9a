//! Shared leaf types for the sluice streaming client.
//!
//! This crate holds the types every other layer agrees on: the
//! case-insensitive header multi-map, the raw bus [`Message`] record
//! exchanged with the transport, and subject utilities (validation,
//! wildcard matching, inbox generation).

pub mod headers;
pub mod message;
pub mod subject;

pub use headers::Headers;
pub use message::Message;
pub use subject::{new_inbox, subject_matches, INBOX_PREFIX};
