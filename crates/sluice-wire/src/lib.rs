//! JSON wire envelopes for the streaming management API.
//!
//! Every management exchange is a small JSON document on a
//! request/reply subject. Responses always carry an optional `error`
//! object; its presence is fatal for the call. This crate owns the
//! envelope types, the fixed lowercase enum tag encodings, and the
//! API subject templates.

pub mod account;
pub mod ack;
pub mod consumer;
pub mod envelope;
pub mod error;
pub mod policy;
pub mod stream;
pub mod subjects;

mod ser;

pub use envelope::{ApiError, Response, SuccessResponse};
pub use error::WireError;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a request document as JSON bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, WireError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Decodes a response document from JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}
