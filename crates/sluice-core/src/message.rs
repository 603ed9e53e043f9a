use bytes::Bytes;

use crate::headers::{Headers, STATUS_HDR};

/// A raw bus message: what the transport publishes and delivers.
///
/// Delivered messages carry the server-assigned reply subject when
/// one exists; outbound messages carry the reply subject the sender
/// wants answers on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub reply: Option<String>,
    pub headers: Headers,
    pub payload: Bytes,
}

impl Message {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            headers: Headers::new(),
            payload: payload.into(),
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Returns the `Status` header of a zero-payload control reply.
    ///
    /// Data messages (non-empty payload) never classify as status
    /// messages even when a `Status` header is present.
    pub fn status(&self) -> Option<&str> {
        if self.payload.is_empty() {
            self.headers.get(STATUS_HDR)
        } else {
            None
        }
    }
}
