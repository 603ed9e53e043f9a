use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use sluice_core::{Headers, Message};
use sluice_transport::BusConnection;
use sluice_wire::ack;

use crate::error::Error;
use crate::publish::PublishOptions;

/// A message delivered through a streaming subscription.
///
/// Clones share the underlying record and acknowledgment state, so a
/// terminal acknowledgment through any clone wins exactly once.
#[derive(Clone)]
pub struct StreamMessage {
    inner: Arc<MessageInner>,
}

struct MessageInner {
    message: Message,
    conn: Arc<dyn BusConnection>,
    wait: Duration,
    acked: AtomicBool,
}

impl StreamMessage {
    pub(crate) fn new(message: Message, conn: Arc<dyn BusConnection>, wait: Duration) -> Self {
        Self {
            inner: Arc::new(MessageInner {
                message,
                conn,
                wait,
                acked: AtomicBool::new(false),
            }),
        }
    }

    pub fn subject(&self) -> &str {
        &self.inner.message.subject
    }

    pub fn payload(&self) -> &Bytes {
        &self.inner.message.payload
    }

    pub fn headers(&self) -> &Headers {
        &self.inner.message.headers
    }

    /// Server-assigned reply subject carrying delivery metadata.
    pub fn reply(&self) -> Option<&str> {
        self.inner.message.reply.as_deref()
    }

    /// True once a terminal acknowledgment succeeded.
    pub fn is_acked(&self) -> bool {
        self.inner.acked.load(Ordering::Acquire)
    }

    /// Extracts delivery metadata from the structured reply subject.
    pub fn metadata(&self) -> Result<MessageMetadata, Error> {
        let reply = self.reply().ok_or(Error::NoReplySubject)?;
        parse_metadata(reply)
    }

    /// Acknowledges the message (fire-and-forget).
    pub async fn ack(&self) -> Result<(), Error> {
        self.ack_reply(ack::ACK, false, PublishOptions::default())
            .await
    }

    /// Acknowledges the message and waits for the server's response.
    pub async fn ack_sync(&self, options: PublishOptions) -> Result<(), Error> {
        self.ack_reply(ack::ACK, true, options).await
    }

    /// Signals the message could not be processed; the server will
    /// redeliver.
    pub async fn nak(&self) -> Result<(), Error> {
        self.ack_reply(ack::NAK, false, PublishOptions::default())
            .await
    }

    /// Terminates the message: no redelivery, regardless of the
    /// delivery cap.
    pub async fn term(&self) -> Result<(), Error> {
        self.ack_reply(ack::TERM, false, PublishOptions::default())
            .await
    }

    /// Signals work in progress, resetting the server's redelivery
    /// timer. May be sent repeatedly.
    pub async fn in_progress(&self) -> Result<(), Error> {
        self.ack_reply(ack::IN_PROGRESS, false, PublishOptions::default())
            .await
    }

    /// Sends one acknowledgment token on the reply subject.
    ///
    /// Terminal tokens race on the atomic acked flag: the first wins,
    /// later ones fail with [`Error::InvalidAck`]. In-progress never
    /// touches the flag but is refused after a terminal ack.
    async fn ack_reply(
        &self,
        token: &'static [u8],
        sync: bool,
        options: PublishOptions,
    ) -> Result<(), Error> {
        if options.scope.is_some() && options.timeout.is_some() {
            return Err(Error::ScopeAndTimeout);
        }
        let reply = self
            .inner
            .message
            .reply
            .clone()
            .ok_or(Error::NoReplySubject)?;

        let terminal = token != ack::IN_PROGRESS;
        if terminal {
            if self
                .inner
                .acked
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(Error::InvalidAck);
            }
        } else if self.inner.acked.load(Ordering::Acquire) {
            return Err(Error::InvalidAck);
        }

        let outcome = if sync {
            let request = self
                .inner
                .conn
                .request(Message::new(reply, Bytes::from_static(token)));
            match &options.scope {
                Some(scope) if scope.is_cancelled() => Err(scope.cause()),
                Some(scope) => tokio::select! {
                    result = request => result.map(|_| ()).map_err(Error::from),
                    () = scope.cancelled() => Err(scope.cause()),
                },
                None => {
                    let wait = options.timeout.unwrap_or(self.inner.wait);
                    match tokio::time::timeout(wait, request).await {
                        Ok(result) => result.map(|_| ()).map_err(Error::from),
                        Err(_) => Err(Error::Timeout),
                    }
                }
            }
        } else {
            self.inner
                .conn
                .publish(Message::new(reply, Bytes::from_static(token)))
                .await
                .map_err(Error::from)
        };

        if terminal && outcome.is_err() {
            // the token never went out; release the flag for a retry
            self.inner.acked.store(false, Ordering::Release);
        }
        outcome
    }
}

impl std::fmt::Debug for StreamMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMessage")
            .field("subject", &self.subject())
            .field("reply", &self.reply())
            .field("payload_len", &self.payload().len())
            .field("acked", &self.is_acked())
            .finish()
    }
}

/// Delivery metadata parsed from a structured reply subject of the
/// form `$JS.ACK.<stream>.<consumer>.<delivered>.<streamSeq>.
/// <consumerSeq>.<tsNanos>.<pending>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    pub stream: String,
    pub consumer: String,
    pub num_delivered: i64,
    pub stream_sequence: i64,
    pub consumer_sequence: i64,
    pub timestamp_nanos: i64,
    pub num_pending: i64,
}

impl MessageMetadata {
    /// Delivery timestamp as wall-clock time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.timestamp_nanos)
    }
}

const METADATA_TOKENS: usize = 9;

pub(crate) fn parse_metadata(reply: &str) -> Result<MessageMetadata, Error> {
    let tokens: Vec<&str> = reply.split('.').collect();
    if tokens.len() != METADATA_TOKENS || tokens[0] != "$JS" || tokens[1] != "ACK" {
        return Err(Error::NotStreamMessage);
    }
    Ok(MessageMetadata {
        stream: tokens[2].to_string(),
        consumer: tokens[3].to_string(),
        num_delivered: parse_num(tokens[4]),
        stream_sequence: parse_num(tokens[5]),
        consumer_sequence: parse_num(tokens[6]),
        timestamp_nanos: parse_num(tokens[7]),
        num_pending: parse_num(tokens[8]),
    })
}

/// Strict ascii digits-only scan; any other byte yields -1.
fn parse_num(token: &str) -> i64 {
    if token.is_empty() {
        return -1;
    }
    let mut value: i64 = 0;
    for byte in token.bytes() {
        if !byte.is_ascii_digit() {
            return -1;
        }
        value = value.wrapping_mul(10).wrapping_add(i64::from(byte - b'0'));
    }
    value
}
