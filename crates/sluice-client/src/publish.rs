use std::time::Duration;

use bytes::Bytes;
use sluice_core::headers::{
    EXPECTED_LAST_MSG_ID_HDR, EXPECTED_LAST_SEQ_HDR, EXPECTED_STREAM_HDR, MSG_ID_HDR,
};
use sluice_core::Message;
use sluice_transport::TransportError;
use sluice_wire::stream::PubAck;
use sluice_wire::{decode, Response};

use crate::context::Context;
use crate::error::Error;
use crate::scope::CancelScope;

/// Per-publish options: deduplication id, optimistic-concurrency
/// expectations, and a per-call timeout or cancellation scope (the
/// two are mutually exclusive).
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub(crate) msg_id: Option<String>,
    pub(crate) expect_stream: Option<String>,
    pub(crate) expect_last_sequence: Option<u64>,
    pub(crate) expect_last_msg_id: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) scope: Option<CancelScope>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message id the server uses for deduplication.
    pub fn msg_id(mut self, id: impl Into<String>) -> Self {
        self.msg_id = Some(id.into());
        self
    }

    /// Stream expected to acknowledge the publish.
    pub fn expect_stream(mut self, stream: impl Into<String>) -> Self {
        self.expect_stream = Some(stream.into());
        self
    }

    /// Sequence the stream is expected to be at.
    pub fn expect_last_sequence(mut self, seq: u64) -> Self {
        self.expect_last_sequence = Some(seq);
        self
    }

    /// Message id the stream's last message is expected to carry.
    pub fn expect_last_msg_id(mut self, id: impl Into<String>) -> Self {
        self.expect_last_msg_id = Some(id.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_scope(mut self, scope: CancelScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl Context {
    /// Publishes `payload` on `subject` and waits for the stream's
    /// acknowledgment.
    pub async fn publish(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
        options: PublishOptions,
    ) -> Result<PubAck, Error> {
        self.publish_message(Message::new(subject, payload), options)
            .await
    }

    /// Publishes a prepared message and waits for the acknowledgment.
    ///
    /// Options become headers on the message: the dedup id and the
    /// expected-stream / expected-last-sequence / expected-last-msg-id
    /// assertions the server checks before ingesting.
    pub async fn publish_message(
        &self,
        mut msg: Message,
        options: PublishOptions,
    ) -> Result<PubAck, Error> {
        if options.scope.is_some() && options.timeout.is_some() {
            return Err(Error::ScopeAndTimeout);
        }

        if let Some(id) = &options.msg_id {
            msg.headers.set(MSG_ID_HDR, id.clone());
        }
        if let Some(id) = &options.expect_last_msg_id {
            msg.headers.set(EXPECTED_LAST_MSG_ID_HDR, id.clone());
        }
        if let Some(stream) = &options.expect_stream {
            msg.headers.set(EXPECTED_STREAM_HDR, stream.clone());
        }
        if let Some(seq) = options.expect_last_sequence {
            msg.headers.set(EXPECTED_LAST_SEQ_HDR, seq.to_string());
        }

        let request = self.conn().request(msg);
        let reply = match &options.scope {
            Some(scope) if scope.is_cancelled() => return Err(scope.cause()),
            Some(scope) => tokio::select! {
                result = request => result.map_err(no_stream_on_no_responders)?,
                () = scope.cancelled() => return Err(scope.cause()),
            },
            None => {
                let wait = options.timeout.unwrap_or_else(|| self.wait());
                match tokio::time::timeout(wait, request).await {
                    Ok(result) => result.map_err(no_stream_on_no_responders)?,
                    Err(_) => return Err(Error::Timeout),
                }
            }
        };

        let ack = decode::<Response<PubAck>>(&reply.payload).map_err(|_| Error::InvalidAck)?;
        match ack {
            Response::Err { error } => Err(Error::Server(error)),
            Response::Ok(ack) if ack.stream.is_empty() => Err(Error::InvalidAck),
            Response::Ok(ack) => Ok(ack),
        }
    }
}

fn no_stream_on_no_responders(err: TransportError) -> Error {
    match err {
        TransportError::NoResponders => Error::NoStreamResponse,
        other => Error::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use sluice_transport::{BusConnection, MemoryBus};
    use std::sync::Arc;

    async fn direct_context(bus: &Arc<MemoryBus>) -> Context {
        Context::with_config(bus.clone(), ContextConfig::new().direct_only())
            .await
            .expect("direct context")
    }

    #[tokio::test]
    async fn scope_and_timeout_are_mutually_exclusive() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;
        let err = context
            .publish(
                "FOO.bar",
                "x",
                PublishOptions::new()
                    .timeout(Duration::from_secs(1))
                    .cancel_scope(CancelScope::new()),
            )
            .await
            .expect_err("collision");
        assert!(matches!(err, Error::ScopeAndTimeout));
    }

    #[tokio::test]
    async fn publish_without_acknowledger_reports_no_stream_response() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;
        let err = context
            .publish("FOO.bar", "x", PublishOptions::new())
            .await
            .expect_err("nobody listens");
        assert!(matches!(err, Error::NoStreamResponse));
    }

    #[tokio::test]
    async fn options_become_headers_on_the_request() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;

        let mut ingest = bus.subscribe("FOO.bar", None).await.expect("subscribe");
        let responder: Arc<MemoryBus> = bus.clone();
        tokio::spawn(async move {
            let req = ingest.next().await.expect("publish arrives");
            assert_eq!(req.headers.get(MSG_ID_HDR), Some("abc"));
            assert_eq!(req.headers.get(EXPECTED_STREAM_HDR), Some("FOO"));
            assert_eq!(req.headers.get(EXPECTED_LAST_SEQ_HDR), Some("7"));
            assert_eq!(req.headers.get(EXPECTED_LAST_MSG_ID_HDR), Some("prev"));
            let reply = req.reply.expect("request reply subject");
            responder
                .publish(Message::new(reply, r#"{"stream":"FOO","seq":8}"#))
                .await
                .expect("reply");
        });

        let ack = context
            .publish(
                "FOO.bar",
                "x",
                PublishOptions::new()
                    .msg_id("abc")
                    .expect_stream("FOO")
                    .expect_last_sequence(7)
                    .expect_last_msg_id("prev"),
            )
            .await
            .expect("acknowledged");
        assert_eq!(ack.stream, "FOO");
        assert_eq!(ack.seq, 8);
        assert!(!ack.duplicate);
    }

    #[tokio::test]
    async fn undecodable_ack_is_invalid() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;

        let mut ingest = bus.subscribe("FOO.bar", None).await.expect("subscribe");
        let responder: Arc<MemoryBus> = bus.clone();
        tokio::spawn(async move {
            let req = ingest.next().await.expect("publish arrives");
            responder
                .publish(Message::new(req.reply.expect("reply"), "not json"))
                .await
                .expect("reply");
        });

        let err = context
            .publish("FOO.bar", "x", PublishOptions::new())
            .await
            .expect_err("bad ack");
        assert!(matches!(err, Error::InvalidAck));
    }

    #[tokio::test]
    async fn empty_stream_name_in_ack_is_invalid() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;

        let mut ingest = bus.subscribe("FOO.bar", None).await.expect("subscribe");
        let responder: Arc<MemoryBus> = bus.clone();
        tokio::spawn(async move {
            let req = ingest.next().await.expect("publish arrives");
            responder
                .publish(Message::new(
                    req.reply.expect("reply"),
                    r#"{"stream":"","seq":1}"#,
                ))
                .await
                .expect("reply");
        });

        let err = context
            .publish("FOO.bar", "x", PublishOptions::new())
            .await
            .expect_err("empty stream");
        assert!(matches!(err, Error::InvalidAck));
    }

    #[tokio::test]
    async fn server_error_description_is_surfaced() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;

        let mut ingest = bus.subscribe("FOO.bar", None).await.expect("subscribe");
        let responder: Arc<MemoryBus> = bus.clone();
        tokio::spawn(async move {
            let req = ingest.next().await.expect("publish arrives");
            responder
                .publish(Message::new(
                    req.reply.expect("reply"),
                    r#"{"error":{"code":400,"description":"wrong last sequence: 3"}}"#,
                ))
                .await
                .expect("reply");
        });

        let err = context
            .publish("FOO.bar", "x", PublishOptions::new())
            .await
            .expect_err("expectation failed");
        assert_eq!(err.to_string(), "wrong last sequence: 3");
    }

    #[tokio::test]
    async fn cancelled_scope_is_detected_up_front() {
        let bus = Arc::new(MemoryBus::new());
        let context = direct_context(&bus).await;
        let scope = CancelScope::new();
        scope.cancel();
        let err = context
            .publish("FOO.bar", "x", PublishOptions::new().cancel_scope(scope))
            .await
            .expect_err("cancelled before issuing");
        assert!(matches!(err, Error::Cancelled));
    }
}
