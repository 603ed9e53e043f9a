use std::time::Duration;

use bytes::Bytes;
use sluice_core::headers::{DESCRIPTION_HDR, STATUS_NO_MESSAGES, STATUS_NO_RESPONDERS};
use sluice_core::Message;
use sluice_transport::{BusSubscription, TransportError};
use sluice_wire::consumer::NextRequest;
use sluice_wire::subjects;
use sluice_wire::{encode, ApiError};
use tokio::time::Instant;
use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::message::StreamMessage;
use crate::scope::CancelScope;
use crate::subscribe::Subscription;

/// Headroom subtracted from the fetch wait for the server-side hold,
/// so the long-poll reply beats the caller's own deadline.
const EXPIRES_HEADROOM: Duration = Duration::from_millis(10);

/// Per-fetch options: a timeout or a cancellation scope (mutually
/// exclusive); the context default wait applies otherwise.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) scope: Option<CancelScope>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
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

/// What bounds a fetch's suspensions: a fixed deadline or a scope.
enum WaitBound {
    Deadline(Instant),
    Scope(CancelScope),
}

impl WaitBound {
    async fn next_from(&self, sub: &mut Box<dyn BusSubscription>) -> Result<Option<Message>, Error> {
        match self {
            Self::Deadline(deadline) => match tokio::time::timeout_at(*deadline, sub.next()).await {
                Ok(msg) => Ok(msg),
                Err(_) => Err(Error::Timeout),
            },
            Self::Scope(scope) => tokio::select! {
                msg = sub.next() => Ok(msg),
                () = scope.cancelled() => Err(scope.cause()),
            },
        }
    }

    async fn request(
        &self,
        context: &Context,
        subject: String,
        payload: Bytes,
    ) -> Result<Message, Error> {
        let request = context.conn().request(Message::new(subject, payload));
        match self {
            Self::Deadline(deadline) => match tokio::time::timeout_at(*deadline, request).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(Error::Timeout),
            },
            Self::Scope(scope) => tokio::select! {
                result = request => Ok(result?),
                () = scope.cancelled() => Err(scope.cause()),
            },
        }
    }
}

/// Classifies a zero-payload status reply.
fn check_status(msg: &Message) -> Result<(), Error> {
    let Some(status) = msg.status() else {
        return Ok(());
    };
    match status {
        STATUS_NO_RESPONDERS => Err(Error::Transport(TransportError::NoResponders)),
        STATUS_NO_MESSAGES => Err(Error::NoMessages),
        other => {
            let description = msg
                .headers
                .get(DESCRIPTION_HDR)
                .unwrap_or(other)
                .to_string();
            Err(Error::Server(ApiError {
                code: other.parse().unwrap_or_default(),
                description,
            }))
        }
    }
}

impl Subscription {
    /// Pulls up to `batch` messages from the consumer.
    ///
    /// A no-wait request answers immediately; when it reports an
    /// empty consumer the fetch falls back to a long-poll request
    /// whose server-side hold expires just before the caller's
    /// deadline. Interest on the reply inbox is capped so no
    /// straggler is delivered after the caller stops reading.
    pub async fn fetch(
        &self,
        batch: usize,
        options: FetchOptions,
    ) -> Result<Vec<StreamMessage>, Error> {
        if !self.is_pull() {
            return Err(Error::WrongSubscriptionType);
        }
        if batch == 0 {
            return Err(Error::InvalidBatch);
        }
        if options.scope.is_some() && options.timeout.is_some() {
            return Err(Error::ScopeAndTimeout);
        }

        let context = self.context();
        let ttl = options.timeout.unwrap_or_else(|| context.wait());
        let expires = ttl.saturating_sub(EXPIRES_HEADROOM);
        let bound = match options.scope {
            Some(scope) => {
                if scope.is_cancelled() {
                    return Err(scope.cause());
                }
                WaitBound::Scope(scope)
            }
            None => WaitBound::Deadline(Instant::now() + ttl),
        };

        let next_subject =
            context.api_subject(&subjects::consumer_msg_next(self.stream(), self.consumer()));
        let mut request = NextRequest {
            batch,
            no_wait: true,
            expires: None,
        };

        if batch == 1 {
            let reply = bound
                .request(context, next_subject.clone(), encode(&request)?)
                .await?;
            return match check_status(&reply) {
                Ok(()) => Ok(vec![self.wrap(reply)]),
                Err(Error::NoMessages) => {
                    // empty consumer: long-poll retry on a fresh inbox
                    // whose interest is capped at one delivery
                    request.no_wait = false;
                    request.expires = Some(expires);
                    let conn = context.conn();
                    let inbox = conn.new_inbox();
                    let mut sub = conn.subscribe(&inbox, None).await?;
                    sub.auto_unsubscribe(1).await?;
                    conn.publish(
                        Message::new(next_subject, encode(&request)?).with_reply(inbox),
                    )
                    .await?;
                    let reply = match bound.next_from(&mut sub).await {
                        Ok(Some(msg)) => msg,
                        Ok(None) => {
                            return Err(Error::Transport(TransportError::SubscriptionClosed))
                        }
                        Err(err) => {
                            let _ = sub.unsubscribe().await;
                            return Err(err);
                        }
                    };
                    check_status(&reply)?;
                    Ok(vec![self.wrap(reply)])
                }
                Err(err) => Err(err),
            };
        }

        // multi-message path: collect replies on a dedicated inbox
        let conn = context.conn();
        let inbox = conn.new_inbox();
        let mut sub = conn.subscribe(&inbox, None).await?;
        conn.publish(Message::new(next_subject.clone(), encode(&request)?).with_reply(inbox.clone()))
            .await?;

        let mut first = match bound.next_from(&mut sub).await {
            Ok(Some(msg)) => msg,
            Ok(None) => return Err(Error::Transport(TransportError::SubscriptionClosed)),
            Err(err) => {
                let _ = sub.unsubscribe().await;
                return Err(err);
            }
        };

        match check_status(&first) {
            Ok(()) => {
                // receiving data: cap interest at the batch
                sub.auto_unsubscribe(batch).await?;
            }
            Err(Error::NoMessages) => {
                // immediate 404: switch to the long-poll request,
                // counting the status reply toward the interest cap
                request.no_wait = false;
                request.expires = Some(expires);
                sub.auto_unsubscribe(batch + 1).await?;
                conn.publish(Message::new(next_subject, encode(&request)?).with_reply(inbox))
                    .await?;
                first = match bound.next_from(&mut sub).await {
                    Ok(Some(msg)) => msg,
                    Ok(None) => return Err(Error::Transport(TransportError::SubscriptionClosed)),
                    Err(err) => {
                        let _ = sub.unsubscribe().await;
                        return Err(err);
                    }
                };
                if let Err(err) = check_status(&first) {
                    let _ = sub.unsubscribe().await;
                    return Err(err);
                }
            }
            Err(err) => {
                let _ = sub.unsubscribe().await;
                return Err(err);
            }
        }

        let mut messages = vec![self.wrap(first)];
        while messages.len() < batch {
            let msg = match bound.next_from(&mut sub).await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(cause) => {
                    debug!(%cause, collected = messages.len(), "fetch ended before filling the batch");
                    break;
                }
            };
            // a mid-batch status (request timeout) ends the batch; the
            // collected messages are returned without error
            if check_status(&msg).is_err() {
                break;
            }
            messages.push(self.wrap(msg));
        }
        let _ = sub.unsubscribe().await;
        Ok(messages)
    }

    fn wrap(&self, msg: Message) -> StreamMessage {
        StreamMessage::new(
            msg,
            self.context().conn().clone(),
            self.context().wait(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use crate::subscribe::SubscribeOptions;
    use sluice_core::headers::{STATUS_HDR, STATUS_REQUEST_TIMEOUT};
    use sluice_transport::MemoryBus;
    use std::sync::Arc;

    fn status(subject: &str, code: &str) -> Message {
        let mut msg = Message::new(subject.to_string(), Bytes::new());
        msg.headers.set(STATUS_HDR, code);
        msg
    }

    #[test]
    fn status_classification() {
        assert!(check_status(&Message::new("s", "data")).is_ok());
        assert!(matches!(
            check_status(&status("s", STATUS_NO_MESSAGES)),
            Err(Error::NoMessages)
        ));
        assert!(matches!(
            check_status(&status("s", STATUS_NO_RESPONDERS)),
            Err(Error::Transport(TransportError::NoResponders))
        ));
        let mut timeout = status("s", STATUS_REQUEST_TIMEOUT);
        timeout.headers.set(DESCRIPTION_HDR, "Request Timeout");
        match check_status(&timeout) {
            Err(Error::Server(err)) => {
                assert_eq!(err.code, 408);
                assert_eq!(err.description, "Request Timeout");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    async fn pull_sub(bus: &Arc<MemoryBus>) -> Subscription {
        let context = Context::with_config(bus.clone(), ContextConfig::new().direct_only())
            .await
            .expect("context");
        context
            .pull_subscribe(
                "X.y",
                SubscribeOptions::new().bind_stream("X").bind_consumer("c"),
            )
            .await
            .expect("pull subscription")
    }

    #[tokio::test]
    async fn fetch_validates_inputs() {
        let bus = Arc::new(MemoryBus::new());
        let sub = pull_sub(&bus).await;
        assert!(matches!(
            sub.fetch(0, FetchOptions::new()).await,
            Err(Error::InvalidBatch)
        ));
        assert!(matches!(
            sub.fetch(
                1,
                FetchOptions::new()
                    .timeout(Duration::from_millis(10))
                    .cancel_scope(CancelScope::new())
            )
            .await,
            Err(Error::ScopeAndTimeout)
        ));
    }

    #[tokio::test]
    async fn fetch_on_push_subscription_is_refused() {
        let bus = Arc::new(MemoryBus::new());
        let context = Context::with_config(bus.clone(), ContextConfig::new().direct_only())
            .await
            .expect("context");
        let sub = context
            .subscribe_sync(
                "X.y",
                SubscribeOptions::new().bind_stream("X").deliver_subject("push.X"),
            )
            .await
            .expect("push subscription");
        assert!(matches!(
            sub.fetch(1, FetchOptions::new()).await,
            Err(Error::WrongSubscriptionType)
        ));
    }

    #[tokio::test]
    async fn pre_cancelled_scope_is_detected_up_front() {
        let bus = Arc::new(MemoryBus::new());
        let sub = pull_sub(&bus).await;
        let scope = CancelScope::new();
        scope.cancel();
        assert!(matches!(
            sub.fetch(1, FetchOptions::new().cancel_scope(scope)).await,
            Err(Error::Cancelled)
        ));
    }
}
