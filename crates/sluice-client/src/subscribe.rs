use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sluice_transport::{BusConnection, BusSubscription, TransportError, DEFAULT_PENDING_LIMIT};
use sluice_wire::consumer::{ConsumerConfig, ConsumerInfo, CreateConsumerRequest};
use sluice_wire::policy::{AckPolicy, DeliverPolicy, ReplayPolicy};
use sluice_wire::subjects;
use sluice_wire::{decode, encode, Response};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::context::{not_enabled_on_no_responders, Context};
use crate::error::Error;
use crate::message::StreamMessage;

/// Callback invoked for each delivery on an async push subscription.
pub type MessageHandler = Box<dyn Fn(StreamMessage) + Send + Sync + 'static>;

/// Per-subscribe options: consumer shape (durable name, policies,
/// limits), explicit bindings, and delivery behavior.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub(crate) durable: Option<String>,
    pub(crate) stream: Option<String>,
    pub(crate) consumer: Option<String>,
    pub(crate) deliver_subject: Option<String>,
    pub(crate) deliver_policy: Option<DeliverPolicy>,
    pub(crate) opt_start_seq: Option<u64>,
    pub(crate) opt_start_time: Option<DateTime<Utc>>,
    pub(crate) ack_policy: Option<AckPolicy>,
    pub(crate) ack_wait: Option<Duration>,
    pub(crate) max_deliver: Option<i64>,
    pub(crate) max_ack_pending: Option<i64>,
    pub(crate) max_waiting: Option<i64>,
    pub(crate) replay_policy: Option<ReplayPolicy>,
    pub(crate) rate_limit: Option<u64>,
    pub(crate) sample_frequency: Option<String>,
    pub(crate) manual_ack: bool,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names a durable consumer. Durable names are single tokens; a
    /// name containing `.` fails the subscribe.
    pub fn durable(mut self, name: impl Into<String>) -> Self {
        self.durable = Some(name.into());
        self
    }

    /// Binds the subscription to a stream by name, skipping lookup.
    pub fn bind_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }

    /// Binds the subscription to a named consumer (direct mode).
    pub fn bind_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = Some(consumer.into());
        self
    }

    /// Explicit deliver subject (direct mode).
    pub fn deliver_subject(mut self, subject: impl Into<String>) -> Self {
        self.deliver_subject = Some(subject.into());
        self
    }

    pub fn deliver_policy(mut self, policy: DeliverPolicy) -> Self {
        self.deliver_policy = Some(policy);
        self
    }

    /// Starts delivery at a stream sequence.
    pub fn start_sequence(mut self, seq: u64) -> Self {
        self.deliver_policy = Some(DeliverPolicy::ByStartSequence);
        self.opt_start_seq = Some(seq);
        self
    }

    /// Starts delivery at the first message at or after `time`.
    pub fn start_time(mut self, time: DateTime<Utc>) -> Self {
        self.deliver_policy = Some(DeliverPolicy::ByStartTime);
        self.opt_start_time = Some(time);
        self
    }

    pub fn ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = Some(policy);
        self
    }

    pub fn ack_wait(mut self, wait: Duration) -> Self {
        self.ack_wait = Some(wait);
        self
    }

    pub fn max_deliver(mut self, max: i64) -> Self {
        self.max_deliver = Some(max);
        self
    }

    pub fn max_ack_pending(mut self, max: i64) -> Self {
        self.max_ack_pending = Some(max);
        self
    }

    /// Caps inflight pull requests waiting on the consumer.
    pub fn max_waiting(mut self, max: i64) -> Self {
        self.max_waiting = Some(max);
        self
    }

    pub fn replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = Some(policy);
        self
    }

    /// Delivery rate limit in bits per second (push consumers).
    pub fn rate_limit(mut self, bits_per_sec: u64) -> Self {
        self.rate_limit = Some(bits_per_sec);
        self
    }

    /// Observability sampling frequency, e.g. `"100%"`.
    pub fn sample_frequency(mut self, freq: impl Into<String>) -> Self {
        self.sample_frequency = Some(freq.into());
        self
    }

    /// Disables the automatic acknowledgment wrapped around async
    /// push handlers.
    pub fn manual_ack(mut self) -> Self {
        self.manual_ack = true;
        self
    }
}

fn consumer_config(options: &SubscribeOptions) -> ConsumerConfig {
    ConsumerConfig {
        durable: options.durable.clone().unwrap_or_default(),
        deliver_subject: String::new(),
        deliver_policy: options.deliver_policy.unwrap_or_default(),
        opt_start_seq: options.opt_start_seq.unwrap_or_default(),
        opt_start_time: options.opt_start_time,
        ack_policy: options.ack_policy.unwrap_or_default(),
        ack_wait: options.ack_wait,
        max_deliver: options.max_deliver.unwrap_or_default(),
        filter_subject: String::new(),
        replay_policy: options.replay_policy.unwrap_or_default(),
        rate_limit: options.rate_limit.unwrap_or_default(),
        sample_frequency: options.sample_frequency.clone().unwrap_or_default(),
        max_waiting: options.max_waiting.unwrap_or_default(),
        max_ack_pending: options.max_ack_pending.unwrap_or_default(),
    }
}

/// How deliveries reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Handler callback per message.
    PushAsync,
    /// Caller pulls messages one at a time with `next_message`.
    PushSync,
    /// Deliveries forwarded into a caller-supplied channel.
    PushChannel,
    /// Caller drives explicit `fetch` batches.
    Pull,
}

pub(crate) enum DeliverTarget {
    Handler(MessageHandler),
    Channel(mpsc::Sender<StreamMessage>),
    Sync,
    Pull,
}

enum DeliveryMode {
    Dispatch { task: JoinHandle<()> },
    Sync { sub: Box<dyn BusSubscription> },
    Pull,
}

/// A bound streaming subscription.
pub struct Subscription {
    context: Context,
    kind: SubscriptionKind,
    subject: String,
    stream: String,
    consumer: String,
    deliver_subject: String,
    durable: bool,
    attached: bool,
    pull: bool,
    mode: DeliveryMode,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("subject", &self.subject)
            .field("stream", &self.stream)
            .field("consumer", &self.consumer)
            .field("deliver_subject", &self.deliver_subject)
            .field("durable", &self.durable)
            .field("attached", &self.attached)
            .field("pull", &self.pull)
            .finish()
    }
}

impl Context {
    /// Async push subscription: `handler` runs for every delivery,
    /// followed by an automatic ack unless manual-ack is requested.
    pub async fn subscribe(
        &self,
        subject: &str,
        handler: impl Fn(StreamMessage) + Send + Sync + 'static,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        self.establish(subject, None, DeliverTarget::Handler(Box::new(handler)), options)
            .await
    }

    /// Async push subscription in a queue group.
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        queue: &str,
        handler: impl Fn(StreamMessage) + Send + Sync + 'static,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        self.establish(
            subject,
            Some(queue),
            DeliverTarget::Handler(Box::new(handler)),
            options,
        )
        .await
    }

    /// Push subscription read synchronously with
    /// [`Subscription::next_message`].
    pub async fn subscribe_sync(
        &self,
        subject: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        self.establish(subject, None, DeliverTarget::Sync, options)
            .await
    }

    /// Synchronous push subscription in a queue group.
    pub async fn queue_subscribe_sync(
        &self,
        subject: &str,
        queue: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        self.establish(subject, Some(queue), DeliverTarget::Sync, options)
            .await
    }

    /// Push subscription forwarding deliveries into `sender`.
    pub async fn chan_subscribe(
        &self,
        subject: &str,
        sender: mpsc::Sender<StreamMessage>,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        self.establish(subject, None, DeliverTarget::Channel(sender), options)
            .await
    }

    /// Pull subscription driven by [`Subscription::fetch`].
    pub async fn pull_subscribe(
        &self,
        subject: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        self.establish(subject, None, DeliverTarget::Pull, options)
            .await
    }

    /// The subscription establishment protocol: classify, resolve the
    /// stream, attach to or create the consumer, bind transport
    /// delivery, and record the binding.
    async fn establish(
        &self,
        subject: &str,
        queue: Option<&str>,
        target: DeliverTarget,
        options: SubscribeOptions,
    ) -> Result<Subscription, Error> {
        if let Some(durable) = &options.durable {
            if durable.contains('.') {
                return Err(Error::InvalidDurableName);
            }
        }

        let is_pull = matches!(target, DeliverTarget::Pull);
        if is_pull {
            if let Some(policy @ (AckPolicy::None | AckPolicy::All)) = options.ack_policy {
                return Err(Error::InvalidPullAck(policy));
            }
        }

        let requires_api = options.stream.is_none()
            && options.consumer.is_none()
            && options.deliver_subject.is_none();
        if self.is_direct() && requires_api {
            return Err(Error::DirectModeRequired);
        }

        let mut cfg = consumer_config(&options);
        let mut stream;
        let mut consumer;
        let mut attached = false;
        let mut should_create = false;
        let deliver: String;
        let mut recorded_deliver;

        if self.is_direct() {
            // no API exchanges: bindings come verbatim from options
            deliver = options
                .deliver_subject
                .clone()
                .unwrap_or_else(|| self.conn().new_inbox());
            stream = options.stream.clone().unwrap_or_default();
            consumer = options.consumer.clone().unwrap_or_default();
            recorded_deliver = options.deliver_subject.clone().unwrap_or_default();
        } else {
            stream = match &options.stream {
                Some(name) => name.clone(),
                None => self.lookup_stream_by_subject(subject).await?,
            };

            // with a durable name, look up the consumer it may attach to
            let mut info = None;
            consumer = options.durable.clone().unwrap_or_default();
            if !consumer.is_empty() {
                match self.consumer_info(&stream, &consumer).await {
                    Ok(found) => info = Some(found),
                    Err(Error::Server(err)) if err.description == "consumer not found" => {}
                    Err(err) => return Err(err),
                }
            }

            match info {
                Some(found) => {
                    // attach under the existing consumer's effective config
                    attached = true;
                    let existing = found.config;
                    if !existing.filter_subject.is_empty() && subject != existing.filter_subject {
                        return Err(Error::SubjectMismatch);
                    }
                    deliver = if existing.deliver_subject.is_empty() {
                        self.conn().new_inbox()
                    } else {
                        existing.deliver_subject.clone()
                    };
                    recorded_deliver = existing.deliver_subject.clone();
                    cfg = existing;
                }
                None => {
                    should_create = true;
                    deliver = self.conn().new_inbox();
                    recorded_deliver = String::new();
                    if !is_pull {
                        cfg.deliver_subject = deliver.clone();
                    }
                    // filter always; the server clears it as needed
                    cfg.filter_subject = subject.to_string();
                }
            }
        }

        // bind the transport leg; pull mode binds per-fetch inboxes instead
        let mut bus_sub: Option<Box<dyn BusSubscription>> = None;
        if !is_pull {
            bus_sub = Some(self.conn().subscribe(&deliver, queue).await?);
        }

        if should_create {
            if cfg.max_ack_pending == 0 && cfg.ack_policy != AckPolicy::None {
                cfg.max_ack_pending = bus_sub
                    .as_ref()
                    .map_or(DEFAULT_PENDING_LIMIT, |sub| sub.pending_limit())
                    as i64;
            }

            let is_durable = !cfg.durable.is_empty();
            let verb = if is_durable {
                subjects::durable_create(&stream, &cfg.durable)
            } else {
                subjects::consumer_create(&stream)
            };
            let request = CreateConsumerRequest {
                stream: stream.clone(),
                config: cfg.clone(),
            };

            let created: Result<ConsumerInfo, Error> = async {
                let payload = encode(&request)?;
                let reply = self
                    .api_request(&verb, payload)
                    .await
                    .map_err(not_enabled_on_no_responders)?;
                decode::<Response<ConsumerInfo>>(&reply.payload)?
                    .into_result()
                    .map_err(Error::Server)
            }
            .await;

            match created {
                Ok(created) => {
                    debug!(stream = %created.stream, consumer = %created.name, "created consumer");
                    stream = created.stream;
                    consumer = created.name;
                    recorded_deliver = created.config.deliver_subject;
                }
                Err(err) => {
                    // undo the transport leg before surfacing
                    if let Some(mut sub) = bus_sub {
                        let _ = sub.unsubscribe().await;
                    }
                    return Err(err);
                }
            }
        }

        let conn = self.conn().clone();
        let wait = self.wait();
        let (kind, mode) = match target {
            DeliverTarget::Pull => (SubscriptionKind::Pull, DeliveryMode::Pull),
            DeliverTarget::Sync => (
                SubscriptionKind::PushSync,
                DeliveryMode::Sync {
                    sub: bus_sub.take().expect("push mode binds a transport leg"),
                },
            ),
            DeliverTarget::Handler(handler) => {
                let sub = bus_sub.take().expect("push mode binds a transport leg");
                let task =
                    spawn_handler_dispatch(sub, handler, !options.manual_ack, conn, wait);
                (SubscriptionKind::PushAsync, DeliveryMode::Dispatch { task })
            }
            DeliverTarget::Channel(sender) => {
                let sub = bus_sub.take().expect("push mode binds a transport leg");
                let task = spawn_channel_dispatch(sub, sender, conn, wait);
                (SubscriptionKind::PushChannel, DeliveryMode::Dispatch { task })
            }
        };

        Ok(Subscription {
            context: self.clone(),
            kind,
            subject: subject.to_string(),
            stream,
            consumer,
            deliver_subject: recorded_deliver,
            durable: options.durable.is_some(),
            attached,
            pull: is_pull,
            mode,
        })
    }
}

fn spawn_handler_dispatch(
    mut sub: Box<dyn BusSubscription>,
    handler: MessageHandler,
    auto_ack: bool,
    conn: Arc<dyn BusConnection>,
    wait: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = sub.next().await {
            let delivered = StreamMessage::new(msg, conn.clone(), wait);
            handler(delivered.clone());
            if auto_ack && delivered.reply().is_some() {
                if let Err(err) = delivered.ack().await {
                    // a handler that already acked is fine
                    if !matches!(err, Error::InvalidAck) {
                        debug!(error = %err, "auto-ack failed");
                    }
                }
            }
        }
    })
}

fn spawn_channel_dispatch(
    mut sub: Box<dyn BusSubscription>,
    sender: mpsc::Sender<StreamMessage>,
    conn: Arc<dyn BusConnection>,
    wait: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = sub.next().await {
            let delivered = StreamMessage::new(msg, conn.clone(), wait);
            if sender.send(delivered).await.is_err() {
                break;
            }
        }
    })
}

impl Subscription {
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Stream the subscription is bound to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Consumer servicing the subscription.
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Deliver subject recorded from the effective consumer config.
    pub fn deliver_subject(&self) -> &str {
        &self.deliver_subject
    }

    pub fn is_pull(&self) -> bool {
        self.pull
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// True when the subscription attached to a pre-existing consumer.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    /// Next delivery on a synchronous push subscription.
    pub async fn next_message(&mut self, wait: Duration) -> Result<StreamMessage, Error> {
        let DeliveryMode::Sync { sub } = &mut self.mode else {
            return Err(Error::WrongSubscriptionType);
        };
        match tokio::time::timeout(wait, sub.next()).await {
            Ok(Some(msg)) => Ok(StreamMessage::new(
                msg,
                self.context.conn().clone(),
                self.context.wait(),
            )),
            Ok(None) => Err(Error::Transport(TransportError::SubscriptionClosed)),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Server-side state of the consumer backing this subscription.
    pub async fn consumer_info(&self) -> Result<ConsumerInfo, Error> {
        if self.consumer.is_empty() {
            return Err(Error::WrongSubscriptionType);
        }
        if self.context.is_direct() {
            return Err(Error::DirectModeRequired);
        }
        self.context.consumer_info(&self.stream, &self.consumer).await
    }

    /// Removes the subscription. In non-direct mode the server-side
    /// consumer is deleted.
    pub async fn unsubscribe(mut self) -> Result<(), Error> {
        self.teardown(false).await
    }

    /// Gracefully stops delivery. Durable and attached consumers
    /// survive on the server.
    pub async fn drain(mut self) -> Result<(), Error> {
        self.teardown(true).await
    }

    async fn teardown(&mut self, drain_mode: bool) -> Result<(), Error> {
        match &mut self.mode {
            DeliveryMode::Dispatch { task } => task.abort(),
            DeliveryMode::Sync { sub } => {
                if drain_mode {
                    let _ = sub.drain().await;
                } else {
                    let _ = sub.unsubscribe().await;
                }
            }
            DeliveryMode::Pull => {}
        }

        if drain_mode && (self.durable || self.attached) {
            return Ok(());
        }
        if self.context.is_direct() {
            return Ok(());
        }
        self.context.delete_consumer(&self.stream, &self.consumer).await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let DeliveryMode::Dispatch { task } = &self.mode {
            task.abort();
        }
    }
}
