use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sluice_core::headers::{
    DESCRIPTION_HDR, EXPECTED_LAST_MSG_ID_HDR, EXPECTED_LAST_SEQ_HDR, EXPECTED_STREAM_HDR,
    MSG_ID_HDR, STATUS_HDR, STATUS_NO_MESSAGES, STATUS_REQUEST_TIMEOUT,
};
use sluice_core::{subject_matches, Message};
use sluice_transport::{BusConnection, BusSubscription, MemoryBus, TransportError};
use sluice_wire::consumer::{
    ConsumerConfig, ConsumerInfo, CreateConsumerRequest, NextRequest, SequencePair,
};
use sluice_wire::policy::DeliverPolicy;
use sluice_wire::stream::{StreamNames, StreamNamesRequest};
use sluice_wire::subjects;
use sluice_wire::account::AccountInfo;
use tokio::task::JoinHandle;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_EXPIRES: Duration = Duration::from_secs(5);

/// In-process streaming server over a [`MemoryBus`].
pub struct StreamServer {
    shared: Arc<ServerShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct ServerShared {
    bus: MemoryBus,
    prefix: String,
    state: Mutex<ServerState>,
}

#[derive(Default)]
struct ServerState {
    streams: HashMap<String, StreamState>,
    ephemeral_seq: u64,
}

struct StreamState {
    name: String,
    subjects: Vec<String>,
    messages: Vec<StoredMessage>,
    dedup: HashMap<String, u64>,
    last_msg_id: Option<String>,
    consumers: HashMap<String, ConsumerState>,
}

struct StoredMessage {
    subject: String,
    headers: sluice_core::Headers,
    payload: Bytes,
    seq: u64,
    time: DateTime<Utc>,
}

struct ConsumerState {
    name: String,
    config: ConsumerConfig,
    created: DateTime<Utc>,
    /// Next stream sequence to consider for delivery.
    cursor: u64,
    consumer_seq: u64,
    acked: Vec<u64>,
    naks: Vec<u64>,
    terms: Vec<u64>,
    in_progress: u64,
}

impl StreamState {
    fn new(name: &str, subjects: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            messages: Vec::new(),
            dedup: HashMap::new(),
            last_msg_id: None,
            consumers: HashMap::new(),
        }
    }

    fn last_seq(&self) -> u64 {
        self.messages.last().map_or(0, |m| m.seq)
    }
}

impl ConsumerState {
    fn new(name: String, config: ConsumerConfig, stream: &StreamState) -> Self {
        let cursor = initial_cursor(&config, stream);
        Self {
            name,
            config,
            created: Utc::now(),
            cursor,
            consumer_seq: 0,
            acked: Vec::new(),
            naks: Vec::new(),
            terms: Vec::new(),
            in_progress: 0,
        }
    }

    fn pending(&self, stream: &StreamState) -> u64 {
        stream
            .messages
            .iter()
            .filter(|m| m.seq >= self.cursor)
            .filter(|m| filter_matches(&self.config.filter_subject, &m.subject))
            .count() as u64
    }

    fn info(&self, stream: &StreamState) -> ConsumerInfo {
        ConsumerInfo {
            stream: stream.name.clone(),
            name: self.name.clone(),
            created: self.created,
            config: self.config.clone(),
            delivered: SequencePair {
                consumer: self.consumer_seq,
                stream: self.cursor.saturating_sub(1),
            },
            ack_floor: SequencePair {
                consumer: self.acked.len() as u64,
                stream: self.acked.iter().copied().max().unwrap_or(0),
            },
            num_ack_pending: self.consumer_seq as i64 - self.acked.len() as i64,
            num_redelivered: self.naks.len() as i64,
            num_waiting: 0,
            num_pending: self.pending(stream),
            cluster: None,
        }
    }
}

fn initial_cursor(config: &ConsumerConfig, stream: &StreamState) -> u64 {
    let last = stream.last_seq();
    match config.deliver_policy {
        DeliverPolicy::All => 1,
        DeliverPolicy::Last => last.max(1),
        DeliverPolicy::New => last + 1,
        DeliverPolicy::ByStartSequence => config.opt_start_seq.max(1),
        DeliverPolicy::ByStartTime => {
            let start = config.opt_start_time.unwrap_or_else(Utc::now);
            stream
                .messages
                .iter()
                .find(|m| m.time >= start)
                .map_or(last + 1, |m| m.seq)
        }
    }
}

fn filter_matches(filter: &str, subject: &str) -> bool {
    filter.is_empty() || subject_matches(filter, subject)
}

fn ack_subject(stream: &str, consumer: &str, sseq: u64, cseq: u64, pending: u64) -> String {
    let ts = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}.{stream}.{consumer}.1.{sseq}.{cseq}.{ts}.{pending}", subjects::ACK_PREFIX)
}

fn json_bytes(value: &impl serde::Serialize) -> Bytes {
    Bytes::from(serde_json::to_vec(value).expect("serialize response"))
}

fn error_envelope(code: u64, description: &str) -> Bytes {
    json_bytes(&serde_json::json!({
        "error": { "code": code, "description": description }
    }))
}

fn status_message(subject: String, code: &str, description: &str) -> Message {
    let mut msg = Message::new(subject, Bytes::new());
    msg.headers.set(STATUS_HDR, code);
    msg.headers.set(DESCRIPTION_HDR, description);
    msg
}

impl StreamServer {
    /// Starts the server loops on `bus`.
    pub async fn start(bus: MemoryBus) -> Result<Self, TransportError> {
        let shared = Arc::new(ServerShared {
            bus: bus.clone(),
            prefix: subjects::DEFAULT_API_PREFIX.to_string(),
            state: Mutex::new(ServerState::default()),
        });

        let api_sub = bus
            .subscribe(&format!("{}>", shared.prefix), None)
            .await?;
        let ack_sub = bus
            .subscribe(&format!("{}.>", subjects::ACK_PREFIX), None)
            .await?;

        let tasks = Mutex::new(vec![
            tokio::spawn(api_loop(Arc::clone(&shared), api_sub)),
            tokio::spawn(ack_loop(Arc::clone(&shared), ack_sub)),
        ]);

        Ok(Self { shared, tasks })
    }

    /// Registers a stream bound to `subjects` and starts ingesting
    /// publishes on them.
    pub async fn add_stream(&self, name: &str, subjects: &[&str]) -> Result<(), TransportError> {
        {
            let mut state = self.shared.state.lock().unwrap();
            state
                .streams
                .insert(name.to_string(), StreamState::new(name, subjects));
        }
        for pattern in subjects {
            let sub = self.shared.bus.subscribe(pattern, None).await?;
            let task = tokio::spawn(ingest_loop(
                Arc::clone(&self.shared),
                name.to_string(),
                sub,
            ));
            self.tasks.lock().unwrap().push(task);
        }
        Ok(())
    }

    /// Pre-creates a consumer, as if a prior session had made it.
    pub async fn add_consumer(&self, stream: &str, config: ConsumerConfig) {
        let deliveries = {
            let mut state = self.shared.state.lock().unwrap();
            let name = if config.durable.is_empty() {
                state_ephemeral_name(&mut state.ephemeral_seq)
            } else {
                config.durable.clone()
            };
            let Some(stream_state) = state.streams.get_mut(stream) else {
                return;
            };
            let consumer = ConsumerState::new(name.clone(), config, stream_state);
            stream_state.consumers.insert(name, consumer);
            drain_push(stream_state)
        };
        for delivery in deliveries {
            let _ = self.shared.bus.publish(delivery).await;
        }
    }

    pub fn message_count(&self, stream: &str) -> usize {
        let state = self.shared.state.lock().unwrap();
        state.streams.get(stream).map_or(0, |s| s.messages.len())
    }

    pub fn has_consumer(&self, stream: &str, consumer: &str) -> bool {
        let state = self.shared.state.lock().unwrap();
        state
            .streams
            .get(stream)
            .is_some_and(|s| s.consumers.contains_key(consumer))
    }

    pub fn consumer_names(&self, stream: &str) -> Vec<String> {
        let state = self.shared.state.lock().unwrap();
        state
            .streams
            .get(stream)
            .map(|s| s.consumers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stream sequences terminally acknowledged with `+ACK`.
    pub fn acked(&self, stream: &str, consumer: &str) -> Vec<u64> {
        self.with_consumer(stream, consumer, |c| c.acked.clone())
    }

    pub fn naks(&self, stream: &str, consumer: &str) -> Vec<u64> {
        self.with_consumer(stream, consumer, |c| c.naks.clone())
    }

    pub fn terms(&self, stream: &str, consumer: &str) -> Vec<u64> {
        self.with_consumer(stream, consumer, |c| c.terms.clone())
    }

    pub fn in_progress_count(&self, stream: &str, consumer: &str) -> u64 {
        self.with_consumer(stream, consumer, |c| c.in_progress)
    }

    fn with_consumer<T: Default>(
        &self,
        stream: &str,
        consumer: &str,
        f: impl FnOnce(&ConsumerState) -> T,
    ) -> T {
        let state = self.shared.state.lock().unwrap();
        state
            .streams
            .get(stream)
            .and_then(|s| s.consumers.get(consumer))
            .map(f)
            .unwrap_or_default()
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

fn state_ephemeral_name(counter: &mut u64) -> String {
    *counter += 1;
    format!("eph-{counter}")
}

async fn ingest_loop(shared: Arc<ServerShared>, stream: String, mut sub: Box<dyn BusSubscription>) {
    while let Some(msg) = sub.next().await {
        let outgoing = shared.ingest(&stream, msg);
        for out in outgoing {
            let _ = shared.bus.publish(out).await;
        }
    }
}

async fn api_loop(shared: Arc<ServerShared>, mut sub: Box<dyn BusSubscription>) {
    while let Some(msg) = sub.next().await {
        if msg.reply.is_none() {
            continue;
        }
        let Some(verb) = msg
            .subject
            .strip_prefix(&shared.prefix)
            .map(str::to_string)
        else {
            continue;
        };
        handle_api(&shared, &verb, msg).await;
    }
}

async fn handle_api(shared: &Arc<ServerShared>, verb: &str, msg: Message) {
    let reply = msg.reply.clone().unwrap_or_default();

    if verb == subjects::ACCOUNT_INFO {
        let payload = {
            let state = shared.state.lock().unwrap();
            let consumers = state.streams.values().map(|s| s.consumers.len()).sum::<usize>();
            json_bytes(&AccountInfo {
                streams: state.streams.len() as u64,
                consumers: consumers as u64,
                ..AccountInfo::default()
            })
        };
        let _ = shared.bus.publish(Message::new(reply, payload)).await;
        return;
    }

    if verb == subjects::STREAM_NAMES {
        let request: StreamNamesRequest = sluice_wire::decode(&msg.payload).unwrap_or_default();
        let payload = {
            let state = shared.state.lock().unwrap();
            let names: Vec<String> = state
                .streams
                .values()
                .filter(|s| {
                    request.subject.is_empty()
                        || s.subjects
                            .iter()
                            .any(|pattern| subject_matches(pattern, &request.subject))
                })
                .map(|s| s.name.clone())
                .collect();
            json_bytes(&StreamNames {
                total: names.len() as i64,
                streams: Some(names),
                offset: 0,
                limit: 0,
            })
        };
        let _ = shared.bus.publish(Message::new(reply, payload)).await;
        return;
    }

    if let Some(rest) = verb.strip_prefix("CONSUMER.DURABLE.CREATE.") {
        match rest.split_once('.') {
            Some((stream, _durable)) => {
                let outgoing = shared.create_consumer(stream, &msg.payload, &reply);
                for out in outgoing {
                    let _ = shared.bus.publish(out).await;
                }
            }
            None => {
                let _ = shared
                    .bus
                    .publish(Message::new(reply, error_envelope(400, "bad subject")))
                    .await;
            }
        }
        return;
    }

    if let Some(stream) = verb.strip_prefix("CONSUMER.CREATE.") {
        let outgoing = shared.create_consumer(stream, &msg.payload, &reply);
        for out in outgoing {
            let _ = shared.bus.publish(out).await;
        }
        return;
    }

    if let Some(rest) = verb.strip_prefix("CONSUMER.INFO.") {
        let payload = match rest.split_once('.') {
            Some((stream, consumer)) => shared.consumer_info(stream, consumer),
            None => error_envelope(400, "bad subject"),
        };
        let _ = shared.bus.publish(Message::new(reply, payload)).await;
        return;
    }

    if let Some(rest) = verb.strip_prefix("CONSUMER.DELETE.") {
        let payload = match rest.split_once('.') {
            Some((stream, consumer)) => shared.delete_consumer(stream, consumer),
            None => error_envelope(400, "bad subject"),
        };
        let _ = shared.bus.publish(Message::new(reply, payload)).await;
        return;
    }

    if let Some(rest) = verb.strip_prefix("CONSUMER.MSG.NEXT.") {
        if let Some((stream, consumer)) = rest.split_once('.') {
            let request: NextRequest = sluice_wire::decode(&msg.payload).unwrap_or(NextRequest {
                batch: 1,
                ..NextRequest::default()
            });
            tokio::spawn(service_pull(
                Arc::clone(shared),
                stream.to_string(),
                consumer.to_string(),
                request,
                reply,
            ));
        }
        return;
    }

    debug!(verb, "unhandled api verb");
    let _ = shared
        .bus
        .publish(Message::new(reply, error_envelope(404, "unknown api request")))
        .await;
}

async fn ack_loop(shared: Arc<ServerShared>, mut sub: Box<dyn BusSubscription>) {
    while let Some(msg) = sub.next().await {
        let outgoing = shared.handle_ack(&msg);
        for out in outgoing {
            let _ = shared.bus.publish(out).await;
        }
    }
}

/// Services one pull next-request: an immediate pass, then either a
/// no-wait termination or a long-poll that expires server-side.
async fn service_pull(
    shared: Arc<ServerShared>,
    stream: String,
    consumer: String,
    request: NextRequest,
    reply: String,
) {
    let batch = request.batch.max(1);
    let mut remaining = batch;

    let Some(deliveries) = shared.take_available(&stream, &consumer, remaining, &reply) else {
        let _ = shared
            .bus
            .publish(Message::new(
                reply,
                error_envelope(404, "consumer not found"),
            ))
            .await;
        return;
    };
    remaining -= deliveries.len();
    for delivery in deliveries {
        let _ = shared.bus.publish(delivery).await;
    }

    if request.no_wait {
        if remaining > 0 {
            let _ = shared
                .bus
                .publish(status_message(reply, STATUS_NO_MESSAGES, "No Messages"))
                .await;
        }
        return;
    }
    if remaining == 0 {
        return;
    }

    let deadline = tokio::time::Instant::now() + request.expires.unwrap_or(DEFAULT_EXPIRES);
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        if tokio::time::Instant::now() >= deadline {
            let _ = shared
                .bus
                .publish(status_message(
                    reply,
                    STATUS_REQUEST_TIMEOUT,
                    "Request Timeout",
                ))
                .await;
            return;
        }
        let Some(deliveries) = shared.take_available(&stream, &consumer, remaining, &reply) else {
            return;
        };
        remaining -= deliveries.len();
        for delivery in deliveries {
            let _ = shared.bus.publish(delivery).await;
        }
        if remaining == 0 {
            return;
        }
    }
}

impl ServerShared {
    /// Stores one published message, answering its acknowledgment and
    /// fanning out push deliveries.
    fn ingest(&self, stream_name: &str, msg: Message) -> Vec<Message> {
        let mut out = Vec::new();
        let mut state = self.state.lock().unwrap();
        let Some(stream) = state.streams.get_mut(stream_name) else {
            return out;
        };
        let reply = msg.reply.clone();

        if let Some(id) = msg.headers.get(MSG_ID_HDR) {
            if let Some(seq) = stream.dedup.get(id) {
                if let Some(reply) = reply {
                    out.push(Message::new(reply, pub_ack(stream_name, *seq, true)));
                }
                return out;
            }
        }

        if let Some(expected) = msg.headers.get(EXPECTED_STREAM_HDR) {
            if expected != stream_name {
                if let Some(reply) = reply {
                    out.push(Message::new(
                        reply,
                        error_envelope(400, "expected stream does not match"),
                    ));
                }
                return out;
            }
        }
        if let Some(expected) = msg.headers.get(EXPECTED_LAST_SEQ_HDR) {
            let last = stream.last_seq();
            if expected.parse::<u64>().ok() != Some(last) {
                if let Some(reply) = reply {
                    out.push(Message::new(
                        reply,
                        error_envelope(400, &format!("wrong last sequence: {last}")),
                    ));
                }
                return out;
            }
        }
        if let Some(expected) = msg.headers.get(EXPECTED_LAST_MSG_ID_HDR) {
            if Some(expected) != stream.last_msg_id.as_deref() {
                if let Some(reply) = reply {
                    out.push(Message::new(
                        reply,
                        error_envelope(400, "wrong last msg ID"),
                    ));
                }
                return out;
            }
        }

        let seq = stream.last_seq() + 1;
        if let Some(id) = msg.headers.get(MSG_ID_HDR) {
            stream.dedup.insert(id.to_string(), seq);
            stream.last_msg_id = Some(id.to_string());
        } else {
            stream.last_msg_id = None;
        }
        stream.messages.push(StoredMessage {
            subject: msg.subject.clone(),
            headers: msg.headers.clone(),
            payload: msg.payload.clone(),
            seq,
            time: Utc::now(),
        });

        if let Some(reply) = reply {
            out.push(Message::new(reply, pub_ack(stream_name, seq, false)));
        }

        out.extend(drain_push(stream));
        out
    }

    fn create_consumer(&self, stream_name: &str, payload: &[u8], reply: &str) -> Vec<Message> {
        let mut state = self.state.lock().unwrap();
        let request: CreateConsumerRequest = match sluice_wire::decode(payload) {
            Ok(request) => request,
            Err(_) => {
                return vec![Message::new(
                    reply.to_string(),
                    error_envelope(400, "bad request"),
                )]
            }
        };
        let name = if request.config.durable.is_empty() {
            state_ephemeral_name(&mut state.ephemeral_seq)
        } else {
            request.config.durable.clone()
        };
        let Some(stream) = state.streams.get_mut(stream_name) else {
            return vec![Message::new(
                reply.to_string(),
                error_envelope(404, "stream not found"),
            )];
        };

        let consumer = ConsumerState::new(name.clone(), request.config, stream);
        let info = consumer.info(stream);
        stream.consumers.insert(name, consumer);

        let mut out = vec![Message::new(reply.to_string(), json_bytes(&info))];
        out.extend(drain_push(stream));
        out
    }

    fn consumer_info(&self, stream_name: &str, consumer_name: &str) -> Bytes {
        let state = self.state.lock().unwrap();
        let Some(stream) = state.streams.get(stream_name) else {
            return error_envelope(404, "stream not found");
        };
        match stream.consumers.get(consumer_name) {
            Some(consumer) => json_bytes(&consumer.info(stream)),
            None => error_envelope(404, "consumer not found"),
        }
    }

    fn delete_consumer(&self, stream_name: &str, consumer_name: &str) -> Bytes {
        let mut state = self.state.lock().unwrap();
        let Some(stream) = state.streams.get_mut(stream_name) else {
            return error_envelope(404, "stream not found");
        };
        if stream.consumers.remove(consumer_name).is_some() {
            json_bytes(&serde_json::json!({ "success": true }))
        } else {
            error_envelope(404, "consumer not found")
        }
    }

    /// Advances the consumer cursor, returning up to `max` deliveries
    /// addressed to `deliver_to`. `None` means the consumer is gone.
    fn take_available(
        &self,
        stream_name: &str,
        consumer_name: &str,
        max: usize,
        deliver_to: &str,
    ) -> Option<Vec<Message>> {
        let mut state = self.state.lock().unwrap();
        let stream = state.streams.get_mut(stream_name)?;
        let last = stream.messages.last().map_or(0, |m| m.seq);
        let consumer = stream.consumers.get_mut(consumer_name)?;

        let mut out = Vec::new();
        while out.len() < max && consumer.cursor <= last {
            let idx = (consumer.cursor - 1) as usize;
            consumer.cursor += 1;
            let stored = &stream.messages[idx];
            if !filter_matches(&consumer.config.filter_subject, &stored.subject) {
                continue;
            }
            consumer.consumer_seq += 1;
            let mut delivery = Message::new(deliver_to.to_string(), stored.payload.clone());
            delivery.headers = stored.headers.clone();
            delivery.reply = Some(ack_subject(
                stream_name,
                &consumer.name,
                stored.seq,
                consumer.consumer_seq,
                last - stored.seq,
            ));
            out.push(delivery);
        }
        Some(out)
    }

    fn handle_ack(&self, msg: &Message) -> Vec<Message> {
        let mut out = Vec::new();
        let tokens: Vec<&str> = msg.subject.split('.').collect();
        if tokens.len() != 9 {
            return out;
        }
        let (stream_name, consumer_name) = (tokens[2], tokens[3]);
        let sseq: u64 = tokens[5].parse().unwrap_or_default();

        {
            let mut state = self.state.lock().unwrap();
            if let Some(consumer) = state
                .streams
                .get_mut(stream_name)
                .and_then(|s| s.consumers.get_mut(consumer_name))
            {
                match &msg.payload[..] {
                    b"+ACK" | b"" => consumer.acked.push(sseq),
                    b"-NAK" => {
                        consumer.naks.push(sseq);
                        // redeliver from the rejected message onward
                        consumer.cursor = consumer.cursor.min(sseq);
                    }
                    b"+TERM" => consumer.terms.push(sseq),
                    b"+WPI" => consumer.in_progress += 1,
                    _ => {}
                }
            }
        }

        if let Some(reply) = &msg.reply {
            out.push(Message::new(reply.clone(), Bytes::new()));
        }
        out
    }
}

/// Fans stored messages out to push consumers whose cursor is behind.
fn drain_push(stream: &mut StreamState) -> Vec<Message> {
    let mut out = Vec::new();
    let stream_name = stream.name.clone();
    let last = stream.messages.last().map_or(0, |m| m.seq);
    for consumer in stream.consumers.values_mut() {
        if consumer.config.deliver_subject.is_empty() {
            continue;
        }
        while consumer.cursor <= last {
            let idx = (consumer.cursor - 1) as usize;
            consumer.cursor += 1;
            let stored = &stream.messages[idx];
            if !filter_matches(&consumer.config.filter_subject, &stored.subject) {
                continue;
            }
            consumer.consumer_seq += 1;
            let mut delivery = Message::new(
                consumer.config.deliver_subject.clone(),
                stored.payload.clone(),
            );
            delivery.headers = stored.headers.clone();
            delivery.reply = Some(ack_subject(
                &stream_name,
                &consumer.name,
                stored.seq,
                consumer.consumer_seq,
                last - stored.seq,
            ));
            out.push(delivery);
        }
    }
    out
}

fn pub_ack(stream: &str, seq: u64, duplicate: bool) -> Bytes {
    json_bytes(&sluice_wire::stream::PubAck {
        stream: stream.to_string(),
        seq,
        duplicate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_cursor_follows_deliver_policy() {
        let mut stream = StreamState::new("S", &["S.>"]);
        for seq in 1..=3 {
            stream.messages.push(StoredMessage {
                subject: format!("S.{seq}"),
                headers: sluice_core::Headers::new(),
                payload: Bytes::new(),
                seq,
                time: Utc::now(),
            });
        }

        let cfg = |policy| ConsumerConfig {
            deliver_policy: policy,
            ..ConsumerConfig::default()
        };
        assert_eq!(initial_cursor(&cfg(DeliverPolicy::All), &stream), 1);
        assert_eq!(initial_cursor(&cfg(DeliverPolicy::Last), &stream), 3);
        assert_eq!(initial_cursor(&cfg(DeliverPolicy::New), &stream), 4);
        let by_seq = ConsumerConfig {
            deliver_policy: DeliverPolicy::ByStartSequence,
            opt_start_seq: 2,
            ..ConsumerConfig::default()
        };
        assert_eq!(initial_cursor(&by_seq, &stream), 2);
    }

    #[test]
    fn ack_subjects_have_nine_tokens() {
        let subject = ack_subject("S", "c", 42, 7, 3);
        assert_eq!(subject.split('.').count(), 9);
        assert!(subject.starts_with("$JS.ACK.S.c.1.42.7."));
        assert!(subject.ends_with(".3"));
    }

    #[test]
    fn filter_matching_treats_empty_as_wildcard() {
        assert!(filter_matches("", "anything"));
        assert!(filter_matches("ORDERS.*", "ORDERS.new"));
        assert!(!filter_matches("ORDERS.new", "ORDERS.old"));
    }
}
