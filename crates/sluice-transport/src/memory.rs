use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use sluice_core::headers::{STATUS_HDR, STATUS_NO_RESPONDERS};
use sluice_core::subject::is_valid_subject;
use sluice_core::{new_inbox, subject_matches, Message};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::connection::{BusConnection, BusSubscription, TransportError, DEFAULT_PENDING_LIMIT};

/// In-process bus for tests and simulations.
///
/// Implements subject wildcard matching, queue-group delivery (one
/// member per group), bounded per-subscription buffers, and
/// no-responder synthesis: a request into a subject with no interest
/// fails fast, and a reply-carrying publish into one produces a `503`
/// status message on the reply subject.
#[derive(Clone, Default)]
pub struct MemoryBus {
    shared: Arc<BusShared>,
}

#[derive(Default)]
struct BusShared {
    state: Mutex<BusState>,
    next_sid: AtomicU64,
}

#[derive(Default)]
struct BusState {
    subs: Vec<SubEntry>,
    rotation: u64,
}

struct SubEntry {
    sid: u64,
    subject: String,
    queue_group: Option<String>,
    tx: mpsc::Sender<Message>,
    delivered: u64,
    budget: Option<u64>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(
        &self,
        subject: &str,
        queue_group: Option<&str>,
        capacity: usize,
    ) -> Result<MemorySubscription, TransportError> {
        if !is_valid_subject(subject) {
            return Err(TransportError::InvalidSubject(subject.to_string()));
        }
        let sid = self.shared.next_sid.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(capacity);
        self.shared.state.lock().unwrap().subs.push(SubEntry {
            sid,
            subject: subject.to_string(),
            queue_group: queue_group.map(str::to_string),
            tx,
            delivered: 0,
            budget: None,
        });
        Ok(MemorySubscription {
            shared: Arc::clone(&self.shared),
            sid,
            subject: subject.to_string(),
            capacity,
            rx,
        })
    }
}

impl BusShared {
    /// Delivers `msg` to every matching subscription (one member per
    /// queue group) and returns how many buffers accepted it.
    fn deliver(&self, msg: &Message) -> usize {
        let mut state = self.state.lock().unwrap();
        let rotation = state.rotation as usize;
        state.rotation = state.rotation.wrapping_add(1);

        let chosen: Vec<usize> = {
            let mut direct = Vec::new();
            let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
            for (idx, entry) in state.subs.iter().enumerate() {
                if !subject_matches(&entry.subject, &msg.subject) {
                    continue;
                }
                match &entry.queue_group {
                    None => direct.push(idx),
                    Some(group) => groups.entry(group.clone()).or_default().push(idx),
                }
            }
            for members in groups.into_values() {
                direct.push(members[rotation % members.len()]);
            }
            direct
        };

        let mut accepted = 0;
        let mut gone: Vec<u64> = Vec::new();
        for idx in chosen {
            let entry = &mut state.subs[idx];
            match entry.tx.try_send(msg.clone()) {
                Ok(()) => {
                    entry.delivered += 1;
                    accepted += 1;
                    if entry.budget.is_some_and(|max| entry.delivered >= max) {
                        gone.push(entry.sid);
                    }
                }
                Err(TrySendError::Full(_)) => {
                    warn!(subject = %entry.subject, "delivery dropped: subscription buffer full");
                }
                Err(TrySendError::Closed(_)) => gone.push(entry.sid),
            }
        }
        if !gone.is_empty() {
            state.subs.retain(|entry| !gone.contains(&entry.sid));
        }
        accepted
    }
}

#[async_trait]
impl BusConnection for MemoryBus {
    fn new_inbox(&self) -> String {
        new_inbox()
    }

    async fn publish(&self, msg: Message) -> Result<(), TransportError> {
        let accepted = self.shared.deliver(&msg);
        if accepted == 0 {
            if let Some(reply) = &msg.reply {
                let mut status = Message::new(reply.clone(), Bytes::new());
                status.headers.set(STATUS_HDR, STATUS_NO_RESPONDERS);
                self.shared.deliver(&status);
            }
        }
        Ok(())
    }

    async fn request(&self, mut msg: Message) -> Result<Message, TransportError> {
        let inbox = new_inbox();
        let mut sub = self.open(&inbox, None, 8)?;
        msg.reply = Some(inbox);
        if self.shared.deliver(&msg) == 0 {
            return Err(TransportError::NoResponders);
        }
        match sub.rx.recv().await {
            Some(reply) => Ok(reply),
            None => Err(TransportError::SubscriptionClosed),
        }
    }

    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<Box<dyn BusSubscription>, TransportError> {
        Ok(Box::new(self.open(subject, queue_group, DEFAULT_PENDING_LIMIT)?))
    }
}

/// Subscription handle into a [`MemoryBus`].
pub struct MemorySubscription {
    shared: Arc<BusShared>,
    sid: u64,
    subject: String,
    capacity: usize,
    rx: mpsc::Receiver<Message>,
}

impl std::fmt::Debug for MemorySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySubscription")
            .field("sid", &self.sid)
            .field("subject", &self.subject)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl MemorySubscription {
    fn remove_interest(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.subs.retain(|entry| entry.sid != self.sid);
    }
}

#[async_trait]
impl BusSubscription for MemorySubscription {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    async fn auto_unsubscribe(&mut self, max: usize) -> Result<(), TransportError> {
        let mut state = self.shared.state.lock().unwrap();
        let mut exhausted = false;
        if let Some(entry) = state.subs.iter_mut().find(|entry| entry.sid == self.sid) {
            if entry.delivered >= max as u64 {
                exhausted = true;
            } else {
                entry.budget = Some(max as u64);
            }
        }
        if exhausted {
            state.subs.retain(|entry| entry.sid != self.sid);
        }
        Ok(())
    }

    fn pending_limit(&self) -> usize {
        self.capacity
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        self.remove_interest();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), TransportError> {
        self.remove_interest();
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.remove_interest();
    }
}
