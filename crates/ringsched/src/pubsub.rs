//! Multi-topic publish/subscribe bus, ported from the source's `pubsub.c`.
//!
//! Re-architected per two of the design notes: `PubSubMessage.value` becomes
//! a tagged [`Value`] instead of a reinterpreted pointer-width handle, and
//! the `(callback, user_data)` pair becomes a single closure that captures
//! its own state. The subscriber table's `active` flag is dropped in favor
//! of `Option<SubscriberSlot>` — Rust already has a type for "allocated or
//! not", so there is no need for the source's separate bool alongside it.

use std::any::Any;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::error::{Result, RtError};
use crate::invariants::debug_assert_queue_count_bounded;
use crate::metrics::PubSubMetrics;

/// A message payload. The source passed `value` as a pointer-width handle
/// the subscriber reinterpreted by heuristic (numeric vs. printable text);
/// here the producer tags it explicitly. `Text`/`Bytes`/`Opaque` are
/// `Arc`-backed so a subscriber can hold a cheap clone past the dispatch
/// call without the bus ever copying or owning the payload itself.
#[derive(Clone)]
pub enum Value {
    Number(u64),
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
    Opaque(Arc<dyn Any>),
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Value::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// `{ key, value }` exactly as the source's `PubSubMessage`. The bus never
/// interprets or frees `value`; it stores the handle by value.
#[derive(Clone, Debug)]
pub struct Message {
    pub key: i64,
    pub value: Value,
}

impl Message {
    #[must_use]
    pub fn new(key: i64, value: Value) -> Self {
        Self { key, value }
    }
}

/// The external-transport bridge: an outbound forwarder invoked after a
/// local enqueue, and an inbound drain invoked by `poll_adapter`.
pub struct Adapter {
    publish_out: Box<dyn FnMut(&str, &Message) -> bool>,
    poll_in: Box<dyn FnMut() -> Option<(String, Message)>>,
}

impl Adapter {
    pub fn new(
        publish_out: impl FnMut(&str, &Message) -> bool + 'static,
        poll_in: impl FnMut() -> Option<(String, Message)> + 'static,
    ) -> Self {
        Self {
            publish_out: Box::new(publish_out),
            poll_in: Box::new(poll_in),
        }
    }
}

struct TopicInner {
    queue: Vec<Option<Message>>,
    head: usize,
    tail: usize,
}

struct Topic {
    name: String,
    qsize: usize,
    inner: Mutex<TopicInner>,
}

impl Topic {
    fn new(name: String, qsize: usize) -> Self {
        Self {
            name,
            qsize,
            inner: Mutex::new(TopicInner {
                queue: vec![None; qsize],
                head: 0,
                tail: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TopicInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `msg`. Returns `false` without mutating if the queue is full
    /// (one slot reserved to distinguish full from empty).
    fn push(&self, msg: Message) -> bool {
        let mut inner = self.lock();
        let next_head = (inner.head + 1) % self.qsize;
        if next_head == inner.tail {
            return false;
        }
        let head = inner.head;
        inner.queue[head] = Some(msg);
        inner.head = next_head;
        let count = (inner.head + self.qsize - inner.tail) % self.qsize;
        debug_assert_queue_count_bounded!(count, self.qsize);
        true
    }

    fn pop(&self) -> Option<Message> {
        let mut inner = self.lock();
        if inner.head == inner.tail {
            return None;
        }
        let tail = inner.tail;
        let msg = inner.queue[tail].take();
        inner.tail = (tail + 1) % self.qsize;
        msg
    }

    fn len(&self) -> usize {
        let inner = self.lock();
        (inner.head + self.qsize - inner.tail) % self.qsize
    }

    fn clear(&self) {
        let mut inner = self.lock();
        for slot in &mut inner.queue {
            *slot = None;
        }
        inner.head = 0;
        inner.tail = 0;
    }
}

struct SubscriberSlot {
    topic_name: String,
    callback: Arc<dyn Fn(&str, &Message)>,
}

struct ManagerState {
    topics: Vec<Arc<Topic>>,
    subscribers: Vec<Option<SubscriberSlot>>,
    adapter: Option<Adapter>,
}

/// Topic registry, bounded per-topic queues, and subscriber dispatch.
///
/// The manager lock protects the topic table, the subscriber table, and the
/// adapter; each topic's own lock protects only its queue. Lock order is
/// always manager-then-topic, and both are released before any subscriber
/// callback runs — dispatch clones the matching callbacks' `Arc` handles out
/// from under the manager lock first, the same take-it-out-then-invoke
/// pattern the scheduler uses for polling task futures, so a callback that
/// calls back into `publish`/`subscribe` does not deadlock on a
/// already-held lock.
pub struct PubSubManager {
    config: Config,
    state: Mutex<ManagerState>,
    metrics: PubSubMetrics,
}

impl PubSubManager {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut subscribers = Vec::with_capacity(config.max_subscribers);
        subscribers.resize_with(config.max_subscribers, || None);
        Self {
            config,
            state: Mutex::new(ManagerState {
                topics: Vec::with_capacity(config.max_topics),
                subscribers,
                adapter: None,
            }),
            metrics: PubSubMetrics::new(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &PubSubMetrics {
        &self.metrics
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn normalize_topic_name(&self, raw: &str) -> Result<String> {
        if raw.is_empty() {
            return Err(RtError::InvalidArgument("topic name must not be empty".into()));
        }
        let limit = self.config.max_topic_name.saturating_sub(1);
        if raw.len() <= limit {
            return Ok(raw.to_string());
        }
        let mut end = limit;
        while end > 0 && !raw.is_char_boundary(end) {
            end -= 1;
        }
        Ok(raw[..end].to_string())
    }

    fn create_topic_locked(&self, state: &mut ManagerState, name: &str) -> Result<usize> {
        if let Some(pos) = state.topics.iter().position(|t| t.name == name) {
            return Ok(pos);
        }
        if state.topics.len() >= self.config.max_topics {
            return Err(RtError::ResourceExhausted { what: "topic table full" });
        }
        state
            .topics
            .push(Arc::new(Topic::new(name.to_string(), self.config.qsize)));
        Ok(state.topics.len() - 1)
    }

    /// Idempotent: creating an existing topic returns its existing id.
    pub fn create_topic(&self, name: &str) -> Result<usize> {
        let name = self.normalize_topic_name(name)?;
        let mut state = self.lock();
        self.create_topic_locked(&mut state, &name)
    }

    fn find_topic(&self, name: &str) -> Option<Arc<Topic>> {
        let state = self.lock();
        state.topics.iter().find(|t| t.name == name).cloned()
    }

    #[must_use]
    pub fn topic_exists(&self, name: &str) -> bool {
        self.find_topic(name).is_some()
    }

    /// Registers `callback` for `topic_name`, creating the topic first if
    /// it does not yet exist.
    pub fn subscribe<F>(&self, topic_name: &str, callback: F) -> Result<usize>
    where
        F: Fn(&str, &Message) + 'static,
    {
        let name = self.normalize_topic_name(topic_name)?;
        let mut state = self.lock();
        self.create_topic_locked(&mut state, &name)?;

        let slot_id = state.subscribers.iter().position(Option::is_none).ok_or(
            RtError::ResourceExhausted { what: "subscriber table full" },
        )?;
        state.subscribers[slot_id] = Some(SubscriberSlot {
            topic_name: name,
            callback: Arc::new(callback),
        });
        Ok(slot_id)
    }

    /// Deactivates a subscriber slot, freeing it for reuse. No further
    /// callbacks are delivered to it, even for messages already enqueued.
    pub fn unsubscribe(&self, id: usize) -> Result<()> {
        let mut state = self.lock();
        if id >= state.subscribers.len() {
            return Err(RtError::InvalidArgument(format!("subscriber id {id} out of range")));
        }
        state.subscribers[id] = None;
        Ok(())
    }

    fn publish_impl(&self, topic_name: &str, message: Message, forward_to_adapter: bool) -> bool {
        let Some(topic) = self.find_topic(topic_name) else {
            return false;
        };

        let forwardable = if forward_to_adapter { Some(message.clone()) } else { None };

        if !topic.push(message) {
            self.metrics.messages_dropped_full.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.metrics.messages_published.fetch_add(1, Ordering::Relaxed);

        if let Some(msg) = forwardable {
            let mut state = self.lock();
            if let Some(adapter) = state.adapter.as_mut() {
                if (adapter.publish_out)(topic_name, &msg) {
                    self.metrics.adapter_forwards.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        true
    }

    /// Enqueues `message` on `topic_name`. Returns `false` if the topic is
    /// unknown or its queue is full; callers retry or back off.
    pub fn publish(&self, topic_name: &str, message: Message) -> bool {
        self.publish_impl(topic_name, message, true)
    }

    /// Like [`publish`](Self::publish), but never invokes the outbound
    /// adapter — used by the inbound-adapter polling path to avoid
    /// publish/poll forwarding loops.
    pub fn publish_from_external(&self, topic_name: &str, message: Message) -> bool {
        self.publish_impl(topic_name, message, false)
    }

    /// Drains every message currently queued on `topic_name`, invoking each
    /// matching subscriber in subscriber-slot order for each message in FIFO
    /// order. No-op if the topic does not exist.
    pub fn process_topic(&self, name: &str) {
        let Some(topic) = self.find_topic(name) else {
            return;
        };

        loop {
            let Some(msg) = topic.pop() else { break };

            let callbacks: Vec<Arc<dyn Fn(&str, &Message)>> = {
                let state = self.lock();
                state
                    .subscribers
                    .iter()
                    .filter_map(|s| s.as_ref())
                    .filter(|s| s.topic_name == name)
                    .map(|s| Arc::clone(&s.callback))
                    .collect()
            };

            for cb in callbacks {
                cb(name, &msg);
                self.metrics.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Calls [`process_topic`](Self::process_topic) for every registered
    /// topic, in registration order.
    pub fn process_all(&self) {
        let names: Vec<String> = {
            let state = self.lock();
            state.topics.iter().map(|t| t.name.clone()).collect()
        };
        for name in names {
            self.process_topic(&name);
        }
    }

    #[must_use]
    pub fn queue_size(&self, name: &str) -> usize {
        self.find_topic(name).map_or(0, |t| t.len())
    }

    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        let state = self.lock();
        state
            .subscribers
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(|s| s.topic_name == name)
            .count()
    }

    pub fn clear_queue(&self, name: &str) {
        if let Some(topic) = self.find_topic(name) {
            topic.clear();
        }
    }

    /// Installs or clears the external bridge.
    pub fn set_adapter(&self, adapter: Option<Adapter>) {
        self.lock().adapter = adapter;
    }

    /// Drains the inbound adapter: while it yields a message, forward it
    /// via [`publish_from_external`](Self::publish_from_external). Stops
    /// when the adapter yields `None`.
    pub fn poll_adapter(&self) {
        loop {
            let next = {
                let mut state = self.lock();
                match state.adapter.as_mut() {
                    Some(adapter) => (adapter.poll_in)(),
                    None => None,
                }
            };
            let Some((topic, msg)) = next else { break };
            self.metrics.adapter_polls_ingested.fetch_add(1, Ordering::Relaxed);
            self.publish_from_external(&topic, msg);
        }
    }
}
