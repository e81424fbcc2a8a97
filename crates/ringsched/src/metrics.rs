//! Structured observability counters, the teacher's answer to the absence of
//! a logging crate anywhere in its dependency family: plain atomics behind a
//! `Default`-derived struct with a handful of getters. All counters use
//! `Ordering::Relaxed` — they are purely statistical, guard no other data,
//! and have no happens-before relationship with the state they describe.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single [`crate::ringq::RingQ`].
#[derive(Debug, Default)]
pub struct RingqMetrics {
    pub pushed: AtomicU64,
    pub popped: AtomicU64,
    pub push_failures: AtomicU64,
    pub pop_failures: AtomicU64,
}

impl RingqMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    pub fn push_failures(&self) -> u64 {
        self.push_failures.load(Ordering::Relaxed)
    }

    pub fn pop_failures(&self) -> u64 {
        self.pop_failures.load(Ordering::Relaxed)
    }
}

/// Counters for a [`crate::scheduler::Scheduler`].
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub yields: AtomicU64,
    pub sleeps: AtomicU64,
    pub tasks_added: AtomicU64,
    pub tasks_completed: AtomicU64,
}

impl SchedulerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yields(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::Relaxed)
    }

    pub fn tasks_added(&self) -> u64 {
        self.tasks_added.load(Ordering::Relaxed)
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }
}

/// Counters for a [`crate::pubsub::PubSubManager`].
#[derive(Debug, Default)]
pub struct PubSubMetrics {
    pub messages_published: AtomicU64,
    pub messages_dropped_full: AtomicU64,
    pub callbacks_invoked: AtomicU64,
    pub adapter_forwards: AtomicU64,
    pub adapter_polls_ingested: AtomicU64,
}

impl PubSubMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    pub fn messages_dropped_full(&self) -> u64 {
        self.messages_dropped_full.load(Ordering::Relaxed)
    }

    pub fn callbacks_invoked(&self) -> u64 {
        self.callbacks_invoked.load(Ordering::Relaxed)
    }

    pub fn adapter_forwards(&self) -> u64 {
        self.adapter_forwards.load(Ordering::Relaxed)
    }

    pub fn adapter_polls_ingested(&self) -> u64 {
        self.adapter_polls_ingested.load(Ordering::Relaxed)
    }
}
