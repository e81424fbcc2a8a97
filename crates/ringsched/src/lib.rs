//! A small embedded-style runtime: a cooperative single-thread task
//! scheduler, a multi-topic publish/subscribe bus with deferred dispatch,
//! and the bounded power-of-two ring buffer the bus's queues are built on.
//!
//! Ported from a retro (cc65/6502) C runtime. The three pieces compose in
//! one direction only — `ringq` is a standalone primitive, `scheduler` does
//! not know about `pubsub`, and `pubsub` does not know about `scheduler`;
//! callers wire producer/subscriber logic into scheduler tasks themselves
//! (see `tests/scenarios.rs` for worked examples).

mod backoff;
mod config;
mod error;
mod invariants;
mod metrics;
mod pubsub;
mod ringq;
mod scheduler;

pub use backoff::Backoff;
pub use config::{Config, DEFAULT_CONFIG, EMBEDDED_CONFIG};
pub use error::{Result, RtError};
pub use metrics::{PubSubMetrics, RingqMetrics, SchedulerMetrics};
pub use pubsub::{Adapter, Message, PubSubManager, Value};
pub use ringq::RingQ;
pub use scheduler::{Scheduler, SchedulerHandle};
