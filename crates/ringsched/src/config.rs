/// Tunable limits for a [`crate::scheduler::Scheduler`] /
/// [`crate::pubsub::PubSubManager`] pair, mirroring the `#define`d constants
/// of the source (`PUBSUB_MAX_TOPICS`, `PUBSUB_MESSAGE_QUEUE_SIZE`, ...).
///
/// Bounds are checked in [`Config::new`] the way the teacher's `Config`
/// checks `ring_bits`/`max_producers`: a constructor that panics on
/// out-of-range input rather than silently clamping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Hard cap on distinct topics.
    pub max_topics: usize,
    /// Hard cap on subscribers across all topics combined.
    pub max_subscribers: usize,
    /// Topic names are truncated to this many bytes (at a char boundary).
    pub max_topic_name: usize,
    /// Per-topic queue depth; usable capacity is `qsize - 1`.
    pub qsize: usize,
    /// Scheduler task table size.
    pub max_tasks: usize,
    /// Ring buffer capacity; must be a power of two.
    pub ringq_cap: usize,
    /// Whether to maintain the `Metrics` counters (a cheap no-op to disable
    /// on the most constrained hosts).
    pub enable_metrics: bool,
}

impl Config {
    /// Builds a `Config`, panicking if any bound is unusable.
    ///
    /// Panics if `qsize < 2`, `max_topic_name < 2`, any of `max_topics`,
    /// `max_subscribers`, `max_tasks` is zero, or `ringq_cap` is not a power
    /// of two.
    #[must_use]
    pub const fn new(
        max_topics: usize,
        max_subscribers: usize,
        max_topic_name: usize,
        qsize: usize,
        max_tasks: usize,
        ringq_cap: usize,
        enable_metrics: bool,
    ) -> Self {
        assert!(max_topics > 0, "max_topics must be at least 1");
        assert!(max_subscribers > 0, "max_subscribers must be at least 1");
        assert!(max_topic_name >= 2, "max_topic_name must be at least 2");
        assert!(qsize >= 2, "qsize must be at least 2");
        assert!(max_tasks > 0, "max_tasks must be at least 1");
        assert!(ringq_cap.is_power_of_two(), "ringq_cap must be a power of two");

        Self {
            max_topics,
            max_subscribers,
            max_topic_name,
            qsize,
            max_tasks,
            ringq_cap,
            enable_metrics,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

/// Matches the source's `#define` defaults exactly.
pub const DEFAULT_CONFIG: Config = Config::new(16, 32, 32, 64, 10, 2048, true);

/// A tighter preset for memory-constrained hosts: fewer topics, subscribers,
/// and tasks, and a smaller ring buffer, following the teacher's
/// `LOW_LATENCY_CONFIG`/`HIGH_THROUGHPUT_CONFIG` two-presets convention.
pub const EMBEDDED_CONFIG: Config = Config::new(4, 8, 16, 16, 4, 256, false);
