//! Configuration for log email batching

use crate::utils::{get_env_with_prefix, parse_env};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How events are grouped into emails
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchingOptions {
    /// Maximum number of events in one email
    #[serde(default = "default_batch_size_limit")]
    pub batch_size_limit: usize,

    /// Interval between flushes in milliseconds; 0 sends as events arrive
    #[serde(default)]
    pub period_ms: u64,

    /// Events allowed to wait for the worker before new ones are dropped.
    /// `None` leaves the queue unbounded.
    #[serde(default = "default_queue_limit")]
    pub queue_limit: Option<usize>,

    /// Send the first event without waiting for the period
    #[serde(default = "default_eagerly_emit_first_event")]
    pub eagerly_emit_first_event: bool,
}

impl Default for BatchingOptions {
    fn default() -> Self {
        Self {
            batch_size_limit: default_batch_size_limit(),
            period_ms: 0,
            queue_limit: default_queue_limit(),
            eagerly_emit_first_event: default_eagerly_emit_first_event(),
        }
    }
}

impl BatchingOptions {
    pub fn batch_size_limit(mut self, limit: usize) -> Self {
        self.batch_size_limit = limit;
        self
    }

    /// Flush interval; sub-millisecond periods round up to one millisecond
    pub fn period(mut self, period: Duration) -> Self {
        self.period_ms = match u64::try_from(period.as_millis()) {
            Ok(0) if !period.is_zero() => 1,
            Ok(ms) => ms,
            Err(_) => u64::MAX,
        };
        self
    }

    pub fn queue_limit(mut self, limit: Option<usize>) -> Self {
        self.queue_limit = limit;
        self
    }

    pub fn eagerly_emit_first_event(mut self, eager: bool) -> Self {
        self.eagerly_emit_first_event = eager;
        self
    }

    /// Flush interval, zero when events are sent as they arrive
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Batch size with a floor of one event
    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size_limit.max(1)
    }

    /// Load batching options from environment variables
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(limit) = parse_env("EMAIL_BATCH_SIZE_LIMIT") {
            options.batch_size_limit = limit;
        }

        if let Some(period) = parse_env("EMAIL_PERIOD_MS") {
            options.period_ms = period;
        }

        // "none" or "0" lifts the limit
        if let Some(limit) = get_env_with_prefix("EMAIL_QUEUE_LIMIT") {
            options.queue_limit = match limit.trim().to_lowercase().as_str() {
                "none" | "0" => None,
                other => other.parse().ok().or(options.queue_limit),
            };
        }

        if let Some(eager) = parse_env("EMAIL_EAGER_FIRST_EVENT") {
            options.eagerly_emit_first_event = eager;
        }

        options
    }
}

fn default_batch_size_limit() -> usize {
    1
}

fn default_queue_limit() -> Option<usize> {
    Some(10_000)
}

fn default_eagerly_emit_first_event() -> bool {
    true
}
