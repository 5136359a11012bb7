//! Periodic Sampler / Rate Limiter
//!
//! Bounds log volume independently of how often producers update the state
//! holder: each log stream owns a [`RateLimiter`] and a record is written
//! only when its limiter permits.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use envsense_common::events::LogStream;

use crate::config::LogIntervals;

/// Minimum-spacing gate for one stream
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_emitted_at: Option<DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval: Duration::milliseconds(min_interval_ms.min(i64::MAX as u64) as i64),
            last_emitted_at: None,
        }
    }

    /// Permit an emission at `now`?
    ///
    /// True when nothing has been emitted yet or at least `min_interval` has
    /// passed (boundary inclusive). A permitted tick records `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let permitted = match self.last_emitted_at {
            None => true,
            Some(last) => now - last >= self.min_interval,
        };
        if permitted {
            self.last_emitted_at = Some(now);
        }
        permitted
    }

    pub fn last_emitted_at(&self) -> Option<DateTime<Utc>> {
        self.last_emitted_at
    }

    pub fn min_interval_ms(&self) -> i64 {
        self.min_interval.num_milliseconds()
    }

    pub fn reset(&mut self) {
        self.last_emitted_at = None;
    }
}

/// One limiter per log stream
#[derive(Debug, Clone)]
pub struct StreamSampler {
    limiters: HashMap<LogStream, RateLimiter>,
}

impl StreamSampler {
    pub fn new(intervals: &LogIntervals) -> Self {
        let limiters = LogStream::ALL
            .iter()
            .map(|stream| (*stream, RateLimiter::new(intervals.for_stream(*stream))))
            .collect();
        Self { limiters }
    }

    pub fn tick(&mut self, stream: LogStream, now: DateTime<Utc>) -> bool {
        self.limiters
            .get_mut(&stream)
            .map(|limiter| limiter.tick(now))
            .unwrap_or(false)
    }

    pub fn last_emitted_at(&self, stream: LogStream) -> Option<DateTime<Utc>> {
        self.limiters.get(&stream).and_then(|l| l.last_emitted_at())
    }

    pub fn reset(&mut self) {
        self.limiters.values_mut().for_each(RateLimiter::reset);
    }
}
