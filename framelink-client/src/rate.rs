//! Sliding-window send rate limiter
//!
//! One window is shared by all outgoing messages of a client instance. The
//! policy is prune-then-check-then-append: a denied attempt never mutates
//! the window, so a burst of rejected sends cannot extend the lockout.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum sends within the trailing window
    pub ceiling: usize,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ceiling: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Ordered sequence of recent send timestamps.
#[derive(Debug)]
pub struct RateWindow {
    config: RateLimitConfig,
    entries: VecDeque<Instant>,
}

impl RateWindow {
    /// Create an empty window.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: VecDeque::new(),
        }
    }

    /// Admit or deny a send attempt at the current instant.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Number of sends currently recorded in the window.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the window holds no recorded sends.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn admit_at(&mut self, now: Instant) -> bool {
        let cutoff = now.checked_sub(self.config.window);
        while let Some(front) = self.entries.front() {
            match cutoff {
                Some(cutoff) if *front < cutoff => {
                    self.entries.pop_front();
                }
                _ => break,
            }
        }

        if self.entries.len() >= self.config.ceiling {
            return false;
        }

        self.entries.push_back(now);
        true
    }
}
