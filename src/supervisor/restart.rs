//! Worker respawn policy.
//!
//! # Responsibilities
//! - Bound respawns per worker slot with a sliding-window budget
//! - Pace respawns with exponential backoff + jitter
//!
//! # Design Decisions
//! - Budget over a window, not a lifetime cap: a slot that crashes rarely
//!   keeps recovering, a crash loop gets cut off
//! - Jittered backoff prevents restart storms when several workers die at once

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window restart budget for a single worker slot.
///
/// Each respawn spends one token; tokens return once they age out of the
/// window. An empty budget means the slot is left down.
#[derive(Debug)]
pub struct RestartBudget {
    max_restarts: u32,
    window: Duration,
    spent: VecDeque<Instant>,
}

impl RestartBudget {
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            spent: VecDeque::new(),
        }
    }

    /// Spend one respawn token. Returns false when the budget for the
    /// current window is exhausted.
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        while self
            .spent
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.window)
        {
            self.spent.pop_front();
        }
        if self.spent.len() as u32 >= self.max_restarts {
            return false;
        }
        self.spent.push_back(now);
        true
    }

    /// Tokens left in the current window.
    pub fn remaining(&self) -> u32 {
        let now = Instant::now();
        let used = self
            .spent
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count() as u32;
        self.max_restarts.saturating_sub(used)
    }
}

/// Calculate respawn backoff delay with jitter.
pub fn respawn_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        fastrand::u64(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
