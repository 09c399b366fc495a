//! Per-coin request budget for manual refreshes
//!
//! Counts only grow. The reset window reported by the status surface is
//! advertised, not enforced; counters go back to zero on process restart.

use dashmap::DashMap;

#[derive(Debug)]
pub struct RequestBudget {
    counts: DashMap<String, u32>,
    max_requests: u32,
}

impl RequestBudget {
    pub fn new(max_requests: u32) -> Self {
        Self {
            counts: DashMap::new(),
            max_requests,
        }
    }

    /// Records one refresh attempt and returns the new count
    pub fn increment(&self, coin_id: &str) -> u32 {
        let mut count = self.counts.entry(coin_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Records an attempt only if the coin still has budget
    ///
    /// Check and increment happen under the same entry lock, so concurrent
    /// callers cannot push the count past the maximum. Returns the new count,
    /// or the current count when the budget is spent.
    pub fn try_acquire(&self, coin_id: &str) -> Result<u32, u32> {
        let mut count = self.counts.entry(coin_id.to_string()).or_insert(0);
        if *count >= self.max_requests {
            return Err(*count);
        }
        *count += 1;
        Ok(*count)
    }

    /// Attempts recorded for a coin, 0 if none
    pub fn count(&self, coin_id: &str) -> u32 {
        self.counts.get(coin_id).map_or(0, |count| *count)
    }

    pub fn is_limited(&self, coin_id: &str) -> bool {
        self.count(coin_id) >= self.max_requests
    }

    pub fn remaining(&self, coin_id: &str) -> u32 {
        self.max_requests.saturating_sub(self.count(coin_id))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn tracked_keys(&self) -> usize {
        self.counts.len()
    }
}
