//! Types for the price history cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One (timestamp, price) observation
///
/// Serialized as a two element array `[timestamp_ms, price]`, the shape the
/// upstream API and existing clients use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i64, f64)", into = "(i64, f64)")]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Price in USD
    pub price: f64,
}

impl Sample {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

impl From<(i64, f64)> for Sample {
    fn from((timestamp, price): (i64, f64)) -> Self {
        Self { timestamp, price }
    }
}

impl From<Sample> for (i64, f64) {
    fn from(sample: Sample) -> Self {
        (sample.timestamp, sample.price)
    }
}

/// Last successfully fetched history for a coin
///
/// Always replaced as a whole; the sample slice is shared, never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub samples: Arc<[Sample]>,
    pub fetched_at_millis: i64,
}

impl CacheEntry {
    pub fn new(samples: Vec<Sample>, fetched_at_millis: i64) -> Self {
        Self {
            samples: samples.into(),
            fetched_at_millis,
        }
    }

    /// Age of the entry at `now_millis`, never negative
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.fetched_at_millis).max(0)
    }

    /// True while the entry is no older than `max_age_millis`
    pub fn is_fresh(&self, now_millis: i64, max_age_millis: i64) -> bool {
        now_millis.saturating_sub(self.fetched_at_millis) <= max_age_millis
    }
}

/// Coins in the default scheduled-refresh allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PopularCoin {
    BTC,
    ETH,
    XRP,
    ADA,
    SOL,
}

impl PopularCoin {
    /// Get the coin symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            PopularCoin::BTC => "BTC",
            PopularCoin::ETH => "ETH",
            PopularCoin::XRP => "XRP",
            PopularCoin::ADA => "ADA",
            PopularCoin::SOL => "SOL",
        }
    }

    /// Get the CoinGecko ID, which is the cache key
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            PopularCoin::BTC => "bitcoin",
            PopularCoin::ETH => "ethereum",
            PopularCoin::XRP => "ripple",
            PopularCoin::ADA => "cardano",
            PopularCoin::SOL => "solana",
        }
    }

    pub fn all() -> &'static [PopularCoin] {
        &[
            PopularCoin::BTC,
            PopularCoin::ETH,
            PopularCoin::XRP,
            PopularCoin::ADA,
            PopularCoin::SOL,
        ]
    }

    /// Resolves user input such as "btc", "Bitcoin" or "xbt"
    ///
    /// The cache itself never normalizes keys; this is for callers that do.
    pub fn from_alias(input: &str) -> Option<Self> {
        let needle = input.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|coin| coin.aliases().contains(&needle.as_str()))
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            PopularCoin::BTC => &["btc", "bitcoin", "xbt"],
            PopularCoin::ETH => &["eth", "ethereum", "ether"],
            PopularCoin::XRP => &["xrp", "ripple"],
            PopularCoin::ADA => &["ada", "cardano"],
            PopularCoin::SOL => &["sol", "solana"],
        }
    }
}

/// What caused an upstream fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTrigger {
    /// Read found the entry missing or stale
    OnDemand,
    /// Budget-gated manual refresh
    Manual,
    /// Background sweep of popular coins
    Scheduled,
    /// Diagnostic fetch bypassing every gate
    Forced,
}

/// Cache events broadcast to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheEvent {
    /// A fetch succeeded and replaced the cached history
    HistoryCached {
        id: Uuid,
        coin_id: String,
        data_points: usize,
        fetched_at_millis: i64,
        trigger: FetchTrigger,
    },

    /// A fetch failed; the cached history was left as it was
    FetchFailed {
        id: Uuid,
        coin_id: String,
        error_message: String,
        trigger: FetchTrigger,
    },

    /// A manual refresh was dropped because the coin's budget is spent
    RefreshSkipped {
        id: Uuid,
        coin_id: String,
        request_count: u32,
    },
}

impl CacheEvent {
    pub fn id(&self) -> Uuid {
        match self {
            CacheEvent::HistoryCached { id, .. } => *id,
            CacheEvent::FetchFailed { id, .. } => *id,
            CacheEvent::RefreshSkipped { id, .. } => *id,
        }
    }

    pub fn coin_id(&self) -> &str {
        match self {
            CacheEvent::HistoryCached { coin_id, .. }
            | CacheEvent::FetchFailed { coin_id, .. }
            | CacheEvent::RefreshSkipped { coin_id, .. } => coin_id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::HistoryCached { .. } => "HISTORY_CACHED",
            CacheEvent::FetchFailed { .. } => "FETCH_FAILED",
            CacheEvent::RefreshSkipped { .. } => "REFRESH_SKIPPED",
        }
    }
}

impl std::fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheEvent::HistoryCached {
                coin_id,
                data_points,
                trigger,
                ..
            } => write!(
                f,
                "Cached {} data points for {} ({:?})",
                data_points, coin_id, trigger
            ),
            CacheEvent::FetchFailed {
                coin_id,
                error_message,
                ..
            } => write!(f, "Fetch failed for {}: {}", coin_id, error_message),
            CacheEvent::RefreshSkipped {
                coin_id,
                request_count,
                ..
            } => write!(
                f,
                "Refresh skipped for {} after {} requests",
                coin_id, request_count
            ),
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Cached data exists and all of it is fresh
    Healthy,
    /// Some cached coins are stale or out of budget
    Degraded,
    /// Nothing is cached
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    pub last_checked: DateTime<Utc>,
}
