//! Default policy for the price history cache
//!
//! These are the reference values. Every one of them can be overridden at
//! runtime through [`CacheConfig`](crate::config::CacheConfig).

/// How long a cached history stays fresh (in minutes)
pub const CACHE_DURATION_MINS: u64 = 30;

/// Manual refreshes allowed per coin before refresh becomes a no-op
pub const MAX_REQUESTS_PER_COIN: u32 = 50;

/// Advertised budget reset window (in hours). Reported in status output only;
/// nothing resets the counters on this schedule.
pub const RATE_LIMIT_RESET_HOURS: u64 = 24;

/// How often the scheduled sweep re-fetches popular coins (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 30 * 60;

/// Upper bound on a single upstream fetch (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Coins eligible for the scheduled sweep
pub const POPULAR_COINS: &[&str] = &["bitcoin", "ethereum", "ripple", "cardano", "solana"];

/// Days of daily history requested per coin
pub const HISTORY_DAYS: u32 = 90;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Capacity of the cache event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "price-history-cache/0.1.0";
