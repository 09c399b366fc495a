//! # Price History Cache
//!
//! Fronts the CoinGecko market chart API with a time-bounded in-memory cache
//! so repeated requests for the same coin are served from memory instead of
//! spending upstream rate limit.
//!
//! ## Behaviour
//!
//! - A read for a coin whose history is missing or older than the cache
//!   duration (30 minutes by default) fetches synchronously first.
//! - Upstream failures are absorbed: readers get the previous history, or an
//!   empty one if the coin was never fetched. Failure details live in the
//!   status surface.
//! - Manual refreshes are capped per coin (50 by default). Once spent,
//!   refresh is a silent no-op. The 24 hour reset window shown in status
//!   output is advertised only; counters last until restart.
//! - A background sweep refetches the popular coins (bitcoin, ethereum,
//!   ripple, cardano, solana) that are already cached, every 30 minutes.
//!
//! ## Usage
//!
//! ```no_run
//! use price_history_cache::{CacheConfig, PriceHistoryCache, ScheduledRefresher};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(PriceHistoryCache::new(CacheConfig::from_env()?)?);
//! let _refresher = ScheduledRefresher::spawn(cache.clone());
//!
//! for sample in cache.get_history("bitcoin").await.iter() {
//!     println!("{} -> ${:.2}", sample.timestamp, sample.price);
//! }
//!
//! cache.refresh("bitcoin").await;
//! let status = cache.cache_status("bitcoin");
//! println!("{} requests used, rate limited: {}", status.request_count, status.is_rate_limited);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! get_history / refresh / force_fetch      ScheduledRefresher (every 30m)
//!              ↓                                     ↓
//!        PriceHistoryCache ── RequestBudget (manual refresh only)
//!              ↓
//!        HistoryProvider (CoinGecko, under fetch timeout)
//!              ↓
//!        HistoryStore (DashMap, whole-entry replace)
//! ```

pub mod budget;
pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use budget::RequestBudget;
pub use cache::{PriceHistoryCache, SweepReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{ConfigError, ProviderError};
pub use metrics::{FetchFailure, ProviderMetrics};
pub use provider::HistoryProvider;
pub use scheduler::ScheduledRefresher;
pub use status::{CacheStatus, ServiceStatus};
pub use store::HistoryStore;
pub use types::{
    CacheEntry, CacheEvent, ComponentHealth, FetchTrigger, HealthStatus, PopularCoin, Sample,
};
