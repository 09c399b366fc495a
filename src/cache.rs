//! Price history cache service
//!
//! Serves per-coin price history from memory, refetching from the upstream
//! provider when an entry is missing or older than the cache duration.
//! Upstream failures never reach readers: they get whatever is cached,
//! possibly nothing.

use crate::{
    budget::RequestBudget,
    clock::{Clock, SystemClock},
    config::CacheConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    error::ProviderError,
    metrics::FetchMetrics,
    provider::HistoryProvider,
    providers::CoinGeckoProvider,
    status::{CacheStatus, ServiceStatus},
    store::HistoryStore,
    types::{CacheEntry, CacheEvent, ComponentHealth, FetchTrigger, HealthStatus, Sample},
};
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Outcome of one scheduled sweep over the popular coins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Warm coins that were refetched successfully
    pub refreshed: Vec<String>,
    /// Warm coins whose refetch failed; their old history is kept
    pub failed: Vec<String>,
    /// Popular coins nobody has requested yet
    pub skipped_cold: Vec<String>,
}

/// Per-coin gate for coalesced on-demand fetches
///
/// `attempts` counts finished fetches, successful or not. A waiter that sees
/// it move while queued on `lock` takes that fetch's outcome as its own.
#[derive(Default)]
struct FetchSlot {
    lock: Mutex<()>,
    attempts: AtomicU64,
}

/// Price history cache
///
/// Construct once at startup and share behind an `Arc`. The store and budget
/// can be injected so several components observe the same state.
///
/// # Example
/// ```no_run
/// use price_history_cache::{CacheConfig, PriceHistoryCache, ScheduledRefresher};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = Arc::new(PriceHistoryCache::new(CacheConfig::from_env()?)?);
/// let _refresher = ScheduledRefresher::spawn(cache.clone());
///
/// let history = cache.get_history("bitcoin").await;
/// println!("bitcoin: {} samples", history.len());
/// # Ok(())
/// # }
/// ```
pub struct PriceHistoryCache {
    config: CacheConfig,
    store: Arc<HistoryStore>,
    budget: Arc<RequestBudget>,
    provider: Arc<dyn HistoryProvider>,
    clock: Arc<dyn Clock>,
    metrics: FetchMetrics,
    in_flight: DashMap<String, Arc<FetchSlot>>,
    events: broadcast::Sender<CacheEvent>,
}

impl PriceHistoryCache {
    /// Creates a cache backed by CoinGecko and the system clock
    pub fn new(config: CacheConfig) -> Result<Self, ProviderError> {
        let provider = Arc::new(CoinGeckoProvider::new(&config)?);
        Ok(Self::with_provider(config, provider, Arc::new(SystemClock)))
    }

    /// Creates a cache with a custom provider and clock
    pub fn with_provider(
        config: CacheConfig,
        provider: Arc<dyn HistoryProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(HistoryStore::new());
        let budget = Arc::new(RequestBudget::new(config.max_requests_per_coin));
        Self::from_parts(config, store, budget, provider, clock)
    }

    /// Creates a cache around an existing store and budget
    pub fn from_parts(
        config: CacheConfig,
        store: Arc<HistoryStore>,
        budget: Arc<RequestBudget>,
        provider: Arc<dyn HistoryProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let metrics = FetchMetrics::new(provider.provider_name());

        tracing::info!(
            provider = provider.provider_name(),
            cache_duration_mins = config.cache_duration_mins,
            max_requests_per_coin = budget.max_requests(),
            coalesce_fetches = config.coalesce_fetches,
            "Price history cache initialized"
        );

        Self {
            config,
            store,
            budget,
            provider,
            clock,
            metrics,
            in_flight: DashMap::new(),
            events,
        }
    }

    /// Returns the history for a coin, fetching first if missing or stale
    ///
    /// Never fails. A coin whose fetch failed keeps its previous history; a
    /// coin that was never fetched successfully yields an empty slice.
    pub async fn get_history(&self, coin_id: &str) -> Arc<[Sample]> {
        let now = self.clock.now_millis();

        if self
            .store
            .contains_fresh(coin_id, now, self.config.cache_duration_millis())
        {
            tracing::debug!(coin_id, "Serving cached price history");
        } else if self.config.coalesce_fetches {
            self.fetch_coalesced(coin_id).await;
        } else {
            tracing::debug!(coin_id, "Cache miss or expired, fetching");
            let _ = self.fetch_and_store(coin_id, FetchTrigger::OnDemand).await;
        }

        match self.store.get(coin_id) {
            Some(entry) => entry.samples.clone(),
            None => {
                tracing::warn!(coin_id, "No price history available");
                Arc::from(Vec::new())
            }
        }
    }

    /// Refetches a coin if its manual refresh budget allows
    ///
    /// A spent budget makes this a silent no-op, visible only through
    /// [`cache_status`](Self::cache_status) and the event stream. Otherwise
    /// one attempt is charged whether or not the fetch succeeds.
    pub async fn refresh(&self, coin_id: &str) {
        match self.budget.try_acquire(coin_id) {
            Ok(request_count) => {
                tracing::info!(coin_id, request_count, "Manual refresh");
                let _ = self.fetch_and_store(coin_id, FetchTrigger::Manual).await;
            }
            Err(request_count) => {
                tracing::warn!(
                    coin_id,
                    request_count,
                    max_requests = self.budget.max_requests(),
                    "Refresh skipped, request budget spent"
                );
                self.publish(CacheEvent::RefreshSkipped {
                    id: Uuid::new_v4(),
                    coin_id: coin_id.to_string(),
                    request_count,
                });
            }
        }
    }

    /// Fetches a coin now, ignoring staleness and budget
    ///
    /// Diagnostic entry point. Returns the number of samples cached, or the
    /// upstream error; either way the cache is in the same state a normal
    /// fetch would leave it.
    pub async fn force_fetch(&self, coin_id: &str) -> Result<usize, ProviderError> {
        self.fetch_and_store(coin_id, FetchTrigger::Forced)
            .await
            .map(|entry| entry.samples.len())
    }

    /// Refetches every popular coin that is already cached
    ///
    /// Ignores staleness and budget. Fetches run concurrently and fail
    /// independently.
    pub async fn sweep_popular(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut warm = Vec::new();

        for coin_id in &self.config.popular_coins {
            if self.store.contains(coin_id) {
                warm.push(coin_id.as_str());
            } else {
                report.skipped_cold.push(coin_id.clone());
            }
        }

        let results = join_all(
            warm.iter()
                .map(|&coin_id| self.fetch_and_store(coin_id, FetchTrigger::Scheduled)),
        )
        .await;

        for (coin_id, result) in warm.into_iter().zip(results) {
            match result {
                Ok(_) => report.refreshed.push(coin_id.to_string()),
                Err(_) => report.failed.push(coin_id.to_string()),
            }
        }

        report
    }

    /// Diagnostics for one coin
    pub fn cache_status(&self, coin_id: &str) -> CacheStatus {
        CacheStatus::collect(
            coin_id,
            &self.store,
            &self.budget,
            &self.metrics,
            &self.config,
            self.clock.now_millis(),
        )
    }

    /// Diagnostics for the whole cache
    pub async fn service_status(&self) -> ServiceStatus {
        ServiceStatus::collect(
            &self.store,
            &self.budget,
            &self.metrics,
            &self.config,
            self.clock.now_millis(),
        )
        .await
    }

    /// Perform a health check on the cache
    ///
    /// # Returns
    /// Unhealthy with nothing cached, Degraded when any cached coin is stale
    /// or out of budget, Healthy otherwise
    pub async fn health_check(&self) -> ComponentHealth {
        let status = self.service_status().await;

        let stale: Vec<&str> = status
            .coins
            .values()
            .filter(|c| c.is_stale)
            .map(|c| c.coin_id.as_str())
            .collect();
        let limited: Vec<&str> = status
            .coins
            .values()
            .filter(|c| c.is_rate_limited)
            .map(|c| c.coin_id.as_str())
            .collect();

        let health = if status.total_cached_coins == 0 {
            HealthStatus::Unhealthy
        } else if !stale.is_empty() || !limited.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match health {
            HealthStatus::Healthy => "Price history cache is serving fresh data".to_string(),
            HealthStatus::Degraded => format!(
                "{} stale and {} rate limited coins",
                stale.len(),
                limited.len()
            ),
            HealthStatus::Unhealthy => "No price history cached yet".to_string(),
        };

        let mut details = HashMap::new();
        details.insert(
            "cached_coins".to_string(),
            serde_json::json!(status.total_cached_coins),
        );
        details.insert("stale_coins".to_string(), serde_json::json!(stale));
        details.insert("rate_limited_coins".to_string(), serde_json::json!(limited));
        details.insert(
            "provider".to_string(),
            serde_json::json!(self.provider.provider_name()),
        );
        details.insert(
            "failing_coins".to_string(),
            serde_json::json!(self.metrics.failing_coins()),
        );
        details.insert(
            "success_rate".to_string(),
            serde_json::json!(status.provider.success_rate),
        );

        ComponentHealth {
            name: "price_history_cache".to_string(),
            status: health,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }

    /// Subscribes to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn budget(&self) -> &Arc<RequestBudget> {
        &self.budget
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// On-demand fetch with at most one upstream call per coin in flight
    ///
    /// Readers that queue behind a running fetch share its outcome, failure
    /// included, and then serve whatever the store holds. The slot is dropped
    /// after a successful fetch; slots of coins that keep failing stay until
    /// they succeed.
    async fn fetch_coalesced(&self, coin_id: &str) {
        let slot = self
            .in_flight
            .entry(coin_id.to_string())
            .or_default()
            .clone();
        let seen = slot.attempts.load(Ordering::Acquire);
        let _guard = slot.lock.lock().await;

        if slot.attempts.load(Ordering::Acquire) != seen {
            tracing::debug!(coin_id, "Sharing the result of a concurrent fetch");
            return;
        }

        let now = self.clock.now_millis();
        if self
            .store
            .contains_fresh(coin_id, now, self.config.cache_duration_millis())
        {
            tracing::debug!(coin_id, "Fetched by a concurrent reader");
            return;
        }

        let result = self.fetch_and_store(coin_id, FetchTrigger::OnDemand).await;
        slot.attempts.fetch_add(1, Ordering::AcqRel);

        if result.is_ok() {
            self.in_flight
                .remove_if(coin_id, |_, current| Arc::ptr_eq(current, &slot));
        }
    }

    /// Fetches from upstream under the timeout and replaces the entry on success
    ///
    /// Failures are logged, recorded, and broadcast; the cached entry is left
    /// untouched.
    async fn fetch_and_store(
        &self,
        coin_id: &str,
        trigger: FetchTrigger,
    ) -> Result<Arc<CacheEntry>, ProviderError> {
        let start = Instant::now();
        let timeout = self.config.fetch_timeout();

        let result =
            match tokio::time::timeout(timeout, self.provider.fetch_history(coin_id)).await {
                Ok(Ok(samples)) if samples.is_empty() => Err(ProviderError::empty_dataset(coin_id)),
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout { after: timeout }),
            };

        let latency = start.elapsed();
        let now = self.clock.now_millis();

        match result {
            Ok(samples) => {
                let entry = self.store.put(coin_id, samples, now);
                self.metrics.record_success(coin_id, latency).await;
                tracing::debug!(
                    coin_id,
                    ?trigger,
                    data_points = entry.samples.len(),
                    latency_ms = latency.as_millis() as u64,
                    "Cached price history"
                );
                self.publish(CacheEvent::HistoryCached {
                    id: Uuid::new_v4(),
                    coin_id: coin_id.to_string(),
                    data_points: entry.samples.len(),
                    fetched_at_millis: now,
                    trigger,
                });
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!(
                    coin_id,
                    ?trigger,
                    reason = e.reason(),
                    error = %e,
                    "Failed to fetch price history"
                );
                self.metrics.record_failure(coin_id, latency, &e, now).await;
                self.publish(CacheEvent::FetchFailed {
                    id: Uuid::new_v4(),
                    coin_id: coin_id.to_string(),
                    error_message: e.to_string(),
                    trigger,
                });
                Err(e)
            }
        }
    }

    fn publish(&self, event: CacheEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
