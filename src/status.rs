//! Read-only diagnostics over the cache and budget state
//!
//! Each coin is read independently. A service status assembled while fetches
//! are landing can mix before and after values across coins.

use crate::{
    budget::RequestBudget,
    config::CacheConfig,
    metrics::{FetchFailure, FetchMetrics, ProviderMetrics},
    store::HistoryStore,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Diagnostics for a single coin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub coin_id: String,
    pub is_cached: bool,
    pub data_points: usize,
    /// Fetch time of the cached entry, ms since epoch
    pub last_updated: Option<i64>,
    /// Whole minutes since the cached entry was fetched
    pub cache_age_minutes: Option<i64>,
    pub is_stale: bool,
    pub request_count: u32,
    pub max_requests: u32,
    pub is_rate_limited: bool,
    pub cache_duration_minutes: u64,
    pub last_error: Option<FetchFailure>,
}

impl CacheStatus {
    pub(crate) fn collect(
        coin_id: &str,
        store: &HistoryStore,
        budget: &RequestBudget,
        metrics: &FetchMetrics,
        config: &CacheConfig,
        now_millis: i64,
    ) -> Self {
        let entry = store.get(coin_id);
        let max_age = config.cache_duration_millis();

        Self {
            coin_id: coin_id.to_string(),
            is_cached: entry.is_some(),
            data_points: entry.as_ref().map_or(0, |e| e.samples.len()),
            last_updated: entry.as_ref().map(|e| e.fetched_at_millis),
            cache_age_minutes: entry.as_ref().map(|e| e.age_millis(now_millis) / 60_000),
            is_stale: entry
                .as_ref()
                .is_none_or(|e| !e.is_fresh(now_millis, max_age)),
            request_count: budget.count(coin_id),
            max_requests: budget.max_requests(),
            is_rate_limited: budget.is_limited(coin_id),
            cache_duration_minutes: config.cache_duration_mins,
            last_error: metrics.last_failure(coin_id),
        }
    }
}

/// Service-wide summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub total_cached_coins: usize,
    pub cache_duration_minutes: u64,
    pub max_requests_per_coin: u32,
    /// Advertised only; counters are never reset on this schedule
    pub rate_limit_reset_hours: u64,
    /// Whole minutes, floored; sub-minute intervals read 0
    pub refresh_interval_minutes: u64,
    /// Exact sweep interval
    pub refresh_interval_seconds: u64,
    pub popular_coins: Vec<String>,
    pub provider: ProviderMetrics,
    /// Per-coin diagnostics for every cached coin
    pub coins: BTreeMap<String, CacheStatus>,
}

impl ServiceStatus {
    pub(crate) async fn collect(
        store: &HistoryStore,
        budget: &RequestBudget,
        metrics: &FetchMetrics,
        config: &CacheConfig,
        now_millis: i64,
    ) -> Self {
        let coins: BTreeMap<String, CacheStatus> = store
            .keys()
            .into_iter()
            .map(|coin_id| {
                let status =
                    CacheStatus::collect(&coin_id, store, budget, metrics, config, now_millis);
                (coin_id, status)
            })
            .collect();

        Self {
            total_cached_coins: coins.len(),
            cache_duration_minutes: config.cache_duration_mins,
            max_requests_per_coin: budget.max_requests(),
            rate_limit_reset_hours: config.rate_limit_reset_hours,
            refresh_interval_minutes: config.refresh_interval_secs / 60,
            refresh_interval_seconds: config.refresh_interval_secs,
            popular_coins: config.popular_coins.clone(),
            provider: metrics.snapshot().await,
            coins,
        }
    }
}
