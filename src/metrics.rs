//! Upstream fetch metrics
//!
//! Tracks latency percentiles and success rate for the history provider, and
//! remembers the most recent failure per coin so the status surface can show
//! why a coin has no data.

use crate::error::ProviderError;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics snapshot for the provider
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    pub provider_name: String,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
}

impl ProviderMetrics {
    /// Creates metrics with no data
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
        }
    }
}

/// Most recent failed fetch for a coin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub reason: &'static str,
    pub message: String,
    pub at_millis: i64,
}

#[derive(Debug, Clone, Copy)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    window: VecDeque<LatencySample>,
    total: u64,
    failed: u64,
}

/// Collects fetch outcomes for one provider
pub struct FetchMetrics {
    provider_name: String,
    counters: RwLock<Counters>,
    /// Cleared per coin on success; keys that never succeed stay
    last_failures: DashMap<String, FetchFailure>,
}

impl FetchMetrics {
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            counters: RwLock::new(Counters {
                window: VecDeque::with_capacity(MAX_SAMPLES),
                ..Counters::default()
            }),
            last_failures: DashMap::new(),
        }
    }

    /// Records a successful fetch and clears the coin's last failure
    pub async fn record_success(&self, coin_id: &str, latency: Duration) {
        self.last_failures.remove(coin_id);
        self.record(latency, true).await;
    }

    /// Records a failed fetch against the coin
    pub async fn record_failure(
        &self,
        coin_id: &str,
        latency: Duration,
        error: &ProviderError,
        now_millis: i64,
    ) {
        self.last_failures.insert(
            coin_id.to_string(),
            FetchFailure {
                reason: error.reason(),
                message: error.to_string(),
                at_millis: now_millis,
            },
        );
        self.record(latency, false).await;
    }

    async fn record(&self, latency: Duration, success: bool) {
        let mut counters = self.counters.write().await;
        counters.total += 1;
        if !success {
            counters.failed += 1;
        }
        if counters.window.len() >= MAX_SAMPLES {
            counters.window.pop_front();
        }
        counters.window.push_back(LatencySample {
            duration_ms: latency.as_secs_f64() * 1000.0,
            success,
        });
    }

    pub fn last_failure(&self, coin_id: &str) -> Option<FetchFailure> {
        self.last_failures.get(coin_id).map(|f| f.value().clone())
    }

    /// Number of coins currently carrying a failure record
    pub fn failing_coins(&self) -> usize {
        self.last_failures.len()
    }

    /// Computes current metrics from collected samples
    pub async fn snapshot(&self) -> ProviderMetrics {
        let counters = self.counters.read().await;
        if counters.window.is_empty() {
            return ProviderMetrics::empty(&self.provider_name);
        }

        let mut latencies: Vec<f64> = counters
            .window
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let success_rate = if counters.total > 0 {
            (counters.total - counters.failed) as f64 / counters.total as f64
        } else {
            1.0
        };

        ProviderMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: counters.total,
            failed_requests: counters.failed,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
