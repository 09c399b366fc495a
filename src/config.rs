//! Runtime configuration for the price history cache
//!
//! Defaults come from [`constants`](crate::constants). Values can be
//! overridden through `PRICE_CACHE_*` environment variables, deserialized
//! from any serde source, or set with the `with_*` builders.

use crate::{
    constants::{
        CACHE_DURATION_MINS, COINGECKO_API_URL, HISTORY_DAYS, MAX_REQUESTS_PER_COIN,
        POPULAR_COINS, RATE_LIMIT_RESET_HOURS, REFRESH_INTERVAL_SECS, REQUEST_TIMEOUT_SECS,
    },
    error::ConfigError,
};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

const ENV_CACHE_DURATION_MINS: &str = "PRICE_CACHE_DURATION_MINS";
const ENV_MAX_REQUESTS: &str = "PRICE_CACHE_MAX_REQUESTS_PER_COIN";
const ENV_RESET_HOURS: &str = "PRICE_CACHE_RATE_LIMIT_RESET_HOURS";
const ENV_REFRESH_INTERVAL_SECS: &str = "PRICE_CACHE_REFRESH_INTERVAL_SECS";
const ENV_POPULAR_COINS: &str = "PRICE_CACHE_POPULAR_COINS";
const ENV_FETCH_TIMEOUT_SECS: &str = "PRICE_CACHE_FETCH_TIMEOUT_SECS";
const ENV_COALESCE_FETCHES: &str = "PRICE_CACHE_COALESCE_FETCHES";
const ENV_HISTORY_DAYS: &str = "PRICE_CACHE_HISTORY_DAYS";
const ENV_API_URL: &str = "COINGECKO_API_URL";

/// Cache policy and upstream settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Minutes a cached history is served without refetching
    pub cache_duration_mins: u64,
    /// Manual refreshes allowed per coin
    pub max_requests_per_coin: u32,
    /// Advertised budget reset window; not enforced
    pub rate_limit_reset_hours: u64,
    /// Seconds between scheduled sweeps
    pub refresh_interval_secs: u64,
    /// Coins the scheduled sweep keeps warm
    pub popular_coins: Vec<String>,
    /// Seconds before an upstream fetch is abandoned
    pub fetch_timeout_secs: u64,
    /// Allow only one on-demand fetch per coin at a time
    pub coalesce_fetches: bool,
    /// Upstream API base URL
    pub api_base_url: String,
    /// Days of history requested per coin
    pub history_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_duration_mins: CACHE_DURATION_MINS,
            max_requests_per_coin: MAX_REQUESTS_PER_COIN,
            rate_limit_reset_hours: RATE_LIMIT_RESET_HOURS,
            refresh_interval_secs: REFRESH_INTERVAL_SECS,
            popular_coins: POPULAR_COINS.iter().map(|c| c.to_string()).collect(),
            fetch_timeout_secs: REQUEST_TIMEOUT_SECS,
            coalesce_fetches: false,
            api_base_url: COINGECKO_API_URL.to_string(),
            history_days: HISTORY_DAYS,
        }
    }
}

impl CacheConfig {
    /// Builds a config from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get(ENV_CACHE_DURATION_MINS) {
            config.cache_duration_mins = parse(ENV_CACHE_DURATION_MINS, &v)?;
        }
        if let Some(v) = get(ENV_MAX_REQUESTS) {
            config.max_requests_per_coin = parse(ENV_MAX_REQUESTS, &v)?;
        }
        if let Some(v) = get(ENV_RESET_HOURS) {
            config.rate_limit_reset_hours = parse(ENV_RESET_HOURS, &v)?;
        }
        if let Some(v) = get(ENV_REFRESH_INTERVAL_SECS) {
            config.refresh_interval_secs = parse(ENV_REFRESH_INTERVAL_SECS, &v)?;
        }
        if let Some(v) = get(ENV_POPULAR_COINS) {
            config.popular_coins = v
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get(ENV_FETCH_TIMEOUT_SECS) {
            config.fetch_timeout_secs = parse(ENV_FETCH_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_COALESCE_FETCHES) {
            config.coalesce_fetches = parse(ENV_COALESCE_FETCHES, &v.to_lowercase())?;
        }
        if let Some(v) = get(ENV_HISTORY_DAYS) {
            config.history_days = parse(ENV_HISTORY_DAYS, &v)?;
        }
        if let Some(v) = get(ENV_API_URL) {
            config.api_base_url = v.trim_end_matches('/').to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the cache cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_duration_mins == 0 {
            return Err(ConfigError::Zero {
                key: ENV_CACHE_DURATION_MINS,
            });
        }
        if self.max_requests_per_coin == 0 {
            return Err(ConfigError::Zero {
                key: ENV_MAX_REQUESTS,
            });
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Zero {
                key: ENV_REFRESH_INTERVAL_SECS,
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                key: ENV_FETCH_TIMEOUT_SECS,
            });
        }
        if self.history_days == 0 {
            return Err(ConfigError::Zero {
                key: ENV_HISTORY_DAYS,
            });
        }
        Ok(())
    }

    pub fn with_cache_duration_mins(mut self, mins: u64) -> Self {
        self.cache_duration_mins = mins;
        self
    }

    pub fn with_max_requests_per_coin(mut self, max: u32) -> Self {
        self.max_requests_per_coin = max;
        self
    }

    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn with_popular_coins<I, S>(mut self, coins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.popular_coins = coins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_coalesce_fetches(mut self, enabled: bool) -> Self {
        self.coalesce_fetches = enabled;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Cache duration in milliseconds, the unit staleness is computed in
    pub fn cache_duration_millis(&self) -> i64 {
        (self.cache_duration_mins as i64).saturating_mul(60_000)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, value, e))
}
