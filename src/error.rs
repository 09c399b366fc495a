//! Error types for the price history cache

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching history from an upstream provider
///
/// These never reach callers of the read path. The cache logs them, records
/// the reason against the coin, and keeps whatever it had before.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered 429
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Upstream answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Payload parsed but lacks an expected field
    #[error("Missing field '{0}' in response")]
    MissingField(&'static str),

    /// Payload could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Upstream returned no samples for the coin
    #[error("Empty price history for {coin_id}")]
    EmptyDataset { coin_id: String },

    /// Fetch did not complete within the configured bound
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// Configured API base URL is not an absolute URL with a path
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ProviderError {
    /// Creates an EmptyDataset error
    pub fn empty_dataset(coin_id: &str) -> Self {
        Self::EmptyDataset {
            coin_id: coin_id.to_string(),
        }
    }

    /// Short machine-friendly reason, used as a log field and in status output
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::RateLimitExceeded => "rate_limited",
            Self::Api { .. } => "bad_status",
            Self::MissingField(_) => "missing_field",
            Self::InvalidResponse(_) => "malformed",
            Self::EmptyDataset { .. } => "empty",
            Self::Timeout { .. } => "timeout",
            Self::InvalidBaseUrl { .. } => "invalid_base_url",
        }
    }
}

/// Errors raised while building a [`CacheConfig`](crate::config::CacheConfig)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// A value that must be positive was zero
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

impl ConfigError {
    /// Creates an InvalidValue error
    pub fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
