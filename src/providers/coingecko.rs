//! CoinGecko price history provider implementation

use crate::{
    config::CacheConfig,
    constants::USER_AGENT,
    error::ProviderError,
    provider::HistoryProvider,
    types::Sample,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// CoinGecko `market_chart` response
///
/// Only `prices` is used; `market_caps` and `total_volumes` are ignored.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Option<Vec<Vec<f64>>>,
}

/// CoinGecko price history provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: Url,
    history_days: u32,
    timeout: Duration,
}

impl CoinGeckoProvider {
    /// Creates a provider from the cache configuration
    pub fn new(config: &CacheConfig) -> Result<Self, ProviderError> {
        Self::with_settings(
            &config.api_base_url,
            config.history_days,
            config.fetch_timeout(),
        )
    }

    /// Creates a provider pointed at an explicit base URL
    pub fn with_settings(
        base_url: &str,
        history_days: u32,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::Network)?;

        let invalid = |reason: String| ProviderError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed =
            Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("cannot carry a path".to_string()));
        }

        Ok(Self {
            client,
            base_url: parsed,
            history_days,
            timeout,
        })
    }

    /// Client timeouts surface as `Timeout`, the same error the cache's own
    /// deadline produces
    fn map_request_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                after: self.timeout,
            }
        } else {
            ProviderError::Network(error)
        }
    }

    /// The coin id is a single escaped path segment, so `/`, `?` or `..` in
    /// it cannot reach another endpoint
    fn build_url(&self, coin_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["coins", coin_id, "market_chart"]);
        }
        url
    }

    /// Converts raw `[timestamp, price]` rows, keeping upstream order
    ///
    /// Rows with fewer than two values are dropped. CoinGecko sends
    /// timestamps as integers but they arrive as floats through JSON.
    fn parse_prices(coin_id: &str, body: &str) -> Result<Vec<Sample>, ProviderError> {
        let response: MarketChartResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse CoinGecko response for {}: {}",
                coin_id, e
            ))
        })?;

        let rows = response
            .prices
            .ok_or(ProviderError::MissingField("prices"))?;

        let samples: Vec<Sample> = rows
            .iter()
            .filter(|row| row.len() >= 2)
            .map(|row| Sample::new(row[0] as i64, row[1]))
            .collect();

        if samples.is_empty() {
            return Err(ProviderError::empty_dataset(coin_id));
        }

        Ok(samples)
    }
}

#[async_trait]
impl HistoryProvider for CoinGeckoProvider {
    async fn fetch_history(&self, coin_id: &str) -> Result<Vec<Sample>, ProviderError> {
        let url = self.build_url(coin_id);
        tracing::debug!(%url, coin_id, "Fetching price history from CoinGecko");

        let response = self
            .client
            .get(url)
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("days", self.history_days.to_string()),
                ("interval", "daily".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let samples = Self::parse_prices(coin_id, &body)?;

        tracing::debug!(
            coin_id,
            data_points = samples.len(),
            "Fetched price history from CoinGecko"
        );

        Ok(samples)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
