//! Provider abstraction for fetching price history from external APIs

use crate::{error::ProviderError, types::Sample};
use async_trait::async_trait;

/// Trait for upstream price history providers
///
/// Implementations return the samples in the order upstream produced them,
/// oldest first. The cache does not re-sort.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetches the price history for a single coin
    ///
    /// # Arguments
    /// * `coin_id` - The upstream coin identifier, e.g. "bitcoin"
    ///
    /// # Returns
    /// The ordered samples, or an error if the fetch fails or yields nothing
    async fn fetch_history(&self, coin_id: &str) -> Result<Vec<Sample>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
