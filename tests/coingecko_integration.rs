use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use price_history_cache::providers::CoinGeckoProvider;
use price_history_cache::{
    CacheConfig, HistoryProvider, ManualClock, PriceHistoryCache, ProviderError, Sample,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(server: &MockServer) -> CacheConfig {
    CacheConfig::default()
        .with_api_base_url(server.uri())
        .with_fetch_timeout_secs(1)
}

fn build_cache(server: &MockServer, clock: Arc<ManualClock>) -> PriceHistoryCache {
    let config = config_for(server);
    let provider = Arc::new(CoinGeckoProvider::new(&config).unwrap());
    PriceHistoryCache::with_provider(config, provider, clock)
}

fn market_chart(prices: serde_json::Value) -> serde_json::Value {
    json!({
        "prices": prices,
        "market_caps": [],
        "total_volumes": []
    })
}

#[tokio::test]
async fn test_fetch_history_sends_expected_query() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .and(query_param("vs_currency", "usd"))
        .and(query_param("days", "90"))
        .and(query_param("interval", "daily"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(market_chart(json!([[1000, 100.0], [2000, 110.0]]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new(&config_for(&server)).unwrap();
    let samples = provider.fetch_history("bitcoin").await.unwrap();

    assert_eq!(
        samples,
        vec![Sample::new(1000, 100.0), Sample::new(2000, 110.0)]
    );
}

#[tokio::test]
async fn test_cache_serves_repeat_reads_from_memory() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/ethereum/market_chart"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(market_chart(json!([[1000, 3000.0]]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(1_000));
    let cache = build_cache(&server, clock.clone());

    assert_eq!(cache.get_history("ethereum").await.len(), 1);
    clock.advance(29 * 60_000);
    assert_eq!(cache.get_history("ethereum").await.len(), 1);

    let status = cache.cache_status("ethereum");
    assert_eq!(status.cache_age_minutes, Some(29));
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_rate_limited_upstream_yields_empty_history() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let cache = build_cache(&server, Arc::new(ManualClock::new(0)));

    assert!(cache.get_history("bitcoin").await.is_empty());
    let status = cache.cache_status("bitcoin");
    assert!(!status.is_cached);
    assert_eq!(status.last_error.unwrap().reason, "rate_limited");
}

#[tokio::test]
async fn test_server_error_keeps_previous_history() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/solana/market_chart"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(market_chart(json!([[1000, 150.0], [2000, 155.0]]))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins/solana/market_chart"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(0));
    let cache = build_cache(&server, clock.clone());

    assert_eq!(cache.get_history("solana").await.len(), 2);
    clock.advance(31 * 60_000);
    let history = cache.get_history("solana").await;

    assert_eq!(
        &history[..],
        &[Sample::new(1000, 150.0), Sample::new(2000, 155.0)]
    );
    let failure = cache.cache_status("solana").last_error.unwrap();
    assert_eq!(failure.reason, "bad_status");
    assert!(failure.message.contains("503"));
}

#[tokio::test]
async fn test_missing_and_empty_prices() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/cardano/market_chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"market_caps": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins/ripple/market_chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(market_chart(json!([]))))
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new(&config_for(&server)).unwrap();

    let err = provider.fetch_history("cardano").await.unwrap_err();
    assert!(matches!(err, ProviderError::MissingField("prices")));

    let err = provider.fetch_history("ripple").await.unwrap_err();
    assert!(matches!(err, ProviderError::EmptyDataset { .. }));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(market_chart(json!([[1000, 100.0]])))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let cache = build_cache(&server, Arc::new(ManualClock::new(0)));

    let err = cache.force_fetch("bitcoin").await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { .. }));
    assert!(cache.get_history("bitcoin").await.is_empty());
}

#[tokio::test]
async fn test_service_status_after_traffic() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(market_chart(json!([[1000, 100.0]]))),
        )
        .mount(&server)
        .await;

    let cache = build_cache(&server, Arc::new(ManualClock::new(0)));
    cache.get_history("bitcoin").await;
    cache.refresh("bitcoin").await;

    let status = cache.service_status().await;
    assert_eq!(status.total_cached_coins, 1);
    assert_eq!(status.provider.provider_name, "coingecko");
    assert_eq!(status.provider.total_requests, 2);
    assert_eq!(status.coins["bitcoin"].request_count, 1);
}
