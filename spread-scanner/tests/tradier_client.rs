//! Tradier client tests against a mock HTTP server.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use spread_scanner::data::{MarketDataProvider, OptionType, ProviderError, TradierClient, TradierConfig};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> TradierClient {
    let config = TradierConfig {
        base_url: server.uri(),
        request_interval_ms: 0,
    };
    TradierClient::with_config("test-token".to_string(), &config)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_underlying_price_sends_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/quotes"))
        .and(query_param("symbols", "SPY"))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quotes": {
                "quote": { "symbol": "SPY", "last": 512.34, "close": null, "prevclose": 510.0 }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let price = client.underlying_price("SPY").await.unwrap();
    assert_eq!(price, Decimal::new(51234, 2));
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_unknown_symbol_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quotes": { "unmatched_symbols": { "symbol": "NOPE" } }
        })))
        .mount(&server)
        .await;

    let err = client(&server).underlying_price("NOPE").await.unwrap_err();
    assert!(matches!(err, ProviderError::NoData { ref ticker } if ticker == "NOPE"));
}

#[tokio::test]
async fn test_expirations_single_and_many() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/expirations"))
        .and(query_param("symbol", "F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expirations": { "date": "2026-10-23" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/markets/options/expirations"))
        .and(query_param("symbol", "SPY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expirations": { "date": ["2026-10-23", "2026-10-30", "2026-11-20"] }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.expirations("F").await.unwrap(), vec![date(2026, 10, 23)]);
    assert_eq!(
        client.expirations("SPY").await.unwrap(),
        vec![date(2026, 10, 23), date(2026, 10, 30), date(2026, 11, 20)]
    );
}

#[tokio::test]
async fn test_null_expirations_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/expirations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "expirations": null })))
        .mount(&server)
        .await;

    let err = client(&server).expirations("XYZ").await.unwrap_err();
    assert!(matches!(err, ProviderError::NoData { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_option_chain_normalization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/chains"))
        .and(query_param("symbol", "XYZ"))
        .and(query_param("expiration", "2026-11-20"))
        .and(query_param("greeks", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "options": { "option": [
                {
                    "symbol": "XYZ261120P00095000", "strike": 95.0, "option_type": "put",
                    "expiration_date": "2026-11-20", "bid": 1.2, "ask": 1.3, "last": 1.25,
                    "greeks": { "delta": -0.29, "mid_iv": 0.33, "smv_vol": 0.32 }
                },
                {
                    "symbol": "XYZ261120P00094000", "strike": 94.0, "option_type": "put",
                    "expiration_date": "2026-11-20", "bid": 0.6, "ask": 0.7, "last": null,
                    "greeks": null
                },
                {
                    "symbol": "XYZ261120C00105000", "strike": 105.0, "option_type": "call",
                    "expiration_date": "2026-11-20", "bid": 0.9, "ask": 1.0, "last": 0.95,
                    "greeks": { "delta": 0.27, "mid_iv": 0.3, "smv_vol": 0.3 }
                }
            ] }
        })))
        .mount(&server)
        .await;

    let chain = client(&server)
        .option_chain("XYZ", date(2026, 11, 20))
        .await
        .unwrap();

    assert_eq!(chain.ticker, "XYZ");
    assert_eq!(chain.expiration, date(2026, 11, 20));
    assert_eq!(chain.puts.len(), 2);
    assert_eq!(chain.calls.len(), 1);
    assert!(chain.puts.iter().all(|q| q.option_type == OptionType::Put));

    let put_at = |strike: i64| {
        chain
            .puts
            .iter()
            .find(|q| q.strike == Decimal::from(strike))
            .unwrap()
    };

    let short = put_at(95);
    assert_eq!(short.bid, Decimal::new(12, 1));
    assert_eq!(short.delta, Some(-0.29));

    let long = put_at(94);
    assert_eq!(long.delta, None);
    assert_eq!(long.last, Decimal::ZERO);
}

#[tokio::test]
async fn test_bad_contract_does_not_fail_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/chains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "options": { "option": [
                {
                    "strike": 95.0, "option_type": "put", "expiration_date": "2026-11-20",
                    "bid": 1.2, "ask": 1.3, "greeks": { "delta": -0.29 }
                },
                {
                    "strike": null, "option_type": "put", "expiration_date": "2026-11-20",
                    "bid": 0.9, "ask": 1.0
                },
                {
                    "strike": 93.0, "option_type": "put", "expiration_date": "2026-11-20",
                    "bid": "n/a", "ask": 0.5
                },
                {
                    "strike": 94.0, "option_type": "put", "expiration_date": "2026-11-20",
                    "bid": 0.6, "ask": 0.7, "greeks": { "delta": -0.24 }
                }
            ] }
        })))
        .mount(&server)
        .await;

    let chain = client(&server)
        .option_chain("XYZ", date(2026, 11, 20))
        .await
        .unwrap();

    let strikes: Vec<Decimal> = chain.puts.iter().map(|q| q.strike).collect();
    assert_eq!(strikes, vec![Decimal::from(95), Decimal::from(94)]);
    assert!(chain.calls.is_empty());
}

#[tokio::test]
async fn test_single_option_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/chains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "options": { "option": {
                "strike": 20.0, "option_type": "put", "expiration_date": "2026-10-23",
                "bid": 0.15, "ask": 0.2, "greeks": { "delta": -0.3 }
            } }
        })))
        .mount(&server)
        .await;

    let chain = client(&server)
        .option_chain("F", date(2026, 10, 23))
        .await
        .unwrap();
    assert_eq!(chain.puts.len(), 1);
    assert_eq!(chain.puts[0].ask, Decimal::new(2, 1));
}

#[tokio::test]
async fn test_null_chain_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/chains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "options": null })))
        .mount(&server)
        .await;

    let err = client(&server)
        .option_chain("XYZ", date(2026, 11, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NoData { .. }));
}

#[tokio::test]
async fn test_status_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/quotes"))
        .and(query_param("symbols", "BUSY"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/markets/quotes"))
        .and(query_param("symbols", "DOWN"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/markets/quotes"))
        .and(query_param("symbols", "DENIED"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Access Token"))
        .mount(&server)
        .await;

    let client = client(&server);

    let busy = client.underlying_price("BUSY").await.unwrap_err();
    assert!(matches!(busy, ProviderError::RateLimited));
    assert!(busy.is_transient());

    let down = client.underlying_price("DOWN").await.unwrap_err();
    assert!(matches!(down, ProviderError::Api { status: 502, .. }));
    assert!(down.is_transient());

    let denied = client.underlying_price("DENIED").await.unwrap_err();
    match &denied {
        ProviderError::Api { status, body } => {
            assert_eq!(*status, 401);
            assert_eq!(body, "Invalid Access Token");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!denied.is_transient());
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/markets/options/expirations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server).expirations("SPY").await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)));
    assert!(!err.is_transient());
}
