//! Remote price lookups with bounded, classified retries
//!
//! Every lookup waits a fixed baseline before its first request, then backs
//! off progressively on rate limits, network failures and timeouts.
//! Malformed payloads and unexpected failures end the lookup immediately.

use crate::config::PriceApiSettings;
use crate::error::PriceFetchError;
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Number;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod transport;
pub use transport::{HttpTransport, QuoteTransport, TransportOutcome};

/// Quote currency requested from the endpoint
const QUOTE_CURRENCY: &str = "usd";

/// Anything that can price an asset in USD
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, asset_id: &str) -> std::result::Result<Decimal, PriceFetchError>;
}

/// Waits between attempts. Injected so tests can record the schedule.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry schedule for quote requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Pause before the first attempt
    pub initial_delay: Duration,
    /// Retry k waits `backoff_step * k`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(1000),
            backoff_step: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.initial_delay
        } else {
            self.backoff_step * attempt
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Classified result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(Decimal),
    RateLimited(String),
    NetworkFailure(String),
    Timeout(String),
    MalformedShape(String),
    ParseFailure(String),
    Other(String),
}

/// Price client that retries transient failures on a fixed schedule
pub struct RetryingPriceClient {
    transport: Arc<dyn QuoteTransport>,
    sleeper: Arc<dyn Sleeper>,
    base_url: String,
    policy: RetryPolicy,
}

impl RetryingPriceClient {
    pub fn new(transport: Arc<dyn QuoteTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            base_url: base_url.into(),
            policy: RetryPolicy::default(),
        }
    }

    /// Client backed by a pooled HTTP transport.
    pub fn from_settings(settings: &PriceApiSettings) -> Result<Self> {
        let transport = HttpTransport::new(settings.request_timeout)?;
        Ok(Self::new(Arc::new(transport), settings.base_url.clone()))
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn quote_url(&self, asset_id: &str) -> String {
        format!(
            "{}?ids={}&vs_currencies={}",
            self.base_url, asset_id, QUOTE_CURRENCY
        )
    }

    pub async fn fetch_price(&self, asset_id: &str) -> std::result::Result<Decimal, PriceFetchError> {
        let url = self.quote_url(asset_id);
        let max_retries = self.policy.max_retries;

        for attempt in 0..=max_retries {
            self.sleeper.sleep(self.policy.delay_before(attempt)).await;

            debug!(asset_id, attempt, url = %url, "Requesting quote");

            let (reason, exhausted) = match self.attempt(asset_id, &url).await {
                AttemptOutcome::Success(price) => return Ok(price),

                AttemptOutcome::MalformedShape(details) | AttemptOutcome::ParseFailure(details) => {
                    return Err(PriceFetchError::MalformedResponse {
                        asset_id: asset_id.to_string(),
                        details,
                    })
                }

                AttemptOutcome::Other(message) => {
                    return Err(PriceFetchError::Unexpected {
                        asset_id: asset_id.to_string(),
                        message,
                    })
                }

                AttemptOutcome::RateLimited(message) => (
                    message,
                    PriceFetchError::RateLimitExceeded {
                        asset_id: asset_id.to_string(),
                    },
                ),

                AttemptOutcome::NetworkFailure(message) => (
                    message.clone(),
                    PriceFetchError::Network {
                        asset_id: asset_id.to_string(),
                        attempts: self.policy.max_attempts(),
                        message,
                    },
                ),

                AttemptOutcome::Timeout(message) => (
                    message.clone(),
                    PriceFetchError::Timeout {
                        asset_id: asset_id.to_string(),
                        attempts: self.policy.max_attempts(),
                        message,
                    },
                ),
            };

            if attempt == max_retries {
                return Err(exhausted);
            }

            warn!(
                asset_id,
                attempt,
                next_delay_ms = self.policy.delay_before(attempt + 1).as_millis() as u64,
                reason = %reason,
                "Quote request failed, retrying"
            );
        }

        Err(PriceFetchError::RateLimitExceeded {
            asset_id: asset_id.to_string(),
        })
    }

    async fn attempt(&self, asset_id: &str, url: &str) -> AttemptOutcome {
        match self.transport.get(url).await {
            TransportOutcome::Body(body) => parse_quote(asset_id, &body),
            TransportOutcome::RateLimited(m) => AttemptOutcome::RateLimited(m),
            TransportOutcome::NetworkFailure(m) => AttemptOutcome::NetworkFailure(m),
            TransportOutcome::Timeout(m) => AttemptOutcome::Timeout(m),
            TransportOutcome::Other(m) => AttemptOutcome::Other(m),
        }
    }
}

#[async_trait]
impl PriceSource for RetryingPriceClient {
    async fn fetch_price(&self, asset_id: &str) -> std::result::Result<Decimal, PriceFetchError> {
        RetryingPriceClient::fetch_price(self, asset_id).await
    }
}

/// Parse `{ "<asset>": { "usd": <number> } }` into the USD price.
pub fn parse_quote(asset_id: &str, body: &str) -> AttemptOutcome {
    let quotes: HashMap<String, HashMap<String, Number>> = match serde_json::from_str(body) {
        Ok(quotes) => quotes,
        Err(e) => return AttemptOutcome::ParseFailure(e.to_string()),
    };

    let Some(number) = quotes
        .get(asset_id)
        .and_then(|currencies| currencies.get(QUOTE_CURRENCY))
    else {
        return AttemptOutcome::MalformedShape(format!(
            "Unable to get price for {} - invalid response structure",
            asset_id
        ));
    };

    match number_to_decimal(number) {
        Some(price) => AttemptOutcome::Success(price),
        None => AttemptOutcome::ParseFailure(format!(
            "{} is not representable as a decimal price",
            number
        )),
    }
}

fn number_to_decimal(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PriceFetchErrorKind;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_test::assert_err;

    const BASE_URL: &str = "https://quotes.test/simple/price";

    /// Replays a fixed list of outcomes and records requested URLs.
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<TransportOutcome>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<TransportOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                urls: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl QuoteTransport for ScriptedTransport {
        async fn get(&self, url: &str) -> TransportOutcome {
            self.urls.lock().unwrap().push(url.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| TransportOutcome::Other("script exhausted".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn millis(&self) -> Vec<u128> {
            self.delays.lock().unwrap().iter().map(|d| d.as_millis()).collect()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> (RetryingPriceClient, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = RetryingPriceClient::new(transport, BASE_URL).with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    fn rate_limited() -> TransportOutcome {
        TransportOutcome::RateLimited("429 Too Many Requests".to_string())
    }

    fn body(json: &str) -> TransportOutcome {
        TransportOutcome::Body(json.to_string())
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_before(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_before(1), Duration::from_millis(5000));
        assert_eq!(policy.delay_before(2), Duration::from_millis(10000));
    }

    #[test]
    fn test_quote_url() {
        let (client, _) = client(ScriptedTransport::new(vec![]));
        assert_eq!(
            client.quote_url("bitcoin"),
            "https://quotes.test/simple/price?ids=bitcoin&vs_currencies=usd"
        );
    }

    #[tokio::test]
    async fn test_recovers_after_two_rate_limits() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(),
            rate_limited(),
            body(r#"{"bitcoin":{"usd":67123.45}}"#),
        ]);
        let (client, sleeper) = client(transport.clone());

        let price = client.fetch_price("bitcoin").await.unwrap();

        assert_eq!(price, dec!(67123.45));
        assert_eq!(transport.attempts(), 3);
        assert_eq!(sleeper.millis(), vec![1000, 5000, 10000]);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion() {
        let transport = ScriptedTransport::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let (client, sleeper) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);

        assert_eq!(err.kind(), PriceFetchErrorKind::RateLimitExceeded);
        assert!(err.to_string().contains("bitcoin"));
        assert!(err.to_string().contains("1-2 minutes"));
        assert_eq!(transport.attempts(), 3);
        assert_eq!(sleeper.millis(), vec![1000, 5000, 10000]);
    }

    #[tokio::test]
    async fn test_missing_usd_is_not_retried() {
        let transport = ScriptedTransport::new(vec![
            body(r#"{"bitcoin":{"eur":50000}}"#),
            body(r#"{"bitcoin":{"usd":1}}"#),
        ]);
        let (client, sleeper) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);

        assert_eq!(err.kind(), PriceFetchErrorKind::MalformedResponse);
        assert_eq!(err.asset_id(), "bitcoin");
        assert_eq!(transport.attempts(), 1);
        assert_eq!(sleeper.millis(), vec![1000]);
    }

    #[tokio::test]
    async fn test_missing_asset_is_malformed() {
        let transport = ScriptedTransport::new(vec![body(r#"{"ethereum":{"usd":3000}}"#)]);
        let (client, _) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);
        assert_eq!(err.kind(), PriceFetchErrorKind::MalformedResponse);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_json_syntax_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![body("<html>oops")]);
        let (client, _) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);
        assert_eq!(err.kind(), PriceFetchErrorKind::MalformedResponse);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_network_exhaustion_reports_last_error() {
        let transport = ScriptedTransport::new(vec![
            TransportOutcome::NetworkFailure("connection refused".to_string()),
            TransportOutcome::NetworkFailure("connection reset".to_string()),
            TransportOutcome::NetworkFailure("dns failure".to_string()),
        ]);
        let (client, sleeper) = client(transport.clone());

        let err = assert_err!(client.fetch_price("ethereum").await);

        assert_eq!(
            err,
            PriceFetchError::Network {
                asset_id: "ethereum".to_string(),
                attempts: 3,
                message: "dns failure".to_string(),
            }
        );
        assert_eq!(transport.attempts(), 3);
        assert_eq!(sleeper.millis(), vec![1000, 5000, 10000]);
    }

    #[tokio::test]
    async fn test_timeout_then_success() {
        let transport = ScriptedTransport::new(vec![
            TransportOutcome::Timeout("operation timed out".to_string()),
            body(r#"{"ethereum":{"usd":3150.5}}"#),
        ]);
        let (client, sleeper) = client(transport.clone());

        let price = client.fetch_price("ethereum").await.unwrap();

        assert_eq!(price, dec!(3150.5));
        assert_eq!(sleeper.millis(), vec![1000, 5000]);
    }

    #[tokio::test]
    async fn test_timeout_exhaustion() {
        let timeout = || TransportOutcome::Timeout("operation timed out".to_string());
        let transport = ScriptedTransport::new(vec![timeout(), timeout(), timeout()]);
        let (client, _) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);
        assert_eq!(err.kind(), PriceFetchErrorKind::Timeout);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![TransportOutcome::Other(
            "builder error".to_string(),
        )]);
        let (client, sleeper) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);
        assert_eq!(err.kind(), PriceFetchErrorKind::Unexpected);
        assert_eq!(transport.attempts(), 1);
        assert_eq!(sleeper.millis(), vec![1000]);
    }

    #[tokio::test]
    async fn test_mixed_failures_share_one_budget() {
        let transport = ScriptedTransport::new(vec![
            rate_limited(),
            TransportOutcome::NetworkFailure("connection refused".to_string()),
            TransportOutcome::Timeout("operation timed out".to_string()),
        ]);
        let (client, _) = client(transport.clone());

        let err = assert_err!(client.fetch_price("bitcoin").await);
        assert_eq!(err.kind(), PriceFetchErrorKind::Timeout);
        assert_eq!(transport.attempts(), 3);
    }

    #[test]
    fn test_parse_quote_keeps_decimal_digits() {
        assert_eq!(
            parse_quote("shiba-inu", r#"{"shiba-inu":{"usd":1.2e-5}}"#),
            AttemptOutcome::Success(dec!(0.000012))
        );
        assert_eq!(
            parse_quote("bitcoin", r#"{"bitcoin":{"usd":0.1}}"#),
            AttemptOutcome::Success(dec!(0.1))
        );
    }

    #[test]
    fn test_parse_quote_beyond_double_precision() {
        assert_eq!(
            parse_quote("bitcoin", r#"{"bitcoin":{"usd":67123.123456789012345678}}"#),
            AttemptOutcome::Success(dec!(67123.123456789012345678))
        );
    }

    #[test]
    fn test_parse_quote_rejects_non_numeric_price() {
        assert!(matches!(
            parse_quote("bitcoin", r#"{"bitcoin":{"usd":"n/a"}}"#),
            AttemptOutcome::ParseFailure(_)
        ));
    }
}
