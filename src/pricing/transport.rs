//! HTTP transport for the quote endpoint
//!
//! Uses a long-lived reqwest::Client for connection pooling.
//! Each GET is reduced to a `TransportOutcome` so the retry loop can
//! classify it without inspecting reqwest errors.

use crate::error::CalcError;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::error;

pub const USER_AGENT: &str = concat!("mycalc/", env!("CARGO_PKG_VERSION"));

/// Raw result of one GET against the quote endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// 2xx response with its body
    Body(String),
    RateLimited(String),
    NetworkFailure(String),
    Timeout(String),
    Other(String),
}

#[async_trait]
pub trait QuoteTransport: Send + Sync {
    async fn get(&self, url: &str) -> TransportOutcome;
}

/// Reusable HTTP transport (connection-pooled)
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(request_timeout)
            .build()
            .map_err(|e| CalcError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl QuoteTransport for HttpTransport {
    async fn get(&self, url: &str) -> TransportOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => classify_response(status, body),
            Err(e) => classify_error(&e),
        }
    }
}

/// Map a completed HTTP exchange onto an outcome.
pub fn classify_response(status: StatusCode, body: String) -> TransportOutcome {
    if status == StatusCode::TOO_MANY_REQUESTS || (!status.is_success() && mentions_rate_limit(&body)) {
        return TransportOutcome::RateLimited(format!(
            "Response status code does not indicate success: {}",
            status
        ));
    }

    if !status.is_success() {
        return TransportOutcome::NetworkFailure(format!(
            "Response status code does not indicate success: {}",
            status
        ));
    }

    TransportOutcome::Body(body)
}

fn mentions_rate_limit(text: &str) -> bool {
    text.to_ascii_lowercase().contains("too many requests")
}

fn classify_error(e: &reqwest::Error) -> TransportOutcome {
    let message = e.to_string();

    if e.is_timeout() {
        TransportOutcome::Timeout(message)
    } else if e.status() == Some(StatusCode::TOO_MANY_REQUESTS) || mentions_rate_limit(&message) {
        TransportOutcome::RateLimited(message)
    } else if e.is_builder() {
        error!("Quote request could not be built: {}", message);
        TransportOutcome::Other(message)
    } else {
        TransportOutcome::NetworkFailure(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::net::SocketAddr;

    async fn echo_headers(headers: HeaderMap) -> Json<serde_json::Value> {
        let header = |name: reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Json(serde_json::json!({
            "user_agent": header(reqwest::header::USER_AGENT),
            "accept": header(ACCEPT),
        }))
    }

    async fn spawn_quote_server() -> SocketAddr {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    r#"{"bitcoin":{"usd":1}}"#
                }),
            )
            .route("/echo", get(echo_headers))
            .route(
                "/limited",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_429_is_rate_limited() {
        let outcome = classify_response(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(outcome, TransportOutcome::RateLimited(m) if m.contains("429")));
    }

    #[test]
    fn test_explicit_too_many_requests_body() {
        let outcome = classify_response(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"status":{"error_message":"Too Many Requests"}}"#.to_string(),
        );
        assert!(matches!(outcome, TransportOutcome::RateLimited(_)));
    }

    #[test]
    fn test_other_failures_are_network() {
        let outcome = classify_response(StatusCode::BAD_GATEWAY, "upstream".to_string());
        assert!(matches!(outcome, TransportOutcome::NetworkFailure(m) if m.contains("502")));
    }

    #[test]
    fn test_success_passes_body_through() {
        let body = r#"{"bitcoin":{"usd":1}}"#.to_string();
        assert_eq!(
            classify_response(StatusCode::OK, body.clone()),
            TransportOutcome::Body(body)
        );
    }

    #[test]
    fn test_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(30)).is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let outcome = transport.get(&format!("http://{}/quote", addr)).await;
        assert!(matches!(outcome, TransportOutcome::NetworkFailure(_)), "{:?}", outcome);
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let addr = spawn_quote_server().await;

        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        let outcome = transport.get(&format!("http://{}/slow", addr)).await;
        assert!(matches!(outcome, TransportOutcome::Timeout(_)), "{:?}", outcome);
    }

    #[tokio::test]
    async fn test_sends_user_agent_and_accept() {
        let addr = spawn_quote_server().await;

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let body = match transport.get(&format!("http://{}/echo", addr)).await {
            TransportOutcome::Body(body) => body,
            other => panic!("unexpected outcome: {:?}", other),
        };

        let seen: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(seen["user_agent"], USER_AGENT);
        assert_eq!(seen["accept"], "application/json");
    }

    #[tokio::test]
    async fn test_live_429_is_rate_limited() {
        let addr = spawn_quote_server().await;

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let outcome = transport.get(&format!("http://{}/limited", addr)).await;
        assert!(matches!(outcome, TransportOutcome::RateLimited(_)), "{:?}", outcome);
    }
}
