//! HTTP client construction and response status handling.
//!
//! Every upstream service is reached through clients built here:
//! - a plain client for the search API (no retries; failures abort the batch)
//! - a retrying client for document downloads (transient failures only)
//! - a long-timeout client for streamed model calls

use std::time::Duration;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{Config, api};
use crate::error::{ClientError, ClientResult};

/// Build a client with the shared pool settings and the given request timeout.
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized.
pub fn build_client(config: &Config, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(api::USER_AGENT)
        .timeout(timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(api::MAX_KEEPALIVE)
        .pool_idle_timeout(api::KEEPALIVE_EXPIRY)
        .gzip(true)
        .build()
}

/// Build the client used for document downloads.
///
/// Transient failures (timeouts, 5xx, 429) are retried with exponential backoff up
/// to `config.download_retries` times before the record is marked failed.
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized.
pub fn build_download_client(config: &Config) -> Result<ClientWithMiddleware, reqwest::Error> {
    let client = build_client(config, config.request_timeout)?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_secs(1), Duration::from_secs(30))
        .build_with_max_retries(config.download_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Map a non-success HTTP status onto a [`ClientError`].
pub async fn handle_response(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);

            Err(ClientError::rate_limited(retry_after))
        }
        404 => {
            let resource = response.url().to_string();
            Err(ClientError::not_found(resource))
        }
        400 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::bad_request(text))
        }
        500..=599 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::server(status.as_u16(), text))
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> Config {
        Config::for_testing(&server.uri(), std::path::Path::new("/tmp/unused"))
    }

    #[tokio::test]
    async fn test_handle_response_maps_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let config = test_config(&server);
        let client = build_client(&config, config.request_timeout).unwrap();

        let resp = client.get(format!("{}/missing", server.uri())).send().await.unwrap();
        assert!(matches!(handle_response(resp).await, Err(ClientError::NotFound { .. })));

        let resp = client.get(format!("{}/busy", server.uri())).send().await.unwrap();
        let err = handle_response(resp).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::RateLimited { retry_after } if retry_after == Duration::from_secs(7)
        ));

        let resp = client.get(format!("{}/broken", server.uri())).send().await.unwrap();
        let err = handle_response(resp).await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_download_client_without_retries_calls_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server);
        let client = build_download_client(&config).unwrap();
        let resp = client.get(format!("{}/flaky", server.uri())).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);
    }
}
