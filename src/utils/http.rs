// src/utils/http.rs

//! HTTP client utilities.
//!
//! Retries live here, per request, and only for transient failures. The
//! rate-limit gate in front of a fetch never waits or retries.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FetchConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Retry policy for a single fetch.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            retries: config.http_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt)
    }
}

/// Turn a non-success status into an error.
pub fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AppError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

/// Send a request, retrying transient failures with exponential backoff.
pub async fn send_with_retry(request: RequestBuilder, policy: RetryPolicy) -> Result<Response> {
    let mut attempt = 0;
    loop {
        let current = request
            .try_clone()
            .ok_or_else(|| AppError::validation("request body cannot be retried"))?;
        let result = match current.send().await {
            Ok(response) => check_status(response),
            Err(e) => Err(AppError::from(e)),
        };

        match result {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < policy.retries => {
                let delay = policy.delay(attempt);
                log::debug!("Transient HTTP failure ({e}); retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetch a URL as text with the given retry policy.
pub async fn fetch_text(client: &Client, url: &str, policy: RetryPolicy) -> Result<String> {
    let response = send_with_retry(client.get(url), policy).await?;
    Ok(response.text().await?)
}
