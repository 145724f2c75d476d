//! JSON over HTTP with per-request timeouts and retry
//!
//! Network errors, 5xx responses and rate limiting (429) are retried with
//! exponential backoff. Other 4xx responses and undecodable bodies fail
//! immediately since retrying will not change the answer.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpClient {
    /// `max_retries` counts attempts, the first one included
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            max_retries: max_retries.max(1),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &[(&str, &str)]) -> Result<T> {
        let mut last_error = None;
        let mut was_rate_limited = false;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(was_rate_limited, attempt);
                debug!(
                    url = %mask_api_key(url),
                    attempt,
                    ?delay,
                    rate_limited = was_rate_limited,
                    "retrying request"
                );
                sleep(delay).await;
            }

            let mut request = self.client.get(url).header("Accept", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .with_context(|| format!("Failed to parse response from {}", mask_api_key(url)));
                    } else if status.as_u16() == 429 {
                        was_rate_limited = true;
                        last_error = Some(anyhow::anyhow!("Rate limited (429)"));
                    } else if status.is_server_error() {
                        was_rate_limited = false;
                        last_error = Some(anyhow::anyhow!("API returned status: {}", status));
                    } else {
                        anyhow::bail!("API returned status: {} for {}", status, mask_api_key(url));
                    }
                }
                Err(e) => {
                    was_rate_limited = false;
                    last_error = Some(anyhow::anyhow!("Request failed: {}", e));
                }
            }
        }

        let error =
            last_error.unwrap_or_else(|| anyhow::anyhow!("Failed after {} retries", self.max_retries));
        warn!(url = %mask_api_key(url), attempts = self.max_retries, "request failed: {error:#}");
        Err(error)
    }

    /// Single-shot JSON POST; the body of a successful response is ignored
    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<()> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", mask_api_key(url)))?
            .error_for_status()
            .with_context(|| format!("{} rejected the request", mask_api_key(url)))?;
        Ok(())
    }
}

/// Wait before retry number `attempt` (1-based), doubling from the base delay
fn backoff_delay(rate_limited: bool, attempt: u32) -> Duration {
    let base_delay = if rate_limited {
        constants::RATE_LIMIT_BASE_DELAY_SECS
    } else {
        constants::RETRY_BASE_DELAY_SECS
    };
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(base_delay.saturating_mul(factor))
}

/// Mask API keys in URLs for safe logging
/// Converts "https://example.com/?api-key=SECRET" to "https://example.com/?api-key=****"
pub fn mask_api_key(url: &str) -> String {
    if let Some(idx) = url.find("api-key=") {
        let prefix = &url[..idx + 8]; // Include "api-key="
        format!("{}****", prefix)
    } else if let Some(idx) = url.find("apikey=") {
        let prefix = &url[..idx + 7];
        format!("{}****", prefix)
    } else if let Some(idx) = url.find("/api/webhooks/") {
        // Discord webhook tokens live in the path
        let prefix = &url[..idx + 14];
        format!("{}****", prefix)
    } else {
        url.to_string()
    }
}
