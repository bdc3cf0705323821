use reqwest::{Client, Response};
use std::time::Duration;
use tracing::warn;

use crate::tracker::targets;
use crate::{prelude::*, Error, SnapshotError};

/// HTTP status codes that indicate transient server errors (retryable)
const RETRYABLE_STATUS_CODES: &[u16] = &[502, 503, 504];

/// Maximum number of retry attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds (doubles with each retry)
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Debug, Clone)]
pub(crate) struct RenderClient {
    client: Client,
    url: String,
    timeout: Duration,
}

async fn parse_response(response: Response) -> Result<String> {
    let status_code = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| Error::GenericRequest(e.to_string()))?;

    if status_code < 400 {
        return Ok(text);
    }
    if (400..500).contains(&status_code) {
        return Err(Error::client_error(status_code, text));
    }
    Err(Error::server_error(status_code, text))
}

impl RenderClient {
    pub(crate) fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::GenericRequest(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Send a GET request with automatic retry for transient server errors (502, 503, 504).
    ///
    /// Uses exponential backoff: 100ms, 200ms, 400ms between retries.
    pub(crate) async fn get(&self) -> Result<String> {
        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .get(&self.url)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        Error::from(SnapshotError::Timeout {
                            timeout_ms: self.timeout.as_millis() as u64,
                        })
                    } else {
                        Error::GenericRequest(e.to_string())
                    }
                })?;

            let status = response.status().as_u16();

            if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    target: targets::SOURCE,
                    status = status,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES + 1,
                    backoff_ms = backoff.as_millis(),
                    url = %self.url,
                    "Retryable HTTP error, backing off"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return parse_response(response).await;
        }

        Err(Error::GenericRequest(format!(
            "Max retries ({MAX_RETRIES}) exceeded for {}",
            self.url
        )))
    }
}
