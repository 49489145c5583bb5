//! Webhook delivery with backoff retry.
//!
//! [`WebhookNotifier`] POSTs a JSON payload to an external URL. Failed
//! attempts are retried after each configured delay (1 s, 2 s, 4 s by
//! default), then one final attempt is made.

use std::time::Duration;

use serde_json::Value;

/// Default retry delays.
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self::with_retry_delays(DEFAULT_RETRY_DELAYS.to_vec())
    }

    pub fn with_retry_delays(retry_delays: Vec<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            retry_delays,
        }
    }

    /// Deliver `payload` to `url`, returning on the first success.
    pub async fn deliver(&self, url: &str, payload: &Value) -> Result<(), WebhookError> {
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(url, payload).await.inspect_err(|e| {
            tracing::error!(url, error = %e, "Webhook delivery failed after all retries");
        })
    }

    async fn try_send(&self, url: &str, payload: &Value) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[tokio::test]
    async fn unreachable_url_fails_after_retries() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let notifier = WebhookNotifier::with_retry_delays(vec![Duration::from_millis(10)]);
        let err = notifier
            .deliver(&format!("http://127.0.0.1:{port}/hook"), &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Request(_)));
    }
}
