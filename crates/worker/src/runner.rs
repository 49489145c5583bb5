//! Job bodies.
//!
//! Payload shapes per job type:
//!
//! | Job type             | Payload                          |
//! |----------------------|----------------------------------|
//! | `correlate_value`    | `{"value": string}`              |
//! | `correlation_plugin` | `{"plugin": string, "input": {}}`|
//! | `enrichment`         | `{"plugin": string, "input": {}}`|
//! | `webhook_notify`     | `{"url": string, "payload": any}`|

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use warden_core::backend::{AttributeStore, BackendError};
use warden_core::correlation::correlate;
use warden_core::job::{JobOutcome, JobRecord, JobType};
use warden_plugins::{PluginError, PluginKind, PluginRegistry};

use crate::webhook::{WebhookError, WebhookNotifier};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Plugin '{plugin}' is not a {expected:?} plugin")]
    WrongPluginKind { plugin: String, expected: PluginKind },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

#[derive(Deserialize)]
struct CorrelatePayload {
    value: String,
}

#[derive(Deserialize)]
struct PluginPayload {
    plugin: String,
    #[serde(default)]
    input: Value,
}

#[derive(Deserialize)]
struct WebhookPayload {
    url: String,
    #[serde(default)]
    payload: Value,
}

fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, RunError> {
    T::deserialize(payload).map_err(|e| RunError::InvalidPayload(e.to_string()))
}

/// Executes job bodies against the plugin registry and attribute store.
#[derive(Clone)]
pub struct JobRunner {
    plugins: Arc<PluginRegistry>,
    attributes: Arc<dyn AttributeStore>,
    webhook: WebhookNotifier,
    correlation_threshold: u64,
}

impl JobRunner {
    pub fn new(
        plugins: Arc<PluginRegistry>,
        attributes: Arc<dyn AttributeStore>,
        correlation_threshold: u64,
    ) -> Self {
        Self {
            plugins,
            attributes,
            webhook: WebhookNotifier::new(),
            correlation_threshold,
        }
    }

    pub fn with_webhook(mut self, webhook: WebhookNotifier) -> Self {
        self.webhook = webhook;
        self
    }

    /// Run a claimed job and turn the result into a backend outcome.
    pub async fn run(&self, job: &JobRecord) -> JobOutcome {
        match self.execute(job.job_type, &job.payload).await {
            Ok(result) => JobOutcome::Success(result),
            Err(e) => {
                tracing::warn!(job_id = %job.id, job_type = %job.job_type, error = %e, "Job failed");
                JobOutcome::Failed(e.to_string())
            }
        }
    }

    /// Execute one job body. Fire-and-forget types return `None`.
    pub async fn execute(
        &self,
        job_type: JobType,
        payload: &Value,
    ) -> Result<Option<Value>, RunError> {
        match job_type {
            JobType::CorrelateValue => {
                let input: CorrelatePayload = parse_payload(payload)?;
                self.correlate_value(&input.value).await.map(Some)
            }
            JobType::CorrelationPlugin => self
                .run_plugin(parse_payload(payload)?, PluginKind::Correlation)
                .await
                .map(Some),
            JobType::Enrichment => self
                .run_plugin(parse_payload(payload)?, PluginKind::Enrichment)
                .await
                .map(Some),
            JobType::WebhookNotify => {
                let input: WebhookPayload = parse_payload(payload)?;
                self.webhook.deliver(&input.url, &input.payload).await?;
                Ok(None)
            }
        }
    }

    async fn correlate_value(&self, value: &str) -> Result<Value, RunError> {
        let total = self.attributes.count_by_value(value).await?;
        let attributes = if total > self.correlation_threshold {
            Vec::new()
        } else {
            self.attributes
                .find_by_value(value, self.correlation_threshold)
                .await?
        };

        let result = correlate(total, &attributes, self.correlation_threshold);
        tracing::debug!(
            total,
            found = result.found_correlations,
            over = result.is_over_correlating_value,
            "Value correlated",
        );
        serde_json::to_value(result).map_err(|e| RunError::InvalidPayload(e.to_string()))
    }

    async fn run_plugin(
        &self,
        payload: PluginPayload,
        expected: PluginKind,
    ) -> Result<Value, RunError> {
        let info = self.plugins.get_info(&payload.plugin)?;
        if info.kind != expected {
            return Err(RunError::WrongPluginKind {
                plugin: payload.plugin,
                expected,
            });
        }

        let mut plugin = self.plugins.create(&payload.plugin, payload.input)?;
        Ok(plugin.run().await?)
    }
}
