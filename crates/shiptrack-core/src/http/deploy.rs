//! Deployment-trigger API client

use super::client::{check_status, decode_json, USER_AGENT};
use crate::error::{Error, Result};
use crate::traits::{DeployTrigger, SecretStore};
use crate::types::{DeployTriggerConfig, TriggerPayload};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Accepts both `{"execution_url": ..}` and `{"data": {"executionUrl": ..}}`
#[derive(Debug, Deserialize)]
struct TriggerResponse {
    #[serde(default, alias = "executionUrl")]
    execution_url: Option<String>,
    #[serde(default)]
    data: Option<TriggerResponseData>,
}

#[derive(Debug, Deserialize)]
struct TriggerResponseData {
    #[serde(default, alias = "executionUrl")]
    execution_url: Option<String>,
}

impl TriggerResponse {
    fn into_url(self) -> Option<String> {
        self.execution_url
            .or_else(|| self.data.and_then(|d| d.execution_url))
            .filter(|url| !url.trim().is_empty())
    }
}

/// HTTP client for the deployment-trigger API (header-keyed auth)
pub struct DeployTriggerClient {
    client: reqwest::Client,
    config: DeployTriggerConfig,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for DeployTriggerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployTriggerClient")
            .field("endpoint", &self.config.endpoint)
            .field("pipeline", &self.config.pipeline)
            .finish_non_exhaustive()
    }
}

impl DeployTriggerClient {
    /// Create a new trigger client
    pub fn new(config: DeployTriggerConfig, secrets: Arc<dyn SecretStore>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config,
            secrets,
        }
    }

    /// Pipeline identifier from the configuration
    pub fn pipeline(&self) -> &str {
        &self.config.pipeline
    }

    /// POST one execution request and return its URL
    pub async fn trigger(&self, payload: &TriggerPayload) -> Result<String> {
        let context = "Failed to trigger deployment";
        let api_key = self
            .secrets
            .load_token(&self.config.api_key_name)
            .map_err(|e| Error::Unauthenticated(format!("{}: {}", context, e.message())))?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))?;

        let response = check_status(response, context).await?;
        let body: TriggerResponse = decode_json(response, context).await?;
        body.into_url().ok_or_else(|| {
            Error::MalformedResponse(format!(
                "{}: response for {}/{} has no execution URL",
                context, payload.module, payload.environment
            ))
        })
    }
}

impl DeployTrigger for DeployTriggerClient {
    fn trigger<'a>(
        &'a self,
        payload: &'a TriggerPayload,
    ) -> impl Future<Output = Result<String>> + Send + 'a {
        Self::trigger(self, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shapes() {
        let flat: TriggerResponse =
            serde_json::from_str(r#"{"execution_url":"https://deploy/x/1"}"#).unwrap();
        assert_eq!(flat.into_url().as_deref(), Some("https://deploy/x/1"));

        let nested: TriggerResponse =
            serde_json::from_str(r#"{"data":{"executionUrl":"https://deploy/x/2"}}"#).unwrap();
        assert_eq!(nested.into_url().as_deref(), Some("https://deploy/x/2"));

        let empty: TriggerResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(empty.into_url(), None);
    }
}
