// src/model/http.rs

use super::ReasoningService;
use super::family::RequestBody;
use crate::config::ServiceConfig;
use crate::error::{ProviderError, ProviderErrorKind};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Reasoning service reached over HTTPS with a bearer token
/// (`POST {base_url}/model/{model_id}/invoke`).
pub struct HttpReasoningService {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpReasoningService {
    pub fn new(cfg: &ServiceConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            client: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key()?,
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!("{}/model/{}/invoke", self.base_url, urlencoding::encode(model_id))
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    async fn invoke(&self, model_id: &str, body: &RequestBody) -> Result<Vec<u8>, ProviderError> {
        let url = self.invoke_url(model_id);
        debug!(url = %url, "POST invoke");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::new(model_id, ProviderErrorKind::Transport, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-ErrorType")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            let message = error_message(error_type.as_deref(), &body);
            return Err(ProviderError::from_message(
                model_id,
                message,
                ProviderErrorKind::Http(status.as_u16()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::new(model_id, ProviderErrorKind::Transport, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Render a provider error body as one message string. The JSON `message`
/// field is preferred; the raw body is used when it is not JSON.
fn error_message(error_type: Option<&str>, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    match error_type {
        // header looks like "ValidationException:http://internal.amazon.com/..."
        Some(t) => format!("{}: {detail}", t.split(':').next().unwrap_or(t)),
        None => detail,
    }
}
