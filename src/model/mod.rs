// src/model/mod.rs

mod failover;
mod family;
mod http;

pub use failover::{FailoverPolicy, UnusableModelPolicy};
pub use family::RequestBody;
pub use http::HttpReasoningService;

use crate::config::ModelSettings;
use crate::document::DocumentPayload;
use crate::error::{ProviderError, ProviderErrorKind};
use async_trait::async_trait;
use family::{ModelFamily, build_request_body, response_text};
use serde_json::Value;
use tracing::{info, warn};

const RESPONSE_SNIPPET_CHARS: usize = 300;

/// The external reasoning service: one opaque request, one opaque response.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn invoke(&self, model_id: &str, body: &RequestBody) -> Result<Vec<u8>, ProviderError>;
}

#[async_trait]
impl<T: ReasoningService + ?Sized> ReasoningService for std::sync::Arc<T> {
    async fn invoke(&self, model_id: &str, body: &RequestBody) -> Result<Vec<u8>, ProviderError> {
        (**self).invoke(model_id, body).await
    }
}

/// Text returned by the model plus the id that actually produced it.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub model_used: String,
}

/// Calls the reasoning service with a family-specific body and fails over to
/// the configured secondary model when the primary is unusable.
pub struct ModelInvoker<S, P = UnusableModelPolicy> {
    service: S,
    models: ModelSettings,
    policy: P,
}

impl<S: ReasoningService> ModelInvoker<S, UnusableModelPolicy> {
    pub fn new(service: S, models: ModelSettings) -> Self {
        Self::with_policy(service, models, UnusableModelPolicy)
    }
}

impl<S: ReasoningService, P: FailoverPolicy> ModelInvoker<S, P> {
    pub fn with_policy(service: S, models: ModelSettings, policy: P) -> Self {
        Self {
            service,
            models,
            policy,
        }
    }

    pub fn models(&self) -> &ModelSettings {
        &self.models
    }

    /// Invoke `model_id`, retrying once on the fallback model if the policy allows.
    pub async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        documents: &[DocumentPayload],
    ) -> Result<ModelResponse, ProviderError> {
        match self.invoke_once(model_id, prompt, documents).await {
            Ok(response) => Ok(response),
            Err(err) => {
                let Some(fallback) = self.models.fallback_for(model_id) else {
                    return Err(err);
                };
                if !self.policy.should_fail_over(&err) {
                    return Err(err);
                }
                warn!(
                    primary_model_id = %model_id,
                    fallback_model_id = %fallback,
                    error = %err.message,
                    "Primary model failed; retrying with fallback model"
                );
                self.invoke_once(fallback, prompt, documents).await
            }
        }
    }

    async fn invoke_once(
        &self,
        model_id: &str,
        prompt: &str,
        documents: &[DocumentPayload],
    ) -> Result<ModelResponse, ProviderError> {
        let family = ModelFamily::from_model_id(model_id);
        let body = build_request_body(family, prompt, documents);
        info!(
            model_id = %model_id,
            family = ?family,
            prompt_len = prompt.len(),
            doc_count = documents.len(),
            "Invoking model"
        );

        let raw = self.service.invoke(model_id, &body).await?;
        let decoded: Value = serde_json::from_slice(&raw).map_err(|e| {
            ProviderError::new(
                model_id,
                ProviderErrorKind::Decode,
                format!("response body is not JSON: {e}"),
            )
        })?;
        let text = response_text(&decoded);

        info!(
            model_id = %model_id,
            response_len = text.len(),
            response_snippet = %snippet(&text, RESPONSE_SNIPPET_CHARS),
            "Model response"
        );
        if text.is_empty() {
            warn!(model_id = %model_id, "Model response had no text content");
        }

        Ok(ModelResponse {
            text,
            model_used: model_id.to_string(),
        })
    }
}

/// First `max_chars` characters of `s`, on a char boundary.
pub fn snippet(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted reasoning service: pops one canned result per call and records
    /// the model id and body of every call.
    #[derive(Default)]
    pub struct ScriptedService {
        replies: Mutex<VecDeque<Result<Vec<u8>, ProviderError>>>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedService {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a Claude-shaped response carrying `text`.
        pub fn reply_text(self, text: &str) -> Self {
            let body = serde_json::json!({"content": [{"type": "text", "text": text}]});
            self.reply_raw(Ok(body.to_string().into_bytes()))
        }

        pub fn reply_err(self, err: ProviderError) -> Self {
            self.reply_raw(Err(err))
        }

        pub fn reply_raw(self, reply: Result<Vec<u8>, ProviderError>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub fn called_models(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl ReasoningService for ScriptedService {
        async fn invoke(&self, model_id: &str, body: &RequestBody) -> Result<Vec<u8>, ProviderError> {
            let body = serde_json::to_value(body).unwrap();
            self.calls.lock().unwrap().push((model_id.to_string(), body));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::new(model_id, ProviderErrorKind::Transport, "no scripted reply")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedService;
    use super::*;
    use crate::document::prepare;

    const PRIMARY: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";
    const FALLBACK: &str = "amazon.nova-pro-v1:0";

    fn models(fallback: &str) -> ModelSettings {
        ModelSettings {
            primary: PRIMARY.to_string(),
            fallback: fallback.to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_on_primary() {
        let service = ScriptedService::new().reply_text("{\"ok\":true}");
        let invoker = ModelInvoker::new(service, models(FALLBACK));
        let docs = vec![prepare("x.pdf", b"pdf".to_vec())];

        let response = invoker.invoke(PRIMARY, "prompt", &docs).await.unwrap();
        assert_eq!(response.text, "{\"ok\":true}");
        assert_eq!(response.model_used, PRIMARY);
        assert_eq!(invoker.service.called_models(), vec![PRIMARY]);
    }

    #[tokio::test]
    async fn test_fails_over_on_inference_profile_error() {
        let service = ScriptedService::new()
            .reply_err(ProviderError::from_message(
                PRIMARY,
                "Retry your request with the ID or ARN of an inference profile that contains this model.",
                ProviderErrorKind::Http(400),
            ))
            .reply_raw(Ok(br#"{"output":{"message":{"content":[{"text":"from nova"}]}}}"#.to_vec()));
        let invoker = ModelInvoker::new(service, models(FALLBACK));

        let response = invoker.invoke(PRIMARY, "prompt", &[]).await.unwrap();
        assert_eq!(response.model_used, FALLBACK);
        assert_eq!(response.text, "from nova");
        assert_eq!(invoker.service.called_models(), vec![PRIMARY, FALLBACK]);
    }

    #[tokio::test]
    async fn test_fallback_body_uses_fallback_family() {
        let service = ScriptedService::new()
            .reply_err(ProviderError::new(PRIMARY, ProviderErrorKind::EndOfLife, "retired"))
            .reply_text("ok");
        let invoker = ModelInvoker::new(service, models(FALLBACK));
        let docs = vec![prepare("x.pdf", b"pdf".to_vec())];

        invoker.invoke(PRIMARY, "prompt", &docs).await.unwrap();
        let calls = invoker.service.calls.lock().unwrap();
        assert!(calls[0].1.get("anthropic_version").is_some());
        // the image-only family drops the pdf and keeps the prompt
        assert_eq!(calls[1].1["messages"][0]["content"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let service = ScriptedService::new()
            .reply_err(ProviderError::new(PRIMARY, ProviderErrorKind::Http(429), "Too many requests"));
        let invoker = ModelInvoker::new(service, models(FALLBACK));

        let err = invoker.invoke(PRIMARY, "prompt", &[]).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Http(429));
        assert_eq!(invoker.service.called_models(), vec![PRIMARY]);
    }

    #[tokio::test]
    async fn test_no_fallback_configured() {
        let service = ScriptedService::new()
            .reply_err(ProviderError::new(PRIMARY, ProviderErrorKind::InvalidModelId, "bad id"));
        let invoker = ModelInvoker::new(service, models(""));

        let err = invoker.invoke(PRIMARY, "prompt", &[]).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidModelId);
        assert_eq!(invoker.service.called_models().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates() {
        let service = ScriptedService::new()
            .reply_err(ProviderError::new(PRIMARY, ProviderErrorKind::InvalidModelId, "bad id"))
            .reply_err(ProviderError::new(FALLBACK, ProviderErrorKind::Http(500), "boom"));
        let invoker = ModelInvoker::new(service, models(FALLBACK));

        let err = invoker.invoke(PRIMARY, "prompt", &[]).await.unwrap_err();
        assert_eq!(err.model_id, FALLBACK);
        assert_eq!(invoker.service.called_models().len(), 2);
    }

    #[tokio::test]
    async fn test_non_json_response_is_decode_error() {
        let service = ScriptedService::new().reply_raw(Ok(b"<html>".to_vec()));
        let invoker = ModelInvoker::new(service, models(""));

        let err = invoker.invoke(PRIMARY, "prompt", &[]).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Decode);
    }

    #[test]
    fn test_snippet_char_boundary() {
        assert_eq!(snippet("請求書です", 3), "請求書");
        assert_eq!(snippet("abc", 10), "abc");
    }
}
