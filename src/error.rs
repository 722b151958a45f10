// src/error.rs

use thiserror::Error;

/// Category of a reasoning-service failure.
///
/// The first six variants mean the requested model cannot serve this call at
/// all; a different model id may still succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    NoOnDemandThroughput,
    InferenceProfileRequired,
    EndOfLife,
    InvalidModelId,
    MalformedRequest,
    SubscriptionRequired,
    Http(u16),
    Transport,
    Decode,
}

/// Provider phrases and the category each one signals. Matched case-sensitively
/// against the provider's message, except where both casings occur in the wild.
const UNUSABLE_MODEL_PHRASES: &[(&str, ProviderErrorKind)] = &[
    (
        "on-demand throughput isn't supported",
        ProviderErrorKind::NoOnDemandThroughput,
    ),
    ("inference profile", ProviderErrorKind::InferenceProfileRequired),
    ("Inference profile", ProviderErrorKind::InferenceProfileRequired),
    ("reached the end of its life", ProviderErrorKind::EndOfLife),
    ("model identifier is invalid", ProviderErrorKind::InvalidModelId),
    ("Malformed input request", ProviderErrorKind::MalformedRequest),
    ("extraneous key", ProviderErrorKind::MalformedRequest),
    (
        "aws-marketplace:ViewSubscriptions",
        ProviderErrorKind::SubscriptionRequired,
    ),
    ("aws-marketplace:Subscribe", ProviderErrorKind::SubscriptionRequired),
    ("Marketplace subscription", ProviderErrorKind::SubscriptionRequired),
];

impl ProviderErrorKind {
    /// Classify a provider message. `fallback` is used when no known phrase matches.
    pub fn classify(message: &str, fallback: ProviderErrorKind) -> ProviderErrorKind {
        UNUSABLE_MODEL_PHRASES
            .iter()
            .find(|(phrase, _)| message.contains(phrase))
            .map(|(_, kind)| kind.clone())
            .unwrap_or(fallback)
    }

    pub fn is_model_unusable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::NoOnDemandThroughput
                | ProviderErrorKind::InferenceProfileRequired
                | ProviderErrorKind::EndOfLife
                | ProviderErrorKind::InvalidModelId
                | ProviderErrorKind::MalformedRequest
                | ProviderErrorKind::SubscriptionRequired
        )
    }
}

/// A failed call to the reasoning service.
#[derive(Debug, Clone, Error)]
#[error("model {model_id} failed ({kind:?}): {message}")]
pub struct ProviderError {
    pub model_id: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(model_id: &str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            model_id: model_id.to_string(),
            kind,
            message: message.into(),
        }
    }

    /// Build an error from a raw provider message, classifying it on the way in.
    pub fn from_message(model_id: &str, message: impl Into<String>, fallback: ProviderErrorKind) -> Self {
        let message = message.into();
        let kind = ProviderErrorKind::classify(&message, fallback);
        Self::new(model_id, kind, message)
    }
}

/// Object-store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can fail a single work item.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to parse AI response as JSON")]
    ExtractionParse,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("state store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_phrases() {
        let msg = "Invocation of model ID foo with on-demand throughput isn't supported. Retry with an inference profile.";
        assert_eq!(
            ProviderErrorKind::classify(msg, ProviderErrorKind::Http(400)),
            ProviderErrorKind::NoOnDemandThroughput
        );
        assert_eq!(
            ProviderErrorKind::classify(
                "Model access is denied due to IAM user or service role is not authorized to perform the required AWS Marketplace actions (aws-marketplace:ViewSubscriptions)",
                ProviderErrorKind::Http(403)
            ),
            ProviderErrorKind::SubscriptionRequired
        );
        assert_eq!(
            ProviderErrorKind::classify("The provided model identifier is invalid.", ProviderErrorKind::Http(400)),
            ProviderErrorKind::InvalidModelId
        );
    }

    #[test]
    fn test_classify_unknown_keeps_fallback() {
        let kind = ProviderErrorKind::classify("Too many requests", ProviderErrorKind::Http(429));
        assert_eq!(kind, ProviderErrorKind::Http(429));
        assert!(!kind.is_model_unusable());
    }

    #[test]
    fn test_parse_error_message() {
        assert_eq!(
            PipelineError::ExtractionParse.to_string(),
            "Failed to parse AI response as JSON"
        );
        let err = PipelineError::from(StorageError::NotFound("attachments/a.pdf".into()));
        assert!(err.to_string().contains("attachments/a.pdf"));
    }
}
