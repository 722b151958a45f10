// src/model/family.rs

use crate::document::{DocumentPayload, MediaType};
use serde::Serialize;
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Request/response dialect of a model, inferred from its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Accepts inline PDF documents and images.
    DocumentCapable,
    /// Accepts images only; PDFs are dropped.
    ImageOnly,
    /// Prompt string only.
    TextOnly,
}

impl ModelFamily {
    pub fn from_model_id(model_id: &str) -> Self {
        if model_id.contains("anthropic") || model_id.contains("claude") {
            ModelFamily::DocumentCapable
        } else if model_id.contains("nova") {
            ModelFamily::ImageOnly
        } else {
            // amazon.titan-text* and anything unrecognised
            ModelFamily::TextOnly
        }
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Messages(MessagesRequest),
    Converse(ConverseRequest),
    Text(TextRequest),
}

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    anthropic_version: &'static str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<UserMessage<ContentBlock>>,
}

#[derive(Debug, Serialize)]
pub struct UserMessage<T> {
    role: &'static str,
    content: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Document { source: Base64Source },
    Image { source: Base64Source },
    Text { text: String },
}

#[derive(Debug, Serialize)]
pub struct Base64Source {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
pub struct ConverseRequest {
    messages: Vec<UserMessage<ConversePart>>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ConversePart {
    Text { text: String },
    Image { image: ConverseImage },
}

#[derive(Debug, Serialize)]
pub struct ConverseImage {
    format: &'static str,
    source: ConverseBytes,
}

#[derive(Debug, Serialize)]
pub struct ConverseBytes {
    bytes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    input_text: String,
    text_generation_config: TextGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationConfig {
    max_token_count: u32,
    temperature: f64,
    top_p: f64,
}

/// Build the family-specific request body. Temperature is always 0.
pub fn build_request_body(
    family: ModelFamily,
    prompt: &str,
    documents: &[DocumentPayload],
) -> RequestBody {
    match family {
        ModelFamily::DocumentCapable => {
            let mut content: Vec<ContentBlock> = documents
                .iter()
                .map(|doc| {
                    let source = Base64Source {
                        kind: "base64",
                        media_type: doc.media_type.mime(),
                        data: doc.base64(),
                    };
                    match doc.media_type {
                        MediaType::Pdf => ContentBlock::Document { source },
                        _ => ContentBlock::Image { source },
                    }
                })
                .collect();
            content.push(ContentBlock::Text {
                text: prompt.to_string(),
            });

            RequestBody::Messages(MessagesRequest {
                anthropic_version: ANTHROPIC_VERSION,
                max_tokens: 4096,
                temperature: 0.0,
                messages: vec![UserMessage {
                    role: "user",
                    content,
                }],
            })
        }
        ModelFamily::ImageOnly => {
            let mut content = vec![ConversePart::Text {
                text: prompt.to_string(),
            }];
            content.extend(
                documents
                    .iter()
                    .filter(|doc| doc.media_type.is_image())
                    .map(|img| ConversePart::Image {
                        image: ConverseImage {
                            format: img.media_type.format(),
                            source: ConverseBytes {
                                bytes: img.base64(),
                            },
                        },
                    }),
            );

            RequestBody::Converse(ConverseRequest {
                messages: vec![UserMessage {
                    role: "user",
                    content,
                }],
                inference_config: InferenceConfig {
                    max_tokens: 2048,
                    temperature: 0.0,
                },
            })
        }
        ModelFamily::TextOnly => RequestBody::Text(TextRequest {
            input_text: prompt.to_string(),
            text_generation_config: TextGenerationConfig {
                max_token_count: 2048,
                temperature: 0.0,
                top_p: 1.0,
            },
        }),
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// Pull the first text-bearing element out of a decoded response, whatever
/// family produced it. No match yields an empty string.
pub fn response_text(decoded: &Value) -> String {
    // text-only: {"results":[{"outputText": "..."}]}
    if let Some(text) = decoded
        .pointer("/results/0/outputText")
        .and_then(Value::as_str)
    {
        return text.to_string();
    }

    // image-only: {"output":{"message":{"content":[{"text": "..."}]}}}
    if let Some(parts) = decoded
        .pointer("/output/message/content")
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
    {
        return first_text(parts);
    }

    // document-capable: {"content":[{"type":"text","text":"..."}]}
    if let Some(parts) = decoded
        .get("content")
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
    {
        return first_text(parts);
    }

    if let Some(text) = decoded.get("completion").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(text) = decoded.pointer("/message/content").and_then(Value::as_str) {
        return text.to_string();
    }
    String::new()
}

fn first_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}
