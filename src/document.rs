// src/document.rs

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Media types the model can be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
}

impl MediaType {
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        }
    }

    /// Short format name used by image-only model families.
    pub fn format(self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Png => "png",
            MediaType::Jpeg => "jpeg",
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, MediaType::Pdf)
    }
}

/// An attachment ready to be sent to the model.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

impl DocumentPayload {
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Classify an attachment by its key's extension. Unknown extensions are
/// treated as PDF since inbound documents are scan-like.
pub fn prepare(key: &str, bytes: Vec<u8>) -> DocumentPayload {
    let lower = key.to_lowercase();
    let media_type = if lower.ends_with(".png") {
        MediaType::Png
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        MediaType::Jpeg
    } else {
        MediaType::Pdf
    };
    DocumentPayload { media_type, bytes }
}
