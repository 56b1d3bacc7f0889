//! Request and response bodies for the chat and image endpoints

#![allow(missing_docs)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use scribble_core::{CapabilityError, GeneratedImage};
use serde::{Deserialize, Serialize};

/// `POST /chat/completions` body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message with text followed by an inline PNG
    pub fn user_with_png(text: impl Into<String>, png: &[u8]) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: png_data_url(png),
                    },
                },
            ]),
        }
    }
}

/// Plain or multi-part content
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// `POST /chat/completions` response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice
    ///
    /// # Errors
    /// - `ContentPolicy` for refusals and filtered completions
    /// - `Malformed` when there is no usable text
    pub fn into_text(self) -> Result<String, CapabilityError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::Malformed("response has no choices".into()))?;

        if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(CapabilityError::ContentPolicy(refusal));
        }
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(CapabilityError::ContentPolicy(
                "completion stopped by content filter".into(),
            ));
        }
        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CapabilityError::Malformed("response has no content".into()))
    }
}

/// `POST /images/generations` body
#[derive(Debug, Clone, Serialize)]
pub struct ImagesRequest {
    pub model: String,
    pub prompt: String,
    pub n: u8,
    pub size: String,
}

/// `POST /images/generations` response
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
}

impl ImagesResponse {
    /// First image, as URL or decoded bytes
    ///
    /// # Errors
    /// `Malformed` when no image is present or base64 does not decode
    pub fn into_image(self) -> Result<GeneratedImage, CapabilityError> {
        let first = self
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::Malformed("response has no images".into()))?;
        match (first.url, first.b64_json) {
            (Some(url), _) if !url.trim().is_empty() => Ok(GeneratedImage::Url(url)),
            (_, Some(b64)) => STANDARD
                .decode(b64.trim())
                .map(GeneratedImage::Bytes)
                .map_err(|e| CapabilityError::Malformed(format!("bad base64 image: {e}"))),
            _ => Err(CapabilityError::Malformed("image has neither url nor data".into())),
        }
    }
}

/// `data:image/png;base64,...` URL for inline images
#[must_use]
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
