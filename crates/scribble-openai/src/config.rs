//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection and model settings for an OpenAI-compatible endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer token; usually supplied through `OPENAI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model for prompt generation
    pub text_model: String,
    /// Vision-capable model for judging drawings
    pub vision_model: String,
    /// Image model for rewards
    pub image_model: String,
    /// Reward image size
    pub image_size: String,
    /// Response token cap for chat calls
    pub max_tokens: u32,
    /// Client-side request timeout in seconds
    pub request_timeout_secs: u64,
}

impl OpenAiConfig {
    /// Default settings with an API key
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `base_url` joined with `path`
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            text_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            max_tokens: 300,
            request_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .field("image_model", &self.image_model)
            .field("image_size", &self.image_size)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        let config = OpenAiConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..OpenAiConfig::default()
        };
        assert_eq!(
            config.endpoint("/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn api_key_is_redacted_and_not_serialized() {
        let config = OpenAiConfig::with_api_key("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn partial_tables_fill_defaults() {
        let config: OpenAiConfig = serde_json::from_str(r#"{"vision_model": "gpt-4.1"}"#).unwrap();
        assert_eq!(config.vision_model, "gpt-4.1");
        assert_eq!(config.image_model, "dall-e-3");
        assert_eq!(config.api_key, None);
    }
}
