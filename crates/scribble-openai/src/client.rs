//! OpenAI-compatible client implementing the three capabilities

use crate::config::OpenAiConfig;
use crate::http::{check_response, map_transport_error};
use crate::wire::{ChatMessage, ChatRequest, ChatResponse, ImagesRequest, ImagesResponse};
use async_trait::async_trait;
use scribble_core::{
    CapabilityError, GeneratedImage, ImageGenerator, ImageRequest, TextGenerator, TextRequest,
    TextResponse, VisionRequest, VisionResponse, VisionScorer,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

const PROMPT_SYSTEM: &str =
    "You invent drawing challenges for a children's drawing game. Keep subjects simple, concrete and friendly.";
const JUDGE_SYSTEM: &str =
    "You are a kind art teacher judging children's drawings. Answer exactly in the requested format.";

/// Client construction failures
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    /// No API key configured
    #[error("no API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP client for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiClient {
    /// Build client
    ///
    /// # Errors
    /// `MissingApiKey` without a non-empty key, `Client` if reqwest fails
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OpenAiError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, CapabilityError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "openai request");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let resp = check_response(resp).await?;
        resp.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::Timeout
            } else {
                CapabilityError::Malformed(e.to_string())
            }
        })
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, CapabilityError> {
        let response: ChatResponse = self.post("chat/completions", &request).await?;
        response.into_text()
    }
}

/// Chat body for prompt generation
#[must_use]
pub fn text_request(config: &OpenAiConfig, request: &TextRequest) -> ChatRequest {
    let mut user = request.task.clone();
    if !request.constraints.is_empty() {
        user.push_str("\n\nConstraints:");
        for constraint in &request.constraints {
            user.push_str("\n- ");
            user.push_str(constraint);
        }
    }
    ChatRequest {
        model: config.text_model.clone(),
        messages: vec![ChatMessage::system(PROMPT_SYSTEM), ChatMessage::user(user)],
        max_tokens: config.max_tokens,
        temperature: Some(0.9),
    }
}

/// Chat body for drawing judgment
#[must_use]
pub fn vision_request(config: &OpenAiConfig, request: &VisionRequest) -> ChatRequest {
    let text = format!(
        "{}\n\nReference: {}",
        request.instructions, request.reference
    );
    ChatRequest {
        model: config.vision_model.clone(),
        messages: vec![
            ChatMessage::system(JUDGE_SYSTEM),
            ChatMessage::user_with_png(text, &request.image_png),
        ],
        max_tokens: config.max_tokens,
        temperature: Some(0.2),
    }
}

/// Body for reward image generation
#[must_use]
pub fn image_request(config: &OpenAiConfig, request: &ImageRequest) -> ImagesRequest {
    ImagesRequest {
        model: config.image_model.clone(),
        prompt: request.prompt_text(),
        n: 1,
        size: config.image_size.clone(),
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_text(&self, request: TextRequest) -> Result<TextResponse, CapabilityError> {
        let text = self.chat(text_request(&self.config, &request)).await?;
        Ok(TextResponse { text })
    }
}

#[async_trait]
impl VisionScorer for OpenAiClient {
    async fn score(&self, request: VisionRequest) -> Result<VisionResponse, CapabilityError> {
        let text = self.chat(vision_request(&self.config, &request)).await?;
        Ok(VisionResponse {
            text: Some(text),
            score: None,
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, request: ImageRequest) -> Result<GeneratedImage, CapabilityError> {
        let body = image_request(&self.config, &request);
        let response: ImagesResponse = self.post("images/generations", &body).await?;
        response.into_image()
    }
}
