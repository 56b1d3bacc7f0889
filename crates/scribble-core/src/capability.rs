//! External capability boundaries
//!
//! The core depends on three request/response services and nothing about
//! the vendor behind them. Adapters implement these traits; the components
//! wrap every call in the retry layer.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Text-generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRequest {
    /// What to produce
    pub task: String,
    /// Constraints on the output
    pub constraints: Vec<String>,
}

impl TextRequest {
    /// Create request
    #[inline]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            constraints: Vec::new(),
        }
    }

    /// Add constraint
    #[inline]
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }
}

/// Text-generation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResponse {
    /// Generated text
    pub text: String,
}

/// Vision-scoring request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    /// PNG-encoded drawing
    pub image_png: Vec<u8>,
    /// Description of what the drawing should show
    pub reference: String,
    /// Instructions for the shape of the answer
    pub instructions: String,
}

/// Vision-scoring response; either part may be missing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisionResponse {
    /// Judgment prose
    pub text: Option<String>,
    /// Numeric score, when the service provides one
    pub score: Option<f64>,
}

/// Image-generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// What to depict
    pub description: String,
    /// Style modifier
    pub style: String,
}

impl ImageRequest {
    /// Full prompt text sent to the generator
    #[must_use]
    pub fn prompt_text(&self) -> String {
        if self.style.is_empty() {
            self.description.clone()
        } else {
            format!("{} Style: {}.", self.description, self.style)
        }
    }
}

/// Generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedImage {
    /// Hosted result
    Url(String),
    /// Inline result
    Bytes(Vec<u8>),
}

/// Text-generation capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a task
    async fn generate_text(&self, request: TextRequest) -> Result<TextResponse, CapabilityError>;
}

/// Vision-scoring capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionScorer: Send + Sync {
    /// Judge an image against a reference description
    async fn score(&self, request: VisionRequest) -> Result<VisionResponse, CapabilityError>;
}

/// Image-generation capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render an image
    async fn generate_image(&self, request: ImageRequest)
        -> Result<GeneratedImage, CapabilityError>;
}

/// The three capabilities the engine needs
#[derive(Clone)]
pub struct Capabilities {
    /// Prompt generation
    pub text: Arc<dyn TextGenerator>,
    /// Drawing judgment
    pub vision: Arc<dyn VisionScorer>,
    /// Reward images
    pub images: Arc<dyn ImageGenerator>,
}

impl Capabilities {
    /// Bundle capabilities
    #[must_use]
    pub fn new(
        text: Arc<dyn TextGenerator>,
        vision: Arc<dyn VisionScorer>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            text,
            vision,
            images,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
