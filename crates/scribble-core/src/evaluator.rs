//! Drawing evaluation
//!
//! Validates a submission locally, sends it to the vision-scoring capability
//! as a PNG with the prompt's reference description, and normalizes whatever
//! comes back into a [`Verdict`]. Judgments are cached by content hash so an
//! identical resubmission for the same subject is not judged twice.

use crate::canvas::{self, EncodedDrawing};
use crate::capability::{VisionRequest, VisionScorer};
use crate::config::EvaluationConfig;
use crate::error::{Capability, GameError};
use crate::normalize::{normalize_judgment, Judgment};
use crate::retry::RetryLayer;
use crate::types::{Drawing, DrawingData, Prompt, Verdict};
use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Instructions sent with every judgment request
pub const JUDGE_INSTRUCTIONS: &str = "You are judging a child's drawing in a friendly drawing game. \
Describe what you see in one short sentence, then rate how well the drawing matches the \
reference from 0.0 to 1.0. Be encouraging: simple shapes that capture the idea should score \
well. Respond with JSON: {\"score\": number, \"recognized\": string, \"feedback\": string}.";

/// Cache key for a judgment: encoded image plus subject
#[must_use]
pub fn cache_key(png: &[u8], subject: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(png);
    hasher.update(&[0]);
    hasher.update(subject.trim().to_lowercase().as_bytes());
    hasher.finalize()
}

/// Vision-backed drawing judge
pub struct DrawingEvaluator {
    vision: Arc<dyn VisionScorer>,
    config: EvaluationConfig,
    retry: RetryLayer,
    cache: Cache<blake3::Hash, Judgment>,
}

impl DrawingEvaluator {
    /// Create evaluator
    #[must_use]
    pub fn new(vision: Arc<dyn VisionScorer>, config: EvaluationConfig, retry: RetryLayer) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.verdict_cache_capacity)
            .time_to_live(Duration::from_secs(config.verdict_cache_ttl_secs))
            .build();
        Self {
            vision,
            config,
            retry,
            cache,
        }
    }

    /// Pass threshold in use
    #[inline]
    #[must_use]
    pub fn pass_threshold(&self) -> f64 {
        self.config.pass_threshold
    }

    /// Local checks run before any external call
    ///
    /// Rendering and decoding run on the blocking pool.
    ///
    /// # Errors
    /// `InvalidInput` when the drawing targets another prompt, is empty,
    /// too large, undecodable or has too little ink
    pub async fn check_preconditions(
        &self,
        drawing: &Drawing,
        prompt: &Prompt,
    ) -> Result<EncodedDrawing, GameError> {
        if drawing.prompt_id != prompt.id {
            return Err(GameError::invalid(format!(
                "drawing answers prompt {} but the active prompt is {}",
                drawing.prompt_id, prompt.id
            )));
        }
        if drawing.is_blank() {
            return Err(GameError::invalid("drawing is empty"));
        }

        let size = canvas::payload_size(&drawing.data);
        if size > self.config.max_payload_bytes {
            return Err(GameError::invalid(format!(
                "drawing is {size} bytes, limit is {}",
                self.config.max_payload_bytes
            )));
        }

        let data = drawing.data.clone();
        let encoded = tokio::task::spawn_blocking(move || canvas::encode(&data))
            .await
            .map_err(|e| GameError::invalid(format!("drawing could not be rendered: {e}")))??;
        if matches!(drawing.data, DrawingData::Raster { .. })
            && encoded.ink_pixels < self.config.min_ink_pixels
        {
            return Err(GameError::invalid("drawing is blank"));
        }
        Ok(encoded)
    }

    /// Judge a drawing against its prompt
    ///
    /// # Errors
    /// - `InvalidInput` from [`Self::check_preconditions`]
    /// - `CapabilityRefused` when the scorer's answer cannot be normalized
    /// - `CapabilityExhausted` when the scorer stays unreachable
    pub async fn evaluate(&self, drawing: &Drawing, prompt: &Prompt) -> Result<Verdict, GameError> {
        let encoded = self.check_preconditions(drawing, prompt).await?;
        self.judge(drawing, prompt, encoded).await
    }

    /// Judge a drawing that already passed [`Self::check_preconditions`]
    ///
    /// # Errors
    /// `CapabilityRefused` or `CapabilityExhausted` from the scorer
    pub async fn judge(
        &self,
        drawing: &Drawing,
        prompt: &Prompt,
        encoded: EncodedDrawing,
    ) -> Result<Verdict, GameError> {
        let key = cache_key(&encoded.png, &prompt.subject);

        if let Some(judgment) = self.cache.get(&key).await {
            tracing::debug!(drawing = %drawing.id, subject = %prompt.subject, "verdict cache hit");
            return Ok(self.verdict(drawing, judgment, true));
        }

        let request = VisionRequest {
            image_png: encoded.png,
            reference: prompt.reference_description(),
            instructions: JUDGE_INSTRUCTIONS.to_string(),
        };
        tracing::debug!(
            drawing = %drawing.id,
            width = encoded.width,
            height = encoded.height,
            ink = encoded.ink_pixels,
            "requesting judgment"
        );

        let response = self
            .retry
            .call(Capability::VisionScoring, || self.vision.score(request.clone()))
            .await?;

        let judgment = normalize_judgment(&response)
            .map_err(|e| GameError::malformed(Capability::VisionScoring, e.to_string()))?;

        self.cache.insert(key, judgment.clone()).await;
        Ok(self.verdict(drawing, judgment, false))
    }

    fn verdict(&self, drawing: &Drawing, judgment: Judgment, cached: bool) -> Verdict {
        Verdict {
            drawing_id: drawing.id,
            prompt_id: drawing.prompt_id,
            passed: judgment.similarity >= self.config.pass_threshold,
            similarity: judgment.similarity,
            feedback: judgment.feedback,
            recognized: judgment.recognized,
            cached,
            judged_at: Utc::now(),
        }
    }
}
