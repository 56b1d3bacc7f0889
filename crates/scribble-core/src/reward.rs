//! Reward synthesis
//!
//! Turns a passing verdict into a celebratory image request and validates
//! what the image-generation capability returns.

use crate::capability::{GeneratedImage, ImageGenerator, ImageRequest};
use crate::config::RewardConfig;
use crate::error::{Capability, GameError};
use crate::retry::RetryLayer;
use crate::types::{Prompt, Reward, RewardImage, Verdict};
use chrono::Utc;
use std::sync::Arc;

const MAX_FEEDBACK_IN_REQUEST: usize = 200;

/// Image-backed reward generator
pub struct RewardSynthesizer {
    images: Arc<dyn ImageGenerator>,
    config: RewardConfig,
    retry: RetryLayer,
}

impl RewardSynthesizer {
    /// Create synthesizer
    #[must_use]
    pub fn new(images: Arc<dyn ImageGenerator>, config: RewardConfig, retry: RetryLayer) -> Self {
        Self {
            images,
            config,
            retry,
        }
    }

    /// Generate the reward for a passing verdict
    ///
    /// # Errors
    /// - `InvalidInput` for failing verdicts or a verdict for another prompt
    /// - `CapabilityRefused` on content-policy rejection or an unusable image
    /// - `CapabilityExhausted` when the generator stays unreachable
    pub async fn synthesize(&self, prompt: &Prompt, verdict: &Verdict) -> Result<Reward, GameError> {
        if !verdict.passed {
            return Err(GameError::invalid("rewards are only granted for passing drawings"));
        }
        if verdict.prompt_id != prompt.id {
            return Err(GameError::invalid("verdict belongs to a different prompt"));
        }

        let request = ImageRequest {
            description: describe(prompt, verdict),
            style: self.config.style.clone(),
        };
        tracing::debug!(subject = %prompt.subject, "requesting reward image");

        let generated = self
            .retry
            .call(Capability::ImageGeneration, || {
                self.images.generate_image(request.clone())
            })
            .await?;
        let image = self.validate(generated)?;

        Ok(Reward {
            prompt_id: prompt.id,
            drawing_id: verdict.drawing_id,
            image,
            style: request.style,
            degraded: false,
            created_at: Utc::now(),
        })
    }

    /// Degraded reward pointing at the configured placeholder image
    #[must_use]
    pub fn placeholder(&self, verdict: &Verdict) -> Reward {
        Reward::placeholder(verdict, self.config.placeholder_url.as_str())
    }

    fn validate(&self, image: GeneratedImage) -> Result<RewardImage, GameError> {
        match image {
            GeneratedImage::Bytes(bytes) => {
                let len = bytes.len();
                if len == 0 || len < self.config.min_image_bytes || len > self.config.max_image_bytes {
                    return Err(GameError::malformed(
                        Capability::ImageGeneration,
                        format!(
                            "image of {len} bytes outside [{}, {}]",
                            self.config.min_image_bytes, self.config.max_image_bytes
                        ),
                    ));
                }
                Ok(RewardImage::Bytes(bytes))
            }
            GeneratedImage::Url(url) => {
                let url = url.trim();
                let valid = ["https://", "http://"]
                    .iter()
                    .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
                    && !url.contains(char::is_whitespace);
                if !valid {
                    return Err(GameError::malformed(
                        Capability::ImageGeneration,
                        format!("not an http(s) image url: {url:?}"),
                    ));
                }
                Ok(RewardImage::Url(url.to_string()))
            }
        }
    }
}

fn describe(prompt: &Prompt, verdict: &Verdict) -> String {
    let mut description = format!(
        "A celebratory picture for a child who just drew {} in a drawing game.",
        prompt.subject
    );
    if let Some(seen) = verdict
        .recognized
        .as_deref()
        .filter(|seen| !seen.eq_ignore_ascii_case(&prompt.subject))
    {
        description.push_str(&format!(" Their drawing looked like {seen}."));
    }
    let feedback = verdict.feedback.trim();
    if !feedback.is_empty() {
        let feedback: String = feedback.chars().take(MAX_FEEDBACK_IN_REQUEST).collect();
        description.push_str(&format!(" The judge said: \"{feedback}\"."));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MockImageGenerator;
    use crate::config::RetryPolicy;
    use crate::error::{CapabilityError, RefusalKind};
    use crate::health::HealthMonitor;
    use crate::types::{DrawingId, PromptSource, ShapeHints};

    fn synthesizer(mock: MockImageGenerator) -> RewardSynthesizer {
        let retry = RetryLayer::new(
            RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
                call_timeout_ms: 100,
            },
            HealthMonitor::new(),
        );
        RewardSynthesizer::new(Arc::new(mock), RewardConfig::default(), retry)
    }

    fn round(passed: bool) -> (Prompt, Verdict) {
        let prompt = Prompt::new("rocket", ShapeHints::default(), 3, PromptSource::Generated);
        let verdict = Verdict {
            drawing_id: DrawingId::new(),
            prompt_id: prompt.id,
            passed,
            similarity: if passed { 0.9 } else { 0.2 },
            feedback: "Great flames!".into(),
            recognized: Some("spaceship".into()),
            cached: false,
            judged_at: Utc::now(),
        };
        (prompt, verdict)
    }

    #[tokio::test]
    async fn failing_verdict_gets_no_reward() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image().times(0);
        let (prompt, verdict) = round(false);
        let result = synthesizer(mock).synthesize(&prompt, &verdict).await;
        assert!(matches!(result, Err(GameError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn request_carries_subject_and_style() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .withf(|req| {
                req.description.contains("rocket")
                    && req.description.contains("spaceship")
                    && req.description.contains("Great flames!")
                    && req.style.contains("storybook")
            })
            .times(1)
            .returning(|_| Ok(GeneratedImage::Url("https://img.example/r.png".into())));

        let (prompt, verdict) = round(true);
        let reward = synthesizer(mock).synthesize(&prompt, &verdict).await.unwrap();
        assert_eq!(reward.image, RewardImage::Url("https://img.example/r.png".into()));
        assert_eq!(reward.prompt_id, prompt.id);
        assert_eq!(reward.drawing_id, verdict.drawing_id);
        assert!(!reward.degraded);
    }

    #[tokio::test]
    async fn undersized_image_is_rejected() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .times(1)
            .returning(|_| Ok(GeneratedImage::Bytes(vec![0; 10])));
        let (prompt, verdict) = round(true);
        let result = synthesizer(mock).synthesize(&prompt, &verdict).await;
        assert!(matches!(
            result,
            Err(GameError::CapabilityRefused {
                kind: RefusalKind::MalformedResponse,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn non_http_url_is_rejected() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .times(1)
            .returning(|_| Ok(GeneratedImage::Url("ftp://img.example/r.png".into())));
        let (prompt, verdict) = round(true);
        assert!(synthesizer(mock).synthesize(&prompt, &verdict).await.is_err());
    }

    #[tokio::test]
    async fn content_policy_is_not_retried() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .times(1)
            .returning(|_| Err(CapabilityError::ContentPolicy("safety system".into())));
        let (prompt, verdict) = round(true);
        let result = synthesizer(mock).synthesize(&prompt, &verdict).await;
        assert!(matches!(
            result,
            Err(GameError::CapabilityRefused {
                kind: RefusalKind::ContentPolicy,
                ..
            })
        ));
    }

    #[test]
    fn placeholder_is_degraded() {
        let synth = synthesizer(MockImageGenerator::new());
        let (_, verdict) = round(true);
        let reward = synth.placeholder(&verdict);
        assert!(reward.degraded);
        assert_eq!(
            reward.image,
            RewardImage::Url(RewardConfig::default().placeholder_url)
        );
    }

    #[test]
    fn description_skips_matching_recognition() {
        let (prompt, mut verdict) = round(true);
        verdict.recognized = Some("Rocket".into());
        verdict.feedback.clear();
        let text = describe(&prompt, &verdict);
        assert!(!text.contains("looked like"));
        assert!(!text.contains("judge said"));
    }
}
