//! Challenge generation
//!
//! Asks the text-generation capability for a subject suited to the level,
//! validates the answer through the normalization layer, and falls back to a
//! deterministic built-in pool when the capability is unreachable, refuses,
//! or keeps answering with unusable text.

use crate::capability::{TextGenerator, TextRequest};
use crate::config::GenerationConfig;
use crate::error::Capability;
use crate::normalize::parse_prompt;
use crate::retry::RetryLayer;
use crate::types::{DifficultyTier, Prompt, PromptSource, ShapeHints};
use std::sync::Arc;

/// Built-in prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackEntry {
    /// Subject text
    pub subject: &'static str,
    /// Primitive shapes
    pub primitives: &'static [&'static str],
    /// Tier the entry belongs to
    pub tier: DifficultyTier,
}

const fn entry(
    subject: &'static str,
    primitives: &'static [&'static str],
    tier: DifficultyTier,
) -> FallbackEntry {
    FallbackEntry {
        subject,
        primitives,
        tier,
    }
}

const DEFAULT_ENTRY: FallbackEntry = entry("cat", &["circle", "triangle"], DifficultyTier::Easy);

/// Deterministic prompt pool used when generation is unavailable
pub static FALLBACK_POOL: &[FallbackEntry] = &[
    DEFAULT_ENTRY,
    entry("house", &["square", "triangle"], DifficultyTier::Easy),
    entry("car", &["rectangle", "circle"], DifficultyTier::Easy),
    entry("tree", &["rectangle", "circle"], DifficultyTier::Easy),
    entry("flower", &["circle", "line"], DifficultyTier::Easy),
    entry("sun", &["circle", "line"], DifficultyTier::Easy),
    entry("fish", &["oval", "triangle"], DifficultyTier::Easy),
    entry("snowman", &["circle", "circle"], DifficultyTier::Medium),
    entry("rocket", &["triangle", "rectangle"], DifficultyTier::Medium),
    entry("ice cream cone", &["triangle", "circle"], DifficultyTier::Medium),
    entry("umbrella", &["semicircle", "line"], DifficultyTier::Medium),
    entry("sailboat", &["triangle", "trapezoid"], DifficultyTier::Medium),
    entry("bird on a branch", &["oval", "triangle", "line"], DifficultyTier::Hard),
    entry("fish in a bowl", &["circle", "oval", "triangle"], DifficultyTier::Hard),
    entry("house with a tree", &["square", "triangle", "circle"], DifficultyTier::Hard),
    entry("sun over mountains", &["circle", "triangle", "line"], DifficultyTier::Hard),
    entry(
        "beach with a boat, the sun and a palm tree",
        &["triangle", "circle", "line", "oval"],
        DifficultyTier::Expert,
    ),
    entry(
        "farm with a barn, a cow and a fence",
        &["square", "triangle", "oval", "line"],
        DifficultyTier::Expert,
    ),
    entry(
        "park with a bench, a tree and a kite",
        &["rectangle", "circle", "diamond", "line"],
        DifficultyTier::Expert,
    ),
];

/// Build a prompt from the built-in pool
///
/// Picks the first entry of the level's tier not in `history`; when all are
/// used, cycles through the tier by history length.
#[must_use]
pub fn fallback_prompt(level: u32, history: &[String]) -> Prompt {
    let level = level.max(1);
    let tier = DifficultyTier::for_level(level);
    let tier_entries: Vec<&FallbackEntry> =
        FALLBACK_POOL.iter().filter(|e| e.tier == tier).collect();

    let chosen = tier_entries
        .iter()
        .find(|e| !is_repeat(e.subject, history))
        .copied()
        .or_else(|| {
            tier_entries
                .get(history.len() % tier_entries.len().max(1))
                .copied()
        })
        .unwrap_or(&DEFAULT_ENTRY);

    Prompt::new(
        chosen.subject,
        ShapeHints::new(chosen.primitives.iter().copied(), tier.component_count()),
        level,
        PromptSource::Fallback,
    )
}

fn is_repeat(subject: &str, history: &[String]) -> bool {
    let subject = subject.trim();
    history.iter().any(|h| h.trim().eq_ignore_ascii_case(subject))
}

/// Prompt generator
pub struct ChallengeGenerator {
    text: Arc<dyn TextGenerator>,
    retry: RetryLayer,
    malformed_retries: u32,
}

impl ChallengeGenerator {
    /// Create generator
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>, retry: RetryLayer, config: &GenerationConfig) -> Self {
        Self {
            text,
            retry,
            malformed_retries: config.malformed_retries,
        }
    }

    /// Produce a prompt for `level`, avoiding subjects in `history`
    ///
    /// Never fails: capability failures and repeated malformed output end in
    /// the fallback pool.
    pub async fn generate(&self, level: u32, history: &[String]) -> Prompt {
        let level = level.max(1);
        let tier = DifficultyTier::for_level(level);
        let request = build_request(level, tier, history);

        for attempt in 0..=self.malformed_retries {
            let result = self
                .retry
                .call(Capability::TextGeneration, || {
                    self.text.generate_text(request.clone())
                })
                .await;

            let response = match result {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(level, %error, "prompt generation unavailable, using fallback pool");
                    return fallback_prompt(level, history);
                }
            };

            match parse_prompt(&response.text, tier) {
                Ok(parsed) if is_repeat(&parsed.subject, history) => {
                    tracing::warn!(attempt, subject = %parsed.subject, "generator repeated a subject");
                }
                Ok(parsed) => {
                    tracing::debug!(level, subject = %parsed.subject, "generated prompt");
                    return Prompt::new(
                        parsed.subject,
                        parsed.shape_hints,
                        level,
                        PromptSource::Generated,
                    );
                }
                Err(error) => {
                    tracing::warn!(attempt, %error, "malformed prompt response");
                }
            }
        }

        tracing::warn!(level, "prompt generation kept failing validation, using fallback pool");
        fallback_prompt(level, history)
    }
}

fn build_request(level: u32, tier: DifficultyTier, history: &[String]) -> TextRequest {
    let components = tier.component_count();
    let task = format!(
        "Suggest one new thing for a child to draw in a drawing game. \
         Difficulty: {tier} (level {level}). The drawing should need about \
         {components} distinct part(s) built from simple shapes."
    );
    let mut request = TextRequest::new(task)
        .with_constraint(
            "Respond only with JSON: {\"subject\": string, \"shapes\": [string], \"components\": number}",
        )
        .with_constraint(
            "Use concrete, recognisable objects only (animals, vehicles, buildings, nature); no abstract concepts or emotions",
        );
    if !history.is_empty() {
        request = request.with_constraint(format!(
            "Do not suggest any of: {}",
            history.join(", ")
        ));
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MockTextGenerator, TextResponse};
    use crate::config::RetryPolicy;
    use crate::error::CapabilityError;
    use crate::health::HealthMonitor;

    fn retry() -> RetryLayer {
        RetryLayer::new(
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 2,
                call_timeout_ms: 50,
            },
            HealthMonitor::new(),
        )
    }

    fn generator(mock: MockTextGenerator) -> ChallengeGenerator {
        ChallengeGenerator::new(Arc::new(mock), retry(), &GenerationConfig::default())
    }

    fn reply(text: &str) -> Result<TextResponse, CapabilityError> {
        Ok(TextResponse {
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn generates_prompt_from_capability() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate_text()
            .withf(|req| req.task.contains("level 3"))
            .times(1)
            .returning(|_| reply(r#"{"subject": "kite", "shapes": ["diamond", "line"], "components": 2}"#));

        let prompt = generator(mock).generate(3, &[]).await;
        assert_eq!(prompt.subject, "kite");
        assert_eq!(prompt.source, PromptSource::Generated);
        assert_eq!(prompt.difficulty, DifficultyTier::Medium);
        assert_eq!(prompt.level, 3);
    }

    #[tokio::test]
    async fn history_is_sent_as_constraint() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate_text()
            .withf(|req| req.constraints.iter().any(|c| c.contains("cat, house")))
            .times(1)
            .returning(|_| reply("Subject: dog"));

        let history = vec!["cat".to_string(), "house".to_string()];
        let prompt = generator(mock).generate(1, &history).await;
        assert_eq!(prompt.subject, "dog");
    }

    #[tokio::test]
    async fn malformed_output_is_retried_then_falls_back() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate_text()
            .times(3)
            .returning(|_| reply("I'd rather not."));

        let prompt = generator(mock).generate(1, &[]).await;
        assert_eq!(prompt.source, PromptSource::Fallback);
        assert_eq!(prompt.subject, "cat");
    }

    #[tokio::test]
    async fn repeated_subject_counts_as_malformed() {
        let mut mock = MockTextGenerator::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_generate_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| reply("Draw a cat!"));
        mock.expect_generate_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| reply("Draw a frog!"));

        let prompt = generator(mock).generate(1, &["Cat".to_string()]).await;
        assert_eq!(prompt.subject, "frog");
        assert_eq!(prompt.source, PromptSource::Generated);
    }

    #[tokio::test]
    async fn refusal_falls_back_without_retry() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate_text()
            .times(1)
            .returning(|_| Err(CapabilityError::ContentPolicy("refused".into())));

        let prompt = generator(mock).generate(5, &[]).await;
        assert_eq!(prompt.source, PromptSource::Fallback);
        assert_eq!(prompt.difficulty, DifficultyTier::Hard);
    }

    #[test]
    fn fallback_avoids_history_then_cycles() {
        let first = fallback_prompt(1, &[]);
        assert_eq!(first.subject, "cat");
        assert_eq!(first.shape_hints.components, 1);

        let second = fallback_prompt(1, &["cat".to_string(), "house".to_string()]);
        assert_eq!(second.subject, "car");

        let easy: Vec<String> = FALLBACK_POOL
            .iter()
            .filter(|e| e.tier == DifficultyTier::Easy)
            .map(|e| e.subject.to_string())
            .collect();
        let cycled = fallback_prompt(1, &easy);
        assert_eq!(cycled.subject, easy[easy.len() % easy.len()]);
    }

    #[test]
    fn every_tier_has_fallbacks() {
        for tier in [
            DifficultyTier::Easy,
            DifficultyTier::Medium,
            DifficultyTier::Hard,
            DifficultyTier::Expert,
        ] {
            assert!(FALLBACK_POOL.iter().filter(|e| e.tier == tier).count() >= 3);
        }
        let expert = fallback_prompt(9, &[]);
        assert_eq!(expert.difficulty, DifficultyTier::Expert);
        assert_eq!(expert.shape_hints.components, 4);
    }
}
