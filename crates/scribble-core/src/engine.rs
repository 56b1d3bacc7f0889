//! Session Progression Engine
//!
//! The orchestrator that:
//! - Owns the session store
//! - Issues prompts through the Challenge Generator
//! - Routes submissions through the Drawing Evaluator
//! - Applies scoring and level progression
//! - Runs reward synthesis in the background and degrades it on failure

use crate::capability::Capabilities;
use crate::challenge::ChallengeGenerator;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::evaluator::DrawingEvaluator;
use crate::health::{CapabilityHealth, HealthMonitor};
use crate::retry::RetryLayer;
use crate::reward::RewardSynthesizer;
use crate::scoring;
use crate::session::{SessionHandle, SessionStore, SessionSummary};
use crate::types::{
    Drawing, Prompt, RewardStatus, RoundOutcome, SessionId, SessionStatus, Verdict,
};
use std::sync::Arc;

struct EngineInner {
    config: GameConfig,
    generator: ChallengeGenerator,
    evaluator: DrawingEvaluator,
    rewards: RewardSynthesizer,
    sessions: SessionStore,
    health: HealthMonitor,
}

/// The game orchestrator
///
/// Cheap to clone; clones share sessions, caches and health state.
#[derive(Clone)]
pub struct ProgressionEngine {
    inner: Arc<EngineInner>,
}

impl ProgressionEngine {
    /// Create engine over the given capabilities
    #[must_use]
    pub fn new(config: GameConfig, capabilities: Capabilities) -> Self {
        let health = HealthMonitor::new();
        let retry = RetryLayer::new(config.retry.clone(), health.clone());

        let generator = ChallengeGenerator::new(capabilities.text, retry.clone(), &config.generation);
        let evaluator =
            DrawingEvaluator::new(capabilities.vision, config.evaluation.clone(), retry.clone());
        let rewards = RewardSynthesizer::new(capabilities.images, config.reward.clone(), retry);
        let sessions = SessionStore::new(&config.session);

        Self {
            inner: Arc::new(EngineInner {
                config,
                generator,
                evaluator,
                rewards,
                sessions,
                health,
            }),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.inner.config
    }

    /// Session store
    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Start a new round
    ///
    /// Creates the session at `level` if it does not exist; existing
    /// sessions keep their earned level.
    ///
    /// # Errors
    /// - `InvalidInput` when `level` is 0 or above `session.max_level`
    /// - `OutOfOrderOperation` while a round is in progress
    pub async fn start_challenge(&self, session_id: &SessionId, level: u32) -> Result<Prompt, GameError> {
        let max_level = self.inner.config.session.max_level;
        if level == 0 || level > max_level {
            return Err(GameError::invalid(format!("level must be between 1 and {max_level}")));
        }
        let handle = self.inner.sessions.get_or_create(session_id, level).await;
        let mut session = handle.lock().await;

        let status = session.status();
        if !status.accepts_new_round() {
            return Err(GameError::OutOfOrderOperation {
                operation: "start_challenge",
                status,
            });
        }
        if status != SessionStatus::AwaitingPrompt {
            session.transition(SessionStatus::AwaitingPrompt, "start_challenge")?;
        }

        let prompt = self
            .inner
            .generator
            .generate(session.level, &session.history)
            .await;
        session.assign_prompt(prompt.clone())?;

        tracing::info!(
            session = %session_id,
            level = session.level,
            subject = %prompt.subject,
            source = ?prompt.source,
            "challenge started"
        );
        Ok(prompt)
    }

    /// Submit a drawing for the active prompt
    ///
    /// # Workflow
    /// 1. Local checks; failures leave the session untouched
    /// 2. `awaiting_drawing -> evaluating`
    /// 3. Judge; a judge failure ends the round as `service_unavailable`
    /// 4. Pass: score, level up, `awaiting_reward`, reward in background
    /// 5. Fail: back to `awaiting_drawing`, or `failed` once attempts run out
    ///
    /// # Errors
    /// - `SessionNotFound` for unknown or expired sessions
    /// - `OutOfOrderOperation` unless the session is awaiting a drawing
    /// - `InvalidInput` for drawings rejected by local checks
    /// - capability errors when the judge is unavailable
    pub async fn submit_drawing(&self, session_id: &SessionId, drawing: Drawing) -> Result<Verdict, GameError> {
        let handle = self.inner.sessions.get(session_id).await?;
        let mut session = handle.lock().await;

        let status = session.status();
        if status != SessionStatus::AwaitingDrawing {
            return Err(GameError::OutOfOrderOperation {
                operation: "submit_drawing",
                status,
            });
        }
        let prompt = session
            .prompt
            .clone()
            .ok_or_else(|| GameError::invalid("no active prompt"))?;

        let encoded = self.inner.evaluator.check_preconditions(&drawing, &prompt).await?;
        session.transition(SessionStatus::Evaluating, "submit_drawing")?;

        let verdict = match self.inner.evaluator.judge(&drawing, &prompt, encoded).await {
            Ok(verdict) => verdict,
            Err(error) => {
                tracing::error!(session = %session_id, %error, "drawing judge unavailable");
                session.outcome = Some(RoundOutcome::ServiceUnavailable);
                session.transition(SessionStatus::Failed, "submit_drawing")?;
                return Err(error);
            }
        };

        session.attempts += 1;
        session.verdicts.push(verdict.clone());
        let max_attempts = self.inner.config.session.max_attempts_per_prompt;

        if verdict.passed {
            let points = scoring::points(&self.inner.config.scoring, session.level, session.attempts);
            session.score = session.score.saturating_add(points);
            session.level = session.level.saturating_add(1).min(self.inner.config.session.max_level);
            session.rounds_won += 1;
            session.outcome = Some(RoundOutcome::Passed);
            session.transition(SessionStatus::AwaitingReward, "submit_drawing")?;
            tracing::info!(
                session = %session_id,
                attempt = session.attempts,
                similarity = verdict.similarity,
                points,
                level = session.level,
                "drawing passed"
            );
            self.spawn_reward(handle.clone(), prompt, verdict.clone());
        } else if session.attempts >= max_attempts {
            session.outcome = Some(RoundOutcome::DidNotMatch);
            session.transition(SessionStatus::Failed, "submit_drawing")?;
            tracing::info!(
                session = %session_id,
                attempts = session.attempts,
                similarity = verdict.similarity,
                "round failed"
            );
        } else {
            session.transition(SessionStatus::AwaitingDrawing, "submit_drawing")?;
            tracing::info!(
                session = %session_id,
                attempt = session.attempts,
                similarity = verdict.similarity,
                "drawing did not match"
            );
        }

        Ok(verdict)
    }

    /// Reward for the last passing drawing
    ///
    /// # Errors
    /// - `SessionNotFound` for unknown or expired sessions
    /// - `OutOfOrderOperation` when no reward is pending or ready
    pub async fn fetch_reward(&self, session_id: &SessionId) -> Result<RewardStatus, GameError> {
        let handle = self.inner.sessions.get(session_id).await?;
        let session = handle.lock().await;
        match (session.status(), &session.reward) {
            (SessionStatus::AwaitingReward, _) => Ok(RewardStatus::Pending),
            (SessionStatus::Complete, Some(reward)) => Ok(RewardStatus::Ready(reward.clone())),
            (status, _) => Err(GameError::OutOfOrderOperation {
                operation: "fetch_reward",
                status,
            }),
        }
    }

    /// Snapshot of a session
    ///
    /// # Errors
    /// `SessionNotFound` for unknown or expired sessions
    pub async fn get_session_status(&self, session_id: &SessionId) -> Result<SessionSummary, GameError> {
        let handle = self.inner.sessions.get(session_id).await?;
        let session = handle.lock().await;
        Ok(session.summary(self.inner.config.session.max_attempts_per_prompt))
    }

    /// Reachability of each capability
    #[must_use]
    pub fn health(&self) -> CapabilityHealth {
        self.inner.health.report()
    }

    /// Run pending session expiry
    pub async fn purge_expired(&self) {
        self.inner.sessions.purge_expired().await;
    }

    fn spawn_reward(&self, handle: SessionHandle, prompt: Prompt, verdict: Verdict) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let reward = match inner.rewards.synthesize(&prompt, &verdict).await {
                Ok(reward) => reward,
                Err(error) => {
                    tracing::warn!(subject = %prompt.subject, %error, "reward synthesis failed, using placeholder");
                    inner.rewards.placeholder(&verdict)
                }
            };

            let mut session = handle.lock().await;
            let same_round = session.prompt.as_ref().map(|p| p.id) == Some(prompt.id);
            if session.status() != SessionStatus::AwaitingReward || !same_round {
                tracing::warn!(session = %session.id(), "session moved on before reward was ready");
                return;
            }
            session.reward = Some(reward);
            if let Err(error) = session.transition(SessionStatus::Complete, "fetch_reward") {
                tracing::error!(session = %session.id(), %error, "could not complete round");
            }
        });
    }
}

impl std::fmt::Debug for ProgressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionEngine")
            .field("sessions", &self.inner.sessions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        GeneratedImage, MockImageGenerator, MockTextGenerator, MockVisionScorer, TextResponse,
        VisionResponse,
    };
    use crate::config::RetryPolicy;
    use crate::types::{Point, Stroke};
    use std::time::Duration;

    fn config() -> GameConfig {
        GameConfig::new().with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            call_timeout_ms: 200,
        })
    }

    fn text() -> MockTextGenerator {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate_text().returning(|_| {
            Ok(TextResponse {
                text: "Subject: kite\nShapes: diamond, line".into(),
            })
        });
        mock
    }

    fn images() -> MockImageGenerator {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .returning(|_| Ok(GeneratedImage::Url("https://img.example/kite.png".into())));
        mock
    }

    fn engine(vision: MockVisionScorer) -> ProgressionEngine {
        ProgressionEngine::new(
            config(),
            Capabilities::new(Arc::new(text()), Arc::new(vision), Arc::new(images())),
        )
    }

    fn sketch(prompt: &Prompt) -> Drawing {
        Drawing::from_strokes(
            prompt.id,
            100,
            100,
            vec![Stroke::new(vec![Point::new(10.0, 10.0), Point::new(90.0, 90.0)])],
        )
    }

    fn id() -> SessionId {
        "engine-test".parse().unwrap()
    }

    async fn wait_for_reward(engine: &ProgressionEngine, id: &SessionId) -> RewardStatus {
        for _ in 0..200 {
            let status = engine.fetch_reward(id).await.unwrap();
            if status != RewardStatus::Pending {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("reward never became ready");
    }

    #[tokio::test]
    async fn submit_before_challenge_is_rejected() {
        let mut vision = MockVisionScorer::new();
        vision.expect_score().times(0);
        let engine = engine(vision);

        let prompt = Prompt::new("kite", Default::default(), 1, crate::types::PromptSource::Fallback);
        assert_eq!(
            engine.submit_drawing(&id(), sketch(&prompt)).await,
            Err(GameError::SessionNotFound(id()))
        );
        assert!(matches!(
            engine.fetch_reward(&id()).await,
            Err(GameError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn passing_round_levels_up_and_rewards() {
        let mut vision = MockVisionScorer::new();
        vision.expect_score().times(1).returning(|_| {
            Ok(VisionResponse {
                text: Some("I see a kite. YES".into()),
                score: None,
            })
        });
        let engine = engine(vision);

        let prompt = engine.start_challenge(&id(), 1).await.unwrap();
        assert_eq!(prompt.subject, "kite");

        let verdict = engine.submit_drawing(&id(), sketch(&prompt)).await.unwrap();
        assert!(verdict.passed);

        let summary = engine.get_session_status(&id()).await.unwrap();
        assert_eq!(summary.level, 2);
        assert_eq!(summary.score, 150);
        assert_eq!(summary.attempts, 1);

        match wait_for_reward(&engine, &id()).await {
            RewardStatus::Ready(reward) => {
                assert!(!reward.degraded);
                assert_eq!(reward.prompt_id, prompt.id);
            }
            RewardStatus::Pending => unreachable!(),
        }
        let summary = engine.get_session_status(&id()).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Complete);
        assert!(summary.reward_ready);
    }

    #[tokio::test]
    async fn levels_outside_range_are_rejected() {
        let engine = engine(MockVisionScorer::new());
        let max = engine.config().session.max_level;
        for level in [0, max + 1, u32::MAX] {
            assert!(matches!(
                engine.start_challenge(&id(), level).await,
                Err(GameError::InvalidInput(msg)) if msg.contains("level")
            ));
        }
        assert!(engine.get_session_status(&id()).await.is_err());
    }

    #[tokio::test]
    async fn passing_at_top_level_stays_there() {
        let mut vision = MockVisionScorer::new();
        vision.expect_score().times(1).returning(|_| {
            Ok(VisionResponse {
                text: Some("I see a kite. YES".into()),
                score: None,
            })
        });
        let engine = engine(vision);
        let max = engine.config().session.max_level;

        let prompt = engine.start_challenge(&id(), max).await.unwrap();
        assert!(engine.submit_drawing(&id(), sketch(&prompt)).await.unwrap().passed);

        let summary = engine.get_session_status(&id()).await.unwrap();
        assert_eq!(summary.level, max);
        assert!(summary.score > 0);
    }

    #[tokio::test]
    async fn challenge_in_progress_cannot_restart() {
        let engine = engine(MockVisionScorer::new());
        engine.start_challenge(&id(), 1).await.unwrap();
        assert_eq!(
            engine.start_challenge(&id(), 1).await,
            Err(GameError::OutOfOrderOperation {
                operation: "start_challenge",
                status: SessionStatus::AwaitingDrawing,
            })
        );
    }

    #[tokio::test]
    async fn judge_outage_fails_round_as_unavailable() {
        let mut vision = MockVisionScorer::new();
        vision
            .expect_score()
            .times(2)
            .returning(|_| Err(crate::error::CapabilityError::Timeout));
        let engine = engine(vision);

        let prompt = engine.start_challenge(&id(), 1).await.unwrap();
        let result = engine.submit_drawing(&id(), sketch(&prompt)).await;
        assert!(matches!(result, Err(GameError::CapabilityExhausted { .. })));

        let summary = engine.get_session_status(&id()).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Failed);
        assert_eq!(summary.outcome, Some(RoundOutcome::ServiceUnavailable));
        assert_eq!(summary.attempts, 0);
        assert!(!engine.health().vision_scoring);
        assert!(engine.health().text_generation);
    }
}
