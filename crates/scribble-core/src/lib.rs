//! Scribble Quest Core - drawing game orchestration
//!
//! The game engine that:
//! - Generates level-appropriate drawing prompts
//! - Judges submitted drawings with a vision-scoring service
//! - Synthesizes reward images for passing drawings
//! - Tracks per-session score, level and attempts through a state machine
//! - Retries, times out and degrades around unreliable generative services
//!
//! # Example
//!
//! ```rust,ignore
//! use scribble_core::prelude::*;
//!
//! # async fn example(capabilities: Capabilities) -> Result<(), GameError> {
//! let engine = ProgressionEngine::new(GameConfig::new(), capabilities);
//! let session: SessionId = "player-1".parse()?;
//!
//! let prompt = engine.start_challenge(&session, 1).await?;
//! println!("{}", prompt.challenge_text());
//!
//! let drawing = Drawing::from_strokes(prompt.id, 400, 400, strokes);
//! let verdict = engine.submit_drawing(&session, drawing).await?;
//! println!("passed: {} ({:.2})", verdict.passed, verdict.similarity);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod canvas;
pub mod capability;
pub mod challenge;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod health;
pub mod normalize;
pub mod retry;
pub mod reward;
pub mod scoring;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use capability::{
    Capabilities, GeneratedImage, ImageGenerator, ImageRequest, TextGenerator, TextRequest,
    TextResponse, VisionRequest, VisionResponse, VisionScorer,
};
pub use challenge::{fallback_prompt, ChallengeGenerator};
pub use config::{
    ConfigError, EvaluationConfig, GameConfig, GenerationConfig, LevelCurve, RetryPolicy,
    RewardConfig, ScoringConfig, SessionConfig,
};
pub use engine::ProgressionEngine;
pub use error::{Capability, CapabilityError, GameError, RefusalKind};
pub use evaluator::DrawingEvaluator;
pub use health::{CapabilityHealth, HealthMonitor};
pub use retry::RetryLayer;
pub use reward::RewardSynthesizer;
pub use session::{Session, SessionStore, SessionSummary};
pub use types::{
    DifficultyTier, Drawing, DrawingData, DrawingId, Point, Prompt, PromptId, PromptSource,
    Reward, RewardImage, RewardStatus, RoundOutcome, SessionId, SessionStatus, ShapeHints, Stroke,
    Verdict,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Scribble Quest Core
    pub use crate::{
        Capabilities, Drawing, GameConfig, GameError, ImageGenerator, Point, ProgressionEngine,
        Prompt, RewardStatus, SessionId, SessionStatus, Stroke, TextGenerator, Verdict,
        VisionScorer,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
