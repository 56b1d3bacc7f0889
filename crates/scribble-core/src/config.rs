//! Game configuration
//!
//! Every tunable the engine consults lives here: pass threshold, scoring
//! curve, attempt limits, retry/timeout policy, session expiry and reward
//! style. All sections deserialize with defaults so a partial TOML table is
//! enough.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level game configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Points and level multipliers
    pub scoring: ScoringConfig,
    /// Drawing evaluation rules
    pub evaluation: EvaluationConfig,
    /// Retry and timeout policy for capability calls
    pub retry: RetryPolicy,
    /// Session limits and expiry
    pub session: SessionConfig,
    /// Reward synthesis
    pub reward: RewardConfig,
    /// Prompt generation
    pub generation: GenerationConfig,
}

impl GameConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With pass threshold
    #[inline]
    #[must_use]
    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.evaluation.pass_threshold = threshold;
        self
    }

    /// With max attempts per prompt
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.session.max_attempts_per_prompt = max;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With scoring configuration
    #[inline]
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// With session idle timeout
    #[inline]
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session.idle_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Validate value ranges
    ///
    /// # Errors
    /// Returns a description of the first invalid setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.evaluation.pass_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::OutOfRange {
                field: "evaluation.pass_threshold",
                message: format!("{threshold} is outside [0, 1]"),
            });
        }
        if self.session.max_attempts_per_prompt == 0 {
            return Err(ConfigError::OutOfRange {
                field: "session.max_attempts_per_prompt",
                message: "must be at least 1".to_string(),
            });
        }
        if self.session.max_level == 0 {
            return Err(ConfigError::OutOfRange {
                field: "session.max_level",
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "retry.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.call_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "retry.call_timeout_ms",
                message: "must be positive".to_string(),
            });
        }
        if self.reward.min_image_bytes > self.reward.max_image_bytes {
            return Err(ConfigError::OutOfRange {
                field: "reward.min_image_bytes",
                message: "exceeds reward.max_image_bytes".to_string(),
            });
        }
        if self.evaluation.max_payload_bytes == 0 {
            return Err(ConfigError::OutOfRange {
                field: "evaluation.max_payload_bytes",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Setting outside its legal range
    #[error("{field}: {message}")]
    OutOfRange {
        /// Dotted setting name
        field: &'static str,
        /// What is wrong
        message: String,
    },
}

/// Level multiplier curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelCurve {
    /// `1 + step * (level - 1)`
    Linear {
        /// Added per level
        step: f64,
    },
    /// `ratio ^ (level - 1)`
    Geometric {
        /// Growth per level
        ratio: f64,
    },
}

impl LevelCurve {
    /// Multiplier for a level; level 1 is always 1.0
    #[must_use]
    pub fn multiplier(&self, level: u32) -> f64 {
        let steps = f64::from(level.max(1) - 1);
        match *self {
            LevelCurve::Linear { step } => 1.0 + step * steps,
            LevelCurve::Geometric { ratio } => ratio.powf(steps),
        }
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        LevelCurve::Linear { step: 0.5 }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Base points for a pass at level 1
    pub base_points: u64,
    /// Level multiplier curve
    pub level_curve: LevelCurve,
    /// Bonus for a first-try pass; divided by the attempt number
    pub first_try_bonus: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 100,
            level_curve: LevelCurve::default(),
            first_try_bonus: 50,
        }
    }
}

/// Drawing evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Minimum similarity for a pass
    pub pass_threshold: f64,
    /// Maximum encoded drawing size
    pub max_payload_bytes: usize,
    /// Minimum ink pixels for a raster drawing to count as drawn
    pub min_ink_pixels: u64,
    /// Verdict cache capacity (entries)
    pub verdict_cache_capacity: u64,
    /// Verdict cache time-to-live
    pub verdict_cache_ttl_secs: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.6,
            max_payload_bytes: 2 * 1024 * 1024,
            min_ink_pixels: 100,
            verdict_cache_capacity: 1_000,
            verdict_cache_ttl_secs: 600,
        }
    }
}

/// Retry and timeout policy for one capability call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Maximum delay between retries (backoff is capped here)
    pub max_delay_ms: u64,
    /// Deadline for a single attempt
    pub call_timeout_ms: u64,
}

impl RetryPolicy {
    /// Per-attempt timeout
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Backoff before retry number `retry` (1-based)
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Maximum backoff
    #[inline]
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
            call_timeout_ms: 20_000,
        }
    }
}

/// Session limits and expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Evaluated submissions allowed per prompt
    pub max_attempts_per_prompt: u32,
    /// Idle time before a session expires
    pub idle_timeout_secs: u64,
    /// Maximum number of live sessions
    pub max_sessions: u64,
    /// Highest level a session can start at or reach
    pub max_level: u32,
}

impl SessionConfig {
    /// Idle timeout
    #[inline]
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_prompt: 3,
            idle_timeout_secs: 30 * 60,
            max_sessions: 10_000,
            max_level: 100,
        }
    }
}

/// Reward synthesis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Style modifier appended to every request
    pub style: String,
    /// Smallest acceptable inline image
    pub min_image_bytes: usize,
    /// Largest acceptable inline image
    pub max_image_bytes: usize,
    /// Image used when synthesis fails
    pub placeholder_url: String,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            style: "children's storybook illustration, vibrant colors, whimsical and joyful"
                .to_string(),
            min_image_bytes: 1_024,
            max_image_bytes: 8 * 1024 * 1024,
            placeholder_url: "/static/reward-placeholder.png".to_string(),
        }
    }
}

/// Prompt generation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Extra generation calls after a malformed response
    pub malformed_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            malformed_retries: 2,
        }
    }
}
