//! Error types for Scribble Quest
//!
//! Two layers:
//! - [`CapabilityError`]: raw failures reported by a capability adapter
//!   (transport, rate limiting, content policy, unparseable bodies)
//! - [`GameError`]: the typed kinds the progression engine and its callers
//!   see. Every capability failure is converted at the component boundary.

use crate::types::{SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// External AI capability the core depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Prompt text generation
    TextGeneration,
    /// Drawing judgment
    VisionScoring,
    /// Reward image synthesis
    ImageGeneration,
}

impl Capability {
    /// All capabilities, in pipeline order
    pub const ALL: [Capability; 3] = [
        Capability::TextGeneration,
        Capability::VisionScoring,
        Capability::ImageGeneration,
    ];

    /// Stable name used in logs and health reports
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TextGeneration => "text_generation",
            Capability::VisionScoring => "vision_scoring",
            Capability::ImageGeneration => "image_generation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure reported by a capability adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The adapter's own request timeout fired
    #[error("request timed out")]
    Timeout,

    /// Network or server failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service asked us to slow down (HTTP 429)
    #[error("rate limited")]
    RateLimited {
        /// Server-provided delay hint
        retry_after_secs: Option<u64>,
    },

    /// Content-policy rejection or explicit refusal
    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    /// Response could not be understood
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CapabilityError {
    /// Transient failures are worth retrying; refusals are not
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::RateLimited { .. }
        )
    }
}

/// Why a capability refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalKind {
    /// Content policy or explicit refusal
    ContentPolicy,
    /// Response was not usable
    MalformedResponse,
}

impl fmt::Display for RefusalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalKind::ContentPolicy => f.write_str("content policy"),
            RefusalKind::MalformedResponse => f.write_str("malformed response"),
        }
    }
}

/// Main game error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// Empty or oversized drawing, missing or stale prompt, bad identifiers
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation not legal in the session's current state
    #[error("`{operation}` is not allowed while the session is {status}")]
    OutOfOrderOperation {
        /// Rejected operation
        operation: &'static str,
        /// Session status at the time of the call
        status: SessionStatus,
    },

    /// A single capability call exceeded its deadline
    #[error("{capability} timed out after {timeout_ms}ms")]
    CapabilityTimeout {
        /// Capability that timed out
        capability: Capability,
        /// Per-call timeout that elapsed
        timeout_ms: u64,
    },

    /// A single capability call failed in transport or was rate limited
    #[error("{capability} unavailable: {reason}")]
    CapabilityUnavailable {
        /// Capability that failed
        capability: Capability,
        /// Adapter-supplied reason
        reason: String,
    },

    /// The capability rejected the request or answered with garbage
    #[error("{capability} refused the request ({kind}): {reason}")]
    CapabilityRefused {
        /// Capability that refused
        capability: Capability,
        /// Refusal classification
        kind: RefusalKind,
        /// Adapter-supplied reason
        reason: String,
    },

    /// Retries exhausted
    #[error("{capability} unavailable after {attempts} attempts: {last_error}")]
    CapabilityExhausted {
        /// Capability that was retried
        capability: Capability,
        /// Attempts made
        attempts: u32,
        /// Description of the final failure
        last_error: String,
    },

    /// No such session (never created or idle-expired)
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}

impl GameError {
    /// Convert a raw adapter failure for one attempt
    #[must_use]
    pub fn from_capability(capability: Capability, error: CapabilityError, timeout_ms: u64) -> Self {
        match error {
            CapabilityError::Timeout => Self::CapabilityTimeout {
                capability,
                timeout_ms,
            },
            CapabilityError::Transport(reason) => Self::CapabilityUnavailable { capability, reason },
            CapabilityError::RateLimited { retry_after_secs } => Self::CapabilityUnavailable {
                capability,
                reason: match retry_after_secs {
                    Some(secs) => format!("rate limited, retry after {secs}s"),
                    None => "rate limited".to_string(),
                },
            },
            CapabilityError::ContentPolicy(reason) => Self::CapabilityRefused {
                capability,
                kind: RefusalKind::ContentPolicy,
                reason,
            },
            CapabilityError::Malformed(reason) => Self::malformed(capability, reason),
        }
    }

    /// Malformed-response refusal
    #[inline]
    pub fn malformed(capability: Capability, reason: impl Into<String>) -> Self {
        Self::CapabilityRefused {
            capability,
            kind: RefusalKind::MalformedResponse,
            reason: reason.into(),
        }
    }

    /// Invalid input helper
    #[inline]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Check if error is retryable by the retry layer
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CapabilityTimeout { .. } | Self::CapabilityUnavailable { .. }
        )
    }

    /// Check if the error originated at an external capability
    #[inline]
    #[must_use]
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            Self::CapabilityTimeout { .. }
                | Self::CapabilityUnavailable { .. }
                | Self::CapabilityRefused { .. }
                | Self::CapabilityExhausted { .. }
        )
    }

    /// Capability involved, if any
    #[must_use]
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::CapabilityTimeout { capability, .. }
            | Self::CapabilityUnavailable { capability, .. }
            | Self::CapabilityRefused { capability, .. }
            | Self::CapabilityExhausted { capability, .. } => Some(*capability),
            _ => None,
        }
    }

    /// Message suitable for showing to a player
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(reason) => format!("That didn't work: {reason}."),
            Self::OutOfOrderOperation { .. } => {
                "That action isn't available right now.".to_string()
            }
            Self::SessionNotFound(_) => {
                "Your game session has expired. Start a new challenge!".to_string()
            }
            Self::CapabilityRefused {
                kind: RefusalKind::ContentPolicy,
                ..
            } => "The art studio couldn't work with that request.".to_string(),
            _ => "The game service is unavailable right now. Please try again later.".to_string(),
        }
    }
}
