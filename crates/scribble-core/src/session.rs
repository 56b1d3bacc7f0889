//! Sessions and the session store
//!
//! A [`Session`] is one player's game state. Every status change goes
//! through [`Session::transition`], which enforces the
//! [`SessionStatus::allowed_transitions`] table. The [`SessionStore`] hands
//! out one `Arc<Mutex<Session>>` per identifier so operations on a session
//! are serialised while different sessions proceed in parallel.

use crate::config::SessionConfig;
use crate::error::GameError;
use crate::types::{Prompt, Reward, RoundOutcome, SessionId, SessionStatus, Verdict};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Subjects remembered for repeat avoidance
pub const MAX_HISTORY: usize = 50;

/// One player's game state
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    status: SessionStatus,
    /// Current level (starts at 1)
    pub level: u32,
    /// Accumulated points
    pub score: u64,
    /// Active prompt
    pub prompt: Option<Prompt>,
    /// Evaluated submissions for the active prompt
    pub attempts: u32,
    /// Verdicts for the active prompt, oldest first
    pub verdicts: Vec<Verdict>,
    /// Subjects already issued, oldest first
    pub history: Vec<String>,
    /// Reward for the active prompt once synthesized
    pub reward: Option<Reward>,
    /// How the last round ended
    pub outcome: Option<RoundOutcome>,
    /// Rounds won
    pub rounds_won: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session awaiting its first prompt
    #[must_use]
    pub fn new(id: SessionId, level: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: SessionStatus::AwaitingPrompt,
            level: level.max(1),
            score: 0,
            prompt: None,
            attempts: 0,
            verdicts: Vec::new(),
            history: Vec::new(),
            reward: None,
            outcome: None,
            rounds_won: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last status change
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move to `next` if the transition table allows it
    ///
    /// # Errors
    /// `OutOfOrderOperation` naming `operation` and the current status
    pub fn transition(
        &mut self,
        next: SessionStatus,
        operation: &'static str,
    ) -> Result<(), GameError> {
        if !self.status.can_transition_to(next) {
            return Err(GameError::OutOfOrderOperation {
                operation,
                status: self.status,
            });
        }
        tracing::info!(session = %self.id, from = %self.status, to = %next, "session transition");
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Install a new prompt and reset per-round state
    ///
    /// # Errors
    /// `OutOfOrderOperation` unless the session is awaiting a prompt
    pub fn assign_prompt(&mut self, prompt: Prompt) -> Result<(), GameError> {
        self.transition(SessionStatus::AwaitingDrawing, "start_challenge")?;
        self.history.push(prompt.subject.clone());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.prompt = Some(prompt);
        self.attempts = 0;
        self.verdicts.clear();
        self.reward = None;
        self.outcome = None;
        Ok(())
    }

    /// Snapshot for callers
    #[must_use]
    pub fn summary(&self, max_attempts: u32) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            status: self.status,
            level: self.level,
            score: self.score,
            attempts: self.attempts,
            attempts_remaining: max_attempts.saturating_sub(self.attempts),
            challenge: self.prompt.as_ref().map(Prompt::challenge_text),
            prompt: self.prompt.clone(),
            last_verdict: self.verdicts.last().cloned(),
            outcome: self.outcome,
            message: self.outcome.map(|o| o.message().to_string()),
            reward_ready: self.reward.is_some(),
            rounds_won: self.rounds_won,
        }
    }
}

/// Read-only view of a session
///
/// Built only from stored state, so two reads without an intervening
/// transition compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Identifier
    pub session_id: SessionId,
    /// Status
    pub status: SessionStatus,
    /// Level
    pub level: u32,
    /// Score
    pub score: u64,
    /// Evaluated submissions for the active prompt
    pub attempts: u32,
    /// Submissions left before the round fails
    pub attempts_remaining: u32,
    /// Player-facing challenge text
    pub challenge: Option<String>,
    /// Active prompt
    pub prompt: Option<Prompt>,
    /// Most recent verdict
    pub last_verdict: Option<Verdict>,
    /// How the last round ended
    pub outcome: Option<RoundOutcome>,
    /// Player-facing outcome message
    pub message: Option<String>,
    /// Reward available
    pub reward_ready: bool,
    /// Rounds won
    pub rounds_won: u32,
}

/// Shared handle to a session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Bounded session store with idle expiry
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<SessionId, SessionHandle>,
}

impl SessionStore {
    /// Create store from configuration
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_idle_timeout(config.max_sessions, config.idle_timeout())
    }

    /// Create store with explicit limits
    #[must_use]
    pub fn with_idle_timeout(max_sessions: u64, idle_timeout: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    /// Existing session, or a new one at `level`
    pub async fn get_or_create(&self, id: &SessionId, level: u32) -> SessionHandle {
        self.sessions
            .get_with(id.clone(), async {
                tracing::info!(session = %id, level, "session created");
                Arc::new(Mutex::new(Session::new(id.clone(), level)))
            })
            .await
    }

    /// Existing session
    ///
    /// # Errors
    /// `SessionNotFound` if the id was never used or has idle-expired
    pub async fn get(&self, id: &SessionId) -> Result<SessionHandle, GameError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| GameError::SessionNotFound(id.clone()))
    }

    /// Drop a session
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).await.is_some()
    }

    /// Approximate number of live sessions
    #[must_use]
    pub fn len(&self) -> u64 {
        self.sessions.entry_count()
    }

    /// No live sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run pending expiry and eviction work
    pub async fn purge_expired(&self) {
        self.sessions.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("entries", &self.sessions.entry_count())
            .finish()
    }
}
