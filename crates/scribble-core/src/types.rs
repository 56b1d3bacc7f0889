//! Core types for Scribble Quest
//!
//! Defines the game's data model:
//! - Identifiers (sessions, prompts, drawings)
//! - Prompts and their shape hints
//! - Drawings (vector strokes or encoded raster)
//! - Verdicts and rewards
//! - Session status and round outcomes

use crate::error::GameError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Maximum length of a client-supplied session identifier
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Session identifier
///
/// Clients pick their own identifiers (the browser keeps one per tab), so
/// this is a validated string rather than a generated id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(GameError::invalid("session id is empty"));
        }
        if s.len() > MAX_SESSION_ID_LEN {
            return Err(GameError::invalid(format!(
                "session id longer than {MAX_SESSION_ID_LEN} characters"
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(GameError::invalid(
                "session id may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SessionId {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique prompt identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PromptId(pub Ulid);

impl PromptId {
    /// Generate new prompt ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PromptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique drawing identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrawingId(pub Ulid);

impl DrawingId {
    /// Generate new drawing ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for DrawingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Difficulty tiers, derived from level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    /// Single simple object
    Easy,
    /// Object with a distinctive part
    Medium,
    /// Small composition
    Hard,
    /// Multi-part scene
    Expert,
}

impl DifficultyTier {
    /// Tier for a level (levels start at 1)
    #[inline]
    #[must_use]
    pub fn for_level(level: u32) -> Self {
        match level {
            0..=2 => DifficultyTier::Easy,
            3..=4 => DifficultyTier::Medium,
            5..=6 => DifficultyTier::Hard,
            _ => DifficultyTier::Expert,
        }
    }

    /// Expected number of components in the target shape
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> u32 {
        match self {
            DifficultyTier::Easy => 1,
            DifficultyTier::Medium => 2,
            DifficultyTier::Hard => 3,
            DifficultyTier::Expert => 4,
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Medium => "medium",
            DifficultyTier::Hard => "hard",
            DifficultyTier::Expert => "expert",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured hints about the expected drawing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeHints {
    /// Primitive shapes the drawing is expected to contain
    pub primitives: Vec<String>,
    /// Expected number of distinct components
    pub components: u32,
}

impl ShapeHints {
    /// Create hints
    #[inline]
    pub fn new<I, S>(primitives: I, components: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primitives: primitives.into_iter().map(Into::into).collect(),
            components,
        }
    }

    /// Hints with no named primitives
    #[inline]
    #[must_use]
    pub fn components_only(components: u32) -> Self {
        Self {
            primitives: Vec::new(),
            components,
        }
    }
}

/// Where a prompt came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    /// Produced by the text-generation capability
    Generated,
    /// Taken from the built-in pool
    Fallback,
}

/// A drawing challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Prompt identifier
    pub id: PromptId,
    /// What to draw ("cat", "house with a chimney")
    pub subject: String,
    /// Expected shape structure
    pub shape_hints: ShapeHints,
    /// Difficulty tier
    pub difficulty: DifficultyTier,
    /// Level the prompt was generated for
    pub level: u32,
    /// Origin of the prompt
    pub source: PromptSource,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl Prompt {
    /// Create new prompt
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        shape_hints: ShapeHints,
        level: u32,
        source: PromptSource,
    ) -> Self {
        Self {
            id: PromptId::new(),
            subject: subject.into(),
            shape_hints,
            difficulty: DifficultyTier::for_level(level),
            level,
            source,
            generated_at: Utc::now(),
        }
    }

    /// Player-facing challenge text
    #[must_use]
    pub fn challenge_text(&self) -> String {
        format!("Draw {} {}!", article_for(&self.subject), self.subject)
    }

    /// Reference description sent to the vision scorer
    #[must_use]
    pub fn reference_description(&self) -> String {
        let mut text = format!("a {} drawing of {} {}", self.difficulty, article_for(&self.subject), self.subject);
        if !self.shape_hints.primitives.is_empty() {
            text.push_str(&format!(
                " (expected shapes: {})",
                self.shape_hints.primitives.join(", ")
            ));
        }
        if self.shape_hints.components > 1 {
            text.push_str(&format!(
                ", about {} distinct parts",
                self.shape_hints.components
            ));
        }
        text
    }
}

fn article_for(subject: &str) -> &'static str {
    match subject.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// Point on the drawing canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position in canvas pixels
    pub x: f32,
    /// Vertical position in canvas pixels
    pub y: f32,
}

impl Point {
    /// Create point
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

fn default_stroke_width() -> f32 {
    4.0
}

/// One continuous pen stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Sampled points
    pub points: Vec<Point>,
    /// Pen width in pixels
    #[serde(default = "default_stroke_width")]
    pub width: f32,
}

impl Stroke {
    /// Create stroke with the default pen width
    #[inline]
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            width: default_stroke_width(),
        }
    }
}

/// Submitted drawing content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawingData {
    /// Vector strokes on a canvas of known size
    Strokes {
        /// Canvas width in pixels
        width: u32,
        /// Canvas height in pixels
        height: u32,
        /// Pen strokes
        strokes: Vec<Stroke>,
    },
    /// Encoded image (PNG or JPEG)
    Raster {
        /// Encoded bytes
        bytes: Vec<u8>,
    },
}

/// A drawing submitted against a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    /// Drawing identifier
    pub id: DrawingId,
    /// Prompt the drawing answers
    pub prompt_id: PromptId,
    /// Content
    pub data: DrawingData,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

impl Drawing {
    /// Create a drawing from vector strokes
    #[must_use]
    pub fn from_strokes(prompt_id: PromptId, width: u32, height: u32, strokes: Vec<Stroke>) -> Self {
        Self::new(
            prompt_id,
            DrawingData::Strokes {
                width,
                height,
                strokes,
            },
        )
    }

    /// Create a drawing from encoded image bytes
    #[must_use]
    pub fn from_raster(prompt_id: PromptId, bytes: Vec<u8>) -> Self {
        Self::new(prompt_id, DrawingData::Raster { bytes })
    }

    /// Create drawing with explicit content
    #[must_use]
    pub fn new(prompt_id: PromptId, data: DrawingData) -> Self {
        Self {
            id: DrawingId::new(),
            prompt_id,
            data,
            submitted_at: Utc::now(),
        }
    }

    /// Check for the trivially empty case (no strokes, no bytes)
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match &self.data {
            DrawingData::Strokes { strokes, .. } => strokes.iter().all(|s| s.points.is_empty()),
            DrawingData::Raster { bytes } => bytes.is_empty(),
        }
    }
}

/// Normalized judgment of one drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Judged drawing
    pub drawing_id: DrawingId,
    /// Prompt it was judged against
    pub prompt_id: PromptId,
    /// Whether the similarity met the pass threshold
    pub passed: bool,
    /// Similarity in [0.0, 1.0]
    pub similarity: f64,
    /// Feedback text from the scorer
    pub feedback: String,
    /// What the scorer recognised, when stated
    pub recognized: Option<String>,
    /// Served from the verdict cache
    pub cached: bool,
    /// Judgment time
    pub judged_at: DateTime<Utc>,
}

/// Reward image payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RewardImage {
    /// Hosted image
    Url(String),
    /// Inline encoded image
    Bytes(Vec<u8>),
}

/// Synthesized reward for a passing verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    /// Prompt the reward celebrates
    pub prompt_id: PromptId,
    /// Drawing whose verdict earned it
    pub drawing_id: DrawingId,
    /// Image
    pub image: RewardImage,
    /// Style modifier used in the request
    pub style: String,
    /// Placeholder substituted for a failed synthesis
    pub degraded: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Reward {
    /// Placeholder reward for a passing verdict whose synthesis failed
    #[must_use]
    pub fn placeholder(verdict: &Verdict, url: impl Into<String>) -> Self {
        Self {
            prompt_id: verdict.prompt_id,
            drawing_id: verdict.drawing_id,
            image: RewardImage::Url(url.into()),
            style: String::new(),
            degraded: true,
            created_at: Utc::now(),
        }
    }
}

/// Result of `fetch_reward`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reward", rename_all = "snake_case")]
pub enum RewardStatus {
    /// Synthesis still running
    Pending,
    /// Reward available
    Ready(Reward),
}

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No active prompt
    AwaitingPrompt,
    /// Prompt issued, waiting for a drawing
    AwaitingDrawing,
    /// Drawing with the judge
    Evaluating,
    /// Passed; reward being synthesized
    AwaitingReward,
    /// Round won
    Complete,
    /// Round lost or judge unavailable
    Failed,
}

impl SessionStatus {
    /// Legal successor states
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [SessionStatus] {
        use SessionStatus::*;
        match self {
            AwaitingPrompt => &[AwaitingDrawing, Failed],
            AwaitingDrawing => &[Evaluating, Failed],
            Evaluating => &[AwaitingReward, AwaitingDrawing, Failed],
            AwaitingReward => &[Complete, Failed],
            Complete => &[AwaitingPrompt],
            Failed => &[AwaitingPrompt],
        }
    }

    /// Check a transition against the table
    #[inline]
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// A new round may be started from here
    #[inline]
    #[must_use]
    pub fn accepts_new_round(self) -> bool {
        matches!(
            self,
            SessionStatus::AwaitingPrompt | SessionStatus::Complete | SessionStatus::Failed
        )
    }

    /// Snake-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::AwaitingPrompt => "awaiting_prompt",
            SessionStatus::AwaitingDrawing => "awaiting_drawing",
            SessionStatus::Evaluating => "evaluating",
            SessionStatus::AwaitingReward => "awaiting_reward",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the last round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Drawing accepted
    Passed,
    /// Attempts used up without a match
    DidNotMatch,
    /// Judge could not be reached
    ServiceUnavailable,
}

impl RoundOutcome {
    /// Player-facing message
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            RoundOutcome::Passed => "Amazing! Your drawing matched the challenge.",
            RoundOutcome::DidNotMatch => {
                "Your drawing did not match the challenge. Start a new one and try again!"
            }
            RoundOutcome::ServiceUnavailable => {
                "The drawing judge is unavailable right now. Please try again later."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_validation() {
        assert!("player-1_abc".parse::<SessionId>().is_ok());
        assert!("".parse::<SessionId>().is_err());
        assert!("has space".parse::<SessionId>().is_err());
        assert!("x".repeat(MAX_SESSION_ID_LEN + 1).parse::<SessionId>().is_err());
        assert_eq!(
            " default ".parse::<SessionId>().unwrap().as_str(),
            "default"
        );
    }

    #[test]
    fn session_id_serde_validates() {
        let ok: SessionId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<SessionId>("\"a/b\"").is_err());
    }

    #[test]
    fn difficulty_tiers_by_level() {
        assert_eq!(DifficultyTier::for_level(1), DifficultyTier::Easy);
        assert_eq!(DifficultyTier::for_level(2), DifficultyTier::Easy);
        assert_eq!(DifficultyTier::for_level(3), DifficultyTier::Medium);
        assert_eq!(DifficultyTier::for_level(6), DifficultyTier::Hard);
        assert_eq!(DifficultyTier::for_level(40), DifficultyTier::Expert);
        assert!(DifficultyTier::Expert.component_count() > DifficultyTier::Easy.component_count());
    }

    #[test]
    fn prompt_texts() {
        let prompt = Prompt::new(
            "owl",
            ShapeHints::new(["circle", "triangle"], 2),
            3,
            PromptSource::Generated,
        );
        assert_eq!(prompt.challenge_text(), "Draw an owl!");
        assert_eq!(prompt.difficulty, DifficultyTier::Medium);
        let reference = prompt.reference_description();
        assert!(reference.contains("circle, triangle"));
        assert!(reference.contains("2 distinct parts"));
    }

    #[test]
    fn transition_table() {
        use SessionStatus::*;
        assert!(AwaitingPrompt.can_transition_to(AwaitingDrawing));
        assert!(Evaluating.can_transition_to(AwaitingReward));
        assert!(Evaluating.can_transition_to(AwaitingDrawing));
        assert!(!AwaitingDrawing.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Evaluating));
        assert!(Failed.accepts_new_round());
        assert!(!AwaitingReward.accepts_new_round());
    }

    #[test]
    fn blank_drawings() {
        let prompt_id = PromptId::new();
        assert!(Drawing::from_strokes(prompt_id, 100, 100, vec![]).is_blank());
        assert!(Drawing::from_strokes(prompt_id, 100, 100, vec![Stroke::new(vec![])]).is_blank());
        assert!(!Drawing::from_strokes(
            prompt_id,
            100,
            100,
            vec![Stroke::new(vec![Point::new(1.0, 1.0)])]
        )
        .is_blank());
        assert!(Drawing::from_raster(prompt_id, vec![]).is_blank());
    }
}
