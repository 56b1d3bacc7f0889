//! Tolerant normalization of generative responses
//!
//! Capabilities answer with JSON, labelled prose, bare scores or a plain
//! YES/NO. This module turns that into the fixed internal shapes
//! ([`ParsedPrompt`], [`Judgment`]) so nothing downstream ever handles free
//! text. Each parser tries its rules in a fixed order and reports a typed
//! [`NormalizeError`] when none applies.

use crate::capability::VisionResponse;
use crate::types::{DifficultyTier, ShapeHints};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Longest subject accepted from the generator
pub const MAX_SUBJECT_CHARS: usize = 60;

/// Longest feedback kept from the scorer
pub const MAX_FEEDBACK_CHARS: usize = 600;

/// Similarity assigned to a bare YES
pub const YES_SIMILARITY: f64 = 0.9;

/// Similarity assigned to a bare NO
pub const NO_SIMILARITY: f64 = 0.1;

/// Normalization failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Nothing to parse
    #[error("empty response")]
    Empty,

    /// No subject could be found
    #[error("no drawable subject in response")]
    NoSubject,

    /// Subject found but unusable
    #[error("unusable subject: {0}")]
    InvalidSubject(String),

    /// Shape hints present but unparseable
    #[error("unparseable shape hints: {0}")]
    InvalidShapes(String),

    /// No score or match keyword in a judgment
    #[error("no score or verdict in judgment")]
    NoScore,
}

/// Prompt fields extracted from generated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrompt {
    /// Cleaned subject
    pub subject: String,
    /// Shape hints (tier defaults filled in)
    pub shape_hints: ShapeHints,
}

/// Judgment fields extracted from a scorer response
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    /// Similarity in [0, 1]
    pub similarity: f64,
    /// Feedback for the player
    pub feedback: String,
    /// What the scorer said it saw
    pub recognized: Option<String>,
}

static SUBJECT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*[-*]?\s*subject\s*[:=]\s*(.+?)\s*$").expect("valid regex"));
static SHAPES_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*[-*]?\s*(?:shapes|primitives)\s*[:=]\s*(.+?)\s*$").expect("valid regex")
});
static COMPONENTS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*[-*]?\s*(?:components|parts)\s*[:=]\s*(.+?)\s*$").expect("valid regex")
});
static DRAW_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdraw\s+(?:a|an|the|some)\s+([^!.\n]+)").expect("valid regex")
});
static LABELLED_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:score|similarity|confidence|rating)\b\s*(?:is|of)?\s*[:=]?\s*(\d+(?:\.\d+)?)\s*(%|/\s*(\d+))?",
    )
    .expect("valid regex")
});
static FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*/\s*(10|100)\b").expect("valid regex"));
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*%").expect("valid regex"));
static MATCH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*[-*]?\s*(?:\d+[.)]\s*)?\**match(?:es)?\**\s*[:=]\s*\**\s*(yes|no)\b")
        .expect("valid regex")
});
// Bare keyword only where a verdict stands: line or sentence start, or the last word
static VERDICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:^|[.!?;:]\s+)\s*(?:[-*]\s*|\d+[.)]\s*)?(YES|NO)\b|\b(YES|NO)[.!]*\s*\z")
        .expect("valid regex")
});
static RECOGNIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\bi see|\brecogni[sz]ed\s*:?|\blooks like)\s+(?:a|an|the|some)?\s*([a-z][a-z \-]{0,40}?)\s*(?:[.,!;\n]|$)",
    )
    .expect("valid regex")
});

#[derive(Debug, Default, Deserialize)]
struct RawPrompt {
    #[serde(alias = "object", alias = "challenge")]
    subject: Option<String>,
    #[serde(default, alias = "primitives")]
    shapes: Option<Vec<String>>,
    #[serde(default, alias = "parts")]
    components: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawJudgment {
    #[serde(default, alias = "similarity", alias = "confidence")]
    score: Option<serde_json::Value>,
    #[serde(default, alias = "message", alias = "comment")]
    feedback: Option<String>,
    #[serde(default, alias = "seen", alias = "description")]
    recognized: Option<String>,
    #[serde(default, alias = "is_match", alias = "matches")]
    r#match: Option<bool>,
}

/// Parse generated prompt text
///
/// Rules, in order: embedded JSON object, labelled lines, a
/// "Draw a ..." challenge line.
///
/// # Errors
/// Returns [`NormalizeError`] when no rule yields a usable subject or the
/// shape hints cannot be parsed.
pub fn parse_prompt(text: &str, tier: DifficultyTier) -> Result<ParsedPrompt, NormalizeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if let Some(raw) = extract_json::<RawPrompt>(text) {
        if let Some(subject) = raw.subject {
            let subject = clean_subject(&subject)?;
            let primitives = raw.shapes.unwrap_or_default();
            return Ok(ParsedPrompt {
                subject,
                shape_hints: build_hints(primitives, raw.components, tier),
            });
        }
    }

    if let Some(caps) = SUBJECT_LINE.captures(text) {
        let subject = clean_subject(&caps[1])?;
        let primitives = SHAPES_LINE
            .captures(text)
            .map(|c| split_list(&c[1]))
            .unwrap_or_default();
        let components = match COMPONENTS_LINE.captures(text) {
            Some(c) => Some(
                c[1].trim()
                    .parse::<u32>()
                    .map_err(|_| NormalizeError::InvalidShapes(c[1].to_string()))?,
            ),
            None => None,
        };
        return Ok(ParsedPrompt {
            subject,
            shape_hints: build_hints(primitives, components, tier),
        });
    }

    if let Some(caps) = DRAW_LINE.captures(text) {
        let subject = clean_subject(&caps[1])?;
        return Ok(ParsedPrompt {
            subject,
            shape_hints: ShapeHints::components_only(tier.component_count()),
        });
    }

    Err(NormalizeError::NoSubject)
}

/// Normalize a scorer response into a judgment
///
/// Score precedence: explicit numeric field, JSON score field, labelled or
/// fractional score in text, percentage, a `Match: yes|no` line, then a
/// YES/NO keyword standing as its own sentence.
///
/// # Errors
/// Returns [`NormalizeError::NoScore`] if no rule produces a similarity.
pub fn normalize_judgment(response: &VisionResponse) -> Result<Judgment, NormalizeError> {
    let text = response.text.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() && response.score.is_none() {
        return Err(NormalizeError::Empty);
    }

    let raw = extract_json::<RawJudgment>(text).unwrap_or_default();

    let similarity = response
        .score
        .filter(|s| s.is_finite())
        .map(|s| scale_score(s, None))
        .or_else(|| raw.score.as_ref().and_then(json_score))
        .or_else(|| raw.r#match.map(|m| if m { YES_SIMILARITY } else { NO_SIMILARITY }))
        .or_else(|| text_score(text))
        .ok_or(NormalizeError::NoScore)?;

    let feedback = raw
        .feedback
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| text.to_string());
    let recognized = raw
        .recognized
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .or_else(|| {
            RECOGNIZED
                .captures(text)
                .map(|c| c[1].trim().to_lowercase())
                .filter(|r| !r.is_empty())
        });

    Ok(Judgment {
        similarity,
        feedback: truncate_chars(feedback.trim(), MAX_FEEDBACK_CHARS),
        recognized,
    })
}

/// Map a raw score onto [0, 1]
///
/// With an explicit denominator the score is divided by it. Otherwise values
/// up to 1 are taken as-is, up to 10 as out-of-ten, up to 100 as percent.
#[must_use]
pub fn scale_score(raw: f64, denominator: Option<f64>) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = match denominator {
        Some(d) if d > 0.0 => raw / d,
        _ if raw <= 1.0 => raw,
        _ if raw <= 10.0 => raw / 10.0,
        _ => raw / 100.0,
    };
    scaled.clamp(0.0, 1.0)
}

fn json_score(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(|s| scale_score(s, None)),
        serde_json::Value::String(s) => text_score(s).or_else(|| {
            s.trim()
                .parse::<f64>()
                .ok()
                .map(|v| scale_score(v, None))
        }),
        _ => None,
    }
}

fn text_score(text: &str) -> Option<f64> {
    if let Some(caps) = LABELLED_SCORE.captures(text) {
        let raw: f64 = caps[1].parse().ok()?;
        let denominator = match caps.get(2).map(|m| m.as_str()) {
            Some("%") => Some(100.0),
            Some(_) => caps.get(3).and_then(|d| d.as_str().parse::<f64>().ok()),
            None => None,
        };
        return Some(scale_score(raw, denominator));
    }
    if let Some(caps) = FRACTION.captures(text) {
        let raw: f64 = caps[1].parse().ok()?;
        let denominator: f64 = caps[2].parse().ok()?;
        return Some(scale_score(raw, Some(denominator)));
    }
    if let Some(caps) = PERCENT.captures(text) {
        let raw: f64 = caps[1].parse().ok()?;
        return Some(scale_score(raw, Some(100.0)));
    }
    let verdict = match MATCH_LINE.captures(text) {
        Some(caps) => caps[1].eq_ignore_ascii_case("yes"),
        None => {
            let upper = text.to_uppercase();
            let caps = VERDICT.captures(&upper)?;
            caps.get(1).or_else(|| caps.get(2))?.as_str() == "YES"
        }
    };
    Some(if verdict { YES_SIMILARITY } else { NO_SIMILARITY })
}

/// Locate and parse the outermost `{...}` in free text
fn extract_json<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn clean_subject(raw: &str) -> Result<String, NormalizeError> {
    let mut subject = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*')
        .trim_end_matches(['!', '.', '?'])
        .trim()
        .to_lowercase();

    for article in ["a ", "an ", "the ", "draw a ", "draw an "] {
        if let Some(rest) = subject.strip_prefix(article) {
            subject = rest.trim().to_string();
        }
    }

    if subject.is_empty() {
        return Err(NormalizeError::NoSubject);
    }
    if subject.chars().count() > MAX_SUBJECT_CHARS
        || subject.split_whitespace().count() > 8
        || !subject.chars().any(char::is_alphabetic)
    {
        return Err(NormalizeError::InvalidSubject(subject));
    }
    Ok(subject)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .flat_map(|part| part.split(" and "))
        .map(|s| s.trim().trim_matches(['[', ']', '"']).trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn build_hints(primitives: Vec<String>, components: Option<u32>, tier: DifficultyTier) -> ShapeHints {
    let primitives: Vec<String> = primitives
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    let components = components
        .filter(|c| *c > 0)
        .unwrap_or_else(|| tier.component_count());
    ShapeHints {
        primitives,
        components,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
