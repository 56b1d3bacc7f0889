//! Testing utilities for the Scribble Quest workspace
//!
//! Scripted capability doubles, fixtures and polling helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scribble_core::capability::{
    Capabilities, GeneratedImage, ImageGenerator, ImageRequest, TextGenerator, TextRequest,
    TextResponse, VisionRequest, VisionResponse, VisionScorer,
};
use scribble_core::{
    CapabilityError, Drawing, GameConfig, Point, ProgressionEngine, Prompt, RetryPolicy, Reward,
    RewardStatus, SessionId, Stroke,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One scripted capability answer
#[derive(Debug, Clone)]
pub enum Step<T> {
    Reply(T),
    Fail(CapabilityError),
    Delayed(Duration, T),
    Hang,
}

#[derive(Debug)]
struct Script<T, R> {
    steps: Mutex<VecDeque<Step<T>>>,
    repeat: Mutex<Option<Step<T>>>,
    requests: Mutex<Vec<R>>,
}

impl<T, R> Default for Script<T, R> {
    fn default() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone, R: Clone> Script<T, R> {
    fn push(&self, step: Step<T>) {
        self.steps.lock().push_back(step);
    }

    fn repeat(&self, step: Step<T>) {
        *self.repeat.lock() = Some(step);
    }

    fn next(&self, request: R) -> Option<Step<T>> {
        self.requests.lock().push(request);
        let queued = self.steps.lock().pop_front();
        queued.or_else(|| self.repeat.lock().clone())
    }

    fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    fn requests(&self) -> Vec<R> {
        self.requests.lock().clone()
    }
}

async fn play<T>(step: Option<Step<T>>) -> Result<T, CapabilityError> {
    match step {
        Some(Step::Reply(value)) => Ok(value),
        Some(Step::Fail(error)) => Err(error),
        Some(Step::Delayed(delay, value)) => {
            tokio::time::sleep(delay).await;
            Ok(value)
        }
        Some(Step::Hang) => std::future::pending().await,
        None => Err(CapabilityError::Transport("script exhausted".into())),
    }
}

/// Scripted text generator
#[derive(Debug, Default)]
pub struct ScriptedText {
    script: Script<TextResponse, TextRequest>,
}

impl ScriptedText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.script.push(Step::Reply(text_response(text)));
        self
    }

    pub fn fail(self, error: CapabilityError) -> Self {
        self.script.push(Step::Fail(error));
        self
    }

    pub fn always(self, text: &str) -> Self {
        self.script.repeat(Step::Reply(text_response(text)));
        self
    }

    pub fn always_fail(self, error: CapabilityError) -> Self {
        self.script.repeat(Step::Fail(error));
        self
    }

    pub fn always_hang(self) -> Self {
        self.script.repeat(Step::Hang);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    pub fn requests(&self) -> Vec<TextRequest> {
        self.script.requests()
    }
}

fn text_response(text: &str) -> TextResponse {
    TextResponse {
        text: text.to_string(),
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_text(&self, request: TextRequest) -> Result<TextResponse, CapabilityError> {
        play(self.script.next(request)).await
    }
}

/// Scripted vision scorer
#[derive(Debug, Default)]
pub struct ScriptedVision {
    script: Script<VisionResponse, VisionRequest>,
}

impl ScriptedVision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric score with a short description
    pub fn score(self, score: f64) -> Self {
        self.script.push(Step::Reply(scored(score)));
        self
    }

    /// Free-text answer only
    pub fn say(self, text: &str) -> Self {
        self.script.push(Step::Reply(VisionResponse {
            text: Some(text.to_string()),
            score: None,
        }));
        self
    }

    pub fn delayed_score(self, delay: Duration, score: f64) -> Self {
        self.script.push(Step::Delayed(delay, scored(score)));
        self
    }

    pub fn fail(self, error: CapabilityError) -> Self {
        self.script.push(Step::Fail(error));
        self
    }

    pub fn always_score(self, score: f64) -> Self {
        self.script.repeat(Step::Reply(scored(score)));
        self
    }

    pub fn always_delayed_score(self, delay: Duration, score: f64) -> Self {
        self.script.repeat(Step::Delayed(delay, scored(score)));
        self
    }

    pub fn always_fail(self, error: CapabilityError) -> Self {
        self.script.repeat(Step::Fail(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    pub fn requests(&self) -> Vec<VisionRequest> {
        self.script.requests()
    }
}

fn scored(score: f64) -> VisionResponse {
    VisionResponse {
        text: Some("I see a drawing.".to_string()),
        score: Some(score),
    }
}

#[async_trait]
impl VisionScorer for ScriptedVision {
    async fn score(&self, request: VisionRequest) -> Result<VisionResponse, CapabilityError> {
        play(self.script.next(request)).await
    }
}

/// Scripted image generator
#[derive(Debug, Default)]
pub struct ScriptedImages {
    script: Script<GeneratedImage, ImageRequest>,
}

impl ScriptedImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(self, url: &str) -> Self {
        self.script.push(Step::Reply(GeneratedImage::Url(url.to_string())));
        self
    }

    pub fn bytes(self, bytes: Vec<u8>) -> Self {
        self.script.push(Step::Reply(GeneratedImage::Bytes(bytes)));
        self
    }

    pub fn fail(self, error: CapabilityError) -> Self {
        self.script.push(Step::Fail(error));
        self
    }

    pub fn always_url(self, url: &str) -> Self {
        self.script
            .repeat(Step::Reply(GeneratedImage::Url(url.to_string())));
        self
    }

    pub fn always_fail(self, error: CapabilityError) -> Self {
        self.script.repeat(Step::Fail(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.script.requests()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImages {
    async fn generate_image(&self, request: ImageRequest) -> Result<GeneratedImage, CapabilityError> {
        play(self.script.next(request)).await
    }
}

/// Retry policy with millisecond delays
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        call_timeout_ms: 100,
    }
}

/// Default game rules with fast retries
pub fn fast_config() -> GameConfig {
    GameConfig::new().with_retry(fast_retry())
}

pub fn session_id(name: &str) -> SessionId {
    name.parse().unwrap()
}

/// A house-ish sketch for `prompt`
pub fn stroke_drawing(prompt: &Prompt) -> Drawing {
    Drawing::from_strokes(
        prompt.id,
        200,
        200,
        vec![
            Stroke::new(vec![
                Point::new(40.0, 100.0),
                Point::new(160.0, 100.0),
                Point::new(160.0, 180.0),
                Point::new(40.0, 180.0),
                Point::new(40.0, 100.0),
            ]),
            Stroke::new(vec![
                Point::new(40.0, 100.0),
                Point::new(100.0, 40.0),
                Point::new(160.0, 100.0),
            ]),
        ],
    )
}

/// A drawing with no strokes at all
pub fn empty_drawing(prompt: &Prompt) -> Drawing {
    Drawing::from_strokes(prompt.id, 200, 200, Vec::new())
}

/// The three doubles wired into an engine
pub fn build_engine(
    config: GameConfig,
    text: Arc<ScriptedText>,
    vision: Arc<ScriptedVision>,
    images: Arc<ScriptedImages>,
) -> ProgressionEngine {
    ProgressionEngine::new(config, Capabilities::new(text, vision, images))
}

/// Poll until the session's reward is ready
pub async fn wait_for_reward(engine: &ProgressionEngine, id: &SessionId) -> Reward {
    for _ in 0..400 {
        match engine.fetch_reward(id).await {
            Ok(RewardStatus::Ready(reward)) => return reward,
            Ok(RewardStatus::Pending) => tokio::time::sleep(Duration::from_millis(5)).await,
            Err(error) => panic!("fetch_reward failed: {error}"),
        }
    }
    panic!("reward for {id} never became ready");
}
