//! HTTP API
//!
//! | Method | Path                          | Engine operation     |
//! |--------|-------------------------------|----------------------|
//! | POST   | `/api/sessions/{id}/challenge`| `start_challenge`    |
//! | POST   | `/api/sessions/{id}/drawings` | `submit_drawing`     |
//! | GET    | `/api/sessions/{id}/reward`   | `fetch_reward`       |
//! | GET    | `/api/sessions/{id}`          | `get_session_status` |
//! | GET    | `/api/health`                 | `health`             |
//!
//! Handlers never reject: engine errors become JSON error bodies here, and
//! warp's own rejections are mapped by [`handle_rejection`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use scribble_core::{
    Drawing, GameConfig, GameError, ProgressionEngine, PromptId, Reward, RewardImage,
    RewardStatus, SessionId, Stroke,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Body limit for small JSON requests
const SMALL_BODY_LIMIT: u64 = 16 * 1024;

/// Level used when a challenge request names none
const DEFAULT_LEVEL: u32 = 1;

/// Body of `POST /challenge`
#[derive(Debug, Default, Deserialize)]
struct ChallengeBody {
    #[serde(default)]
    level: Option<u32>,
}

/// Body of `POST /drawings`
#[derive(Debug, Deserialize)]
struct SubmitBody {
    prompt_id: PromptId,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    canvas: Option<CanvasBody>,
}

#[derive(Debug, Deserialize)]
struct CanvasBody {
    width: u32,
    height: u32,
    #[serde(default)]
    strokes: Vec<Stroke>,
}

/// Reward as sent to the browser
#[derive(Debug, Serialize)]
struct RewardBody {
    prompt_id: PromptId,
    image_url: String,
    style: String,
    degraded: bool,
}

impl From<Reward> for RewardBody {
    fn from(reward: Reward) -> Self {
        let image_url = match reward.image {
            RewardImage::Url(url) => url,
            RewardImage::Bytes(bytes) => {
                format!("data:{};base64,{}", sniff_mime(&bytes), STANDARD.encode(&bytes))
            }
        };
        Self {
            prompt_id: reward.prompt_id,
            image_url,
            style: reward.style,
            degraded: reward.degraded,
        }
    }
}

/// Largest accepted drawing request: the payload limit after base64, plus JSON overhead
#[must_use]
pub fn drawing_body_limit(config: &GameConfig) -> u64 {
    let encoded = config.evaluation.max_payload_bytes.saturating_mul(4) / 3;
    u64::try_from(encoded)
        .unwrap_or(u64::MAX)
        .saturating_add(64 * 1024)
}

/// All API routes, with rejections recovered into JSON errors
///
/// `api_key_configured` is reported by `/api/health` next to capability reachability.
pub fn api(
    engine: ProgressionEngine,
    api_key_configured: bool,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let drawing_limit = drawing_body_limit(engine.config());

    let challenge = warp::path!("api" / "sessions" / String / "challenge")
        .and(warp::post())
        .and(warp::body::content_length_limit(SMALL_BODY_LIMIT))
        .and(warp::body::bytes())
        .and(with_engine(engine.clone()))
        .and_then(|id, body, engine| respond(start_challenge(id, body, engine)));

    let drawings = warp::path!("api" / "sessions" / String / "drawings")
        .and(warp::post())
        .and(warp::body::content_length_limit(drawing_limit))
        .and(warp::body::bytes())
        .and(with_engine(engine.clone()))
        .and_then(|id, body, engine| respond(submit_drawing(id, body, engine)));

    let reward = warp::path!("api" / "sessions" / String / "reward")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(|id, engine| respond(fetch_reward(id, engine)));

    let status = warp::path!("api" / "sessions" / String)
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(|id, engine| respond(session_status(id, engine)));

    let health_check = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_engine(engine))
        .map(move |engine: ProgressionEngine| health(&engine, api_key_configured));

    challenge
        .or(drawings)
        .or(reward)
        .or(status)
        .or(health_check)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

fn with_engine(
    engine: ProgressionEngine,
) -> impl Filter<Extract = (ProgressionEngine,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

async fn start_challenge(
    id: String,
    body: Bytes,
    engine: ProgressionEngine,
) -> Result<Response, GameError> {
    let session_id: SessionId = id.parse()?;
    let body: ChallengeBody = parse_optional_body(&body)?;
    let prompt = engine
        .start_challenge(&session_id, body.level.unwrap_or(DEFAULT_LEVEL))
        .await?;
    Ok(json_response(
        StatusCode::OK,
        &json!({
            "session_id": session_id,
            "challenge": prompt.challenge_text(),
            "prompt": prompt,
        }),
    ))
}

async fn submit_drawing(
    id: String,
    body: Bytes,
    engine: ProgressionEngine,
) -> Result<Response, GameError> {
    let session_id: SessionId = id.parse()?;
    let body: SubmitBody = serde_json::from_slice(&body)
        .map_err(|e| GameError::invalid(format!("malformed request body: {e}")))?;
    let drawing = into_drawing(body)?;
    let verdict = engine.submit_drawing(&session_id, drawing).await?;
    let session = engine.get_session_status(&session_id).await?;
    Ok(json_response(
        StatusCode::OK,
        &json!({ "verdict": verdict, "session": session }),
    ))
}

async fn fetch_reward(id: String, engine: ProgressionEngine) -> Result<Response, GameError> {
    let session_id: SessionId = id.parse()?;
    Ok(reward_response(engine.fetch_reward(&session_id).await?))
}

async fn session_status(id: String, engine: ProgressionEngine) -> Result<Response, GameError> {
    let session_id: SessionId = id.parse()?;
    let summary = engine.get_session_status(&session_id).await?;
    Ok(json_response(StatusCode::OK, &summary))
}

fn health(engine: &ProgressionEngine, api_key_configured: bool) -> Response {
    let health = engine.health();
    let status = if health.all_reachable() { "ok" } else { "degraded" };
    json_response(
        StatusCode::OK,
        &json!({
            "status": status,
            "capabilities": health,
            "api_key_configured": api_key_configured,
            "version": scribble_core::VERSION,
        }),
    )
}

fn parse_optional_body<T>(body: &[u8]) -> Result<T, GameError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| GameError::invalid(format!("malformed request body: {e}")))
}

fn into_drawing(body: SubmitBody) -> Result<Drawing, GameError> {
    match (body.image, body.canvas) {
        (Some(image), None) => Ok(Drawing::from_raster(body.prompt_id, decode_image(&image)?)),
        (None, Some(canvas)) => Ok(Drawing::from_strokes(
            body.prompt_id,
            canvas.width,
            canvas.height,
            canvas.strokes,
        )),
        _ => Err(GameError::invalid(
            "send exactly one of `image` or `canvas`",
        )),
    }
}

/// Decode a `data:image/...;base64,` URL or bare base64 into bytes
///
/// # Errors
/// `InvalidInput` for non-base64 data URLs and undecodable payloads
pub fn decode_image(data: &str) -> Result<Vec<u8>, GameError> {
    let data = data.trim();
    let payload = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| GameError::invalid("data URL has no payload"))?;
            if !header.ends_with(";base64") {
                return Err(GameError::invalid("data URL is not base64 encoded"));
            }
            payload
        }
        None => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| GameError::invalid(format!("image is not valid base64: {e}")))
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// `202` while synthesis runs, `200` with the reward once ready
#[must_use]
pub fn reward_response(status: RewardStatus) -> Response {
    match status {
        RewardStatus::Pending => json_response(StatusCode::ACCEPTED, &json!({ "state": "pending" })),
        RewardStatus::Ready(reward) => json_response(
            StatusCode::OK,
            &json!({ "state": "ready", "reward": RewardBody::from(reward) }),
        ),
    }
}

/// HTTP status for an engine error
#[must_use]
pub fn status_for(error: &GameError) -> StatusCode {
    match error {
        GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        GameError::OutOfOrderOperation { .. } => StatusCode::CONFLICT,
        GameError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        GameError::CapabilityTimeout { .. }
        | GameError::CapabilityUnavailable { .. }
        | GameError::CapabilityRefused { .. }
        | GameError::CapabilityExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_code(error: &GameError) -> &'static str {
    match error {
        GameError::InvalidInput(_) => "invalid_input",
        GameError::OutOfOrderOperation { .. } => "out_of_order",
        GameError::SessionNotFound(_) => "session_not_found",
        _ => "capability_unavailable",
    }
}

/// JSON error response for an engine error
#[must_use]
pub fn error_response(error: &GameError) -> Response {
    let status = status_for(error);
    if error.is_capability_failure() {
        tracing::warn!(%error, "request failed at a capability");
    } else {
        tracing::debug!(%error, "request rejected");
    }
    json_response(
        status,
        &json!({
            "error": error_code(error),
            "message": error.user_message(),
            "detail": error.to_string(),
        }),
    )
}

async fn respond<F>(handler: F) -> Result<Response, Infallible>
where
    F: Future<Output = Result<Response, GameError>>,
{
    Ok(handler.await.unwrap_or_else(|error| error_response(&error)))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// Map warp rejections (unknown routes, oversized bodies) to JSON errors
///
/// # Errors
/// Never fails
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no such endpoint")
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "request body is too large",
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "length_required",
            "request needs a Content-Length header",
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed",
        )
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    };
    Ok(json_response(
        status,
        &json!({ "error": code, "message": message }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribble_core::{CapabilityError, SessionStatus};
    use scribble_test_utils::{
        build_engine, fast_config, stroke_drawing, wait_for_reward, ScriptedImages, ScriptedText,
        ScriptedVision,
    };
    use serde_json::Value;
    use std::sync::Arc;

    fn engine_with(vision: ScriptedVision) -> ProgressionEngine {
        build_engine(
            fast_config(),
            Arc::new(ScriptedText::new().always_fail(CapabilityError::Timeout)),
            Arc::new(vision),
            Arc::new(ScriptedImages::new().always_url("https://img.example/reward.png")),
        )
    }

    fn body_json(response: &warp::http::Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    async fn post(engine: &ProgressionEngine, path: &str, body: &Value) -> warp::http::Response<Bytes> {
        warp::test::request()
            .method("POST")
            .path(path)
            .json(body)
            .reply(&api(engine.clone(), true))
            .await
    }

    async fn get(engine: &ProgressionEngine, path: &str) -> warp::http::Response<Bytes> {
        warp::test::request()
            .method("GET")
            .path(path)
            .reply(&api(engine.clone(), true))
            .await
    }

    async fn start(engine: &ProgressionEngine, session: &str) -> Value {
        let res = post(engine, &format!("/api/sessions/{session}/challenge"), &json!({})).await;
        assert_eq!(res.status(), StatusCode::OK);
        body_json(&res)
    }

    fn canvas_body(prompt_id: &Value) -> Value {
        let id: PromptId = serde_json::from_value(prompt_id.clone()).unwrap();
        let prompt = scribble_core::fallback_prompt(1, &[]);
        let drawing = stroke_drawing(&prompt);
        let scribble_core::DrawingData::Strokes { width, height, strokes } = drawing.data else {
            unreachable!("stroke drawing");
        };
        json!({
            "prompt_id": id,
            "canvas": { "width": width, "height": height, "strokes": strokes },
        })
    }

    #[tokio::test]
    async fn health_reports_all_reachable() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let res = get(&engine, "/api/health").await;

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(&res);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["capabilities"]["vision_scoring"], true);
        assert_eq!(body["api_key_configured"], true);
    }

    #[tokio::test]
    async fn health_reports_missing_api_key() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let res = warp::test::request()
            .method("GET")
            .path("/api/health")
            .reply(&api(engine, false))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(&res)["api_key_configured"], false);
    }

    #[tokio::test]
    async fn out_of_range_level_is_bad_request() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let res = post(&engine, "/api/sessions/climber/challenge", &json!({"level": u32::MAX})).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&res)["error"], "invalid_input");

        let res = get(&engine, "/api/sessions/climber").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn full_round_over_http() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let started = start(&engine, "player-1").await;
        assert_eq!(started["prompt"]["level"], 1);
        assert!(started["challenge"].as_str().unwrap().starts_with("Draw "));

        let res = post(
            &engine,
            "/api/sessions/player-1/drawings",
            &canvas_body(&started["prompt"]["id"]),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(&res);
        assert_eq!(body["verdict"]["passed"], true);
        assert_eq!(body["session"]["level"], 2);

        let session: SessionId = "player-1".parse().unwrap();
        wait_for_reward(&engine, &session).await;

        let res = get(&engine, "/api/sessions/player-1/reward").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(&res);
        assert_eq!(body["state"], "ready");
        assert_eq!(body["reward"]["image_url"], "https://img.example/reward.png");
        assert_eq!(body["reward"]["degraded"], false);
    }

    #[tokio::test]
    async fn raster_data_url_is_accepted() {
        let engine = engine_with(ScriptedVision::new().always_score(0.2));
        let started = start(&engine, "raster").await;

        let prompt = scribble_core::fallback_prompt(1, &[]);
        let png = scribble_core::canvas::encode(&stroke_drawing(&prompt).data)
            .unwrap()
            .png;
        let res = post(
            &engine,
            "/api/sessions/raster/drawings",
            &json!({
                "prompt_id": started["prompt"]["id"],
                "image": format!("data:image/png;base64,{}", STANDARD.encode(png)),
            }),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(&res);
        assert_eq!(body["verdict"]["passed"], false);
        assert_eq!(body["session"]["attempts"], 1);
        assert_eq!(body["session"]["status"], "awaiting_drawing");
    }

    #[tokio::test]
    async fn empty_canvas_is_bad_request() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let started = start(&engine, "blank").await;

        let res = post(
            &engine,
            "/api/sessions/blank/drawings",
            &json!({
                "prompt_id": started["prompt"]["id"],
                "canvas": { "width": 200, "height": 200, "strokes": [] },
            }),
        )
        .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&res)["error"], "invalid_input");
    }

    #[tokio::test]
    async fn image_and_canvas_together_are_rejected() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let started = start(&engine, "both").await;
        let mut body = canvas_body(&started["prompt"]["id"]);
        body["image"] = json!("data:image/png;base64,AAAA");

        let res = post(&engine, "/api/sessions/both/drawings", &body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let res = warp::test::request()
            .method("POST")
            .path("/api/sessions/player/drawings")
            .body("{not json")
            .reply(&api(engine, true))
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(&res)["detail"]
            .as_str()
            .unwrap()
            .contains("malformed request body"));
    }

    #[tokio::test]
    async fn empty_challenge_body_uses_level_one() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        let res = warp::test::request()
            .method("POST")
            .path("/api/sessions/quiet/challenge")
            .body("")
            .reply(&api(engine, true))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(&res)["prompt"]["level"], 1);
    }

    #[tokio::test]
    async fn second_challenge_mid_round_conflicts() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));
        start(&engine, "eager").await;

        let res = post(&engine, "/api/sessions/eager/challenge", &json!({"level": 3})).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(&res)["error"], "out_of_order");

        let res = get(&engine, "/api/sessions/eager/reward").await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_session_and_bad_ids() {
        let engine = engine_with(ScriptedVision::new().always_score(0.9));

        let res = get(&engine, "/api/sessions/ghost").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&res)["error"], "session_not_found");

        let res = get(&engine, "/api/sessions/bad.id").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = get(&engine, "/api/nothing-here").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&res)["error"], "not_found");
    }

    #[tokio::test]
    async fn judge_outage_is_service_unavailable() {
        let engine = engine_with(
            ScriptedVision::new().always_fail(CapabilityError::Transport("connection reset".into())),
        );
        let started = start(&engine, "outage").await;

        let res = post(
            &engine,
            "/api/sessions/outage/drawings",
            &canvas_body(&started["prompt"]["id"]),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(&res)["error"], "capability_unavailable");

        let res = get(&engine, "/api/sessions/outage").await;
        let summary = body_json(&res);
        assert_eq!(summary["status"], SessionStatus::Failed.as_str());
        assert_eq!(summary["outcome"], "service_unavailable");

        let res = get(&engine, "/api/health").await;
        assert_eq!(body_json(&res)["status"], "degraded");
    }

    #[test]
    fn pending_reward_is_accepted_status() {
        assert_eq!(reward_response(RewardStatus::Pending).status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn data_urls_and_bare_base64_decode() {
        assert_eq!(decode_image("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_image(" AQID ").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            decode_image("data:image/png,raw"),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(decode_image("data:image/png;base64"), Err(GameError::InvalidInput(_))));
        assert!(matches!(decode_image("%%%"), Err(GameError::InvalidInput(_))));
    }

    #[test]
    fn inline_reward_bytes_become_data_urls() {
        let prompt = scribble_core::fallback_prompt(1, &[]);
        let reward: Reward = serde_json::from_value(json!({
            "prompt_id": prompt.id,
            "drawing_id": scribble_core::DrawingId::new(),
            "image": { "kind": "bytes", "value": b"\x89PNG rest".to_vec() },
            "style": "watercolor",
            "degraded": false,
            "created_at": "2026-01-01T00:00:00Z",
        }))
        .unwrap();

        let body = RewardBody::from(reward);
        assert!(body.image_url.starts_with("data:image/png;base64,"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }

    #[test]
    fn body_limit_covers_base64_growth() {
        let config = GameConfig::default();
        let limit = drawing_body_limit(&config);
        let raw = u64::try_from(config.evaluation.max_payload_bytes).unwrap();
        assert!(limit > raw * 4 / 3);
    }
}
