//! HTTP route definitions

use axum::{
    extract::{Extension, Path, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::bot::protocol::{BotInput, Observation, Side};
use crate::game::frame_data::{AttackFrameData, AttackType, FRAME_DATA, FRAME_DATA_VERSION};
use crate::game::session::MatchStatus;
use crate::game::{MatchConfig, MatchConfigError, MatchState, SessionError};
use crate::http::middleware::{require_bot_token, sign_bot_token, AuthError, AuthenticatedBot};
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no bot token required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/frame-data", get(frame_data_handler))
        .route("/matches", post(create_match_handler))
        .route("/matches/:id", get(match_status_handler));

    // Bot routes (token for one side of the match in the path)
    let bot_routes = Router::new()
        .route("/matches/:id/input", post(input_handler))
        .route("/matches/:id/observation", get(observation_handler))
        .route("/matches/:id/forfeit", post(forfeit_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bot_token));

    Router::new()
        .merge(public_routes)
        .merge(bot_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    total_matches: usize,
    frame_data_version: u32,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        total_matches: state.match_registry.total_matches(),
        frame_data_version: FRAME_DATA_VERSION,
    })
}

#[derive(Serialize)]
struct FrameDataEntry {
    attack_type: AttackType,
    total_frames: u32,
    #[serde(flatten)]
    data: &'static AttackFrameData,
}

#[derive(Serialize)]
struct FrameDataResponse {
    version: u32,
    attacks: Vec<FrameDataEntry>,
}

async fn frame_data_handler() -> Json<FrameDataResponse> {
    let attacks = FRAME_DATA
        .iter()
        .map(|(attack_type, data)| FrameDataEntry {
            attack_type: *attack_type,
            total_frames: data.total_frames(),
            data,
        })
        .collect();

    Json(FrameDataResponse {
        version: FRAME_DATA_VERSION,
        attacks,
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateMatchRequest {
    p1_bot_id: Uuid,
    p2_bot_id: Uuid,
    #[serde(default)]
    rounds_to_win: Option<u32>,
    #[serde(default)]
    round_time_seconds: Option<u32>,
}

#[derive(Serialize)]
struct CreateMatchResponse {
    match_id: Uuid,
    p1_token: String,
    p2_token: String,
    config: MatchConfig,
}

async fn create_match_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    let defaults = &state.config.match_defaults;
    let config = MatchConfig {
        rounds_to_win: req.rounds_to_win.unwrap_or(defaults.rounds_to_win),
        round_time_seconds: req.round_time_seconds.unwrap_or(defaults.round_time_seconds),
        ..defaults.clone()
    };

    let match_id = Uuid::new_v4();
    let match_state = MatchState::new(match_id, [req.p1_bot_id, req.p2_bot_id], config.clone())?;

    let secret = &state.config.bot_token_secret;
    let p1_token = sign_bot_token(secret, match_id, Side::P1)?;
    let p2_token = sign_bot_token(secret, match_id, Side::P2)?;

    let pruned = state.prune_finished_matches();
    state
        .match_registry
        .spawn(match_state, state.ratings.clone());

    info!(
        match_id = %match_id,
        p1 = %req.p1_bot_id,
        p2 = %req.p2_bot_id,
        pruned,
        "Match created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateMatchResponse {
            match_id,
            p1_token,
            p2_token,
            config,
        }),
    ))
}

async fn match_status_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<MatchStatus>, AppError> {
    let handle = state
        .match_registry
        .get(&match_id)
        .ok_or_else(|| AppError::NotFound(format!("match {match_id}")))?;
    Ok(Json(handle.status()))
}

// ============================================================================
// Bot endpoints
// ============================================================================

#[derive(Serialize)]
struct InputResponse {
    accepted: bool,
    frame_number: u64,
}

async fn input_handler(
    State(state): State<AppState>,
    Extension(bot): Extension<AuthenticatedBot>,
    Json(input): Json<BotInput>,
) -> Result<(StatusCode, Json<InputResponse>), AppError> {
    let handle = state
        .match_registry
        .get(&bot.match_id)
        .ok_or_else(|| AppError::NotFound(format!("match {}", bot.match_id)))?;

    let bot_id = handle.bot_ids[bot.side.index()];
    if !state.check_input_rate(bot_id) {
        return Err(AppError::RateLimited);
    }

    handle.submit_input(bot.side, input)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(InputResponse {
            accepted: true,
            frame_number: handle.status().frame_number,
        }),
    ))
}

async fn observation_handler(
    State(state): State<AppState>,
    Extension(bot): Extension<AuthenticatedBot>,
) -> Result<Json<Observation>, AppError> {
    let handle = state
        .match_registry
        .get(&bot.match_id)
        .ok_or_else(|| AppError::NotFound(format!("match {}", bot.match_id)))?;
    Ok(Json(handle.latest_observation(bot.side)))
}

async fn forfeit_handler(
    State(state): State<AppState>,
    Extension(bot): Extension<AuthenticatedBot>,
) -> Result<StatusCode, AppError> {
    let handle = state
        .match_registry
        .get(&bot.match_id)
        .ok_or_else(|| AppError::NotFound(format!("match {}", bot.match_id)))?;
    handle.forfeit(bot.side)?;
    info!(match_id = %bot.match_id, side = bot.side.as_str(), "Forfeit requested");
    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<MatchConfigError> for AppError {
    fn from(e: MatchConfigError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::MatchClosed => AppError::Conflict(e.to_string()),
            SessionError::QueueFull => AppError::Unavailable(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(_: AuthError) -> Self {
        AppError::Unauthorized
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
