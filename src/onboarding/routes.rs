//! REST endpoints for onboarding sessions, the stateless resolver and the
//! biography generator.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::debug;

use super::action::TurnRequest;
use super::bio::{BioGenerator, BioInput};
use super::catalog::Locale;
use super::manager::OnboardingManager;
use super::model::Field;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
    pub bio: Arc<BioGenerator>,
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/turn", post(resolve_turn))
        .route("/api/onboarding/bio", post(generate_bio))
        .route(
            "/api/onboarding/sessions/{user_id}",
            get(get_status).delete(reset_session),
        )
        .route("/api/onboarding/sessions/{user_id}/start", post(start_session))
        .route("/api/onboarding/sessions/{user_id}/messages", post(post_message))
        .route("/api/onboarding/sessions/{user_id}/finalize", post(finalize))
        .route("/api/onboarding/sessions/{user_id}/change", post(request_change))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// First address in `X-Forwarded-For`, recorded as IP metadata.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bad_request(message: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message.into()})),
    )
        .into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "profile-onboarding"
    }))
}

// ── Stateless resolver ──────────────────────────────────────────────────

/// POST /api/onboarding/turn
///
/// One resolver turn over a caller-held draft. The caller applies the
/// returned actions itself.
async fn resolve_turn(
    State(state): State<OnboardingRouteState>,
    Json(request): Json<TurnRequest>,
) -> impl IntoResponse {
    let response = state.manager.resolver().resolve(&request, None).await;
    Json(response)
}

// ── Sessions ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StartParams {
    locale: Option<String>,
}

/// POST /api/onboarding/sessions/{user_id}/start?locale=fr
async fn start_session(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
    Query(params): Query<StartParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let locale = params.locale.as_deref().and_then(Locale::parse);
    let outcome = state
        .manager
        .start(&user_id, locale, client_ip(&headers))
        .await;
    Json(outcome)
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    text: String,
}

/// POST /api/onboarding/sessions/{user_id}/messages
async fn post_message(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<MessageBody>,
) -> axum::response::Response {
    if body.text.trim().is_empty() {
        return bad_request("Message text is empty");
    }
    let outcome = state
        .manager
        .handle_message(&user_id, &body.text, client_ip(&headers))
        .await;
    Json(outcome).into_response()
}

/// POST /api/onboarding/sessions/{user_id}/finalize
async fn finalize(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    Json(state.manager.finalize(&user_id).await)
}

#[derive(Debug, Deserialize)]
struct ChangeBody {
    field: String,
}

/// POST /api/onboarding/sessions/{user_id}/change
async fn request_change(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
    Json(body): Json<ChangeBody>,
) -> axum::response::Response {
    let field = match body.field.parse::<Field>() {
        Ok(f) => f,
        Err(e) => return bad_request(e.to_string()),
    };
    Json(state.manager.request_change(&user_id, field).await).into_response()
}

/// DELETE /api/onboarding/sessions/{user_id}
async fn reset_session(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let reset = state.manager.reset(&user_id).await;
    Json(serde_json::json!({"reset": reset}))
}

/// GET /api/onboarding/sessions/{user_id}
async fn get_status(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    match state.manager.status(&user_id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            debug!(user_id = %user_id, "Status lookup failed: {e}");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

// ── Bio ─────────────────────────────────────────────────────────────────

/// POST /api/onboarding/bio
async fn generate_bio(
    State(state): State<OnboardingRouteState>,
    Json(input): Json<BioInput>,
) -> axum::response::Response {
    if input.keywords.iter().all(|k| k.trim().is_empty()) {
        return bad_request("At least one keyword is required");
    }
    Json(state.bio.generate(&input).await).into_response()
}
