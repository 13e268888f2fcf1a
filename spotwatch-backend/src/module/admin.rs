///! Administrative HTTP surface
///!
///! Bearer-token protected JSON endpoints over the callsign store and the
///! schedule store. Every mutation goes through the store's own lock.

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::callsign::CallsignStore;
use super::schedule::{ScheduleStore, parse_enabled_flag};
use crate::error::BotError;

pub struct AdminState {
    pub callsigns: Arc<CallsignStore>,
    pub schedule: Arc<ScheduleStore>,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct AddCallsign {
    callsign: String,
}

#[derive(Debug, Deserialize)]
struct SetTime {
    time: String,
    dow: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SetContent {
    text: String,
    /// JSON array of card objects, as text
    embeds: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetEnabled {
    enabled: serde_json::Value,
}

fn error_response(e: BotError) -> Response {
    if e.is_validation() {
        tracing::debug!("Rejected admin request: {}", e);
        (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
    } else {
        tracing::error!("Admin request failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "storage failure" })),
        )
            .into_response()
    }
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{} not found", what) })),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(given: &str, expected: &str) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

async fn require_token(
    State(state): State<Arc<AdminState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = matches!(
        bearer_token(request.headers()),
        Some(token) if !state.token.is_empty() && tokens_match(token, &state.token)
    );
    if !authorized {
        tracing::warn!("Unauthorized admin request to {}", request.uri().path());
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response();
    }
    next.run(request).await
}

async fn list_callsigns(State(state): State<Arc<AdminState>>) -> Response {
    match state.callsigns.list().await {
        Ok(callsigns) => Json(json!({ "callsigns": callsigns })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn add_callsign(
    State(state): State<Arc<AdminState>>,
    Json(body): Json<AddCallsign>,
) -> Response {
    match state.callsigns.add(&body.callsign).await {
        Ok(callsign) => {
            tracing::info!("Admin added callsign {}", callsign);
            (StatusCode::CREATED, Json(json!({ "callsign": callsign }))).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn remove_callsign(
    State(state): State<Arc<AdminState>>,
    Path(callsign): Path<String>,
) -> Response {
    match state.callsigns.remove(&callsign).await {
        Ok(true) => {
            tracing::info!("Admin removed callsign {}", callsign);
            Json(json!({ "removed": callsign.to_uppercase() })).into_response()
        }
        Ok(false) => not_found("Callsign"),
        Err(e) => error_response(e),
    }
}

async fn list_schedule(State(state): State<Arc<AdminState>>) -> Response {
    match state.schedule.load().await {
        Ok(entries) => Json(json!({ "entries": entries })).into_response(),
        Err(e) => error_response(e),
    }
}

fn schedule_update(name: &str, result: crate::error::Result<bool>) -> Response {
    match result {
        Ok(true) => {
            tracing::info!("Admin updated scheduled message '{}'", name);
            Json(json!({ "updated": name })).into_response()
        }
        Ok(false) => not_found("Scheduled message"),
        Err(e) => error_response(e),
    }
}

async fn set_time(
    State(state): State<Arc<AdminState>>,
    Path(name): Path<String>,
    Json(body): Json<SetTime>,
) -> Response {
    let result = state.schedule.set_time(&name, &body.time, body.dow).await;
    schedule_update(&name, result)
}

async fn set_content(
    State(state): State<Arc<AdminState>>,
    Path(name): Path<String>,
    Json(body): Json<SetContent>,
) -> Response {
    let result = state
        .schedule
        .set_content(&name, &body.text, body.embeds.as_deref())
        .await;
    schedule_update(&name, result)
}

async fn set_enabled(
    State(state): State<Arc<AdminState>>,
    Path(name): Path<String>,
    Json(body): Json<SetEnabled>,
) -> Response {
    let enabled = match parse_enabled_flag(&body.enabled) {
        Ok(enabled) => enabled,
        Err(e) => return error_response(e),
    };
    let result = state.schedule.set_enabled(&name, enabled).await;
    schedule_update(&name, result)
}

pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/callsigns", get(list_callsigns).post(add_callsign))
        .route("/callsigns/{callsign}", axum::routing::delete(remove_callsign))
        .route("/schedule", get(list_schedule))
        .route("/schedule/{name}/time", put(set_time))
        .route("/schedule/{name}/content", put(set_content))
        .route("/schedule/{name}/enabled", put(set_enabled))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

/// Serve the admin API until the task is aborted.
pub async fn start_admin_server(state: Arc<AdminState>, addr: String) -> anyhow::Result<()> {
    let app = router(state);

    tracing::info!("Starting admin server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
