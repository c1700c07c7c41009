//! Encounter API routes.
//!
//! The run endpoint is the interesting one: it opens an SSE stream and
//! republishes the orchestrator's ordered events. Everything else is
//! plain JSON CRUD over the encounter store.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skirmish_core::encounter::{Encounter, EncounterStore, StoreError};
use skirmish_core::orchestrator::{RunError, RunEvent};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::App;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/encounters", post(create_encounter))
        .route("/api/encounters/{id}", get(get_encounter))
        .route("/api/encounters/{id}/transcript", get(get_transcript))
        .route("/api/encounters/{id}/run", get(run_encounter))
        .with_state(app)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Forbidden,
    AlreadyRun,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Encounter belongs to another user".to_string(),
            ),
            ApiError::AlreadyRun => (
                StatusCode::CONFLICT,
                "Encounter has already been run".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound("Encounter"),
            StoreError::TranscriptExists(_) => ApiError::AlreadyRun,
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<RunError> for ApiError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::NotFound => ApiError::NotFound("Encounter"),
            RunError::Forbidden => ApiError::Forbidden,
            RunError::AlreadyRun => ApiError::AlreadyRun,
            RunError::Store(e) => e.into(),
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEncounterRequest {
    name: String,
    description: String,
    created_by: String,
}

async fn create_encounter(
    State(app): State<Arc<App>>,
    Json(req): Json<CreateEncounterRequest>,
) -> Result<(StatusCode, Json<Encounter>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    let encounter = Encounter::new(req.name, req.description, req.created_by);
    app.store.create(encounter.clone()).await?;
    tracing::info!(encounter = %encounter.id, name = %encounter.name, "encounter created");
    Ok((StatusCode::CREATED, Json(encounter)))
}

fn parse_id(id: &str) -> Result<skirmish_core::EncounterId, ApiError> {
    Uuid::parse_str(id)
        .map(skirmish_core::EncounterId::from_uuid)
        .map_err(|_| ApiError::BadRequest("Invalid encounter id".to_string()))
}

async fn get_encounter(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<Encounter>, ApiError> {
    let id = parse_id(&id)?;
    let encounter = app
        .store
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("Encounter"))?;
    Ok(Json(encounter))
}

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    transcript: String,
}

async fn get_transcript(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let id = parse_id(&id)?;
    app.store
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("Encounter"))?;
    let transcript = app
        .store
        .transcript(id)
        .await?
        .ok_or(ApiError::NotFound("Transcript"))?;
    Ok(Json(TranscriptResponse { transcript }))
}

#[derive(Debug, Deserialize)]
struct RunParams {
    requester: Option<String>,
}

async fn run_encounter(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    Query(params): Query<RunParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = parse_id(&id)?;
    let stream = app
        .orchestrator
        .start_run(id, params.requester.as_deref())
        .await?;
    Ok(Sse::new(stream.map(to_sse_event)).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: RunEvent) -> Result<Event, Infallible> {
    let sse = Event::default()
        .id(event.id.to_string())
        .event(event.data.event_name());
    Ok(match serde_json::to_string(&event.data) {
        Ok(payload) => sse.data(payload),
        // Payloads are plain serializable structs, so this arm should
        // never run; surface it on the wire rather than dropping the
        // event silently.
        Err(e) => Event::default()
            .id(event.id.to_string())
            .event("error")
            .data(json!({ "error": format!("serialization failed: {e}") }).to_string()),
    })
}
