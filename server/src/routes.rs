//! HTTP routes.
//!
//! - `POST /api/pastes`: create a paste
//! - `GET /api/pastes/:id`: fetch a paste as JSON
//! - `GET /api/healthz`: backend liveness
//! - `GET /p/:id`: view a paste as HTML

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::TypedHeader;
use maud::Markup;
use serde_json::Value;
use tinypaste_common::{time, CreatedPaste, FetchedPaste, Health, TestNow, API_ENDPOINT};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{instrument, warn};

use crate::dispatch::NewPaste;
use crate::error::{ApiError, PageError};
use crate::lifecycle::Resolution;
use crate::render;
use crate::state::AppState;

type ClockHeader = Option<TypedHeader<TestNow>>;

fn header_now(state: &AppState, test_now: ClockHeader) -> i64 {
    state.now(test_now.map(|TypedHeader(now)| now))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/pastes", post(create_paste))
        .route("/pastes/:id", get(fetch_paste))
        .route("/healthz", get(health));

    let mut router = Router::new()
        .nest(API_ENDPOINT, api)
        .route("/p/:id", get(view_paste));

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[instrument(skip_all)]
async fn create_paste(
    State(state): State<AppState>,
    test_now: ClockHeader,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedPaste>), ApiError> {
    let now = header_now(&state, test_now);
    // Unparseable bodies fail validation on `content` like empty ones.
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let paste = NewPaste::parse(&body, now)?;

    let id = state.dispatcher.create(paste, now).await?;
    let url = state.paste_url(&headers, &id);
    Ok((StatusCode::CREATED, Json(CreatedPaste { id, url })))
}

#[instrument(skip(state, test_now))]
async fn fetch_paste(
    State(state): State<AppState>,
    test_now: ClockHeader,
    Path(id): Path<String>,
) -> Result<Json<FetchedPaste>, ApiError> {
    let now = header_now(&state, test_now);
    match state.dispatcher.resolve(&id, now).await? {
        Resolution::Available(view) => Ok(Json(FetchedPaste {
            remaining_views: view.remaining_views(),
            expires_at: view.expires_at.and_then(time::to_iso8601),
            content: view.content,
        })),
        Resolution::Unavailable => Err(ApiError::NotFound),
    }
}

#[instrument(skip(state, test_now))]
async fn view_paste(
    State(state): State<AppState>,
    test_now: ClockHeader,
    Path(id): Path<String>,
) -> Result<Markup, PageError> {
    let now = header_now(&state, test_now);
    match state.dispatcher.resolve(&id, now).await? {
        Resolution::Available(view) => Ok(render::paste_page(&id, &view)),
        Resolution::Unavailable => Err(PageError::NotFound),
    }
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let ok = state.dispatcher.check_health().await;
    let backend = state.dispatcher.mode().to_string();
    if ok {
        (StatusCode::OK, Json(Health { ok, backend }))
    } else {
        warn!(%backend, "backend health check failed");
        (StatusCode::SERVICE_UNAVAILABLE, Json(Health { ok, backend }))
    }
}
