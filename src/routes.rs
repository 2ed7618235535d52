use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    catalog::{catalog, random_topic, Catalog},
    controller::Controller,
    error::AppError,
    models::{
        ConfirmRequest, CreateSessionRequest, GenerateRequest, LengthDecisionRequest, RunSettings, SegmentsRequest,
        Session, StyleConfig,
    },
    pdf::generate_pdf,
};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/catalog", get(get_catalog))
        .route("/api/topics/random", get(get_random_topic))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/settings", put(update_settings))
        .route("/api/sessions/:id/style", put(update_style))
        .route("/api/sessions/:id/generate", post(generate))
        .route("/api/sessions/:id/length-decision", post(decide_length))
        .route("/api/sessions/:id/segments", put(edit_segments))
        .route("/api/sessions/:id/confirm", post(confirm))
        .route("/api/sessions/:id/cancel", post(cancel))
        .route("/api/sessions/:id/reset", post(reset))
        .route("/api/sessions/:id/images", post(render_images))
        .route("/api/sessions/:id/pdf", get(export_pdf))
        .with_state(state)
}

pub async fn get_catalog() -> Json<Catalog> {
    Json(catalog())
}

pub async fn get_random_topic() -> Json<Value> {
    Json(json!({ "topic": random_topic() }))
}

pub async fn create_session(State(state): State<AppState>, body: Option<Json<CreateSessionRequest>>) -> Json<Session> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    Json(state.controller.create_session(request))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, AppError> {
    state.controller.get(id).map(Json)
}

pub async fn update_settings(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(settings): Json<RunSettings>,
) -> Result<Json<Session>, AppError> {
    state.controller.update_settings(id, settings).map(Json)
}

pub async fn update_style(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(style): Json<StyleConfig>,
) -> Result<Json<Session>, AppError> {
    state.controller.update_style(id, style).map(Json)
}

pub async fn generate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<Session>, AppError> {
    tracing::info!("🚀 Generate requested for session {}", id);
    state.controller.generate(id, body).await.map(Json)
}

pub async fn decide_length(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<LengthDecisionRequest>,
) -> Result<Json<Session>, AppError> {
    tracing::info!("📏 Length decision {:?} for session {}", body.choice, id);
    state.controller.decide_length(id, body.choice).await.map(Json)
}

pub async fn edit_segments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SegmentsRequest>,
) -> Result<Json<Session>, AppError> {
    state.controller.edit_segments(id, body.segments).map(Json)
}

pub async fn confirm(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    body: Option<Json<ConfirmRequest>>,
) -> Result<Json<Session>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    tracing::info!("🎯 Building prompts for session {}", id);
    state.controller.confirm(id, request).await.map(Json)
}

pub async fn cancel(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, AppError> {
    state.controller.cancel(id).map(Json)
}

pub async fn reset(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, AppError> {
    state.controller.reset(id).map(Json)
}

pub async fn render_images(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, AppError> {
    tracing::info!("🎨 Image rendering requested for session {}", id);
    state.controller.render_images(id).await.map(Json)
}

pub async fn export_pdf(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Response, AppError> {
    let (prompts, style) = state.controller.completed_prompts(id)?;
    let pdf_bytes = generate_pdf(&prompts, &style)?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"prompts_{}.pdf\"", id))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok((headers, pdf_bytes).into_response())
}
