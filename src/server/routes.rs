use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, info};
use serde::Deserialize;

use super::error::AppError;
use super::security::session_id;
use super::state::AppState;
use crate::libcquizy::api::{CsrfTokenBody, Envelope, Health, QuestionBody, QuestionList, Status};
use crate::libcquizy::question::{Question, QuestionPayload};

#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    pub category: Option<String>,
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("id", "Invalid question ID format"))
}

fn payload(body: Result<Json<QuestionPayload>, JsonRejection>) -> Result<QuestionPayload, AppError> {
    body.map(|Json(payload)| payload)
        .map_err(|rejection| AppError::validation("body", &rejection.body_text()))
}

pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListFilter>, QueryRejection>,
) -> Result<Json<Envelope<QuestionList>>, AppError> {
    let Query(filter) =
        query.map_err(|rejection| AppError::validation("category", &rejection.body_text()))?;
    let connection = state.db().await;
    let questions = match filter.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => Question::get_in_category(&connection, category)?,
        _ => Question::get_all(&connection)?,
    };
    debug!("[API] Listing {} questions", questions.len());
    Ok(Json(Envelope::list(questions)))
}

pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<QuestionBody>>, AppError> {
    let id = parse_id(&id)?;
    let connection = state.db().await;
    let question = Question::get_by_id(&connection, id)?.ok_or_else(AppError::question_not_found)?;
    Ok(Json(Envelope::success(QuestionBody { question })))
}

pub async fn create_question(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QuestionPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<QuestionBody>>), AppError> {
    let new = payload(body)?.into_new().map_err(AppError::Validation)?;
    let connection = state.db().await;
    let question = Question::insert(&connection, new)?;
    info!("[API] Created question {}", question.id);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(QuestionBody { question })),
    ))
}

pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<QuestionPayload>, JsonRejection>,
) -> Result<Json<Envelope<QuestionBody>>, AppError> {
    let id = parse_id(&id)?;
    let patch = payload(body)?.into_patch().map_err(AppError::Validation)?;
    let connection = state.db().await;
    let question = Question::update(&connection, id, patch)?.ok_or_else(AppError::question_not_found)?;
    info!("[API] Updated question {}", question.id);
    Ok(Json(Envelope::success(QuestionBody { question })))
}

pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    let connection = state.db().await;
    if !Question::delete(&connection, id)? {
        return Err(AppError::question_not_found());
    }
    info!("[API] Deleted question {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Issues (or re-reads) the session's CSRF token and sets the session cookie.
pub async fn csrf_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let existing = session_id(&headers);
    let (session_id, csrf_token) = state.sessions.issue(existing.as_deref()).await;
    let cookie = state.policy.session_cookie(&session_id)?;

    let mut response = Json(CsrfTokenBody { csrf_token }).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: Status::Success,
        message: "CQuizy API is healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.uptime(),
    })
}

pub async fn welcome() -> &'static str {
    "Welcome to the CQuizy API"
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
