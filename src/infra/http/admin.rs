//! Admin JSON API, bound to its own listener.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware as axum_middleware};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::commands::{
    CreateRecordCommand, UpdateContactCommand, UpdateRecordCommand,
};
use crate::domain::types::CommentStatus;

use super::HttpState;
use super::error::ApiError;
use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/posts", post(create_post))
        .route(
            "/api/posts/{key}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/api/posts/{key}/published", post(toggle_published))
        .route("/api/comments/{id}/status", post(moderate_comment))
        .route("/api/comments/{id}", delete(delete_comment))
        .route("/api/contact/{id}/status", post(update_contact))
        .route("/api/probe/reset", post(reset_probe))
        .route("/api/source", get(super::data_source))
        .route("/api/cache", get(cache_stats))
        .route("/health", get(super::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

#[derive(Debug, Deserialize)]
pub struct PublishedRequest {
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommentStatusRequest {
    pub status: CommentStatus,
}

fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|err| ApiError::bad_request("invalid id", Some(err.to_string())))
}

async fn create_post(
    State(state): State<HttpState>,
    Json(command): Json<CreateRecordCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.services.content.create_record(command).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `{key}` is a slug here; drafts are visible.
async fn get_post(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resolved = state
        .services
        .content
        .get_record_by_slug(&slug, true)
        .await?;
    resolved
        .data
        .map(Json)
        .ok_or_else(|| ApiError::not_found("post not found"))
}

async fn update_post(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(command): Json<UpdateRecordCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.services.content.update_record(&id, command).await?;
    Ok(Json(record))
}

async fn delete_post(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.content.delete_record(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_published(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(request): Json<PublishedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .services
        .content
        .toggle_published(&id, request.published)
        .await?;
    Ok(Json(record))
}

async fn moderate_comment(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(request): Json<CommentStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid(&id)?;
    let comment = state
        .services
        .comments
        .moderate_comment(id, request.status)
        .await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid(&id)?;
    state.services.comments.delete_comment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_contact(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(command): Json<UpdateContactCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid(&id)?;
    let message = state.services.contact.update_status(id, command).await?;
    Ok(Json(message))
}

async fn reset_probe(State(state): State<HttpState>) -> impl IntoResponse {
    state.services.content.reset_probe().await;
    StatusCode::NO_CONTENT
}

async fn cache_stats(State(state): State<HttpState>) -> impl IntoResponse {
    let cache = &state.services.cache;
    Json(serde_json::json!({
        "enabled": cache.config().enabled,
        "entries": cache.len(),
        "capacity": cache.config().capacity,
    }))
}
