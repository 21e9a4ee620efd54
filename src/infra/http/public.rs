//! Reader-facing JSON API. Reads never fail; writes go through the
//! mutation coordinator.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router, middleware as axum_middleware};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::commands::{SubmitCommentCommand, SubmitContactCommand};
use crate::application::repos::ContentQuery;
use crate::application::resolver::Resolved;
use crate::domain::entities::Comment;
use crate::domain::types::ContactStatus;

use super::HttpState;
use super::error::ApiError;
use super::middleware::{log_responses, set_request_context};

pub fn build_public_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts/{key}", get(get_post))
        .route(
            "/api/posts/{key}/comments",
            get(list_comments).post(submit_comment),
        )
        .route("/api/tags", get(list_tags))
        .route("/api/contact", axum::routing::post(submit_contact))
        .route("/api/source", get(super::data_source))
        .route("/health", get(super::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// `?tags=a,b&search=&limit=&offset=`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostListParams {
    pub tags: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<PostListParams> for ContentQuery {
    fn from(params: PostListParams) -> Self {
        ContentQuery {
            tags: params
                .tags
                .map(|tags| tags.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            search: params.search,
            limit: params.limit,
            offset: params.offset.unwrap_or(0),
        }
    }
}

/// Approved comment without the author's contact details.
#[derive(Debug, Serialize)]
pub struct PublicComment {
    pub id: Uuid,
    pub author_name: String,
    pub author_website: Option<String>,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Comment> for PublicComment {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author_name: comment.author_name,
            author_website: comment.author_website,
            body: comment.body,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Receipt<S> {
    pub id: Uuid,
    pub status: S,
}

async fn list_posts(
    State(state): State<HttpState>,
    Query(params): Query<PostListParams>,
) -> impl IntoResponse {
    Json(
        state
            .services
            .content
            .get_published_records(params.into())
            .await,
    )
}

async fn get_post(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resolved = state
        .services
        .content
        .get_record_by_slug(&slug, false)
        .await?;

    match resolved.data {
        Some(record) => Ok(Json(Resolved {
            data: record,
            count: resolved.count,
            error: resolved.error,
        })),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            super::error::codes::NOT_FOUND,
            "post not found",
            resolved.error,
        )),
    }
}

async fn list_tags(State(state): State<HttpState>) -> impl IntoResponse {
    Json(state.services.content.list_tags().await)
}

async fn list_comments(
    State(state): State<HttpState>,
    Path(post_id): Path<String>,
) -> impl IntoResponse {
    let resolved = state.services.comments.approved_comments(&post_id).await;
    Json(Resolved {
        data: resolved
            .data
            .into_iter()
            .map(PublicComment::from)
            .collect::<Vec<_>>(),
        count: resolved.count,
        error: resolved.error,
    })
}

async fn submit_comment(
    State(state): State<HttpState>,
    Path(post_id): Path<String>,
    Json(command): Json<SubmitCommentCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .services
        .comments
        .submit_comment(&post_id, command)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Receipt {
            id: comment.id,
            status: comment.status,
        }),
    ))
}

async fn submit_contact(
    State(state): State<HttpState>,
    Json(command): Json<SubmitContactCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.services.contact.submit(command).await?;
    Ok((
        StatusCode::CREATED,
        Json(Receipt::<ContactStatus> {
            id: message.id,
            status: message.status,
        }),
    ))
}
