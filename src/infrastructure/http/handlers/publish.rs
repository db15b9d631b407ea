//! Publish HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{GetPublishStatus, PublishBook, PublishResult, RequestContext};
use crate::domain::book::PublishFormat;
use crate::domain::PublishStatus;
use crate::infrastructure::http::dto::{ApiResponse, BookIdRequest, PublishRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 发布就绪评估
pub async fn get_publish_status(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<BookIdRequest>,
) -> Result<Json<ApiResponse<PublishStatus>>, ApiError> {
    let status = state
        .get_publish_status_handler
        .handle(&ctx, GetPublishStatus { book_id: req.book_id })
        .await?;

    Ok(Json(ApiResponse::success(status)))
}

/// 发布（未就绪时需 force）
pub async fn publish_book(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<PublishRequest>,
) -> Result<Json<ApiResponse<PublishResult>>, ApiError> {
    let formats = req
        .formats
        .iter()
        .map(|raw| {
            PublishFormat::from_str(raw.trim())
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown publish format: {}", raw)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let command = PublishBook {
        book_id: req.book_id,
        formats,
        force: req.force,
    };

    let result = state.publish_book_handler.handle(&ctx, command).await?;

    tracing::info!(
        book_id = %result.book_id,
        forced = result.forced,
        issues = result.issues.len(),
        artifacts = result.artifacts.len(),
        "Book published"
    );

    Ok(Json(ApiResponse::success(result)))
}
