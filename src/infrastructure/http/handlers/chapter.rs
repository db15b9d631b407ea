//! Chapter HTTP Handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;

use crate::application::{EditChapter, RequestContext, UploadChapterImage};
use crate::infrastructure::http::dto::{ApiResponse, ChapterResponse, EditChapterRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

use super::book::read_image_upload;

/// 手动编辑章节正文或提示词
pub async fn edit_chapter(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<EditChapterRequest>,
) -> Result<Json<ApiResponse<ChapterResponse>>, ApiError> {
    let command = EditChapter {
        book_id: req.book_id,
        chapter_number: req.chapter_number,
        text: req.text,
        text_prompt: req.text_prompt,
        image_prompt: req.image_prompt,
    };

    let chapter = state.edit_chapter_handler.handle(&ctx, command).await?;

    Ok(Json(ApiResponse::success(chapter.into())))
}

/// 上传章节插图（multipart: book_id + chapter_number + file）
pub async fn upload_chapter_image(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ChapterResponse>>, ApiError> {
    let upload = read_image_upload(multipart).await?;
    let book_id = upload.book_id()?;
    let chapter_number = upload
        .fields
        .get("chapter_number")
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .ok_or_else(|| ApiError::BadRequest("chapter_number is required".to_string()))?;

    let command = UploadChapterImage {
        book_id,
        chapter_number,
        data: upload.data,
        extension: upload.extension,
    };

    let chapter = state.upload_chapter_image_handler.handle(&ctx, command).await?;

    tracing::info!(book_id = %book_id, chapter = chapter_number, "Chapter image uploaded");

    Ok(Json(ApiResponse::success(chapter.into())))
}
