//! Book HTTP Handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    CreateBook, GetBook, ListBooks, RequestContext, UpdateBookSettings, UploadCoverImage,
};
use crate::infrastructure::http::dto::{
    ApiResponse, BookIdRequest, BookResponse, CreateBookRequest, UpdateBookSettingsRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 解析后的图片上传表单
pub(super) struct ImageUpload {
    pub fields: HashMap<String, String>,
    pub data: Vec<u8>,
    pub extension: String,
}

impl ImageUpload {
    pub fn book_id(&self) -> Result<Uuid, ApiError> {
        let raw = self
            .fields
            .get("book_id")
            .ok_or_else(|| ApiError::BadRequest("book_id is required".to_string()))?;
        Uuid::parse_str(raw.trim())
            .map_err(|_| ApiError::BadRequest(format!("Invalid book_id: {}", raw)))
    }
}

/// 读取 multipart 表单：`file` 为图片，其余字段按文本收集
pub(super) async fn read_image_upload(mut multipart: Multipart) -> Result<ImageUpload, ApiError> {
    let mut fields = HashMap::new();
    let mut data: Option<Vec<u8>> = None;
    let mut extension: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "file" {
            extension = field
                .file_name()
                .and_then(|f| Path::new(f).extension())
                .and_then(|e| e.to_str())
                .map(|s| s.to_lowercase());
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?
                    .to_vec(),
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", field_name, e)))?;
            fields.insert(field_name, value);
        }
    }

    let data = data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Image file is required".to_string()))?;
    let extension = extension
        .ok_or_else(|| ApiError::BadRequest("Image file name must carry an extension".to_string()))?;

    Ok(ImageUpload {
        fields,
        data,
        extension,
    })
}

/// 创建书籍
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<CreateBookRequest>,
) -> Result<Json<ApiResponse<BookResponse>>, ApiError> {
    let command = CreateBook {
        title: req.title,
        book_type: req.book_type,
        niche: req.niche,
        context: req.context,
        publish_without_chapter_images: req.publish_without_chapter_images,
    };

    let book = state.create_book_handler.handle(&ctx, command).await?;

    tracing::info!(book_id = %book.id, owner_id = %book.owner_id, "Book created");

    Ok(Json(ApiResponse::success(book.into())))
}

/// 获取书籍详情
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<BookIdRequest>,
) -> Result<Json<ApiResponse<BookResponse>>, ApiError> {
    let book = state
        .get_book_handler
        .handle(&ctx, GetBook { book_id: req.book_id })
        .await?;

    Ok(Json(ApiResponse::success(book.into())))
}

/// 列出调用者可见的书籍
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<ApiResponse<Vec<BookResponse>>>, ApiError> {
    let books = state.list_books_handler.handle(&ctx, ListBooks).await?;

    Ok(Json(ApiResponse::success(
        books.into_iter().map(BookResponse::from).collect(),
    )))
}

/// 更新书籍设置
pub async fn update_book_settings(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<UpdateBookSettingsRequest>,
) -> Result<Json<ApiResponse<BookResponse>>, ApiError> {
    let command = UpdateBookSettings {
        book_id: req.book_id,
        context: req.context,
        publish_without_chapter_images: req.publish_without_chapter_images,
        cover_image_prompt: req.cover_image_prompt,
    };

    let book = state.update_book_settings_handler.handle(&ctx, command).await?;

    Ok(Json(ApiResponse::success(book.into())))
}

/// 上传封面（multipart: book_id + file）
pub async fn upload_cover(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    multipart: Multipart,
) -> Result<Json<ApiResponse<BookResponse>>, ApiError> {
    let upload = read_image_upload(multipart).await?;
    let command = UploadCoverImage {
        book_id: upload.book_id()?,
        data: upload.data,
        extension: upload.extension,
    };

    let book = state.upload_cover_image_handler.handle(&ctx, command).await?;

    tracing::info!(book_id = %book.id, "Cover image uploaded");

    Ok(Json(ApiResponse::success(book.into())))
}
