//! Audiobook HTTP Handlers
//!
//! 整书合成由后台 worker 执行；单章重录与附加音频同步完成

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio::fs;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::application::{
    CancelAudiobook, EstimateAudiobook, GenerateAuxiliaryAudio, GetAudiobookStatus,
    GetAuxiliaryAudio, RegenerateChapterAudio, RequestContext, StartAudiobook,
};
use crate::domain::audiobook::{AudiobookEstimate, AuxiliaryAsset, AuxiliaryKind};
use crate::infrastructure::http::dto::{
    ApiResponse, AudiobookJobResponse, AudiobookStatusResponse, AuxiliaryAudioRequest, BookIdRequest,
    EstimateAudiobookRequest, JobIdRequest, RegenerateChapterAudioRequest, StartAudiobookRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

fn parse_kind(raw: &str) -> Result<AuxiliaryKind, ApiError> {
    AuxiliaryKind::from_str(raw.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown auxiliary audio kind: {}", raw)))
}

/// 费用估算（不写入任何数据）
pub async fn estimate_audiobook(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<EstimateAudiobookRequest>,
) -> Result<Json<ApiResponse<AudiobookEstimate>>, ApiError> {
    let query = EstimateAudiobook {
        book_id: req.book_id,
        model: req.model,
    };

    let estimate = state.estimate_audiobook_handler.handle(&ctx, query).await?;

    Ok(Json(ApiResponse::success(estimate)))
}

/// 开始或恢复有声书任务
pub async fn start_audiobook(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<StartAudiobookRequest>,
) -> Result<Json<ApiResponse<AudiobookJobResponse>>, ApiError> {
    let command = StartAudiobook {
        book_id: req.book_id,
        voice: req.voice,
        model: req.model,
        force_regenerate: req.force_regenerate,
    };

    let job = state.start_audiobook_handler.handle(&ctx, command).await?;

    tracing::info!(
        job_id = %job.id,
        book_id = %job.book_id,
        voice = %job.voice,
        model = %job.model,
        estimated_cost = job.estimated_cost,
        "Audiobook job queued"
    );

    Ok(Json(ApiResponse::success(job.into())))
}

/// 取消有声书任务
pub async fn cancel_audiobook(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<AudiobookJobResponse>>, ApiError> {
    let job = state
        .cancel_audiobook_handler
        .handle(&ctx, CancelAudiobook { job_id: req.job_id })
        .await?;

    tracing::info!(job_id = %job.id, completed_chapters = job.progress.len(), "Audiobook job cancelled");

    Ok(Json(ApiResponse::success(job.into())))
}

/// 有声书状态
pub async fn get_audiobook_status(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<BookIdRequest>,
) -> Result<Json<ApiResponse<AudiobookStatusResponse>>, ApiError> {
    let view = state
        .get_audiobook_status_handler
        .handle(&ctx, GetAudiobookStatus { book_id: req.book_id })
        .await?;

    Ok(Json(ApiResponse::success(view.into())))
}

/// 重新合成单章
pub async fn regenerate_chapter_audio(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<RegenerateChapterAudioRequest>,
) -> Result<Json<ApiResponse<AudiobookJobResponse>>, ApiError> {
    let command = RegenerateChapterAudio {
        job_id: req.job_id,
        chapter_number: req.chapter_number,
    };

    let job = state.regenerate_chapter_audio_handler.handle(&ctx, command).await?;

    Ok(Json(ApiResponse::success(job.into())))
}

/// 生成附加音频（试听 / 简介）
pub async fn generate_auxiliary_audio(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<AuxiliaryAudioRequest>,
) -> Result<Json<ApiResponse<AuxiliaryAsset>>, ApiError> {
    let command = GenerateAuxiliaryAudio {
        book_id: req.book_id,
        kind: parse_kind(&req.kind)?,
        voice: req.voice,
        model: req.model,
    };

    let asset = state.generate_auxiliary_audio_handler.handle(&ctx, command).await?;

    tracing::info!(
        book_id = %asset.book_id,
        kind = asset.kind.as_str(),
        characters = asset.characters,
        "Auxiliary audio generated"
    );

    Ok(Json(ApiResponse::success(asset)))
}

/// 下载附加音频文件
pub async fn download_auxiliary_audio(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path((book_id, kind)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let query = GetAuxiliaryAudio {
        book_id,
        kind: parse_kind(&kind)?,
    };
    let audio = state.get_auxiliary_audio_handler.handle(&ctx, query).await?;

    let file = fs::File::open(&audio.path)
        .await
        .map_err(|e| ApiError::NotFound(format!("Audio file missing: {}", e)))?;
    let file_size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read file metadata: {}", e)))?
        .len();

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CONTENT_LENGTH, file_size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}-{}.mp3\"", book_id, audio.asset.kind.as_str()),
        )
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}
