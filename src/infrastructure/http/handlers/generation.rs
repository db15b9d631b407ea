//! Generation HTTP Handlers
//!
//! 任务创建后立即返回，进度通过 progress 轮询或 WS 获取

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{
    GetGenerationProgress, ListJobs, PauseJob, RequestContext, RequeueJob, StartGeneration,
};
use crate::domain::generation::JobStatus;
use crate::infrastructure::http::dto::{
    ApiResponse, BookIdRequest, JobIdRequest, JobResponse, ListJobsRequest, ProgressResponse,
    StartGenerationRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 开始生成
pub async fn start_generation(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<StartGenerationRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let command = StartGeneration {
        book_id: req.book_id,
        fresh: req.fresh,
    };

    let job = state.start_generation_handler.handle(&ctx, command).await?;

    tracing::info!(
        job_id = %job.id,
        book_id = %job.book_id,
        total_chapters = job.total_chapters,
        fresh = req.fresh,
        "Generation job queued"
    );

    Ok(Json(ApiResponse::success(job.into())))
}

/// 重新排队失败或暂停的任务
pub async fn requeue_job(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .requeue_job_handler
        .handle(&ctx, RequeueJob { job_id: req.job_id })
        .await?;

    tracing::info!(job_id = %job.id, resume_from = job.current_chapter + 1, "Generation job requeued");

    Ok(Json(ApiResponse::success(job.into())))
}

/// 暂停尚未被认领的任务
pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .pause_job_handler
        .handle(&ctx, PauseJob { job_id: req.job_id })
        .await?;

    Ok(Json(ApiResponse::success(job.into())))
}

/// 生成进度快照
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<BookIdRequest>,
) -> Result<Json<ApiResponse<ProgressResponse>>, ApiError> {
    let progress = state
        .get_generation_progress_handler
        .handle(&ctx, GetGenerationProgress { book_id: req.book_id })
        .await?;

    Ok(Json(ApiResponse::success(progress.into())))
}

/// 任务列表（管理员）
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<ListJobsRequest>,
) -> Result<Json<ApiResponse<Vec<JobResponse>>>, ApiError> {
    let status = match req.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            JobStatus::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown job status: {}", raw)))?,
        ),
    };

    let jobs = state.list_jobs_handler.handle(&ctx, ListJobs { status }).await?;

    Ok(Json(ApiResponse::success(
        jobs.into_iter().map(JobResponse::from).collect(),
    )))
}
