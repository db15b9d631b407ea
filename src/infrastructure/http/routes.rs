//! HTTP Routes
//!
//! API Endpoints（除 ping 外均需 X-User-Id 请求头）:
//! - /api/ping                         GET   健康检查
//! - /api/book/create                  POST  创建书籍
//! - /api/book/get                     POST  书籍详情
//! - /api/book/list                    GET   书籍列表
//! - /api/book/settings                POST  更新设置
//! - /api/book/cover                   POST  上传封面（multipart）
//! - /api/generation/start             POST  开始生成
//! - /api/generation/requeue           POST  重新排队
//! - /api/generation/pause             POST  暂停
//! - /api/generation/progress          POST  进度快照
//! - /api/generation/jobs              POST  任务列表（管理员）
//! - /api/chapter/edit                 POST  编辑章节
//! - /api/chapter/image                POST  上传章节插图（multipart）
//! - /api/publish/status               POST  就绪评估
//! - /api/publish/publish              POST  发布
//! - /api/audiobook/estimate           POST  费用估算
//! - /api/audiobook/start              POST  开始/恢复
//! - /api/audiobook/cancel             POST  取消
//! - /api/audiobook/status             POST  状态
//! - /api/audiobook/regenerate         POST  单章重录
//! - /api/audiobook/auxiliary          POST  试听/简介音频
//! - /api/audiobook/asset/:book_id/:kind GET 下载附加音频
//! - /ws/events[?book_id=]             WS    进度事件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/book", book_routes())
        .nest("/generation", generation_routes())
        .nest("/chapter", chapter_routes())
        .nest("/publish", publish_routes())
        .nest("/audiobook", audiobook_routes())
}

/// Book 路由
fn book_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_book))
        .route("/get", post(handlers::get_book))
        .route("/list", get(handlers::list_books))
        .route("/settings", post(handlers::update_book_settings))
        .route("/cover", post(handlers::upload_cover))
}

/// Generation 路由
fn generation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(handlers::start_generation))
        .route("/requeue", post(handlers::requeue_job))
        .route("/pause", post(handlers::pause_job))
        .route("/progress", post(handlers::get_progress))
        .route("/jobs", post(handlers::list_jobs))
}

/// Chapter 路由
fn chapter_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/edit", post(handlers::edit_chapter))
        .route("/image", post(handlers::upload_chapter_image))
}

/// Publish 路由
fn publish_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", post(handlers::get_publish_status))
        .route("/publish", post(handlers::publish_book))
}

/// Audiobook 路由
fn audiobook_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/estimate", post(handlers::estimate_audiobook))
        .route("/start", post(handlers::start_audiobook))
        .route("/cancel", post(handlers::cancel_audiobook))
        .route("/status", post(handlers::get_audiobook_status))
        .route("/regenerate", post(handlers::regenerate_chapter_audio))
        .route("/auxiliary", post(handlers::generate_auxiliary_audio))
        .route("/asset/:book_id/:kind", get(handlers::download_auxiliary_audio))
}
