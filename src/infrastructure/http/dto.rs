//! Data Transfer Objects
//!
//! 请求体与对外视图；状态机类型展开为扁平的 `status` + 可选字段

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::application::{AudiobookStatusView, GenerationProgress};
use crate::domain::audiobook::{AudioSegment, AudiobookJob, AuxiliaryAsset};
use crate::domain::book::{Book, BookContext, Outline, PublishedArtifact};
use crate::domain::generation::{Chapter, ChapterFailure, ChapterMetadata, GenerationJob, UsageSummary};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Book
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub book_type: String,
    pub niche: String,
    #[serde(default)]
    pub context: BookContext,
    pub publish_without_chapter_images: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BookIdRequest {
    pub book_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookSettingsRequest {
    pub book_id: Uuid,
    pub context: Option<BookContext>,
    pub publish_without_chapter_images: Option<bool>,
    pub cover_image_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub book_type: String,
    pub niche: String,
    pub status: String,
    pub context: BookContext,
    pub total_chapters: Option<u32>,
    pub outline: Option<Outline>,
    pub cover_image_prompt: Option<String>,
    pub cover_image_url: Option<String>,
    pub publish_without_chapter_images: bool,
    pub artifacts: Vec<PublishedArtifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            owner_id: book.owner_id,
            title: book.title,
            book_type: book.book_type.as_str().to_string(),
            niche: book.niche.as_str().to_string(),
            status: book.status.as_str().to_string(),
            context: book.context,
            total_chapters: book.total_chapters,
            outline: book.outline,
            cover_image_prompt: book.cover_image_prompt,
            cover_image_url: book.cover_image_url,
            publish_without_chapter_images: book.publish_without_chapter_images,
            artifacts: book.artifacts,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartGenerationRequest {
    pub book_id: Uuid,
    #[serde(default)]
    pub fresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub status: String,
    pub current_chapter: u32,
    pub total_chapters: u32,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<GenerationJob> for JobResponse {
    fn from(job: GenerationJob) -> Self {
        Self {
            id: job.id,
            book_id: job.book_id,
            status: job.status().as_str().to_string(),
            percent: job.percent(),
            error: job.error().map(str::to_string),
            completed_at: job.state.completed_at(),
            current_chapter: job.current_chapter,
            total_chapters: job.total_chapters,
            worker_id: job.worker_id,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub book_id: Uuid,
    pub number: u32,
    pub title: String,
    pub status: String,
    pub text_prompt: Option<String>,
    pub text: Option<String>,
    pub image_prompt: Option<String>,
    pub image_url: Option<String>,
    pub metadata: ChapterMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ChapterFailure>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        Self {
            status: chapter.status().as_str().to_string(),
            book_id: chapter.book_id,
            number: chapter.number,
            title: chapter.title,
            text_prompt: chapter.text_prompt,
            text: chapter.text,
            image_prompt: chapter.image_prompt,
            image_url: chapter.image_url,
            metadata: chapter.metadata,
            failure: chapter.failure,
            completed_at: chapter.completed_at,
            updated_at: chapter.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub book: BookResponse,
    pub job: Option<JobResponse>,
    pub percent: u8,
    pub token_usage: UsageSummary,
    pub chapters: Vec<ChapterResponse>,
}

impl From<GenerationProgress> for ProgressResponse {
    fn from(progress: GenerationProgress) -> Self {
        Self {
            book: progress.book.into(),
            job: progress.job.map(JobResponse::from),
            percent: progress.percent,
            token_usage: progress.token_usage,
            chapters: progress.chapters.into_iter().map(ChapterResponse::from).collect(),
        }
    }
}

// ============================================================================
// Chapter
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EditChapterRequest {
    pub book_id: Uuid,
    pub chapter_number: u32,
    pub text: Option<String>,
    pub text_prompt: Option<String>,
    pub image_prompt: Option<String>,
}

// ============================================================================
// Publish
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub book_id: Uuid,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

fn default_formats() -> Vec<String> {
    vec!["epub".to_string()]
}

// ============================================================================
// Audiobook
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EstimateAudiobookRequest {
    pub book_id: Uuid,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartAudiobookRequest {
    pub book_id: Uuid,
    pub voice: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateChapterAudioRequest {
    pub job_id: Uuid,
    pub chapter_number: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuxiliaryAudioRequest {
    pub book_id: Uuid,
    pub kind: String,
    pub voice: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AudiobookJobResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub voice: String,
    pub model: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub progress: BTreeMap<u32, AudioSegment>,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub current_chapter: u32,
    pub force_regenerate: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<AudiobookJob> for AudiobookJobResponse {
    fn from(job: AudiobookJob) -> Self {
        Self {
            status: job.status().as_str().to_string(),
            error: job.error().map(str::to_string),
            finished_at: job.state.finished_at(),
            id: job.id,
            book_id: job.book_id,
            voice: job.voice,
            model: job.model,
            progress: job.progress,
            estimated_cost: job.estimated_cost,
            actual_cost: job.actual_cost,
            current_chapter: job.current_chapter,
            force_regenerate: job.force_regenerate,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AudiobookStatusResponse {
    pub book_id: Uuid,
    pub job: Option<AudiobookJobResponse>,
    pub assets: Vec<AuxiliaryAsset>,
}

impl From<AudiobookStatusView> for AudiobookStatusResponse {
    fn from(view: AudiobookStatusView) -> Self {
        Self {
            book_id: view.book_id,
            job: view.job.map(AudiobookJobResponse::from),
            assets: view.assets,
        }
    }
}
