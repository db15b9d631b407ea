//! SQLite Generation Job Repository (Job Store)
//!
//! 认领与状态写入都是按 (status, claim_seq) 的比较并交换，
//! "每本书至多一个未结束任务" 由部分唯一索引保证

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::{db_error, format_ts, parse_opt_ts, parse_ts, parse_uuid, DbPool};
use crate::application::ports::{GenerationJobRepositoryPort, RepositoryError};
use crate::domain::generation::{GenerationJob, JobState, JobStatus};

const JOB_COLUMNS: &str =
    "id, book_id, status, error, current_chapter, total_chapters, worker_id, claim_seq, created_at, updated_at, completed_at";

/// SQLite Generation Job Repository
pub struct SqliteGenerationJobRepository {
    pool: DbPool,
}

impl SqliteGenerationJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generation_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    book_id: String,
    status: String,
    error: Option<String>,
    current_chapter: i64,
    total_chapters: i64,
    worker_id: Option<String>,
    claim_seq: i64,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TryFrom<JobRow> for GenerationJob {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str(&row.status)
            .ok_or_else(|| RepositoryError::SerializationError(format!("unknown job status: {}", row.status)))?;
        Ok(GenerationJob {
            id: parse_uuid(&row.id)?,
            book_id: parse_uuid(&row.book_id)?,
            state: JobState::from_parts(status, row.error, parse_opt_ts(row.completed_at)?),
            current_chapter: row.current_chapter as u32,
            total_chapters: row.total_chapters as u32,
            worker_id: row.worker_id,
            claim_seq: row.claim_seq as u32,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl GenerationJobRepositoryPort for SqliteGenerationJobRepository {
    async fn create(&self, job: &GenerationJob) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO generation_jobs (id, book_id, status, error, current_chapter, total_chapters, worker_id, claim_seq,
                                         created_at, updated_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.book_id.to_string())
        .bind(job.status().as_str())
        .bind(job.error())
        .bind(job.current_chapter as i64)
        .bind(job.total_chapters as i64)
        .bind(&job.worker_id)
        .bind(job.claim_seq as i64)
        .bind(format_ts(&job.created_at))
        .bind(format_ts(&job.updated_at))
        .bind(job.state.completed_at().as_ref().map(format_ts))
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error(e) {
            RepositoryError::Conflict(_) => RepositoryError::Conflict(format!(
                "book {} already has an active generation job",
                job.book_id
            )),
            other => other,
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationJob>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("SELECT {} FROM generation_jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(GenerationJob::try_from).transpose()
    }

    async fn find_latest_for_book(&self, book_id: Uuid) -> Result<Option<GenerationJob>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM generation_jobs WHERE book_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(GenerationJob::try_from).transpose()
    }

    async fn find_active_for_book(&self, book_id: Uuid) -> Result<Option<GenerationJob>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM generation_jobs WHERE book_id = ? AND status NOT IN ('complete', 'failed') LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(GenerationJob::try_from).transpose()
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<GenerationJob>, RepositoryError> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM generation_jobs WHERE status = ? ORDER BY created_at DESC",
                    JOB_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM generation_jobs ORDER BY created_at DESC",
                    JOB_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_error)?;

        rows.into_iter().map(GenerationJob::try_from).collect()
    }

    async fn save_state(&self, job: &GenerationJob, expected: JobStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE generation_jobs SET
                status = ?,
                error = ?,
                current_chapter = ?,
                total_chapters = ?,
                worker_id = ?,
                updated_at = ?,
                completed_at = ?
            WHERE id = ? AND status = ? AND claim_seq = ?
            "#,
        )
        .bind(job.status().as_str())
        .bind(job.error())
        .bind(job.current_chapter as i64)
        .bind(job.total_chapters as i64)
        .bind(&job.worker_id)
        .bind(format_ts(&job.updated_at))
        .bind(job.state.completed_at().as_ref().map(format_ts))
        .bind(job.id.to_string())
        .bind(expected.as_str())
        .bind(job.claim_seq as i64)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            if !self.exists(job.id).await? {
                return Err(RepositoryError::NotFound(job.id.to_string()));
            }
            return Err(RepositoryError::StaleState(format!(
                "job {} is no longer {} under claim {}",
                job.id,
                expected.as_str(),
                job.claim_seq
            )));
        }
        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<GenerationJob>, RepositoryError> {
        loop {
            let candidate: Option<String> = sqlx::query_scalar(
                "SELECT id FROM generation_jobs WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

            let Some(id) = candidate else {
                return Ok(None);
            };

            // 无大纲的书从大纲开始，否则直接进入章节阶段
            let result = sqlx::query(
                r#"
                UPDATE generation_jobs SET
                    status = CASE
                        WHEN (SELECT outline FROM books WHERE books.id = generation_jobs.book_id) IS NULL
                        THEN 'generating_outline'
                        ELSE 'generating_chapters'
                    END,
                    worker_id = ?,
                    claim_seq = claim_seq + 1,
                    updated_at = ?
                WHERE id = ? AND status = 'pending'
                "#,
            )
            .bind(worker_id)
            .bind(format_ts(&Utc::now()))
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

            if result.rows_affected() == 1 {
                let job = self.find_by_id(parse_uuid(&id)?).await?;
                if let Some(job) = &job {
                    tracing::info!(
                        job_id = %job.id,
                        worker_id = %worker_id,
                        claim_seq = job.claim_seq,
                        status = job.status().as_str(),
                        "Job claimed"
                    );
                }
                return Ok(job);
            }

            tracing::debug!(job_id = %id, "Lost claim race, retrying");
        }
    }

    async fn heartbeat(&self, id: Uuid, worker_id: &str, claim_seq: u32) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE generation_jobs SET updated_at = ?
            WHERE id = ? AND worker_id = ? AND claim_seq = ?
              AND status IN ('generating_outline', 'outline_complete', 'generating_chapters')
            "#,
        )
        .bind(format_ts(&Utc::now()))
        .bind(id.to_string())
        .bind(worker_id)
        .bind(claim_seq as i64)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::StaleState(format!(
                "job {} is no longer claimed by {} (claim {})",
                id, worker_id, claim_seq
            )));
        }
        Ok(())
    }

    async fn find_stale(&self, before: DateTime<Utc>) -> Result<Vec<GenerationJob>, RepositoryError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM generation_jobs
            WHERE status IN ('generating_outline', 'outline_complete', 'generating_chapters')
              AND updated_at < ?
            ORDER BY updated_at ASC
            "#,
            JOB_COLUMNS
        ))
        .bind(format_ts(&before))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(GenerationJob::try_from).collect()
    }
}
