//! SQLite Audiobook Repository
//!
//! 任务、章节音频与附加音频三张表
//!
//! 执行中的写入都带认领序号条件，被取消后重新认领的任务不会接受旧执行者的写入

use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{db_error, format_ts, parse_opt_ts, parse_ts, parse_uuid, DbPool};
use crate::application::ports::{AudiobookRepositoryPort, RepositoryError};
use crate::domain::audiobook::{
    AudioSegment, AudiobookJob, AudiobookState, AudiobookStatus, AuxiliaryAsset, AuxiliaryKind,
};

const JOB_COLUMNS: &str = "id, book_id, voice, model, status, error, estimated_cost, actual_cost, \
     current_chapter, force_regenerate, claim_seq, created_at, updated_at, finished_at";

/// SQLite Audiobook Repository
pub struct SqliteAudiobookRepository {
    pool: DbPool,
}

impl SqliteAudiobookRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_segments(&self, job_id: Uuid) -> Result<BTreeMap<u32, AudioSegment>, RepositoryError> {
        let rows: Vec<SegmentRow> = sqlx::query_as(
            r#"
            SELECT chapter_number, url, characters, cost, completed_at
            FROM audiobook_segments WHERE job_id = ?
            "#,
        )
        .bind(job_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|row| {
                Ok((
                    row.chapter_number as u32,
                    AudioSegment {
                        url: row.url,
                        characters: row.characters as u64,
                        cost: row.cost,
                        completed_at: parse_ts(&row.completed_at)?,
                    },
                ))
            })
            .collect()
    }

    async fn hydrate(&self, row: Option<JobRow>) -> Result<Option<AudiobookJob>, RepositoryError> {
        match row {
            Some(row) => {
                let mut job = AudiobookJob::try_from(row)?;
                job.progress = self.load_segments(job.id).await?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    book_id: String,
    voice: String,
    model: String,
    status: String,
    error: Option<String>,
    estimated_cost: f64,
    actual_cost: f64,
    current_chapter: i64,
    force_regenerate: bool,
    claim_seq: i64,
    created_at: String,
    updated_at: String,
    finished_at: Option<String>,
}

#[derive(FromRow)]
struct SegmentRow {
    chapter_number: i64,
    url: String,
    characters: i64,
    cost: f64,
    completed_at: String,
}

#[derive(FromRow)]
struct AssetRow {
    book_id: String,
    kind: String,
    voice: String,
    model: String,
    url: String,
    characters: i64,
    cost: f64,
    created_at: String,
}

fn parse_status(s: &str) -> Result<AudiobookStatus, RepositoryError> {
    AudiobookStatus::from_str(s)
        .ok_or_else(|| RepositoryError::SerializationError(format!("unknown audiobook status: {}", s)))
}

impl TryFrom<JobRow> for AudiobookJob {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;
        Ok(AudiobookJob {
            id: parse_uuid(&row.id)?,
            book_id: parse_uuid(&row.book_id)?,
            voice: row.voice,
            model: row.model,
            state: AudiobookState::from_parts(status, row.error, parse_opt_ts(row.finished_at)?),
            progress: BTreeMap::new(),
            estimated_cost: row.estimated_cost,
            actual_cost: row.actual_cost,
            current_chapter: row.current_chapter as u32,
            force_regenerate: row.force_regenerate,
            claim_seq: row.claim_seq as u32,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

impl TryFrom<AssetRow> for AuxiliaryAsset {
    type Error = RepositoryError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(AuxiliaryAsset {
            book_id: parse_uuid(&row.book_id)?,
            kind: AuxiliaryKind::from_str(&row.kind)
                .ok_or_else(|| RepositoryError::SerializationError(format!("unknown asset kind: {}", row.kind)))?,
            voice: row.voice,
            model: row.model,
            url: row.url,
            characters: row.characters as u64,
            cost: row.cost,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[async_trait]
impl AudiobookRepositoryPort for SqliteAudiobookRepository {
    async fn create(&self, job: &AudiobookJob) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audiobook_jobs (id, book_id, voice, model, status, error, estimated_cost, actual_cost,
                                        current_chapter, force_regenerate, claim_seq, created_at, updated_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.book_id.to_string())
        .bind(&job.voice)
        .bind(&job.model)
        .bind(job.status().as_str())
        .bind(job.error())
        .bind(job.estimated_cost)
        .bind(job.actual_cost)
        .bind(job.current_chapter as i64)
        .bind(job.force_regenerate)
        .bind(job.claim_seq as i64)
        .bind(format_ts(&job.created_at))
        .bind(format_ts(&job.updated_at))
        .bind(job.state.finished_at().as_ref().map(format_ts))
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error(e) {
            RepositoryError::Conflict(_) => RepositoryError::Conflict(format!(
                "book {} already has an active audiobook job",
                job.book_id
            )),
            other => other,
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AudiobookJob>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("SELECT {} FROM audiobook_jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        self.hydrate(row).await
    }

    async fn find_latest_for_book(&self, book_id: Uuid) -> Result<Option<AudiobookJob>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM audiobook_jobs WHERE book_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(book_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(row).await
    }

    async fn find_status(&self, id: Uuid) -> Result<Option<AudiobookStatus>, RepositoryError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM audiobook_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        status.as_deref().map(parse_status).transpose()
    }

    async fn is_running(&self, id: Uuid, claim_seq: u32) -> Result<bool, RepositoryError> {
        let running: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM audiobook_jobs WHERE id = ? AND status = 'generating' AND claim_seq = ?",
        )
        .bind(id.to_string())
        .bind(claim_seq as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(running.is_some())
    }

    async fn save_state(&self, job: &AudiobookJob, expected: &[AudiobookStatus]) -> Result<(), RepositoryError> {
        if expected.is_empty() {
            return Err(RepositoryError::StaleState("no expected status given".to_string()));
        }

        let placeholders = vec!["?"; expected.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE audiobook_jobs SET
                voice = ?,
                model = ?,
                status = ?,
                error = ?,
                estimated_cost = ?,
                current_chapter = ?,
                force_regenerate = ?,
                updated_at = ?,
                finished_at = ?
            WHERE id = ? AND claim_seq = ? AND status IN ({})
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(&job.voice)
            .bind(&job.model)
            .bind(job.status().as_str())
            .bind(job.error())
            .bind(job.estimated_cost)
            .bind(job.current_chapter as i64)
            .bind(job.force_regenerate)
            .bind(format_ts(&job.updated_at))
            .bind(job.state.finished_at().as_ref().map(format_ts))
            .bind(job.id.to_string())
            .bind(job.claim_seq as i64);
        for status in expected {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await.map_err(db_error)?;

        if result.rows_affected() == 0 {
            return match self.find_status(job.id).await? {
                None => Err(RepositoryError::NotFound(job.id.to_string())),
                Some(current) => Err(RepositoryError::StaleState(format!(
                    "audiobook job {} is {} (claim {} expected)",
                    job.id,
                    current.as_str(),
                    job.claim_seq
                ))),
            };
        }
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<AudiobookJob>, RepositoryError> {
        loop {
            let candidate: Option<String> = sqlx::query_scalar(
                "SELECT id FROM audiobook_jobs WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

            let Some(id) = candidate else {
                return Ok(None);
            };

            let result = sqlx::query(
                r#"
                UPDATE audiobook_jobs SET status = 'generating', claim_seq = claim_seq + 1, updated_at = ?
                WHERE id = ? AND status = 'pending'
                "#,
            )
            .bind(format_ts(&Utc::now()))
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

            if result.rows_affected() == 1 {
                tracing::info!(audiobook_job_id = %id, "Audiobook job claimed");
                return self.find_by_id(parse_uuid(&id)?).await;
            }
        }
    }

    async fn record_segment(
        &self,
        job_id: Uuid,
        chapter: u32,
        segment: &AudioSegment,
        expected: AudiobookStatus,
        claim_seq: u32,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // 只有生成中的任务推进 current_chapter，终态下的单章重做不影响
        let result = sqlx::query(
            r#"
            UPDATE audiobook_jobs SET
                actual_cost = actual_cost + ?,
                current_chapter = CASE WHEN status = 'generating' THEN ? ELSE current_chapter END,
                updated_at = ?
            WHERE id = ? AND status = ? AND claim_seq = ?
            "#,
        )
        .bind(segment.cost)
        .bind(chapter as i64)
        .bind(format_ts(&Utc::now()))
        .bind(job_id.to_string())
        .bind(expected.as_str())
        .bind(claim_seq as i64)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO audiobook_segments (job_id, chapter_number, url, characters, cost, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id, chapter_number) DO UPDATE SET
                url = excluded.url,
                characters = excluded.characters,
                cost = excluded.cost,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(job_id.to_string())
        .bind(chapter as i64)
        .bind(&segment.url)
        .bind(segment.characters as i64)
        .bind(segment.cost)
        .bind(format_ts(&segment.completed_at))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }

    async fn cancel(&self, id: Uuid) -> Result<AudiobookJob, RepositoryError> {
        let now = format_ts(&Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE audiobook_jobs SET status = 'cancelled', finished_at = ?, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'generating')
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return match self.find_status(id).await? {
                None => Err(RepositoryError::NotFound(id.to_string())),
                Some(current) => Err(RepositoryError::InvalidTransition(format!(
                    "audiobook job {} is already {}",
                    id,
                    current.as_str()
                ))),
            };
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save_asset(&self, asset: &AuxiliaryAsset) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audiobook_assets (book_id, kind, voice, model, url, characters, cost, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(book_id, kind) DO UPDATE SET
                voice = excluded.voice,
                model = excluded.model,
                url = excluded.url,
                characters = excluded.characters,
                cost = excluded.cost,
                created_at = excluded.created_at
            "#,
        )
        .bind(asset.book_id.to_string())
        .bind(asset.kind.as_str())
        .bind(&asset.voice)
        .bind(&asset.model)
        .bind(&asset.url)
        .bind(asset.characters as i64)
        .bind(asset.cost)
        .bind(format_ts(&asset.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_asset(&self, book_id: Uuid, kind: AuxiliaryKind) -> Result<Option<AuxiliaryAsset>, RepositoryError> {
        let row: Option<AssetRow> = sqlx::query_as(
            r#"
            SELECT book_id, kind, voice, model, url, characters, cost, created_at
            FROM audiobook_assets WHERE book_id = ? AND kind = ?
            "#,
        )
        .bind(book_id.to_string())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(AuxiliaryAsset::try_from).transpose()
    }

    async fn find_assets(&self, book_id: Uuid) -> Result<Vec<AuxiliaryAsset>, RepositoryError> {
        let rows: Vec<AssetRow> = sqlx::query_as(
            r#"
            SELECT book_id, kind, voice, model, url, characters, cost, created_at
            FROM audiobook_assets WHERE book_id = ? ORDER BY kind ASC
            "#,
        )
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(AuxiliaryAsset::try_from).collect()
    }
}
