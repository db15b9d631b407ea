//! SQLite Usage Repository

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::{db_error, format_ts, parse_ts, parse_uuid, DbPool};
use crate::application::ports::{RepositoryError, UsageRepositoryPort};
use crate::domain::generation::{TokenUsage, UsageEntry, UsageStep};

const USAGE_COLUMNS: &str =
    "id, book_id, job_id, chapter_number, step, prompt_units, completion_units, cost, created_at";

/// SQLite Usage Repository（仅追加）
pub struct SqliteUsageRepository {
    pool: DbPool,
}

impl SqliteUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UsageRow {
    id: String,
    book_id: String,
    job_id: Option<String>,
    chapter_number: Option<i64>,
    step: String,
    prompt_units: i64,
    completion_units: i64,
    cost: f64,
    created_at: String,
}

impl TryFrom<UsageRow> for UsageEntry {
    type Error = RepositoryError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(UsageEntry {
            id: parse_uuid(&row.id)?,
            book_id: parse_uuid(&row.book_id)?,
            job_id: row.job_id.as_deref().map(parse_uuid).transpose()?,
            chapter_number: row.chapter_number.map(|n| n as u32),
            step: UsageStep::from_str(&row.step)
                .ok_or_else(|| RepositoryError::SerializationError(format!("unknown usage step: {}", row.step)))?,
            usage: TokenUsage {
                prompt_units: row.prompt_units as u64,
                completion_units: row.completion_units as u64,
                cost: row.cost,
            },
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[async_trait]
impl UsageRepositoryPort for SqliteUsageRepository {
    async fn append(&self, entry: &UsageEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO usage_entries (id, book_id, job_id, chapter_number, step, prompt_units, completion_units, cost, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.book_id.to_string())
        .bind(entry.job_id.map(|id| id.to_string()))
        .bind(entry.chapter_number.map(|n| n as i64))
        .bind(entry.step.as_str())
        .bind(entry.usage.prompt_units as i64)
        .bind(entry.usage.completion_units as i64)
        .bind(entry.usage.cost)
        .bind(format_ts(&entry.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_book(&self, book_id: Uuid) -> Result<Vec<UsageEntry>, RepositoryError> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM usage_entries WHERE book_id = ? ORDER BY created_at ASC",
            USAGE_COLUMNS
        ))
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(UsageEntry::try_from).collect()
    }

    async fn find_by_job(&self, job_id: Uuid) -> Result<Vec<UsageEntry>, RepositoryError> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM usage_entries WHERE job_id = ? ORDER BY created_at ASC",
            USAGE_COLUMNS
        ))
        .bind(job_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(UsageEntry::try_from).collect()
    }

    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM usage_entries WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
