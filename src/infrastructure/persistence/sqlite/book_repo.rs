//! SQLite Book Repository
//!
//! 状态推进、大纲、封面、设置分别按列更新，互不覆盖

use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;
use uuid::Uuid;

use super::{db_error, format_ts, parse_ts, parse_uuid, DbPool};
use crate::application::ports::{BookRepositoryPort, BookSettingsUpdate, RepositoryError};
use crate::domain::book::{Book, BookContext, BookStatus, BookType, Niche, Outline, PublishedArtifact};

const BOOK_COLUMNS: &str = "id, owner_id, title, book_type, niche, status, context, total_chapters, outline, \
     cover_image_prompt, cover_image_url, publish_without_chapter_images, artifacts, created_at, updated_at";

/// SQLite Book Repository
pub struct SqliteBookRepository {
    pool: DbPool,
}

impl SqliteBookRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// 条件更新未命中时区分记录不存在与条件不满足
    async fn miss(&self, id: Uuid, reason: impl FnOnce(&str) -> String) -> RepositoryError {
        let status: Result<Option<String>, _> = sqlx::query_scalar("SELECT status FROM books WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await;
        match status {
            Ok(Some(status)) => RepositoryError::StaleState(reason(&status)),
            Ok(None) => RepositoryError::NotFound(id.to_string()),
            Err(e) => db_error(e),
        }
    }
}

#[derive(FromRow)]
struct BookRow {
    id: String,
    owner_id: String,
    title: String,
    book_type: String,
    niche: String,
    status: String,
    context: String,
    total_chapters: Option<i64>,
    outline: Option<String>,
    cover_image_prompt: Option<String>,
    cover_image_url: Option<String>,
    publish_without_chapter_images: bool,
    artifacts: String,
    created_at: String,
    updated_at: String,
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

impl TryFrom<BookRow> for Book {
    type Error = RepositoryError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let context: BookContext = from_json(&row.context)?;
        let outline: Option<Outline> = row.outline.as_deref().map(from_json).transpose()?;
        let artifacts: Vec<PublishedArtifact> = from_json(&row.artifacts)?;
        Ok(Book {
            id: parse_uuid(&row.id)?,
            owner_id: row.owner_id,
            title: row.title,
            book_type: BookType::from_str(&row.book_type).ok_or_else(|| {
                RepositoryError::SerializationError(format!("unknown book type: {}", row.book_type))
            })?,
            niche: Niche::from_str(&row.niche)
                .ok_or_else(|| RepositoryError::SerializationError(format!("unknown niche: {}", row.niche)))?,
            status: BookStatus::from_str(&row.status).unwrap_or(BookStatus::Draft),
            context,
            total_chapters: row.total_chapters.map(|n| n as u32),
            outline,
            cover_image_prompt: row.cover_image_prompt,
            cover_image_url: row.cover_image_url,
            publish_without_chapter_images: row.publish_without_chapter_images,
            artifacts,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl BookRepositoryPort for SqliteBookRepository {
    async fn save(&self, book: &Book) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO books (id, owner_id, title, book_type, niche, status, context, total_chapters, outline,
                               cover_image_prompt, cover_image_url, publish_without_chapter_images, artifacts,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                book_type = excluded.book_type,
                niche = excluded.niche,
                status = excluded.status,
                context = excluded.context,
                total_chapters = excluded.total_chapters,
                outline = excluded.outline,
                cover_image_prompt = excluded.cover_image_prompt,
                cover_image_url = excluded.cover_image_url,
                publish_without_chapter_images = excluded.publish_without_chapter_images,
                artifacts = excluded.artifacts,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(book.id.to_string())
        .bind(&book.owner_id)
        .bind(&book.title)
        .bind(book.book_type.as_str())
        .bind(book.niche.as_str())
        .bind(book.status.as_str())
        .bind(to_json(&book.context)?)
        .bind(book.total_chapters.map(|n| n as i64))
        .bind(book.outline.as_ref().map(to_json).transpose()?)
        .bind(&book.cover_image_prompt)
        .bind(&book.cover_image_url)
        .bind(book.publish_without_chapter_images)
        .bind(to_json(&book.artifacts)?)
        .bind(format_ts(&book.created_at))
        .bind(format_ts(&book.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, RepositoryError> {
        let row: Option<BookRow> = sqlx::query_as(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(Book::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Book>, RepositoryError> {
        let rows: Vec<BookRow> = sqlx::query_as(&format!(
            "SELECT {} FROM books ORDER BY created_at DESC",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Book>, RepositoryError> {
        let rows: Vec<BookRow> = sqlx::query_as(&format!(
            "SELECT {} FROM books WHERE owner_id = ? ORDER BY created_at DESC",
            BOOK_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn begin_generation(&self, id: Uuid, total_chapters: u32, reset_content: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                status = 'generating',
                total_chapters = ?,
                outline = CASE WHEN ? THEN NULL ELSE outline END,
                cover_image_prompt = CASE WHEN ? THEN NULL ELSE cover_image_prompt END,
                cover_image_url = CASE WHEN ? THEN NULL ELSE cover_image_url END,
                artifacts = CASE WHEN ? THEN '[]' ELSE artifacts END,
                updated_at = ?
            WHERE id = ? AND status != 'generating'
            "#,
        )
        .bind(total_chapters as i64)
        .bind(reset_content)
        .bind(reset_content)
        .bind(reset_content)
        .bind(reset_content)
        .bind(format_ts(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self.miss(id, |_| format!("book {} is already generating", id)).await);
        }
        Ok(())
    }

    async fn end_generation(&self, id: Uuid, next: BookStatus) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE books SET status = ?, updated_at = ? WHERE id = ? AND status = 'generating'")
            .bind(next.as_str())
            .bind(format_ts(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_outline(&self, id: Uuid, outline: &Outline) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE books SET outline = ?, updated_at = ? WHERE id = ? AND status = 'generating'")
            .bind(to_json(outline)?)
            .bind(format_ts(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self
                .miss(id, |status| format!("book {} is {}, not generating", id, status))
                .await);
        }
        Ok(())
    }

    async fn update_settings(&self, id: Uuid, update: &BookSettingsUpdate) -> Result<(), RepositoryError> {
        let context = update.context.as_ref().map(to_json).transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE books SET
                context = COALESCE(?, context),
                publish_without_chapter_images = COALESCE(?, publish_without_chapter_images),
                cover_image_prompt = CASE WHEN ? THEN ? ELSE cover_image_prompt END,
                updated_at = ?
            WHERE id = ? AND (? = 0 OR status != 'generating')
            "#,
        )
        .bind(context)
        .bind(update.publish_without_chapter_images)
        .bind(update.cover_image_prompt.is_some())
        .bind(update.cover_image_prompt.clone().flatten())
        .bind(format_ts(&Utc::now()))
        .bind(id.to_string())
        .bind(update.context.is_some())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self
                .miss(id, |_| "context cannot change while the book is generating".to_string())
                .await);
        }
        Ok(())
    }

    async fn fill_cover_image_prompt(&self, id: Uuid, prompt: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE books SET cover_image_prompt = ?, updated_at = ?
            WHERE id = ? AND TRIM(COALESCE(cover_image_prompt, '')) = ''
            "#,
        )
        .bind(prompt)
        .bind(format_ts(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn fill_cover_image_url(&self, id: Uuid, url: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE books SET cover_image_url = ?, updated_at = ?
            WHERE id = ? AND TRIM(COALESCE(cover_image_url, '')) = ''
            "#,
        )
        .bind(url)
        .bind(format_ts(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_cover_image_url(&self, id: Uuid, url: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE books SET cover_image_url = ?, updated_at = ? WHERE id = ?")
            .bind(url)
            .bind(format_ts(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn record_published(&self, id: Uuid, artifacts: &[PublishedArtifact]) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE books SET status = 'published', artifacts = ?, updated_at = ?
            WHERE id = ? AND status IN ('complete', 'failed', 'published')
            "#,
        )
        .bind(to_json(&artifacts)?)
        .bind(format_ts(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self
                .miss(id, |status| format!("book {} cannot be published while {}", id, status))
                .await);
        }
        Ok(())
    }
}
