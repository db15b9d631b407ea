//! SQLite Chapter Repository

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::{db_error, format_ts, parse_opt_ts, parse_ts, parse_uuid, DbPool};
use crate::application::ports::{ChapterRepositoryPort, RepositoryError};
use crate::domain::generation::{Chapter, ChapterFailure, ChapterMetadata, ChapterStep};

const CHAPTER_COLUMNS: &str = "book_id, chapter_number, title, text_prompt, text, image_prompt, image_url, \
     word_count, keywords, in_flight, failure_step, failure_error, completed_at, updated_at";

/// SQLite Chapter Repository
pub struct SqliteChapterRepository {
    pool: DbPool,
}

impl SqliteChapterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ChapterRow {
    book_id: String,
    chapter_number: i64,
    title: String,
    text_prompt: Option<String>,
    text: Option<String>,
    image_prompt: Option<String>,
    image_url: Option<String>,
    word_count: i64,
    keywords: String,
    in_flight: Option<String>,
    failure_step: Option<String>,
    failure_error: Option<String>,
    completed_at: Option<String>,
    updated_at: String,
}

fn parse_step(s: Option<String>) -> Result<Option<ChapterStep>, RepositoryError> {
    s.map(|s| {
        ChapterStep::from_str(&s)
            .ok_or_else(|| RepositoryError::SerializationError(format!("unknown chapter step: {}", s)))
    })
    .transpose()
}

impl TryFrom<ChapterRow> for Chapter {
    type Error = RepositoryError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        let keywords: Vec<String> = serde_json::from_str(&row.keywords)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let failure = match (parse_step(row.failure_step)?, row.failure_error) {
            (Some(step), Some(error)) => Some(ChapterFailure { step, error }),
            _ => None,
        };

        Ok(Chapter {
            book_id: parse_uuid(&row.book_id)?,
            number: row.chapter_number as u32,
            title: row.title,
            text_prompt: row.text_prompt,
            text: row.text,
            image_prompt: row.image_prompt,
            image_url: row.image_url,
            metadata: ChapterMetadata {
                word_count: row.word_count as usize,
                keywords,
            },
            in_flight: parse_step(row.in_flight)?,
            failure,
            completed_at: parse_opt_ts(row.completed_at)?,
            token_usage: Vec::new(),
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl ChapterRepositoryPort for SqliteChapterRepository {
    async fn upsert(&self, chapter: &Chapter) -> Result<(), RepositoryError> {
        let keywords = serde_json::to_string(&chapter.metadata.keywords)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO chapters (book_id, chapter_number, title, text_prompt, text, image_prompt, image_url,
                                  word_count, keywords, in_flight, failure_step, failure_error, completed_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(book_id, chapter_number) DO UPDATE SET
                title = excluded.title,
                text_prompt = excluded.text_prompt,
                text = excluded.text,
                image_prompt = excluded.image_prompt,
                image_url = excluded.image_url,
                word_count = excluded.word_count,
                keywords = excluded.keywords,
                in_flight = excluded.in_flight,
                failure_step = excluded.failure_step,
                failure_error = excluded.failure_error,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(chapter.book_id.to_string())
        .bind(chapter.number as i64)
        .bind(&chapter.title)
        .bind(&chapter.text_prompt)
        .bind(&chapter.text)
        .bind(&chapter.image_prompt)
        .bind(&chapter.image_url)
        .bind(chapter.metadata.word_count as i64)
        .bind(keywords)
        .bind(chapter.in_flight.map(|s| s.as_str()))
        .bind(chapter.failure.as_ref().map(|f| f.step.as_str()))
        .bind(chapter.failure.as_ref().map(|f| f.error.clone()))
        .bind(chapter.completed_at.as_ref().map(format_ts))
        .bind(format_ts(&chapter.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find(&self, book_id: Uuid, number: u32) -> Result<Option<Chapter>, RepositoryError> {
        let row: Option<ChapterRow> = sqlx::query_as(&format!(
            "SELECT {} FROM chapters WHERE book_id = ? AND chapter_number = ?",
            CHAPTER_COLUMNS
        ))
        .bind(book_id.to_string())
        .bind(number as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Chapter::try_from).transpose()
    }

    async fn find_by_book(&self, book_id: Uuid) -> Result<Vec<Chapter>, RepositoryError> {
        let rows: Vec<ChapterRow> = sqlx::query_as(&format!(
            "SELECT {} FROM chapters WHERE book_id = ? ORDER BY chapter_number ASC",
            CHAPTER_COLUMNS
        ))
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Chapter::try_from).collect()
    }

    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64, RepositoryError> {
        // 删除与活动任务检查在同一条语句内完成
        let result = sqlx::query(
            r#"
            DELETE FROM chapters
            WHERE book_id = ?
              AND NOT EXISTS (
                  SELECT 1 FROM generation_jobs
                  WHERE generation_jobs.book_id = chapters.book_id
                    AND generation_jobs.status NOT IN ('complete', 'failed')
              )
            "#,
        )
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM generation_jobs WHERE book_id = ? AND status NOT IN ('complete', 'failed')",
            )
            .bind(book_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

            if active > 0 {
                return Err(RepositoryError::Conflict(format!(
                    "book {} has an active generation job",
                    book_id
                )));
            }
        }

        tracing::debug!(book_id = %book_id, deleted = result.rows_affected(), "Chapters deleted");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BookRepositoryPort, GenerationJobRepositoryPort};
    use crate::domain::book::{Book, BookContext, BookTitle, BookType, Niche};
    use crate::domain::generation::{ChapterStatus, GenerationJob, JobState};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository,
        SqliteGenerationJobRepository,
    };

    struct Fixture {
        chapters: SqliteChapterRepository,
        jobs: SqliteGenerationJobRepository,
        book: Book,
    }

    async fn setup() -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let books = SqliteBookRepository::new(pool.clone());
        let book = Book::new(
            "u1",
            BookTitle::new("Field Notes").unwrap(),
            BookType::Guide,
            Niche::Business,
            BookContext::default(),
            true,
        )
        .unwrap();
        books.save(&book).await.unwrap();

        Fixture {
            chapters: SqliteChapterRepository::new(pool.clone()),
            jobs: SqliteGenerationJobRepository::new(pool),
            book,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_ordering() {
        let f = setup().await;
        for n in [3, 1, 2] {
            f.chapters.upsert(&Chapter::new(f.book.id, n, format!("Part {}", n))).await.unwrap();
        }

        let mut ch = f.chapters.find(f.book.id, 2).await.unwrap().unwrap();
        ch.record_text("write part two".into(), "Harbour lights harbour lights".into());
        ch.fail(ChapterStep::ImagePrompt, "rate limited");
        f.chapters.upsert(&ch).await.unwrap();

        let all = f.chapters.find_by_book(f.book.id).await.unwrap();
        assert_eq!(all.iter().map(|c| c.number).collect::<Vec<_>>(), vec![1, 2, 3]);

        let reloaded = &all[1];
        assert_eq!(reloaded.status(), ChapterStatus::Failed);
        assert_eq!(reloaded.metadata.word_count, 4);
        assert_eq!(reloaded.metadata.keywords, vec!["harbour", "lights"]);
        assert_eq!(
            reloaded.failure,
            Some(ChapterFailure {
                step: ChapterStep::ImagePrompt,
                error: "rate limited".into()
            })
        );
    }

    #[tokio::test]
    async fn test_delete_blocked_by_active_job() {
        let f = setup().await;
        f.chapters.upsert(&Chapter::new(f.book.id, 1, "One")).await.unwrap();

        let job = GenerationJob::new(f.book.id, 1);
        f.jobs.create(&job).await.unwrap();
        let err = f.chapters.delete_for_book(f.book.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(f.chapters.find_by_book(f.book.id).await.unwrap().len(), 1);

        f.jobs.update_job_status(job.id, JobState::failed("stop")).await.unwrap();
        assert_eq!(f.chapters.delete_for_book(f.book.id).await.unwrap(), 1);
        assert!(f.chapters.find_by_book(f.book.id).await.unwrap().is_empty());
    }
}
