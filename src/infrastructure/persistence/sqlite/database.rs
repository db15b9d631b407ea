//! SQLite Database - 数据库连接和迁移

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use uuid::Uuid;

use crate::application::ports::RepositoryError;

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    pub database_url: String,
    /// 最大连接数
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/quillforge.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>, max_connections: u32) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            max_connections,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// 数据库连接池
pub type DbPool = Pool<Sqlite>;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    // 启用 WAL 模式，允许并发读写
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await?;

    // 遇到锁时等待而不是立即失败
    sqlx::query("PRAGMA busy_timeout=5000")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(&pool)
        .await?;

    tracing::info!("SQLite pool created with WAL mode and busy_timeout=5000ms");

    Ok(pool)
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // books
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            book_type TEXT NOT NULL,
            niche TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            context TEXT NOT NULL,
            total_chapters INTEGER,
            outline TEXT,
            cover_image_prompt TEXT,
            cover_image_url TEXT,
            publish_without_chapter_images INTEGER NOT NULL DEFAULT 0,
            artifacts TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // generation_jobs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generation_jobs (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error TEXT,
            current_chapter INTEGER NOT NULL DEFAULT 0,
            total_chapters INTEGER NOT NULL,
            worker_id TEXT,
            claim_seq INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 每本书至多一个未结束的生成任务
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_generation_jobs_active
        ON generation_jobs(book_id) WHERE status NOT IN ('complete', 'failed')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_generation_jobs_status
        ON generation_jobs(status, created_at)
        "#,
    )
    .execute(pool)
    .await?;

    // chapters
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            book_id TEXT NOT NULL,
            chapter_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            text_prompt TEXT,
            text TEXT,
            image_prompt TEXT,
            image_url TEXT,
            word_count INTEGER NOT NULL DEFAULT 0,
            keywords TEXT NOT NULL DEFAULT '[]',
            in_flight TEXT,
            failure_step TEXT,
            failure_error TEXT,
            completed_at TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (book_id, chapter_number),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // usage_entries（追加写入）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usage_entries (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            job_id TEXT,
            chapter_number INTEGER,
            step TEXT NOT NULL,
            prompt_units INTEGER NOT NULL,
            completion_units INTEGER NOT NULL,
            cost REAL NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_usage_entries_book_id
        ON usage_entries(book_id)
        "#,
    )
    .execute(pool)
    .await?;

    // audiobook_jobs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audiobook_jobs (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            voice TEXT NOT NULL,
            model TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error TEXT,
            estimated_cost REAL NOT NULL DEFAULT 0,
            actual_cost REAL NOT NULL DEFAULT 0,
            current_chapter INTEGER NOT NULL DEFAULT 0,
            force_regenerate INTEGER NOT NULL DEFAULT 0,
            claim_seq INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            finished_at TEXT,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 每本书至多一个 pending/generating 的有声书任务
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_audiobook_jobs_active
        ON audiobook_jobs(book_id) WHERE status IN ('pending', 'generating')
        "#,
    )
    .execute(pool)
    .await?;

    // audiobook_segments（progress）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audiobook_segments (
            job_id TEXT NOT NULL,
            chapter_number INTEGER NOT NULL,
            url TEXT NOT NULL,
            characters INTEGER NOT NULL,
            cost REAL NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY (job_id, chapter_number),
            FOREIGN KEY (job_id) REFERENCES audiobook_jobs(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // audiobook_assets（片头、片尾、试听）
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audiobook_assets (
            book_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            voice TEXT NOT NULL,
            model TEXT NOT NULL,
            url TEXT NOT NULL,
            characters INTEGER NOT NULL,
            cost REAL NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (book_id, kind),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}

// ============================================================================
// Row helpers
// ============================================================================

/// 固定宽度的 UTC 时间戳，保证字符串比较与时间顺序一致
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    s.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

/// 唯一约束冲突映射为 Conflict
pub(crate) fn db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
    }
    RepositoryError::DatabaseError(err.to_string())
}
