use crate::models::{ClickEvent, NewShortUrl, ShortUrlRecord};
use crate::storage::rows::{ClickRow, ShortUrlRow};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS short_urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_id TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_url_id INTEGER NOT NULL REFERENCES short_urls(id),
                clicked_at INTEGER NOT NULL,
                referrer TEXT NOT NULL,
                ip TEXT NOT NULL,
                country TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_short_url_id ON clicks(short_url_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create(&self, url: &NewShortUrl) -> StorageResult<ShortUrlRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_id, original_url, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(short_id) DO NOTHING
            "#,
        )
        .bind(&url.short_id)
        .bind(&url.original_url)
        .bind(url.created_at.timestamp_millis())
        .bind(url.expires_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let record = self
            .get(&url.short_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("inserted short url {} vanished", url.short_id))?;

        Ok(record)
    }

    async fn exists(&self, short_id: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM short_urls WHERE short_id = ?",
        )
        .bind(short_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count > 0)
    }

    async fn get(&self, short_id: &str) -> Result<Option<ShortUrlRecord>> {
        let row = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            SELECT id, short_id, original_url, created_at, expires_at
            FROM short_urls
            WHERE short_id = ?
            "#,
        )
        .bind(short_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let clicks = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT clicked_at, referrer, ip, country
            FROM clicks
            WHERE short_url_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(row.id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(Some(row.into_record(clicks)?))
    }

    async fn append_click(&self, short_id: &str, click: &ClickEvent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO clicks (short_url_id, clicked_at, referrer, ip, country)
            SELECT id, ?, ?, ?, ?
            FROM short_urls
            WHERE short_id = ?
            "#,
        )
        .bind(click.timestamp.timestamp_millis())
        .bind(&click.referrer)
        .bind(&click.ip)
        .bind(&click.country)
        .bind(short_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
