use crate::models::{ClickEvent, NewShortUrl, ShortUrlRecord};
use crate::storage::rows::{ClickRow, ShortUrlRow};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS short_urls (
                id BIGSERIAL PRIMARY KEY,
                short_id TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                expires_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id BIGSERIAL PRIMARY KEY,
                short_url_id BIGINT NOT NULL REFERENCES short_urls(id),
                clicked_at BIGINT NOT NULL,
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
        let row = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            INSERT INTO short_urls (short_id, original_url, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (short_id) DO NOTHING
            RETURNING id, short_id, original_url, created_at, expires_at
            "#,
        )
        .bind(&url.short_id)
        .bind(&url.original_url)
        .bind(url.created_at.timestamp_millis())
        .bind(url.expires_at.timestamp_millis())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        match row {
            Some(row) => Ok(row.into_record(Vec::new())?),
            None => Err(StorageError::Conflict),
        }
    }

    async fn exists(&self, short_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM short_urls WHERE short_id = $1)",
        )
        .bind(short_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn get(&self, short_id: &str) -> Result<Option<ShortUrlRecord>> {
        let row = sqlx::query_as::<_, ShortUrlRow>(
            r#"
            SELECT id, short_id, original_url, created_at, expires_at
            FROM short_urls
            WHERE short_id = $1
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
            WHERE short_url_id = $1
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
            SELECT id, $1, $2, $3, $4
            FROM short_urls
            WHERE short_id = $5
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
