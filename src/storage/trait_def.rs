use crate::models::{ClickEvent, NewShortUrl, ShortUrlRecord};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a new record. Fails with `StorageError::Conflict` if the short id is taken.
    async fn create(&self, url: &NewShortUrl) -> StorageResult<ShortUrlRecord>;

    /// Whether any record already uses `short_id`
    async fn exists(&self, short_id: &str) -> Result<bool>;

    /// Get a record together with its clicks in insertion order
    async fn get(&self, short_id: &str) -> Result<Option<ShortUrlRecord>>;

    /// Append a click to the record. Returns false if no record matches.
    ///
    /// The append is a single statement, so concurrent redirects on the
    /// same short id never overwrite each other's clicks.
    async fn append_click(&self, short_id: &str, click: &ClickEvent) -> Result<bool>;
}
