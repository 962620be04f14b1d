//! Row shapes shared by the SQL backends. Timestamps are stored as Unix
//! milliseconds so both SQLite and PostgreSQL can use a plain BIGINT.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::models::{ClickEvent, ShortUrlRecord};

#[derive(Debug, FromRow)]
pub(crate) struct ShortUrlRow {
    pub id: i64,
    pub short_id: String,
    pub original_url: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct ClickRow {
    pub clicked_at: i64,
    pub referrer: String,
    pub ip: String,
    pub country: String,
}

impl ShortUrlRow {
    pub fn into_record(self, clicks: Vec<ClickRow>) -> Result<ShortUrlRecord> {
        let clicks = clicks
            .into_iter()
            .map(ClickRow::into_event)
            .collect::<Result<Vec<_>>>()?;

        Ok(ShortUrlRecord {
            short_id: self.short_id,
            original_url: self.original_url,
            created_at: from_millis(self.created_at)?,
            expires_at: from_millis(self.expires_at)?,
            clicks,
        })
    }
}

impl ClickRow {
    fn into_event(self) -> Result<ClickEvent> {
        Ok(ClickEvent {
            timestamp: from_millis(self.clicked_at)?,
            referrer: self.referrer,
            ip: self.ip,
            country: self.country,
        })
    }
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("timestamp {millis} is out of range"))
}
