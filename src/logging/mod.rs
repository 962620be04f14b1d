//! Newline-delimited JSON access and error logs
//!
//! `RequestLogger` owns two non-blocking file writers. Every write is
//! handed to a background worker; a full queue drops the line and I/O
//! errors are swallowed, so logging never stalls or fails a request.

pub mod middleware;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::models::iso8601;

pub use middleware::log_requests;

pub const ACCESS_LOG_FILE: &str = "access.log";
pub const ERROR_LOG_FILE: &str = "error.log";

/// One completed HTTP request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessEntry {
    pub timestamp: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_time_ms: u64,
    pub ip: String,
}

/// One error surfaced by a route
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub message: String,
    pub stack: Option<String>,
    pub path: String,
}

impl ErrorEntry {
    pub fn new(message: impl Into<String>, stack: Option<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: iso8601(Utc::now()),
            message: message.into(),
            stack,
            path: path.into(),
        }
    }
}

#[derive(Clone)]
pub struct RequestLogger {
    access: NonBlocking,
    error: NonBlocking,
    dir: PathBuf,
    // Dropping the last clone flushes both workers.
    _guards: Arc<(WorkerGuard, WorkerGuard)>,
}

impl RequestLogger {
    /// Open (creating if needed) `access.log` and `error.log` under `dir`
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let (access, access_guard) = tracing_appender::non_blocking(open_appender(dir, "access")?);
        let (error, error_guard) = tracing_appender::non_blocking(open_appender(dir, "error")?);

        Ok(Self {
            access,
            error,
            dir: dir.to_path_buf(),
            _guards: Arc::new((access_guard, error_guard)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn access(&self, entry: &AccessEntry) {
        if let Ok(value) = serde_json::to_value(entry) {
            append(&self.access, &value);
        }
    }

    pub fn request_error(&self, entry: &ErrorEntry) {
        if let Ok(value) = serde_json::to_value(entry) {
            append(&self.error, &value);
        }
    }

    /// Lifecycle event (startup, shutdown, database connected) into the access log
    pub fn info(&self, fields: Value) {
        append(&self.access, &with_timestamp(fields));
    }

    /// Unstructured failure not tied to a request into the error log
    pub fn error(&self, fields: Value) {
        append(&self.error, &with_timestamp(fields));
    }
}

fn open_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to open {prefix}.log in {}", dir.display()))
}

fn with_timestamp(fields: Value) -> Value {
    let mut map = match fields {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("message".to_string(), other);
            map
        }
    };
    map.entry("timestamp")
        .or_insert_with(|| Value::String(iso8601(Utc::now())));
    Value::Object(map)
}

fn append(writer: &NonBlocking, value: &Value) {
    let Ok(mut line) = serde_json::to_vec(value) else {
        return;
    };
    line.push(b'\n');

    let mut writer = writer.clone();
    let _ = writer.write_all(&line);
}
