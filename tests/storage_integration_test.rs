//! Integration tests for the storage backends
//!
//! PostgreSQL tests run only when DATABASE_URL points at a server, e.g.
//! `DATABASE_URL=postgres://localhost/ferret_test cargo test`.

mod common;

use chrono::{Duration, Utc};
use common::{create_test_storage, new_short_url};
use ferret::api::shortcode::{allocate_generated_code, DEFAULT_CODE_LENGTH, MAX_EXTRA_ATTEMPTS};
use ferret::models::ClickEvent;
use ferret::storage::{PostgresStorage, Storage, StorageError};
use std::sync::Arc;

async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn click(referrer: &str, country: &str) -> ClickEvent {
    ClickEvent {
        timestamp: Utc::now(),
        referrer: referrer.to_string(),
        ip: "203.0.113.1".to_string(),
        country: country.to_string(),
    }
}

async fn assert_create_and_get(storage: Arc<dyn Storage>, short_id: &str) {
    let new = new_short_url(short_id, "https://example.com/x", Duration::minutes(10));
    let created = storage.create(&new).await.unwrap();

    assert_eq!(created.short_id, short_id);
    assert_eq!(created.original_url, "https://example.com/x");
    assert_eq!(created.created_at.timestamp_millis(), new.created_at.timestamp_millis());
    assert_eq!(created.expires_at.timestamp_millis(), new.expires_at.timestamp_millis());
    assert!(created.clicks.is_empty());

    let fetched = storage.get(short_id).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    assert!(storage.exists(short_id).await.unwrap());
}

async fn assert_duplicate_conflicts(storage: Arc<dyn Storage>, short_id: &str) {
    storage
        .create(&new_short_url(short_id, "https://first.example", Duration::minutes(10)))
        .await
        .unwrap();

    let err = storage
        .create(&new_short_url(short_id, "https://second.example", Duration::minutes(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let record = storage.get(short_id).await.unwrap().unwrap();
    assert_eq!(record.original_url, "https://first.example");
}

async fn assert_clicks_append_in_order(storage: Arc<dyn Storage>, short_id: &str) {
    storage
        .create(&new_short_url(short_id, "https://example.com", Duration::minutes(10)))
        .await
        .unwrap();

    for referrer in ["https://a.example", "https://b.example", "direct"] {
        assert!(storage
            .append_click(short_id, &click(referrer, "unknown"))
            .await
            .unwrap());
    }

    let record = storage.get(short_id).await.unwrap().unwrap();
    let referrers: Vec<_> = record.clicks.iter().map(|c| c.referrer.as_str()).collect();
    assert_eq!(referrers, ["https://a.example", "https://b.example", "direct"]);
}

#[tokio::test]
async fn test_create_and_get_sqlite() {
    assert_create_and_get(create_test_storage().await, "abc123").await;
}

#[tokio::test]
async fn test_get_missing_sqlite() {
    let storage = create_test_storage().await;
    assert!(storage.get("missing").await.unwrap().is_none());
    assert!(!storage.exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_conflicts_sqlite() {
    assert_duplicate_conflicts(create_test_storage().await, "dup").await;
}

#[tokio::test]
async fn test_clicks_append_in_order_sqlite() {
    assert_clicks_append_in_order(create_test_storage().await, "ordered").await;
}

#[tokio::test]
async fn test_append_click_to_missing_record_sqlite() {
    let storage = create_test_storage().await;
    assert!(!storage
        .append_click("ghost", &click("direct", "unknown"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_clicks_are_scoped_to_their_record_sqlite() {
    let storage = create_test_storage().await;
    for id in ["one", "two"] {
        storage
            .create(&new_short_url(id, "https://example.com", Duration::minutes(10)))
            .await
            .unwrap();
    }
    storage.append_click("one", &click("direct", "US")).await.unwrap();

    assert_eq!(storage.get("one").await.unwrap().unwrap().clicks.len(), 1);
    assert!(storage.get("two").await.unwrap().unwrap().clicks.is_empty());
}

#[tokio::test]
async fn test_concurrent_creation_single_winner_sqlite() {
    let storage = create_test_storage().await;

    let mut handles = vec![];
    for i in 0..10 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage
                .create(&new_short_url(
                    "same",
                    &format!("https://example.com/{i}"),
                    Duration::minutes(10),
                ))
                .await
        }));
    }

    let mut success_count = 0;
    let mut conflict_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one creation should succeed");
    assert_eq!(conflict_count, 9);
}

#[tokio::test]
async fn test_generation_gives_up_after_extra_attempts() {
    let storage = create_test_storage().await;

    // occupy every candidate the generator will produce
    for length in DEFAULT_CODE_LENGTH..=DEFAULT_CODE_LENGTH + MAX_EXTRA_ATTEMPTS {
        storage
            .create(&new_short_url(&"a".repeat(length), "https://example.com", Duration::minutes(10)))
            .await
            .unwrap();
    }

    let mut lengths = vec![];
    let result = allocate_generated_code(storage.as_ref(), |length| {
        lengths.push(length);
        "a".repeat(length)
    })
    .await
    .unwrap();

    assert!(result.is_none());
    assert_eq!(lengths, vec![6, 7, 8, 9, 10, 11, 12]);
}

#[tokio::test]
async fn test_generation_lengthens_until_free() {
    let storage = create_test_storage().await;
    for code in ["aaaaaa", "aaaaaaa"] {
        storage
            .create(&new_short_url(code, "https://example.com", Duration::minutes(10)))
            .await
            .unwrap();
    }

    let result = allocate_generated_code(storage.as_ref(), |length| "a".repeat(length))
        .await
        .unwrap();

    assert_eq!(result.as_deref(), Some("aaaaaaaa"));
}

#[tokio::test]
async fn test_create_and_get_postgres() {
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    let short_id = format!("pg{}", Utc::now().timestamp_micros());
    assert_create_and_get(storage, &short_id).await;
}

#[tokio::test]
async fn test_duplicate_conflicts_postgres() {
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    let short_id = format!("pgdup{}", Utc::now().timestamp_micros());
    assert_duplicate_conflicts(storage, &short_id).await;
}

#[tokio::test]
async fn test_clicks_append_in_order_postgres() {
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    let short_id = format!("pgclk{}", Utc::now().timestamp_micros());
    assert_clicks_append_in_order(storage, &short_id).await;
}
