//! Tests for the sync status monitor
//!
//! The poll loop runs against real time with a short interval; terminal
//! assertions go through bounded timeouts, never bare sleeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::time::timeout;

use super::monitor::SyncStatusMonitor;
use super::{SyncEvent, SyncStatus};
use crate::db::init_schema;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Test helpers
// ============================================================================

async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

fn monitor_over(pool: &SqlitePool) -> Arc<SyncStatusMonitor> {
    Arc::new(SyncStatusMonitor::new(
        pool.clone(),
        "principal-1".to_string(),
        POLL_INTERVAL,
    ))
}

async fn write_state(
    pool: &SqlitePool,
    status: &str,
    pending: &[&str],
    processed: i64,
    completed_at: Option<&str>,
    error: Option<&str>,
) {
    let pending_json = serde_json::to_string(pending).unwrap();
    sqlx::query(
        "INSERT INTO sync_state
            (principal_id, status, pending_folders, folders_processed,
             completed_at, error, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(principal_id) DO UPDATE SET
            status = excluded.status,
            pending_folders = excluded.pending_folders,
            folders_processed = excluded.folders_processed,
            completed_at = excluded.completed_at,
            error = excluded.error,
            updated_at = excluded.updated_at",
    )
    .bind("principal-1")
    .bind(status)
    .bind(pending_json)
    .bind(processed)
    .bind(completed_at)
    .bind(error)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();
}

async fn wait_until_idle(monitor: &Arc<SyncStatusMonitor>) {
    timeout(EVENT_TIMEOUT, async {
        while monitor.is_active() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("poll loop did not stop in time");
}

// ============================================================================
// Status parsing
// ============================================================================

#[test]
fn test_status_parse() {
    assert_eq!(SyncStatus::parse("idle"), SyncStatus::Idle);
    assert_eq!(SyncStatus::parse("running"), SyncStatus::Running);
    assert_eq!(SyncStatus::parse("error"), SyncStatus::Error);
    assert_eq!(SyncStatus::parse("garbage"), SyncStatus::Error);
}

// ============================================================================
// State reads
// ============================================================================

#[tokio::test]
async fn test_missing_row_reads_as_idle_and_does_not_poll() {
    let pool = memory_pool().await;
    let monitor = monitor_over(&pool);

    let state = monitor.current_state().await.unwrap();
    assert_eq!(state.status, SyncStatus::Idle);
    assert_eq!(state.pending_count, 0);
    assert!(state.completed_at.is_none());
    assert!(!monitor.is_active());
}

#[tokio::test]
async fn test_idle_with_no_pending_does_not_poll() {
    let pool = memory_pool().await;
    write_state(&pool, "idle", &[], 10, Some(&Utc::now().to_rfc3339()), None).await;
    let monitor = monitor_over(&pool);

    let state = monitor.current_state().await.unwrap();
    assert_eq!(state.status, SyncStatus::Idle);
    assert_eq!(state.folders_processed, 10);
    assert!(!monitor.is_active());
}

#[tokio::test]
async fn test_malformed_pending_column_is_treated_as_empty() {
    let pool = memory_pool().await;
    sqlx::query(
        "INSERT INTO sync_state (principal_id, status, pending_folders, folders_processed, updated_at)
         VALUES ('principal-1', 'idle', 'not json', 0, ?)",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(&pool)
    .await
    .unwrap();
    let monitor = monitor_over(&pool);

    let state = monitor.current_state().await.unwrap();
    assert_eq!(state.pending_count, 0);
    assert!(!monitor.is_active());
}

// ============================================================================
// Polling sessions
// ============================================================================

#[tokio::test]
async fn test_completion_emits_exactly_one_event() {
    let pool = memory_pool().await;
    write_state(&pool, "running", &["2024-06", "2024-07"], 0, None, None).await;
    let monitor = monitor_over(&pool);
    let mut events = monitor.subscribe();

    let state = monitor.current_state().await.unwrap();
    assert!(state.in_progress());
    assert!(monitor.is_active());

    // Provider finishes: status flips to idle with a completion timestamp
    let done_at = Utc::now();
    write_state(&pool, "idle", &[], 2, Some(&done_at.to_rfc3339()), None).await;

    let event = timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("no completion event")
        .unwrap();
    match event {
        SyncEvent::Completed {
            folders_processed, ..
        } => assert_eq!(folders_processed, 2),
        other => panic!("expected Completed, got {:?}", other),
    }

    wait_until_idle(&monitor).await;
    // The session ended: no second event arrives
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_provider_error_emits_failed_and_stops() {
    let pool = memory_pool().await;
    write_state(&pool, "running", &["2024-06"], 0, None, None).await;
    let monitor = monitor_over(&pool);
    let mut events = monitor.subscribe();

    monitor.current_state().await.unwrap();
    assert!(monitor.is_active());

    write_state(&pool, "error", &["2024-06"], 0, None, Some("quota exceeded")).await;

    let event = timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("no failure event")
        .unwrap();
    match event {
        SyncEvent::Failed { message } => assert_eq!(message, "quota exceeded"),
        other => panic!("expected Failed, got {:?}", other),
    }

    wait_until_idle(&monitor).await;

    // The error state does not restart polling on a later read
    let state = monitor.current_state().await.unwrap();
    assert_eq!(state.status, SyncStatus::Error);
    assert!(!monitor.is_active());
}

#[tokio::test]
async fn test_repeated_reads_reuse_one_session() {
    let pool = memory_pool().await;
    write_state(&pool, "running", &["2024-06"], 0, None, None).await;
    let monitor = monitor_over(&pool);

    monitor.current_state().await.unwrap();
    monitor.current_state().await.unwrap();
    assert!(monitor.is_active());

    monitor.shutdown().await;
    assert!(!monitor.is_active());
}

#[tokio::test]
async fn test_new_run_starts_a_new_session() {
    let pool = memory_pool().await;
    write_state(&pool, "running", &["2024-06"], 0, None, None).await;
    let monitor = monitor_over(&pool);
    let mut events = monitor.subscribe();

    monitor.current_state().await.unwrap();
    write_state(&pool, "idle", &[], 1, Some(&Utc::now().to_rfc3339()), None).await;
    timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    wait_until_idle(&monitor).await;

    // The provider starts ingesting a new upload
    write_state(&pool, "running", &["2024-08"], 0, None, None).await;
    monitor.current_state().await.unwrap();
    assert!(monitor.is_active());

    write_state(&pool, "idle", &[], 1, Some(&Utc::now().to_rfc3339()), None).await;
    let event = timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("no event for second session")
        .unwrap();
    assert!(matches!(event, SyncEvent::Completed { .. }));

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_ends_session_without_event() {
    let pool = memory_pool().await;
    write_state(&pool, "running", &["2024-06"], 0, None, None).await;
    let monitor = monitor_over(&pool);
    let mut events = monitor.subscribe();

    monitor.current_state().await.unwrap();
    monitor.shutdown().await;

    assert!(!monitor.is_active());
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
