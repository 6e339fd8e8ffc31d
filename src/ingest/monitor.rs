//! Background sync status polling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SyncEvent, SyncState, SyncStatus};

/// Buffered terminal events; sessions have a handful of subscribers at most
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, sqlx::FromRow)]
struct SyncRow {
    status: String,
    pending_folders: String,
    folders_processed: i64,
    completed_at: Option<String>,
    error: Option<String>,
}

/// Watches one principal's `sync_state` row and emits terminal transitions
///
/// Polling is self-starting: any `current_state` call that observes an
/// in-progress sync spawns the poll loop. The loop runs until the sync
/// reaches a terminal state or the monitor shuts down, emits at most one
/// event per session, and never restarts itself; a later `current_state`
/// observing a fresh run starts a new session.
pub struct SyncStatusMonitor {
    pool: SqlitePool,
    principal_id: String,
    poll_interval: Duration,
    active: Arc<AtomicBool>,
    events: broadcast::Sender<SyncEvent>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncStatusMonitor {
    pub fn new(pool: SqlitePool, principal_id: String, poll_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pool,
            principal_id,
            poll_interval,
            active: Arc::new(AtomicBool::new(false)),
            events,
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to terminal sync events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Whether a poll loop is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Read the current sync state, starting a polling session if the
    /// provider is mid-ingestion
    pub async fn current_state(self: &Arc<Self>) -> Result<SyncState, sqlx::Error> {
        let state = self.read_state().await?;
        if state.in_progress() {
            self.start_polling();
        }
        Ok(state)
    }

    /// Cancel the poll loop and wait for it to exit
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn start_polling(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(principal = %self.principal_id, "Sync in progress, starting status polling");

        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            monitor.poll_loop().await;
            monitor.active.store(false, Ordering::SeqCst);
            debug!(principal = %monitor.principal_id, "Sync polling session ended");
        });
        // A finished session's handle is simply replaced
        *self.task.lock() = Some(handle);
    }

    async fn poll_loop(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let state = match self.read_state().await {
                Ok(state) => state,
                Err(e) => {
                    // Transient read failures do not end the session
                    warn!(principal = %self.principal_id, error = %e, "Sync state read failed");
                    continue;
                }
            };

            match state.status {
                SyncStatus::Running => continue,
                SyncStatus::Idle if state.pending_count == 0 => {
                    if let Some(completed_at) = state.completed_at {
                        info!(
                            principal = %self.principal_id,
                            folders = state.folders_processed,
                            "Provider sync completed"
                        );
                        let _ = self.events.send(SyncEvent::Completed {
                            folders_processed: state.folders_processed,
                            completed_at,
                        });
                    }
                    return;
                }
                SyncStatus::Idle => continue,
                SyncStatus::Error => {
                    let message = state
                        .error
                        .unwrap_or_else(|| "unknown provider error".to_string());
                    warn!(principal = %self.principal_id, %message, "Provider sync failed");
                    let _ = self.events.send(SyncEvent::Failed { message });
                    return;
                }
            }
        }
    }

    async fn read_state(&self) -> Result<SyncState, sqlx::Error> {
        let row: Option<SyncRow> = sqlx::query_as(
            "SELECT status, pending_folders, folders_processed, completed_at, error
             FROM sync_state WHERE principal_id = ?",
        )
        .bind(&self.principal_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(SyncState::idle(&self.principal_id));
        };

        let pending_count = match serde_json::from_str::<Vec<String>>(&row.pending_folders) {
            Ok(folders) => folders.len(),
            Err(e) => {
                warn!(
                    principal = %self.principal_id,
                    error = %e,
                    "Malformed pending_folders column, treating as empty"
                );
                0
            }
        };

        let completed_at = row.completed_at.as_deref().and_then(|raw| {
            match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    warn!(principal = %self.principal_id, error = %e, "Malformed completed_at column");
                    None
                }
            }
        });

        Ok(SyncState {
            principal_id: self.principal_id.clone(),
            status: SyncStatus::parse(&row.status),
            pending_count,
            folders_processed: row.folders_processed,
            completed_at,
            error: row.error,
        })
    }
}
