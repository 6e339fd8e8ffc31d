//! Provider-side sync observation
//!
//! The provider ingests uploaded folders asynchronously; this module watches
//! the locally mirrored `sync_state` row and turns its transitions into
//! events the UI can subscribe to.

pub mod monitor;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};

pub use monitor::SyncStatusMonitor;

/// Provider sync phase as mirrored into the local database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No ingestion in progress
    Idle,
    /// The provider is processing uploaded folders
    Running,
    /// Ingestion stopped on a provider-side error
    Error,
}

impl SyncStatus {
    /// Parse the status column; unrecognized values are treated as errors
    /// rather than silently idling
    pub fn parse(raw: &str) -> Self {
        match raw {
            "idle" => SyncStatus::Idle,
            "running" => SyncStatus::Running,
            _ => SyncStatus::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one principal's sync progress
#[derive(Debug, Clone)]
pub struct SyncState {
    pub principal_id: String,
    pub status: SyncStatus,
    /// Folders the provider has not finished ingesting yet
    pub pending_count: usize,
    /// Folders fully ingested in the current or last run
    pub folders_processed: i64,
    /// Set once a run finishes cleanly
    pub completed_at: Option<DateTime<Utc>>,
    /// Provider error message, if the last run failed
    pub error: Option<String>,
}

impl SyncState {
    /// Default state for a principal with no sync history
    pub fn idle(principal_id: &str) -> Self {
        Self {
            principal_id: principal_id.to_string(),
            status: SyncStatus::Idle,
            pending_count: 0,
            folders_processed: 0,
            completed_at: None,
            error: None,
        }
    }

    /// Whether this state warrants watching for a terminal transition
    pub fn in_progress(&self) -> bool {
        self.status == SyncStatus::Running && self.pending_count > 0
    }
}

/// Terminal sync transitions, delivered at most once per polling session
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The provider finished ingesting every pending folder
    Completed {
        folders_processed: i64,
        completed_at: DateTime<Utc>,
    },
    /// The provider aborted the run
    Failed { message: String },
}
