//! Keeps the course embedding index in step with the catalog
//!
//! The index is `Synced` when it holds one row per public course, `Unsynced`
//! otherwise, and `Rebuilding` while a writer is active. At most one writer
//! runs at a time; a second request observes the flag and returns at once.

mod controller;

pub use controller::IndexingController;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relationship of the vector store to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Unsynced,
    Rebuilding,
    Synced,
}

impl IndexStatus {
    /// Classify stored row count against catalog size
    pub fn classify(indexed: usize, catalog_size: usize) -> Self {
        if indexed == 0 || indexed != catalog_size {
            IndexStatus::Unsynced
        } else {
            IndexStatus::Synced
        }
    }
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IndexStatus::Unsynced => "unsynced",
            IndexStatus::Rebuilding => "rebuilding",
            IndexStatus::Synced => "synced",
        };
        f.write_str(name)
    }
}

/// Snapshot for health checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHealth {
    pub status: IndexStatus,
    pub indexed: usize,
    pub catalog_size: usize,
    pub last_rebuild: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// What a completed rebuild did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Courses embedded and stored
    pub courses: usize,
    /// Provider batch calls made
    pub batches: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebuildOutcome {
    Completed(RebuildReport),
    /// Another writer held the index; nothing was done
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    AlreadySynced,
    InProgress,
    Rebuilt(RebuildReport),
    /// The catalog has no public courses
    NothingToIndex,
}
