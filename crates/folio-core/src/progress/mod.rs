//! Reading-position tracking and its durable backend contract.

mod store;
mod sync;
mod timer;

pub use store::FileProgressStore;
pub use sync::{DEFAULT_DEBOUNCE, ProgressSynchronizer};
pub use timer::DebounceTimer;

use crate::BookId;
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Durable reading position of one book, as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReadingProgress {
    #[ts(type = "number")]
    pub book_id: BookId,
    pub location: String,
    pub percent: f64,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
    #[ts(type = "number")]
    pub updated_at: u64,
}

/// One position update, as handed to the backend on commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressUpdate {
    pub location: String,
    pub percent: f64,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
}

impl ProgressUpdate {
    pub fn new(
        location: impl Into<String>,
        percent: f64,
        current_page: Option<u32>,
        total_pages: Option<u32>,
    ) -> Self {
        Self {
            location: location.into(),
            percent: clamp_percent(percent),
            current_page,
            total_pages,
        }
    }
}

/// The newest uncommitted update, tagged with the book it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub book_id: BookId,
    pub update: ProgressUpdate,
    pub sequence: u64,
}

/// Backend store for reading positions.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    async fn get_reading_progress(
        &self,
        book_id: BookId,
    ) -> Result<Option<ReadingProgress>, BackendError>;

    /// Persist `update` and return the canonical stored record.
    async fn save_reading_progress(
        &self,
        book_id: BookId,
        update: &ProgressUpdate,
    ) -> Result<ReadingProgress, BackendError>;
}

pub(crate) fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}
