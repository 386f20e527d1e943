use crate::BookId;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Intrinsic size of one rendered page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct PageDimension {
    pub width: f64,
    pub height: f64,
}

/// What is open right now. Reset wholesale on every session change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderContentState {
    #[ts(type = "number | null")]
    pub book_id: Option<BookId>,
    pub path: Option<String>,
    pub title: Option<String>,
    pub total_pages: usize,
    pub current_page: usize,
    pub current_chapter: usize,
    pub total_chapters: usize,
    pub page_dimensions: Vec<PageDimension>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Arguments of [`super::ReaderStateStore::open_session`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OpenSession {
    #[ts(type = "number")]
    pub book_id: BookId,
    pub path: String,
    pub title: String,
    pub total_pages: usize,
    #[serde(default)]
    pub page_dimensions: Option<Vec<PageDimension>>,
}

/// Convert a signed index from the command wire; negatives become 0.
pub(crate) fn index_from_signed(index: i64) -> usize {
    if index <= 0 {
        return 0;
    }
    usize::try_from(index).unwrap_or(usize::MAX)
}

impl ReaderContentState {
    pub fn is_open(&self) -> bool {
        self.book_id.is_some()
    }

    pub fn last_page(&self) -> usize {
        self.total_pages.saturating_sub(1)
    }

    /// Clamp `page` into `[0, max(total_pages, 1) - 1]`.
    pub fn clamp_page(&self, page: usize) -> usize {
        page.min(self.last_page())
    }

    pub fn clamp_chapter(&self, chapter: usize) -> usize {
        chapter.min(self.total_chapters.saturating_sub(1))
    }

    /// Position as a percentage, counting the current page as read.
    pub fn percent(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.current_page + 1) as f64 * 100.0 / self.total_pages as f64
    }
}
