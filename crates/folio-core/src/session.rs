//! One mounted reader surface: the state store plus progress tracking.

use crate::progress::{ProgressSynchronizer, ReadingProgress};
use crate::store::{OpenSession, ReaderCommand, ReaderStateStore};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Wires position changes from the store into the synchronizer.
///
/// Dropping a session that still has an active book spawns a best-effort
/// flush; call [`ReaderSession::close`] to wait for it instead.
pub struct ReaderSession {
    store: Arc<ReaderStateStore>,
    progress: ProgressSynchronizer,
}

impl ReaderSession {
    pub fn new(store: Arc<ReaderStateStore>, progress: ProgressSynchronizer) -> Self {
        Self { store, progress }
    }

    pub fn store(&self) -> &Arc<ReaderStateStore> {
        &self.store
    }

    pub fn progress(&self) -> &ProgressSynchronizer {
        &self.progress
    }

    /// Open a book and jump to its saved page, if there is one.
    ///
    /// The saved page is only applied when the same book is still open once
    /// the backend answers and the reader has not moved in the meantime.
    pub async fn open_book(&self, session: OpenSession) -> Option<ReadingProgress> {
        let book_id = session.book_id;
        self.store.open_session(session);
        self.store.set_loading(true);

        let saved = self.progress.load(book_id).await;

        if self.store.content().book_id != Some(book_id) {
            debug!(book_id, "Book changed while its progress was loading");
            return None;
        }
        self.store.set_loading(false);
        let saved = saved?;
        if self.store.content().current_page != 0 || self.progress.has_pending() {
            debug!(book_id, "Reader moved while progress was loading; keeping position");
            return Some(saved);
        }
        let page = saved
            .current_page
            .map(|page| page as usize)
            .or_else(|| saved.location.parse::<usize>().ok());
        if let Some(page) = page {
            let restored = self.store.set_current_page(page);
            info!(book_id, page = restored, "Restored reading position");
        }
        Some(saved)
    }

    pub fn go_to_page(&self, page: i64) -> usize {
        let before = self.store.content().current_page;
        let selected = self.store.go_to_page(page);
        if selected != before {
            self.record_page();
        }
        selected
    }

    pub fn next_page(&self) -> usize {
        let before = self.store.content().current_page;
        let selected = self.store.next_page();
        if selected != before {
            self.record_page();
        }
        selected
    }

    pub fn prev_page(&self) -> usize {
        let before = self.store.content().current_page;
        let selected = self.store.prev_page();
        if selected != before {
            self.record_page();
        }
        selected
    }

    /// Record a reflowable position (e.g. an anchor inside a chapter).
    pub fn record_location(&self, location: impl Into<String>, percent: f64) {
        if !self.store.content().is_open() {
            debug!("Ignoring location without an open book");
            return;
        }
        self.progress.record_position(location, percent, None, None);
    }

    pub async fn flush(&self) -> Option<ReadingProgress> {
        self.progress.flush().await
    }

    pub async fn dispatch(&self, command: ReaderCommand) {
        debug!(action = command.action(), "Dispatching reader command");
        match command {
            ReaderCommand::GoToPage { page } => {
                self.go_to_page(page);
            }
            ReaderCommand::NextPage => {
                self.next_page();
            }
            ReaderCommand::PrevPage => {
                self.prev_page();
            }
            ReaderCommand::RecordLocation { location, percent } => {
                self.record_location(location, percent);
            }
            ReaderCommand::Flush => {
                self.flush().await;
            }
            other => {
                self.store.apply(&other);
            }
        }
    }

    /// Flush the last position, then forget the book.
    pub async fn close(&self) -> Option<ReadingProgress> {
        let saved = self.progress.end_session().await;
        self.store.close_session();
        saved
    }

    fn record_page(&self) {
        let content = self.store.content();
        if !content.is_open() {
            return;
        }
        self.progress.record_position(
            content.current_page.to_string(),
            content.percent(),
            u32::try_from(content.current_page).ok(),
            u32::try_from(content.total_pages).ok(),
        );
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        if self.progress.active_book().is_none() {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let progress = self.progress.clone();
                handle.spawn(async move {
                    progress.end_session().await;
                });
            }
            Err(_) => warn!("Reader session dropped outside a runtime; last position not flushed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressUpdate;
    use crate::settings::{MemorySlotStore, ReaderKind, SettingsPersistence};
    use crate::surface::EffectScheduler;
    use crate::test_support::{RecordingBackend, RecordingSurface, settle};
    use std::time::Duration;

    fn session() -> (Arc<RecordingBackend>, ReaderSession) {
        let backend = Arc::new(RecordingBackend::default());
        let effects = Arc::new(EffectScheduler::new(Arc::new(RecordingSurface::default())));
        let store = Arc::new(ReaderStateStore::new(
            SettingsPersistence::new(ReaderKind::Book, MemorySlotStore::new()),
            effects,
        ));
        let progress = ProgressSynchronizer::with_default_delay(backend.clone());
        (backend, ReaderSession::new(store, progress))
    }

    fn book(book_id: i64, total_pages: usize) -> OpenSession {
        OpenSession {
            book_id,
            path: format!("/library/{book_id}.cbz"),
            title: format!("Volume {book_id}"),
            total_pages,
            page_dimensions: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn open_book_restores_saved_page() {
        let (backend, session) = session();
        backend.seed(ReadingProgress {
            book_id: 3,
            location: "7".to_string(),
            percent: 40.0,
            current_page: Some(7),
            total_pages: Some(20),
            updated_at: 1,
        });

        let saved = session.open_book(book(3, 20)).await.expect("saved progress");
        assert_eq!(saved.current_page, Some(7));
        let content = session.store().content();
        assert_eq!(content.current_page, 7);
        assert!(!content.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn restored_page_is_clamped_to_new_page_count() {
        let (backend, session) = session();
        backend.seed(ReadingProgress {
            book_id: 3,
            location: "40".to_string(),
            percent: 90.0,
            current_page: None,
            total_pages: None,
            updated_at: 1,
        });

        session.open_book(book(3, 10)).await;
        assert_eq!(session.store().content().current_page, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_progress_does_not_move_the_new_book() {
        let (backend, session) = session();
        let session = Arc::new(session);
        backend.seed(ReadingProgress {
            book_id: 1,
            location: "15".to_string(),
            percent: 80.0,
            current_page: Some(15),
            total_pages: Some(20),
            updated_at: 1,
        });
        let gate = backend.hold_loads_for(1);

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.open_book(book(1, 20)).await })
        };
        settle().await;

        session.open_book(book(2, 5)).await;
        gate.notify_one();

        assert_eq!(first.await.expect("join"), None);
        let content = session.store().content();
        assert_eq!(content.book_id, Some(2));
        assert_eq!(content.current_page, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn page_turned_during_load_is_not_overwritten() {
        let (backend, session) = session();
        let session = Arc::new(session);
        backend.seed(ReadingProgress {
            book_id: 4,
            location: "12".to_string(),
            percent: 65.0,
            current_page: Some(12),
            total_pages: Some(20),
            updated_at: 1,
        });
        let gate = backend.hold_loads_for(4);

        let opening = {
            let session = session.clone();
            tokio::spawn(async move { session.open_book(book(4, 20)).await })
        };
        settle().await;
        session.go_to_page(3);
        gate.notify_one();

        let saved = opening.await.expect("join").expect("saved progress");
        assert_eq!(saved.current_page, Some(12));
        assert_eq!(session.store().content().current_page, 3);
        assert!(session.progress().has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn page_turns_are_debounced_into_one_save() {
        let (backend, session) = session();
        session.open_book(book(5, 10)).await;

        session.next_page();
        session.next_page();
        session.go_to_page(6);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        settle().await;

        assert_eq!(
            backend.saves(),
            vec![(5, ProgressUpdate::new("6", 70.0, Some(6), Some(10)))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_turns_record_nothing() {
        let (backend, session) = session();
        session.open_book(book(5, 2)).await;

        session.prev_page();
        assert!(!session.progress().has_pending());
        session.go_to_page(1);
        session.flush().await;
        session.next_page();
        assert!(!session.progress().has_pending());
        assert_eq!(backend.saves().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_before_resetting() {
        let (backend, session) = session();
        session.open_book(book(8, 30)).await;
        session
            .dispatch(ReaderCommand::RecordLocation {
                location: "epubcfi(/6/14!/4/2)".to_string(),
                percent: 47.5,
            })
            .await;

        let saved = session.close().await.expect("final flush");
        assert_eq!(saved.location, "epubcfi(/6/14!/4/2)");
        assert_eq!(backend.saves().len(), 1);
        assert_eq!(session.store().content().book_id, None);
        assert_eq!(session.progress().active_book(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_routes_store_and_progress_commands() {
        let (backend, session) = session();
        session.open_book(book(2, 10)).await;

        session.dispatch(ReaderCommand::ToggleSettingsPanel).await;
        session.dispatch(ReaderCommand::GoToPage { page: 4 }).await;
        session.dispatch(ReaderCommand::Flush).await;

        assert!(session.store().ui().settings_open);
        assert_eq!(backend.saves().len(), 1);
        assert_eq!(backend.saves()[0].1.location, "4");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_an_open_session_flushes() {
        let (backend, session) = session();
        session.open_book(book(6, 10)).await;
        session.go_to_page(2);

        drop(session);
        settle().await;

        assert_eq!(backend.saves().len(), 1);
        assert_eq!(backend.saves()[0].0, 6);
    }
}
