//! Debounced, crash-safe reading-position writes.
//!
//! Position updates land in a single [`PendingWrite`] slot; each update
//! replaces the previous one and restarts the debounce timer. The slot is
//! committed when the timer expires or when [`ProgressSynchronizer::flush`]
//! is called, whichever comes first. Commits are serialized, and the slot
//! is read at commit time, so a later commit never carries an older value.
//! Writes orphaned by a book switch are committed in the background; each
//! book remembers the newest sequence handed to the backend, and an older
//! write that reaches the backend afterwards is skipped.

use super::timer::DebounceTimer;
use super::{PendingWrite, ProgressBackend, ProgressUpdate, ReadingProgress};
use crate::BookId;
use crate::cancellation::{Generation, SessionGeneration};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone, Copy)]
struct ActiveBook {
    book_id: BookId,
    generation: Generation,
}

#[derive(Debug, Default)]
struct SyncState {
    active: Option<ActiveBook>,
    pending: Option<PendingWrite>,
    timer: Option<DebounceTimer>,
    cached: Option<ReadingProgress>,
    next_ticket: u64,
    next_sequence: u64,
    submitted: HashMap<BookId, u64>,
}

struct Inner {
    backend: Arc<dyn ProgressBackend>,
    delay: Duration,
    generations: SessionGeneration,
    state: Mutex<SyncState>,
    save_flight: tokio::sync::Mutex<()>,
}

/// Owner of the pending-write slot for the active book.
///
/// Cheap to clone; clones share the same slot. Must be used from within a
/// tokio runtime because position updates arm a timer task.
#[derive(Clone)]
pub struct ProgressSynchronizer {
    inner: Arc<Inner>,
}

impl ProgressSynchronizer {
    pub fn new(backend: Arc<dyn ProgressBackend>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                delay,
                generations: SessionGeneration::new(),
                state: Mutex::new(SyncState::default()),
                save_flight: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn with_default_delay(backend: Arc<dyn ProgressBackend>) -> Self {
        Self::new(backend, DEFAULT_DEBOUNCE)
    }

    pub fn active_book(&self) -> Option<BookId> {
        self.inner.lock_state().active.map(|active| active.book_id)
    }

    /// Last progress record loaded or saved for the active book.
    pub fn cached(&self) -> Option<ReadingProgress> {
        self.inner.lock_state().cached.clone()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock_state().pending.is_some()
    }

    /// Make `book_id` the active book and fetch its saved position.
    ///
    /// Any pending write for the previous book is committed under that
    /// book's id in the background. Returns `None` when nothing is saved,
    /// when the backend fails, or when another `load` superseded this one
    /// before the backend answered.
    pub async fn load(&self, book_id: BookId) -> Option<ReadingProgress> {
        let generation = self.inner.activate(book_id);
        let result = self.inner.backend.get_reading_progress(book_id).await;

        let mut state = self.inner.lock_state();
        if !self.inner.generations.is_current(generation) {
            debug!(
                book_id,
                generation = generation.value(),
                "Discarding progress load for superseded session"
            );
            return None;
        }
        match result {
            Ok(Some(progress)) => {
                info!(
                    book_id,
                    location = %progress.location,
                    percent = progress.percent,
                    "Loaded reading progress"
                );
                state.cached = Some(progress.clone());
                Some(progress)
            }
            Ok(None) => {
                debug!(book_id, "No saved reading progress");
                None
            }
            Err(err) => {
                warn!(book_id, "Failed to load reading progress: {err}");
                None
            }
        }
    }

    /// Replace the pending write for the active book and restart the timer.
    ///
    /// A no-op when no book is active.
    pub fn record_position(
        &self,
        location: impl Into<String>,
        percent: f64,
        current_page: Option<u32>,
        total_pages: Option<u32>,
    ) {
        let mut state = self.inner.lock_state();
        let Some(active) = state.active else {
            debug!("Ignoring position update without an active book");
            return;
        };
        state.next_sequence += 1;
        state.next_ticket += 1;
        let write = PendingWrite {
            book_id: active.book_id,
            update: ProgressUpdate::new(location, percent, current_page, total_pages),
            sequence: state.next_sequence,
        };
        trace!(
            book_id = write.book_id,
            sequence = write.sequence,
            location = %write.update.location,
            "Buffered reading position"
        );
        state.pending = Some(write);
        let ticket = state.next_ticket;
        state.timer = Some(self.inner.arm_timer(ticket));
    }

    /// Commit the pending write now, bypassing the debounce delay.
    pub async fn flush(&self) -> Option<ReadingProgress> {
        {
            let mut state = self.inner.lock_state();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            if state.active.is_none() || state.pending.is_none() {
                trace!("Nothing to flush");
                return None;
            }
        }
        self.inner.commit_pending().await
    }

    /// Flush and then forget the active book.
    pub async fn end_session(&self) -> Option<ReadingProgress> {
        let saved = self.flush().await;
        let straggler = {
            let mut state = self.inner.lock_state();
            self.inner.generations.advance();
            state.timer = None;
            state.cached = None;
            if let Some(active) = state.active.take() {
                info!(book_id = active.book_id, "Ended reading session");
            }
            state.pending.take()
        };
        if let Some(write) = straggler {
            self.inner.spawn_commit(write);
        }
        saved
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn activate(self: &Arc<Self>, book_id: BookId) -> Generation {
        let (generation, orphan) = {
            let mut state = self.lock_state();
            let generation = self.generations.advance();
            let previous = state.active.replace(ActiveBook {
                book_id,
                generation,
            });
            state.timer = None;
            state.cached = None;
            if let Some(previous) = previous.filter(|previous| previous.book_id != book_id) {
                debug!(
                    previous = previous.book_id,
                    book_id, "Switched active book"
                );
            }
            (generation, state.pending.take())
        };
        if let Some(write) = orphan {
            debug!(
                book_id = write.book_id,
                sequence = write.sequence,
                "Committing pending write of the previous session"
            );
            self.spawn_commit(write);
        }
        generation
    }

    fn arm_timer(self: &Arc<Self>, ticket: u64) -> DebounceTimer {
        let inner = Arc::downgrade(self);
        DebounceTimer::schedule(self.delay, ticket, move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                inner.on_timer_expired(ticket).await;
            });
        })
    }

    async fn on_timer_expired(&self, ticket: u64) {
        {
            let mut state = self.lock_state();
            let current = state.timer.as_ref().map(DebounceTimer::ticket);
            if current != Some(ticket) {
                trace!(ticket, "Ignoring superseded debounce timer");
                return;
            }
            state.timer = None;
        }
        self.commit_pending().await;
    }

    fn spawn_commit(self: &Arc<Self>, write: PendingWrite) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _flight = inner.save_flight.lock().await;
            inner.save(write).await;
        });
    }

    async fn commit_pending(&self) -> Option<ReadingProgress> {
        let _flight = self.save_flight.lock().await;
        let write = self.lock_state().pending.take()?;
        self.save(write).await
    }

    async fn save(&self, write: PendingWrite) -> Option<ReadingProgress> {
        {
            let mut state = self.lock_state();
            let newest = state.submitted.entry(write.book_id).or_insert(0);
            if *newest > write.sequence {
                debug!(
                    book_id = write.book_id,
                    sequence = write.sequence,
                    newest = *newest,
                    "Skipping write superseded by a newer commit"
                );
                return None;
            }
            *newest = write.sequence;
        }
        match self
            .backend
            .save_reading_progress(write.book_id, &write.update)
            .await
        {
            Ok(saved) => {
                debug!(
                    book_id = write.book_id,
                    sequence = write.sequence,
                    percent = saved.percent,
                    "Saved reading progress"
                );
                let mut state = self.lock_state();
                let still_active = state
                    .active
                    .is_some_and(|active| active.book_id == write.book_id);
                if still_active {
                    state.cached = Some(saved.clone());
                }
                Some(saved)
            }
            Err(err) => {
                warn!(
                    book_id = write.book_id,
                    sequence = write.sequence,
                    "Failed to save reading progress: {err}"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingBackend, settle};

    fn synchronizer() -> (Arc<RecordingBackend>, ProgressSynchronizer) {
        let backend = Arc::new(RecordingBackend::default());
        let sync = ProgressSynchronizer::with_default_delay(backend.clone());
        (backend, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_updates_coalesce_into_one_save_with_last_values() {
        let (backend, sync) = synchronizer();
        sync.load(1).await;

        for page in 0..10u32 {
            sync.record_position(page.to_string(), f64::from(page) * 10.0, Some(page), Some(10));
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert!(backend.saves().is_empty(), "timer keeps restarting");

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        settle().await;

        let saves = backend.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, 1);
        assert_eq!(saves[0].1, ProgressUpdate::new("9", 90.0, Some(9), Some(10)));
        assert!(!sync.has_pending());
        assert_eq!(sync.cached().map(|p| p.location), Some("9".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_without_pending_write_is_a_noop() {
        let (backend, sync) = synchronizer();
        assert_eq!(sync.flush().await, None);

        sync.load(4).await;
        assert_eq!(sync.flush().await, None);
        assert!(backend.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_commits_immediately_and_clears_the_slot() {
        let (backend, sync) = synchronizer();
        sync.load(2).await;
        sync.record_position("12", 40.0, Some(12), Some(30));

        let saved = sync.flush().await.expect("flush saves pending write");
        assert_eq!(saved.book_id, 2);
        assert_eq!(saved.location, "12");
        assert!(!sync.has_pending());
        assert_eq!(backend.saves().len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(backend.saves().len(), 1, "cancelled timer must not save again");
    }

    #[tokio::test(start_paused = true)]
    async fn record_without_active_book_is_ignored() {
        let (backend, sync) = synchronizer();
        sync.record_position("3", 10.0, Some(3), Some(30));
        assert!(!sync.has_pending());

        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert!(backend.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn load_returns_saved_progress_and_caches_it() {
        let (backend, sync) = synchronizer();
        backend.seed(ReadingProgress {
            book_id: 5,
            location: "epubcfi(/6/8)".to_string(),
            percent: 33.0,
            current_page: None,
            total_pages: None,
            updated_at: 10,
        });

        let loaded = sync.load(5).await.expect("seeded progress");
        assert_eq!(loaded.location, "epubcfi(/6/8)");
        assert_eq!(sync.cached(), Some(loaded));
        assert_eq!(sync.active_book(), Some(5));
        assert_eq!(sync.load(6).await, None);
        assert_eq!(sync.cached(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_returns_none() {
        let (backend, sync) = synchronizer();
        backend.set_fail_loads(true);
        assert_eq!(sync.load(9).await, None);
        assert_eq!(sync.active_book(), Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_load_result_is_discarded() {
        let (backend, sync) = synchronizer();
        backend.seed(ReadingProgress {
            book_id: 1,
            location: "old".to_string(),
            percent: 50.0,
            current_page: Some(5),
            total_pages: Some(10),
            updated_at: 1,
        });
        let gate = backend.hold_loads_for(1);

        let first = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.load(1).await })
        };
        settle().await;

        assert_eq!(sync.load(2).await, None);
        gate.notify_one();

        assert_eq!(first.await.expect("join"), None);
        assert_eq!(sync.active_book(), Some(2));
        assert_eq!(sync.cached(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_books_commits_previous_write_under_its_own_id() {
        let (backend, sync) = synchronizer();
        sync.load(1).await;
        sync.record_position("7", 70.0, Some(7), Some(10));

        sync.load(2).await;
        settle().await;

        let saves = backend.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, 1);
        assert_eq!(saves[0].1.location, "7");

        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(backend.saves().len(), 1, "old timer was cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn save_failure_keeps_stale_cache() {
        let (backend, sync) = synchronizer();
        backend.seed(ReadingProgress {
            book_id: 3,
            location: "2".to_string(),
            percent: 20.0,
            current_page: Some(2),
            total_pages: Some(10),
            updated_at: 1,
        });
        sync.load(3).await;
        backend.set_fail_saves(true);

        sync.record_position("4", 40.0, Some(4), Some(10));
        assert_eq!(sync.flush().await, None);

        assert_eq!(sync.cached().map(|p| p.location), Some("2".to_string()));
        assert!(!sync.has_pending(), "failed writes are not retried");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_flushes_never_resurrect_older_values() {
        let (backend, sync) = synchronizer();
        sync.load(8).await;
        let gate = backend.hold_saves();

        sync.record_position("1", 10.0, Some(1), Some(10));
        let first = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.flush().await })
        };
        settle().await;

        sync.record_position("2", 20.0, Some(2), Some(10));
        let second = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.flush().await })
        };
        settle().await;
        assert_eq!(backend.saves().len(), 1, "second save waits for the first");

        gate.notify_one();
        settle().await;
        gate.notify_one();
        settle().await;

        first.await.expect("join first");
        second.await.expect("join second");
        let locations: Vec<String> = backend
            .saves()
            .into_iter()
            .map(|(_, update)| update.location)
            .collect();
        assert_eq!(locations, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(sync.cached().map(|p| p.location), Some("2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn orphaned_write_never_lands_after_newer_one() {
        let (backend, sync) = synchronizer();
        sync.load(1).await;
        sync.record_position("5", 50.0, Some(5), Some(10));
        sync.load(2).await;
        sync.load(1).await;
        sync.record_position("7", 70.0, Some(7), Some(10));

        sync.flush().await;
        settle().await;

        assert_eq!(backend.stored(1).map(|p| p.location), Some("7".to_string()));
        let locations: Vec<String> = backend
            .saves()
            .into_iter()
            .map(|(_, update)| update.location)
            .collect();
        assert_eq!(locations, vec!["7".to_string()]);
        assert_eq!(sync.cached().map(|p| p.location), Some("7".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn end_session_flushes_and_deactivates() {
        let (backend, sync) = synchronizer();
        sync.load(11).await;
        sync.record_position("5", 50.0, Some(5), Some(10));

        let saved = sync.end_session().await.expect("final flush");
        assert_eq!(saved.location, "5");
        assert_eq!(sync.active_book(), None);

        sync.record_position("6", 60.0, Some(6), Some(10));
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(backend.saves().len(), 1);
    }
}
