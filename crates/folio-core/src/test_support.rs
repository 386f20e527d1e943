//! Fakes shared by unit tests.

use crate::BookId;
use crate::error::BackendError;
use crate::progress::{ProgressBackend, ProgressUpdate, ReadingProgress};
use crate::settings::{FitMode, Theme};
use crate::surface::PresentationSurface;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Let spawned tasks run until they park again.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCall {
    Theme(Theme),
    FitMode(FitMode),
    StripMargin(i32),
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().expect("surface calls").clone()
    }

    fn push(&self, call: SurfaceCall) {
        self.calls.lock().expect("surface calls").push(call);
    }
}

impl PresentationSurface for RecordingSurface {
    fn apply_theme(&self, theme: Theme) {
        self.push(SurfaceCall::Theme(theme));
    }

    fn apply_fit_mode(&self, fit_mode: FitMode) {
        self.push(SurfaceCall::FitMode(fit_mode));
    }

    fn apply_strip_margin(&self, margin: i32) {
        self.push(SurfaceCall::StripMargin(margin));
    }
}

/// In-memory progress backend that records every save.
///
/// Saves are logged before they wait on the optional save gate, so tests
/// can observe a save that is still in flight.
#[derive(Default)]
pub struct RecordingBackend {
    records: Mutex<HashMap<BookId, ReadingProgress>>,
    saves: Mutex<Vec<(BookId, ProgressUpdate)>>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    load_gates: Mutex<HashMap<BookId, Arc<Notify>>>,
    save_gate: Mutex<Option<Arc<Notify>>>,
    clock: Mutex<u64>,
}

impl RecordingBackend {
    pub fn seed(&self, progress: ReadingProgress) {
        self.records
            .lock()
            .expect("records")
            .insert(progress.book_id, progress);
    }

    pub fn saves(&self) -> Vec<(BookId, ProgressUpdate)> {
        self.saves.lock().expect("saves").clone()
    }

    pub fn stored(&self, book_id: BookId) -> Option<ReadingProgress> {
        self.records.lock().expect("records").get(&book_id).cloned()
    }

    /// Block loads of `book_id` until the returned gate is notified.
    pub fn hold_loads_for(&self, book_id: BookId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.load_gates
            .lock()
            .expect("load gates")
            .insert(book_id, gate.clone());
        gate
    }

    /// Block every save until the returned gate is notified, once per save.
    pub fn hold_saves(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.save_gate.lock().expect("save gate") = Some(gate.clone());
        gate
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressBackend for RecordingBackend {
    async fn get_reading_progress(
        &self,
        book_id: BookId,
    ) -> Result<Option<ReadingProgress>, BackendError> {
        let gate = self.load_gates.lock().expect("load gates").remove(&book_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(BackendError::Database("load failed".to_string()));
        }
        Ok(self.stored(book_id))
    }

    async fn save_reading_progress(
        &self,
        book_id: BookId,
        update: &ProgressUpdate,
    ) -> Result<ReadingProgress, BackendError> {
        self.saves
            .lock()
            .expect("saves")
            .push((book_id, update.clone()));
        let gate = self.save_gate.lock().expect("save gate").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(BackendError::Database("disk full".to_string()));
        }
        let updated_at = {
            let mut clock = self.clock.lock().expect("clock");
            *clock += 1;
            *clock
        };
        let record = ReadingProgress {
            book_id,
            location: update.location.clone(),
            percent: update.percent,
            current_page: update.current_page,
            total_pages: update.total_pages,
            updated_at,
        };
        self.seed(record.clone());
        Ok(record)
    }
}
