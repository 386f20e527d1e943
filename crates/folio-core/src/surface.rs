//! Frame-batched application of presentation settings.
//!
//! Theme, fit mode and strip margin are read by the presentation layer
//! continuously while the user drags a slider, so they bypass the normal
//! snapshot/re-render path. Requests are coalesced into one pending
//! [`SurfacePatch`] and pushed to the [`PresentationSurface`] at most once
//! per frame; only the newest value of each property survives.

use crate::settings::{FitMode, ReaderSettings, Theme};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// The rendering host that receives presentation properties directly.
pub trait PresentationSurface: Send + Sync {
    fn apply_theme(&self, theme: Theme);
    fn apply_fit_mode(&self, fit_mode: FitMode);
    fn apply_strip_margin(&self, margin: i32);
}

/// Presentation properties waiting for the next frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfacePatch {
    pub theme: Option<Theme>,
    pub fit_mode: Option<FitMode>,
    pub strip_margin: Option<i32>,
}

impl SurfacePatch {
    /// Every surface-bound property of `settings`.
    pub fn from_settings(settings: &ReaderSettings) -> Self {
        Self {
            theme: Some(settings.theme),
            fit_mode: Some(settings.fit_mode),
            strip_margin: Some(settings.strip_margin),
        }
    }

    /// Only the surface-bound properties that differ between two snapshots.
    pub fn between(before: &ReaderSettings, after: &ReaderSettings) -> Self {
        Self {
            theme: Some(after.theme).filter(|theme| *theme != before.theme),
            fit_mode: Some(after.fit_mode).filter(|mode| *mode != before.fit_mode),
            strip_margin: Some(after.strip_margin).filter(|margin| *margin != before.strip_margin),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.theme.is_none() && self.fit_mode.is_none() && self.strip_margin.is_none()
    }

    /// Overlay `newer` on top of this patch; newer values win per property.
    pub fn merge(&mut self, newer: SurfacePatch) {
        self.theme = newer.theme.or(self.theme);
        self.fit_mode = newer.fit_mode.or(self.fit_mode);
        self.strip_margin = newer.strip_margin.or(self.strip_margin);
    }
}

#[derive(Debug, Default)]
struct FrameQueue {
    pending: SurfacePatch,
    frame_requested: bool,
    frames_applied: u64,
}

pub struct EffectScheduler {
    surface: Arc<dyn PresentationSurface>,
    queue: Mutex<FrameQueue>,
    frame_signal: Notify,
}

impl EffectScheduler {
    pub fn new(surface: Arc<dyn PresentationSurface>) -> Self {
        Self {
            surface,
            queue: Mutex::new(FrameQueue::default()),
            frame_signal: Notify::new(),
        }
    }

    /// Queue a patch for the next frame.
    ///
    /// Returns `true` when this call requested a new frame, `false` when the
    /// patch was coalesced into one that is already scheduled.
    pub fn apply(&self, patch: SurfacePatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        let mut queue = self.lock_queue();
        queue.pending.merge(patch);
        if queue.frame_requested {
            trace!(?patch, "Coalesced surface patch into pending frame");
            return false;
        }
        queue.frame_requested = true;
        drop(queue);
        self.frame_signal.notify_one();
        true
    }

    pub fn has_pending(&self) -> bool {
        self.lock_queue().frame_requested
    }

    pub fn frames_applied(&self) -> u64 {
        self.lock_queue().frames_applied
    }

    /// Drain the pending patch onto the surface. Hosts with a native frame
    /// callback call this from it; otherwise [`Self::spawn_frame_pump`] does.
    pub fn run_frame(&self) -> SurfacePatch {
        let patch = {
            let mut queue = self.lock_queue();
            queue.frame_requested = false;
            let patch = std::mem::take(&mut queue.pending);
            if !patch.is_empty() {
                queue.frames_applied += 1;
            }
            patch
        };
        if patch.is_empty() {
            return patch;
        }
        if let Some(theme) = patch.theme {
            self.surface.apply_theme(theme);
        }
        if let Some(fit_mode) = patch.fit_mode {
            self.surface.apply_fit_mode(fit_mode);
        }
        if let Some(margin) = patch.strip_margin {
            self.surface.apply_strip_margin(margin);
        }
        debug!(?patch, "Applied surface frame");
        patch
    }

    /// Run frames on a fixed cadence for as long as the returned task lives.
    ///
    /// A frame only runs when something is pending, and consecutive frames
    /// are at least `frame_interval` apart. Abort the handle at unmount.
    pub fn spawn_frame_pump(self: &Arc<Self>, frame_interval: Duration) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut next_frame = Instant::now();
            loop {
                scheduler.frame_signal.notified().await;
                if next_frame > Instant::now() {
                    tokio::time::sleep_until(next_frame).await;
                }
                scheduler.run_frame();
                next_frame = Instant::now() + frame_interval;
            }
        })
    }

    fn lock_queue(&self) -> MutexGuard<'_, FrameQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
