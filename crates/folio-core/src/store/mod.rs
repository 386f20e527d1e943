//! The partitioned reader state container.
//!
//! Three partitions with separate lifecycles:
//! - content: what is open, reset on every session change;
//! - ui: chrome visibility, never persisted;
//! - settings: user preferences, persisted on every change.
//!
//! Each partition lives in its own `watch` channel so consumers re-render
//! only for the partition they read. Mutations go through the methods
//! below, which enforce clamping and panel exclusion. Settings mutations
//! also persist and forward surface-bound properties to the
//! [`EffectScheduler`]; the store never touches the surface itself.

mod command;
mod content;
mod ui;

pub use command::ReaderCommand;
pub use content::{OpenSession, PageDimension, ReaderContentState};

use content::index_from_signed;
pub use ui::ReaderUiState;

use crate::settings::{
    FitMode, ProgressBarPosition, ReaderKind, ReaderSettings, ReadingDirection, ReadingMode,
    SettingsPersistence, Theme, clamp_image_quality, clamp_strip_margin,
};
use crate::surface::{EffectScheduler, SurfacePatch};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace};
use ts_rs::TS;

/// All three partitions at one instant.
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderSnapshot {
    pub content: ReaderContentState,
    pub ui: ReaderUiState,
    pub settings: ReaderSettings,
}

pub struct ReaderStateStore {
    content: watch::Sender<ReaderContentState>,
    ui: watch::Sender<ReaderUiState>,
    settings: watch::Sender<ReaderSettings>,
    persistence: SettingsPersistence,
    effects: Arc<EffectScheduler>,
}

impl ReaderStateStore {
    /// Build the store for one reader surface.
    ///
    /// Settings are read synchronously here and pushed to the surface as a
    /// full patch, so the first frame already carries the persisted theme
    /// and layout.
    pub fn new(persistence: SettingsPersistence, effects: Arc<EffectScheduler>) -> Self {
        let settings = persistence.load();
        effects.apply(SurfacePatch::from_settings(&settings));
        info!(kind = %persistence.kind(), "Mounted reader state store");
        Self {
            content: watch::Sender::new(ReaderContentState::default()),
            ui: watch::Sender::new(ReaderUiState::default()),
            settings: watch::Sender::new(settings),
            persistence,
            effects,
        }
    }

    pub fn kind(&self) -> ReaderKind {
        self.persistence.kind()
    }

    pub fn effects(&self) -> &Arc<EffectScheduler> {
        &self.effects
    }

    pub fn content(&self) -> ReaderContentState {
        self.content.borrow().clone()
    }

    pub fn ui(&self) -> ReaderUiState {
        *self.ui.borrow()
    }

    pub fn settings(&self) -> ReaderSettings {
        *self.settings.borrow()
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            content: self.content(),
            ui: self.ui(),
            settings: self.settings(),
        }
    }

    pub fn subscribe_content(&self) -> watch::Receiver<ReaderContentState> {
        self.content.subscribe()
    }

    pub fn subscribe_ui(&self) -> watch::Receiver<ReaderUiState> {
        self.ui.subscribe()
    }

    pub fn subscribe_settings(&self) -> watch::Receiver<ReaderSettings> {
        self.settings.subscribe()
    }

    // ---- content ----

    pub fn open_session(&self, session: OpenSession) {
        let OpenSession {
            book_id,
            path,
            title,
            total_pages,
            page_dimensions,
        } = session;
        info!(book_id, total_pages, %title, "Opened reading session");
        self.content.send_replace(ReaderContentState {
            book_id: Some(book_id),
            path: Some(path),
            title: Some(title),
            total_pages,
            page_dimensions: page_dimensions.unwrap_or_default(),
            ..ReaderContentState::default()
        });
    }

    pub fn close_session(&self) {
        let previous = self.content.send_replace(ReaderContentState::default());
        if let Some(book_id) = previous.book_id {
            info!(book_id, "Closed reading session");
        }
    }

    /// Move to `page`, clamped into the open document. Returns the page
    /// actually selected.
    pub fn set_current_page(&self, page: usize) -> usize {
        let mut selected = 0;
        self.content.send_if_modified(|content| {
            selected = content.clamp_page(page);
            if selected != page {
                trace!(requested = page, selected, "Clamped page request");
            }
            let changed = content.current_page != selected;
            content.current_page = selected;
            changed
        });
        selected
    }

    /// [`Self::set_current_page`] for a signed request; negatives select page 0.
    pub fn go_to_page(&self, page: i64) -> usize {
        self.set_current_page(index_from_signed(page))
    }

    pub fn next_page(&self) -> usize {
        let current = self.content.borrow().current_page;
        self.set_current_page(current.saturating_add(1))
    }

    pub fn prev_page(&self) -> usize {
        let current = self.content.borrow().current_page;
        self.set_current_page(current.saturating_sub(1))
    }

    pub fn set_current_chapter(&self, chapter: usize) -> usize {
        let mut selected = 0;
        self.content.send_if_modified(|content| {
            selected = content.clamp_chapter(chapter);
            let changed = content.current_chapter != selected;
            content.current_chapter = selected;
            changed
        });
        selected
    }

    pub fn set_total_chapters(&self, total: usize) {
        self.content.send_modify(|content| {
            content.total_chapters = total;
            content.current_chapter = content.clamp_chapter(content.current_chapter);
        });
    }

    pub fn set_page_dimensions(&self, dimensions: Vec<PageDimension>) {
        self.content.send_modify(|content| {
            content.page_dimensions = dimensions;
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.content.send_if_modified(|content| {
            let changed = content.is_loading != loading;
            content.is_loading = loading;
            changed
        });
    }

    /// Record a book-loading failure. Persistence failures never land here.
    pub fn set_error(&self, error: Option<String>) {
        self.content.send_modify(|content| {
            if let Some(message) = error.as_deref() {
                debug!(book_id = ?content.book_id, "Book failed to load: {message}");
                content.is_loading = false;
            }
            content.error = error;
        });
    }

    // ---- ui ----

    pub fn toggle_sidebar(&self) {
        self.ui.send_modify(ReaderUiState::toggle_sidebar);
    }

    pub fn toggle_settings_panel(&self) {
        self.ui.send_modify(ReaderUiState::toggle_settings);
    }

    pub fn close_panels(&self) {
        self.ui.send_if_modified(|ui| {
            let changed = ui.sidebar_open || ui.settings_open;
            ui.sidebar_open = false;
            ui.settings_open = false;
            changed
        });
    }

    pub fn toggle_top_bar(&self) {
        self.ui.send_modify(|ui| ui.top_bar_visible = !ui.top_bar_visible);
    }

    pub fn set_top_bar_visible(&self, visible: bool) {
        self.ui.send_if_modified(|ui| {
            let changed = ui.top_bar_visible != visible;
            ui.top_bar_visible = visible;
            changed
        });
    }

    pub fn set_scroll_progress(&self, progress: f64) {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };
        self.ui.send_if_modified(|ui| {
            let changed = ui.scroll_progress != progress;
            ui.scroll_progress = progress;
            changed
        });
    }

    // ---- settings ----

    pub fn set_reading_mode(&self, mode: ReadingMode) {
        self.update_settings("reading_mode", |settings| settings.reading_mode = mode);
    }

    pub fn set_reading_direction(&self, direction: ReadingDirection) {
        self.update_settings("reading_direction", |settings| {
            settings.reading_direction = direction;
        });
    }

    pub fn set_fit_mode(&self, mode: FitMode) {
        self.update_settings("fit_mode", |settings| settings.fit_mode = mode);
    }

    pub fn set_strip_margin(&self, margin: i32) {
        let margin = clamp_strip_margin(margin);
        self.update_settings("strip_margin", |settings| settings.strip_margin = margin);
    }

    pub fn set_progress_bar_position(&self, position: ProgressBarPosition) {
        self.update_settings("progress_bar_position", |settings| {
            settings.progress_bar_position = position;
        });
    }

    pub fn set_sticky_header(&self, enabled: bool) {
        self.update_settings("sticky_header", |settings| settings.sticky_header = enabled);
    }

    pub fn set_show_navigation_tips(&self, enabled: bool) {
        self.update_settings("show_navigation_tips", |settings| {
            settings.show_navigation_tips = enabled;
        });
    }

    pub fn set_theme(&self, theme: Theme) {
        self.update_settings("theme", |settings| settings.theme = theme);
    }

    pub fn toggle_theme(&self) {
        self.update_settings("theme", |settings| settings.theme = settings.theme.toggled());
    }

    pub fn set_image_quality(&self, quality: f32) {
        let quality = clamp_image_quality(quality);
        self.update_settings("image_quality", |settings| settings.image_quality = quality);
    }

    /// Restore the kind's defaults and push them everywhere, changed or not.
    pub fn reset_to_defaults(&self) {
        let defaults = ReaderSettings::defaults_for(self.kind());
        self.settings.send_replace(defaults);
        self.persistence.save(&defaults);
        self.effects.apply(SurfacePatch::from_settings(&defaults));
        info!(kind = %self.kind(), "Reset reader settings to defaults");
    }

    /// Route a command to the partition it mutates.
    ///
    /// Returns `false` for commands that need a session (recording reflow
    /// locations, flushing progress).
    pub fn apply(&self, command: &ReaderCommand) -> bool {
        match *command {
            ReaderCommand::GoToPage { page } => {
                self.go_to_page(page);
            }
            ReaderCommand::NextPage => {
                self.next_page();
            }
            ReaderCommand::PrevPage => {
                self.prev_page();
            }
            ReaderCommand::SetChapter { chapter } => {
                self.set_current_chapter(index_from_signed(chapter));
            }
            ReaderCommand::ToggleSidebar => self.toggle_sidebar(),
            ReaderCommand::ToggleSettingsPanel => self.toggle_settings_panel(),
            ReaderCommand::ToggleTopBar => self.toggle_top_bar(),
            ReaderCommand::SetTopBarVisible { visible } => self.set_top_bar_visible(visible),
            ReaderCommand::SetScrollProgress { progress } => self.set_scroll_progress(progress),
            ReaderCommand::ClosePanels => self.close_panels(),
            ReaderCommand::SetReadingMode { mode } => self.set_reading_mode(mode),
            ReaderCommand::SetReadingDirection { direction } => {
                self.set_reading_direction(direction);
            }
            ReaderCommand::SetFitMode { mode } => self.set_fit_mode(mode),
            ReaderCommand::SetStripMargin { margin } => self.set_strip_margin(margin),
            ReaderCommand::SetProgressBarPosition { position } => {
                self.set_progress_bar_position(position);
            }
            ReaderCommand::SetStickyHeader { enabled } => self.set_sticky_header(enabled),
            ReaderCommand::SetShowNavigationTips { enabled } => {
                self.set_show_navigation_tips(enabled);
            }
            ReaderCommand::SetTheme { theme } => self.set_theme(theme),
            ReaderCommand::ToggleTheme => self.toggle_theme(),
            ReaderCommand::SetImageQuality { quality } => self.set_image_quality(quality),
            ReaderCommand::ResetSettings => self.reset_to_defaults(),
            ReaderCommand::RecordLocation { .. } | ReaderCommand::Flush => return false,
        }
        true
    }

    fn update_settings(&self, field: &'static str, mutate: impl FnOnce(&mut ReaderSettings)) {
        let mut change = None;
        self.settings.send_if_modified(|settings| {
            let before = *settings;
            mutate(settings);
            *settings = settings.sanitized();
            if *settings == before {
                return false;
            }
            change = Some((before, *settings));
            true
        });
        let Some((before, after)) = change else {
            trace!(field, "Setting unchanged");
            return;
        };
        debug!(field, kind = %self.kind(), "Reader setting changed");
        self.persistence.save(&after);
        self.effects.apply(SurfacePatch::between(&before, &after));
    }
}
