use crate::settings::{FitMode, ProgressBarPosition, ReadingDirection, ReadingMode, Theme};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One reader mutation, as issued by shortcuts, panels and the driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export)]
pub enum ReaderCommand {
    /// Negative or past-the-end pages are clamped, never rejected.
    GoToPage {
        #[ts(type = "number")]
        page: i64,
    },
    NextPage,
    PrevPage,
    SetChapter {
        #[ts(type = "number")]
        chapter: i64,
    },
    /// Reflowable position that is not a page index.
    RecordLocation { location: String, percent: f64 },
    ToggleSidebar,
    ToggleSettingsPanel,
    ToggleTopBar,
    SetTopBarVisible { visible: bool },
    SetScrollProgress { progress: f64 },
    ClosePanels,
    SetReadingMode { mode: ReadingMode },
    SetReadingDirection { direction: ReadingDirection },
    SetFitMode { mode: FitMode },
    SetStripMargin { margin: i32 },
    SetProgressBarPosition { position: ProgressBarPosition },
    SetStickyHeader { enabled: bool },
    SetShowNavigationTips { enabled: bool },
    SetTheme { theme: Theme },
    ToggleTheme,
    SetImageQuality { quality: f32 },
    ResetSettings,
    Flush,
}

impl ReaderCommand {
    pub fn action(&self) -> &'static str {
        match self {
            ReaderCommand::GoToPage { .. } => "go_to_page",
            ReaderCommand::NextPage => "next_page",
            ReaderCommand::PrevPage => "prev_page",
            ReaderCommand::SetChapter { .. } => "set_chapter",
            ReaderCommand::RecordLocation { .. } => "record_location",
            ReaderCommand::ToggleSidebar => "toggle_sidebar",
            ReaderCommand::ToggleSettingsPanel => "toggle_settings_panel",
            ReaderCommand::ToggleTopBar => "toggle_top_bar",
            ReaderCommand::SetTopBarVisible { .. } => "set_top_bar_visible",
            ReaderCommand::SetScrollProgress { .. } => "set_scroll_progress",
            ReaderCommand::ClosePanels => "close_panels",
            ReaderCommand::SetReadingMode { .. } => "set_reading_mode",
            ReaderCommand::SetReadingDirection { .. } => "set_reading_direction",
            ReaderCommand::SetFitMode { .. } => "set_fit_mode",
            ReaderCommand::SetStripMargin { .. } => "set_strip_margin",
            ReaderCommand::SetProgressBarPosition { .. } => "set_progress_bar_position",
            ReaderCommand::SetStickyHeader { .. } => "set_sticky_header",
            ReaderCommand::SetShowNavigationTips { .. } => "set_show_navigation_tips",
            ReaderCommand::SetTheme { .. } => "set_theme",
            ReaderCommand::ToggleTheme => "toggle_theme",
            ReaderCommand::SetImageQuality { .. } => "set_image_quality",
            ReaderCommand::ResetSettings => "reset_settings",
            ReaderCommand::Flush => "flush",
        }
    }
}
