use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Chrome visibility. The sidebar and the settings panel never share the screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderUiState {
    pub top_bar_visible: bool,
    pub sidebar_open: bool,
    pub settings_open: bool,
    pub scroll_progress: f64,
}

impl Default for ReaderUiState {
    fn default() -> Self {
        Self {
            top_bar_visible: true,
            sidebar_open: false,
            settings_open: false,
            scroll_progress: 0.0,
        }
    }
}

impl ReaderUiState {
    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
        self.settings_open = false;
    }

    pub fn toggle_settings(&mut self) {
        self.settings_open = !self.settings_open;
        self.sidebar_open = false;
    }
}
