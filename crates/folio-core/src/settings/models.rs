use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const MIN_STRIP_MARGIN: i32 = 0;
pub const MAX_STRIP_MARGIN: i32 = 32;
pub const MIN_IMAGE_QUALITY: f32 = 0.5;
pub const MAX_IMAGE_QUALITY: f32 = 1.0;

/// Which reader surface a settings partition belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReaderKind {
    #[default]
    Book,
    Manga,
}

impl ReaderKind {
    /// Durable-storage namespace for this surface's settings.
    pub fn storage_key(self) -> &'static str {
        match self {
            ReaderKind::Book => "folio.reader.book.settings",
            ReaderKind::Manga => "folio.reader.manga.settings",
        }
    }
}

impl std::fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReaderKind::Book => "book",
            ReaderKind::Manga => "manga",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReadingMode {
    #[default]
    Single,
    Double,
    Strip,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReadingDirection {
    #[default]
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum FitMode {
    #[default]
    Width,
    Height,
    Contain,
    Original,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ProgressBarPosition {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Persisted reader preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderSettings {
    pub reading_mode: ReadingMode,
    pub reading_direction: ReadingDirection,
    pub fit_mode: FitMode,
    pub strip_margin: i32,
    pub progress_bar_position: ProgressBarPosition,
    pub sticky_header: bool,
    pub show_navigation_tips: bool,
    pub theme: Theme,
    pub image_quality: f32,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::defaults_for(ReaderKind::Book)
    }
}

impl ReaderSettings {
    /// Compiled-in defaults for a reader surface.
    pub fn defaults_for(kind: ReaderKind) -> Self {
        let (reading_direction, fit_mode) = match kind {
            ReaderKind::Book => (ReadingDirection::Ltr, FitMode::Width),
            ReaderKind::Manga => (ReadingDirection::Rtl, FitMode::Contain),
        };
        Self {
            reading_mode: ReadingMode::Single,
            reading_direction,
            fit_mode,
            strip_margin: 0,
            progress_bar_position: ProgressBarPosition::Bottom,
            sticky_header: true,
            show_navigation_tips: true,
            theme: Theme::Light,
            image_quality: 0.9,
        }
    }

    /// Copy with every numeric field pulled back into range.
    pub fn sanitized(mut self) -> Self {
        self.strip_margin = clamp_strip_margin(self.strip_margin);
        self.image_quality = clamp_image_quality(self.image_quality);
        self
    }
}

pub fn clamp_strip_margin(margin: i32) -> i32 {
    margin.clamp(MIN_STRIP_MARGIN, MAX_STRIP_MARGIN)
}

pub fn clamp_image_quality(quality: f32) -> f32 {
    if quality.is_nan() {
        return MAX_IMAGE_QUALITY;
    }
    quality.clamp(MIN_IMAGE_QUALITY, MAX_IMAGE_QUALITY)
}
