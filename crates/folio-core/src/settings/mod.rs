//! The persisted settings partition and its durable storage.

mod models;
pub mod persistence;

pub use models::{
    FitMode, MAX_IMAGE_QUALITY, MAX_STRIP_MARGIN, MIN_IMAGE_QUALITY, MIN_STRIP_MARGIN,
    ProgressBarPosition, ReaderKind, ReaderSettings, ReadingDirection, ReadingMode, Theme,
    clamp_image_quality, clamp_strip_margin,
};
pub use persistence::{
    FileSlotStore, MemorySlotStore, SETTINGS_SCHEMA_VERSION, SettingsPersistence, SettingsSlot,
};
