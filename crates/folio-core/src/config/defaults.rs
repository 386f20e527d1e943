use crate::settings::ReaderKind;

pub(crate) const MIN_DEBOUNCE_MS: u64 = 100;
pub(crate) const MAX_DEBOUNCE_MS: u64 = 60_000;
pub(crate) const MIN_FRAME_INTERVAL_MS: u64 = 1;
pub(crate) const MAX_FRAME_INTERVAL_MS: u64 = 1_000;

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_data_dir() -> String {
    ".folio".to_string()
}

pub(crate) fn default_debounce_ms() -> u64 {
    2_000
}

pub(crate) fn default_frame_interval_ms() -> u64 {
    16
}

pub(crate) fn default_reader_kind() -> ReaderKind {
    ReaderKind::Book
}
