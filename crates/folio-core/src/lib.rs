//! Reading-session state for the Folio reader surfaces.
//!
//! The crate owns three concerns:
//! - `store`: the partitioned reader state (content, UI, settings).
//! - `progress`: debounced, crash-safe reading-position writes.
//! - `surface`: frame-batched application of presentation settings.
//!
//! `session` wires them together the way a reader surface uses them.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod progress;
pub mod session;
pub mod settings;
pub mod store;
pub mod surface;

mod bindings;
#[cfg(test)]
pub(crate) mod test_support;

pub use bindings::export_ts_bindings;

/// Backend identifier of a book (or manga volume).
pub type BookId = i64;
