//! Data layer for recording and analysing run statistics.
//!
//! Handles persisting entries to the local SQLite database, deriving
//! per-hour and per-wave rates, and formatting values for display.

pub mod format;
mod models;
pub mod stats;
mod storage;

pub use models::{sort_entries, EntryColumn, NewEntry, RunEntry};
pub use storage::Storage;
