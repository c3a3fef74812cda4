//! A file-backed, sqlite-backed log store: string interning, dictionary
//! tables, an LRU paged cache, and an observable ordered collection over a
//! single append-mostly table.
//!
//! Two schema variants are selected by [`options::Purpose`] on creation and
//! detected automatically on open: [`options::Purpose::Recording`] for
//! append-heavy workloads, [`options::Purpose::Analysis`] for filter/scan-
//! heavy offline inspection. Both share the same dictionary tables and wire
//! format; see [`accessor`] for the split.

pub mod accessor;
pub mod cache;
pub mod collection;
pub mod error;
pub mod message;
pub mod options;
pub mod snapshot;
pub mod store;
pub mod string_interner;
pub mod tempstore;

pub use collection::{ChangeEvent, ChangeObserver, ObservableCollection};
pub use error::{Result, StoreError};
pub use message::LogMessage;
pub use options::{Purpose, StoreOptions, WriteMode};
pub use snapshot::ProgressCallback;
pub use store::LogStore;

/// Installs a default `tracing_subscriber::fmt` subscriber so this crate's
/// internal diagnostics (open/close, prune, vacuum, lock contention) reach
/// stderr. A no-op if a global subscriber is already installed; callers
/// that host their own `tracing` setup should not need this.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt::try_init();
}
