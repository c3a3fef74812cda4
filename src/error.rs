//! Uniform error taxonomy for the log store.
//!
//! The accessor and cache never return raw `rusqlite` errors to callers;
//! everything is folded into [`StoreError`] so that the façade can present a
//! single error surface regardless of which schema variant is backing a
//! given store.

use thiserror::Error;

/// Errors surfaced by the log store façade, cache, and accessors.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The file's `application_id` pragma does not match the expected tag.
  #[error("not a log store file (application identifier mismatch)")]
  InvalidFormat,

  /// The file's `user_version` pragma names a schema this crate does not know.
  #[error("unsupported schema version {0}")]
  UnsupportedVersion(i64),

  /// Any error surfaced by the underlying storage layer (locking, disk full,
  /// permission, corruption).
  #[error("storage error during {operation}")]
  Io {
    operation: &'static str,
    #[source]
    source: rusqlite::Error,
  },

  /// A 32-bit-only API was called on a store whose count exceeds 32-bit range.
  #[error("store too large for a 32-bit index ({count} messages)")]
  StoreTooLarge { count: u64 },

  /// `from_id`/`count` fell outside `[oldest, newest]` or was negative.
  #[error("argument out of range: {0}")]
  ArgumentOutOfRange(String),

  /// Insert/remove/set on the ordered collection view.
  #[error("operation not supported: {0}")]
  OperationNotSupported(&'static str),

  /// Any operation attempted on a store that has been disposed.
  #[error("store has been disposed")]
  Disposed,

  /// The progress callback returned `false` during a backup-with-progress snapshot.
  #[error("snapshot cancelled")]
  BackupCancelled,

  /// JSON encoding/decoding failed during `export_json`/`import_json`.
  #[error("json error during {operation}")]
  Json {
    operation: &'static str,
    #[source]
    source: serde_json::Error,
  },
}

impl StoreError {
  pub(crate) fn io(operation: &'static str, source: rusqlite::Error) -> Self {
    StoreError::Io { operation, source }
  }

  pub(crate) fn json(operation: &'static str, source: serde_json::Error) -> Self {
    StoreError::Json { operation, source }
  }
}

pub type Result<T> = std::result::Result<T, StoreError>;
