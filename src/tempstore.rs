//! # Auto-Cleanup of Temporary Stores
//!
//! A temporary store is named `[LOG-BUFFER] <uuid-v4>[ [AUTO DELETE]]`. On
//! creation, every file in the target directory matching the auto-delete
//! marker is unlinked best-effort, so a crash that skipped normal disposal
//! still gets cleaned up the next time any process opens a temporary store
//! in the same directory — no live cleanup daemon required.
//!
//! Grounded on the teacher crate's snapshot writer
//! (`ttlog::snapshot::SnapshotWriter::write_snapshot`, which tags output
//! files by pid/timestamp/reason under a configured directory) for the
//! filename-tagging idiom, generalized to a regex marker and reclaim-on-open
//! protocol.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::error::Result;
use crate::options::StoreOptions;
use crate::store::LogStore;

static MARKER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\[LOG-BUFFER\] [0-9a-fA-F-]{36} \[AUTO DELETE\]$").expect("valid marker regex"));

fn file_stem_matches(path: &Path) -> bool {
  path
    .file_stem()
    .and_then(|s| s.to_str())
    .map(|s| MARKER.is_match(s))
    .unwrap_or(false)
}

/// Unlinks every file in `dir` whose stem matches the auto-delete marker.
/// Errors (permission, file gone already) are swallowed: cleanup is
/// best-effort.
pub fn reclaim_orphaned(dir: &Path) {
  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(_) => return,
  };
  for entry in entries.flatten() {
    let path = entry.path();
    if file_stem_matches(&path) {
      if let Err(err) = std::fs::remove_file(&path) {
        tracing::debug!(path = %path.display(), error = %err, "orphan cleanup failed (ignored)");
      } else {
        tracing::debug!(path = %path.display(), "reclaimed orphaned temporary store");
      }
    }
  }
}

/// Builds a temporary store's filename: `[LOG-BUFFER] <uuid-v4>.sqlite` or,
/// with `auto_delete`, `[LOG-BUFFER] <uuid-v4> [AUTO DELETE].sqlite`.
pub fn temp_file_name(auto_delete: bool) -> String {
  let uuid = Uuid::new_v4();
  if auto_delete {
    format!("[LOG-BUFFER] {uuid} [AUTO DELETE].sqlite")
  } else {
    format!("[LOG-BUFFER] {uuid}.sqlite")
  }
}

/// Creates a new temporary store in `dir`: first reclaims orphaned
/// auto-delete files left by crashed processes, then creates a fresh store
/// tagged per `options.auto_delete`.
pub fn create_temporary(dir: impl AsRef<Path>, options: StoreOptions) -> Result<LogStore> {
  let dir = dir.as_ref();
  reclaim_orphaned(dir);
  let path: PathBuf = dir.join(temp_file_name(options.auto_delete));
  LogStore::open(path, options)
}
