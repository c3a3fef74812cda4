//! # Log Store Façade
//!
//! The single public entry point: wraps one [`Accessor`] and one
//! [`PagedCache`], validates arguments, translates low-level errors into the
//! uniform [`StoreError`] taxonomy, and notifies the cache (and any
//! subscribed collection observers) on every mutation.
//!
//! Grounded on the teacher crate's global logger handle
//! (`ttlog::logger`, "one atomic pointer gates all emission") for the idea
//! of a single owning façade in front of swappable backends — generalized
//! here from a process-global singleton to an owned, disposable value, since
//! a log store (unlike the teacher's tracing subscriber) is not inherently
//! a one-per-process resource.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::accessor::{Accessor, NameKind};
use crate::cache::PagedCache;
use crate::collection::{ChangeObserver, ChangeStream, ObservableCollection};
use crate::error::{Result, StoreError};
use crate::message::LogMessage;
use crate::options::StoreOptions;
use crate::snapshot::ProgressCallback;

struct Inner {
  accessor: Accessor,
  cache: PagedCache,
}

/// A single open log store: one accessor, one cache, one mutex serialising
/// access to both (per the spec's concurrency model, §5 — the accessor and
/// cache are not internally locked).
pub struct LogStore {
  inner: Mutex<Inner>,
  changes: ChangeStream,
  path: PathBuf,
  options: StoreOptions,
  disposed: AtomicBool,
}

impl LogStore {
  /// Opens `path`, creating it with `options.purpose`'s schema if it does
  /// not exist. If it exists, its identity and schema version are
  /// validated and `options.purpose` is ignored.
  pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    Self::open_impl(path.as_ref(), options, true)
  }

  /// Like [`Self::open`] but fails with an I/O error rather than creating a
  /// new file if `path` does not exist.
  pub fn open_existing(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    Self::open_impl(path.as_ref(), options, false)
  }

  fn open_impl(path: &Path, options: StoreOptions, create: bool) -> Result<Self> {
    let accessor = Accessor::open(path, &options, create)?;
    let cache = PagedCache::new(options.max_cache_page_count, options.page_capacity);
    Ok(Self {
      inner: Mutex::new(Inner { accessor, cache }),
      changes: ChangeStream::default(),
      path: path.to_path_buf(),
      options,
      disposed: AtomicBool::new(false),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn purpose(&self) -> Result<crate::options::Purpose> {
    self.check_disposed()?;
    Ok(self.inner.lock().unwrap().accessor.purpose())
  }

  pub fn write_mode(&self) -> Result<crate::options::WriteMode> {
    self.check_disposed()?;
    Ok(self.inner.lock().unwrap().accessor.write_mode())
  }

  fn check_disposed(&self) -> Result<()> {
    if self.disposed.load(Ordering::Acquire) {
      Err(StoreError::Disposed)
    } else {
      Ok(())
    }
  }

  pub fn oldest_message_id(&self) -> Result<i64> {
    self.check_disposed()?;
    Ok(self.inner.lock().unwrap().accessor.oldest_message_id())
  }

  pub fn newest_message_id(&self) -> Result<i64> {
    self.check_disposed()?;
    Ok(self.inner.lock().unwrap().accessor.newest_message_id())
  }

  pub fn message_count(&self) -> Result<u64> {
    self.check_disposed()?;
    Ok(self.inner.lock().unwrap().accessor.message_count())
  }

  /// Reads up to `count` consecutive messages starting at `from_id`.
  pub fn read(&self, from_id: i64, count: u64) -> Result<Vec<LogMessage>> {
    self.check_disposed()?;
    self.inner.lock().unwrap().accessor.read(from_id, count)
  }

  /// Cancellable range read: `callback` is invoked for each message in id
  /// order; returning `false` stops early. Returns whether the read ran to
  /// completion.
  pub fn read_with(&self, from_id: i64, count: u64, callback: impl FnMut(LogMessage) -> bool) -> Result<bool> {
    self.check_disposed()?;
    self.inner.lock().unwrap().accessor.read_with(from_id, count, callback)
  }

  /// Fetches a single message by id through the paged cache.
  pub fn get_message(&self, id: i64) -> Result<Option<LogMessage>> {
    self.check_disposed()?;
    let mut inner = self.inner.lock().unwrap();
    let oldest = inner.accessor.oldest_message_id();
    let newest = inner.accessor.newest_message_id();
    let Inner { accessor, cache } = &mut *inner;
    cache.get_message(id, oldest, newest, &*accessor)
  }

  pub fn append(&self, msg: LogMessage) -> Result<i64> {
    let ids = self.append_many(std::slice::from_ref(&msg))?;
    Ok(ids[0])
  }

  pub fn append_many(&self, msgs: &[LogMessage]) -> Result<Vec<i64>> {
    self.check_disposed()?;
    if msgs.is_empty() {
      return Ok(Vec::new());
    }
    let written = {
      let mut inner = self.inner.lock().unwrap();
      let ids = inner.accessor.write(msgs)?;
      inner.cache.notify_messages_added(ids.len() as u64);
      ids
    };

    let count = self.message_count()?;
    self.changes.emit_added(msgs);
    self.changes.emit_count_changed(count);
    Ok(written)
  }

  /// Empties the message table; `messages_only = false` also empties the
  /// dictionary tables.
  pub fn clear(&self, messages_only: bool) -> Result<()> {
    self.check_disposed()?;
    {
      let mut inner = self.inner.lock().unwrap();
      inner.accessor.clear(messages_only)?;
      inner.cache.clear();
    }
    self.changes.emit_reset();
    self.changes.emit_count_changed(0);
    Ok(())
  }

  /// Removes a prefix of messages so that `count <= max_count` (when
  /// `max_count >= 0`) and every remaining message has
  /// `timestamp >= min_timestamp_utc` (when `Some`).
  pub fn prune(&self, max_count: Option<u64>, min_timestamp_utc: Option<DateTime<Utc>>) -> Result<u64> {
    self.check_disposed()?;
    let dropped = {
      let mut inner = self.inner.lock().unwrap();
      let dropped = inner
        .accessor
        .prune(max_count.map(|n| n as i64).unwrap_or(-1), min_timestamp_utc)?;
      if dropped > 0 {
        let oldest = inner.accessor.oldest_message_id();
        let newest = inner.accessor.newest_message_id();
        inner.cache.notify_messages_removed(oldest, newest);
      }
      dropped
    };
    if dropped > 0 {
      self.changes.emit_reset();
      self.changes.emit_count_changed(self.message_count()?);
    }
    Ok(dropped)
  }

  pub fn vacuum(&self) -> Result<()> {
    self.check_disposed()?;
    self.inner.lock().unwrap().accessor.vacuum()
  }

  /// Writes an independent, compacted copy of this store to `target_path`
  /// using `VACUUM INTO` — not cancellable, no progress reporting.
  pub fn save_snapshot(&self, target_path: impl AsRef<Path>) -> Result<()> {
    self.check_disposed()?;
    let inner = self.inner.lock().unwrap();
    crate::snapshot::vacuum_into(inner.accessor.connection(), target_path.as_ref())
  }

  /// Writes an independent copy page-by-page, reporting progress and
  /// honouring cancellation. See [`crate::snapshot::backup_with_progress`].
  pub fn save_snapshot_with_progress(
    &self,
    target_path: impl AsRef<Path>,
    progress: &mut dyn ProgressCallback,
  ) -> Result<()> {
    self.check_disposed()?;
    let inner = self.inner.lock().unwrap();
    crate::snapshot::backup_with_progress(inner.accessor.connection(), target_path.as_ref(), progress)
  }

  /// Serializes up to `count` messages starting at `from_id` as a JSON
  /// array of the same shape persisted on disk — for interop or
  /// human-readable inspection outside of a sqlite client, not a substitute
  /// for [`Self::save_snapshot`].
  pub fn export_json(&self, from_id: i64, count: u64) -> Result<String> {
    self.check_disposed()?;
    let msgs = self.read(from_id, count)?;
    serde_json::to_string(&msgs).map_err(|e| StoreError::json("export_json", e))
  }

  /// Parses a JSON array of messages (as produced by [`Self::export_json`])
  /// and appends them, returning their newly assigned ids.
  pub fn import_json(&self, json: &str) -> Result<Vec<i64>> {
    self.check_disposed()?;
    let msgs: Vec<LogMessage> = serde_json::from_str(json).map_err(|e| StoreError::json("import_json", e))?;
    self.append_many(&msgs)
  }

  pub fn get_names(&self, kind: NameKind, used_only: bool) -> Result<Vec<String>> {
    self.check_disposed()?;
    self.inner.lock().unwrap().accessor.get_names(kind, used_only)
  }

  pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) {
    self.changes.subscribe(observer);
  }

  pub fn as_collection(&self) -> ObservableCollection<'_> {
    ObservableCollection::new(self)
  }

  pub fn options(&self) -> &StoreOptions {
    &self.options
  }

  /// Closes all prepared commands and the connection, clears the cache,
  /// and — if the store was opened with `auto_delete`, best-effort deletes
  /// the file. Idempotent.
  pub fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    self.inner.lock().unwrap().cache.clear();
    if self.options.auto_delete {
      if let Err(err) = std::fs::remove_file(&self.path) {
        tracing::debug!(path = %self.path.display(), error = %err, "auto-delete on dispose failed (ignored)");
      }
    }
    tracing::debug!(path = %self.path.display(), "disposed log store");
  }
}

impl Drop for LogStore {
  fn drop(&mut self) {
    self.dispose();
  }
}
