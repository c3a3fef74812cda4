//! Shared connection handling, pragmas, identity check, and dictionary
//! tables common to both schema variants.
//!
//! Grounded on `estuary-flow`'s `crates/catalog/src/lib.rs` (`open_unchecked`
//! / `create` pair, `BEGIN`/`COMMIT` around schema bootstrap) for the shape
//! of a small sqlite-backed store opener, generalized with the pragma set,
//! identity tag, and dictionary tables this spec's on-disk format requires.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::options::{Purpose, WriteMode};

/// Fixed application identifier tag ("GPLG") written to new files and
/// checked on open.
pub const APPLICATION_ID: i32 = 0x47504C47u32 as i32;

pub const SCHEMA_VERSION_RECORDING: i64 = 1;
pub const SCHEMA_VERSION_ANALYSIS: i64 = 2;

/// One of the four name dictionaries, plus the tag-name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
  Process,
  Application,
  Writer,
  Level,
  Tag,
}

impl NameKind {
  fn table(self) -> &'static str {
    match self {
      NameKind::Process => "processes",
      NameKind::Application => "applications",
      NameKind::Writer => "writers",
      NameKind::Level => "levels",
      NameKind::Tag => "tags",
    }
  }

  const ALL: [NameKind; 5] = [
    NameKind::Process,
    NameKind::Application,
    NameKind::Writer,
    NameKind::Level,
    NameKind::Tag,
  ];
}

/// Owns the open database handle, the durability mode, and the in-memory
/// name caches. Shared by [`crate::accessor::recording::RecordingAccessor`]
/// and [`crate::accessor::analysis::AnalysisAccessor`].
pub struct Base {
  pub(crate) conn: Connection,
  pub(crate) write_mode: WriteMode,
  name_caches: HashMap<NameKind, HashMap<Arc<str>, i64>>,
  pub(crate) oldest: i64,
  pub(crate) newest: i64,
}

/// Reads `user_version` from an existing file without holding the
/// connection open, so the façade can decide which accessor variant to
/// construct before committing to one.
pub fn peek_schema_version(path: &Path) -> Result<i64> {
  let conn = Connection::open(path).map_err(|e| StoreError::io("open", e))?;
  let app_id: i32 = conn
    .query_row("PRAGMA application_id", [], |row| row.get(0))
    .map_err(|e| StoreError::io("open", e))?;
  if app_id != APPLICATION_ID {
    return Err(StoreError::InvalidFormat);
  }
  conn
    .query_row("PRAGMA user_version", [], |row| row.get(0))
    .map_err(|e| StoreError::io("open", e))
}

impl Base {
  /// Opens `path`, creating it with `purpose`'s schema if it doesn't exist
  /// (or `create` is required); validates identity and schema version on an
  /// existing file. Returns the opened base plus the schema version in
  /// effect (which may differ from the requested `purpose` if the file
  /// already existed).
  pub fn open(path: &Path, purpose: Purpose, mode: WriteMode, create: bool) -> Result<(Self, i64)> {
    let exists = path.exists();
    if !exists && !create {
      return Err(StoreError::io(
        "open",
        rusqlite::Error::SqliteFailure(
          rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
          Some(format!("no such file: {}", path.display())),
        ),
      ));
    }

    let conn = Connection::open(path).map_err(|e| StoreError::io("open", e))?;
    apply_durability_pragmas(&conn, mode)?;

    let schema_version = if exists {
      let app_id: i32 = conn
        .query_row("PRAGMA application_id", [], |row| row.get(0))
        .map_err(|e| StoreError::io("open", e))?;
      if app_id != APPLICATION_ID {
        return Err(StoreError::InvalidFormat);
      }
      let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StoreError::io("open", e))?;
      match version {
        SCHEMA_VERSION_RECORDING | SCHEMA_VERSION_ANALYSIS => version,
        other => return Err(StoreError::UnsupportedVersion(other)),
      }
    } else {
      let version = match purpose {
        Purpose::Recording => SCHEMA_VERSION_RECORDING,
        Purpose::Analysis => SCHEMA_VERSION_ANALYSIS,
      };
      conn
        .execute_batch(&format!(
          "PRAGMA application_id = {APPLICATION_ID};\n\
           PRAGMA encoding = 'UTF-8';\n\
           PRAGMA page_size = 65536;\n\
           PRAGMA user_version = {version};"
        ))
        .map_err(|e| StoreError::io("create", e))?;
      version
    };

    let base = Base {
      conn,
      write_mode: mode,
      name_caches: NameKind::ALL.iter().map(|k| (*k, HashMap::new())).collect(),
      oldest: -1,
      newest: -1,
    };
    base.ensure_dictionary_tables()?;
    tracing::debug!(path = %path.display(), schema_version, "opened log store");
    Ok((base, schema_version))
  }

  fn ensure_dictionary_tables(&self) -> Result<()> {
    self
      .conn
      .execute_batch(
        "CREATE TABLE IF NOT EXISTS processes(id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS processes_name ON processes(name);\n\
         CREATE TABLE IF NOT EXISTS applications(id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS applications_name ON applications(name);\n\
         CREATE TABLE IF NOT EXISTS writers(id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS writers_name ON writers(name);\n\
         CREATE TABLE IF NOT EXISTS levels(id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS levels_name ON levels(name);\n\
         CREATE TABLE IF NOT EXISTS tags(id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS tags_name ON tags(name);\n\
         CREATE TABLE IF NOT EXISTS message_tags(message_id INTEGER NOT NULL, tag_id INTEGER NOT NULL);\n\
         CREATE INDEX IF NOT EXISTS message_tags_message ON message_tags(message_id);",
      )
      .map_err(|e| StoreError::io("ensure_dictionary_tables", e))
  }

  /// Interns `name` into the given dictionary, returning its stable id.
  /// Cached in memory for subsequent writes; the cache is per-accessor and
  /// is discarded on a clear-all.
  pub fn add_name(&mut self, kind: NameKind, name: &str) -> Result<i64> {
    if let Some(id) = self.name_caches.get(&kind).and_then(|c| c.get(name)).copied() {
      return Ok(id);
    }

    let table = kind.table();
    let id: Option<i64> = self
      .conn
      .query_row(
        &format!(
          "INSERT INTO {table}(name) VALUES (?1) ON CONFLICT(name) DO NOTHING RETURNING id"
        ),
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StoreError::io("add_name", e))?;

    let id = match id {
      Some(id) => id,
      None => self
        .conn
        .query_row(&format!("SELECT id FROM {table} WHERE name = ?1"), params![name], |row| {
          row.get(0)
        })
        .map_err(|e| StoreError::io("add_name", e))?,
    };

    self
      .name_caches
      .get_mut(&kind)
      .unwrap()
      .insert(Arc::from(name), id);
    Ok(id)
  }

  pub fn get_names(&self, kind: NameKind, used_only: bool) -> Result<Vec<String>> {
    let table = kind.table();
    let sql = if used_only {
      match kind {
        NameKind::Tag => format!(
          "SELECT DISTINCT t.name FROM {table} t JOIN message_tags mt ON mt.tag_id = t.id ORDER BY t.name"
        ),
        _ => format!(
          "SELECT DISTINCT t.name FROM {table} t JOIN messages m ON m.{col}_id = t.id ORDER BY t.name",
          col = name_column(kind)
        ),
      }
    } else {
      format!("SELECT name FROM {table} ORDER BY name")
    };

    let mut stmt = self.conn.prepare(&sql).map_err(|e| StoreError::io("get_names", e))?;
    let rows = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| StoreError::io("get_names", e))?;
    rows
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| StoreError::io("get_names", e))
  }

  /// Empties the message table (and, if `messages_only` is false, the
  /// dictionary tables too). Discards the in-memory name caches on a
  /// clear-all, matching the spec's "clear-all discards it" contract.
  pub fn clear(&mut self, messages_only: bool) -> Result<()> {
    let tx = self.conn.transaction().map_err(|e| StoreError::io("clear", e))?;
    tx.execute("DELETE FROM messages", []).map_err(|e| StoreError::io("clear", e))?;
    tx.execute("DELETE FROM message_tags", [])
      .map_err(|e| StoreError::io("clear", e))?;
    if !messages_only {
      for kind in NameKind::ALL {
        tx.execute(&format!("DELETE FROM {}", kind.table()), [])
          .map_err(|e| StoreError::io("clear", e))?;
      }
    }
    tx.commit().map_err(|e| StoreError::io("clear", e))?;

    if !messages_only {
      for cache in self.name_caches.values_mut() {
        cache.clear();
      }
      tracing::warn!("cleared all messages and dictionaries");
    } else {
      tracing::warn!("cleared all messages (dictionaries preserved)");
    }

    self.oldest = -1;
    self.newest = -1;
    Ok(())
  }

  pub fn vacuum(&self) -> Result<()> {
    tracing::debug!("vacuuming log store in place");
    self.conn.execute_batch("VACUUM").map_err(|e| StoreError::io("vacuum", e))
  }

  pub fn write_mode(&self) -> WriteMode {
    self.write_mode
  }

  pub fn oldest_message_id(&self) -> i64 {
    self.oldest
  }

  pub fn newest_message_id(&self) -> i64 {
    self.newest
  }

  pub fn message_count(&self) -> u64 {
    if self.oldest < 0 || self.newest < self.oldest {
      0
    } else {
      (self.newest - self.oldest + 1) as u64
    }
  }

  /// Re-derives `{oldest, newest}` from the `messages` table. Called once
  /// after a schema variant has created its table, so a store opened
  /// against an existing file with prior data reports correct bounds.
  pub fn recompute_bounds(&mut self) -> Result<()> {
    let bounds: (Option<i64>, Option<i64>) = self
      .conn
      .query_row("SELECT MIN(id), MAX(id) FROM messages", [], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .map_err(|e| StoreError::io("recompute_bounds", e))?;
    self.oldest = bounds.0.unwrap_or(-1);
    self.newest = bounds.1.unwrap_or(-1);
    Ok(())
  }

  /// Writes `msgs` in one transaction, assigning consecutive ids starting at
  /// `newest + 1`. On any error, robust mode rolls the transaction back and
  /// leaves `{oldest, newest}` untouched; fast mode reverts the in-memory
  /// bounds on error even though disk content may be partially written.
  pub fn write(&mut self, msgs: &[crate::message::LogMessage]) -> Result<Vec<i64>> {
    if msgs.is_empty() {
      return Ok(Vec::new());
    }

    let prev_oldest = self.oldest;
    let prev_newest = self.newest;
    let mut next_id = self.newest + 1;
    let mut assigned = Vec::with_capacity(msgs.len());

    // Dictionary interning happens outside the message transaction: each
    // `add_name` is its own idempotent upsert, and doing it up front avoids
    // borrowing `self.conn` both for the transaction and for the interning
    // calls at once.
    let mut name_ids = Vec::with_capacity(msgs.len());
    for msg in msgs {
      name_ids.push((
        self.name_id_cached(NameKind::Process, &msg.process_name),
        self.name_id_cached(NameKind::Application, &msg.application_name),
        self.name_id_cached(NameKind::Writer, &msg.log_writer_name),
        self.name_id_cached(NameKind::Level, &msg.log_level_name),
        msg
          .tags
          .iter()
          .map(|tag| self.name_id_cached(NameKind::Tag, tag))
          .collect::<Vec<_>>(),
      ));
    }

    let result = (|| -> Result<()> {
      let tx = self.conn.transaction().map_err(|e| StoreError::io("write", e))?;
      {
        let mut insert_msg = tx
          .prepare(
            "INSERT INTO messages(id, utc_ticks, offset_ticks, high_precision_timestamp, \
             lost_message_count, process_id, process_name_id, application_name_id, \
             writer_name_id, level_name_id, has_tags, text, protected) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
          )
          .map_err(|e| StoreError::io("write", e))?;
        let mut insert_tag = tx
          .prepare("INSERT INTO message_tags(message_id, tag_id) VALUES (?1, ?2)")
          .map_err(|e| StoreError::io("write", e))?;

        for (msg, (process_id, application_id, writer_id, level_id, tag_ids)) in msgs.iter().zip(name_ids) {
          let id = next_id;
          let (utc_ticks, offset_ticks) = crate::message::LogMessage::to_ticks(&msg.timestamp);
          insert_msg
            .execute(params![
              id,
              utc_ticks,
              offset_ticks,
              msg.high_precision_timestamp as i64,
              msg.lost_message_count,
              msg.process_id,
              process_id,
              application_id,
              writer_id,
              level_id,
              !tag_ids.is_empty(),
              msg.text,
              msg.protected,
            ])
            .map_err(|e| StoreError::io("write", e))?;

          for tag_id in tag_ids {
            insert_tag
              .execute(params![id, tag_id])
              .map_err(|e| StoreError::io("write", e))?;
          }

          assigned.push(id);
          next_id += 1;
        }
      }
      tx.commit().map_err(|e| StoreError::io("write", e))?;
      Ok(())
    })();

    match result {
      Ok(()) => {
        self.newest = next_id - 1;
        if self.oldest < 0 {
          self.oldest = assigned[0];
        }
        Ok(assigned)
      },
      Err(err) => {
        self.oldest = prev_oldest;
        self.newest = prev_newest;
        tracing::error!(error = %err, "write failed, bounds reverted");
        Err(err)
      },
    }
  }

  /// Interns a name, returning its id. Falls back to `-1` on failure so the
  /// caller's transaction still runs and surfaces the real error on commit.
  fn name_id_cached(&mut self, kind: NameKind, name: &str) -> i64 {
    // add_name never fails in practice once the dictionary tables exist;
    // a failure here means the underlying connection itself is broken, in
    // which case the outer transaction's commit will surface the error.
    self.add_name(kind, name).unwrap_or(-1)
  }

  pub fn read(&self, from_id: i64, count: u64) -> Result<Vec<crate::message::LogMessage>> {
    self.validate_range(from_id)?;
    let mut out = Vec::new();
    self.read_with(from_id, count, |msg| {
      out.push(msg);
      true
    })?;
    Ok(out)
  }

  /// Range-reads starting at `from_id`, invoking `callback` for each
  /// message in id order. Returns `true` if the read ran to completion;
  /// `false` if the callback requested early termination.
  pub fn read_with(
    &self,
    from_id: i64,
    count: u64,
    mut callback: impl FnMut(crate::message::LogMessage) -> bool,
  ) -> Result<bool> {
    self.validate_range(from_id)?;

    let mut stmt = self
      .conn
      .prepare(
        "SELECT m.id, m.utc_ticks, m.offset_ticks, m.high_precision_timestamp, \
         m.lost_message_count, m.process_id, p.name, a.name, w.name, l.name, m.has_tags, m.text, \
         m.protected \
         FROM messages m \
         JOIN processes p ON p.id = m.process_name_id \
         JOIN applications a ON a.id = m.application_name_id \
         JOIN writers w ON w.id = m.writer_name_id \
         JOIN levels l ON l.id = m.level_name_id \
         WHERE m.id >= ?1 ORDER BY m.id LIMIT ?2",
      )
      .map_err(|e| StoreError::io("read", e))?;

    let rows = stmt
      .query_map(params![from_id, count as i64], |row| {
        let id: i64 = row.get(0)?;
        let utc_ticks: i64 = row.get(1)?;
        let offset_ticks: i64 = row.get(2)?;
        let high_precision_timestamp: i64 = row.get(3)?;
        let lost_message_count: u32 = row.get(4)?;
        let process_id: i32 = row.get(5)?;
        let process_name: String = row.get(6)?;
        let application_name: String = row.get(7)?;
        let writer_name: String = row.get(8)?;
        let level_name: String = row.get(9)?;
        let has_tags: bool = row.get(10)?;
        let text: String = row.get(11)?;
        let protected: bool = row.get(12)?;
        Ok((
          id,
          utc_ticks,
          offset_ticks,
          high_precision_timestamp,
          lost_message_count,
          process_id,
          process_name,
          application_name,
          writer_name,
          level_name,
          has_tags,
          text,
          protected,
        ))
      })
      .map_err(|e| StoreError::io("read", e))?;

    for row in rows {
      let (
        id,
        utc_ticks,
        offset_ticks,
        high_precision_timestamp,
        lost_message_count,
        process_id,
        process_name,
        application_name,
        writer_name,
        level_name,
        has_tags,
        text,
        protected,
      ) = row.map_err(|e| StoreError::io("read", e))?;

      let tags = if has_tags {
        self.read_tags(id)?
      } else {
        Default::default()
      };

      let pool = crate::string_interner::global();
      let msg = crate::message::LogMessage {
        id,
        timestamp: crate::message::LogMessage::from_ticks(utc_ticks, offset_ticks),
        high_precision_timestamp: high_precision_timestamp as u64,
        lost_message_count,
        process_id,
        process_name: pool.intern(&process_name),
        application_name: pool.intern(&application_name),
        log_writer_name: pool.intern(&writer_name),
        log_level_name: pool.intern(&level_name),
        tags,
        text,
        protected,
      };

      if !callback(msg) {
        return Ok(false);
      }
    }
    Ok(true)
  }

  fn read_tags(&self, message_id: i64) -> Result<std::collections::BTreeSet<Arc<str>>> {
    let mut stmt = self
      .conn
      .prepare(
        "SELECT t.name FROM message_tags mt JOIN tags t ON t.id = mt.tag_id WHERE mt.message_id = ?1",
      )
      .map_err(|e| StoreError::io("read_tags", e))?;
    let pool = crate::string_interner::global();
    let rows = stmt
      .query_map(params![message_id], |row| row.get::<_, String>(0))
      .map_err(|e| StoreError::io("read_tags", e))?;
    rows
      .map(|r| r.map(|s| pool.intern(&s)))
      .collect::<std::result::Result<_, _>>()
      .map_err(|e| StoreError::io("read_tags", e))
  }

  fn validate_range(&self, from_id: i64) -> Result<()> {
    if self.oldest < 0 || from_id < self.oldest || from_id > self.newest {
      return Err(StoreError::ArgumentOutOfRange(format!(
        "from_id {from_id} outside [{}, {}]",
        self.oldest, self.newest
      )));
    }
    Ok(())
  }

  /// Removes a prefix of ids such that, after pruning, `count <= max_count`
  /// (when `max_count >= 0`) and every remaining message has
  /// `timestamp >= min_timestamp_utc` (when set). Returns the number of
  /// pruned messages.
  pub fn prune(&mut self, max_count: i64, min_timestamp_utc: Option<chrono::DateTime<chrono::Utc>>) -> Result<u64> {
    if self.oldest < 0 {
      return Ok(0);
    }

    let mut cut = -1i64;

    if let Some(min_ts) = min_timestamp_utc {
      let ticks = min_ts.timestamp() * 10_000_000 + (min_ts.timestamp_subsec_nanos() as i64) / 100;
      let id_by_time: Option<i64> = self
        .conn
        .query_row(
          "SELECT MAX(id) FROM messages WHERE utc_ticks < ?1",
          params![ticks],
          |row| row.get(0),
        )
        .map_err(|e| StoreError::io("prune", e))?;
      if let Some(id) = id_by_time {
        cut = cut.max(id);
      }
    }

    if max_count >= 0 {
      let total = self.message_count() as i64;
      if total > max_count {
        let drop_count = total - max_count;
        let id_by_count = self.oldest + drop_count - 1;
        cut = cut.max(id_by_count);
      }
    }

    if cut < self.oldest {
      return Ok(0);
    }
    let cut = cut.min(self.newest);
    let dropped = (cut - self.oldest + 1) as u64;

    let tx = self.conn.transaction().map_err(|e| StoreError::io("prune", e))?;
    tx.execute(
      "DELETE FROM message_tags WHERE message_id IN (SELECT id FROM messages WHERE id <= ?1)",
      params![cut],
    )
    .map_err(|e| StoreError::io("prune", e))?;
    tx.execute("DELETE FROM messages WHERE id <= ?1", params![cut])
      .map_err(|e| StoreError::io("prune", e))?;
    tx.commit().map_err(|e| StoreError::io("prune", e))?;

    self.recompute_bounds()?;
    tracing::warn!(dropped, "pruned messages");
    Ok(dropped)
  }
}

fn name_column(kind: NameKind) -> &'static str {
  match kind {
    NameKind::Process => "process_name",
    NameKind::Application => "application_name",
    NameKind::Writer => "writer_name",
    NameKind::Level => "level_name",
    NameKind::Tag => unreachable!("tags use message_tags, not a messages column"),
  }
}

fn apply_durability_pragmas(conn: &Connection, mode: WriteMode) -> Result<()> {
  if mode == WriteMode::Fast {
    tracing::warn!("opening log store in fast mode: crash safety is not guaranteed");
  }

  // `journal_mode` and `locking_mode` both return the resulting value as a
  // row even when setting, so they can't go through `execute_batch`
  // alongside the row-less pragmas.
  let journal_mode = if mode == WriteMode::Robust { "WAL" } else { "OFF" };
  conn
    .query_row(&format!("PRAGMA journal_mode = {journal_mode}"), [], |row| row.get::<_, String>(0))
    .map_err(|e| StoreError::io("apply_durability_pragmas", e))?;
  conn
    .query_row("PRAGMA locking_mode = EXCLUSIVE", [], |row| row.get::<_, String>(0))
    .map_err(|e| StoreError::io("apply_durability_pragmas", e))?;

  let synchronous = if mode == WriteMode::Robust { "NORMAL" } else { "OFF" };
  conn
    .execute_batch(&format!("PRAGMA synchronous = {synchronous};\nPRAGMA temp_store = MEMORY;"))
    .map_err(|e| StoreError::io("apply_durability_pragmas", e))
}
