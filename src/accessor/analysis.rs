//! Filter/scan-optimised schema (schema version 2): same logical columns as
//! the recording variant, plus additional indexes on the dictionary id
//! columns most commonly filtered on during offline analysis (level,
//! application), at the cost of slower inserts.

use std::path::Path;

use crate::accessor::base::Base;
use crate::error::Result;
use crate::message::LogMessage;
use crate::options::WriteMode;

pub struct AnalysisAccessor {
  pub(crate) base: Base,
}

impl AnalysisAccessor {
  pub fn open(path: &Path, mode: WriteMode, create: bool) -> Result<Self> {
    let (base, _version) = Base::open(path, crate::options::Purpose::Analysis, mode, create)?;
    let mut accessor = Self { base };
    accessor.ensure_schema()?;
    accessor.base.recompute_bounds()?;
    Ok(accessor)
  }

  fn ensure_schema(&self) -> Result<()> {
    self
      .base
      .conn
      .execute_batch(
        "CREATE TABLE IF NOT EXISTS messages( \
           id INTEGER PRIMARY KEY, \
           utc_ticks INTEGER NOT NULL, \
           offset_ticks INTEGER NOT NULL, \
           high_precision_timestamp INTEGER NOT NULL, \
           lost_message_count INTEGER NOT NULL, \
           process_id INTEGER NOT NULL, \
           process_name_id INTEGER NOT NULL, \
           application_name_id INTEGER NOT NULL, \
           writer_name_id INTEGER NOT NULL, \
           level_name_id INTEGER NOT NULL, \
           has_tags INTEGER NOT NULL, \
           text TEXT NOT NULL, \
           protected INTEGER NOT NULL \
         ); \
         CREATE INDEX IF NOT EXISTS messages_utc_ticks ON messages(utc_ticks); \
         CREATE INDEX IF NOT EXISTS messages_level ON messages(level_name_id); \
         CREATE INDEX IF NOT EXISTS messages_application_level ON messages(application_name_id, level_name_id);",
      )
      .map_err(|e| crate::error::StoreError::io("ensure_schema", e))
  }

  pub fn write_mode(&self) -> WriteMode {
    self.base.write_mode()
  }

  pub fn oldest_message_id(&self) -> i64 {
    self.base.oldest_message_id()
  }

  pub fn newest_message_id(&self) -> i64 {
    self.base.newest_message_id()
  }

  pub fn message_count(&self) -> u64 {
    self.base.message_count()
  }

  pub fn write(&mut self, msgs: &[LogMessage]) -> Result<Vec<i64>> {
    self.base.write(msgs)
  }

  pub fn read(&self, from_id: i64, count: u64) -> Result<Vec<LogMessage>> {
    self.base.read(from_id, count)
  }

  pub fn read_with(&self, from_id: i64, count: u64, callback: impl FnMut(LogMessage) -> bool) -> Result<bool> {
    self.base.read_with(from_id, count, callback)
  }

  pub fn clear(&mut self, messages_only: bool) -> Result<()> {
    self.base.clear(messages_only)
  }

  pub fn prune(&mut self, max_count: i64, min_timestamp_utc: Option<chrono::DateTime<chrono::Utc>>) -> Result<u64> {
    self.base.prune(max_count, min_timestamp_utc)
  }

  pub fn vacuum(&self) -> Result<()> {
    self.base.vacuum()
  }

  pub fn get_names(&self, kind: crate::accessor::base::NameKind, used_only: bool) -> Result<Vec<String>> {
    self.base.get_names(kind, used_only)
  }
}
