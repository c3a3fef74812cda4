//! # Database Accessor
//!
//! Owns the open database connection, applies durability-mode pragmas,
//! manages the dictionary tables, and routes every read/write through
//! prepared, parameterised commands inside explicit transactions.
//!
//! Per the redesign note in the spec's design notes ("runtime-dispatched
//! accessor variants... re-architect as a tagged sum"), [`Accessor`] is a
//! two-variant enum rather than a trait object: the façade matches on it
//! once per call instead of paying virtual dispatch on every row.

pub mod analysis;
pub mod base;
pub mod recording;

use std::path::Path;

use analysis::AnalysisAccessor;
use recording::RecordingAccessor;

use crate::error::Result;
use crate::message::LogMessage;
use crate::options::{Purpose, StoreOptions};

pub use base::NameKind;

/// Either schema variant, chosen on create by [`Purpose`] and on open by the
/// file's stored schema version.
pub enum Accessor {
  Recording(RecordingAccessor),
  Analysis(AnalysisAccessor),
}

impl Accessor {
  pub fn open(path: &Path, options: &StoreOptions, create: bool) -> Result<Self> {
    if path.exists() {
      let version = base::peek_schema_version(path)?;
      return match version {
        base::SCHEMA_VERSION_RECORDING => {
          Ok(Accessor::Recording(RecordingAccessor::open(path, options.write_mode, create)?))
        },
        base::SCHEMA_VERSION_ANALYSIS => {
          Ok(Accessor::Analysis(AnalysisAccessor::open(path, options.write_mode, create)?))
        },
        other => Err(crate::error::StoreError::UnsupportedVersion(other)),
      };
    }

    match options.purpose {
      Purpose::Recording => Ok(Accessor::Recording(RecordingAccessor::open(
        path,
        options.write_mode,
        create,
      )?)),
      Purpose::Analysis => Ok(Accessor::Analysis(AnalysisAccessor::open(path, options.write_mode, create)?)),
    }
  }

  pub fn purpose(&self) -> Purpose {
    match self {
      Accessor::Recording(_) => Purpose::Recording,
      Accessor::Analysis(_) => Purpose::Analysis,
    }
  }

  pub fn write_mode(&self) -> crate::options::WriteMode {
    match self {
      Accessor::Recording(a) => a.write_mode(),
      Accessor::Analysis(a) => a.write_mode(),
    }
  }

  pub fn oldest_message_id(&self) -> i64 {
    match self {
      Accessor::Recording(a) => a.oldest_message_id(),
      Accessor::Analysis(a) => a.oldest_message_id(),
    }
  }

  pub fn newest_message_id(&self) -> i64 {
    match self {
      Accessor::Recording(a) => a.newest_message_id(),
      Accessor::Analysis(a) => a.newest_message_id(),
    }
  }

  pub fn message_count(&self) -> u64 {
    match self {
      Accessor::Recording(a) => a.message_count(),
      Accessor::Analysis(a) => a.message_count(),
    }
  }

  pub fn write(&mut self, msgs: &[LogMessage]) -> Result<Vec<i64>> {
    match self {
      Accessor::Recording(a) => a.write(msgs),
      Accessor::Analysis(a) => a.write(msgs),
    }
  }

  pub fn read(&self, from_id: i64, count: u64) -> Result<Vec<LogMessage>> {
    match self {
      Accessor::Recording(a) => a.read(from_id, count),
      Accessor::Analysis(a) => a.read(from_id, count),
    }
  }

  pub fn read_with(&self, from_id: i64, count: u64, callback: impl FnMut(LogMessage) -> bool) -> Result<bool> {
    match self {
      Accessor::Recording(a) => a.read_with(from_id, count, callback),
      Accessor::Analysis(a) => a.read_with(from_id, count, callback),
    }
  }

  pub fn clear(&mut self, messages_only: bool) -> Result<()> {
    match self {
      Accessor::Recording(a) => a.clear(messages_only),
      Accessor::Analysis(a) => a.clear(messages_only),
    }
  }

  pub fn prune(&mut self, max_count: i64, min_timestamp_utc: Option<chrono::DateTime<chrono::Utc>>) -> Result<u64> {
    match self {
      Accessor::Recording(a) => a.prune(max_count, min_timestamp_utc),
      Accessor::Analysis(a) => a.prune(max_count, min_timestamp_utc),
    }
  }

  pub fn vacuum(&self) -> Result<()> {
    match self {
      Accessor::Recording(a) => a.vacuum(),
      Accessor::Analysis(a) => a.vacuum(),
    }
  }

  pub fn get_names(&self, kind: NameKind, used_only: bool) -> Result<Vec<String>> {
    match self {
      Accessor::Recording(a) => a.get_names(kind, used_only),
      Accessor::Analysis(a) => a.get_names(kind, used_only),
    }
  }

  pub(crate) fn connection(&self) -> &rusqlite::Connection {
    match self {
      Accessor::Recording(a) => &a.base.conn,
      Accessor::Analysis(a) => &a.base.conn,
    }
  }
}

impl crate::cache::RangeSource for Accessor {
  fn read_range(&self, from_id: i64, count: u64) -> Result<Vec<LogMessage>> {
    self.read(from_id, count)
  }
}
