//! The value type persisted and served by the log store.
//!
//! Mirrors the teacher crate's compact, string-interned event shape
//! (`ttlog::event::LogEvent`) but trades the fixed-width bit-packed layout
//! for the relational one this store's on-disk format requires: names are
//! interned `Arc<str>` handles shared with the in-memory name caches rather
//! than `u16` ids into a process-local pool, since ids here are assigned by
//! the backing dictionary tables, not by this crate.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// UTC ticks (100-ns units) since the fixed epoch used by the on-disk format.
pub const TICKS_EPOCH_UNIX_SECONDS: i64 = 0; // ticks are stored relative to the Unix epoch
const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_NANOSECOND: i64 = 100;

/// A single persisted log record.
///
/// Once written, every field is immutable except by a full `clear` of the
/// owning store (see [`crate::store::LogStore::clear`]). Two messages read
/// via any path for the same `id` compare equal field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
  /// Assigned by the store; dense, monotonic, never reused.
  pub id: i64,
  /// Wall-clock instant with timezone offset, millisecond precision preserved.
  pub timestamp: DateTime<FixedOffset>,
  /// Source-defined monotonic tick, opaque to the store.
  pub high_precision_timestamp: u64,
  /// Count of messages dropped before this one reached the store.
  pub lost_message_count: u32,
  pub process_id: i32,
  pub process_name: Arc<str>,
  pub application_name: Arc<str>,
  pub log_writer_name: Arc<str>,
  pub log_level_name: Arc<str>,
  /// Unordered; `BTreeSet` only for deterministic iteration and equality.
  pub tags: BTreeSet<Arc<str>>,
  pub text: String,
  /// Once set, the message may no longer be mutated in place by anything
  /// that holds a pooled handle to it (the store itself never mutates
  /// persisted messages regardless of this flag).
  pub protected: bool,
}

impl LogMessage {
  /// Converts UTC ticks + signed offset ticks (the on-disk representation)
  /// into the wall-clock instant a reader sees.
  pub fn from_ticks(utc_ticks: i64, offset_ticks: i64) -> DateTime<FixedOffset> {
    let total_nanos = utc_ticks.saturating_mul(TICKS_PER_NANOSECOND);
    let secs = total_nanos.div_euclid(1_000_000_000);
    let nanos = total_nanos.rem_euclid(1_000_000_000) as u32;
    let offset_secs = (offset_ticks / TICKS_PER_SECOND) as i32;
    let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    DateTime::from_naive_utc_and_offset(
      chrono::DateTime::from_timestamp(secs, nanos)
        .unwrap_or_default()
        .naive_utc(),
      offset,
    )
  }

  /// Converts a wall-clock instant into the on-disk `(utc_ticks, offset_ticks)` pair.
  pub fn to_ticks(timestamp: &DateTime<FixedOffset>) -> (i64, i64) {
    let utc_nanos = timestamp.timestamp() * 1_000_000_000 + timestamp.timestamp_subsec_nanos() as i64;
    let utc_ticks = utc_nanos / TICKS_PER_NANOSECOND;
    let offset_ticks = timestamp.offset().local_minus_utc() as i64 * TICKS_PER_SECOND;
    (utc_ticks, offset_ticks)
  }
}
