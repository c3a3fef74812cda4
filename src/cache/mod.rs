//! # Paged LRU Cache
//!
//! Answers `get_message(id)` with O(1) expected cost after warm-up,
//! minimising backing-store reads. Not internally locked — per the spec's
//! concurrency model (§5), the façade holds the single mutex that
//! serialises access to a store, and the cache inherits that discipline.
//!
//! Adapted from the teacher crate's ring buffer
//! (`ttlog::lf_buffer::LockFreeRingBuffer`, "overwrite oldest on full, reuse
//! storage") reworked from a single fixed-capacity queue into an
//! MRU-ordered list of fixed-capacity pages, each covering one aligned
//! window of message ids.

mod __test__;

use std::collections::VecDeque;

use crate::error::Result;
use crate::message::LogMessage;

/// A contiguous slice of messages starting at a known id, possibly only
/// partially filled (the trailing portion was never fetched).
#[derive(Debug, Clone)]
pub struct CachePage {
  pub first_message_id: i64,
  pub messages: Vec<LogMessage>,
  pub capacity: usize,
}

impl CachePage {
  fn new(first_message_id: i64, capacity: usize) -> Self {
    Self {
      first_message_id,
      messages: Vec::with_capacity(capacity),
      capacity,
    }
  }

  fn last_message_id(&self) -> i64 {
    self.first_message_id + self.messages.len() as i64 - 1
  }

  fn contains(&self, id: i64) -> bool {
        id >= self.first_message_id && id < self.first_message_id + self.capacity as i64
  }

  /// Whether the page fully covers up to `id` (no fetch of a missing tail
  /// required).
  fn has_loaded(&self, id: i64) -> bool {
    id <= self.last_message_id()
  }

  /// Whether every message in this page's range is outside `[oldest, newest]`.
  fn entirely_stale(&self, oldest: i64, newest: i64) -> bool {
    self.first_message_id > newest || self.first_message_id + self.capacity as i64 - 1 < oldest
  }
}

/// Anything the cache can range-read from on a miss. Implemented by
/// [`crate::accessor::Accessor`]; kept as a trait so the cache has no direct
/// dependency on the accessor's concrete type.
pub trait RangeSource {
  fn read_range(&self, from_id: i64, count: u64) -> Result<Vec<LogMessage>>;
}

/// Ordered list of pages, most-recently-used at the front.
pub struct PagedCache {
  pages: VecDeque<CachePage>,
  max_page_count: usize,
  page_capacity: usize,
  change_counter: u64,
}

impl PagedCache {
  pub fn new(max_page_count: usize, page_capacity: usize) -> Self {
    assert!(page_capacity > 0, "page_capacity must be greater than 0");
    Self {
      pages: VecDeque::with_capacity(max_page_count),
      max_page_count,
      page_capacity,
      change_counter: 0,
    }
  }

  pub fn page_capacity(&self) -> usize {
    self.page_capacity
  }

  pub fn change_counter(&self) -> u64 {
    self.change_counter
  }

  fn aligned_first_id(&self, id: i64, oldest: i64) -> i64 {
    oldest + self.page_capacity as i64 * ((id - oldest) / self.page_capacity as i64)
  }

  /// Fetches the message with the given id, reading through `source` on a
  /// miss or a partial hit. `oldest`/`newest` are the store's current
  /// bounds, used to align page boundaries.
  pub fn get_message(
    &mut self,
    id: i64,
    oldest: i64,
    newest: i64,
    source: &dyn RangeSource,
  ) -> Result<Option<LogMessage>> {
    if id < oldest || id > newest {
      return Ok(None);
    }

    if let Some(pos) = self.pages.iter().position(|p| p.contains(id)) {
      if self.pages[pos].has_loaded(id) {
        self.move_to_front(pos);
        return Ok(self.pages[0].messages.get((id - self.pages[0].first_message_id) as usize).cloned());
      }

      // Partially filled: fetch just the missing tail.
      let page_first = self.pages[pos].first_message_id;
      let have = self.pages[pos].messages.len() as i64;
      let want = (id - page_first + 1).min(self.page_capacity as i64);
      let missing = (want - have).max(0) as u64;
      if missing > 0 {
        let tail = source.read_range(page_first + have, missing)?;
        self.pages[pos].messages.extend(tail);
      }
      self.move_to_front(pos);
      let front = &self.pages[0];
      return Ok(front.messages.get((id - front.first_message_id) as usize).cloned());
    }

    // Miss.
    let first_id = self.aligned_first_id(id, oldest);
    let count = self.page_capacity as u64;
    let rows = source.read_range(first_id, count)?;
    let mut page = if self.pages.len() >= self.max_page_count {
      let mut recycled = self.pages.pop_back().expect("cache full implies non-empty");
      recycled.first_message_id = first_id;
      recycled.messages.clear();
      recycled
    } else {
      CachePage::new(first_id, self.page_capacity)
    };
    page.messages = rows;
    let value = page.messages.get((id - first_id) as usize).cloned();
    self.pages.push_front(page);
    Ok(value)
  }

  fn move_to_front(&mut self, pos: usize) {
    if pos != 0 {
      let page = self.pages.remove(pos).expect("pos was just found");
      self.pages.push_front(page);
    }
  }

  /// The newest `n` ids are now available. Pages are not eagerly extended
  /// (existing hot pages keep their locality); only the change counter
  /// advances.
  pub fn notify_messages_added(&mut self, _n: u64) {
    self.change_counter += 1;
  }

  /// Drops every page whose range is not fully within `[oldest, newest]`.
  pub fn notify_messages_removed(&mut self, oldest: i64, newest: i64) {
    self.pages.retain(|p| !p.entirely_stale(oldest, newest));
    self.change_counter += 1;
  }

  /// Changing the page capacity invalidates the whole cache: existing pages
  /// would otherwise overlap under the new alignment.
  pub fn set_page_capacity(&mut self, page_capacity: usize) {
    assert!(page_capacity > 0, "page_capacity must be greater than 0");
    self.page_capacity = page_capacity;
    self.pages.clear();
    self.change_counter += 1;
  }

  pub fn clear(&mut self) {
    self.pages.clear();
    self.change_counter += 1;
  }

  pub fn resident_page_count(&self) -> usize {
    self.pages.len()
  }
}
