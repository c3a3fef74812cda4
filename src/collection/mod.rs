//! # Observable Ordered Collection
//!
//! Exposes a store as an ordered, random-access sequence with collection-
//! change notifications, for callers that want list-like semantics (len,
//! get, contains, enumerate) instead of the lower-level façade calls.
//!
//! Grounded on the teacher crate's listener trait
//! (`ttlog::listener::LogListener`) for the observer shape, generalized from
//! "handle one event" to the two-variant change stream described in the
//! spec's design notes (§9): "prefer a stream of change records
//! (add(range), reset)". The per-item `Added` events the spec's legacy
//! behaviour calls for are emitted by the [`ChangeStream`] adapter below.

mod __test__;

use std::sync::{Arc, Mutex};

use crate::error::{Result, StoreError};
use crate::message::LogMessage;
use crate::store::LogStore;

/// A single collection-change notification.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
  /// One newly appended message. Emitted once per message in a write, not
  /// batched — see the Open Question in the spec's design notes.
  Added(LogMessage),
  /// The collection was cleared or pruned; observers should treat any
  /// cached indices as invalid and re-query `len`/`get`.
  Reset,
}

/// Receives collection-change and property-change notifications.
pub trait ChangeObserver: Send + Sync {
  fn on_change(&self, event: &ChangeEvent);

  /// Fired after `on_change`, once per mutating call (not once per message),
  /// matching the spec's chosen semantics: "one `added` per message followed
  /// by one `count` update at the end".
  fn on_count_changed(&self, _count: u64) {}
}

/// Internal fan-out list, shared between a store and every collection view
/// built over it.
#[derive(Default)]
pub(crate) struct ChangeStream {
  observers: Mutex<Vec<Arc<dyn ChangeObserver>>>,
}

impl ChangeStream {
  pub(crate) fn subscribe(&self, observer: Arc<dyn ChangeObserver>) {
    self.observers.lock().unwrap().push(observer);
  }

  pub(crate) fn emit_added(&self, messages: &[LogMessage]) {
    let observers = self.observers.lock().unwrap();
    for msg in messages {
      for obs in observers.iter() {
        obs.on_change(&ChangeEvent::Added(msg.clone()));
      }
    }
  }

  pub(crate) fn emit_reset(&self) {
    let observers = self.observers.lock().unwrap();
    for obs in observers.iter() {
      obs.on_change(&ChangeEvent::Reset);
    }
  }

  pub(crate) fn emit_count_changed(&self, count: u64) {
    let observers = self.observers.lock().unwrap();
    for obs in observers.iter() {
      obs.on_count_changed(count);
    }
  }
}

/// The default slice size for [`ObservableCollection::copy_to`]; tunable via
/// [`crate::options::StoreOptions::copy_slice_size`].
pub const DEFAULT_COPY_SLICE_SIZE: usize = 1000;

/// A view over a [`LogStore`] as an ordered, indexable sequence.
pub struct ObservableCollection<'a> {
  store: &'a LogStore,
}

impl<'a> ObservableCollection<'a> {
  pub fn new(store: &'a LogStore) -> Self {
    Self { store }
  }

  pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) {
    self.store.subscribe(observer);
  }

  /// `newest - oldest + 1`, or 0 when the store is empty.
  pub fn len(&self) -> Result<u64> {
    self.store.message_count()
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Fetches the message at absolute position `index` (0-based): resolves
  /// to `id = oldest + index` and delegates to the cache.
  pub fn get(&self, index: u64) -> Result<LogMessage> {
    let oldest = self.store.oldest_message_id()?;
    if oldest < 0 {
      return Err(StoreError::ArgumentOutOfRange("collection is empty".into()));
    }
    let id = oldest + index as i64;
    self
      .store
      .get_message(id)?
      .ok_or_else(|| StoreError::ArgumentOutOfRange(format!("index {index} out of range")))
  }

  /// 32-bit-index variant; signals [`StoreError::StoreTooLarge`] if the
  /// range exceeds 32-bit capacity.
  pub fn get_u32(&self, index: u32) -> Result<LogMessage> {
    let count = self.len()?;
    if count > u32::MAX as u64 {
      return Err(StoreError::StoreTooLarge { count });
    }
    self.get(index as u64)
  }

  /// Exact match by id against the current range; does not compare fields.
  pub fn contains(&self, msg: &LogMessage) -> Result<bool> {
    let oldest = self.store.oldest_message_id()?;
    let newest = self.store.newest_message_id()?;
    Ok(oldest >= 0 && msg.id >= oldest && msg.id <= newest)
  }

  /// Returns the 0-based position of `msg.id`, or `None` if it is outside
  /// the current range.
  pub fn index_of(&self, msg: &LogMessage) -> Result<Option<u64>> {
    let oldest = self.store.oldest_message_id()?;
    if oldest < 0 || msg.id < oldest || msg.id > self.store.newest_message_id()? {
      return Ok(None);
    }
    Ok(Some((msg.id - oldest) as u64))
  }

  pub fn append(&self, msg: LogMessage) -> Result<i64> {
    self.store.append(msg)
  }

  pub fn append_many(&self, msgs: &[LogMessage]) -> Result<Vec<i64>> {
    self.store.append_many(msgs)
  }

  pub fn clear(&self) -> Result<()> {
    self.store.clear(false)
  }

  /// Streams `count` messages starting at `first_index` to `dest` in
  /// slices of `slice_size` (default [`DEFAULT_COPY_SLICE_SIZE`]) so that
  /// neither collection holds the entire span in memory at once.
  pub fn copy_to(&self, dest: &LogStore, first_index: u64, count: u64, slice_size: usize) -> Result<u64> {
    let oldest = self.store.oldest_message_id()?;
    if oldest < 0 {
      return Ok(0);
    }
    let mut remaining = count;
    let mut id = oldest + first_index as i64;
    let mut copied = 0u64;
    while remaining > 0 {
      let batch = remaining.min(slice_size as u64);
      let msgs = self.store.read(id, batch)?;
      if msgs.is_empty() {
        break;
      }
      let n = msgs.len() as u64;
      dest.append_many(&msgs)?;
      copied += n;
      id += n as i64;
      remaining -= n;
    }
    Ok(copied)
  }

  pub fn insert(&self, _index: u64, _msg: LogMessage) -> Result<()> {
    Err(StoreError::OperationNotSupported("insert"))
  }

  pub fn remove(&self, _msg: &LogMessage) -> Result<bool> {
    Err(StoreError::OperationNotSupported("remove"))
  }

  pub fn remove_at(&self, _index: u64) -> Result<()> {
    Err(StoreError::OperationNotSupported("remove_at"))
  }

  pub fn set(&self, _index: u64, _msg: LogMessage) -> Result<()> {
    Err(StoreError::OperationNotSupported("set"))
  }

  /// Enumerates messages in id order, fetched through the cache.
  pub fn iter(&self) -> Result<CollectionIter<'_>> {
    let oldest = self.store.oldest_message_id()?;
    let newest = self.store.newest_message_id()?;
    Ok(CollectionIter {
      store: self.store,
      next_id: oldest,
      last_id: newest,
    })
  }
}

pub struct CollectionIter<'a> {
  store: &'a LogStore,
  next_id: i64,
  last_id: i64,
}

impl<'a> Iterator for CollectionIter<'a> {
  type Item = Result<LogMessage>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.next_id < 0 || self.next_id > self.last_id {
      return None;
    }
    let id = self.next_id;
    self.next_id += 1;
    match self.store.get_message(id) {
      Ok(Some(msg)) => Some(Ok(msg)),
      Ok(None) => None,
      Err(err) => Some(Err(err)),
    }
  }
}
