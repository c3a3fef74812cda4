#[cfg(test)]
mod __test__ {
  use crate::cache::{PagedCache, RangeSource};
  use crate::error::Result;
  use crate::message::LogMessage;
  use chrono::Utc;
  use std::sync::Arc;

  struct FakeStore {
    messages: Vec<LogMessage>,
  }

  impl FakeStore {
    fn new(count: i64) -> Self {
      let messages = (0..count)
        .map(|id| LogMessage {
          id,
          timestamp: Utc::now().into(),
          high_precision_timestamp: id as u64,
          lost_message_count: 0,
          process_id: 1,
          process_name: Arc::from("proc"),
          application_name: Arc::from("app"),
          log_writer_name: Arc::from("writer"),
          log_level_name: Arc::from("Info"),
          tags: Default::default(),
          text: format!("message {id}"),
          protected: false,
        })
        .collect();
      Self { messages }
    }
  }

  impl RangeSource for FakeStore {
    fn read_range(&self, from_id: i64, count: u64) -> Result<Vec<LogMessage>> {
      Ok(
        self
          .messages
          .iter()
          .filter(|m| m.id >= from_id)
          .take(count as usize)
          .cloned()
          .collect(),
      )
    }
  }

  #[test]
  fn fetches_through_on_miss_and_caches() {
    let store = FakeStore::new(100);
    let mut cache = PagedCache::new(2, 10);

    let msg = cache.get_message(5, 0, 99, &store).unwrap().unwrap();
    assert_eq!(msg.id, 5);
    assert_eq!(cache.resident_page_count(), 1);
  }

  #[test]
  fn evicts_tail_page_when_full() {
    let store = FakeStore::new(100);
    let mut cache = PagedCache::new(2, 10);

    cache.get_message(5, 0, 99, &store).unwrap();
    cache.get_message(25, 0, 99, &store).unwrap();
    cache.get_message(45, 0, 99, &store).unwrap();
    assert_eq!(cache.resident_page_count(), 2);
  }

  #[test]
  fn coherent_across_random_access() {
    let store = FakeStore::new(100);
    let mut cache = PagedCache::new(2, 10);
    for i in [5, 17, 5, 42, 99, 0, 17] {
      let msg = cache.get_message(i, 0, 99, &store).unwrap().unwrap();
      assert_eq!(msg.id, i);
      assert_eq!(msg.text, format!("message {i}"));
    }
  }

  #[test]
  fn drops_pages_outside_new_bounds_on_removal_notification() {
    let store = FakeStore::new(100);
    let mut cache = PagedCache::new(4, 10);
    cache.get_message(5, 0, 99, &store).unwrap();
    cache.get_message(95, 0, 99, &store).unwrap();
    assert_eq!(cache.resident_page_count(), 2);

    cache.notify_messages_removed(90, 99);
    assert_eq!(cache.resident_page_count(), 1);
  }

  #[test]
  fn changing_page_capacity_invalidates_cache() {
    let store = FakeStore::new(100);
    let mut cache = PagedCache::new(4, 10);
    cache.get_message(5, 0, 99, &store).unwrap();
    assert_eq!(cache.resident_page_count(), 1);

    cache.set_page_capacity(20);
    assert_eq!(cache.resident_page_count(), 0);
  }
}
