#[cfg(test)]
mod __test__ {
  use std::sync::{Arc, Mutex};

  use chrono::{DateTime, FixedOffset, Utc};

  use crate::collection::{ChangeEvent, ChangeObserver};
  use crate::message::LogMessage;
  use crate::options::{Purpose, StoreOptions};
  use crate::store::LogStore;

  fn message_at(id_hint: i64, text: &str) -> LogMessage {
    LogMessage {
      id: id_hint,
      timestamp: now(),
      high_precision_timestamp: id_hint as u64,
      lost_message_count: 0,
      process_id: 1,
      process_name: Arc::from("proc"),
      application_name: Arc::from("app"),
      log_writer_name: Arc::from("writer"),
      log_level_name: Arc::from("Info"),
      tags: Default::default(),
      text: text.to_string(),
      protected: false,
    }
  }

  fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
  }

  #[derive(Default)]
  struct RecordingObserver {
    events: Mutex<Vec<ChangeEvent>>,
    counts: Mutex<Vec<u64>>,
  }

  impl ChangeObserver for RecordingObserver {
    fn on_change(&self, event: &ChangeEvent) {
      self.events.lock().unwrap().push(event.clone());
    }

    fn on_count_changed(&self, count: u64) {
      self.counts.lock().unwrap().push(count);
    }
  }

  #[test]
  fn append_emits_one_added_per_message_then_one_count_update() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().join("store.sqlite"), StoreOptions::new()).unwrap();
    let collection = store.as_collection();

    let observer = Arc::new(RecordingObserver::default());
    collection.subscribe(observer.clone());

    collection
      .append_many(&[message_at(0, "one"), message_at(0, "two")])
      .unwrap();

    let events = observer.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ChangeEvent::Added(m) if m.text == "one"));
    assert!(matches!(&events[1], ChangeEvent::Added(m) if m.text == "two"));
    drop(events);

    assert_eq!(*observer.counts.lock().unwrap(), vec![2]);
  }

  #[test]
  fn clear_emits_reset_and_zero_count() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().join("store.sqlite"), StoreOptions::new()).unwrap();
    let collection = store.as_collection();
    collection.append(message_at(0, "seed")).unwrap();

    let observer = Arc::new(RecordingObserver::default());
    collection.subscribe(observer.clone());
    collection.clear().unwrap();

    assert!(matches!(observer.events.lock().unwrap().last(), Some(ChangeEvent::Reset)));
    assert_eq!(*observer.counts.lock().unwrap(), vec![0]);
    assert_eq!(collection.len().unwrap(), 0);
  }

  #[test]
  fn get_contains_and_index_of_resolve_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().join("store.sqlite"), StoreOptions::new()).unwrap();
    let collection = store.as_collection();
    collection
      .append_many(&[message_at(0, "a"), message_at(0, "b"), message_at(0, "c")])
      .unwrap();

    assert_eq!(collection.get(1).unwrap().text, "b");
    assert_eq!(collection.get_u32(2).unwrap().text, "c");

    let middle = collection.get(1).unwrap();
    assert!(collection.contains(&middle).unwrap());
    assert_eq!(collection.index_of(&middle).unwrap(), Some(1));

    let mut not_present = middle.clone();
    not_present.id = 999;
    assert!(!collection.contains(&not_present).unwrap());
    assert_eq!(collection.index_of(&not_present).unwrap(), None);
  }

  #[test]
  fn copy_to_streams_messages_in_slices() {
    let src_dir = tempfile::tempdir().unwrap();
    let dst_dir = tempfile::tempdir().unwrap();
    let source = LogStore::open(src_dir.path().join("source.sqlite"), StoreOptions::new()).unwrap();
    let dest = LogStore::open(dst_dir.path().join("dest.sqlite"), StoreOptions::new().with_purpose(Purpose::Recording)).unwrap();

    let batch: Vec<_> = (0..10).map(|i| message_at(0, &format!("msg-{i}"))).collect();
    source.append_many(&batch).unwrap();

    let collection = source.as_collection();
    let copied = collection.copy_to(&dest, 0, 10, 3).unwrap();

    assert_eq!(copied, 10);
    assert_eq!(dest.message_count().unwrap(), 10);
    let dest_texts: Vec<_> = dest.read(0, 10).unwrap().into_iter().map(|m| m.text).collect();
    let src_texts: Vec<_> = batch.iter().map(|m| m.text.clone()).collect();
    assert_eq!(dest_texts, src_texts);
  }

  #[test]
  fn mutating_operations_are_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().join("store.sqlite"), StoreOptions::new()).unwrap();
    let collection = store.as_collection();
    collection.append(message_at(0, "seed")).unwrap();
    let msg = collection.get(0).unwrap();

    assert!(collection.insert(0, msg.clone()).is_err());
    assert!(collection.remove(&msg).is_err());
    assert!(collection.remove_at(0).is_err());
    assert!(collection.set(0, msg).is_err());
  }

  #[test]
  fn iter_enumerates_in_id_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().join("store.sqlite"), StoreOptions::new()).unwrap();
    let collection = store.as_collection();
    collection
      .append_many(&[message_at(0, "a"), message_at(0, "b"), message_at(0, "c")])
      .unwrap();

    let texts: Vec<_> = collection.iter().unwrap().map(|m| m.unwrap().text).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
  }
}
