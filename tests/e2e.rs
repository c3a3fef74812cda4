use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use ttlog::{LogMessage, LogStore, Purpose, StoreOptions, WriteMode};

fn message_at(id_hint: i64, timestamp: DateTime<FixedOffset>, text: &str) -> LogMessage {
  LogMessage {
    id: id_hint,
    timestamp,
    high_precision_timestamp: id_hint as u64,
    lost_message_count: 0,
    process_id: 100,
    process_name: Arc::from("writer-proc"),
    application_name: Arc::from("demo-app"),
    log_writer_name: Arc::from("stdout"),
    log_level_name: Arc::from("Info"),
    tags: Default::default(),
    text: text.to_string(),
    protected: false,
  }
}

fn now() -> DateTime<FixedOffset> {
  Utc::now().into()
}

#[test]
fn fresh_store_append_and_read_back() {
  ttlog::init_tracing();
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::new().with_purpose(Purpose::Recording)).unwrap();

  store.append(message_at(0, now(), "hello")).unwrap();
  store.append(message_at(0, now(), "world")).unwrap();

  assert_eq!(store.oldest_message_id().unwrap(), 0);
  assert_eq!(store.newest_message_id().unwrap(), 1);
  assert_eq!(store.message_count().unwrap(), 2);

  let msgs = store.read(0, 2).unwrap();
  assert_eq!(msgs.iter().map(|m| m.id).collect::<Vec<_>>(), vec![0, 1]);
  assert_eq!(msgs.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), vec!["hello", "world"]);
}

#[test]
fn schema_variant_ignored_on_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  {
    let store = LogStore::open(&path, StoreOptions::new().with_purpose(Purpose::Recording)).unwrap();
    store.append(message_at(0, now(), "seed")).unwrap();
  }

  let store = LogStore::open(&path, StoreOptions::new().with_purpose(Purpose::Analysis)).unwrap();
  assert_eq!(store.purpose().unwrap(), Purpose::Recording);
}

#[test]
fn prune_by_count_keeps_newest_suffix() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::default()).unwrap();

  let msgs: Vec<_> = (0..1000).map(|i| message_at(0, now(), &format!("msg-{i}"))).collect();
  store.append_many(&msgs).unwrap();

  let dropped = store.prune(Some(100), None).unwrap();
  assert_eq!(dropped, 900);
  assert_eq!(store.message_count().unwrap(), 100);
  assert_eq!(store.oldest_message_id().unwrap(), 900);
  assert_eq!(store.newest_message_id().unwrap(), 999);

  let kept = store.read(900, 1).unwrap();
  assert_eq!(kept[0].text, "msg-900");
}

#[test]
fn prune_by_age_drops_messages_older_than_cutoff() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::default()).unwrap();

  let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
  for i in 0..10i64 {
    store.append(message_at(0, (base + Duration::seconds(i)).into(), &format!("t{i}"))).unwrap();
  }

  let cutoff = base + Duration::seconds(5);
  store.prune(None, Some(cutoff)).unwrap();

  let oldest = store.oldest_message_id().unwrap();
  assert_eq!(oldest, 5);
  let remaining = store.read(oldest, store.message_count().unwrap()).unwrap();
  for msg in &remaining {
    assert!(msg.timestamp >= cutoff);
  }
}

#[test]
fn cache_stays_coherent_across_random_access_and_survives_clear() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(
    &path,
    StoreOptions::new().with_max_cache_page_count(2).with_page_capacity(10),
  )
  .unwrap();

  let msgs: Vec<_> = (0..100).map(|i| message_at(0, now(), &format!("msg-{i}"))).collect();
  store.append_many(&msgs).unwrap();

  let mut rng_state = 0x2545F4914F6CDD1Du64;
  for _ in 0..1000 {
    rng_state ^= rng_state << 13;
    rng_state ^= rng_state >> 7;
    rng_state ^= rng_state << 17;
    let i = (rng_state % 100) as i64;
    let msg = store.get_message(i).unwrap().unwrap();
    assert_eq!(msg.id, i);
    assert_eq!(msg.text, format!("msg-{i}"));
  }

  store.clear(false).unwrap();
  assert_eq!(store.message_count().unwrap(), 0);

  let fresh: Vec<_> = (0..10).map(|i| message_at(0, now(), &format!("fresh-{i}"))).collect();
  store.append_many(&fresh).unwrap();
  let first = store.get_message(0).unwrap().unwrap();
  assert_eq!(first.text, "fresh-0");
}

#[test]
fn clear_messages_only_preserves_dictionaries() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::default()).unwrap();
  store.append(message_at(0, now(), "a")).unwrap();

  store.clear(true).unwrap();
  assert_eq!(store.message_count().unwrap(), 0);

  let names = store.get_names(ttlog::accessor::NameKind::Application, false).unwrap();
  assert_eq!(names, vec!["demo-app".to_string()]);

  // Next write after a clear starts back at id 0.
  let id = store.append(message_at(0, now(), "b")).unwrap();
  assert_eq!(id, 0);
}

#[test]
fn dense_monotonic_ids_across_several_writes() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::default()).unwrap();

  let mut all_ids = Vec::new();
  for batch in 0..5 {
    let msgs: Vec<_> = (0..7).map(|i| message_at(0, now(), &format!("b{batch}-{i}"))).collect();
    all_ids.extend(store.append_many(&msgs).unwrap());
  }

  let expected: Vec<i64> = (0..35).collect();
  assert_eq!(all_ids, expected);
}

#[test]
fn round_trip_preserves_fields_including_tags() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::default()).unwrap();

  let mut msg = message_at(0, now(), "tagged");
  msg.tags = ["alpha", "beta"].iter().map(|s| Arc::from(*s)).collect();
  msg.protected = true;
  let id = store.append(msg.clone()).unwrap();

  let read_back = store.read(id, 1).unwrap();
  assert_eq!(read_back.len(), 1);
  assert_eq!(read_back[0].text, msg.text);
  assert_eq!(read_back[0].tags.len(), 2);
  assert!(read_back[0].tags.iter().any(|t| t.as_ref() == "alpha"));
  assert!(read_back[0].tags.iter().any(|t| t.as_ref() == "beta"));
  assert!(read_back[0].protected, "protected flag must round-trip through storage");
}

#[test]
fn export_json_round_trips_through_import_json() {
  let src_dir = tempfile::tempdir().unwrap();
  let dst_dir = tempfile::tempdir().unwrap();
  let source = LogStore::open(src_dir.path().join("source.sqlite"), StoreOptions::default()).unwrap();
  let dest = LogStore::open(dst_dir.path().join("dest.sqlite"), StoreOptions::default()).unwrap();

  source.append(message_at(0, now(), "one")).unwrap();
  source.append(message_at(0, now(), "two")).unwrap();

  let json = source.export_json(0, 2).unwrap();
  let ids = dest.import_json(&json).unwrap();

  assert_eq!(ids.len(), 2);
  let texts: Vec<_> = dest.read(0, 2).unwrap().into_iter().map(|m| m.text).collect();
  assert_eq!(texts, vec!["one", "two"]);
}

#[test]
fn fast_write_mode_opens_and_accepts_writes() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.sqlite");
  let store = LogStore::open(&path, StoreOptions::new().with_write_mode(WriteMode::Fast)).unwrap();
  store.append(message_at(0, now(), "fast")).unwrap();
  assert_eq!(store.write_mode().unwrap(), WriteMode::Fast);
  assert_eq!(store.message_count().unwrap(), 1);
}
