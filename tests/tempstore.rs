use ttlog::tempstore;
use ttlog::StoreOptions;

#[test]
fn auto_delete_removes_file_on_dispose() {
  let dir = tempfile::tempdir().unwrap();
  let path;
  {
    let store = tempstore::create_temporary(dir.path(), StoreOptions::new().with_auto_delete(true)).unwrap();
    path = store.path().to_path_buf();
    assert!(path.exists());
  }
  assert!(!path.exists());
}

#[test]
fn orphaned_auto_delete_file_is_reclaimed_on_next_creation() {
  let dir = tempfile::tempdir().unwrap();

  let store = tempstore::create_temporary(dir.path(), StoreOptions::new().with_auto_delete(true)).unwrap();
  let orphan_path = store.path().to_path_buf();
  // Simulate a crash: leak the store without running dispose.
  std::mem::forget(store);
  assert!(orphan_path.exists());

  let second = tempstore::create_temporary(dir.path(), StoreOptions::new().with_auto_delete(true)).unwrap();
  assert!(!orphan_path.exists());
  assert_ne!(second.path(), orphan_path);
}

#[test]
fn non_auto_delete_temp_file_survives_dispose_and_is_not_reclaimed() {
  let dir = tempfile::tempdir().unwrap();
  let store = tempstore::create_temporary(dir.path(), StoreOptions::default()).unwrap();
  let path = store.path().to_path_buf();
  drop(store);
  assert!(path.exists());

  tempstore::reclaim_orphaned(dir.path());
  assert!(path.exists());
}
