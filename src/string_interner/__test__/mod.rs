#[cfg(test)]
mod __test__ {
  use crate::string_interner::StringPool;

  #[test]
  fn interns_repeated_strings_to_the_same_instance() {
    let pool = StringPool::new();
    let a = pool.intern("database");
    let b = pool.intern("database");
    assert!(std::sync::Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn distinguishes_different_strings() {
    let pool = StringPool::new();
    let a = pool.intern("writer-a");
    let b = pool.intern("writer-b");
    assert_ne!(a.as_ref(), b.as_ref());
  }

  #[test]
  fn pool_grows_by_distinct_value() {
    let pool = StringPool::new();
    pool.intern("one");
    pool.intern("two");
    pool.intern("one");
    assert_eq!(pool.len(), 2);
  }
}
