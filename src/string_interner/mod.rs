//! # String Pool
//!
//! A process-wide mapping from string value to a canonical shared instance.
//! Interning a string twice returns the same `Arc<str>`, so repeated process
//! names, application names, writer names, level names and tags across many
//! messages share one allocation instead of each carrying its own `String`.
//!
//! Adapted from the teacher crate's per-category interner
//! (`ttlog::string_interner::StringInterner`): the thread-local fast-path
//! cache and double-checked-locking slow path are kept, but collapsed to a
//! single pool (`StringPool`) since, unlike the teacher's `u16` category ids,
//! this pool hands back `Arc<str>` values directly — the numeric ids a
//! message actually references come from the backing store's dictionary
//! tables (see [`crate::accessor`]), not from this pool.

mod __test__;

use std::{
  cell::UnsafeCell,
  collections::HashMap,
  sync::{Arc, RwLock},
};

/// Thread-local cache of recently interned (hash, value) pairs.
///
/// Round-robin eviction keeps this small and branch-predictable; a miss
/// falls through to the locked global pool.
struct LocalCache {
  entries: [(u64, Option<Arc<str>>); 16],
  counter: u8,
}

impl LocalCache {
  fn new() -> Self {
    Self {
      entries: Default::default(),
      counter: 0,
    }
  }

  fn get(&self, hash: u64) -> Option<Arc<str>> {
    self
      .entries
      .iter()
      .find(|(h, v)| *h == hash && v.is_some())
      .and_then(|(_, v)| v.clone())
  }

  fn put(&mut self, hash: u64, value: Arc<str>) {
    let idx = self.counter as usize % self.entries.len();
    self.entries[idx] = (hash, Some(value));
    self.counter = self.counter.wrapping_add(1);
  }
}

thread_local! {
    static LOCAL_CACHE: UnsafeCell<LocalCache> = UnsafeCell::new(LocalCache::new());
}

/// Process-wide string interner. Initialised lazily, never shrunk during a
/// run (see [`global`] for the process-wide singleton).
#[derive(Debug, Default)]
pub struct StringPool {
  lookup: RwLock<HashMap<u64, Arc<str>>>,
}

impl StringPool {
  pub fn new() -> Self {
    Self {
      lookup: RwLock::new(HashMap::new()),
    }
  }

  /// Interns `s`, returning the canonical shared instance. `equal(s, s')`
  /// and `hash(s) == hash(s')` hold for the value returned.
  #[inline]
  pub fn intern(&self, s: &str) -> Arc<str> {
    let hash = fast_hash(s);

    let cached = LOCAL_CACHE.with(|cache| {
      let cache_ptr = cache.get();
      unsafe { (*cache_ptr).get(hash) }
    });
    if let Some(value) = cached {
      return value;
    }

    let value = self.intern_slow(s, hash);

    LOCAL_CACHE.with(|cache| {
      let cache_ptr = cache.get();
      unsafe {
        (*cache_ptr).put(hash, value.clone());
      }
    });

    value
  }

  #[cold]
  fn intern_slow(&self, s: &str, hash: u64) -> Arc<str> {
    if let Ok(lookup) = self.lookup.read() {
      if let Some(value) = lookup.get(&hash) {
        return value.clone();
      }
    }

    let mut lookup = self.lookup.write().unwrap();
    if let Some(value) = lookup.get(&hash) {
      return value.clone();
    }

    let value: Arc<str> = Arc::from(s);
    lookup.insert(hash, value.clone());
    value
  }

  pub fn len(&self) -> usize {
    self.lookup.read().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Process-wide singleton. Tests that need isolation should construct a
/// fresh [`StringPool`] directly rather than relying on this instance.
static GLOBAL: std::sync::OnceLock<StringPool> = std::sync::OnceLock::new();

pub fn global() -> &'static StringPool {
  GLOBAL.get_or_init(StringPool::new)
}

/// FNV-1a, 8 bytes at a time. Lifted from the teacher interner's `fast_hash`.
#[inline]
fn fast_hash(s: &str) -> u64 {
  let mut hash = 0xcbf29ce484222325u64;
  let bytes = s.as_bytes();

  let chunks = bytes.chunks_exact(8);
  let remainder = chunks.remainder();

  for chunk in chunks {
    // SAFETY: chunk is exactly 8 bytes, guaranteed by chunks_exact(8).
    let chunk_u64 = unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const u64) };
    hash ^= chunk_u64;
    hash = hash.wrapping_mul(0x100000001b3);
  }

  for &byte in remainder {
    hash ^= byte as u64;
    hash = hash.wrapping_mul(0x100000001b3);
  }

  hash
}
