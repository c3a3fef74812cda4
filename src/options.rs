//! Store configuration surface.
//!
//! This is a plain, in-memory configuration struct — the ini-file loader and
//! its file-watcher reload logic live outside this crate and construct one of
//! these before opening a store.

/// Schema variant selected on creation; ignored when opening an existing
/// file (the stored `user_version` wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
  /// Append-optimised schema (schema version 1).
  Recording,
  /// Filter/scan-optimised schema (schema version 2).
  Analysis,
}

/// Durability/performance tradeoff for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
  /// Synchronous=NORMAL, WAL journal, exclusive locking. Crash-safe: a
  /// failed transaction rolls back and previously committed writes survive.
  Robust,
  /// Synchronous=OFF, no journal, exclusive locking. Faster, but the file
  /// may become unreadable after a crash; rollback is not guaranteed.
  Fast,
}

/// Configuration accepted when opening or creating a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
  pub purpose: Purpose,
  pub write_mode: WriteMode,
  pub max_cache_page_count: usize,
  pub page_capacity: usize,
  pub copy_slice_size: usize,
  pub auto_delete: bool,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      purpose: Purpose::Recording,
      write_mode: WriteMode::Robust,
      max_cache_page_count: 20,
      page_capacity: 100,
      copy_slice_size: 1000,
      auto_delete: false,
    }
  }
}

impl StoreOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_purpose(mut self, purpose: Purpose) -> Self {
    self.purpose = purpose;
    self
  }

  pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
    self.write_mode = write_mode;
    self
  }

  pub fn with_max_cache_page_count(mut self, count: usize) -> Self {
    self.max_cache_page_count = count;
    self
  }

  pub fn with_page_capacity(mut self, capacity: usize) -> Self {
    self.page_capacity = capacity;
    self
  }

  pub fn with_copy_slice_size(mut self, size: usize) -> Self {
    self.copy_slice_size = size;
    self
  }

  pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
    self.auto_delete = auto_delete;
    self
  }
}
