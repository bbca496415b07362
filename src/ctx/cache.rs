use crossbeam_queue::SegQueue;
use im::HashMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::sync::Arc;
use std::sync::Weak;
use tracing::trace;

use crate::core::SnapshotCell;
use crate::core::Step;

// -----------------------------------------------------------------------------
// Unit
// -----------------------------------------------------------------------------

/// A dynamically defined unit: a name paired with its compiled image.
///
/// Units are kept alive by the code that holds them, never by the cache
/// that indexes them. Dropping the last handle retires the name back to
/// the cache so the stale index entry can be swept out.
pub struct Unit {
  name: Arc<str>,
  image: Box<[u8]>,
  retired: Arc<SegQueue<Arc<str>>>,
}

impl Unit {
  /// Returns the fully-qualified unit name.
  #[inline]
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the compiled image.
  #[inline]
  pub fn image(&self) -> &[u8] {
    &self.image
  }
}

impl Drop for Unit {
  fn drop(&mut self) {
    self.retired.push(Arc::clone(&self.name));
  }
}

impl Debug for Unit {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for Unit {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(
      f,
      "#<unit {name} ({size} bytes)>",
      name = self.name,
      size = self.image.len(),
    )
  }
}

// -----------------------------------------------------------------------------
// Unit Cache
// -----------------------------------------------------------------------------

/// Weak index of dynamically defined units, keyed by name.
///
/// The cache observes units without extending their lifetime. Lookups
/// resolve to a strong handle only while someone else still holds one;
/// entries whose unit has died are removed lazily, either during lookup
/// or during the sweep that precedes every registration.
pub struct UnitCache {
  entries: SnapshotCell<Arc<str>, Weak<Unit>>,
  retired: Arc<SegQueue<Arc<str>>>,
}

impl UnitCache {
  /// Creates a new, empty cache.
  pub(crate) fn new() -> Self {
    Self {
      entries: SnapshotCell::new(),
      retired: Arc::new(SegQueue::new()),
    }
  }

  /// Defines a unit and indexes it under `name`.
  ///
  /// Redefinition always wins: any prior entry under the same name is
  /// overwritten, whether its unit is alive or dead. The returned handle
  /// is the sole thing keeping the unit alive.
  pub fn register(&self, name: &str, image: impl Into<Box<[u8]>>) -> Arc<Unit> {
    self.sweep();

    let name: Arc<str> = Arc::from(name);
    let unit: Arc<Unit> = Arc::new(Unit {
      name: Arc::clone(&name),
      image: image.into(),
      retired: Arc::clone(&self.retired),
    });

    let observation: Weak<Unit> = Arc::downgrade(&unit);

    self.entries.swap(|map| {
      Step::Swap(map.update(Arc::clone(&name), Weak::clone(&observation)), ())
    });

    trace!(unit = %name, "unit registered");

    unit
  }

  /// Returns a strong handle to the unit indexed under `name`, if it is
  /// still alive.
  ///
  /// A dead entry found under `name` is removed in the same atomic step,
  /// so a concurrent redefinition can never be clobbered by the cleanup.
  pub fn lookup(&self, name: &str) -> Option<Arc<Unit>> {
    self.entries.swap(|map| match map.get(name) {
      None => Step::Keep(None),
      Some(observation) => match observation.upgrade() {
        Some(unit) => Step::Keep(Some(unit)),
        None => Step::Swap(map.without(name), None),
      },
    })
  }

  /// Drains the retirement queue, removing entries whose unit has died.
  ///
  /// A retired name whose current entry is live again was redefined in
  /// the meantime and is left alone.
  fn sweep(&self) {
    while let Some(name) = self.retired.pop() {
      let removed: bool = self.entries.swap(|map| match map.get(&*name) {
        Some(observation) if observation.strong_count() == 0 => {
          Step::Swap(map.without(&*name), true)
        }
        _ => Step::Keep(false),
      });

      if removed {
        trace!(unit = %name, "stale unit swept");
      }
    }
  }

  /// Returns the number of indexed entries, dead ones included.
  #[inline]
  pub fn len(&self) -> usize {
    self.entries.read(HashMap::len)
  }

  /// Returns `true` if no entries are indexed.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Drops the whole index and the pending retirement backlog.
  pub(crate) fn clear(&self) {
    self.entries.store(HashMap::new());

    while self.retired.pop().is_some() {}
  }
}

impl Debug for UnitCache {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("UnitCache")
      .field("size", &self.len())
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::Unit;
  use super::UnitCache;

  #[test]
  fn test_register_and_lookup() {
    let cache: UnitCache = UnitCache::new();
    let unit: Arc<Unit> = cache.register("app.main", vec![0xCA, 0xFE]);

    assert_eq!(unit.name(), "app.main");
    assert_eq!(unit.image(), &[0xCA, 0xFE]);

    let found: Arc<Unit> = cache.lookup("app.main").unwrap();

    assert!(Arc::ptr_eq(&found, &unit));
    assert!(cache.lookup("app.other").is_none());
  }

  #[test]
  fn test_redefinition_wins() {
    let cache: UnitCache = UnitCache::new();
    let old: Arc<Unit> = cache.register("app.main", vec![1]);
    let new: Arc<Unit> = cache.register("app.main", vec![2]);

    let found: Arc<Unit> = cache.lookup("app.main").unwrap();

    assert!(Arc::ptr_eq(&found, &new));
    assert!(!Arc::ptr_eq(&found, &old));
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_lookup_removes_dead_entry() {
    let cache: UnitCache = UnitCache::new();
    let unit: Arc<Unit> = cache.register("app.main", vec![1]);

    drop(unit);

    assert!(cache.lookup("app.main").is_none());
    assert!(cache.is_empty());
  }

  #[test]
  fn test_sweep_reclaims_retired_entries() {
    let cache: UnitCache = UnitCache::new();
    let unit: Arc<Unit> = cache.register("app.dead", vec![1]);

    drop(unit);

    // Registration under an unrelated name drains the retirement queue.
    let keep: Arc<Unit> = cache.register("app.live", vec![2]);

    assert_eq!(cache.len(), 1);
    assert!(cache.lookup("app.live").is_some());

    drop(keep);
  }

  #[test]
  fn test_sweep_spares_redefined_name() {
    let cache: UnitCache = UnitCache::new();
    let old: Arc<Unit> = cache.register("app.main", vec![1]);
    let new: Arc<Unit> = cache.register("app.main", vec![2]);

    drop(old);

    // The retirement of the old instance must not evict its successor.
    let other: Arc<Unit> = cache.register("app.other", vec![3]);

    assert!(Arc::ptr_eq(&cache.lookup("app.main").unwrap(), &new));

    drop(other);
  }

  #[test]
  fn test_clear() {
    let cache: UnitCache = UnitCache::new();
    let unit: Arc<Unit> = cache.register("app.main", vec![1]);

    cache.clear();

    assert!(cache.is_empty());
    assert!(cache.lookup("app.main").is_none());

    drop(unit);
  }
}
