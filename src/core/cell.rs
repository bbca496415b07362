//! Lock-free snapshot cell for persistent map tables.
//!
//! This module provides [`SnapshotCell`], the one reusable optimistic
//! update primitive every table in this core is built on. A cell holds an
//! immutable, structurally-shared [`im::HashMap`] behind an atomic pointer
//! and mutates it with the canonical read/compute/CAS/retry loop.
//!
//! # Linearizability
//!
//! Every reader observes a fully-formed snapshot and every writer installs
//! a fully-formed successor; no partially-updated table is ever visible.
//! Superseded snapshots are reclaimed through epoch-based deferral once
//! all in-flight readers have unpinned.

use crossbeam_epoch as epoch;
use crossbeam_epoch::Atomic;
use crossbeam_epoch::Guard;
use crossbeam_epoch::Owned;
use crossbeam_epoch::Shared;
use im::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::hash::Hash;
use std::sync::atomic::Ordering::AcqRel;
use std::sync::atomic::Ordering::Acquire;
use std::sync::atomic::Ordering::Relaxed;

// -----------------------------------------------------------------------------
// Step
// -----------------------------------------------------------------------------

/// Outcome of one optimistic update attempt.
///
/// Returned by the closure passed to [`SnapshotCell::swap`] to decide
/// whether the current snapshot should be replaced.
pub(crate) enum Step<M, R> {
  /// Finish without modifying the table.
  Keep(R),
  /// Attempt to install the given successor snapshot.
  Swap(M, R),
}

// -----------------------------------------------------------------------------
// Snapshot Cell
// -----------------------------------------------------------------------------

/// Atomic cell holding an immutable, structurally-shared map.
///
/// All mutation goes through [`swap`], which retries until its
/// compare-and-swap succeeds. Progress is wait-free under bounded
/// contention: an attempt only fails when another writer succeeded, so
/// some writer always makes progress and no mutual-exclusion lock is
/// taken on any path.
///
/// [`swap`]: Self::swap
#[repr(transparent)]
pub(crate) struct SnapshotCell<K, V>
where
  K: Clone + Hash + Eq,
  V: Clone,
{
  inner: Atomic<HashMap<K, V>>,
}

impl<K, V> SnapshotCell<K, V>
where
  K: Clone + Hash + Eq,
  V: Clone,
{
  /// Creates a new cell holding an empty map.
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      inner: Atomic::new(HashMap::new()),
    }
  }

  /// Performs an operation on the current snapshot with zero-copy access.
  ///
  /// The callback receives a reference to the map that is guaranteed to
  /// remain valid for the duration of the callback. Concurrent writers
  /// may install successors in the meantime; the observed snapshot stays
  /// consistent regardless.
  #[inline]
  pub(crate) fn read<F, R>(&self, f: F) -> R
  where
    F: FnOnce(&HashMap<K, V>) -> R,
  {
    let guard: Guard = epoch::pin();
    let shared: Shared<'_, HashMap<K, V>> = self.inner.load(Acquire, &guard);

    // SAFETY: The cell is initialized with a non-null map and every
    // successful swap installs another non-null map; the guard keeps the
    // snapshot alive for the duration of the reference.
    f(unsafe { shared.deref() })
  }

  /// Returns an owned snapshot of the current map.
  ///
  /// Cloning a structurally-shared map is O(1); the returned value stays
  /// consistent even as concurrent writers install successors.
  #[inline]
  pub(crate) fn snapshot(&self) -> HashMap<K, V> {
    self.read(HashMap::clone)
  }

  /// Runs the optimistic read/compute/CAS/retry loop.
  ///
  /// The closure receives the current snapshot and decides the outcome:
  /// [`Step::Keep`] finishes without modifying the table, [`Step::Swap`]
  /// attempts to install the given successor. On CAS failure the loop
  /// re-reads and invokes the closure again, so the closure must be
  /// prepared to observe any intermediate state.
  pub(crate) fn swap<F, R>(&self, mut f: F) -> R
  where
    F: FnMut(&HashMap<K, V>) -> Step<HashMap<K, V>, R>,
  {
    let guard: Guard = epoch::pin();

    loop {
      let shared: Shared<'_, HashMap<K, V>> = self.inner.load(Acquire, &guard);

      // SAFETY: See `read` - the pointer is always a valid, live map.
      let current: &HashMap<K, V> = unsafe { shared.deref() };

      match f(current) {
        Step::Keep(result) => return result,
        Step::Swap(next, result) => {
          // A failed CAS means another writer won; discard the stale
          // successor and recompute from the fresh snapshot.
          if self.install(shared, next, &guard) {
            return result;
          }
        }
      }
    }
  }

  /// Unconditionally replaces the current map.
  ///
  /// Used for eager teardown; steady-state mutation goes through
  /// [`swap`].
  ///
  /// [`swap`]: Self::swap
  pub(crate) fn store(&self, next: HashMap<K, V>) {
    let guard: Guard = epoch::pin();
    let prev: Shared<'_, HashMap<K, V>> = self.inner.swap(Owned::new(next), AcqRel, &guard);

    // SAFETY: The swap gave us ownership of the previous map. We defer
    // destruction so concurrent readers can finish with their snapshots.
    unsafe {
      guard.defer_destroy(prev);
    }
  }

  /// Attempts a single compare-and-swap of `current` with `next`.
  fn install<'g>(
    &self,
    current: Shared<'g, HashMap<K, V>>,
    next: HashMap<K, V>,
    guard: &'g Guard,
  ) -> bool {
    match self
      .inner
      .compare_exchange(current, Owned::new(next), AcqRel, Acquire, guard)
    {
      Ok(_) => {
        // SAFETY: The CAS gave us ownership of the superseded map. We
        // defer destruction so concurrent readers can finish with it.
        unsafe {
          guard.defer_destroy(current);
        }

        true
      }
      Err(_) => false,
    }
  }
}

impl<K, V> Drop for SnapshotCell<K, V>
where
  K: Clone + Hash + Eq,
  V: Clone,
{
  fn drop(&mut self) {
    // SAFETY: We have exclusive access during drop; no guard is required
    // because no other thread can observe the pointer anymore.
    let shared: Shared<'_, HashMap<K, V>> =
      unsafe { self.inner.load(Relaxed, epoch::unprotected()) };

    if !shared.is_null() {
      // SAFETY: The pointer is valid and exclusively owned (see above).
      drop(unsafe { shared.into_owned() });
    }
  }
}

impl<K, V> Debug for SnapshotCell<K, V>
where
  K: Clone + Hash + Eq,
  V: Clone,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("SnapshotCell")
      .field("size", &self.read(HashMap::len))
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::Barrier;
  use std::thread;

  use super::SnapshotCell;
  use super::Step;

  #[test]
  fn test_empty() {
    let cell: SnapshotCell<u32, u32> = SnapshotCell::new();

    assert!(cell.read(|map| map.is_empty()));
  }

  #[test]
  fn test_swap_keep() {
    let cell: SnapshotCell<u32, u32> = SnapshotCell::new();
    let result: &str = cell.swap(|_| Step::Keep("unchanged"));

    assert_eq!(result, "unchanged");
    assert!(cell.read(|map| map.is_empty()));
  }

  #[test]
  fn test_swap_install() {
    let cell: SnapshotCell<u32, u32> = SnapshotCell::new();

    cell.swap(|map| Step::Swap(map.update(1, 100), ()));

    assert_eq!(cell.read(|map| map.get(&1).copied()), Some(100));
  }

  #[test]
  fn test_snapshot_is_stable() {
    let cell: SnapshotCell<u32, u32> = SnapshotCell::new();

    cell.swap(|map| Step::Swap(map.update(1, 100), ()));

    let before = cell.snapshot();

    cell.swap(|map| Step::Swap(map.update(2, 200), ()));

    assert_eq!(before.len(), 1);
    assert_eq!(cell.read(im::HashMap::len), 2);
  }

  #[test]
  fn test_store_replaces() {
    let cell: SnapshotCell<u32, u32> = SnapshotCell::new();

    cell.swap(|map| Step::Swap(map.update(1, 100), ()));
    cell.store(im::HashMap::new());

    assert!(cell.read(|map| map.is_empty()));
  }

  #[test]
  fn stress_concurrent_disjoint_writers() {
    let cell: Arc<SnapshotCell<u32, u32>> = Arc::new(SnapshotCell::new());
    let barrier: Arc<Barrier> = Arc::new(Barrier::new(16));

    let threads: Vec<_> = (0..16u32)
      .map(|index| {
        let cell: Arc<SnapshotCell<u32, u32>> = Arc::clone(&cell);
        let barrier: Arc<Barrier> = Arc::clone(&barrier);

        thread::spawn(move || {
          barrier.wait();

          for key in 0..64u32 {
            cell.swap(|map| Step::Swap(map.update(index * 64 + key, index), ()));
          }
        })
      })
      .collect();

    for handle in threads {
      handle.join().unwrap();
    }

    assert_eq!(cell.read(im::HashMap::len), 16 * 64);
  }
}
