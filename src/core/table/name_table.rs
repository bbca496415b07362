//! Global name interning table with permanent storage semantics.
//!
//! This module provides a thread-safe string interning table that
//! permanently stores unique string values. Once interned, names are never
//! deallocated and can be referenced by their numeric slot identifier.
//!
//! # Thread Safety
//!
//! The name table uses a read-write lock with an optimized fast path for
//! existing names. Most lookups only require a read lock, while new name
//! creation requires a write lock.
//!
//! # Memory Considerations
//!
//! Names are **never deallocated**. Each interned string consumes memory
//! permanently. To prevent unbounded growth:
//!
//! - Maximum name count: [`MAX_NAME_COUNT`]
//! - Maximum name size: [`MAX_NAME_BYTES`]
//!
//! Avoid interning names from untrusted or dynamic input that could
//! exhaust the table capacity.
//!
//! [`MAX_NAME_BYTES`]: crate::consts::MAX_NAME_BYTES
//! [`MAX_NAME_COUNT`]: crate::consts::MAX_NAME_COUNT

use hashbrown::HashMap;
use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockUpgradableReadGuard;
use parking_lot::RwLockWriteGuard;
use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::consts::CAP_NAME_TABLE;
use crate::consts::MAX_NAME_BYTES;
use crate::consts::MAX_NAME_COUNT;

// -----------------------------------------------------------------------------
// Name Table Error
// -----------------------------------------------------------------------------

/// Errors returned from name table lookup or insertion operations.
///
/// These errors indicate capacity limits or invalid name access.
#[derive(Debug)]
#[non_exhaustive]
pub enum NameTableError {
  /// The name exceeds the maximum allowed byte length.
  NameTooLarge,
  /// The name table has reached its maximum capacity.
  TooManyNames,
  /// The requested name slot does not exist.
  NameNotFound,
}

impl Display for NameTableError {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::NameTooLarge => f.write_str("name too large"),
      Self::TooManyNames => f.write_str("too many names"),
      Self::NameNotFound => f.write_str("name not found"),
    }
  }
}

impl Error for NameTableError {}

// -----------------------------------------------------------------------------
// Name Table
// -----------------------------------------------------------------------------

/// Thread-safe name interning table with permanent storage.
///
/// This table stores unique strings permanently and provides fast lookups
/// via numeric slot identifiers. Interned strings are never deallocated.
///
/// # Implementation Details
///
/// The table uses a two-level structure:
///
/// 1. **HashMap**: Maps strings to slot indices for O(1) lookup
/// 2. **Slot array**: Append-only storage of the interned string data
///
/// Interned strings are leaked to obtain the `'static` lifetime that
/// allows zero-copy reads after the guard is released.
#[repr(transparent)]
pub(crate) struct NameTable {
  inner: RwLock<Table>,
}

impl NameTable {
  /// Creates a new empty name table with initial capacity allocated.
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      inner: RwLock::new(Table::new()),
    }
  }

  /// Returns the string for the given table slot.
  ///
  /// This operation only requires a read lock and is highly concurrent.
  ///
  /// # Errors
  ///
  /// Returns [`NameTableError::NameNotFound`] if the slot is invalid or
  /// has not been allocated yet.
  pub(crate) fn lookup(&self, slot: u32) -> Result<&'static str, NameTableError> {
    let guard: RwLockReadGuard<'_, Table> = self.inner.read();

    match guard.arr.get(slot as usize) {
      Some(data) => Ok(data),
      None => Err(NameTableError::NameNotFound),
    }
  }

  /// Interns a string and returns its name table slot.
  ///
  /// If the string is already interned, returns the existing slot without
  /// modification. Otherwise, allocates a new slot and stores the string.
  ///
  /// # Concurrency
  ///
  /// This method uses a two-phase locking strategy:
  ///
  /// 1. **Fast path**: Acquires an upgradable read lock to check for an
  ///    existing entry
  /// 2. **Slow path**: Upgrades to a write lock only for new names
  ///
  /// Most calls only require the read phase, providing good concurrency
  /// for workloads with repeated name creation.
  ///
  /// # Errors
  ///
  /// Returns [`NameTableError::NameTooLarge`] if the string exceeds
  /// [`MAX_NAME_BYTES`].
  ///
  /// Returns [`NameTableError::TooManyNames`] if the table has reached
  /// [`MAX_NAME_COUNT`] capacity.
  pub(crate) fn insert(&self, data: &str) -> Result<u32, NameTableError> {
    // -------------------------------------------------------------------------
    // 1. Fast Path - Existing Name
    // -------------------------------------------------------------------------

    let guard: RwLockUpgradableReadGuard<'_, Table> = self.inner.upgradable_read();

    if let Some(slot) = guard.map.get(data) {
      return Ok(*slot);
    }

    // -------------------------------------------------------------------------
    // 2. Slow Path - New Name
    // -------------------------------------------------------------------------

    let mut guard: RwLockWriteGuard<'_, Table> = RwLockUpgradableReadGuard::upgrade(guard);

    if data.len() > MAX_NAME_BYTES {
      return Err(NameTableError::NameTooLarge);
    }

    let slot: usize = guard.arr.len();

    if slot >= MAX_NAME_COUNT {
      return Err(NameTableError::TooManyNames);
    }

    let term: &'static str = Box::leak(Box::from(data));

    guard.arr.push(term);
    guard.map.insert(term, slot as u32);

    drop(guard);

    Ok(slot as u32)
  }
}

impl Debug for NameTable {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let guard: RwLockReadGuard<'_, Table> = self.inner.read();

    f.debug_struct("NameTable")
      .field("size", &guard.arr.len())
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Name Table - Table
// -----------------------------------------------------------------------------

/// Internal table structure holding name data and lookup map.
///
/// This structure is protected by the [`NameTable`]'s [`RwLock`] and
/// should not be accessed directly.
struct Table {
  /// Maps interned strings to their slot indices for fast lookup.
  map: HashMap<&'static str, u32>,
  /// Append-only storage of the interned string data.
  arr: Vec<&'static str>,
}

impl Table {
  /// Creates a new table with pre-allocated capacity.
  #[inline]
  fn new() -> Self {
    Self {
      map: HashMap::with_capacity(CAP_NAME_TABLE),
      arr: Vec::with_capacity(CAP_NAME_TABLE),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
