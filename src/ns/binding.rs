use crossbeam_epoch as epoch;
use crossbeam_epoch::Atomic;
use crossbeam_epoch::Guard;
use crossbeam_epoch::Owned;
use crossbeam_epoch::Shared;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::ptr;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::Ordering::AcqRel;
use std::sync::atomic::Ordering::Acquire;
use std::sync::atomic::Ordering::Relaxed;

use crate::core::Symbol;
use crate::ns::Namespace;
use crate::ns::Object;

// -----------------------------------------------------------------------------
// Binding
// -----------------------------------------------------------------------------

/// The indirection cell a namespace installs for an interned symbol.
///
/// A binding's identity never changes once installed: repeated interning
/// of the same symbol returns the same cell, and the cell's value may be
/// replaced at any time without disturbing references held by compiled
/// code.
///
/// The back-reference to the owning namespace is weak. Ownership checks
/// compare namespace identity, so a binding imported into another
/// namespace still reports its original owner.
pub struct Binding {
  sym: Symbol,
  owner: Weak<Namespace>,
  value: Atomic<Object>,
}

impl Binding {
  /// Creates a fresh, unbound cell owned by `owner`.
  #[inline]
  pub(crate) fn new(owner: &Arc<Namespace>, sym: Symbol) -> Arc<Self> {
    Arc::new(Self {
      sym,
      owner: Arc::downgrade(owner),
      value: Atomic::null(),
    })
  }

  /// Returns the symbol this cell was interned under.
  #[inline]
  pub fn symbol(&self) -> Symbol {
    self.sym
  }

  /// Returns the owning namespace, if it is still alive.
  #[inline]
  pub fn namespace(&self) -> Option<Arc<Namespace>> {
    self.owner.upgrade()
  }

  /// Returns `true` if this cell is owned by the given namespace.
  #[inline]
  pub(crate) fn is_owned_by(&self, ns: &Arc<Namespace>) -> bool {
    ptr::eq(self.owner.as_ptr(), Arc::as_ptr(ns))
  }

  /// Returns `true` if a value is currently installed.
  #[inline]
  pub fn is_bound(&self) -> bool {
    let guard: Guard = epoch::pin();

    !self.value.load(Acquire, &guard).is_null()
  }

  /// Returns the currently installed value, if any.
  pub fn load(&self) -> Option<Object> {
    let guard: Guard = epoch::pin();
    let shared: Shared<'_, Object> = self.value.load(Acquire, &guard);

    // SAFETY: A non-null slot always points to a valid object installed
    // by `store`; the guard keeps it alive while we clone.
    unsafe { shared.as_ref() }.cloned()
  }

  /// Installs a new value, replacing any previous one.
  ///
  /// The cell's identity is unaffected; holders of this binding observe
  /// the new value on their next [`load`].
  ///
  /// [`load`]: Self::load
  pub fn store(&self, value: Object) {
    let guard: Guard = epoch::pin();
    let prev: Shared<'_, Object> = self.value.swap(Owned::new(value), AcqRel, &guard);

    if !prev.is_null() {
      // SAFETY: The swap gave us ownership of the previous object. We
      // defer destruction so concurrent readers can finish with it.
      unsafe {
        guard.defer_destroy(prev);
      }
    }
  }
}

impl Drop for Binding {
  fn drop(&mut self) {
    // SAFETY: We have exclusive access during drop.
    let shared: Shared<'_, Object> = unsafe { self.value.load(Relaxed, epoch::unprotected()) };

    if !shared.is_null() {
      // SAFETY: The pointer is valid and exclusively owned (see above).
      drop(unsafe { shared.into_owned() });
    }
  }
}

impl PartialEq for Binding {
  fn eq(&self, other: &Self) -> bool {
    ptr::eq(self, other)
  }
}

impl Eq for Binding {}

impl Debug for Binding {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for Binding {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self.namespace() {
      Some(ns) => write!(f, "#'{ns}/{sym}", ns = ns.name(), sym = self.sym),
      None => write!(f, "#'{sym}", sym = self.sym),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
