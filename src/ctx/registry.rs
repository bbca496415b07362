use im::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::sync::Arc;

use crate::core::ResolveError;
use crate::core::SnapshotCell;
use crate::core::Step;
use crate::core::Symbol;
use crate::ns::Namespace;

// -----------------------------------------------------------------------------
// Namespace Registry
// -----------------------------------------------------------------------------

/// The set of namespaces visible to one loading context.
///
/// A registry maps namespace names to shared [`Namespace`] instances.
/// Instances may be held by several registries at once (after injection);
/// removal from one registry never invalidates the namespace elsewhere.
///
/// The protected core namespace can never be removed.
pub struct NamespaceRegistry {
  cell: SnapshotCell<Symbol, Arc<Namespace>>,
}

impl NamespaceRegistry {
  /// Creates a new, empty registry.
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      cell: SnapshotCell::new(),
    }
  }

  /// Returns the namespace registered under `name`, if any.
  #[inline]
  pub fn find(&self, name: Symbol) -> Option<Arc<Namespace>> {
    self.cell.read(|map| map.get(&name).cloned())
  }

  /// Registers `candidate` unless `name` is already taken.
  ///
  /// This is the race-safe single-winner creation protocol: when another
  /// thread wins the race the candidate is discarded and the winner is
  /// returned, so exactly one instance ever becomes visible per name.
  pub(crate) fn insert_if_absent(&self, candidate: Arc<Namespace>) -> Arc<Namespace> {
    let name: Symbol = candidate.name();

    self.cell.swap(|map| match map.get(&name) {
      Some(winner) => Step::Keep(Arc::clone(winner)),
      None => Step::Swap(
        map.update(name, Arc::clone(&candidate)),
        Arc::clone(&candidate),
      ),
    })
  }

  /// Registers `ns` under its own name, replacing any prior entry.
  ///
  /// Used by injection, where the imported instance always wins.
  pub(crate) fn insert(&self, ns: Arc<Namespace>) {
    let name: Symbol = ns.name();

    self
      .cell
      .swap(|map| Step::Swap(map.update(name, Arc::clone(&ns)), ()));
  }

  /// Removes and returns the namespace registered under `name`.
  ///
  /// Removal only affects this registry; other registries holding the
  /// same instance keep it alive and visible.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::IllegalState`] for the protected core
  /// namespace.
  pub fn remove(&self, name: Symbol) -> Result<Option<Arc<Namespace>>, ResolveError> {
    if name == Symbol::CORE_NAMESPACE {
      return Err(ResolveError::IllegalState {
        reason: "cannot remove the core namespace",
      });
    }

    Ok(self.cell.swap(|map| match map.get(&name) {
      Some(found) => Step::Swap(map.without(&name), Some(Arc::clone(found))),
      None => Step::Keep(None),
    }))
  }

  /// Returns a snapshot of all registered namespaces, keyed by name.
  #[inline]
  pub fn entries(&self) -> HashMap<Symbol, Arc<Namespace>> {
    self.cell.snapshot()
  }

  /// Returns a snapshot sequence of all registered namespaces.
  pub fn list(&self) -> Vec<Arc<Namespace>> {
    self
      .cell
      .read(|map| map.values().cloned().collect())
  }

  /// Returns the number of registered namespaces.
  #[inline]
  pub fn len(&self) -> usize {
    self.cell.read(HashMap::len)
  }

  /// Returns `true` if no namespaces are registered.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Eagerly drops every entry.
  pub(crate) fn clear(&self) {
    self.cell.store(HashMap::new());
  }
}

impl Debug for NamespaceRegistry {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("NamespaceRegistry")
      .field("size", &self.len())
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
