use crossbeam_utils::CachePadded;
use im::HashMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::ptr;
use std::sync::Arc;

use crate::core::ResolveError;
use crate::core::SnapshotCell;
use crate::core::Step;
use crate::core::Symbol;
use crate::core::fatal;
use crate::ctx;
use crate::ns::Binding;
use crate::ns::Mapping;
use crate::ns::Object;
use crate::ns::TypeRef;

// -----------------------------------------------------------------------------
// Namespace
// -----------------------------------------------------------------------------

/// One namespace's binding table and alias table.
///
/// Both tables are independently-versioned immutable maps updated through
/// optimistic compare-and-swap; every operation is linearizable within
/// this namespace and none blocks on I/O or takes a lock.
///
/// A namespace is created through [`LoadingContext::find_or_create`] and
/// lives until explicitly removed from every registry holding it; multiple
/// contexts may share one instance, and mutations are immediately visible
/// to all holders.
///
/// # Rebinding Policy
///
/// A symbol already bound by *this* namespace is returned unchanged. A
/// symbol bound by the protected core namespace may be shadowed locally,
/// with a warning. A symbol bound by any other foreign namespace may not
/// be silently stolen and fails with [`ResolveError::BindingConflict`].
///
/// [`LoadingContext::find_or_create`]: crate::ctx::LoadingContext::find_or_create
pub struct Namespace {
  name: Symbol,
  mappings: CachePadded<SnapshotCell<Symbol, Mapping>>,
  aliases: CachePadded<SnapshotCell<Symbol, Arc<Namespace>>>,
}

impl Namespace {
  /// Creates a new, empty namespace.
  ///
  /// Callers go through [`LoadingContext::find_or_create`], which
  /// guarantees exactly one instance per name and registry.
  ///
  /// [`LoadingContext::find_or_create`]: crate::ctx::LoadingContext::find_or_create
  #[inline]
  pub(crate) fn new(name: Symbol) -> Arc<Self> {
    Arc::new(Self {
      name,
      mappings: CachePadded::new(SnapshotCell::new()),
      aliases: CachePadded::new(SnapshotCell::new()),
    })
  }

  /// Returns the symbol naming this namespace.
  #[inline]
  pub fn name(&self) -> Symbol {
    self.name
  }

  // ---------------------------------------------------------------------------
  // Binding Table
  // ---------------------------------------------------------------------------

  /// Interns `sym` and returns its binding cell.
  ///
  /// If no mapping exists, atomically installs a fresh cell owned by this
  /// namespace. Interning an already-interned symbol is idempotent and
  /// returns the same cell identity. Rebinding follows the namespace
  /// rebinding policy (see the type-level docs).
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::InvalidArgument`] for a qualified symbol and
  /// [`ResolveError::BindingConflict`] when `sym` already refers to a
  /// binding owned by a foreign, non-core namespace.
  pub fn intern(self: &Arc<Self>, sym: Symbol) -> Result<Arc<Binding>, ResolveError> {
    if sym.is_qualified() {
      return Err(ResolveError::qualified(
        "can't intern namespace-qualified symbol",
        sym,
      ));
    }

    let mut candidate: Option<Arc<Binding>> = None;

    let existing: Option<Mapping> = self.mappings.swap(|map| match map.get(&sym) {
      None => {
        let binding: &Arc<Binding> =
          candidate.get_or_insert_with(|| Binding::new(self, sym));

        Step::Swap(map.update(sym, Mapping::Binding(Arc::clone(binding))), None)
      }
      Some(found) => Step::Keep(Some(found.clone())),
    });

    let existing: Mapping = match existing {
      Some(found) => found,
      None => match candidate {
        Some(binding) => return Ok(binding),
        None => fatal!("intern installed no candidate binding"),
      },
    };

    if let Some(binding) = existing.as_binding() {
      if binding.is_owned_by(self) {
        return Ok(Arc::clone(binding));
      }
    }

    let binding: Arc<Binding> = candidate.unwrap_or_else(|| Binding::new(self, sym));
    let incoming: Mapping = Mapping::Binding(Arc::clone(&binding));

    self.warn_or_fail_on_replace(sym, &existing, &incoming)?;

    self
      .mappings
      .swap(|map| Step::Swap(map.update(sym, incoming.clone()), ()));

    Ok(binding)
  }

  /// Installs an arbitrary mapping for `sym`.
  ///
  /// Returns the mapping that ends up visible: the existing entry when it
  /// is the identical object, otherwise the incoming one after the
  /// rebinding policy has been applied.
  ///
  /// # Errors
  ///
  /// Same conditions as [`intern`].
  ///
  /// [`intern`]: Self::intern
  pub fn reference(self: &Arc<Self>, sym: Symbol, mapping: Mapping) -> Result<Mapping, ResolveError> {
    if sym.is_qualified() {
      return Err(ResolveError::qualified(
        "can't intern namespace-qualified symbol",
        sym,
      ));
    }

    let existing: Option<Mapping> = self.mappings.swap(|map| match map.get(&sym) {
      None => Step::Swap(map.update(sym, mapping.clone()), None),
      Some(found) => Step::Keep(Some(found.clone())),
    });

    let Some(existing) = existing else {
      return Ok(mapping);
    };

    if existing.same(&mapping) {
      return Ok(existing);
    }

    self.warn_or_fail_on_replace(sym, &existing, &mapping)?;

    self
      .mappings
      .swap(|map| Step::Swap(map.update(sym, mapping.clone()), ()));

    Ok(mapping)
  }

  /// Makes a binding owned by another namespace visible here.
  pub fn refer(self: &Arc<Self>, sym: Symbol, binding: &Arc<Binding>) -> Result<Arc<Binding>, ResolveError> {
    match self.reference(sym, Mapping::Binding(Arc::clone(binding)))? {
      Mapping::Binding(binding) => Ok(binding),
      _ => fatal!("refer resolved to a non-binding mapping"),
    }
  }

  /// Installs a directly-referenced value for `sym`.
  pub fn reference_value(self: &Arc<Self>, sym: Symbol, value: Object) -> Result<Object, ResolveError> {
    match self.reference(sym, Mapping::Value(value))? {
      Mapping::Value(value) => Ok(value),
      _ => fatal!("reference resolved to a non-value mapping"),
    }
  }

  /// Imports a type under `sym`.
  ///
  /// Importing the identical type again is a no-op. A distinct instance
  /// carrying the same fully-qualified name is a hot reload: the loop
  /// converges on one consistent entry instead of conflicting.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::InvalidArgument`] for a qualified symbol and
  /// [`ResolveError::BindingConflict`] when `sym` already maps to an
  /// unrelated entry.
  pub fn import_type(self: &Arc<Self>, sym: Symbol, ty: Arc<TypeRef>) -> Result<Arc<TypeRef>, ResolveError> {
    if sym.is_qualified() {
      return Err(ResolveError::qualified(
        "can't intern namespace-qualified symbol",
        sym,
      ));
    }

    self.mappings.swap(|map| match map.get(&sym) {
      None => Step::Swap(
        map.update(sym, Mapping::Class(Arc::clone(&ty))),
        Ok(Arc::clone(&ty)),
      ),
      Some(Mapping::Class(found)) if Arc::ptr_eq(found, &ty) => {
        Step::Keep(Ok(Arc::clone(found)))
      }
      Some(Mapping::Class(found)) if found.is_reload_of(&ty) => Step::Swap(
        map.update(sym, Mapping::Class(Arc::clone(&ty))),
        Ok(Arc::clone(&ty)),
      ),
      Some(_) => Step::Keep(Err(ResolveError::BindingConflict {
        sym,
        ns: self.name,
      })),
    })
  }

  /// Imports a type under the last segment of its fully-qualified name.
  pub fn import_type_named(self: &Arc<Self>, ty: Arc<TypeRef>) -> Result<Arc<TypeRef>, ResolveError> {
    let local: &str = ty.name().rsplit('.').next().unwrap_or_default();
    let sym: Symbol = Symbol::new(local);

    self.import_type(sym, ty)
  }

  /// Removes the mapping for `sym`, if any.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::InvalidArgument`] for a qualified symbol.
  pub fn unmap(&self, sym: Symbol) -> Result<(), ResolveError> {
    if sym.is_qualified() {
      return Err(ResolveError::qualified(
        "can't unmap namespace-qualified symbol",
        sym,
      ));
    }

    self.mappings.swap(|map| {
      if map.contains_key(&sym) {
        Step::Swap(map.without(&sym), ())
      } else {
        Step::Keep(())
      }
    });

    Ok(())
  }

  /// Returns the current mapping for `sym`, if any.
  #[inline]
  pub fn mapping(&self, sym: Symbol) -> Option<Mapping> {
    self.mappings.read(|map| map.get(&sym).cloned())
  }

  /// Returns the binding for `sym` only if it is owned by this namespace.
  pub fn find_interned(self: &Arc<Self>, sym: Symbol) -> Option<Arc<Binding>> {
    self.mappings.read(|map| match map.get(&sym) {
      Some(Mapping::Binding(binding)) if binding.is_owned_by(self) => {
        Some(Arc::clone(binding))
      }
      _ => None,
    })
  }

  /// Returns a snapshot of the binding table.
  #[inline]
  pub fn mappings(&self) -> HashMap<Symbol, Mapping> {
    self.mappings.snapshot()
  }

  // ---------------------------------------------------------------------------
  // Alias Table
  // ---------------------------------------------------------------------------

  /// Adds an alias from `alias` to `target`.
  ///
  /// Aliasing the same target again is a no-op; aliases never expire and
  /// may not be retargeted.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::AliasConflict`] if `alias` is already set to
  /// a different namespace.
  pub fn add_alias(&self, alias: Symbol, target: &Arc<Namespace>) -> Result<(), ResolveError> {
    self.aliases.swap(|map| match map.get(&alias) {
      None => Step::Swap(map.update(alias, Arc::clone(target)), Ok(())),
      Some(found) if Arc::ptr_eq(found, target) => Step::Keep(Ok(())),
      Some(found) => Step::Keep(Err(ResolveError::AliasConflict {
        alias,
        ns: self.name,
        target: found.name,
      })),
    })
  }

  /// Returns the namespace aliased by `alias`, if any.
  #[inline]
  pub fn lookup_alias(&self, alias: Symbol) -> Option<Arc<Namespace>> {
    self.aliases.read(|map| map.get(&alias).cloned())
  }

  /// Removes the alias `alias`, if any.
  pub fn remove_alias(&self, alias: Symbol) {
    self.aliases.swap(|map| {
      if map.contains_key(&alias) {
        Step::Swap(map.without(&alias), ())
      } else {
        Step::Keep(())
      }
    });
  }

  /// Returns a snapshot of the alias table.
  #[inline]
  pub fn aliases(&self) -> HashMap<Symbol, Arc<Namespace>> {
    self.aliases.snapshot()
  }

  // ---------------------------------------------------------------------------
  // Rebinding Policy
  // ---------------------------------------------------------------------------

  /// Applies the rebinding policy for replacing `existing` with
  /// `incoming` under `sym`.
  ///
  /// Replacing a binding owned by this namespace is silent. Replacing a
  /// binding owned by the core namespace, or a non-binding entry, emits a
  /// warning and proceeds. Replacing a binding owned by any other
  /// namespace fails.
  fn warn_or_fail_on_replace(
    self: &Arc<Self>,
    sym: Symbol,
    existing: &Mapping,
    incoming: &Mapping,
  ) -> Result<(), ResolveError> {
    if let Some(binding) = existing.as_binding() {
      if binding.is_owned_by(self) {
        return Ok(());
      }

      if !binding.is_owned_by(&ctx::core_namespace()) {
        return Err(ResolveError::BindingConflict {
          sym,
          ns: self.name,
        });
      }
    }

    tracing::warn!(
      "{sym} already refers to: {existing} in namespace: {ns}, being replaced by: {incoming}",
      ns = self.name,
    );

    Ok(())
  }
}

impl PartialEq for Namespace {
  fn eq(&self, other: &Self) -> bool {
    ptr::eq(self, other)
  }
}

impl Eq for Namespace {}

impl Debug for Namespace {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Namespace")
      .field("name", &self.name)
      .field("mappings", &self.mappings.read(HashMap::len))
      .field("aliases", &self.aliases.read(HashMap::len))
      .finish()
  }
}

impl Display for Namespace {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(&self.name, f)
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

  use super::Namespace;
  use crate::core::ResolveError;
  use crate::core::Symbol;
  use crate::ctx;
  use crate::ns::Binding;
  use crate::ns::Mapping;
  use crate::ns::Object;
  use crate::ns::TypeRef;

  #[test]
  fn test_intern_idempotent_identity() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("intern.twice"));
    let sym: Symbol = Symbol::new("answer");

    let b1: Arc<Binding> = ns.intern(sym).unwrap();
    let b2: Arc<Binding> = ns.intern(sym).unwrap();

    assert!(Arc::ptr_eq(&b1, &b2));
    assert!(b1.is_owned_by(&ns));
  }

  #[test]
  fn test_intern_qualified_rejected() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("intern.qualified"));
    let sym: Symbol = Symbol::new("other.ns/answer");

    assert!(matches!(
      ns.intern(sym),
      Err(ResolveError::InvalidArgument { .. }),
    ));
  }

  #[test]
  fn test_intern_foreign_binding_conflicts() {
    let owner: Arc<Namespace> = Namespace::new(Symbol::new("conflict.owner"));
    let other: Arc<Namespace> = Namespace::new(Symbol::new("conflict.other"));
    let sym: Symbol = Symbol::new("stolen");

    let binding: Arc<Binding> = owner.intern(sym).unwrap();
    let referred: Arc<Binding> = other.refer(sym, &binding).unwrap();

    assert!(Arc::ptr_eq(&binding, &referred));
    assert_eq!(
      other.intern(sym),
      Err(ResolveError::BindingConflict {
        sym,
        ns: Symbol::new("conflict.other"),
      }),
    );
  }

  #[test]
  fn test_intern_shadows_core_with_replacement() {
    let core: Arc<Namespace> = ctx::core_namespace();
    let local: Arc<Namespace> = Namespace::new(Symbol::new("shadow.local"));
    let sym: Symbol = Symbol::new("shadowed-core-binding");

    let original: Arc<Binding> = core.intern(sym).unwrap();
    let referred: Arc<Binding> = local.refer(sym, &original).unwrap();

    assert!(referred.is_owned_by(&core));

    // Shadowing a core-owned binding proceeds with a warning and installs
    // a cell owned by the shadowing namespace.
    let shadowed: Arc<Binding> = local.intern(sym).unwrap();

    assert!(shadowed.is_owned_by(&local));
    assert!(!Arc::ptr_eq(&shadowed, &original));
    assert!(core.find_interned(sym).is_some());
  }

  #[test]
  fn test_reference_identical_object_is_noop() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("reference.noop"));
    let sym: Symbol = Symbol::new("value");
    let object: Object = Object::new(11u64);

    let v1: Object = ns.reference_value(sym, object.clone()).unwrap();
    let v2: Object = ns.reference_value(sym, object.clone()).unwrap();

    assert!(v1.same(&object));
    assert!(v2.same(&object));
  }

  #[test]
  fn test_reference_replaces_value_with_warning() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("reference.replace"));
    let sym: Symbol = Symbol::new("value");

    ns.reference_value(sym, Object::new(1u64)).unwrap();

    let replacement: Object = Object::new(2u64);
    let visible: Object = ns.reference_value(sym, replacement.clone()).unwrap();

    assert!(visible.same(&replacement));
  }

  #[test]
  fn test_import_type_idempotent() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("import.idempotent"));
    let sym: Symbol = Symbol::new("Widget");
    let ty: Arc<TypeRef> = TypeRef::new("app.main.Widget");

    let t1: Arc<TypeRef> = ns.import_type(sym, Arc::clone(&ty)).unwrap();
    let t2: Arc<TypeRef> = ns.import_type(sym, Arc::clone(&ty)).unwrap();

    assert!(Arc::ptr_eq(&t1, &ty));
    assert!(Arc::ptr_eq(&t2, &ty));
  }

  #[test]
  fn test_import_type_reload_converges() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("import.reload"));
    let sym: Symbol = Symbol::new("Widget");

    let old: Arc<TypeRef> = TypeRef::new("app.main.Widget");
    let new: Arc<TypeRef> = TypeRef::new("app.main.Widget");

    ns.import_type(sym, Arc::clone(&old)).unwrap();

    let resolved: Arc<TypeRef> = ns.import_type(sym, Arc::clone(&new)).unwrap();

    assert!(Arc::ptr_eq(&resolved, &new));

    match ns.mapping(sym) {
      Some(Mapping::Class(found)) => assert!(Arc::ptr_eq(&found, &new)),
      other => panic!("unexpected mapping: {other:?}"),
    }
  }

  #[test]
  fn test_import_type_unrelated_conflicts() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("import.conflict"));
    let sym: Symbol = Symbol::new("Widget");

    ns.intern(sym).unwrap();

    assert!(matches!(
      ns.import_type(sym, TypeRef::new("app.main.Widget")),
      Err(ResolveError::BindingConflict { .. }),
    ));
  }

  #[test]
  fn test_import_type_named_uses_last_segment() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("import.named"));
    let ty: Arc<TypeRef> = TypeRef::new("app.main.Widget");

    ns.import_type_named(Arc::clone(&ty)).unwrap();

    assert!(ns.mapping(Symbol::new("Widget")).is_some());
  }

  #[test]
  fn test_unmap() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("unmap.test"));
    let sym: Symbol = Symbol::new("transient");

    ns.intern(sym).unwrap();
    ns.unmap(sym).unwrap();

    assert!(ns.mapping(sym).is_none());

    // Absent symbol is a no-op.
    ns.unmap(sym).unwrap();
  }

  #[test]
  fn test_unmap_qualified_rejected() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("unmap.qualified"));

    assert!(matches!(
      ns.unmap(Symbol::new("other.ns/transient")),
      Err(ResolveError::InvalidArgument { .. }),
    ));
  }

  #[test]
  fn test_alias_idempotent() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("alias.idempotent"));
    let target: Arc<Namespace> = Namespace::new(Symbol::new("alias.target"));
    let alias: Symbol = Symbol::new("t");

    ns.add_alias(alias, &target).unwrap();
    ns.add_alias(alias, &target).unwrap();

    assert!(Arc::ptr_eq(&ns.lookup_alias(alias).unwrap(), &target));
  }

  #[test]
  fn test_alias_retarget_conflicts() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("alias.conflict"));
    let t1: Arc<Namespace> = Namespace::new(Symbol::new("alias.one"));
    let t2: Arc<Namespace> = Namespace::new(Symbol::new("alias.two"));
    let alias: Symbol = Symbol::new("t");

    ns.add_alias(alias, &t1).unwrap();

    assert_eq!(
      ns.add_alias(alias, &t2),
      Err(ResolveError::AliasConflict {
        alias,
        ns: Symbol::new("alias.conflict"),
        target: Symbol::new("alias.one"),
      }),
    );
  }

  #[test]
  fn test_alias_remove() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("alias.remove"));
    let target: Arc<Namespace> = Namespace::new(Symbol::new("alias.target"));
    let alias: Symbol = Symbol::new("t");

    ns.add_alias(alias, &target).unwrap();
    ns.remove_alias(alias);

    assert!(ns.lookup_alias(alias).is_none());

    // Removing again is a no-op; the alias may now be retargeted.
    ns.remove_alias(alias);
    ns.add_alias(alias, &target).unwrap();
  }

  #[test]
  fn stress_concurrent_intern_same_symbol() {
    let ns: Arc<Namespace> = Namespace::new(Symbol::new("intern.stress"));
    let sym: Symbol = Symbol::new("contended");
    let barrier: Arc<Barrier> = Arc::new(Barrier::new(32));

    let threads: Vec<_> = (0..32)
      .map(|_| {
        let ns: Arc<Namespace> = Arc::clone(&ns);
        let barrier: Arc<Barrier> = Arc::clone(&barrier);

        thread::spawn(move || {
          barrier.wait();
          ns.intern(sym).unwrap()
        })
      })
      .collect();

    let bindings: Vec<Arc<Binding>> = threads
      .into_iter()
      .map(|handle| handle.join().unwrap())
      .collect();

    assert!(
      bindings
        .windows(2)
        .all(|window| Arc::ptr_eq(&window[0], &window[1])),
    );
  }
}
