use im::HashMap;
use regex::Regex;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::OnceLock;
use tracing::debug;

use crate::core::ResolveError;
use crate::core::Symbol;
use crate::core::fatal;
use crate::ctx::NamespaceRegistry;
use crate::ctx::UnitCache;
use crate::ns::Namespace;

// -----------------------------------------------------------------------------
// Root Context
// -----------------------------------------------------------------------------

static ROOT: LazyLock<Arc<LoadingContext>> = LazyLock::new(|| {
  Arc::new(LoadingContext {
    parent: None,
    root: true,
    registry: OnceLock::new(),
    cache: UnitCache::new(),
  })
});

/// Returns the process-wide root loading context.
///
/// The root context is created on first use and lives for the lifetime of
/// the process; it owns the protected core namespace.
#[inline]
pub fn root() -> Arc<LoadingContext> {
  Arc::clone(&ROOT)
}

/// Returns the protected core namespace.
///
/// There is exactly one core namespace instance per process, shared by
/// every loading context.
pub fn core_namespace() -> Arc<Namespace> {
  match ROOT.registry().find(Symbol::CORE_NAMESPACE) {
    Some(core) => core,
    None => fatal!("core namespace missing from root registry"),
  }
}

// -----------------------------------------------------------------------------
// Loading Context
// -----------------------------------------------------------------------------

/// One isolation boundary: a namespace registry plus a unit cache.
///
/// Contexts form a tree rooted at the process-wide [`root`] context.
/// Each context resolves namespace names against its own registry, so two
/// contexts may hold unrelated namespaces under the same name; sharing is
/// explicit, through [`inject_namespaces`].
///
/// All operations are safe to call from any thread.
///
/// [`inject_namespaces`]: Self::inject_namespaces
pub struct LoadingContext {
  parent: Option<Arc<LoadingContext>>,
  root: bool,
  registry: OnceLock<NamespaceRegistry>,
  cache: UnitCache,
}

impl LoadingContext {
  /// Creates a detached context parented to the root.
  pub fn new() -> Arc<Self> {
    Self::with_parent(&root())
  }

  /// Creates a context with an explicit parent.
  pub fn with_parent(parent: &Arc<LoadingContext>) -> Arc<Self> {
    Arc::new(Self {
      parent: Some(Arc::clone(parent)),
      root: false,
      registry: OnceLock::new(),
      cache: UnitCache::new(),
    })
  }

  /// Returns the parent context, or `None` for the root.
  #[inline]
  pub fn parent(&self) -> Option<&Arc<LoadingContext>> {
    self.parent.as_ref()
  }

  /// Returns `true` for the process-wide root context.
  #[inline]
  pub fn is_root(&self) -> bool {
    self.root
  }

  /// Returns this context's namespace registry, bootstrapping it on
  /// first access.
  pub fn registry(&self) -> &NamespaceRegistry {
    self.registry.get_or_init(|| self.bootstrap())
  }

  /// Builds the initial registry.
  ///
  /// The root context creates the core namespace; every other context
  /// starts from the shared core instance, so core bindings are visible
  /// everywhere from the first resolution on.
  fn bootstrap(&self) -> NamespaceRegistry {
    let registry: NamespaceRegistry = NamespaceRegistry::new();

    if self.root {
      registry.insert(Namespace::new(Symbol::CORE_NAMESPACE));
      debug!("root loading context bootstrapped");
    } else {
      registry.insert(core_namespace());
      debug!("loading context bootstrapped with shared core namespace");
    }

    registry
  }

  // ---------------------------------------------------------------------------
  // Namespace Resolution
  // ---------------------------------------------------------------------------

  /// Returns the namespace named `name`, creating it if absent.
  ///
  /// Concurrent callers racing on the same absent name all receive the
  /// identical instance. The core name always resolves to the shared
  /// core namespace, never to a fresh instance.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::InvalidArgument`] for a qualified symbol.
  pub fn find_or_create(&self, name: Symbol) -> Result<Arc<Namespace>, ResolveError> {
    if name.is_qualified() {
      return Err(ResolveError::qualified(
        "can't name a namespace with a qualified symbol",
        name,
      ));
    }

    if name == Symbol::CORE_NAMESPACE {
      return Ok(core_namespace());
    }

    let registry: &NamespaceRegistry = self.registry();

    if let Some(found) = registry.find(name) {
      return Ok(found);
    }

    Ok(registry.insert_if_absent(Namespace::new(name)))
  }

  /// Returns the namespace named `name` in this context, if any.
  #[inline]
  pub fn find(&self, name: Symbol) -> Option<Arc<Namespace>> {
    self.registry().find(name)
  }

  /// Returns the namespace named `name` in this context, falling back to
  /// the root context on a miss.
  pub fn find_or_root(&self, name: Symbol) -> Option<Arc<Namespace>> {
    self.find(name).or_else(|| root().find(name))
  }

  /// Removes the namespace named `name` from this context's registry.
  ///
  /// The instance itself is untouched; other contexts holding it keep
  /// resolving through it.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::IllegalState`] for the protected core
  /// namespace.
  #[inline]
  pub fn remove(&self, name: Symbol) -> Result<Option<Arc<Namespace>>, ResolveError> {
    self.registry().remove(name)
  }

  /// Returns a snapshot of the namespaces registered in this context.
  #[inline]
  pub fn namespaces(&self) -> Vec<Arc<Namespace>> {
    self.registry().list()
  }

  // ---------------------------------------------------------------------------
  // Injection
  // ---------------------------------------------------------------------------

  /// Copies namespaces whose name fully matches `pattern` from `source`
  /// into this context, sharing the instances rather than cloning them.
  ///
  /// Imported instances overwrite same-named entries already registered
  /// here. Injecting a context into itself is a no-op. Returns the
  /// imported namespaces, keyed by name.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::InvalidArgument`] when `pattern` is not a
  /// valid regular expression.
  pub fn inject_namespaces(
    self: &Arc<Self>,
    source: &Arc<LoadingContext>,
    pattern: &str,
  ) -> Result<HashMap<Symbol, Arc<Namespace>>, ResolveError> {
    // The pattern must match the whole name, not a substring of it.
    let regex: Regex = Regex::new(&format!("^(?:{pattern})$"))
      .map_err(|_| ResolveError::argument("malformed namespace pattern"))?;

    let mut injected: HashMap<Symbol, Arc<Namespace>> = HashMap::new();

    if Arc::ptr_eq(self, source) {
      return Ok(injected);
    }

    for (name, ns) in source.registry().entries().iter() {
      if regex.is_match(name.name()) {
        self.registry().insert(Arc::clone(ns));
        injected.insert(*name, Arc::clone(ns));
      }
    }

    debug!(count = injected.len(), pattern, "namespaces injected");

    Ok(injected)
  }

  /// Copies namespaces matching `pattern` from the root context.
  #[inline]
  pub fn inject_from_root(
    self: &Arc<Self>,
    pattern: &str,
  ) -> Result<HashMap<Symbol, Arc<Namespace>>, ResolveError> {
    self.inject_namespaces(&root(), pattern)
  }

  // ---------------------------------------------------------------------------
  // Units + Teardown
  // ---------------------------------------------------------------------------

  /// Returns this context's unit cache.
  #[inline]
  pub fn units(&self) -> &UnitCache {
    &self.cache
  }

  /// Tears this context down, dropping its unit cache and every registry
  /// entry, the shared core namespace entry included.
  ///
  /// Namespaces shared with other contexts survive in those contexts.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::IllegalState`] for the root context, which
  /// lives for the lifetime of the process.
  pub fn teardown(&self) -> Result<(), ResolveError> {
    if self.root {
      return Err(ResolveError::IllegalState {
        reason: "cannot tear down the root loading context",
      });
    }

    self.cache.clear();

    if let Some(registry) = self.registry.get() {
      registry.clear();
    }

    Ok(())
  }
}

impl Debug for LoadingContext {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("LoadingContext")
      .field("root", &self.root)
      .field("registry", &self.registry.get())
      .field("cache", &self.cache)
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::LoadingContext;
  use super::core_namespace;
  use super::root;
  use crate::core::ResolveError;
  use crate::core::Symbol;
  use crate::ns::Namespace;

  #[test]
  fn test_root_is_singleton() {
    assert!(Arc::ptr_eq(&root(), &root()));
    assert!(root().is_root());
    assert!(root().parent().is_none());
  }

  #[test]
  fn test_core_namespace_shared_everywhere() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();
    let core: Arc<Namespace> = core_namespace();

    assert!(Arc::ptr_eq(
      &ctx.find_or_create(Symbol::CORE_NAMESPACE).unwrap(),
      &core,
    ));
    assert!(Arc::ptr_eq(&ctx.find(Symbol::CORE_NAMESPACE).unwrap(), &core));
    assert!(Arc::ptr_eq(
      &root().find(Symbol::CORE_NAMESPACE).unwrap(),
      &core,
    ));
  }

  #[test]
  fn test_find_or_create_idempotent() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();
    let name: Symbol = Symbol::new("context.idempotent");

    let n1: Arc<Namespace> = ctx.find_or_create(name).unwrap();
    let n2: Arc<Namespace> = ctx.find_or_create(name).unwrap();

    assert!(Arc::ptr_eq(&n1, &n2));
  }

  #[test]
  fn test_find_or_create_qualified_rejected() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();

    assert!(matches!(
      ctx.find_or_create(Symbol::new("some.ns/name")),
      Err(ResolveError::InvalidArgument { .. }),
    ));
  }

  #[test]
  fn test_contexts_are_isolated() {
    let a: Arc<LoadingContext> = LoadingContext::new();
    let b: Arc<LoadingContext> = LoadingContext::new();
    let name: Symbol = Symbol::new("context.isolated");

    let in_a: Arc<Namespace> = a.find_or_create(name).unwrap();

    assert!(b.find(name).is_none());

    let in_b: Arc<Namespace> = b.find_or_create(name).unwrap();

    assert!(!Arc::ptr_eq(&in_a, &in_b));
  }

  #[test]
  fn test_find_or_root_falls_back() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();
    let name: Symbol = Symbol::new("context.rooted");

    let in_root: Arc<Namespace> = root().find_or_create(name).unwrap();

    assert!(ctx.find(name).is_none());
    assert!(Arc::ptr_eq(&ctx.find_or_root(name).unwrap(), &in_root));
  }

  #[test]
  fn test_inject_shares_instances() {
    let source: Arc<LoadingContext> = LoadingContext::new();
    let target: Arc<LoadingContext> = LoadingContext::new();

    let app: Arc<Namespace> = source.find_or_create(Symbol::new("app.main")).unwrap();

    source.find_or_create(Symbol::new("lib.util")).unwrap();

    let injected = target.inject_namespaces(&source, r"app\..*").unwrap();

    assert_eq!(injected.len(), 1);
    assert!(Arc::ptr_eq(&target.find(Symbol::new("app.main")).unwrap(), &app));
    assert!(target.find(Symbol::new("lib.util")).is_none());
  }

  #[test]
  fn test_inject_matches_whole_name() {
    let source: Arc<LoadingContext> = LoadingContext::new();
    let target: Arc<LoadingContext> = LoadingContext::new();

    source.find_or_create(Symbol::new("app.main.extra")).unwrap();

    // A substring match is not enough.
    let injected = target.inject_namespaces(&source, r"app\.main").unwrap();

    assert!(injected.is_empty());
  }

  #[test]
  fn test_inject_self_is_noop() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();

    ctx.find_or_create(Symbol::new("app.selfish")).unwrap();

    let injected = ctx.inject_namespaces(&ctx.clone(), r".*").unwrap();

    assert!(injected.is_empty());
  }

  #[test]
  fn test_inject_malformed_pattern() {
    let source: Arc<LoadingContext> = LoadingContext::new();
    let target: Arc<LoadingContext> = LoadingContext::new();

    assert_eq!(
      target.inject_namespaces(&source, r"app\.(main"),
      Err(ResolveError::InvalidArgument {
        reason: "malformed namespace pattern",
        sym: None,
      }),
    );
  }

  #[test]
  fn test_remove_refuses_core() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();

    assert!(matches!(
      ctx.remove(Symbol::CORE_NAMESPACE),
      Err(ResolveError::IllegalState { .. }),
    ));
  }

  #[test]
  fn test_teardown() {
    let ctx: Arc<LoadingContext> = LoadingContext::new();
    let name: Symbol = Symbol::new("context.doomed");

    ctx.find_or_create(name).unwrap();
    ctx.units().register("context.doomed.unit", vec![1]);
    ctx.teardown().unwrap();

    assert!(ctx.find(name).is_none());
    assert!(ctx.units().is_empty());

    // The shared core instance is unaffected.
    assert!(root().find(Symbol::CORE_NAMESPACE).is_some());
  }

  #[test]
  fn test_teardown_refuses_root() {
    assert!(matches!(
      root().teardown(),
      Err(ResolveError::IllegalState { .. }),
    ));
  }
}
