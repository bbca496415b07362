use std::any::Any;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::sync::Arc;

use crate::ns::Binding;

// -----------------------------------------------------------------------------
// Object
// -----------------------------------------------------------------------------

/// Opaque, shared runtime value with identity comparison.
///
/// Objects wrap any `Send + Sync` value behind a shared pointer. Two
/// objects are the *same* when they share one allocation; structural
/// equality is never consulted by this core.
#[derive(Clone)]
#[repr(transparent)]
pub struct Object {
  inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
  /// Wraps a value into a shared object.
  #[inline]
  pub fn new<T>(value: T) -> Self
  where
    T: Any + Send + Sync,
  {
    Self {
      inner: Arc::new(value),
    }
  }

  /// Returns a reference to the wrapped value if it is of type `T`.
  #[inline]
  pub fn downcast_ref<T>(&self) -> Option<&T>
  where
    T: Any + Send + Sync,
  {
    self.inner.downcast_ref()
  }

  /// Returns `true` if both objects share one allocation.
  #[inline]
  pub fn same(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Debug for Object {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "#<object {:p}>", Arc::as_ptr(&self.inner))
  }
}

// -----------------------------------------------------------------------------
// Type Ref
// -----------------------------------------------------------------------------

/// Handle to an imported type, identified by its fully-qualified name.
///
/// Distinct instances sharing one fully-qualified name model a
/// hot-reloaded type: the namespace layer treats such pairs as
/// replaceable rather than conflicting.
pub struct TypeRef {
  name: Box<str>,
}

impl TypeRef {
  /// Creates a new type handle for the given fully-qualified name.
  #[inline]
  pub fn new(name: impl Into<Box<str>>) -> Arc<Self> {
    Arc::new(Self { name: name.into() })
  }

  /// Returns the fully-qualified type name.
  #[inline]
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns `true` if `other` is a distinct instance carrying the same
  /// fully-qualified name.
  #[inline]
  pub fn is_reload_of(self: &Arc<Self>, other: &Arc<Self>) -> bool {
    !Arc::ptr_eq(self, other) && self.name == other.name
  }
}

impl Debug for TypeRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for TypeRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "#<type {name}>", name = self.name)
  }
}

// -----------------------------------------------------------------------------
// Mapping
// -----------------------------------------------------------------------------

/// One entry in a namespace binding table.
///
/// A symbol maps to either a [`Binding`] cell installed by some
/// namespace, an imported type, or a directly-referenced value.
#[derive(Clone)]
#[non_exhaustive]
pub enum Mapping {
  /// A binding cell, owned by the namespace that interned it.
  Binding(Arc<Binding>),
  /// An imported type.
  Class(Arc<TypeRef>),
  /// A directly-referenced value.
  Value(Object),
}

impl Mapping {
  /// Returns `true` if both mappings refer to the identical entry.
  pub fn same(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Binding(this), Self::Binding(that)) => Arc::ptr_eq(this, that),
      (Self::Class(this), Self::Class(that)) => Arc::ptr_eq(this, that),
      (Self::Value(this), Self::Value(that)) => this.same(that),
      _ => false,
    }
  }

  /// Returns the binding cell if this mapping is one.
  #[inline]
  pub fn as_binding(&self) -> Option<&Arc<Binding>> {
    match self {
      Self::Binding(binding) => Some(binding),
      _ => None,
    }
  }
}

impl Debug for Mapping {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::Binding(binding) => Debug::fmt(binding, f),
      Self::Class(ty) => Debug::fmt(ty, f),
      Self::Value(object) => Debug::fmt(object, f),
    }
  }
}

impl Display for Mapping {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Debug::fmt(self, f)
  }
}

impl From<Arc<Binding>> for Mapping {
  #[inline]
  fn from(other: Arc<Binding>) -> Self {
    Self::Binding(other)
  }
}

impl From<Arc<TypeRef>> for Mapping {
  #[inline]
  fn from(other: Arc<TypeRef>) -> Self {
    Self::Class(other)
  }
}

impl From<Object> for Mapping {
  #[inline]
  fn from(other: Object) -> Self {
    Self::Value(other)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
