mod macros;

pub(crate) use self::macros::fatal;
pub(crate) use self::macros::raise;

use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::core::Symbol;

// -----------------------------------------------------------------------------
// Resolve Error
// -----------------------------------------------------------------------------

/// Error type returned from invalid symbol resolution operations.
///
/// All failures are synchronous and local to the single call that
/// triggered them; the core never retries a failed operation on the
/// caller's behalf.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
  /// An argument violated an operation precondition.
  ///
  /// Raised when a namespace-qualified symbol is passed where an
  /// unqualified one is required, or when a namespace pattern fails to
  /// parse.
  InvalidArgument {
    /// Description of the violated precondition.
    reason: &'static str,
    /// The offending symbol, when one exists.
    sym: Option<Symbol>,
  },
  /// An attempt was made to rebind a symbol that already refers to a
  /// binding owned by a foreign, non-core namespace, or to import a type
  /// under a name already mapped to an unrelated entry.
  BindingConflict {
    /// The symbol that is already bound.
    sym: Symbol,
    /// The namespace in which the conflict occurred.
    ns: Symbol,
  },
  /// An attempt was made to retarget an existing alias.
  AliasConflict {
    /// The alias that is already set.
    alias: Symbol,
    /// The namespace in which the conflict occurred.
    ns: Symbol,
    /// The namespace the alias currently refers to.
    target: Symbol,
  },
  /// An operation was refused because it would violate a structural
  /// invariant, such as removing the protected core namespace.
  IllegalState {
    /// Description of the violated invariant.
    reason: &'static str,
  },
}

impl ResolveError {
  /// Creates an [`InvalidArgument`] error for a qualified symbol.
  ///
  /// [`InvalidArgument`]: Self::InvalidArgument
  #[inline]
  pub(crate) const fn qualified(reason: &'static str, sym: Symbol) -> Self {
    Self::InvalidArgument {
      reason,
      sym: Some(sym),
    }
  }

  /// Creates an [`InvalidArgument`] error with no associated symbol.
  ///
  /// [`InvalidArgument`]: Self::InvalidArgument
  #[inline]
  pub(crate) const fn argument(reason: &'static str) -> Self {
    Self::InvalidArgument { reason, sym: None }
  }
}

impl Display for ResolveError {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::InvalidArgument { reason, sym: None } => {
        write!(f, "(InvalidArgument) {reason}")
      }
      Self::InvalidArgument {
        reason,
        sym: Some(sym),
      } => {
        write!(f, "(InvalidArgument) {reason}: {sym}")
      }
      Self::BindingConflict { sym, ns } => {
        write!(
          f,
          "(BindingConflict) {sym} already refers to a foreign binding in namespace: {ns}",
        )
      }
      Self::AliasConflict { alias, ns, target } => {
        write!(
          f,
          "(AliasConflict) alias {alias} already exists in namespace {ns}, aliasing {target}",
        )
      }
      Self::IllegalState { reason } => {
        write!(f, "(IllegalState) {reason}")
      }
    }
  }
}

impl Error for ResolveError {}
