//! Lock-free symbol resolution and dynamic unit caching for a hosted
//! language runtime.
//!
//! The crate provides the three layers a dynamic runtime resolves names
//! through:
//!
//! - [`core`] — interned [`Name`]s and [`Symbol`]s with identity
//!   comparison, and the snapshot cell every table is built on.
//! - [`ns`] — [`Namespace`]s holding binding and alias tables, with
//!   stable-identity [`Binding`] cells for interned symbols.
//! - [`ctx`] — [`LoadingContext`]s forming an isolation tree, each with
//!   its own namespace registry and weak [`UnitCache`].
//!
//! All mutation goes through optimistic compare-and-swap over immutable
//! maps; no operation takes a lock or blocks on I/O.
//!
//! # Quick Start
//!
//! ```
//! use lexicon::core::Symbol;
//! use lexicon::ctx::LoadingContext;
//! use lexicon::ns::Object;
//!
//! # fn main() -> Result<(), lexicon::core::ResolveError> {
//! let context = LoadingContext::new();
//! let namespace = context.find_or_create(Symbol::new("app.main"))?;
//!
//! let binding = namespace.intern(Symbol::new("answer"))?;
//!
//! binding.store(Object::new(42u64));
//!
//! let value = binding.load().unwrap();
//!
//! assert_eq!(value.downcast_ref::<u64>(), Some(&42));
//! # Ok(())
//! # }
//! ```
//!
//! [`Name`]: crate::core::Name
//! [`Symbol`]: crate::core::Symbol
//! [`Namespace`]: crate::ns::Namespace
//! [`Binding`]: crate::ns::Binding
//! [`LoadingContext`]: crate::ctx::LoadingContext
//! [`UnitCache`]: crate::ctx::UnitCache

pub mod consts;
pub mod core;
pub mod ctx;
pub mod ns;
