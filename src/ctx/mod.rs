//! Loading contexts: per-boundary namespace registries, namespace
//! injection, and the weak unit cache.

mod cache;
mod context;
mod registry;

pub use self::cache::Unit;
pub use self::cache::UnitCache;
pub use self::context::LoadingContext;
pub use self::context::core_namespace;
pub use self::context::root;
pub use self::registry::NamespaceRegistry;
