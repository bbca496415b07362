//! Namespaces: binding tables, alias tables, and the Var-like binding
//! cells interned symbols resolve to.

mod binding;
mod mapping;
mod namespace;

pub use self::binding::Binding;
pub use self::mapping::Mapping;
pub use self::mapping::Object;
pub use self::mapping::TypeRef;
pub use self::namespace::Namespace;
