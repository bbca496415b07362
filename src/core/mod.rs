//! Core types: interned names and symbols, errors, and the lock-free
//! snapshot cell every table is built on.

mod cell;
mod error;
mod symbol;
mod table;

pub(crate) use self::cell::SnapshotCell;
pub(crate) use self::cell::Step;
pub(crate) use self::error::fatal;
pub(crate) use self::error::raise;
pub(crate) use self::table::NameTable;

pub use self::error::ResolveError;
pub use self::symbol::Name;
pub use self::symbol::Symbol;
