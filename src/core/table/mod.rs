//! Global tables for interned names.

mod name_table;

pub(crate) use self::name_table::NameTable;
