// -----------------------------------------------------------------------------
// System - Names
// -----------------------------------------------------------------------------

/// Maximum number of UTF-8 bytes in an interned [`Name`].
///
/// [`Name`]: crate::core::Name
pub const MAX_NAME_BYTES: usize = 512;

/// Maximum number of [`Name`]s in the name table.
///
/// [`Name`]: crate::core::Name
pub const MAX_NAME_COUNT: usize = 1 << 20;

/// Number of pre-allocated entries in the name table.
pub const CAP_NAME_TABLE: usize = 1 << 10;

// -----------------------------------------------------------------------------
// System - Namespaces
// -----------------------------------------------------------------------------

/// Name of the protected core namespace.
///
/// The core namespace is created once in the root [`LoadingContext`],
/// shared into every other context, and can never be removed.
///
/// [`LoadingContext`]: crate::ctx::LoadingContext
pub const CORE_NAMESPACE: &str = "lexicon.core";
