use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::ops::Deref;
use std::sync::LazyLock;

use crate::consts;
use crate::core::NameTable;
use crate::core::fatal;
use crate::core::raise;

// -----------------------------------------------------------------------------
// Global Name Table
// -----------------------------------------------------------------------------

macro_rules! insert_well_known {
  ($table:expr, $value:expr, Name::$expected:ident) => {{
    let valid: bool = $table
      .insert($value)
      .map(|slot| slot == Name::$expected.into_slot())
      .unwrap_or_else(|error| fatal!(error));

    if !valid {
      fatal!("invalid well-known name")
    }
  }};
}

/// Global name table initialized with well-known runtime names.
///
/// This table is lazily initialized on first access and ensures well-known
/// names occupy their expected slot indices.
static NAME_TABLE: LazyLock<NameTable> = LazyLock::new(|| {
  let table: NameTable = NameTable::new();

  insert_well_known!(table, "", Name::EMPTY);
  insert_well_known!(table, consts::CORE_NAMESPACE, Name::CORE);

  table
});

// -----------------------------------------------------------------------------
// Name
// -----------------------------------------------------------------------------

/// Interned, immutable identifier representing a runtime-wide static string.
///
/// Names are lightweight handles (32-bit slot indices) to globally interned
/// strings. They provide fast equality comparisons and efficient memory
/// usage for string values that appear multiple times in the system.
///
/// # Equality and Ordering
///
/// Equality comparisons are performed on slot indices (O(1)), while
/// ordering comparisons delegate to the underlying string values (O(n)).
///
/// # Examples
///
/// ```
/// use lexicon::core::Name;
///
/// let n1 = Name::new("hello");
/// let n2 = Name::new("hello");
///
/// assert_eq!(n1, n2);               // Fast: compares slot indices
/// assert_eq!(n1.as_str(), "hello"); // Zero-copy string access
/// ```
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct Name {
  slot: u32,
}

impl Name {
  /// Name representing the empty string.
  pub const EMPTY: Self = Self::from_slot(0);

  /// Name of the protected core namespace.
  pub const CORE: Self = Self::from_slot(1);

  /// Constructs a name from a raw name table slot.
  #[inline]
  pub(crate) const fn from_slot(slot: u32) -> Self {
    Self { slot }
  }

  /// Returns the name table slot backing this name.
  #[inline]
  pub(crate) const fn into_slot(self) -> u32 {
    self.slot
  }

  /// Interns a string and returns its corresponding name.
  ///
  /// If the string has been interned before, returns the existing name.
  /// Otherwise, allocates a new slot in the global name table.
  ///
  /// # Panics
  ///
  /// Panics if the string exceeds [`MAX_NAME_BYTES`] or the name table
  /// has reached [`MAX_NAME_COUNT`] capacity.
  ///
  /// [`MAX_NAME_BYTES`]: crate::consts::MAX_NAME_BYTES
  /// [`MAX_NAME_COUNT`]: crate::consts::MAX_NAME_COUNT
  #[inline]
  pub fn new(data: &str) -> Self {
    match NAME_TABLE.insert(data) {
      Ok(slot) => Self::from_slot(slot),
      Err(error) => raise!(SysCap, error),
    }
  }

  /// Returns the string value associated with this name.
  ///
  /// This operation is zero-copy and returns a reference to the interned
  /// string with a `'static` lifetime.
  #[inline]
  pub fn as_str(&self) -> &'static str {
    match NAME_TABLE.lookup(self.slot) {
      Ok(data) => data,
      Err(error) => fatal!(error),
    }
  }
}

impl Debug for Name {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for Name {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self.as_str(), f)
  }
}

impl Default for Name {
  #[inline]
  fn default() -> Self {
    Self::EMPTY
  }
}

impl PartialOrd for Name {
  #[inline]
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Name {
  #[inline]
  fn cmp(&self, other: &Self) -> Ordering {
    Ord::cmp(self.as_str(), other.as_str())
  }
}

impl Deref for Name {
  type Target = str;

  #[inline]
  fn deref(&self) -> &Self::Target {
    self.as_str()
  }
}

impl From<&str> for Name {
  #[inline]
  fn from(other: &str) -> Name {
    Name::new(other)
  }
}

impl From<String> for Name {
  #[inline]
  fn from(other: String) -> Name {
    Name::new(other.as_str())
  }
}

impl From<Name> for &'static str {
  #[inline]
  fn from(other: Name) -> &'static str {
    other.as_str()
  }
}

impl From<Name> for Cow<'static, str> {
  #[inline]
  fn from(other: Name) -> Self {
    Cow::Borrowed(other.as_str())
  }
}

// -----------------------------------------------------------------------------
// Symbol
// -----------------------------------------------------------------------------

/// Interned, immutable `(qualifier, name)` pair.
///
/// Symbols are the key type of every table in this core. Both components
/// are interned [`Name`]s, so equality and hashing operate on slot indices
/// and two symbols built from the same strings are always identical.
///
/// A symbol is *qualified* when it carries a namespace qualifier. Only
/// unqualified symbols may be interned or unmapped in a namespace.
///
/// # Examples
///
/// ```
/// use lexicon::core::Symbol;
///
/// let plain = Symbol::new("answer");
/// let scoped = Symbol::new("app.main/answer");
///
/// assert!(!plain.is_qualified());
/// assert!(scoped.is_qualified());
/// assert_eq!(scoped.qualifier(), Some("app.main"));
/// assert_eq!(scoped.name(), "answer");
/// ```
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct Symbol {
  qual: Option<Name>,
  name: Name,
}

impl Symbol {
  /// Symbol naming the protected core namespace.
  pub const CORE_NAMESPACE: Self = Self {
    qual: None,
    name: Name::CORE,
  };

  /// Interns a symbol from its printed representation.
  ///
  /// Everything before the first `/` becomes the qualifier; the remainder
  /// becomes the name. A string without a `/`, or the string `"/"` itself,
  /// produces an unqualified symbol.
  ///
  /// # Panics
  ///
  /// Panics under the same capacity conditions as [`Name::new`].
  #[inline]
  pub fn new(data: &str) -> Self {
    match data.find('/') {
      Some(index) if data != "/" => Self {
        qual: Some(Name::new(&data[..index])),
        name: Name::new(&data[index + 1..]),
      },
      Some(_) | None => Self {
        qual: None,
        name: Name::new(data),
      },
    }
  }

  /// Interns a qualified symbol from separate qualifier and name parts.
  #[inline]
  pub fn qualified(qual: &str, name: &str) -> Self {
    Self {
      qual: Some(Name::new(qual)),
      name: Name::new(name),
    }
  }

  /// Constructs an unqualified symbol from an interned name.
  #[inline]
  pub const fn unqualified(name: Name) -> Self {
    Self { qual: None, name }
  }

  /// Returns `true` if this symbol carries a namespace qualifier.
  #[inline]
  pub const fn is_qualified(&self) -> bool {
    self.qual.is_some()
  }

  /// Returns the qualifier string, if any.
  #[inline]
  pub fn qualifier(&self) -> Option<&'static str> {
    self.qual.map(|qual| qual.as_str())
  }

  /// Returns the name string.
  #[inline]
  pub fn name(&self) -> &'static str {
    self.name.as_str()
  }
}

impl Debug for Symbol {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for Symbol {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self.qual {
      Some(qual) => write!(f, "{qual}/{name}", name = self.name),
      None => Display::fmt(&self.name, f),
    }
  }
}

impl PartialOrd for Symbol {
  #[inline]
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Symbol {
  #[inline]
  fn cmp(&self, other: &Self) -> Ordering {
    let this: (Option<&str>, &str) = (self.qualifier(), self.name());
    let that: (Option<&str>, &str) = (other.qualifier(), other.name());

    Ord::cmp(&this, &that)
  }
}

impl From<&str> for Symbol {
  #[inline]
  fn from(other: &str) -> Symbol {
    Symbol::new(other)
  }
}

impl From<Name> for Symbol {
  #[inline]
  fn from(other: Name) -> Symbol {
    Symbol::unqualified(other)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
