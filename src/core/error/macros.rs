//! Internal error handling macros.
//!
//! Provides two categories of error handling:
//!
//! - [`fatal!`]: For unrecoverable runtime bugs (invariant violations)
//! - [`raise!`]: For recoverable system errors (capacity limits)

/// Displays a system error message and aborts the program.
///
/// Use this for unrecoverable errors that indicate bugs in the core
/// implementation itself. The program prints a diagnostic message and
/// immediately aborts without unwinding.
///
/// # Examples
///
/// ```ignore
/// if table.lookup(slot).is_err() {
///   fatal!("dangling name table slot");
/// }
/// ```
macro_rules! fatal {
  ($error:expr) => {{
    ::std::eprintln!(
      "{}:{}: (SysInv) a system invariant has been broken: {}",
      ::std::file!(),
      ::std::line!(),
      $error,
    );

    ::std::process::abort();
  }};
}

/// Panics with a recoverable system error.
///
/// Use this for resource exhaustion that may be recoverable at a higher
/// level. The program panics with a diagnostic message indicating which
/// limit was exceeded.
///
/// # Examples
///
/// ```ignore
/// if names.len() >= MAX_NAME_COUNT {
///   raise!(SysCap, "too many names");
/// }
/// ```
macro_rules! raise {
  (SysCap, $error:expr) => {
    ::std::panic!(
      "{}:{}: (SysCap) a system limit has been reached: {}",
      ::std::file!(),
      ::std::line!(),
      $error,
    )
  };
}

pub(crate) use fatal;
pub(crate) use raise;
