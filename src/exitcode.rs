//! Exit codes of the marks CLI.
//!
//! These follow the BSD `sysexits` convention where possible.

/// Command line usage error - invalid arguments, missing `--force`, etc.
pub const USAGE: i32 = 64;

/// Duplicate: the url is already stored
pub const DUP: i32 = 65;

/// No bookmark, backup or database matched
pub const NOINPUT: i32 = 66;

/// The database could not be opened or the connection is gone
pub const UNAVAILABLE: i32 = 69;

/// Internal storage failure
pub const SOFTWARE: i32 = 70;

/// File system error
pub const IOERR: i32 = 74;

