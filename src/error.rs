//! The one error condition a caller of this crate can act on: the OS
//! refused to back a new region with memory.
use std::fmt;

/// Failure mode for arena and region construction.
///
/// Every other failure (null/zero-sized input, a foreign pointer
/// passed to `free`, ...) is folded into `None` or a silent no-op, per
/// the allocation family's contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// `mmap` failed; `errno` is the raw OS error code.
    MapFailed { errno: i32 },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::MapFailed { errno } => {
                write!(f, "failed to map a new region: errno={}", errno)
            }
        }
    }
}

impl std::error::Error for ArenaError {}
