//! A bump-allocating regional memory arena backed by page-granular
//! anonymous `mmap` mappings.
//!
//! Allocations never move once handed out (short of an explicit
//! [`Arena::realloc`] growing past the space left in a region), `free`
//! is best-effort and only reclaims storage when it can do so cheaply,
//! and the whole arena is released with a single pass over its
//! regions.  See [`Arena`] for the full interface.
mod arena;
mod error;
mod header;
mod map;
mod region;

#[cfg(any(
    all(test, feature = "check_contracts_in_tests"),
    feature = "check_contracts"
))]
mod debug_allocation_map;

pub use arena::Arena;
pub use error::ArenaError;
