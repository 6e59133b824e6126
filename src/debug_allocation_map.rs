//! This module tracks the internal status of allocated objects in
//! debug builds, so contracts on `alloc`/`realloc`/`free` can catch
//! double frees and cross-arena confusion without costing anything in
//! release builds.
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Mutex;

struct AllocationInfo {
    /// Address of the owning `ArenaInner`, used to catch a pointer
    /// from one arena being freed through another.
    arena: usize,
    live: bool,
}

lazy_static::lazy_static! {
    static ref ALLOCATION_STATE_MAP: Mutex<HashMap<usize, AllocationInfo>> = Default::default();
}

/// Marks `alloc` as live, owned by `arena`.  Fails if `alloc` is
/// already recorded as live, catching a fresh bump allocation that
/// landed on an address this crate already handed out.
pub fn mark_allocated(arena: usize, alloc: NonNull<u8>) -> Result<(), &'static str> {
    let mut map = ALLOCATION_STATE_MAP.lock().unwrap();
    let info = map
        .entry(alloc.as_ptr() as usize)
        .or_insert(AllocationInfo { arena, live: false });

    if info.live {
        return Err("double allocation");
    }

    info.arena = arena;
    info.live = true;
    Ok(())
}

/// Marks `alloc`, previously returned for `arena`, as released.
pub fn mark_released(arena: usize, alloc: NonNull<u8>) -> Result<(), &'static str> {
    let mut map = ALLOCATION_STATE_MAP.lock().unwrap();
    let info = map
        .get_mut(&(alloc.as_ptr() as usize))
        .ok_or("released an address this arena never allocated")?;

    if info.arena != arena {
        return Err("arena mismatch");
    }

    if !info.live {
        return Err("double free");
    }

    info.live = false;
    Ok(())
}

/// Forgets every allocation owned by `arena`.  Called on reset and
/// destroy, since both invalidate every outstanding pointer at once.
pub fn forget_arena(arena: usize) {
    let mut map = ALLOCATION_STATE_MAP.lock().unwrap();
    map.retain(|_, info| info.arena != arena);
}
