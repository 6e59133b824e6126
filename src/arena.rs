//! The `Arena` is the public entry point: it owns the region list and
//! implements every allocation-family operation in terms of
//! [`crate::region::Region`].
#[cfg(any(
    all(test, feature = "check_contracts_in_tests"),
    feature = "check_contracts"
))]
use contracts::*;
#[cfg(not(any(
    all(test, feature = "check_contracts_in_tests"),
    feature = "check_contracts")))]
use disabled_contracts::*;

use std::mem::size_of;
use std::ptr::NonNull;

#[cfg(any(
    all(test, feature = "check_contracts_in_tests"),
    feature = "check_contracts"
))]
use crate::debug_allocation_map;

use crate::error::ArenaError;
use crate::header::{self, ALIGN};
use crate::map;
use crate::region::Region;

/// Arena-wide bookkeeping.  This struct is itself carved out of the
/// first region's data area (see [`build`]): the arena owns no
/// separate heap allocation of its own, which is what lets
/// [`Arena::destroy`] reduce to "unmap every region".
struct ArenaInner {
    pagesize: usize,
    default_size: usize,
    embed: usize,
    head: NonNull<Region>,
    /// Allocation search starts here.  A hint, not the physical last
    /// node: see the module-level notes on region recycling.
    tail: NonNull<Region>,
}

/// A bump-allocating regional memory arena.
///
/// `Arena` is neither `Send` nor `Sync`: it is a single-owner resource
/// whose regions are plain, non-atomic bookkeeping, and concurrent use
/// from multiple threads is undefined (see the crate's concurrency
/// notes). Dropping an `Arena` unmaps every region; [`Arena::destroy`]
/// does the same thing more explicitly.
pub struct Arena {
    inner: NonNull<ArenaInner>,
}

// `NonNull` is itself `!Send`/`!Sync`, so this holds without any extra
// work; pinned here so a future refactor can't accidentally make
// `Arena` shareable across threads without this assertion failing.
static_assertions::assert_not_impl_any!(Arena: Send, Sync);

/// Lays out a fresh arena: maps a first region sized to hold the
/// `ArenaInner` struct, `embed_size` bytes of caller scratch, and
/// `size` bytes of headroom for the first real allocations.
fn build(size: usize, embed_size: usize) -> Result<(NonNull<ArenaInner>, NonNull<u8>), ArenaError> {
    let page_size = map::page_size();
    let size = if size == 0 { page_size } else { size };

    let arena_head = header::align_up(size_of::<ArenaInner>(), ALIGN);
    let embed_aligned = header::checked_align_up(embed_size, ALIGN)
        .ok_or(ArenaError::MapFailed { errno: libc::EOVERFLOW })?;

    let min_user_bytes = size
        .checked_add(arena_head)
        .and_then(|x| x.checked_add(embed_aligned))
        .ok_or(ArenaError::MapFailed { errno: libc::EOVERFLOW })?;

    let mut region = Region::new_mapped(min_user_bytes, page_size)?;
    let r = unsafe { region.as_mut() };

    let arena_ptr = r.carve_prefix(arena_head).cast::<ArenaInner>();
    let embed_ptr = r.carve_prefix(embed_aligned);

    unsafe {
        arena_ptr.as_ptr().write(ArenaInner {
            pagesize: page_size,
            // `size` excludes the arena struct and embed scratch:
            // later regions never re-pay for the first region's
            // self-embedding overhead (`Region::new_mapped` adds the
            // per-region overhead uniformly for every region).
            default_size: size,
            embed: embed_aligned,
            head: region,
            tail: region,
        });
    }

    log::debug!(
        "new arena {:p}: size={} embed={} page_size={}",
        arena_ptr.as_ptr(),
        size,
        embed_aligned,
        page_size
    );

    Ok((arena_ptr, embed_ptr))
}

impl Arena {
    /// Creates a new arena whose first region comfortably fits `size`
    /// bytes of allocations.  `size == 0` uses the page size.
    #[ensures(ret.is_ok() -> unsafe { ret.as_ref().unwrap().inner_ref() }.head ==
              unsafe { ret.as_ref().unwrap().inner_ref() }.tail,
              "A freshly built arena has a single region.")]
    pub fn new(size: usize) -> Result<Arena, ArenaError> {
        let (inner, _embed) = build(size, 0)?;
        Ok(Arena { inner })
    }

    /// As [`Arena::new`], but additionally carves out `embed_size`
    /// bytes of caller-owned scratch from the first region. The
    /// scratch pointer is returned alongside the arena and survives
    /// [`Arena::reset`]; it is released only when the arena is
    /// destroyed.
    pub fn new_embed(size: usize, embed_size: usize) -> Result<(Arena, NonNull<u8>), ArenaError> {
        let (inner, embed) = build(size, embed_size)?;
        Ok((Arena { inner }, embed))
    }

    #[inline]
    fn inner_ref(&self) -> &ArenaInner {
        unsafe { self.inner.as_ref() }
    }

    #[inline]
    fn inner_mut(&mut self) -> &mut ArenaInner {
        unsafe { self.inner.as_mut() }
    }

    /// Stable identity for this arena, used to key the debug
    /// allocation map; valid for the arena's whole lifetime since its
    /// `ArenaInner` never moves once mapped.
    #[inline]
    fn id(&self) -> usize {
        self.inner.as_ptr() as usize
    }

    /// Checks the structural invariants from the data model: every
    /// region's `used` fits its `capacity`, empty regions carry no
    /// dangling `last_alloc`, and `tail` is reachable from `head`.
    #[cfg(any(
        all(test, feature = "check_contracts_in_tests"),
        feature = "check_contracts"
    ))]
    fn check_rep(&self) -> Result<(), &'static str> {
        let inner = self.inner_ref();
        let mut cursor = Some(inner.head);
        let mut seen_tail = false;

        while let Some(region) = cursor {
            let r = unsafe { region.as_ref() };

            if r.used() > r.capacity() {
                return Err("region used exceeds capacity");
            }
            if r.is_empty() && r.last_alloc().is_some() {
                return Err("empty region still has a last_alloc");
            }
            if region == inner.tail {
                seen_tail = true;
            }

            cursor = r.next;
        }

        if !seen_tail {
            return Err("tail is not reachable from head");
        }

        Ok(())
    }

    /// Finds a region at or after `tail` with room for `size` bytes,
    /// mapping a fresh one and appending it at the physical end of
    /// the list if none qualifies.
    fn region_for(&mut self, size: usize) -> Result<NonNull<Region>, ArenaError> {
        let inner = self.inner_ref();
        let mut cursor = inner.tail;

        loop {
            if unsafe { cursor.as_ref() }.free_space() >= size {
                return Ok(cursor);
            }

            match unsafe { cursor.as_ref() }.next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        let target = [self.inner_ref().default_size, size, crate::region::MIN_REGION_PAYLOAD]
            .into_iter()
            .max()
            .copied()
            .expect("non-empty");
        let new_region = Region::new_mapped(target, self.inner_ref().pagesize)?;

        unsafe { cursor.as_mut() }.next = Some(new_region);
        Ok(new_region)
    }

    /// Returns a fresh, `ALIGN`-aligned allocation of `size` bytes, or
    /// `None` if `size == 0` or the backing mapping could not grow.
    #[invariant(self.check_rep().is_ok())]
    #[ensures(ret.is_some() -> unsafe { header::read_header(ret.unwrap()) } == size,
              "The header records exactly the requested size.")]
    #[ensures(ret.is_some() -> (ret.unwrap().as_ptr() as usize) % ALIGN == 0,
              "Every allocation is aligned to ALIGN.")]
    #[ensures(ret.is_some() -> debug_allocation_map::mark_allocated(self.id(), ret.unwrap()).is_ok(),
              "Fresh allocations never land on an address this arena already has live.")]
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        let mut region = self.region_for(size).ok()?;
        let payload = unsafe { region.as_mut() }
            .try_alloc(size)
            .expect("region_for only returns regions with enough free_space");

        self.inner_mut().tail = region;

        Some(payload)
    }

    /// Resizes `ptr`, previously returned by this arena, to
    /// `new_size` bytes.  Semantics are asymmetric: shrinking always
    /// succeeds in place and never reclaims storage; growing succeeds
    /// in place only when `ptr` is the most recent allocation in its
    /// region and there is room, and otherwise falls back to a fresh
    /// allocation plus a copy, abandoning the old storage.
    #[invariant(self.check_rep().is_ok())]
    #[ensures(ret.is_some() -> unsafe { header::read_header(ret.unwrap()) } == new_size)]
    pub fn realloc(&mut self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        let ptr = match ptr {
            None => return self.alloc(new_size),
            Some(ptr) => ptr,
        };

        if new_size == 0 {
            return None;
        }

        let old_size = unsafe { header::read_header(ptr) };

        if new_size <= old_size {
            unsafe { header::write_header(ptr, new_size) };
            return Some(ptr);
        }

        let delta = new_size - old_size;
        let mut cursor = Some(self.inner_ref().head);

        while let Some(mut region) = cursor {
            let r = unsafe { region.as_mut() };

            if r.is_last_alloc(ptr) && r.free_space() >= delta {
                r.grow_last_in_place(delta);
                unsafe { header::write_header(ptr, new_size) };
                return Some(ptr);
            }

            cursor = r.next;
        }

        // Grow by copy: the old storage is abandoned until the
        // surrounding region is fully freed or the arena is reset.
        let new_ptr = self.alloc(new_size)?;
        unsafe { std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size) };
        Some(new_ptr)
    }

    /// Best-effort free: reclaims storage only when `ptr` is the most
    /// recent allocation in its region, otherwise only drops the
    /// region's live count (reclaiming the whole region en masse once
    /// that count reaches zero). A `ptr` that does not belong to this
    /// arena is a silent no-op.
    #[invariant(self.check_rep().is_ok())]
    pub fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return,
        };

        let mut cursor = Some(self.inner_ref().head);

        while let Some(mut region) = cursor {
            let r = unsafe { region.as_mut() };

            if r.owns(ptr) {
                #[cfg(any(
                    all(test, feature = "check_contracts_in_tests"),
                    feature = "check_contracts"
                ))]
                debug_allocation_map::mark_released(self.id(), ptr)
                    .expect("double free of a live allocation");

                let became_empty = if r.is_last_alloc(ptr) {
                    let old_size = unsafe { header::read_header(ptr) };
                    r.free_last(old_size)
                } else {
                    r.free_other()
                };

                if became_empty {
                    log::trace!("region {:p} became empty, migrating to end", region.as_ptr());
                    self.migrate_empty_to_end(region);
                }

                return;
            }

            cursor = r.next;
        }

        // Foreign pointer: safe no-op.
    }

    /// Moves a newly empty `region` strictly after `tail` in list
    /// order, so it stops being searched until every region from
    /// `tail` onward has been exhausted, while remaining available for
    /// a future allocation.
    fn migrate_empty_to_end(&mut self, mut region: NonNull<Region>) {
        let inner = self.inner_mut();

        if region == inner.tail {
            // It remains the allocation hint; leave it in place. This
            // also covers the singleton arena, since the only region
            // is always both head and tail.
            return;
        }

        if inner.head == region {
            inner.head = unsafe { region.as_ref() }
                .next
                .expect("a non-tail region that is also head must have a successor");
        } else {
            let mut prev = inner.head;
            loop {
                let next = unsafe { prev.as_ref() }
                    .next
                    .expect("region must be reachable from head");
                if next == region {
                    break;
                }
                prev = next;
            }
            unsafe { prev.as_mut() }.next = unsafe { region.as_ref() }.next;
        }

        let mut last = inner.head;
        while let Some(next) = unsafe { last.as_ref() }.next {
            last = next;
        }

        unsafe { region.as_mut() }.next = None;
        unsafe { last.as_mut() }.next = Some(region);
    }

    /// Clears every region for reuse. The embed scratch and the arena
    /// struct's placement are untouched; no mapping is released.
    #[invariant(self.check_rep().is_ok())]
    pub fn reset(&mut self) {
        let head = self.inner_ref().head;
        let mut cursor = Some(head);

        while let Some(mut region) = cursor {
            let r = unsafe { region.as_mut() };
            r.reset();
            cursor = r.next;
        }

        self.inner_mut().tail = head;

        #[cfg(any(
            all(test, feature = "check_contracts_in_tests"),
            feature = "check_contracts"
        ))]
        debug_allocation_map::forget_arena(self.id());
    }

    /// Unmaps every region. The arena is invalid afterward.
    ///
    /// Equivalent to letting the arena drop; spelled out explicitly so
    /// callers can name the operation the way the source does.
    pub fn destroy(self) {}

    /// Returns the size recorded for `ptr`, or `0` for `None`.
    ///
    /// # Safety-adjacent note
    ///
    /// `ptr` must be `None` or a pointer this arena previously
    /// returned and that has not since been invalidated by `reset` or
    /// `destroy`; passing a foreign pointer is undefined, matching the
    /// source's lack of a check here.
    pub fn memsize(&self, ptr: Option<NonNull<u8>>) -> usize {
        match ptr {
            Some(ptr) => unsafe { header::read_header(ptr) },
            None => 0,
        }
    }

    /// Returns a copy of `bytes` allocated in this arena.
    pub fn memdup(&mut self, bytes: &[u8]) -> Option<NonNull<u8>> {
        let dst = self.alloc(bytes.len())?;
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.as_ptr(), bytes.len()) };
        Some(dst)
    }

    /// Returns a NUL-terminated copy of `s`, allocated in this arena.
    pub fn strdup(&mut self, s: &str) -> Option<NonNull<u8>> {
        self.strndup(s, s.len())
    }

    /// Returns a NUL-terminated copy of at most `length` bytes of `s`,
    /// allocated in this arena. `length` is clamped to `s.len()`.
    pub fn strndup(&mut self, s: &str, length: usize) -> Option<NonNull<u8>> {
        let length = length.min(s.len());
        let total = length.checked_add(1)?;

        let dst = self.alloc(total)?;
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), dst.as_ptr(), length);
            *dst.as_ptr().add(length) = 0;
        }
        Some(dst)
    }

    /// Writes a human-readable summary of this arena's regions to the
    /// trace log. Formatting is not part of this crate's stable
    /// interface.
    pub fn dump(&self) {
        let inner = self.inner_ref();
        let mut total = 0usize;
        let mut used = 0usize;
        let mut cursor = Some(inner.head);
        let mut index = 0usize;

        log::info!("arena {:p}", self.inner.as_ptr());
        log::info!("  page size      {}", inner.pagesize);
        log::info!("  default size   {}", inner.default_size);
        log::info!("  embed          {}", inner.embed);

        while let Some(region) = cursor {
            let r = unsafe { region.as_ref() };
            log::info!(
                "  region {:3}: capacity={:8} used={:8}",
                index,
                r.capacity(),
                r.used()
            );

            total += r.capacity();
            used += r.used();
            index += 1;
            cursor = r.next;
        }

        log::info!(
            "  total={} used={} ({:.2}%)",
            total,
            used,
            if total == 0 {
                0.0
            } else {
                100.0 * used as f64 / total as f64
            }
        );
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let head = self.inner_ref().head;
        let arena_id = self.id();
        let mut cursor = Some(head);

        while let Some(region) = cursor {
            // Read `next` before unmapping: once a region's mapping is
            // released, its memory (and, for the first region, the
            // `ArenaInner` this very loop reads from) is gone.
            let next = unsafe { region.as_ref() }.next;
            unsafe { Region::unmap(region) };
            cursor = next;
        }

        #[cfg(any(
            all(test, feature = "check_contracts_in_tests"),
            feature = "check_contracts"
        ))]
        debug_allocation_map::forget_arena(arena_id);
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.inner.as_ptr())
            .field("pagesize", &self.inner_ref().pagesize)
            .field("default_size", &self.inner_ref().default_size)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn construction() {
        let arena = Arena::new(0).expect("should build");
        assert_eq!(arena.inner_ref().head, arena.inner_ref().tail);
        assert_eq!(arena.inner_ref().pagesize, map::page_size());
    }

    // S1: free the single allocation in a fresh region, then
    // re-allocate the same size; the bump pointer unwinds exactly.
    #[test]
    fn scenario_s1_unwind_and_reuse() {
        let mut arena = Arena::new(0).expect("should build");

        let p1 = arena.alloc(12).expect("should allocate");
        assert_eq!(arena.memsize(Some(p1)), 12);
        assert_eq!(p1.as_ptr() as usize % ALIGN, 0);

        arena.free(Some(p1));

        let p2 = arena.alloc(12).expect("should allocate");
        assert_eq!(p1, p2, "unwound space should be reused at the same address");
    }

    // S2: growing the last allocation in place keeps its address.
    #[test]
    fn scenario_s2_grow_last_in_place() {
        let mut arena = Arena::new(0).expect("should build");

        let p = arena.alloc(12).expect("should allocate");
        let q = arena.realloc(Some(p), 24).expect("should grow");

        assert_eq!(p, q);
        assert_eq!(arena.memsize(Some(q)), 24);
    }

    // S3: growing a non-last allocation copies to a fresh address and
    // preserves the original bytes.
    #[test]
    fn scenario_s3_grow_by_copy() {
        let mut arena = Arena::new(0).expect("should build");

        let p = arena.alloc(24).expect("should allocate");
        for i in 0..24u8 {
            unsafe { *p.as_ptr().add(i as usize) = i + 1 };
        }

        let _spacer = arena.alloc(12).expect("should allocate");

        let q = arena.realloc(Some(p), 48).expect("should grow by copy");
        assert_ne!(p, q);
        assert_eq!(arena.memsize(Some(q)), 48);

        for i in 0..24u8 {
            assert_eq!(unsafe { *q.as_ptr().add(i as usize) }, i + 1);
        }
    }

    #[test]
    fn shrink_in_place_keeps_address() {
        let mut arena = Arena::new(0).expect("should build");

        let p = arena.alloc(64).expect("should allocate");
        let q = arena.realloc(Some(p), 8).expect("should shrink");

        assert_eq!(p, q);
        assert_eq!(arena.memsize(Some(q)), 8);
    }

    // S4 / property 8: filling and freeing a whole region migrates it
    // past `tail` instead of leaving it as the search start.
    #[test]
    fn scenario_s4_empty_region_migration() {
        let page = map::page_size();
        let mut arena = Arena::new(page).expect("should build");

        let chunk = page / 4;
        let mut first_region_allocs = Vec::new();

        let region0 = arena.inner_ref().head;

        // Keep allocating until we've moved past region0.
        loop {
            let p = arena.alloc(chunk).expect("should allocate");
            if arena.inner_ref().tail == region0 {
                first_region_allocs.push(p);
            } else {
                break;
            }
        }

        // Force at least a third region to exist, so region0 is no
        // longer anywhere near the search cursor.
        for _ in 0..8 {
            arena.alloc(chunk).expect("should allocate");
        }

        for p in first_region_allocs {
            arena.free(Some(p));
        }

        let r0 = unsafe { region0.as_ref() };
        assert_eq!(r0.alloc_cnt(), 0);
        assert!(r0.last_alloc().is_none());
        assert_ne!(arena.inner_ref().tail, region0);

        // region0 must still be reachable by walking `next` from
        // `tail`: it was migrated, not dropped.
        let mut cursor = Some(arena.inner_ref().tail);
        let mut found = false;
        while let Some(region) = cursor {
            if region == region0 {
                found = true;
                break;
            }
            cursor = unsafe { region.as_ref() }.next;
        }
        assert!(found, "region0 must still be reachable from tail");
    }

    // S5: the embed scratch survives reset.
    #[test]
    fn scenario_s5_embed_survives_reset() {
        let (mut arena, scratch) = Arena::new_embed(0, 64).unwrap_or_else(|e| {
            panic!("should build: {}", e);
        });

        unsafe {
            for i in 0..64u8 {
                *scratch.as_ptr().add(i as usize) = i;
            }
        }

        arena.alloc(32).expect("should allocate");
        arena.reset();

        unsafe {
            for i in 0..64u8 {
                assert_eq!(*scratch.as_ptr().add(i as usize), i);
            }
        }
    }

    // S6.
    #[test]
    fn scenario_s6_memdup() {
        let mut arena = Arena::new(0).expect("should build");

        let mut buf = [0u8; 100];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i + 1) as u8;
        }

        let copy = arena.memdup(&buf).expect("should duplicate");
        assert_ne!(copy.as_ptr() as usize, buf.as_ptr() as usize);

        for (i, b) in buf.iter().enumerate() {
            assert_eq!(unsafe { *copy.as_ptr().add(i) }, *b);
        }
    }

    #[test]
    fn strdup_and_strndup() {
        let mut arena = Arena::new(0).expect("should build");

        let s = arena.strdup("hello").expect("should allocate");
        let bytes = unsafe { std::slice::from_raw_parts(s.as_ptr(), 6) };
        assert_eq!(bytes, b"hello\0");

        let t = arena.strndup("hello world", 5).expect("should allocate");
        let bytes = unsafe { std::slice::from_raw_parts(t.as_ptr(), 6) };
        assert_eq!(bytes, b"hello\0");

        // length longer than the string is clamped.
        let u = arena.strndup("hi", 100).expect("should allocate");
        let bytes = unsafe { std::slice::from_raw_parts(u.as_ptr(), 3) };
        assert_eq!(bytes, b"hi\0");
    }

    #[test]
    fn alloc_rejects_zero_size() {
        let mut arena = Arena::new(0).expect("should build");
        assert!(arena.alloc(0).is_none());
    }

    #[test]
    fn realloc_rejects_zero_size() {
        let mut arena = Arena::new(0).expect("should build");
        let p = arena.alloc(8).expect("should allocate");
        assert!(arena.realloc(Some(p), 0).is_none());
    }

    #[test]
    fn realloc_null_ptr_behaves_like_alloc() {
        let mut arena = Arena::new(0).expect("should build");
        let p = arena.realloc(None, 16).expect("should allocate");
        assert_eq!(arena.memsize(Some(p)), 16);
    }

    #[test]
    fn free_of_foreign_pointer_is_a_no_op() {
        let mut arena = Arena::new(0).expect("should build");
        let mut stack_byte = 0u8;
        let foreign = NonNull::new(&mut stack_byte as *mut u8).unwrap();

        arena.free(Some(foreign));
        // Still usable afterward.
        let p = arena.alloc(8).expect("should allocate");
        assert_eq!(arena.memsize(Some(p)), 8);
    }

    // Property 9: resetting a region that already had room avoids
    // mapping a new one.
    #[test]
    fn reset_idempotence() {
        let mut arena = Arena::new(4096).expect("should build");

        let _ = arena.alloc(256).expect("should allocate");
        let region_count_before = {
            let mut count = 0;
            let mut cursor = Some(arena.inner_ref().head);
            while let Some(r) = cursor {
                count += 1;
                cursor = unsafe { r.as_ref() }.next;
            }
            count
        };

        arena.reset();
        let _ = arena.alloc(256).expect("should allocate after reset");

        let region_count_after = {
            let mut count = 0;
            let mut cursor = Some(arena.inner_ref().head);
            while let Some(r) = cursor {
                count += 1;
                cursor = unsafe { r.as_ref() }.next;
            }
            count
        };

        assert_eq!(region_count_before, region_count_after);
    }

    #[test]
    fn debug_format_does_not_panic() {
        let arena = Arena::new(0).expect("should build");
        let _ = format!("{:?}", arena);
    }

    // Property 11: construction failure is not fatal. `usize::MAX`
    // overflows the overhead-accounting arithmetic in `build` before
    // any `mmap` call is attempted, and must come back as `Err`.
    #[test]
    fn construction_failure_is_not_fatal() {
        let result = Arena::new(usize::MAX);
        assert!(matches!(result, Err(ArenaError::MapFailed { .. })));
    }

    // Property 12: freeing the same live, non-last allocation twice is
    // a double free, and the debug allocation map catches it rather
    // than silently corrupting `alloc_cnt`.
    #[cfg(any(
        all(test, feature = "check_contracts_in_tests"),
        feature = "check_contracts"
    ))]
    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_is_caught_by_the_debug_allocation_map() {
        let mut arena = Arena::new(0).expect("should build");

        let a = arena.alloc(16).expect("should allocate");
        let _b = arena.alloc(16).expect("should allocate");

        arena.free(Some(a));
        arena.free(Some(a));
    }

    #[test]
    fn dump_does_not_panic() {
        let _ = env_logger::try_init();

        let mut arena = Arena::new(0).expect("should build");
        arena.alloc(32).expect("should allocate");
        arena.dump();
    }

    use proptest::collection::vec;
    use proptest::prelude::*;

    proptest! {
        // Allocate and free a random-length run of random sizes,
        // freeing the oldest still-live allocation every third step to
        // exercise both the last-alloc unwind and the non-last
        // decrement-and-reclaim paths. No two simultaneously live
        // allocations should ever share an address.
        #[test]
        fn random_alloc_free_addresses_stay_unique(sizes in vec(1usize..512, 1..200)) {
            let mut arena = Arena::new(0).expect("should build");
            let mut live: Vec<NonNull<u8>> = Vec::new();

            for (i, size) in sizes.iter().enumerate() {
                let p = arena.alloc(*size).expect("should allocate");
                prop_assert!(live.iter().all(|q| *q != p));
                live.push(p);

                if i % 3 == 2 {
                    let freed = live.remove(0);
                    arena.free(Some(freed));
                }
            }
        }
    }
}
