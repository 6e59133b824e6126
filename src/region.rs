//! A `Region` owns exactly one VM mapping and bump-allocates inside
//! it.  Regions are chained into a singly linked list by
//! [`crate::arena::Arena`]; this module only knows about a single
//! region's bookkeeping.
#[cfg(any(
    all(test, feature = "check_contracts_in_tests"),
    feature = "check_contracts"
))]
use contracts::*;
#[cfg(not(any(
    all(test, feature = "check_contracts_in_tests"),
    feature = "check_contracts")))]
use disabled_contracts::*;

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::error::ArenaError;
use crate::header::{self, ALIGN, HEADER_SIZE};
use crate::map;

/// A region's own bookkeeping struct lives at the very start of its
/// mapping: the mapping holds `[Region header][bump-allocated bytes)`.
/// This is what lets [`crate::arena::Arena::destroy`] release every
/// region with a single `munmap` per region and nothing else.
#[repr(C)]
pub(crate) struct Region {
    /// Base address of this region's mapping; also the address of
    /// this `Region` struct, since it is the first thing carved out
    /// of the mapping.
    map_base: NonNull<c_void>,
    /// Total size of the mapping, for `munmap`.
    map_size: usize,

    /// First byte available for bump allocation.
    data: NonNull<u8>,
    /// Bytes usable at or after `data` when the region is empty.
    capacity: usize,
    /// Bytes consumed from `data`, including per-allocation headers.
    used: usize,
    /// Count of live allocations.
    alloc_cnt: usize,
    /// Most recent allocation's payload pointer, or `None`.
    last_alloc: Option<NonNull<u8>>,

    /// Next region in the arena's list, or `None`.
    pub(crate) next: Option<NonNull<Region>>,
}

/// Bytes the `Region` header itself occupies at the front of a
/// mapping, rounded up to [`ALIGN`] so that `data` starts aligned.
const REGION_HEAD_SIZE: usize = header::align_up(std::mem::size_of::<Region>(), ALIGN);

/// Floor applied to a freshly requested region's payload by
/// [`crate::arena::Arena`] when appending a region beyond the first.
/// Shrunk under `test_only_small_constants` so property tests can
/// force many small regions — and so exercise region-list and
/// empty-region-migration edge cases — without needing oversized
/// allocations to do it.
#[cfg(not(feature = "test_only_small_constants"))]
pub(crate) const MIN_REGION_PAYLOAD: usize = 4096;

#[cfg(feature = "test_only_small_constants")]
pub(crate) const MIN_REGION_PAYLOAD: usize = 64;

impl Region {
    /// Maps and initialises a fresh region with at least
    /// `min_user_bytes` of usable capacity once the region header
    /// itself and one allocation header are accounted for, rounded up
    /// to a whole number of pages.
    #[ensures(ret.is_ok() -> unsafe { ret.as_ref().unwrap().as_ref() }.alloc_cnt == 0,
              "A freshly mapped region has no allocations.")]
    #[ensures(ret.is_ok() -> unsafe { ret.as_ref().unwrap().as_ref() }.used == 0)]
    pub(crate) fn new_mapped(
        min_user_bytes: usize,
        page_size: usize,
    ) -> Result<NonNull<Region>, ArenaError> {
        let wanted = REGION_HEAD_SIZE
            .checked_add(HEADER_SIZE)
            .and_then(|x| x.checked_add(min_user_bytes))
            .ok_or(ArenaError::MapFailed { errno: libc::EOVERFLOW })?;
        let map_size = map::round_up_to_page(wanted, page_size)
            .ok_or(ArenaError::MapFailed { errno: libc::EOVERFLOW })?;

        let map_base = map::map_region(map_size)?;
        let region_ptr = map_base.as_ptr() as *mut Region;

        let data = NonNull::new(unsafe { (map_base.as_ptr() as *mut u8).add(REGION_HEAD_SIZE) })
            .expect("offset from a non-null base is non-null");

        unsafe {
            region_ptr.write(Region {
                map_base,
                map_size,
                data,
                capacity: map_size - REGION_HEAD_SIZE,
                used: 0,
                alloc_cnt: 0,
                last_alloc: None,
                next: None,
            });
        }

        Ok(NonNull::new(region_ptr).expect("derived from a non-null base"))
    }

    /// Releases this region's mapping.  Does not touch `next`: the
    /// caller owns list traversal.
    ///
    /// # Safety
    ///
    /// `region` must not be used, directly or via any pointer it
    /// handed out, after this call.
    pub(crate) unsafe fn unmap(region: NonNull<Region>) {
        let this = region.as_ref();
        map::unmap_region(this.map_base, this.map_size);
    }

    /// Carves `bytes` off the front of this (otherwise untouched)
    /// region's data area, for the arena struct or the embed scratch.
    /// Only valid before any bump allocation has happened.
    #[requires(self.used == 0 && self.alloc_cnt == 0,
               "Prefixes may only be carved from a region before it services allocations.")]
    #[requires(bytes <= self.capacity, "There must be room for the prefix.")]
    pub(crate) fn carve_prefix(&mut self, bytes: usize) -> NonNull<u8> {
        let carved = self.data;

        self.data = NonNull::new(unsafe { self.data.as_ptr().add(bytes) })
            .expect("offset from a non-null pointer is non-null");
        self.capacity -= bytes;

        carved
    }

    /// Bytes available for a new allocation's payload, after
    /// reserving room for its header.
    #[inline]
    pub(crate) fn free_space(&self) -> usize {
        self.capacity
            .saturating_sub(self.used)
            .saturating_sub(HEADER_SIZE)
    }

    /// Attempts to bump-allocate `size` bytes in this region.
    #[requires(size > 0)]
    #[ensures(ret.is_some() -> self.alloc_cnt == old(self.alloc_cnt) + 1)]
    #[ensures(ret.is_some() -> self.last_alloc == ret)]
    pub(crate) fn try_alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.free_space() < size {
            return None;
        }

        let payload = NonNull::new(unsafe { self.data.as_ptr().add(self.used + HEADER_SIZE) })
            .expect("offset from a non-null pointer is non-null");

        unsafe { header::write_header(payload, size) };

        self.used += size + HEADER_SIZE;
        self.last_alloc = Some(payload);
        self.alloc_cnt += 1;

        Some(payload)
    }

    /// Returns whether `ptr`'s payload lies inside this region's
    /// currently used bytes.
    #[inline]
    pub(crate) fn owns(&self, ptr: NonNull<u8>) -> bool {
        let begin = self.data.as_ptr() as usize;
        let end = begin + self.used;
        let addr = ptr.as_ptr() as usize;

        addr >= begin && addr < end
    }

    #[inline]
    pub(crate) fn is_last_alloc(&self, ptr: NonNull<u8>) -> bool {
        self.last_alloc == Some(ptr)
    }

    /// Grows this region's most recent allocation in place by `delta`
    /// bytes.  Caller is responsible for the header update and for
    /// checking `free_space() >= delta` first.
    #[requires(self.last_alloc.is_some())]
    pub(crate) fn grow_last_in_place(&mut self, delta: usize) {
        self.used += delta;
    }

    /// Unwinds the most recent allocation, whose recorded size is
    /// `old_size`.  Returns whether the region is now empty.
    #[requires(self.last_alloc.is_some())]
    #[ensures(self.last_alloc.is_none())]
    pub(crate) fn free_last(&mut self, old_size: usize) -> bool {
        self.used -= old_size + HEADER_SIZE;
        self.last_alloc = None;
        self.alloc_cnt -= 1;

        self.alloc_cnt == 0
    }

    /// Accounts for the release of a non-last, still-live allocation.
    /// When this was the final live allocation in the region, reclaims
    /// the whole region's `used` bytes en masse.  Returns whether the
    /// region is now empty.
    pub(crate) fn free_other(&mut self) -> bool {
        self.alloc_cnt = self.alloc_cnt.saturating_sub(1);

        if self.alloc_cnt == 0 {
            self.used = 0;
            self.last_alloc = None;
            true
        } else {
            false
        }
    }

    /// Clears this region for reuse, preserving its mapping.
    pub(crate) fn reset(&mut self) {
        self.used = 0;
        self.alloc_cnt = 0;
        self.last_alloc = None;
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.alloc_cnt == 0
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    #[cfg(test)]
    pub(crate) fn alloc_cnt(&self) -> usize {
        self.alloc_cnt
    }

    #[cfg(test)]
    pub(crate) fn last_alloc(&self) -> Option<NonNull<u8>> {
        self.last_alloc
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_mapped_has_room_for_request() {
        let region = Region::new_mapped(64, map::page_size()).expect("should map");
        let region = unsafe { region.as_ref() };

        assert_eq!(region.used, 0);
        assert_eq!(region.alloc_cnt, 0);
        assert!(region.free_space() >= 64);

        unsafe { Region::unmap(NonNull::from(region)) };
    }

    #[test]
    fn alloc_and_unwind() {
        let mut region = Region::new_mapped(256, map::page_size()).expect("should map");
        let r = unsafe { region.as_mut() };

        let p = r.try_alloc(32).expect("should allocate");
        assert!(r.is_last_alloc(p));
        assert_eq!(r.alloc_cnt, 1);

        assert!(r.free_last(32));
        assert_eq!(r.alloc_cnt, 0);
        assert_eq!(r.used, 0);
        assert!(r.last_alloc.is_none());

        unsafe { Region::unmap(region) };
    }

    #[test]
    fn free_other_reclaims_en_masse_when_last() {
        let mut region = Region::new_mapped(256, map::page_size()).expect("should map");
        let r = unsafe { region.as_mut() };

        let a = r.try_alloc(16).expect("should allocate");
        let _b = r.try_alloc(16).expect("should allocate");

        // `a` is not the last allocation: freeing it only drops the count.
        assert!(r.owns(a));
        assert!(!r.free_other());
        assert_eq!(r.alloc_cnt, 1);
        assert!(r.used > 0);

        // freeing the remaining allocation (now effectively the only
        // live one) reclaims everything.
        assert!(r.free_other());
        assert_eq!(r.used, 0);

        unsafe { Region::unmap(region) };
    }
}
