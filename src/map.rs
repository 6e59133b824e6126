//! Thin wrappers around `mmap`/`munmap` for acquiring page-granular,
//! zero-filled anonymous memory.
use std::ffi::c_void;
use std::ptr::NonNull;

use crate::error::ArenaError;

fn page_size_or_die() -> usize {
    let ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

    if ret <= 0 {
        panic!("unable to determine page size: errno={}", unsafe {
            *libc::__errno_location()
        });
    }

    ret as usize
}

lazy_static::lazy_static! {
    static ref PAGE_SIZE: usize = page_size_or_die();
}

/// Returns the system page size.
#[inline]
pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// Rounds `size` up to the next multiple of `page_size`, or `None` on
/// overflow.
#[inline]
pub fn round_up_to_page(size: usize, page_size: usize) -> Option<usize> {
    debug_assert!(page_size > 0 && page_size & (page_size - 1) == 0);

    let mask = page_size - 1;
    size.checked_add(mask).map(|sum| sum & !mask)
}

/// Reserves and immediately backs a region of `size` anonymous,
/// zero-filled bytes.
///
/// `size` must be a non-zero multiple of the page size.
pub fn map_region(size: usize) -> Result<NonNull<c_void>, ArenaError> {
    assert!(
        size > 0 && (size % page_size()) == 0,
        "bad region size={} page_size={}",
        size,
        page_size()
    );

    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        let errno = unsafe { *libc::__errno_location() };
        log::debug!("mmap of {} bytes failed: errno={}", size, errno);
        return Err(ArenaError::MapFailed { errno });
    }

    log::trace!("mapped region base={:p} size={}", ptr, size);
    Ok(NonNull::new(ptr).expect("mmap does not return NULL on success"))
}

/// Releases a region of `size` bytes starting at `base`, previously
/// returned by a single call to [`map_region`].
///
/// # Safety
///
/// `base` and `size` must describe exactly one mapping returned by
/// [`map_region`]; the caller must not use any pointer into that
/// mapping afterward.
pub unsafe fn unmap_region(base: NonNull<c_void>, size: usize) {
    if size == 0 {
        return;
    }

    assert!(
        (size % page_size()) == 0,
        "bad region size={} page_size={}",
        size,
        page_size()
    );

    let ret = libc::munmap(base.as_ptr(), size);
    debug_assert_eq!(ret, 0, "munmap should not fail for a valid mapping");
    log::trace!("unmapped region base={:p} size={}", base.as_ptr(), size);
}
