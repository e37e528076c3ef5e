use std::alloc::{Layout, alloc_zeroed, dealloc};

use crate::pages::round_to_pages;

/// Allocates zero-filled, page-aligned memory from the global allocator.
///
/// Page locking is not available on this platform; see [`lock`].
pub fn allocate(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    let page_size = get_page_size();
    let capacity = round_to_pages(size, page_size)?;

    let layout = Layout::from_size_align(capacity, page_size)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid layout"))?;

    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::OutOfMemory,
            "Failed to allocate memory",
        ));
    }

    Ok((ptr as *mut std::ffi::c_void, capacity))
}

/// Frees memory obtained from [`allocate`].
///
/// # Safety
///
/// `ptr` was returned by [`allocate`] and `size` is the capacity returned with it.
pub unsafe fn free(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let page_size = get_page_size();
    assert!(size.is_multiple_of(page_size));

    let layout = Layout::from_size_align(size, page_size)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid layout"))?;

    unsafe {
        dealloc(ptr as *mut u8, layout);
    }
    Ok(())
}

/// # Safety
///
/// Always safe; the arguments are not inspected.
pub unsafe fn lock(_ptr: *mut std::ffi::c_void, _size: usize) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "page locking is not supported on this platform",
    ))
}

/// # Safety
///
/// Always safe; the arguments are not inspected.
pub unsafe fn unlock(_ptr: *mut std::ffi::c_void, _size: usize) -> std::io::Result<()> {
    Ok(())
}

/// Returns the emulated page size in bytes.
pub fn get_page_size() -> usize {
    4 * 1024
}
