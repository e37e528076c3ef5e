use std::sync::OnceLock;

use crate::pages::round_to_pages;

/// Maps `size` bytes of anonymous, zero-filled memory.
///
/// The mapping is rounded up to the nearest page boundary; the returned tuple holds
/// the start address and the mapped capacity. The pages are not locked yet, see
/// [`lock`].
///
/// # Safety
///
/// The returned pointer must be released with [`free`] using the returned capacity.
pub fn allocate(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    let capacity = round_to_pages(size, get_page_size())?;
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            capacity,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr.is_null() || ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    Ok((ptr, capacity))
}

/// Unmaps memory obtained from [`allocate`].
///
/// # Safety
///
/// - `ptr` was returned by [`allocate`] and `size` is the capacity returned with it
/// - The memory has not already been freed
pub unsafe fn free(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let res = unsafe { libc::munmap(ptr, size) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Locks the pages of a mapping into RAM so that they cannot be swapped out.
///
/// Fails with `EPERM`/`ENOMEM` when the process exceeds `RLIMIT_MEMLOCK`.
///
/// # Safety
///
/// `ptr`/`size` must describe a live mapping returned by [`allocate`].
pub unsafe fn lock(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let res = unsafe { libc::mlock(ptr, size) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Reverses [`lock`].
///
/// # Safety
///
/// `ptr`/`size` must describe a live mapping returned by [`allocate`].
pub unsafe fn unlock(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let res = unsafe { libc::munlock(ptr, size) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Gets the system's standard page size in bytes (cached after the first call).
///
/// Falls back to 4KB when `sysconf(_SC_PAGESIZE)` fails.
pub fn get_page_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| read_page_size().unwrap_or(4 * 1024))
}

fn read_page_size() -> std::io::Result<usize> {
    let res = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    assert!(res < i32::MAX as _);
    Ok(res as usize)
}
