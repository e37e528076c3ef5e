use std::sync::OnceLock;

use windows_sys::Win32::{
    Foundation::GetLastError,
    System::{
        Memory::{
            MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE, VirtualAlloc, VirtualFree,
            VirtualLock, VirtualUnlock,
        },
        SystemInformation::{GetSystemInfo, SYSTEM_INFO},
    },
};

use crate::pages::round_to_pages;

/// Commits `size` bytes of zero-filled memory, rounded up to the page size.
///
/// # Safety
///
/// The returned pointer must be released with [`free`] using the returned capacity.
pub fn allocate(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    let capacity = round_to_pages(size, get_page_size())?;

    unsafe {
        let ptr = VirtualAlloc(
            std::ptr::null_mut(),
            capacity,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        );

        if ptr.is_null() {
            let error = GetLastError();
            return Err(std::io::Error::from_raw_os_error(error as i32));
        }

        Ok((ptr, capacity))
    }
}

/// Releases memory obtained from [`allocate`].
///
/// # Safety
///
/// - `ptr` was returned by [`allocate`] and `size` is the capacity returned with it
/// - The memory has not already been freed
pub unsafe fn free(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    assert!(size.is_multiple_of(get_page_size()));
    unsafe {
        let result = VirtualFree(ptr, 0, MEM_RELEASE);
        if result == 0 {
            let error = GetLastError();
            return Err(std::io::Error::from_raw_os_error(error as i32));
        }
    }
    Ok(())
}

/// Locks the pages into the process working set.
///
/// The default minimum working set is small; large requests fail with
/// `ERROR_WORKING_SET_QUOTA` unless the process raised it.
///
/// # Safety
///
/// `ptr`/`size` must describe a live region returned by [`allocate`].
pub unsafe fn lock(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    unsafe {
        if VirtualLock(ptr, size) == 0 {
            let error = GetLastError();
            return Err(std::io::Error::from_raw_os_error(error as i32));
        }
    }
    Ok(())
}

/// Reverses [`lock`].
///
/// # Safety
///
/// `ptr`/`size` must describe a live region returned by [`allocate`].
pub unsafe fn unlock(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    unsafe {
        if VirtualUnlock(ptr, size) == 0 {
            let error = GetLastError();
            return Err(std::io::Error::from_raw_os_error(error as i32));
        }
    }
    Ok(())
}

pub fn get_page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| unsafe {
        let mut system_info: SYSTEM_INFO = std::mem::zeroed();
        GetSystemInfo(&mut system_info);
        system_info.dwPageSize as usize
    })
}
