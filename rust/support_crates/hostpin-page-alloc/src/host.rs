//! Host-side pinned allocator backed by page-locked OS pages.
//!
//! `HostPinnedAllocator` is the default [`PinnedAllocator`] when no device driver is
//! attached. Every request maps fresh, zero-filled pages and (depending on the
//! [`LockPolicy`]) locks them into physical memory, which is what a device driver
//! does for its host allocations. Live blocks are recorded so that freeing needs
//! only the pointer, as the driver primitives do.

use std::{
    collections::HashMap,
    ptr::NonNull,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    os,
    pinned::{ErrorCode, PinnedAllocator},
};

/// Controls whether allocated pages are locked into physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Locking must succeed, otherwise the allocation fails.
    Required,
    /// Try to lock; keep the pages unlocked if the OS refuses (e.g. when
    /// `RLIMIT_MEMLOCK` is exhausted).
    #[default]
    BestEffort,
    /// Never lock.
    Disabled,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    len: usize,
    capacity: usize,
    locked: bool,
}

pub struct HostPinnedAllocator {
    device: i32,
    lock_policy: LockPolicy,
    live: Mutex<HashMap<usize, Block>>,
}

impl HostPinnedAllocator {
    /// Creates an allocator for device 0 with [`LockPolicy::BestEffort`].
    pub fn new() -> HostPinnedAllocator {
        HostPinnedAllocator::builder().build()
    }

    pub fn builder() -> HostAllocatorBuilder {
        HostAllocatorBuilder {
            device: None,
            lock_policy: None,
        }
    }

    /// Returns the size of a regular memory page on the current system.
    pub fn regular_page_size() -> usize {
        os::get_page_size()
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// Number of blocks currently allocated.
    pub fn live_allocations(&self) -> usize {
        self.blocks().len()
    }

    /// Total requested size of the blocks currently allocated (not rounded up to pages).
    pub fn live_bytes(&self) -> usize {
        self.blocks().values().map(|b| b.len).sum()
    }

    /// Returns whether the block at `ptr` is page-locked, or `None` if `ptr` is not
    /// a live block of this allocator.
    pub fn is_locked(&self, ptr: *const u8) -> Option<bool> {
        self.blocks().get(&(ptr as usize)).map(|b| b.locked)
    }

    fn blocks(&self) -> MutexGuard<'_, HashMap<usize, Block>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies the lock policy to a fresh mapping. Returns whether the pages ended up
    /// locked, or the OS error when locking is required and failed.
    fn lock_pages(&self, ptr: *mut std::ffi::c_void, capacity: usize) -> std::io::Result<bool> {
        match self.lock_policy {
            LockPolicy::Disabled => Ok(false),
            LockPolicy::Required => unsafe { os::lock(ptr, capacity) }.map(|()| true),
            LockPolicy::BestEffort => match unsafe { os::lock(ptr, capacity) } {
                Ok(()) => Ok(true),
                Err(e) => {
                    log::debug!(
                        "page locking unavailable for {capacity} bytes, using unlocked pages: {e}"
                    );
                    Ok(false)
                }
            },
        }
    }

    unsafe fn release_block(ptr: *mut std::ffi::c_void, block: Block) -> std::io::Result<()> {
        if block.locked {
            if let Err(e) = unsafe { os::unlock(ptr, block.capacity) } {
                log::debug!("failed to unlock {} bytes at {ptr:p}: {e}", block.capacity);
            }
        }
        unsafe { os::free(ptr, block.capacity) }
    }
}

impl Default for HostPinnedAllocator {
    fn default() -> Self {
        HostPinnedAllocator::new()
    }
}

impl PinnedAllocator for HostPinnedAllocator {
    fn device(&self) -> i32 {
        self.device
    }

    fn alloc_pinned(&self, size: usize) -> Result<NonNull<u8>, ErrorCode> {
        if size == 0 {
            return Err(ErrorCode::INVALID_VALUE);
        }

        let (ptr, capacity) = os::allocate(size).map_err(|e| {
            log::debug!("failed to map {size} bytes: {e}");
            ErrorCode::MEMORY_ALLOCATION
        })?;

        let locked = match self.lock_pages(ptr, capacity) {
            Ok(locked) => locked,
            Err(e) => {
                log::debug!("failed to lock {capacity} bytes: {e}");
                let _ = unsafe { os::free(ptr, capacity) };
                return Err(ErrorCode::MEMORY_ALLOCATION);
            }
        };

        let Some(ptr) = NonNull::new(ptr as *mut u8) else {
            return Err(ErrorCode::MEMORY_ALLOCATION);
        };
        self.blocks().insert(
            ptr.as_ptr() as usize,
            Block {
                len: size,
                capacity,
                locked,
            },
        );
        log::trace!(
            "allocated {size} bytes at {ptr:p} (device {}, locked: {locked})",
            self.device
        );
        Ok(ptr)
    }

    unsafe fn free_pinned(&self, ptr: NonNull<u8>) -> Result<(), ErrorCode> {
        let Some(block) = self.blocks().remove(&(ptr.as_ptr() as usize)) else {
            return Err(ErrorCode::INVALID_VALUE);
        };
        unsafe { Self::release_block(ptr.as_ptr() as _, block) }.map_err(|e| {
            log::debug!("failed to unmap {} bytes at {ptr:p}: {e}", block.capacity);
            ErrorCode::INVALID_VALUE
        })?;
        log::trace!("freed {} bytes at {ptr:p}", block.len);
        Ok(())
    }

    unsafe fn copy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<(), ErrorCode> {
        if size == 0 {
            return Ok(());
        }
        if dst.is_null() || src.is_null() {
            return Err(ErrorCode::INVALID_VALUE);
        }
        unsafe { std::ptr::copy(src, dst, size) };
        Ok(())
    }
}

impl Drop for HostPinnedAllocator {
    /// Frees every block that is still live. Owners normally return their blocks
    /// first; anything left here was leaked by its owner.
    fn drop(&mut self) {
        let live = std::mem::take(self.live.get_mut().unwrap_or_else(PoisonError::into_inner));
        if !live.is_empty() {
            log::warn!("{} pinned blocks outlived their allocator", live.len());
        }
        for (addr, block) in live {
            let _ = unsafe { Self::release_block(addr as _, block) };
        }
    }
}

impl std::fmt::Debug for HostPinnedAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPinnedAllocator")
            .field("device", &self.device)
            .field("lock_policy", &self.lock_policy)
            .field("live_allocations", &self.live_allocations())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HostAllocatorBuilder {
    device: Option<i32>,
    lock_policy: Option<LockPolicy>,
}

impl HostAllocatorBuilder {
    /// Device ordinal reported for every allocation. Defaults to 0.
    pub fn device(mut self, device: i32) -> Self {
        self.device = Some(device);
        self
    }

    /// Defaults to [`LockPolicy::BestEffort`].
    pub fn lock_policy(mut self, lock_policy: LockPolicy) -> Self {
        self.lock_policy = Some(lock_policy);
        self
    }

    pub fn build(self) -> HostPinnedAllocator {
        HostPinnedAllocator {
            device: self.device.unwrap_or(0),
            lock_policy: self.lock_policy.unwrap_or_default(),
            live: Mutex::new(HashMap::new()),
        }
    }
}
