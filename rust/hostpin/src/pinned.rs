//! Owned, page-locked host memory.
//!
//! A [`PinnedMemory`] owns exactly one contiguous block obtained from the
//! environment's [`PinnedAllocator`](hostpin_page_alloc::PinnedAllocator). Its
//! metadata (pointer, length, device) is fixed at construction; only the contents
//! of the block are mutable.
//!
//! # Accounting
//!
//! Allocation and registration with the external memory accounting happen as one
//! step, and so do freeing and deregistration. The accounting is never adjusted
//! for a block that was not actually allocated or not actually freed.
//!
//! # Zero-length handles
//!
//! A handle of length 0 performs no allocation and no registration; it has no
//! pointer and exposes an empty byte slice. Released handles look the same.

use std::ptr::NonNull;

use hostpin_common::{Result, error::Error};

use crate::{env::MemoryEnv, slice::clamp_slice_args};

pub struct PinnedMemory {
    /// Start of the owned block, `None` for empty or released handles.
    ptr: Option<NonNull<u8>>,
    /// Size of the block in bytes. Zero iff `ptr` is `None`.
    len: usize,
    /// Device the allocation was requested for.
    device: i32,
    env: MemoryEnv,
}

impl PinnedMemory {
    /// Allocates `byte_length` bytes of pinned memory and registers them with the
    /// environment's external memory accounting.
    ///
    /// A zero `byte_length` produces an empty handle without calling the allocator.
    ///
    /// # Errors
    ///
    /// Returns an `Allocation` error carrying the allocator's native status if the
    /// allocation fails. Nothing is registered in that case.
    pub fn new(env: &MemoryEnv, byte_length: usize) -> Result<PinnedMemory> {
        let mut memory = PinnedMemory::empty(env);
        if byte_length > 0 {
            let ptr = env
                .allocator()
                .alloc_pinned(byte_length)
                .map_err(|code| Error::allocation(byte_length, code.get()))?;
            memory.ptr = Some(ptr);
            memory.len = byte_length;
            env.external_memory().adjust(footprint(byte_length));
        }
        Ok(memory)
    }

    /// An empty handle tagged with the environment's current device.
    pub fn empty(env: &MemoryEnv) -> PinnedMemory {
        PinnedMemory {
            ptr: None,
            len: 0,
            device: env.device(),
            env: env.clone(),
        }
    }

    /// Frees the block and deregisters its footprint.
    ///
    /// Idempotent: once released (or if the handle was empty to begin with), further
    /// calls do nothing. The pointer and length are cleared even when the allocator
    /// reports a failure, so a free is never attempted twice. A failed free is not
    /// deregistered from the accounting, since the bytes were not returned; it is
    /// only reported through the log.
    pub fn release(&mut self) {
        let len = std::mem::take(&mut self.len);
        let Some(ptr) = self.ptr.take() else {
            return;
        };
        match unsafe { self.env.allocator().free_pinned(ptr) } {
            Ok(()) => {
                self.env.external_memory().adjust(-footprint(len));
            }
            Err(code) => {
                log::warn!(
                    "failed to free {len} bytes of pinned memory at {ptr:p} (device {}): {code}",
                    self.device
                );
            }
        }
    }

    /// Copies the byte range `[start, end)` into a newly allocated, independently
    /// owned handle.
    ///
    /// `None` offsets default to `0` and `byte_length()`. The offsets are resolved by
    /// [`clamp_slice_args`]: negative values count from the end, out-of-range values
    /// are clamped, and a reversed range yields an empty handle. The source is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `Allocation` if the new block cannot be allocated.
    /// - `Copy` if the allocator's copy primitive fails. The destination block is
    ///   released before the error is returned.
    pub fn slice(&self, start: Option<i64>, end: Option<i64>) -> Result<PinnedMemory> {
        let len = i64::try_from(self.len).unwrap_or(i64::MAX);
        let (start, end) = clamp_slice_args(self.len, start.unwrap_or(0), end.unwrap_or(len));
        let count = end - start;
        let mut copy = PinnedMemory::new(&self.env, count)?;
        if let (Some(dst), Some(src)) = (copy.ptr, self.ptr) {
            unsafe {
                self.env
                    .allocator()
                    .copy(dst.as_ptr(), src.as_ptr().add(start), count)
            }
            .map_err(|code| {
                copy.release();
                Error::copy(count, code.get())
            })?;
        }
        Ok(copy)
    }

    /// Size of the block in bytes; 0 for empty or released handles.
    #[inline]
    pub fn byte_length(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ordinal of the device the allocation is associated with.
    #[inline]
    pub fn device(&self) -> i32 {
        self.device
    }

    /// Start of the block, if the handle owns one.
    #[inline]
    pub fn ptr(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    /// Start of the block as an address.
    #[inline]
    pub fn address(&self) -> Option<usize> {
        self.ptr.map(|p| p.as_ptr() as usize)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self.ptr {
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self.ptr {
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Reinterprets the contents as a slice of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the length is not a multiple of `size_of::<T>()`.
    #[inline]
    pub fn as_slice<T>(&self) -> &[T]
    where
        T: bytemuck::AnyBitPattern,
    {
        bytemuck::cast_slice(self.as_bytes())
    }

    /// Reinterprets the contents as a mutable slice of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the length is not a multiple of `size_of::<T>()`.
    #[inline]
    pub fn as_mut_slice<T>(&mut self) -> &mut [T]
    where
        T: bytemuck::AnyBitPattern + bytemuck::NoUninit,
    {
        bytemuck::cast_slice_mut(self.as_bytes_mut())
    }
}

/// Converts a byte count to an accounting delta.
fn footprint(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

impl std::ops::Deref for PinnedMemory {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_bytes()
    }
}

impl std::ops::DerefMut for PinnedMemory {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_bytes_mut()
    }
}

impl AsRef<[u8]> for PinnedMemory {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsMut<[u8]> for PinnedMemory {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_bytes_mut()
    }
}

impl Drop for PinnedMemory {
    fn drop(&mut self) {
        self.release();
    }
}

// SAFETY: PinnedMemory exclusively owns its block and the environment it holds is
// `Send + Sync`.
unsafe impl Send for PinnedMemory {}

// SAFETY: shared references only allow reading the block.
unsafe impl Sync for PinnedMemory {}

impl std::fmt::Debug for PinnedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedMemory")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hostpin_common::error::ErrorKind;
    use hostpin_external_memory::ExternalMemoryTracker;
    use hostpin_page_alloc::HostPinnedAllocator;

    use super::*;

    fn test_env() -> (MemoryEnv, Arc<HostPinnedAllocator>, Arc<ExternalMemoryTracker>) {
        let allocator = Arc::new(HostPinnedAllocator::builder().device(1).build());
        let tracker = Arc::new(ExternalMemoryTracker::new());
        let env = MemoryEnv::new(allocator.clone(), tracker.clone());
        (env, allocator, tracker)
    }

    fn filled(env: &MemoryEnv, len: usize) -> PinnedMemory {
        let mut memory = PinnedMemory::new(env, len).unwrap();
        for (i, b) in memory.iter_mut().enumerate() {
            *b = i as u8;
        }
        memory
    }

    #[test]
    fn test_new_registers_footprint() {
        let (env, allocator, tracker) = test_env();
        let memory = PinnedMemory::new(&env, 4000).unwrap();
        assert_eq!(memory.byte_length(), 4000);
        assert_eq!(memory.device(), 1);
        assert!(memory.ptr().is_some());
        assert_eq!(tracker.current(), 4000);
        assert_eq!(allocator.live_allocations(), 1);
    }

    #[test]
    fn test_zero_length_is_not_allocated() {
        let (env, allocator, tracker) = test_env();
        let memory = PinnedMemory::new(&env, 0).unwrap();
        assert_eq!(memory.byte_length(), 0);
        assert!(memory.ptr().is_none());
        assert_eq!(memory.address(), None);
        assert!(memory.as_bytes().is_empty());
        assert_eq!(tracker.adjustments(), 0);
        assert_eq!(allocator.live_allocations(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (env, allocator, tracker) = test_env();
        let mut memory = PinnedMemory::new(&env, 100).unwrap();
        memory.release();
        assert_eq!(memory.byte_length(), 0);
        assert!(memory.ptr().is_none());
        assert_eq!(tracker.current(), 0);
        assert_eq!(allocator.live_allocations(), 0);

        memory.release();
        drop(memory);
        assert_eq!(tracker.current(), 0);
        assert_eq!(tracker.adjustments(), 2);
    }

    #[test]
    fn test_drop_releases() {
        let (env, allocator, tracker) = test_env();
        {
            let _memory = PinnedMemory::new(&env, 12345).unwrap();
            assert_eq!(tracker.current(), 12345);
        }
        assert_eq!(tracker.current(), 0);
        assert_eq!(tracker.peak(), 12345);
        assert_eq!(allocator.live_allocations(), 0);
    }

    #[test]
    fn test_device_survives_release() {
        let (env, _, _) = test_env();
        let mut memory = PinnedMemory::new(&env, 8).unwrap();
        memory.release();
        assert_eq!(memory.device(), 1);
    }

    #[test]
    fn test_slice_copies_range() {
        let (env, _, tracker) = test_env();
        let source = filled(&env, 10);
        let slice = source.slice(Some(2), Some(6)).unwrap();
        assert_eq!(slice.as_bytes(), &[2, 3, 4, 5]);
        assert_ne!(slice.address(), source.address());
        assert_eq!(tracker.current(), 14);
    }

    #[test]
    fn test_slice_defaults_to_whole_buffer() {
        let (env, _, _) = test_env();
        let source = filled(&env, 300);
        let copy = source.slice(None, None).unwrap();
        assert_eq!(copy.as_bytes(), source.as_bytes());
        let tail = source.slice(Some(250), None).unwrap();
        assert_eq!(tail.as_bytes(), &source[250..]);
    }

    #[test]
    fn test_slice_negative_start() {
        let (env, _, _) = test_env();
        let source = filled(&env, 10);
        let slice = source.slice(Some(-3), Some(10)).unwrap();
        assert_eq!(slice.byte_length(), 3);
        assert_eq!(slice.as_bytes(), &[7, 8, 9]);
    }

    #[test]
    fn test_slice_reversed_range_is_empty() {
        let (env, allocator, _) = test_env();
        let source = filled(&env, 5);
        let slice = source.slice(Some(4), Some(1)).unwrap();
        assert_eq!(slice.byte_length(), 0);
        assert!(slice.ptr().is_none());
        assert_eq!(allocator.live_allocations(), 1);
    }

    #[test]
    fn test_slice_is_independent_of_source() {
        let (env, _, tracker) = test_env();
        let mut source = filled(&env, 16);
        let slice = source.slice(Some(8), None).unwrap();
        source.as_bytes_mut().fill(0xFF);
        source.release();
        assert_eq!(slice.as_bytes(), &[8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(tracker.current(), 8);
    }

    #[test]
    fn test_slice_of_empty() {
        let (env, _, _) = test_env();
        let empty = PinnedMemory::new(&env, 0).unwrap();
        for (start, end) in [(None, None), (Some(-5), Some(5)), (Some(3), Some(1))] {
            let slice = empty.slice(start, end).unwrap();
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn test_typed_views() {
        let (env, _, _) = test_env();
        let mut memory = PinnedMemory::new(&env, 16).unwrap();
        memory.as_mut_slice::<u32>().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(memory.as_slice::<u32>(), &[1, 2, 3, 4]);
        assert_eq!(memory.as_slice::<u64>().len(), 2);
    }

    #[test]
    fn test_allocation_error_carries_code() {
        let (env, _, tracker) = test_env();
        let err = PinnedMemory::new(&env, 1 << 62).unwrap_err();
        assert_eq!(err.native_code(), Some(2));
        assert!(matches!(err.kind(), ErrorKind::Allocation { .. }));
        assert_eq!(tracker.adjustments(), 0);
    }
}
