#![allow(dead_code)]

use std::{
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicI32, AtomicUsize, Ordering},
    },
};

use hostpin::MemoryEnv;
use hostpin_external_memory::ExternalMemoryTracker;
use hostpin_page_alloc::{ErrorCode, HostPinnedAllocator, LockPolicy, PinnedAllocator};

/// Wraps the host allocator, counting every primitive call and optionally failing
/// them with a given status.
pub struct CountingAllocator {
    inner: HostPinnedAllocator,
    pub allocs: AtomicUsize,
    pub frees: AtomicUsize,
    pub copies: AtomicUsize,
    pub fail_alloc: AtomicI32,
    pub fail_free: AtomicI32,
    pub fail_copy: AtomicI32,
}

impl CountingAllocator {
    pub fn new(device: i32) -> CountingAllocator {
        CountingAllocator {
            inner: HostPinnedAllocator::builder()
                .device(device)
                .lock_policy(LockPolicy::Disabled)
                .build(),
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
            fail_alloc: AtomicI32::new(0),
            fail_free: AtomicI32::new(0),
            fail_copy: AtomicI32::new(0),
        }
    }

    pub fn allocs(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }

    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::Relaxed)
    }

    pub fn live_allocations(&self) -> usize {
        self.inner.live_allocations()
    }
}

impl PinnedAllocator for CountingAllocator {
    fn device(&self) -> i32 {
        self.inner.device()
    }

    fn alloc_pinned(&self, size: usize) -> Result<NonNull<u8>, ErrorCode> {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        ErrorCode::check(self.fail_alloc.load(Ordering::Relaxed))?;
        self.inner.alloc_pinned(size)
    }

    unsafe fn free_pinned(&self, ptr: NonNull<u8>) -> Result<(), ErrorCode> {
        self.frees.fetch_add(1, Ordering::Relaxed);
        // A failed free leaves the block with the inner allocator, which releases
        // it when dropped.
        ErrorCode::check(self.fail_free.load(Ordering::Relaxed))?;
        unsafe { self.inner.free_pinned(ptr) }
    }

    unsafe fn copy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<(), ErrorCode> {
        self.copies.fetch_add(1, Ordering::Relaxed);
        ErrorCode::check(self.fail_copy.load(Ordering::Relaxed))?;
        unsafe { self.inner.copy(dst, src, size) }
    }
}

pub struct Fixture {
    pub env: MemoryEnv,
    pub allocator: Arc<CountingAllocator>,
    pub tracker: Arc<ExternalMemoryTracker>,
}

impl Fixture {
    pub fn new() -> Fixture {
        Fixture::with_device(0)
    }

    pub fn with_device(device: i32) -> Fixture {
        let allocator = Arc::new(CountingAllocator::new(device));
        let tracker = Arc::new(ExternalMemoryTracker::new());
        let env = MemoryEnv::new(allocator.clone(), tracker.clone());
        Fixture {
            env,
            allocator,
            tracker,
        }
    }
}

/// Fills `bytes` with a pattern derived from the position.
pub fn fill_pattern(bytes: &mut [u8]) {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (i * 31 % 251) as u8;
    }
}
