//! The pinned-allocation contract shared by every allocator backend.

use std::{num::NonZeroI32, ptr::NonNull};

/// A native allocator status that signals failure.
///
/// Backends report status codes where zero means success; `ErrorCode` can only hold
/// the non-zero ones. The numbering of the constants below follows the CUDA runtime
/// so that codes from a device driver and from the host backend read the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(NonZeroI32);

impl ErrorCode {
    /// An argument (pointer, size) was not acceptable to the allocator.
    pub const INVALID_VALUE: ErrorCode = ErrorCode(NonZeroI32::new(1).unwrap());
    /// The allocator could not satisfy the request.
    pub const MEMORY_ALLOCATION: ErrorCode = ErrorCode(NonZeroI32::new(2).unwrap());

    /// Wraps a raw status, returning `None` for the success status (0).
    pub fn new(code: i32) -> Option<ErrorCode> {
        NonZeroI32::new(code).map(ErrorCode)
    }

    /// Converts a raw status into a `Result`.
    pub fn check(status: i32) -> Result<(), ErrorCode> {
        match ErrorCode::new(status) {
            None => Ok(()),
            Some(code) => Err(code),
        }
    }

    #[inline]
    pub fn get(self) -> i32 {
        self.0.get()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            1 => write!(f, "invalid value (status 1)"),
            2 => write!(f, "out of memory (status 2)"),
            code => write!(f, "status {code}"),
        }
    }
}

impl std::error::Error for ErrorCode {}

/// An allocator of page-locked host memory on behalf of a compute device.
///
/// Each allocation is a single contiguous block; the allocator does not pool,
/// split or coalesce blocks.
pub trait PinnedAllocator: Send + Sync {
    /// Ordinal of the device whose context the allocations are associated with.
    fn device(&self) -> i32;

    /// Allocates `size` bytes of pinned memory. `size` must be non-zero.
    fn alloc_pinned(&self, size: usize) -> Result<NonNull<u8>, ErrorCode>;

    /// Frees a block previously returned by [`alloc_pinned`](Self::alloc_pinned).
    ///
    /// # Safety
    ///
    /// `ptr` must not be used after this call, whatever the outcome.
    unsafe fn free_pinned(&self, ptr: NonNull<u8>) -> Result<(), ErrorCode>;

    /// Copies `size` bytes from `src` to `dst`.
    ///
    /// The copy direction (host, pinned host, device) is determined by the backend
    /// from the addresses themselves. Overlapping ranges are handled.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid for `size` bytes.
    unsafe fn copy(&self, dst: *mut u8, src: *const u8, size: usize) -> Result<(), ErrorCode>;
}
