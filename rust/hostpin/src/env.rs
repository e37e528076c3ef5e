use std::sync::Arc;

use hostpin_external_memory::{ExternalMemory, ExternalMemoryTracker};
use hostpin_page_alloc::{HostPinnedAllocator, PinnedAllocator};

/// The collaborators a [`PinnedMemory`](crate::PinnedMemory) works against: the
/// allocator that provides pinned blocks and the runtime's external memory
/// accounting.
///
/// Cloning is cheap; every handle keeps its own clone so that it can release its
/// block independently of whoever created it.
#[derive(Clone)]
pub struct MemoryEnv {
    allocator: Arc<dyn PinnedAllocator>,
    external_memory: Arc<dyn ExternalMemory>,
}

impl MemoryEnv {
    pub fn new(
        allocator: Arc<dyn PinnedAllocator>,
        external_memory: Arc<dyn ExternalMemory>,
    ) -> MemoryEnv {
        MemoryEnv {
            allocator,
            external_memory,
        }
    }

    /// An environment backed by the default [`HostPinnedAllocator`] and a fresh
    /// [`ExternalMemoryTracker`].
    pub fn host() -> MemoryEnv {
        MemoryEnv::new(
            Arc::new(HostPinnedAllocator::new()),
            Arc::new(ExternalMemoryTracker::new()),
        )
    }

    #[inline]
    pub fn allocator(&self) -> &dyn PinnedAllocator {
        self.allocator.as_ref()
    }

    #[inline]
    pub fn external_memory(&self) -> &dyn ExternalMemory {
        self.external_memory.as_ref()
    }

    /// Ordinal of the device new allocations are tagged with.
    #[inline]
    pub fn device(&self) -> i32 {
        self.allocator.device()
    }
}

impl std::fmt::Debug for MemoryEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEnv")
            .field("device", &self.device())
            .finish_non_exhaustive()
    }
}
