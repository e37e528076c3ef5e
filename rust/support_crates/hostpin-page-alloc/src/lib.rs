pub mod host;
mod pages;
pub mod pinned;

#[cfg_attr(any(target_os = "linux"), path = "lock_linux.rs")]
#[cfg_attr(windows, path = "lock_win.rs")]
#[cfg_attr(not(any(target_os = "linux", windows)), path = "lock_fallback.rs")]
pub mod os;

pub use host::{HostAllocatorBuilder, HostPinnedAllocator, LockPolicy};
pub use pinned::{ErrorCode, PinnedAllocator};
