//! Page-locked host memory owned by a managed, garbage-collected runtime.
//!
//! [`PinnedMemory`] is the owner of a single pinned allocation. It registers its
//! footprint with the runtime's external memory accounting on allocation and
//! deregisters it when the block is actually freed, either explicitly through
//! [`PinnedMemory::release`] or when the handle is dropped.
//!
//! The [`bridge`] module exposes the handle to a managed runtime: argument
//! validation for construction calls, read-only accessors, the `slice` method,
//! and finalization of unreachable wrapper objects.

pub mod bridge;
pub mod env;
pub mod pinned;
pub mod slice;

pub use env::MemoryEnv;
pub use pinned::PinnedMemory;
pub use slice::clamp_slice_args;
