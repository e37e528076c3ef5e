//! Binding of [`PinnedMemory`](crate::PinnedMemory) into a managed runtime.
//!
//! The runtime side is modelled by [`ManagedHeap`]: it owns wrapped native objects,
//! tracks which of them are reachable, and runs each unreachable object's
//! finalizer once. [`PinnedMemoryClass`] is the class descriptor through which the
//! runtime constructs `PinnedMemory` objects, reads their accessors and calls
//! `slice`. Argument shape checking lives here, not in the handle itself.

pub mod args;
pub mod class;
pub mod heap;
pub mod value;

pub use args::CallbackArgs;
pub use class::{PinnedMemoryClass, PinnedMemoryObject, PropertyDescriptor, PropertyKind};
pub use heap::{ManagedHeap, ObjectId, ObjectWrap};
pub use value::Value;
