//! A single-threaded model of the managed runtime's object heap.
//!
//! Native objects are wrapped into the heap and addressed by [`ObjectId`]. Every
//! object carries a root count: a freshly wrapped object holds one root on behalf
//! of the scope that created it, and the object becomes unreachable once all roots
//! are dropped. [`ManagedHeap::collect`] finalizes unreachable objects; each
//! finalizer runs at most once and only after the object became unreachable.

use std::{any::Any, collections::BTreeMap};

use hostpin_common::{Result, error::Error};

use crate::env::MemoryEnv;

/// Identity of a wrapped object. Ids are never reused within a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

/// A native object that can live in the managed heap.
pub trait ObjectWrap: Any {
    /// Class name used in diagnostics.
    fn class_name(&self) -> &'static str;

    /// Called once by the collector after the object became unreachable, or when
    /// the heap itself is torn down.
    fn finalize(&mut self);

    fn as_any(&self) -> &dyn Any;
}

struct Slot {
    object: Box<dyn ObjectWrap>,
    roots: usize,
}

pub struct ManagedHeap {
    env: MemoryEnv,
    objects: BTreeMap<u64, Slot>,
    next_id: u64,
    finalized: u64,
}

impl ManagedHeap {
    pub fn new(env: MemoryEnv) -> ManagedHeap {
        ManagedHeap {
            env,
            objects: BTreeMap::new(),
            next_id: 1,
            finalized: 0,
        }
    }

    /// The native environment objects of this heap allocate from.
    pub fn env(&self) -> &MemoryEnv {
        &self.env
    }

    /// Takes ownership of `object` and registers its finalizer. The returned id holds
    /// one root.
    pub fn wrap(&mut self, object: Box<dyn ObjectWrap>) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, Slot { object, roots: 1 });
        ObjectId(id)
    }

    /// Adds a root to a live object.
    pub fn root(&mut self, id: ObjectId) -> Result<()> {
        self.slot_mut(id)?.roots += 1;
        Ok(())
    }

    /// Drops a root. The object stays in the heap until the next [`collect`](Self::collect).
    pub fn unroot(&mut self, id: ObjectId) -> Result<()> {
        let slot = self.slot_mut(id)?;
        if slot.roots == 0 {
            return Err(Error::invalid_operation(format!(
                "unroot of unreachable object {}",
                id.0
            )));
        }
        slot.roots -= 1;
        Ok(())
    }

    /// Runs the finalizer of every unreachable object and removes it from the heap.
    /// Returns the number of objects finalized.
    pub fn collect(&mut self) -> usize {
        let unreachable = self
            .objects
            .iter()
            .filter(|(_, slot)| slot.roots == 0)
            .map(|(&id, _)| id)
            .collect::<Vec<_>>();
        for &id in &unreachable {
            if let Some(mut slot) = self.objects.remove(&id) {
                log::trace!("finalizing {} {id}", slot.object.class_name());
                slot.object.finalize();
                self.finalized += 1;
            }
        }
        unreachable.len()
    }

    /// Runtime teardown: finalizes every object still in the heap, rooted or not, and
    /// returns how many were finalized. Dropping the heap does the same.
    pub fn teardown(&mut self) -> usize {
        let survivors = std::mem::take(&mut self.objects);
        let count = survivors.len();
        for (id, mut slot) in survivors {
            log::trace!("finalizing {} {id} at teardown", slot.object.class_name());
            slot.object.finalize();
            self.finalized += 1;
        }
        count
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id.0)
    }

    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Total number of finalizers run so far, by [`collect`](Self::collect) and
    /// [`teardown`](Self::teardown).
    pub fn finalized_objects(&self) -> u64 {
        self.finalized
    }

    /// Returns the native object behind `id` if it is of type `T`.
    pub fn unwrap<T: ObjectWrap>(&self, id: ObjectId) -> Result<&T> {
        let slot = self.slot(id)?;
        slot.object.as_any().downcast_ref::<T>().ok_or_else(|| {
            Error::invalid_operation(format!(
                "object {} is a {}",
                id.0,
                slot.object.class_name()
            ))
        })
    }

    fn slot(&self, id: ObjectId) -> Result<&Slot> {
        self.objects
            .get(&id.0)
            .ok_or_else(|| Error::invalid_operation(format!("access to collected object {}", id.0)))
    }

    fn slot_mut(&mut self, id: ObjectId) -> Result<&mut Slot> {
        self.objects
            .get_mut(&id.0)
            .ok_or_else(|| Error::invalid_operation(format!("access to collected object {}", id.0)))
    }
}

impl Drop for ManagedHeap {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ManagedHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedHeap")
            .field("live_objects", &self.objects.len())
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}
