//! The `PinnedMemory` class as exposed to the managed runtime.

use std::any::Any;

use hostpin_common::{Result, error::Error};

use crate::{
    bridge::{
        args::CallbackArgs,
        heap::{ManagedHeap, ObjectId, ObjectWrap},
        value::Value,
    },
    pinned::PinnedMemory,
};

pub const CLASS_NAME: &str = "PinnedMemory";

/// Property key under which the class exposes its `Symbol.toStringTag`.
pub const TO_STRING_TAG: &str = "@@toStringTag";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// A constant value shared by all instances.
    Value,
    /// A getter without a setter.
    ReadOnlyAccessor,
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub enumerable: bool,
}

/// A [`PinnedMemory`] living in the managed heap.
pub struct PinnedMemoryObject {
    memory: PinnedMemory,
}

impl PinnedMemoryObject {
    pub fn memory(&self) -> &PinnedMemory {
        &self.memory
    }
}

impl ObjectWrap for PinnedMemoryObject {
    fn class_name(&self) -> &'static str {
        CLASS_NAME
    }

    fn finalize(&mut self) {
        self.memory.release();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Class descriptor for `PinnedMemory` objects.
///
/// Defined once and reused for every instance: it validates construction calls,
/// creates instances (both from user code and internally for `slice`), and
/// dispatches property reads and method calls.
#[derive(Debug, Clone)]
pub struct PinnedMemoryClass {
    properties: Vec<PropertyDescriptor>,
}

impl PinnedMemoryClass {
    pub fn define() -> PinnedMemoryClass {
        let property = |name, kind| PropertyDescriptor {
            name,
            kind,
            enumerable: true,
        };
        PinnedMemoryClass {
            properties: vec![
                property(TO_STRING_TAG, PropertyKind::Value),
                property("byteLength", PropertyKind::ReadOnlyAccessor),
                property("deviceOrdinal", PropertyKind::ReadOnlyAccessor),
                property("pointer", PropertyKind::ReadOnlyAccessor),
                PropertyDescriptor {
                    name: "slice",
                    kind: PropertyKind::Method,
                    enumerable: false,
                },
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        CLASS_NAME
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// `new PinnedMemory(byteLength?)`.
    ///
    /// Accepts only construct calls with either no argument (an empty instance) or a
    /// single number. The arguments are checked before anything is allocated.
    pub fn construct(&self, heap: &mut ManagedHeap, args: &CallbackArgs) -> Result<ObjectId> {
        if !args.is_construct_call() {
            return Err(Error::invalid_arg(
                CLASS_NAME,
                "PinnedMemory constructor requires 'new'",
            ));
        }
        if !(args.is_empty() || (args.len() == 1 && args.get(0).is_number())) {
            return Err(Error::invalid_arg(
                "byteLength",
                "PinnedMemory constructor requires a numeric byteLength argument",
            ));
        }
        let byte_length = args.byte_length(0)?;
        self.new_instance(heap, byte_length)
    }

    /// Creates an instance without going through argument validation.
    pub fn new_instance(&self, heap: &mut ManagedHeap, byte_length: usize) -> Result<ObjectId> {
        let memory = PinnedMemory::new(heap.env(), byte_length)?;
        Ok(self.instantiate(heap, memory))
    }

    fn instantiate(&self, heap: &mut ManagedHeap, memory: PinnedMemory) -> ObjectId {
        heap.wrap(Box::new(PinnedMemoryObject { memory }))
    }

    /// Reads a property of the instance `id`.
    pub fn get(&self, heap: &ManagedHeap, id: ObjectId, name: &str) -> Result<Value> {
        let memory = heap.unwrap::<PinnedMemoryObject>(id)?.memory();
        let value = match name {
            TO_STRING_TAG => Value::from(CLASS_NAME),
            "byteLength" => Value::Number(memory.byte_length() as f64),
            "deviceOrdinal" => Value::from(memory.device()),
            "pointer" => memory.address().map_or(Value::Null, |a| Value::BigInt(a as u64)),
            _ => return Err(Error::invalid_operation(format!("get {CLASS_NAME}.{name}"))),
        };
        Ok(value)
    }

    /// Assigns a property of the instance `id`. All properties are read-only, so
    /// this only ever reports an error.
    pub fn set(&self, heap: &ManagedHeap, id: ObjectId, name: &str, _value: Value) -> Result<()> {
        heap.unwrap::<PinnedMemoryObject>(id)?;
        let reason = match self.property(name) {
            Some(_) => "read-only",
            None => "unknown",
        };
        Err(Error::invalid_operation(format!(
            "set {CLASS_NAME}.{name} ({reason} property)"
        )))
    }

    /// Invokes a method on the instance `id`.
    ///
    /// `slice(start?, end?)` returns a new, rooted `PinnedMemory` object holding a
    /// copy of the requested range.
    pub fn call(
        &self,
        heap: &mut ManagedHeap,
        id: ObjectId,
        method: &str,
        args: &CallbackArgs,
    ) -> Result<Value> {
        match method {
            "slice" => {
                let start = args.offset(0, "start")?;
                let end = args.offset(1, "end")?;
                let copy = heap
                    .unwrap::<PinnedMemoryObject>(id)?
                    .memory()
                    .slice(start, end)?;
                Ok(Value::Object(self.instantiate(heap, copy)))
            }
            _ => Err(Error::invalid_operation(format!(
                "call {CLASS_NAME}.{method}"
            ))),
        }
    }
}

impl Default for PinnedMemoryClass {
    fn default() -> Self {
        PinnedMemoryClass::define()
    }
}
