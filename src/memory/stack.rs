//! Call stack frames
//!
//! A [`MemoryFrame`] is one function activation. It owns a contiguous range
//! of the stack region holding every automatic object of the function; all of
//! them are allocated when the frame is pushed and their lifetimes begin as
//! their declarations execute.

use rustc_hash::FxHashMap;

use super::object::ObjectId;
use super::value::Address;
use crate::entities::EntityId;

#[derive(Debug, Clone)]
pub struct MemoryFrame {
    pub function: EntityId,
    /// Automatic objects by declaring entity
    pub objects: FxHashMap<EntityId, ObjectId>,
    /// Reference parameters and locals, bound as their initializers run
    pub references: FxHashMap<EntityId, ObjectId>,
    /// The object a member function was called on
    pub this_object: Option<ObjectId>,
    pub start: Address,
    pub size: u64,
}

impl MemoryFrame {
    pub fn new(function: EntityId, start: Address) -> Self {
        MemoryFrame {
            function,
            objects: FxHashMap::default(),
            references: FxHashMap::default(),
            this_object: None,
            start,
            size: 0,
        }
    }

    /// Object denoted by a local variable or reference
    pub fn lookup(&self, entity: EntityId) -> Option<ObjectId> {
        self.objects
            .get(&entity)
            .or_else(|| self.references.get(&entity))
            .copied()
    }

    pub fn end(&self) -> Address {
        self.start + self.size
    }
}
