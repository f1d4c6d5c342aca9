//! Objects
//!
//! A [`CppObject`] is a region of storage with a type, an address and a
//! lifetime. Objects nest: arrays own one subobject per element, class
//! objects own an optional base subobject followed by one subobject per
//! member. Atomic objects keep their value in the memory's byte array plus a
//! validity flag and pointer provenance, so the raw bytes survive `kill`.

use super::value::{Address, PointerTarget};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

/// Which memory region an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Static,
    Stack,
    Heap,
    Temporary,
    /// Synthesized for a dereference that found no matching live object
    Invalid,
}

#[derive(Debug, Clone)]
pub struct CppObject {
    pub ty: Type,
    pub address: Address,
    pub size: u64,
    /// Display name, e.g. `x`, `arr[2]`, `p.x`
    pub name: String,
    pub region: Region,
    pub alive: bool,
    /// The stored value is meaningful (atomic objects only)
    pub valid: bool,
    /// Something was stored since the lifetime began, even if invalid
    pub written: bool,
    /// Provenance of a stored pointer value
    pub target: PointerTarget,
    /// Array elements, or class members in declaration order
    pub subobjects: Vec<ObjectId>,
    /// Base class subobject
    pub base: Option<ObjectId>,
    /// Containing object, for subobjects
    pub parent: Option<ObjectId>,
}

impl CppObject {
    pub fn new(ty: Type, address: Address, size: u64, name: String, region: Region) -> Self {
        CppObject {
            ty,
            address,
            size,
            name,
            region,
            alive: false,
            valid: false,
            written: false,
            target: PointerTarget::None,
            subobjects: Vec::new(),
            base: None,
            parent: None,
        }
    }

    pub fn end(&self) -> Address {
        self.address + self.size
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.address && address < self.end()
    }

    pub fn is_heap(&self) -> bool {
        self.region == Region::Heap
    }
}
