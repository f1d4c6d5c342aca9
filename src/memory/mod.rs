//! Memory and object model
//!
//! This module provides the byte-addressable store the runtime executes
//! against:
//! - [`value`]: typed runtime values and pointer provenance
//! - [`object`]: objects with nested subobjects and lifetimes
//! - [`stack`]: function activation frames
//! - [`heap`]: the `new`/`delete` allocation table
//!
//! # Layout
//!
//! One flat address space split into static, stack, heap and temporary
//! regions (see [`MemoryLayout`]). Sizes are fixed and platform independent:
//! - `char`, `bool`: 1 byte
//! - `int`, `float`: 4 bytes
//! - `double`, pointers: 8 bytes
//! - classes: base subobject, then members in order (no padding)
//!
//! # Lifetime
//!
//! Allocating an object only reserves its address range. Values may be
//! written once its lifetime has begun; killing it ends the lifetime of every
//! subobject and keeps the object in the table marked dead, so stale
//! pointers are detected rather than silently reused.

pub mod heap;
pub mod object;
pub mod stack;
pub mod value;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

pub use heap::{FreeError, Heap};
pub use object::{CppObject, ObjectId, Region};
pub use stack::MemoryFrame;
pub use value::{Address, PointerTarget, RawValue, Value};

use crate::config::MemoryLayout;
use crate::entities::EntityId;
use crate::types::{ClassTable, Type};

/// Outcome of checking whether a pointer value may be dereferenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerCheck {
    Valid,
    Null,
    /// The pointer value itself is invalid (indeterminate or dangling)
    InvalidValue,
    /// Points just past the end of its array
    OnePastEnd,
    /// Outside the bounds of the array or object it was formed from
    OutOfBounds,
    /// The array or object it was formed from is no longer alive
    Dead,
    /// No live object of the pointed-to type lives at the address
    Unrelated,
    /// Not an address of simulated memory at all
    OutsideMemory,
}

/// Deterministic pseudo-random generator for the initial memory contents
struct Garbage(u64);

impl Garbage {
    fn next_byte(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) % 100) as u8
    }
}

#[derive(Debug, Clone)]
pub struct Memory {
    layout: MemoryLayout,
    bytes: Vec<u8>,
    classes: ClassTable,
    objects: Vec<CppObject>,
    /// Complete objects by start address; the most recent allocation wins
    by_address: FxHashMap<Address, ObjectId>,
    statics: FxHashMap<EntityId, ObjectId>,
    static_top: Address,
    string_literals: IndexMap<String, ObjectId>,
    frames: Vec<MemoryFrame>,
    stack_top: Address,
    heap: Heap,
    temporary_top: Address,
    /// Synthesized invalid objects, reused per address and type
    invalid_objects: FxHashMap<(Address, String), ObjectId>,
}

impl Memory {
    pub fn new(layout: MemoryLayout, classes: ClassTable) -> Self {
        let mut garbage = Garbage(0x5eed);
        let bytes = (0..layout.total_bytes()).map(|_| garbage.next_byte()).collect();
        Memory {
            layout,
            bytes,
            classes,
            objects: Vec::new(),
            by_address: FxHashMap::default(),
            statics: FxHashMap::default(),
            static_top: layout.first_static_address(),
            string_literals: IndexMap::new(),
            frames: Vec::new(),
            stack_top: layout.stack_start,
            heap: Heap::new(layout.heap_start, layout.heap_end),
            temporary_top: layout.temporary_start,
            invalid_objects: FxHashMap::default(),
        }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn object(&self, id: ObjectId) -> Option<&CppObject> {
        self.objects.get(id.0)
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut CppObject> {
        self.objects.get_mut(id.0)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &CppObject)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o))
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.object(id).is_some_and(|o| o.alive)
    }

    pub fn size_of(&self, ty: &Type) -> u64 {
        ty.size(&self.classes)
    }

    pub fn read_bytes(&self, address: Address, len: u64) -> Option<&[u8]> {
        let start = usize::try_from(address).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        self.bytes.get(start..end)
    }

    // ===== Allocation =====

    /// Build an object (and its subobjects) of `ty` at `address` and register
    /// it in the address table
    pub fn allocate(&mut self, ty: &Type, address: Address, name: impl Into<String>, region: Region) -> ObjectId {
        let id = self.build(ty, address, name.into(), region, None);
        self.by_address.insert(address, id);
        id
    }

    fn build(&mut self, ty: &Type, address: Address, name: String, region: Region, parent: Option<ObjectId>) -> ObjectId {
        let size = self.size_of(ty);
        let id = ObjectId(self.objects.len());
        let mut object = CppObject::new(ty.clone(), address, size, name.clone(), region);
        object.parent = parent;
        self.objects.push(object);

        if let (Some(elem), Some(length)) = (ty.element(), ty.array_length()) {
            let elem = elem.clone();
            let elem_size = self.size_of(&elem);
            let elements: Vec<ObjectId> = (0..length)
                .map(|i| self.build(&elem, address + i * elem_size, format!("{}[{}]", name, i), region, Some(id)))
                .collect();
            if let Some(object) = self.object_mut(id) {
                object.subobjects = elements;
            }
        } else if let Some(info) = ty.class_id().and_then(|c| self.classes.get(c)).cloned() {
            let cv = ty.cv();
            let base = info.base.map(|base| {
                let base_type = self.classes.class_type(base).with_cv(cv);
                self.build(&base_type, address, format!("{}.<base>", name), region, Some(id))
            });
            let members: Vec<ObjectId> = info
                .members
                .iter()
                .map(|member| {
                    let member_type = member.ty.with_cv(member.ty.cv().union(cv));
                    self.build(&member_type, address + member.offset, format!("{}.{}", name, member.name), region, Some(id))
                })
                .collect();
            if let Some(object) = self.object_mut(id) {
                object.base = base;
                object.subobjects = members;
            }
        }
        id
    }

    /// Allocate a variable of static storage duration
    pub fn allocate_static(&mut self, entity: EntityId, ty: &Type, name: &str) -> Option<ObjectId> {
        let address = self.reserve_static(self.size_of(ty))?;
        let id = self.allocate(ty, address, name, Region::Static);
        self.statics.insert(entity, id);
        Some(id)
    }

    fn reserve_static(&mut self, size: u64) -> Option<Address> {
        let address = self.static_top;
        if address + size > self.layout.static_end() {
            return None;
        }
        self.static_top += size;
        Some(address)
    }

    pub fn static_object(&self, entity: EntityId) -> Option<ObjectId> {
        self.statics.get(&entity).copied()
    }

    /// The `const char[n + 1]` object holding a string literal, created on
    /// first use and shared by equal literals
    pub fn string_literal(&mut self, text: &str) -> Option<ObjectId> {
        if let Some(id) = self.string_literals.get(text) {
            return Some(*id);
        }
        let ty = Type::array_of(Type::char().const_qualified(), text.len() as u64 + 1);
        let address = self.reserve_static(self.size_of(&ty))?;
        let id = self.allocate(&ty, address, format!("{:?}", text), Region::Static);
        self.begin_lifetime(id);
        let chars = self.object(id).map(|o| o.subobjects.clone()).unwrap_or_default();
        let content = text.bytes().chain(std::iter::once(0));
        for (element, byte) in chars.into_iter().zip(content) {
            self.write_value(element, &Value::int(i64::from(byte as i8), Type::char()));
        }
        self.string_literals.insert(text.to_string(), id);
        Some(id)
    }

    // ===== Stack =====

    /// Push a frame holding `locals` (entity, object type, name) and return
    /// its index. Returns `None` on stack overflow.
    pub fn push_frame(&mut self, function: EntityId, locals: &[(EntityId, Type, String)]) -> Option<usize> {
        let size: u64 = locals.iter().map(|(_, ty, _)| self.size_of(ty)).sum();
        if self.stack_top + size > self.layout.stack_end() {
            return None;
        }
        let mut frame = MemoryFrame::new(function, self.stack_top);
        let mut address = self.stack_top;
        for (entity, ty, name) in locals {
            let id = self.allocate(ty, address, name.as_str(), Region::Stack);
            frame.objects.insert(*entity, id);
            address += self.size_of(ty);
        }
        frame.size = size;
        self.stack_top += size;
        trace!(start = frame.start, size, "frame pushed");
        self.frames.push(frame);
        Some(self.frames.len() - 1)
    }

    /// Pop the top frame, ending the lifetime of all of its objects
    pub fn pop_frame(&mut self) -> Option<MemoryFrame> {
        let frame = self.frames.pop()?;
        for object in frame.objects.values() {
            self.kill(*object);
        }
        self.stack_top = frame.start;
        trace!(start = frame.start, "frame popped");
        Some(frame)
    }

    pub fn frames(&self) -> &[MemoryFrame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&MemoryFrame> {
        self.frames.get(index)
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut MemoryFrame> {
        self.frames.get_mut(index)
    }

    /// Object denoted by a variable: a local of `frame`, or a static
    pub fn variable(&self, frame: Option<usize>, entity: EntityId) -> Option<ObjectId> {
        frame
            .and_then(|index| self.frames.get(index))
            .and_then(|frame| frame.lookup(entity))
            .or_else(|| self.static_object(entity))
    }

    /// Bind a reference declared in `frame`, or a static one when `frame` is `None`
    pub fn bind_reference(&mut self, frame: Option<usize>, entity: EntityId, object: ObjectId) {
        match frame.and_then(|index| self.frames.get_mut(index)) {
            Some(frame) => {
                frame.references.insert(entity, object);
            }
            None => {
                self.statics.insert(entity, object);
            }
        }
    }

    // ===== Heap =====

    /// Allocate a heap object; `None` when the heap is exhausted
    pub fn allocate_heap(&mut self, ty: &Type) -> Option<ObjectId> {
        let size = self.size_of(ty);
        let address = self.heap.reserve(size)?;
        let id = self.allocate(ty, address, format!("<heap {}>", ty), Region::Heap);
        self.heap.record(address, id, size);
        debug!(address, size, "heap allocation");
        Some(id)
    }

    /// Release the heap block starting at `address`
    pub fn free_heap(&mut self, address: Address) -> Result<ObjectId, FreeError> {
        let object = self.heap.free(address)?;
        self.kill(object);
        debug!(address, "heap block freed");
        Ok(object)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Heap objects never deleted, in allocation order
    pub fn leaked_objects(&self) -> Vec<ObjectId> {
        self.heap.live_blocks().map(|(_, block)| block.object).collect()
    }

    // ===== Temporaries =====

    /// Allocate a temporary object; the region is reused cyclically
    pub fn allocate_temporary(&mut self, ty: &Type) -> ObjectId {
        let size = self.size_of(ty);
        if self.temporary_top + size > self.layout.temporary_end() {
            self.temporary_top = self.layout.temporary_start;
        }
        let address = self.temporary_top;
        self.temporary_top += size;
        self.allocate(ty, address, "<temporary>", Region::Temporary)
    }

    // ===== Lifetime =====

    pub fn begin_lifetime(&mut self, id: ObjectId) {
        let children = match self.object_mut(id) {
            Some(object) => {
                object.alive = true;
                object.written = false;
                object.base.into_iter().chain(object.subobjects.iter().copied()).collect::<Vec<_>>()
            }
            None => return,
        };
        for child in children {
            self.begin_lifetime(child);
        }
    }

    /// End the lifetime of an object and all of its subobjects
    pub fn kill(&mut self, id: ObjectId) {
        let children = match self.object_mut(id) {
            Some(object) => {
                object.alive = false;
                object.base.into_iter().chain(object.subobjects.iter().copied()).collect::<Vec<_>>()
            }
            None => return,
        };
        for child in children {
            self.kill(child);
        }
    }

    /// Mark every atomic subobject's value invalid
    pub fn invalidate(&mut self, id: ObjectId) {
        let children = match self.object_mut(id) {
            Some(object) => {
                object.valid = false;
                object.base.into_iter().chain(object.subobjects.iter().copied()).collect::<Vec<_>>()
            }
            None => return,
        };
        for child in children {
            self.invalidate(child);
        }
    }

    /// Write zero into every atomic subobject
    pub fn zero_fill(&mut self, id: ObjectId) {
        let Some(object) = self.object(id) else {
            return;
        };
        if object.ty.is_atomic() {
            let zero = Value::zero(object.ty.cv_unqualified());
            self.write_value(id, &zero);
            return;
        }
        let children: Vec<ObjectId> = object.base.into_iter().chain(object.subobjects.iter().copied()).collect();
        for child in children {
            self.zero_fill(child);
        }
    }

    // ===== Values =====

    /// The value last written to an atomic object, regardless of its
    /// lifetime. Useful for inspecting objects that have since died.
    pub fn stored_value(&self, id: ObjectId) -> Option<Value> {
        let object = self.object(id)?;
        let bytes = self.read_bytes(object.address, object.size)?;
        let mut value = Value::from_bytes(bytes, object.ty.cv_unqualified());
        value.target = object.target;
        value.valid = object.valid;
        Some(value)
    }

    /// Read the value of an atomic object. The result is invalid if the
    /// object is dead, was never written, or holds a dangling pointer.
    pub fn read_value(&self, id: ObjectId) -> Option<Value> {
        let object = self.object(id)?;
        let bytes = self.read_bytes(object.address, object.size)?;
        let mut value = Value::from_bytes(bytes, object.ty.cv_unqualified());
        value.target = object.target;
        value.valid = object.valid && object.alive;
        if value.valid && value.ty.is_pointer() {
            value.valid = self.is_pointer_valid(&value);
        }
        Some(value)
    }

    /// Write an atomic value into an object's bytes. Writing does not begin
    /// the object's lifetime.
    pub fn write_value(&mut self, id: ObjectId, value: &Value) {
        let Some(object) = self.object(id) else {
            return;
        };
        let (address, size, ty) = (object.address as usize, object.size as usize, object.ty.cv_unqualified());
        let stored = Value {
            ty,
            ..value.clone()
        };
        let bytes = stored.to_bytes();
        if let Some(slot) = address.checked_add(size).and_then(|end| self.bytes.get_mut(address..end)) {
            let len = bytes.len().min(size);
            slot[..len].copy_from_slice(&bytes[..len]);
        }
        if let Some(object) = self.object_mut(id) {
            object.valid = value.valid;
            object.written = true;
            object.target = value.target;
        }
    }

    /// Copy every atomic value of `source` into the matching subobject of
    /// `dest`, recursing through arrays, bases and members
    pub fn copy_object(&mut self, dest: ObjectId, source: ObjectId) {
        let (Some(d), Some(s)) = (self.object(dest), self.object(source)) else {
            return;
        };
        if d.ty.is_atomic() {
            if let Some(value) = self.read_value(source) {
                self.write_value(dest, &value);
            }
            return;
        }
        let pairs: Vec<(ObjectId, ObjectId)> = d
            .base
            .into_iter()
            .zip(s.base)
            .chain(d.subobjects.iter().copied().zip(s.subobjects.iter().copied()))
            .collect();
        for (d, s) in pairs {
            self.copy_object(d, s);
        }
    }

    // ===== Pointers =====

    /// A pointer value is valid while the array/object it was formed from is
    /// alive and it stays within (or one past) its bounds
    pub fn is_pointer_valid(&self, value: &Value) -> bool {
        if !value.valid {
            return false;
        }
        let address = value.address();
        match value.target {
            PointerTarget::None => true,
            PointerTarget::Array(id) | PointerTarget::Object(id) => self
                .object(id)
                .is_some_and(|o| o.alive && address >= o.address && address <= o.end()),
        }
    }

    /// Classify a pointer value before it is dereferenced
    pub fn check_dereference(&self, value: &Value) -> PointerCheck {
        let address = value.address();
        if address == 0 {
            return PointerCheck::Null;
        }
        if !value.valid && value.target == PointerTarget::None {
            return PointerCheck::InvalidValue;
        }
        let pointee_size = value.ty.pointee().map_or(1, |p| self.size_of(p));
        if address.saturating_add(pointee_size) > self.bytes.len() as u64 || (value.as_int() < 0) {
            return PointerCheck::OutsideMemory;
        }
        match value.target {
            PointerTarget::Array(id) | PointerTarget::Object(id) => {
                let Some(object) = self.object(id) else {
                    return PointerCheck::Unrelated;
                };
                if !object.alive {
                    PointerCheck::Dead
                } else if object.contains(address) {
                    PointerCheck::Valid
                } else if address == object.end() {
                    PointerCheck::OnePastEnd
                } else {
                    PointerCheck::OutOfBounds
                }
            }
            PointerTarget::None => match value.ty.pointee().and_then(|p| self.object_at(address, p)) {
                Some(id) if self.is_alive(id) => PointerCheck::Valid,
                _ => PointerCheck::Unrelated,
            },
        }
    }

    /// Resolve a pointer value to an object. Never fails: when no live object
    /// of the pointed-to type matches, a dead placeholder object at the
    /// address is returned.
    pub fn dereference(&mut self, value: &Value) -> ObjectId {
        let address = value.address();
        let pointee = value.ty.pointee().cloned().unwrap_or_else(Type::char);
        let found = match value.target {
            PointerTarget::Array(array) => self.array_element(array, address).and_then(|e| self.find_subobject(e, address, &pointee)),
            PointerTarget::Object(object) => self.find_subobject(object, address, &pointee),
            PointerTarget::None => None,
        };
        if let Some(id) = found.or_else(|| self.object_at(address, &pointee)) {
            return id;
        }
        self.invalid_object(address, &pointee)
    }

    /// Element of `array` whose range contains `address`
    fn array_element(&self, array: ObjectId, address: Address) -> Option<ObjectId> {
        let object = self.object(array)?;
        object
            .subobjects
            .iter()
            .copied()
            .find(|e| self.object(*e).is_some_and(|o| o.contains(address) || (o.size == 0 && o.address == address)))
    }

    /// `root` or a subobject of it starting at `address` with a type similar to `ty`
    pub fn find_subobject(&self, root: ObjectId, address: Address, ty: &Type) -> Option<ObjectId> {
        let object = self.object(root)?;
        if object.address == address && object.ty.cv_unqualified().similar_type(&ty.cv_unqualified()) {
            return Some(root);
        }
        object
            .base
            .into_iter()
            .chain(object.subobjects.iter().copied())
            .filter(|c| self.object(*c).is_some_and(|o| o.contains(address) || o.address == address))
            .find_map(|c| self.find_subobject(c, address, ty))
    }

    /// A live object of type `ty` at `address`, found through the address table
    pub fn object_at(&self, address: Address, ty: &Type) -> Option<ObjectId> {
        if let Some(found) = self.by_address.get(&address).and_then(|root| self.find_subobject(*root, address, ty)) {
            return Some(found);
        }
        self.by_address
            .values()
            .copied()
            .filter(|root| self.object(*root).is_some_and(|o| o.alive && o.contains(address)))
            .find_map(|root| self.find_subobject(root, address, ty))
    }

    /// The placeholder object standing at a pointer's address, for accesses
    /// that must not touch whatever lives there
    pub fn placeholder(&mut self, value: &Value) -> ObjectId {
        let pointee = value.ty.pointee().cloned().unwrap_or_else(Type::char);
        self.invalid_object(value.address(), &pointee)
    }

    fn invalid_object(&mut self, address: Address, ty: &Type) -> ObjectId {
        let key = (address, ty.to_string());
        if let Some(id) = self.invalid_objects.get(&key) {
            return *id;
        }
        let id = self.build(ty, address, format!("<invalid object at 0x{:x}>", address), Region::Invalid, None);
        self.invalid_objects.insert(key, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Memory {
        Memory::new(MemoryLayout::default(), ClassTable::new())
    }

    #[test]
    fn test_write_before_lifetime_leaves_object_dead() {
        let mut memory = memory();
        let id = memory.allocate(&Type::int(), 100, "x", Region::Static);
        memory.write_value(id, &Value::int(5, Type::int()));
        assert!(!memory.is_alive(id));
        assert_eq!(memory.read_value(id).map(|v| v.valid), Some(false));
    }

    #[test]
    fn test_killed_object_reads_invalid_but_keeps_bytes() {
        let mut memory = memory();
        let id = memory.allocate(&Type::int(), 100, "x", Region::Static);
        memory.begin_lifetime(id);
        memory.write_value(id, &Value::int(42, Type::int()));
        assert_eq!(memory.read_value(id), Some(Value::int(42, Type::int())));

        memory.kill(id);
        let after = memory.read_value(id);
        assert_eq!(after.as_ref().map(|v| v.valid), Some(false));
        assert_eq!(after.map(|v| v.as_int()), Some(42));
        assert_eq!(memory.stored_value(id), Some(Value::int(42, Type::int())));
    }

    #[test]
    fn test_array_subobjects_and_pointer_checks() {
        let mut memory = memory();
        let array_type = Type::array_of(Type::int(), 3);
        let array = memory.allocate(&array_type, 200, "a", Region::Static);
        memory.begin_lifetime(array);
        let pointer_type = Type::pointer_to(Type::int());

        let second = Value::pointer(204, pointer_type.clone(), PointerTarget::Array(array));
        assert_eq!(memory.check_dereference(&second), PointerCheck::Valid);
        let element = memory.dereference(&second);
        assert_eq!(memory.object(element).map(|o| o.name.as_str()), Some("a[1]"));

        let past_end = Value::pointer(212, pointer_type.clone(), PointerTarget::Array(array));
        assert!(memory.is_pointer_valid(&past_end));
        assert_eq!(memory.check_dereference(&past_end), PointerCheck::OnePastEnd);

        let beyond = Value::pointer(216, pointer_type.clone(), PointerTarget::Array(array));
        assert!(!memory.is_pointer_valid(&beyond));
        assert_eq!(memory.check_dereference(&beyond), PointerCheck::OutOfBounds);

        assert_eq!(memory.check_dereference(&Value::null(pointer_type)), PointerCheck::Null);
    }

    #[test]
    fn test_dereference_without_provenance_uses_address_table() {
        let mut memory = memory();
        let id = memory.allocate(&Type::int(), 300, "x", Region::Static);
        memory.begin_lifetime(id);
        let raw = Value::pointer(300, Type::pointer_to(Type::int()), PointerTarget::None);
        assert_eq!(memory.check_dereference(&raw), PointerCheck::Valid);
        assert_eq!(memory.dereference(&raw), id);

        let unrelated = Value::pointer(900, Type::pointer_to(Type::int()), PointerTarget::None);
        assert_eq!(memory.check_dereference(&unrelated), PointerCheck::Unrelated);
        let placeholder = memory.dereference(&unrelated);
        assert!(!memory.is_alive(placeholder));
        assert_eq!(memory.dereference(&unrelated), placeholder);
    }

    #[test]
    fn test_frames_allocate_contiguously() {
        let mut memory = memory();
        let locals = vec![
            (EntityId(1), Type::int(), "a".to_string()),
            (EntityId(2), Type::double(), "b".to_string()),
        ];
        let frame = memory.push_frame(EntityId(0), &locals);
        assert_eq!(frame, Some(0));
        let a = memory.variable(frame, EntityId(1)).and_then(|id| memory.object(id).map(|o| o.address));
        let b = memory.variable(frame, EntityId(2)).and_then(|id| memory.object(id).map(|o| o.address));
        assert_eq!(a, Some(memory.layout().stack_start));
        assert_eq!(b, Some(memory.layout().stack_start + 4));

        let frame = memory.pop_frame();
        assert_eq!(frame.map(|f| f.size), Some(12));
        assert!(memory.frames().is_empty());
        assert!(memory.variable(None, EntityId(1)).is_none());
    }

    #[test]
    fn test_string_literals_are_shared() {
        let mut memory = memory();
        let first = memory.string_literal("hi");
        let second = memory.string_literal("hi");
        assert_eq!(first, second);
        let chars: Vec<i64> = first
            .and_then(|id| memory.object(id).map(|o| o.subobjects.clone()))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| memory.read_value(c).map(|v| v.as_int()))
            .collect();
        assert_eq!(chars, vec![104, 105, 0]);
    }

    #[test]
    fn test_heap_objects_leak_until_freed() {
        let mut memory = memory();
        let id = memory.allocate_heap(&Type::int());
        assert!(id.is_some());
        assert_eq!(memory.leaked_objects().len(), 1);
        let address = id.and_then(|i| memory.object(i).map(|o| o.address)).unwrap_or_default();
        assert_eq!(address, memory.layout().heap_end - 4);
        assert!(memory.free_heap(address).is_ok());
        assert!(memory.leaked_objects().is_empty());
        assert_eq!(memory.free_heap(address), Err(FreeError::DoubleFree));
    }
}
