//! Entity model
//!
//! Entities are the named, look-up-able things of a program:
//! - object entities (automatic, static or member variables, parameters)
//! - reference entities
//! - function entities (possibly one of several overloads sharing a name)
//! - class entities
//!
//! They are stored in an [`EntityTable`] arena and addressed by [`EntityId`].
//! Names are bound to entities in [`scope::Scope`]s.

pub mod scope;

pub use scope::{Binding, DeclareOutcome, LookupResult, Scope, ScopeId, ScopeKind, ScopeTable};

use crate::parser::ast::SourceLocation;
use crate::types::{ClassId, FunctionType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub usize);

/// Storage duration of an object or reference entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Automatic,
    Static,
    Member { class: ClassId, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    Ordinary,
    Constructor,
    Destructor,
}

/// Everything the compiler and runtime need to know about a function entity
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub signature: FunctionType,
    pub role: FunctionRole,
    /// Class the function is a member of
    pub class: Option<ClassId>,
    /// Index into the program's intrinsic table for host-provided bodies
    pub intrinsic: Option<usize>,
    /// Implicitly declared special member (default or copy constructor)
    pub is_implicit: bool,
}

impl FunctionInfo {
    pub fn is_member(&self) -> bool {
        self.class.is_some()
    }

    /// Member function declared `const`
    pub fn is_const_member(&self) -> bool {
        self.signature.receiver.as_ref().is_some_and(Type::is_const)
    }
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Object { ty: Type, storage: StorageKind },
    /// A reference; `ty` is the referred-to type
    Reference { ty: Type, storage: StorageKind },
    Function(FunctionInfo),
    Class(ClassId),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    /// Name including enclosing class, used for linking (`Point::length`)
    pub qualified_name: String,
    pub kind: EntityKind,
    pub location: SourceLocation,
}

impl Entity {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, EntityKind::Function(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, EntityKind::Object { .. } | EntityKind::Reference { .. })
    }

    pub fn function(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            EntityKind::Function(info) => Some(info),
            _ => None,
        }
    }

    /// Type of the object this entity names (the referred type for references)
    pub fn object_type(&self) -> Option<&Type> {
        match &self.kind {
            EntityKind::Object { ty, .. } | EntityKind::Reference { ty, .. } => Some(ty),
            _ => None,
        }
    }

    pub fn storage(&self) -> Option<StorageKind> {
        match &self.kind {
            EntityKind::Object { storage, .. } | EntityKind::Reference { storage, .. } => Some(*storage),
            _ => None,
        }
    }

    /// Short description used in notes ("variable", "function", ...)
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            EntityKind::Object { .. } => "variable",
            EntityKind::Reference { .. } => "reference",
            EntityKind::Function(_) => "function",
            EntityKind::Class(_) => "class",
        }
    }
}

/// Arena of all entities of a program
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    entities: Vec<Entity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    pub fn name(&self, id: EntityId) -> &str {
        self.get(id).map_or("<unknown>", |e| e.name.as_str())
    }

    pub fn function(&self, id: EntityId) -> Option<&FunctionInfo> {
        self.get(id).and_then(Entity::function)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
