//! Scopes and name lookup
//!
//! Scopes nest (global → class → function → block). A class scope that does
//! not bind a name locally searches the scope of its base class before the
//! enclosing scope. A translation unit's global scope additionally searches
//! the scopes of the library headers it includes.
//!
//! Bindings keep declaration order ([`IndexMap`]) so overload sets and
//! diagnostics are deterministic.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::{EntityId, EntityKind, EntityTable};
use crate::types::{ClassId, ClassTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Header,
    Class(ClassId),
    Function,
    Block,
}

/// What a name is bound to within one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Single(EntityId),
    /// Several functions sharing the name, in declaration order
    Overloads(Vec<EntityId>),
    /// The name was declared as entities of different kinds
    Conflict(Vec<EntityId>),
}

/// Result of looking a name up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Entity(EntityId),
    Overloads(Vec<EntityId>),
    NotFound,
    Ambiguous(Vec<EntityId>),
}

impl LookupResult {
    /// Candidate functions, if the name denotes one or more functions
    pub fn functions(&self, entities: &EntityTable) -> Option<Vec<EntityId>> {
        match self {
            LookupResult::Entity(id) if entities.get(*id).is_some_and(|e| e.is_function()) => Some(vec![*id]),
            LookupResult::Overloads(ids) => Some(ids.clone()),
            _ => None,
        }
    }
}

/// Result of binding a declaration in a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareOutcome {
    /// A new binding (or a new overload) was created
    Declared,
    /// Same function signature or class declared again; refers to the earlier entity
    Redeclared(EntityId),
    /// A variable of this name already exists in the scope
    Redefinition(EntityId),
    /// The name was already bound to a different kind of entity
    Conflicting,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub bindings: IndexMap<String, Binding>,
    /// Header scopes made visible by `#include`
    pub imports: Vec<ScopeId>,
}

/// Arena of scopes with the class → scope association
#[derive(Debug, Clone, Default)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    class_scopes: FxHashMap<ClassId, ScopeId>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            kind,
            parent,
            bindings: IndexMap::new(),
            imports: Vec::new(),
        });
        if let ScopeKind::Class(class) = kind {
            self.class_scopes.entry(class).or_insert(id);
        }
        id
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0)
    }

    pub fn class_scope(&self, class: ClassId) -> Option<ScopeId> {
        self.class_scopes.get(&class).copied()
    }

    pub fn add_import(&mut self, scope: ScopeId, header: ScopeId) {
        if let Some(s) = self.scopes.get_mut(scope.0) {
            if !s.imports.contains(&header) {
                s.imports.push(header);
            }
        }
    }

    /// Bind `name` to `entity` in `scope`, applying the redeclaration rules
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        entity: EntityId,
        entities: &EntityTable,
    ) -> DeclareOutcome {
        let Some(target) = self.scopes.get_mut(scope.0) else {
            return DeclareOutcome::Conflicting;
        };

        let Some(existing) = target.bindings.get_mut(name) else {
            target.bindings.insert(name.to_string(), Binding::Single(entity));
            return DeclareOutcome::Declared;
        };

        let new_kind = entities.get(entity).map(|e| &e.kind);
        match existing {
            Binding::Single(old) => {
                let old = *old;
                match (entities.get(old).map(|e| &e.kind), new_kind) {
                    (Some(EntityKind::Function(a)), Some(EntityKind::Function(b))) => {
                        if a.signature.same_signature(&b.signature) {
                            DeclareOutcome::Redeclared(old)
                        } else {
                            *existing = Binding::Overloads(vec![old, entity]);
                            DeclareOutcome::Declared
                        }
                    }
                    (Some(EntityKind::Class(a)), Some(EntityKind::Class(b))) if a == b => {
                        DeclareOutcome::Redeclared(old)
                    }
                    (
                        Some(EntityKind::Object { .. } | EntityKind::Reference { .. }),
                        Some(EntityKind::Object { .. } | EntityKind::Reference { .. }),
                    ) => DeclareOutcome::Redefinition(old),
                    _ => {
                        *existing = Binding::Conflict(vec![old, entity]);
                        DeclareOutcome::Conflicting
                    }
                }
            }
            Binding::Overloads(ids) => match new_kind {
                Some(EntityKind::Function(new_fn)) => {
                    let same = ids.iter().copied().find(|id| {
                        entities
                            .function(*id)
                            .is_some_and(|f| f.signature.same_signature(&new_fn.signature))
                    });
                    match same {
                        Some(old) => DeclareOutcome::Redeclared(old),
                        None => {
                            ids.push(entity);
                            DeclareOutcome::Declared
                        }
                    }
                }
                _ => {
                    let mut all = std::mem::take(ids);
                    all.push(entity);
                    *existing = Binding::Conflict(all);
                    DeclareOutcome::Conflicting
                }
            },
            Binding::Conflict(ids) => {
                ids.push(entity);
                DeclareOutcome::Conflicting
            }
        }
    }

    /// Look `name` up starting at `scope` and walking outwards
    pub fn lookup(&self, scope: ScopeId, name: &str, classes: &ClassTable) -> LookupResult {
        let mut current = Some(scope);
        while let Some(id) = current {
            let found = self.lookup_in(id, name, classes);
            if found != LookupResult::NotFound {
                return found;
            }
            current = self.get(id).and_then(|s| s.parent);
        }
        LookupResult::NotFound
    }

    /// Look `name` up in one scope only: its own bindings, then (for class
    /// scopes) the base class scopes, then included headers.
    pub fn lookup_in(&self, scope: ScopeId, name: &str, classes: &ClassTable) -> LookupResult {
        let Some(s) = self.get(scope) else {
            return LookupResult::NotFound;
        };

        if let Some(binding) = s.bindings.get(name) {
            return match binding {
                Binding::Single(id) => LookupResult::Entity(*id),
                Binding::Overloads(ids) => LookupResult::Overloads(ids.clone()),
                Binding::Conflict(ids) => LookupResult::Ambiguous(ids.clone()),
            };
        }

        if let ScopeKind::Class(class) = s.kind {
            let base_scope = classes
                .get(class)
                .and_then(|c| c.base)
                .and_then(|base| self.class_scope(base));
            if let Some(base_scope) = base_scope {
                let found = self.lookup_in(base_scope, name, classes);
                if found != LookupResult::NotFound {
                    return found;
                }
            }
        }

        for header in &s.imports {
            let found = self.lookup_in(*header, name, classes);
            if found != LookupResult::NotFound {
                return found;
            }
        }

        LookupResult::NotFound
    }

    /// Look `name` up among the bindings of `scope` itself, without bases or parents
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> LookupResult {
        match self.get(scope).and_then(|s| s.bindings.get(name)) {
            Some(Binding::Single(id)) => LookupResult::Entity(*id),
            Some(Binding::Overloads(ids)) => LookupResult::Overloads(ids.clone()),
            Some(Binding::Conflict(ids)) => LookupResult::Ambiguous(ids.clone()),
            None => LookupResult::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Entity, FunctionInfo, FunctionRole, StorageKind};
    use crate::parser::ast::SourceLocation;
    use crate::types::{FunctionType, Type};

    fn variable(entities: &mut EntityTable, name: &str) -> EntityId {
        entities.add(Entity {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: EntityKind::Object {
                ty: Type::int(),
                storage: StorageKind::Automatic,
            },
            location: SourceLocation::default(),
        })
    }

    fn function(entities: &mut EntityTable, name: &str, params: Vec<Type>) -> EntityId {
        entities.add(Entity {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: EntityKind::Function(FunctionInfo {
                signature: FunctionType {
                    return_type: Type::void(),
                    param_types: params,
                    receiver: None,
                },
                role: FunctionRole::Ordinary,
                class: None,
                intrinsic: None,
                is_implicit: false,
            }),
            location: SourceLocation::default(),
        })
    }

    #[test]
    fn test_nested_lookup_and_shadowing() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let mut scopes = ScopeTable::new();
        let global = scopes.create(ScopeKind::Global, None);
        let block = scopes.create(ScopeKind::Block, Some(global));

        let outer = variable(&mut entities, "x");
        let inner = variable(&mut entities, "x");
        scopes.declare(global, "x", outer, &entities);
        assert_eq!(scopes.lookup(block, "x", &classes), LookupResult::Entity(outer));

        scopes.declare(block, "x", inner, &entities);
        assert_eq!(scopes.lookup(block, "x", &classes), LookupResult::Entity(inner));
        assert_eq!(scopes.lookup(global, "y", &classes), LookupResult::NotFound);
    }

    #[test]
    fn test_overloads_and_redeclaration() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let mut scopes = ScopeTable::new();
        let global = scopes.create(ScopeKind::Global, None);

        let f_int = function(&mut entities, "f", vec![Type::int()]);
        let f_double = function(&mut entities, "f", vec![Type::double()]);
        let f_int_again = function(&mut entities, "f", vec![Type::int().const_qualified()]);

        assert_eq!(scopes.declare(global, "f", f_int, &entities), DeclareOutcome::Declared);
        assert_eq!(scopes.declare(global, "f", f_double, &entities), DeclareOutcome::Declared);
        assert_eq!(
            scopes.declare(global, "f", f_int_again, &entities),
            DeclareOutcome::Redeclared(f_int)
        );
        assert_eq!(
            scopes.lookup(global, "f", &classes),
            LookupResult::Overloads(vec![f_int, f_double])
        );
    }

    #[test]
    fn test_kind_conflict_is_ambiguous() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let mut scopes = ScopeTable::new();
        let global = scopes.create(ScopeKind::Global, None);

        let var = variable(&mut entities, "g");
        let func = function(&mut entities, "g", vec![]);
        scopes.declare(global, "g", var, &entities);
        assert_eq!(scopes.declare(global, "g", func, &entities), DeclareOutcome::Conflicting);
        assert!(matches!(scopes.lookup(global, "g", &classes), LookupResult::Ambiguous(_)));

        let again = variable(&mut entities, "h");
        let twice = variable(&mut entities, "h");
        scopes.declare(global, "h", again, &entities);
        assert_eq!(
            scopes.declare(global, "h", twice, &entities),
            DeclareOutcome::Redefinition(again)
        );
    }

    #[test]
    fn test_class_scope_searches_base() {
        let mut entities = EntityTable::new();
        let mut classes = ClassTable::new();
        let mut scopes = ScopeTable::new();
        let global = scopes.create(ScopeKind::Global, None);

        let base = classes.declare("Base");
        let derived = classes.declare("Derived");
        classes.define(base, None, vec![]);
        classes.define(derived, Some(base), vec![]);
        let base_scope = scopes.create(ScopeKind::Class(base), Some(global));
        let derived_scope = scopes.create(ScopeKind::Class(derived), Some(global));

        let member = function(&mut entities, "hello", vec![]);
        scopes.declare(base_scope, "hello", member, &entities);
        assert_eq!(
            scopes.lookup(derived_scope, "hello", &classes),
            LookupResult::Entity(member)
        );
        assert_eq!(scopes.lookup_local(derived_scope, "hello"), LookupResult::NotFound);
    }
}
