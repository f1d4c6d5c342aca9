//! Construct compiler
//!
//! Turns syntax trees into a typed [`Program`]: a [`ConstructArena`] plus the
//! entity, scope and class tables it refers to.
//!
//! # Compilation Model
//!
//! Compilation never fails. Every builder compiles its children first, checks
//! them, attaches [`Note`]s for anything wrong and assigns a type and value
//! category only if the checks passed. A construct without a type is the
//! "poisoned" signal for enclosing builders, which skip further checks on it
//! instead of reporting follow-on errors.
//!
//! The builders are split across modules as `impl Compiler` blocks, the same
//! way the parser is organized:
//! - `declarations`: classes, functions, variables
//! - `statements`: blocks and control flow
//! - `expressions`: operators, calls, member access, `new`/`delete`
//! - `initializers`: default/value/copy/direct/list initialization
//! - `conversions`: standard conversion sequences
//! - `overloads`: overload resolution
//!
//! # Linking
//!
//! Each translation unit gets its own global scope. Free functions are keyed
//! by name and signature in a program-wide linkage table so a function
//! declared in one unit and defined in another is one entity. After all units
//! are compiled, the linker reports a missing `main` and functions that are
//! called but never defined.

pub mod construct;
mod conversions;
mod declarations;
mod expressions;
mod initializers;
mod overloads;
mod statements;

pub use construct::{
    Construct, ConstructArena, ConstructId, ConstructKind, ConversionKind, InitAction, InitKind, InitTarget,
    Literal, Note, Severity, ValueCategory,
};
pub use conversions::{standard_conversion, ConversionStep};
pub use overloads::{resolve_overload, ArgumentInfo, OverloadResolution};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

use crate::entities::{
    Binding, Entity, EntityId, EntityKind, EntityTable, FunctionInfo, FunctionRole, LookupResult, ScopeId, ScopeKind,
    ScopeTable,
};
use crate::library::{preprocess, IntrinsicDef, LibraryRegistry};
use crate::parser::ast::{SourceFile, SourceLocation, TypeName};
use crate::parser::Parser;
use crate::types::{ClassId, ClassTable, FunctionType, Type};

/// Binding name under which a class's constructors are declared in its scope
pub(crate) const CONSTRUCTOR_KEY: &str = "<constructor>";

/// Header every translation unit sees without an `#include`
const IMPLICIT_HEADER: &str = "iostream";

/// One source file handed to the compiler
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub name: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceUnit {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A compiled source file or library header
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub name: String,
    pub global_scope: ScopeId,
    /// Function definitions and global declarations, in source order
    pub top_level: Vec<ConstructId>,
    pub is_header: bool,
}

/// A fully compiled and linked program
#[derive(Debug, Clone)]
pub struct Program {
    pub constructs: ConstructArena,
    pub entities: EntityTable,
    pub scopes: ScopeTable,
    pub classes: ClassTable,
    pub units: Vec<TranslationUnit>,
    /// Function entity → its FunctionDefinition construct
    definitions: FxHashMap<EntityId, ConstructId>,
    /// Function entity → translation unit holding its definition
    defining_units: FxHashMap<EntityId, usize>,
    /// Static-storage VariableDefinitions in initialization order
    globals: Vec<ConstructId>,
    /// Class → DestructorCall construct for classes with a user destructor
    destructors: FxHashMap<ClassId, ConstructId>,
    main: Option<EntityId>,
    /// Notes not attached to any construct (parse and link errors)
    notes: Vec<Note>,
    intrinsics: Vec<IntrinsicDef>,
    header_scopes: IndexMap<String, ScopeId>,
    /// Linkage key (name plus signature) → entity shared by all units
    linkage: IndexMap<String, EntityId>,
    /// Functions called anywhere, with the location of the first call
    used_functions: IndexMap<EntityId, SourceLocation>,
}

impl Program {
    fn empty() -> Self {
        Program {
            constructs: ConstructArena::new(),
            entities: EntityTable::new(),
            scopes: ScopeTable::new(),
            classes: ClassTable::new(),
            units: Vec::new(),
            definitions: FxHashMap::default(),
            defining_units: FxHashMap::default(),
            globals: Vec::new(),
            destructors: FxHashMap::default(),
            main: None,
            notes: Vec::new(),
            intrinsics: Vec::new(),
            header_scopes: IndexMap::new(),
            linkage: IndexMap::new(),
            used_functions: IndexMap::new(),
        }
    }

    /// Compile and link source texts
    #[instrument(skip_all, fields(units = sources.len()))]
    pub fn compile(sources: &[SourceUnit], registry: &LibraryRegistry) -> Program {
        let mut program = Program::empty();

        for source in sources {
            let includes = preprocess(&source.text);
            let imports = program.include_headers(&includes, registry);
            let known_classes = program.header_class_names(&imports);

            let parsed = Parser::new(&source.text)
                .map(|parser| parser.with_known_classes(known_classes))
                .and_then(|mut parser| parser.parse_source_file());
            match parsed {
                Ok(file) => {
                    program.compile_unit(&source.name, &file, &imports, false);
                }
                Err(err) => {
                    debug!(unit = %source.name, error = %err, "parse failed");
                    program.notes.push(Note::error("parse", err.message, err.location));
                }
            }
        }

        program.link();
        info!(
            constructs = program.constructs.len(),
            errors = program.errors().count(),
            warnings = program.notes().filter(|n| !n.is_error()).count(),
            "program compiled"
        );
        program
    }

    /// Compile already parsed translation units, each given with the
    /// headers it includes
    pub fn compile_syntax(files: &[(String, SourceFile, Vec<String>)], registry: &LibraryRegistry) -> Program {
        let mut program = Program::empty();
        for (name, file, includes) in files {
            let imports = program.include_headers(includes, registry);
            program.compile_unit(name, file, &imports, false);
        }
        program.link();
        program
    }

    /// Compile a single source text against the standard library headers
    pub fn compile_source(text: &str) -> Program {
        Self::compile(&[SourceUnit::new("main.cpp", text)], &LibraryRegistry::standard())
    }

    /// Compile the requested headers (once each) and return their scopes
    fn include_headers(&mut self, includes: &[String], registry: &LibraryRegistry) -> Vec<ScopeId> {
        let mut imports = Vec::new();
        let requested = std::iter::once(IMPLICIT_HEADER).chain(includes.iter().map(String::as_str));
        for name in requested {
            if let Some(scope) = self.header_scopes.get(name) {
                if !imports.contains(scope) {
                    imports.push(*scope);
                }
                continue;
            }
            let Some(header) = registry.header(name) else {
                self.notes.push(Note::error(
                    "include.unknown",
                    format!("'{}' file not found", name),
                    SourceLocation::default(),
                ));
                continue;
            };

            let unit_name = format!("<{}>", name);
            let scope = match Parser::new(&header.source).and_then(|mut parser| parser.parse_source_file()) {
                Ok(file) => self.compile_unit(&unit_name, &file, &[], true),
                Err(err) => {
                    self.notes.push(Note::error("parse", err.message, err.location));
                    self.scopes.create(ScopeKind::Header, None)
                }
            };

            for def in &header.intrinsics {
                self.declare_intrinsic(scope, def.clone());
            }
            debug!(header = name, intrinsics = header.intrinsics.len(), "header included");
            self.header_scopes.insert(name.to_string(), scope);
            imports.push(scope);
        }
        imports
    }

    fn header_class_names(&self, imports: &[ScopeId]) -> Vec<String> {
        imports
            .iter()
            .filter_map(|scope| self.scopes.get(*scope))
            .flat_map(|scope| scope.bindings.iter())
            .filter(|(_, binding)| {
                matches!(binding, Binding::Single(id)
                    if matches!(self.entities.get(*id).map(|e| &e.kind), Some(EntityKind::Class(_))))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn declare_intrinsic(&mut self, scope: ScopeId, def: IntrinsicDef) {
        let index = self.intrinsics.len();
        let entity = self.entities.add(Entity {
            name: def.name.clone(),
            qualified_name: def.name.clone(),
            kind: EntityKind::Function(FunctionInfo {
                signature: FunctionType {
                    return_type: def.return_type.clone(),
                    param_types: def.param_types.clone(),
                    receiver: None,
                },
                role: FunctionRole::Ordinary,
                class: None,
                intrinsic: Some(index),
                is_implicit: false,
            }),
            location: SourceLocation::default(),
        });
        self.scopes.declare(scope, &def.name, entity, &self.entities);
        self.intrinsics.push(def);
    }

    /// Compile one parsed file into a fresh global (or header) scope
    fn compile_unit(&mut self, name: &str, file: &SourceFile, imports: &[ScopeId], is_header: bool) -> ScopeId {
        let kind = if is_header { ScopeKind::Header } else { ScopeKind::Global };
        let global_scope = self.scopes.create(kind, None);
        for header in imports {
            self.scopes.add_import(global_scope, *header);
        }

        let unit = self.units.len();
        self.units.push(TranslationUnit {
            name: name.to_string(),
            global_scope,
            top_level: Vec::new(),
            is_header,
        });

        let top_level = {
            let mut compiler = Compiler::new(self, unit, global_scope);
            compiler.compile_file(file)
        };
        if let Some(unit) = self.units.get_mut(unit) {
            unit.top_level = top_level;
        }
        debug!(unit = name, "translation unit compiled");
        global_scope
    }

    fn link(&mut self) {
        if self.main.is_none() {
            self.notes.push(Note::error(
                "link.main",
                "undefined reference to 'main'",
                SourceLocation::default(),
            ));
        }

        let mut missing = Vec::new();
        for (entity, location) in &self.used_functions {
            let Some(info) = self.entities.function(*entity) else {
                continue;
            };
            if info.intrinsic.is_none() && !info.is_implicit && !self.definitions.contains_key(entity) {
                let name = self.entities.get(*entity).map_or("?", |e| e.qualified_name.as_str());
                missing.push(Note::error(
                    "link.undefined",
                    format!("undefined reference to '{}'", name),
                    *location,
                ));
            }
        }
        self.notes.extend(missing);
    }

    // ===== Queries =====

    /// Every note: program-level notes first, then construct notes in creation order
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().chain(self.constructs.all_notes())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Note> {
        self.notes().filter(|n| n.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn main(&self) -> Option<EntityId> {
        self.main
    }

    /// FunctionDefinition construct of a function entity
    pub fn definition(&self, function: EntityId) -> Option<ConstructId> {
        self.definitions.get(&function).copied()
    }

    /// Static-storage variable definitions in initialization order
    pub fn globals(&self) -> &[ConstructId] {
        &self.globals
    }

    /// DestructorCall construct for a class with a user-declared destructor
    pub fn destructor_call(&self, class: ClassId) -> Option<ConstructId> {
        self.destructors.get(&class).copied()
    }

    pub fn intrinsic(&self, index: usize) -> Option<&IntrinsicDef> {
        self.intrinsics.get(index)
    }

    /// Look a name up in the global scope of a unit
    pub fn lookup_global(&self, unit: usize, name: &str) -> LookupResult {
        match self.units.get(unit) {
            Some(u) => self.scopes.lookup(u.global_scope, name, &self.classes),
            None => LookupResult::NotFound,
        }
    }
}

/// Per-function state while compiling a function body
#[derive(Debug)]
pub(crate) struct FunctionContext {
    pub(crate) return_type: Type,
    pub(crate) class: Option<ClassId>,
    pub(crate) is_const: bool,
    /// Every automatic object of the function, parameters first
    pub(crate) locals: Vec<EntityId>,
    /// Objects declared directly in each open block, innermost last
    pub(crate) block_locals: Vec<Vec<EntityId>>,
    pub(crate) has_return: bool,
}

/// Builder state threaded through all construct builders
pub(crate) struct Compiler<'p> {
    pub(crate) program: &'p mut Program,
    pub(crate) unit: usize,
    pub(crate) scope: ScopeId,
    pub(crate) function: Option<FunctionContext>,
    pub(crate) loop_depth: usize,
}

impl<'p> Compiler<'p> {
    pub(crate) fn new(program: &'p mut Program, unit: usize, scope: ScopeId) -> Self {
        Compiler {
            program,
            unit,
            scope,
            function: None,
            loop_depth: 0,
        }
    }

    // ===== Arena helpers =====

    pub(crate) fn add(&mut self, kind: ConstructKind, location: SourceLocation) -> ConstructId {
        self.program.constructs.add(kind, location)
    }

    pub(crate) fn set_type(&mut self, id: ConstructId, ty: Type, category: ValueCategory) {
        self.program.constructs.set_type(id, ty, category);
    }

    pub(crate) fn attach(&mut self, parent: ConstructId, children: &[ConstructId]) {
        self.program.constructs.attach_all(parent, children);
    }

    pub(crate) fn error(&mut self, id: ConstructId, rule: &'static str, message: impl Into<String>) {
        let location = self.program.constructs.location(id);
        self.program.constructs.add_note(id, Note::error(rule, message, location));
    }

    pub(crate) fn warning(&mut self, id: ConstructId, rule: &'static str, message: impl Into<String>) {
        let location = self.program.constructs.location(id);
        self.program.constructs.add_note(id, Note::warning(rule, message, location));
    }

    /// Note that belongs to no construct (e.g. a bad class member declaration)
    pub(crate) fn unit_error(&mut self, rule: &'static str, message: impl Into<String>, location: SourceLocation) {
        self.program.notes.push(Note::error(rule, message, location));
    }

    pub(crate) fn ty(&self, id: ConstructId) -> Option<Type> {
        self.program.constructs.ty(id).cloned()
    }

    pub(crate) fn category(&self, id: ConstructId) -> Option<ValueCategory> {
        self.program.constructs.category(id)
    }

    pub(crate) fn well_typed(&self, id: ConstructId) -> bool {
        self.program.constructs.is_well_typed(id)
    }

    pub(crate) fn kind(&self, id: ConstructId) -> Option<&ConstructKind> {
        self.program.constructs.kind(id)
    }

    /// An `Invalid` expression carrying an error note
    pub(crate) fn invalid(&mut self, location: SourceLocation, rule: &'static str, message: impl Into<String>) -> ConstructId {
        let id = self.add(ConstructKind::Invalid, location);
        self.error(id, rule, message);
        id
    }

    /// An `Invalid` expression owning children that already carry errors
    pub(crate) fn poisoned(&mut self, location: SourceLocation, children: &[ConstructId]) -> ConstructId {
        let id = self.add(ConstructKind::Invalid, location);
        self.attach(id, children);
        if !self.program.constructs.has_errors(id) {
            self.error(id, "expr.invalid", "invalid expression");
        }
        id
    }

    // ===== Names and types =====

    pub(crate) fn lookup(&self, name: &str) -> LookupResult {
        self.program.scopes.lookup(self.scope, name, &self.program.classes)
    }

    pub(crate) fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.program.entities.get(id)
    }

    /// Resolve a spelled type. Pointers apply to the specifier, arrays to the
    /// pointer type, and a reference to the whole.
    pub(crate) fn resolve_type(&self, name: &TypeName) -> Result<Type, String> {
        use crate::parser::ast::BaseType;

        let mut ty = match &name.base {
            BaseType::Int => Type::int(),
            BaseType::Char => Type::char(),
            BaseType::Bool => Type::bool(),
            BaseType::Float => Type::float(),
            BaseType::Double => Type::double(),
            BaseType::Void => Type::void(),
            BaseType::Named(class_name) => match self.lookup(class_name) {
                LookupResult::Entity(id) => match self.entity(id).map(|e| &e.kind) {
                    Some(EntityKind::Class(class)) => self.program.classes.class_type(*class),
                    _ => return Err(format!("'{}' does not name a type", class_name)),
                },
                _ => return Err(format!("unknown type name '{}'", class_name)),
            },
        };
        if name.is_const {
            ty = ty.const_qualified();
        }

        for is_const in &name.pointers {
            if ty.is_reference() {
                return Err("pointer to reference is not allowed".to_string());
            }
            ty = Type::pointer_to(ty);
            if *is_const {
                ty = ty.const_qualified();
            }
        }

        if !name.array_dims.is_empty() {
            if ty.is_void() {
                return Err("array has incomplete element type 'void'".to_string());
            }
            for (depth, dim) in name.array_dims.iter().enumerate().rev() {
                ty = match dim {
                    Some(0) => return Err("zero-size arrays are not allowed".to_string()),
                    Some(n) => Type::array_of(ty, *n as u64),
                    None if depth == 0 => Type::ArrayOfUnknownBound { elem: Box::new(ty) },
                    None => return Err("only the first array bound may be omitted".to_string()),
                };
            }
        }

        if name.is_reference {
            if ty.is_void() {
                return Err("cannot form a reference to 'void'".to_string());
            }
            ty = Type::reference_to(ty);
        }
        Ok(ty)
    }

    /// Parameter types decay: arrays become pointers to their element
    pub(crate) fn adjust_parameter_type(ty: Type) -> Type {
        match ty.decayed() {
            Some(pointer) if ty.is_array() => pointer,
            _ => ty,
        }
    }

    /// Record that a function is called, for the linker
    pub(crate) fn mark_used(&mut self, function: EntityId, location: SourceLocation) {
        self.program.used_functions.entry(function).or_insert(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_messages(program: &Program) -> Vec<String> {
        program.errors().map(|n| n.message.clone()).collect()
    }

    #[test]
    fn test_simple_program_compiles_cleanly() {
        let program = Program::compile_source("int main() { int x = 5; int y = x + 2; return 0; }");
        assert!(!program.has_errors(), "{:?}", error_messages(&program));
        assert!(program.main().is_some());
    }

    #[test]
    fn test_missing_main_is_a_link_error() {
        let program = Program::compile_source("int f() { return 1; }");
        assert!(program.errors().any(|n| n.id == "link.main"));
    }

    #[test]
    fn test_undefined_function_is_a_link_error() {
        let program = Program::compile_source("int f(int); int main() { return f(2); }");
        let messages = error_messages(&program);
        assert!(messages.iter().any(|m| m.contains("undefined reference to 'f'")), "{:?}", messages);
    }

    #[test]
    fn test_functions_link_across_units() {
        let units = [
            SourceUnit::new("main.cpp", "int twice(int x); int main() { return twice(4); }"),
            SourceUnit::new("twice.cpp", "int twice(int x) { return 2 * x; }"),
        ];
        let program = Program::compile(&units, &LibraryRegistry::standard());
        assert!(!program.has_errors(), "{:?}", error_messages(&program));
    }

    #[test]
    fn test_duplicate_definition_across_units() {
        let units = [
            SourceUnit::new("a.cpp", "int f() { return 1; } int main() { return f(); }"),
            SourceUnit::new("b.cpp", "int f() { return 2; }"),
        ];
        let program = Program::compile(&units, &LibraryRegistry::standard());
        assert!(error_messages(&program).iter().any(|m| m.contains("redefinition of 'f'")));
    }

    #[test]
    fn test_parse_errors_become_notes() {
        let program = Program::compile_source("int main() { int x = ; }");
        assert!(program.errors().any(|n| n.id == "parse"));
    }

    #[test]
    fn test_unknown_header() {
        let program = Program::compile_source("#include <vector>\nint main() { return 0; }");
        assert!(error_messages(&program).iter().any(|m| m.contains("'vector' file not found")));
    }
}
