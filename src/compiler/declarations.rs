//! Declarations
//!
//! Classes, functions and variables. Each declaration creates an entity and
//! binds it in the current scope; definitions additionally produce
//! constructs (`FunctionDefinition`, `VariableDefinition`).
//!
//! Class members are processed in two passes so member function bodies can
//! refer to members declared after them: all members are declared first,
//! then the bodies are compiled.

use tracing::trace;

use super::initializers::InitForm;
use super::{Compiler, ConstructId, ConstructKind, FunctionContext, InitTarget, ValueCategory, CONSTRUCTOR_KEY};
use crate::entities::{
    DeclareOutcome, Entity, EntityId, EntityKind, FunctionInfo, FunctionRole, ScopeKind, StorageKind,
};
use crate::parser::ast::{
    AstNode, BaseType, ClassDef, ClassMember, Declarator, FunctionDef, FunctionKind, InitSyntax, MemberInit,
    SourceFile, SourceLocation, TypeName,
};
use crate::types::{ClassId, FunctionType, Type};

impl Compiler<'_> {
    /// Compile the top-level declarations of one file
    pub(crate) fn compile_file(&mut self, file: &SourceFile) -> Vec<ConstructId> {
        let mut top_level = Vec::new();
        for node in &file.nodes {
            match node {
                AstNode::ClassDef(def) => top_level.extend(self.compile_class(def)),
                AstNode::FunctionDef(def) => {
                    if let Some(id) = self.compile_function(def, None) {
                        top_level.push(id);
                    }
                }
                AstNode::Declaration { declarators, location } => {
                    top_level.push(self.compile_declaration(declarators, *location, true));
                }
                other => {
                    self.unit_error("decl.topLevel", "expected a declaration", other.location());
                }
            }
        }
        top_level
    }

    /// Bind `entity` under `name` in the current scope, reporting clashes.
    /// Returns the entity the name now refers to.
    fn bind(&mut self, name: &str, entity: EntityId, location: SourceLocation) -> EntityId {
        let outcome = self.program.scopes.declare(self.scope, name, entity, &self.program.entities);
        match outcome {
            DeclareOutcome::Declared => entity,
            DeclareOutcome::Redeclared(existing) => existing,
            DeclareOutcome::Redefinition(_) => {
                self.unit_error("decl.redefinition", format!("redefinition of '{}'", name), location);
                entity
            }
            DeclareOutcome::Conflicting => {
                self.unit_error(
                    "decl.conflict",
                    format!("'{}' redeclared as a different kind of entity", name),
                    location,
                );
                entity
            }
        }
    }

    // ===== Classes =====

    fn compile_class(&mut self, def: &ClassDef) -> Vec<ConstructId> {
        let class = self.program.classes.declare(&def.name);
        let entity = self.program.entities.add(Entity {
            name: def.name.clone(),
            qualified_name: def.name.clone(),
            kind: EntityKind::Class(class),
            location: def.location,
        });
        self.bind(&def.name, entity, def.location);

        if let Some(existing) = self.program.classes.get(class) {
            if existing.is_complete {
                // The same class compiled again in another unit shares the first definition
                if existing.defined_in == Some(self.unit) {
                    self.unit_error("class.redefinition", format!("redefinition of class '{}'", def.name), def.location);
                }
                return Vec::new();
            }
        }

        let base = def.base.as_ref().and_then(|base_name| {
            match self.resolve_type(&TypeName::new(BaseType::Named(base_name.clone()))) {
                Ok(ty) if ty.is_complete_object_type(&self.program.classes) => ty.class_id(),
                Ok(_) => {
                    self.unit_error("class.base", format!("base class '{}' has incomplete type", base_name), def.location);
                    None
                }
                Err(message) => {
                    self.unit_error("class.base", message, def.location);
                    None
                }
            }
        });

        let mut fields = Vec::new();
        for member in &def.members {
            let ClassMember::Field(field) = member else {
                continue;
            };
            match self.resolve_type(&field.var_type) {
                Ok(ty) if ty.is_reference() => {
                    self.unit_error("class.member", "reference members are not supported", field.location);
                }
                Ok(ty) if !ty.is_complete_object_type(&self.program.classes) => {
                    self.unit_error(
                        "class.member",
                        format!("field '{}' has incomplete type '{}'", field.name, ty),
                        field.location,
                    );
                }
                Ok(ty) => fields.push((field.name.clone(), ty, field.location)),
                Err(message) => self.unit_error("class.member", message, field.location),
            }
        }

        self.program.classes.define(
            class,
            base,
            fields.iter().map(|(name, ty, _)| (name.clone(), ty.clone())).collect(),
        );
        self.program.classes.set_defined_in(class, self.unit);
        let class_scope = self.program.scopes.create(ScopeKind::Class(class), Some(self.scope));
        let class_type = self.program.classes.class_type(class);

        let outer = self.scope;
        self.scope = class_scope;

        for (index, (name, ty, location)) in fields.into_iter().enumerate() {
            let member = self.program.entities.add(Entity {
                name: name.clone(),
                qualified_name: format!("{}::{}", def.name, name),
                kind: EntityKind::Object {
                    ty,
                    storage: StorageKind::Member { class, index },
                },
                location,
            });
            self.bind(&name, member, location);
        }

        let mut methods = Vec::new();
        for member in &def.members {
            if let ClassMember::Method(method) = member {
                if let Some(entity) = self.declare_function(method, Some(class)) {
                    methods.push((method, entity));
                }
            }
        }
        self.declare_implicit_constructors(class, &class_type, def.location);

        let mut definitions = Vec::new();
        for (method, entity) in methods {
            if method.body.is_some() {
                definitions.push(self.compile_function_body(method, entity, Some(class)));
            }
            if method.kind == FunctionKind::Destructor {
                let call = self.add(ConstructKind::DestructorCall { dtor: entity }, method.location);
                self.set_type(call, Type::void(), ValueCategory::PRValue);
                self.program.destructors.insert(class, call);
            }
        }

        self.scope = outer;
        trace!(class = %def.name, "class compiled");
        definitions
    }

    /// Implicit default constructor (only without user constructors) and
    /// implicit copy constructor (unless the user declared one)
    fn declare_implicit_constructors(&mut self, class: ClassId, class_type: &Type, location: SourceLocation) {
        let existing = self.constructors(class);
        let copy_param = Type::reference_to(class_type.const_qualified());
        let has_copy = existing.iter().any(|c| {
            self.program.entities.function(*c).is_some_and(|f| {
                f.signature.param_types.len() == 1
                    && f.signature.param_types[0]
                        .referred()
                        .is_some_and(|r| r.similar_type(class_type))
            })
        });

        let mut implicit = Vec::new();
        if existing.is_empty() {
            implicit.push(Vec::new());
        }
        if !has_copy {
            implicit.push(vec![copy_param]);
        }

        let class_name = self.program.classes.name(class).to_string();
        for params in implicit {
            let entity = self.program.entities.add(Entity {
                name: class_name.clone(),
                qualified_name: format!("{}::{}", class_name, class_name),
                kind: EntityKind::Function(FunctionInfo {
                    signature: FunctionType {
                        return_type: Type::void(),
                        param_types: params,
                        receiver: Some(class_type.clone()),
                    },
                    role: FunctionRole::Constructor,
                    class: Some(class),
                    intrinsic: None,
                    is_implicit: true,
                }),
                location,
            });
            self.bind(CONSTRUCTOR_KEY, entity, location);
        }
    }

    // ===== Functions =====

    /// Declare (and, with a body, define) a free function
    fn compile_function(&mut self, def: &FunctionDef, class: Option<ClassId>) -> Option<ConstructId> {
        let entity = self.declare_function(def, class)?;
        def.body.as_ref()?;
        Some(self.compile_function_body(def, entity, class))
    }

    fn function_signature(&self, def: &FunctionDef, class: Option<ClassId>) -> Result<FunctionType, String> {
        let return_type = self.resolve_type(&def.return_type)?;
        if return_type.is_array() {
            return Err(format!("function '{}' cannot return an array type", def.name));
        }
        let mut param_types = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = Self::adjust_parameter_type(self.resolve_type(&param.param_type)?);
            if ty.is_void() {
                return Err("parameter may not have type 'void'".to_string());
            }
            param_types.push(ty);
        }
        let receiver = class.map(|id| {
            let ty = self.program.classes.class_type(id);
            if def.is_const {
                ty.const_qualified()
            } else {
                ty
            }
        });
        Ok(FunctionType {
            return_type,
            param_types,
            receiver,
        })
    }

    /// Create (or find the earlier declaration of) a function entity
    fn declare_function(&mut self, def: &FunctionDef, class: Option<ClassId>) -> Option<EntityId> {
        let signature = match self.function_signature(def, class) {
            Ok(signature) => signature,
            Err(message) => {
                self.unit_error("decl.function", message, def.location);
                return None;
            }
        };
        if def.is_const && class.is_none() {
            self.unit_error(
                "decl.constFunction",
                format!("non-member function '{}' cannot have a const qualifier", def.name),
                def.location,
            );
        }

        let role = match def.kind {
            FunctionKind::Ordinary => FunctionRole::Ordinary,
            FunctionKind::Constructor => FunctionRole::Constructor,
            FunctionKind::Destructor => FunctionRole::Destructor,
        };
        let binding_name = match role {
            FunctionRole::Constructor => CONSTRUCTOR_KEY.to_string(),
            _ => def.name.clone(),
        };
        let qualified_name = match class {
            Some(id) => format!("{}::{}", self.program.classes.name(id), def.name),
            None => def.name.clone(),
        };

        // Free functions with the same name and signature are one entity program-wide
        let linkage_key = class.is_none().then(|| {
            let params: Vec<String> = signature.param_types.iter().map(|p| p.cv_unqualified().to_string()).collect();
            format!("{}({})", qualified_name, params.join(","))
        });
        if let Some(key) = &linkage_key {
            if let Some(existing) = self.program.linkage.get(key).copied() {
                self.check_return_type(existing, &signature, def);
                return Some(self.bind(&binding_name, existing, def.location));
            }
        }

        let entity = self.program.entities.add(Entity {
            name: def.name.clone(),
            qualified_name,
            kind: EntityKind::Function(FunctionInfo {
                signature: signature.clone(),
                role,
                class,
                intrinsic: None,
                is_implicit: false,
            }),
            location: def.location,
        });
        let bound = self.bind(&binding_name, entity, def.location);
        if bound != entity {
            self.check_return_type(bound, &signature, def);
        }
        if let Some(key) = linkage_key {
            self.program.linkage.insert(key, bound);
        }
        Some(bound)
    }

    fn check_return_type(&mut self, existing: EntityId, signature: &FunctionType, def: &FunctionDef) {
        let differs = self
            .program
            .entities
            .function(existing)
            .is_some_and(|f| !f.signature.return_type.same_type(&signature.return_type));
        if differs {
            self.unit_error(
                "decl.returnType",
                format!("functions that differ only in their return type cannot be overloaded ('{}')", def.name),
                def.location,
            );
        }
    }

    /// Compile parameters, constructor initializer and body of a function
    fn compile_function_body(&mut self, def: &FunctionDef, entity: EntityId, class: Option<ClassId>) -> ConstructId {
        let Some(info) = self.program.entities.function(entity).cloned() else {
            return self.invalid(def.location, "decl.function", "not a function");
        };
        let node = self.add(
            ConstructKind::FunctionDefinition {
                entity,
                params: Vec::new(),
                body: ConstructId(0),
                locals: Vec::new(),
                ctor_initializer: None,
            },
            def.location,
        );

        match self.program.defining_units.get(&entity).copied() {
            Some(unit) if unit != self.unit => {
                self.error(node, "link.duplicate", format!("multiple definition of '{}'", def.name));
            }
            Some(_) => self.error(node, "decl.redefinition", format!("redefinition of '{}'", def.name)),
            None => {
                self.program.definitions.insert(entity, node);
                self.program.defining_units.insert(entity, self.unit);
            }
        }
        if def.name == "main" && class.is_none() {
            if !info.signature.param_types.is_empty() {
                self.error(node, "decl.main", "'main' must not take parameters");
            }
            if !info.signature.return_type.is_integral() {
                self.error(node, "decl.main", "'main' must return 'int'");
            }
            self.program.main = Some(entity);
        }

        let outer_scope = self.scope;
        let function_scope = self.program.scopes.create(ScopeKind::Function, Some(self.scope));
        self.scope = function_scope;
        let outer_function = self.function.replace(FunctionContext {
            return_type: info.signature.return_type.clone(),
            class,
            is_const: def.is_const,
            locals: Vec::new(),
            block_locals: vec![Vec::new()],
            has_return: false,
        });

        let mut params = Vec::with_capacity(def.params.len());
        for (index, (param, ty)) in def.params.iter().zip(&info.signature.param_types).enumerate() {
            let name = param.name.clone().unwrap_or_else(|| format!("<parameter {}>", index + 1));
            let kind = match ty.referred() {
                Some(referred) => EntityKind::Reference {
                    ty: referred.clone(),
                    storage: StorageKind::Automatic,
                },
                None => EntityKind::Object {
                    ty: ty.clone(),
                    storage: StorageKind::Automatic,
                },
            };
            let param_entity = self.program.entities.add(Entity {
                name: name.clone(),
                qualified_name: name.clone(),
                kind,
                location: param.location,
            });
            if param.name.is_some() {
                self.bind(&name, param_entity, param.location);
            }
            params.push(param_entity);
            if let Some(ctx) = self.function.as_mut() {
                ctx.locals.push(param_entity);
            }
        }

        let ctor_initializer = match (info.role, class) {
            (FunctionRole::Constructor, Some(class)) => Some(self.compile_ctor_initializer(class, &def.ctor_initializers, def.location)),
            _ => None,
        };

        let statements: Vec<ConstructId> = def
            .body
            .iter()
            .flatten()
            .map(|stmt| self.compile_statement(stmt))
            .collect();
        let block_locals = self
            .function
            .as_mut()
            .and_then(|ctx| ctx.block_locals.pop())
            .unwrap_or_default();
        let body = self.add(
            ConstructKind::Block {
                statements: statements.clone(),
                locals: block_locals,
            },
            def.location,
        );
        self.attach(body, &statements);
        self.set_type(body, Type::void(), ValueCategory::PRValue);

        let ctx = self.function.take();
        self.function = outer_function;
        self.scope = outer_scope;

        let (locals, has_return) = ctx.map_or((Vec::new(), false), |c| (c.locals, c.has_return));
        let returns_value = !info.signature.return_type.is_void();
        if returns_value && !has_return && def.name != "main" {
            self.warning(
                node,
                "decl.missingReturn",
                format!("non-void function '{}' has no return statement", def.name),
            );
        }

        let children: Vec<ConstructId> = ctor_initializer.into_iter().chain(std::iter::once(body)).collect();
        self.attach(node, &children);
        self.program.constructs.set_kind(
            node,
            ConstructKind::FunctionDefinition {
                entity,
                params,
                body,
                locals,
                ctor_initializer,
            },
        );
        self.set_type(node, Type::Function(Box::new(info.signature)), ValueCategory::LValue);
        trace!(function = %def.name, "function compiled");
        node
    }

    /// Base and member initialization of a constructor, in declaration order
    fn compile_ctor_initializer(&mut self, class: ClassId, inits: &[MemberInit], location: SourceLocation) -> ConstructId {
        let node = self.add(
            ConstructKind::CtorInitializer {
                base: None,
                members: Vec::new(),
            },
            location,
        );
        let Some(info) = self.program.classes.get(class).cloned() else {
            return node;
        };
        let base_name = info.base.map(|b| self.program.classes.name(b).to_string());

        let mut base_init: Option<&MemberInit> = None;
        let mut member_inits: Vec<Option<&MemberInit>> = vec![None; info.members.len()];
        for init in inits {
            if base_name.as_deref() == Some(init.name.as_str()) {
                if base_init.replace(init).is_some() {
                    self.error(node, "ctor.duplicate", format!("base '{}' initialized twice", init.name));
                }
                continue;
            }
            match info.members.iter().position(|m| m.name == init.name) {
                Some(index) => {
                    if member_inits[index].replace(init).is_some() {
                        self.error(node, "ctor.duplicate", format!("member '{}' initialized twice", init.name));
                    }
                }
                None => self.error(
                    node,
                    "ctor.unknownMember",
                    format!("class '{}' does not have a member or base named '{}'", info.name, init.name),
                ),
            }
        }

        let base = info.base.map(|base| {
            let base_type = self.program.classes.class_type(base);
            let form = self.member_init_form(base_init);
            self.initialize(InitTarget::Base, &base_type, form, base_init.map_or(location, |i| i.location), false)
        });
        let members: Vec<ConstructId> = info
            .members
            .iter()
            .zip(member_inits)
            .enumerate()
            .map(|(index, (member, init))| {
                let form = self.member_init_form(init);
                self.initialize(InitTarget::Member(index), &member.ty, form, init.map_or(location, |i| i.location), false)
            })
            .collect();

        let children: Vec<ConstructId> = base.iter().chain(&members).copied().collect();
        self.attach(node, &children);
        self.program.constructs.set_kind(node, ConstructKind::CtorInitializer { base, members });
        self.set_type(node, Type::void(), ValueCategory::PRValue);
        node
    }

    fn member_init_form(&mut self, init: Option<&MemberInit>) -> InitForm {
        match init {
            None => InitForm::Default,
            Some(init) if init.args.is_empty() => InitForm::Value,
            Some(init) => InitForm::Direct(init.args.iter().map(|a| self.compile_expression(a)).collect()),
        }
    }

    // ===== Variables =====

    /// Compile a declaration statement; `is_static` for namespace-scope variables
    pub(crate) fn compile_declaration(&mut self, declarators: &[Declarator], location: SourceLocation, is_static: bool) -> ConstructId {
        let definitions: Vec<ConstructId> = declarators
            .iter()
            .map(|d| self.compile_variable(d, is_static))
            .collect();
        let node = self.add(
            ConstructKind::Declaration {
                definitions: definitions.clone(),
            },
            location,
        );
        self.attach(node, &definitions);
        self.set_type(node, Type::void(), ValueCategory::PRValue);
        node
    }

    fn compile_variable(&mut self, declarator: &Declarator, is_static: bool) -> ConstructId {
        let location = declarator.location;
        let node = self.add(
            ConstructKind::VariableDefinition {
                entity: EntityId(0),
                init: None,
            },
            location,
        );

        let ty = match self.resolve_type(&declarator.var_type) {
            Ok(ty) => self.deduce_array_bound(ty, declarator.init.as_ref()),
            Err(message) => {
                self.error(node, "decl.type", message);
                return node;
            }
        };
        if ty.is_void() {
            self.error(node, "decl.void", format!("variable '{}' has incomplete type 'void'", declarator.name));
            return node;
        }

        let storage = if is_static { StorageKind::Static } else { StorageKind::Automatic };
        let kind = match ty.referred() {
            Some(referred) => EntityKind::Reference {
                ty: referred.clone(),
                storage,
            },
            None => EntityKind::Object { ty: ty.clone(), storage },
        };
        let entity = self.program.entities.add(Entity {
            name: declarator.name.clone(),
            qualified_name: declarator.name.clone(),
            kind,
            location,
        });

        let outcome = self
            .program
            .scopes
            .declare(self.scope, &declarator.name, entity, &self.program.entities);
        match outcome {
            DeclareOutcome::Redefinition(_) => self.error(node, "decl.redefinition", format!("redefinition of '{}'", declarator.name)),
            DeclareOutcome::Conflicting => self.error(
                node,
                "decl.conflict",
                format!("'{}' redeclared as a different kind of entity", declarator.name),
            ),
            DeclareOutcome::Declared | DeclareOutcome::Redeclared(_) => {}
        }
        if is_static {
            let key = format!("variable {}", declarator.name);
            if self.program.linkage.contains_key(&key) {
                self.error(node, "link.duplicate", format!("multiple definition of '{}'", declarator.name));
            } else {
                self.program.linkage.insert(key, entity);
            }
        }

        if let Some(ctx) = self.function.as_mut() {
            ctx.locals.push(entity);
            if let Some(block) = ctx.block_locals.last_mut() {
                block.push(entity);
            }
        }

        if ty.is_reference() && declarator.init.is_none() {
            self.error(
                node,
                "decl.referenceInit",
                format!("declaration of reference variable '{}' requires an initializer", declarator.name),
            );
        }

        let form = self.compile_init_syntax(declarator.init.as_ref());
        let init = self.initialize(InitTarget::Entity(entity), &ty, form, location, is_static);
        self.attach(node, &[init]);
        self.program.constructs.set_kind(
            node,
            ConstructKind::VariableDefinition {
                entity,
                init: Some(init),
            },
        );
        self.set_type(node, Type::void(), ValueCategory::PRValue);
        if is_static {
            self.program.globals.push(node);
        }
        node
    }

    /// `int a[] = {1, 2, 3}` and `char s[] = "hi"` take their bound from the initializer
    fn deduce_array_bound(&self, ty: Type, init: Option<&InitSyntax>) -> Type {
        let Type::ArrayOfUnknownBound { elem } = &ty else {
            return ty;
        };
        let length = match init {
            Some(InitSyntax::List(items)) => match items.as_slice() {
                [AstNode::StringLiteral(text, _)] if elem.atomic_kind() == Type::char().atomic_kind() => text.len() + 1,
                _ => items.len(),
            },
            Some(InitSyntax::Copy(expr)) => match expr.as_ref() {
                AstNode::StringLiteral(text, _) => text.len() + 1,
                _ => return ty,
            },
            _ => return ty,
        };
        Type::array_of((**elem).clone(), length as u64)
    }
}
