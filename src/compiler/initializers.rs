//! Initializers
//!
//! Every object that comes into existence gets an `Initializer` construct:
//! declared variables, parameters, return values, `new` objects, temporaries,
//! array elements and class members. The initialization form is one of
//! default, value (`{}`), copy (`= e`), direct (`(args)`) or list (`{args}`),
//! and the target type decides what the initializer does at runtime
//! ([`InitAction`]).

use super::overloads::resolve_overload;
use super::{ArgumentInfo, Compiler, ConstructId, ConstructKind, InitAction, InitKind, InitTarget, ValueCategory, CONSTRUCTOR_KEY};
use crate::entities::EntityId;
use crate::parser::ast::{InitSyntax, SourceLocation};
use crate::types::{reference_compatible, AtomicKind, ClassId, Type};

/// Compiled arguments of an initializer, by syntactic form
#[derive(Debug, Clone)]
pub(crate) enum InitForm {
    Default,
    Value,
    Copy(ConstructId),
    Direct(Vec<ConstructId>),
    List(Vec<ConstructId>),
}

impl InitForm {
    fn kind(&self) -> InitKind {
        match self {
            InitForm::Default => InitKind::Default,
            InitForm::Value => InitKind::Value,
            InitForm::Copy(_) => InitKind::Copy,
            InitForm::Direct(_) => InitKind::Direct,
            InitForm::List(_) => InitKind::List,
        }
    }

    fn args(&self) -> Vec<ConstructId> {
        match self {
            InitForm::Default | InitForm::Value => Vec::new(),
            InitForm::Copy(arg) => vec![*arg],
            InitForm::Direct(args) | InitForm::List(args) => args.clone(),
        }
    }
}

/// Constructs an action refers to, in evaluation order
fn action_children(action: &InitAction) -> Vec<ConstructId> {
    match action {
        InitAction::None | InitAction::ZeroFill | InitAction::StringArray { .. } => Vec::new(),
        InitAction::Atomic { arg } | InitAction::ClassCopy { arg } | InitAction::Bind { arg, .. } => vec![*arg],
        InitAction::Aggregate { elements, .. } => elements.clone(),
        InitAction::Constructor { args, .. } => args.clone(),
        InitAction::ClassMembers { base, members } => base.iter().chain(members).copied().collect(),
    }
}

impl Compiler<'_> {
    /// Compile the expressions of an initializer as written
    pub(crate) fn compile_init_syntax(&mut self, syntax: Option<&InitSyntax>) -> InitForm {
        match syntax {
            None => InitForm::Default,
            Some(InitSyntax::Value) => InitForm::Value,
            Some(InitSyntax::Copy(expr)) => InitForm::Copy(self.compile_expression(expr)),
            Some(InitSyntax::Direct(args)) => InitForm::Direct(args.iter().map(|a| self.compile_expression(a)).collect()),
            Some(InitSyntax::List(args)) => InitForm::List(args.iter().map(|a| self.compile_expression(a)).collect()),
        }
    }

    /// Build the initializer of an object of type `ty` (a reference type for
    /// references). Objects of static storage duration are zero-filled when
    /// default-initialized.
    pub(crate) fn initialize(
        &mut self,
        target: InitTarget,
        ty: &Type,
        form: InitForm,
        location: SourceLocation,
        is_static: bool,
    ) -> ConstructId {
        let kind = form.kind();
        let args = form.args();
        let node = self.add(
            ConstructKind::Initializer {
                kind,
                target,
                action: InitAction::None,
            },
            location,
        );

        if args.iter().any(|arg| !self.well_typed(*arg)) {
            self.attach(node, &args);
            return node;
        }

        let action = if let Some(referred) = ty.referred() {
            self.reference_action(node, referred, &args)
        } else if let Some(class) = ty.class_id() {
            self.class_action(node, ty, class, form, location)
        } else if ty.is_array() {
            self.array_action(node, ty, form, location, is_static)
        } else if ty.is_atomic() {
            self.atomic_action(node, ty, form, is_static)
        } else {
            self.error(node, "init.type", format!("cannot initialize an object of type '{}'", ty));
            InitAction::None
        };

        let mut children = action_children(&action);
        if children.is_empty() {
            children = args;
        }
        self.attach(node, &children);
        self.program
            .constructs
            .set_kind(node, ConstructKind::Initializer { kind, target, action });
        self.set_type(node, ty.clone(), ValueCategory::PRValue);
        node
    }

    fn reference_action(&mut self, node: ConstructId, referred: &Type, args: &[ConstructId]) -> InitAction {
        let arg = match args {
            [arg] => *arg,
            [] => {
                self.error(node, "init.reference", "a reference must be initialized");
                return InitAction::None;
            }
            _ => {
                self.error(node, "init.reference", "too many initializers for a reference");
                return InitAction::None;
            }
        };
        let (Some(arg_type), Some(category)) = (self.ty(arg), self.category(arg)) else {
            return InitAction::None;
        };

        if category != ValueCategory::PRValue && reference_compatible(referred, &arg_type, &self.program.classes) {
            return InitAction::Bind { arg, materialize: false };
        }

        if referred.is_const() {
            if referred.is_class() {
                if arg_type.similar_type(referred) || arg_type.sub_type(referred, &self.program.classes) {
                    return InitAction::Bind { arg, materialize: false };
                }
            } else if let Some(converted) = self.try_convert(arg, &referred.cv_unqualified()) {
                return InitAction::Bind {
                    arg: converted,
                    materialize: true,
                };
            }
        }

        let message = if category == ValueCategory::PRValue && referred.similar_type(&arg_type) {
            format!(
                "cannot bind a non-const lvalue reference of type '{}&' to a temporary of type '{}'",
                referred, arg_type
            )
        } else {
            format!(
                "cannot bind a reference of type '{}&' to a value of type '{}'",
                referred, arg_type
            )
        };
        self.error(node, "init.reference", message);
        InitAction::None
    }

    fn atomic_action(&mut self, node: ConstructId, ty: &Type, form: InitForm, is_static: bool) -> InitAction {
        match form {
            InitForm::Default => {
                if ty.is_const() {
                    self.error(
                        node,
                        "init.constDefault",
                        format!("default initialization of an object of const type '{}'", ty),
                    );
                }
                if is_static {
                    InitAction::ZeroFill
                } else {
                    InitAction::None
                }
            }
            InitForm::Value => InitAction::ZeroFill,
            InitForm::Copy(arg) => InitAction::Atomic {
                arg: self.convert(arg, ty, "initialization"),
            },
            InitForm::Direct(args) | InitForm::List(args) if args.len() > 1 => {
                self.error(
                    node,
                    "init.scalar",
                    format!("excess elements in initializer for '{}'", ty),
                );
                InitAction::None
            }
            InitForm::Direct(args) => match args.first() {
                Some(arg) => InitAction::Atomic {
                    arg: self.convert(*arg, ty, "initialization"),
                },
                None => InitAction::ZeroFill,
            },
            InitForm::List(args) => match args.first() {
                Some(arg) => {
                    let is_literal = matches!(self.kind(*arg), Some(ConstructKind::NumericLiteral(_)));
                    if let Some(from) = self.ty(*arg) {
                        if !is_literal && from.is_narrowing_to(ty) {
                            self.error(
                                node,
                                "init.narrowing",
                                format!("narrowing conversion from '{}' to '{}' in list initialization", from, ty),
                            );
                        }
                    }
                    InitAction::Atomic {
                        arg: self.convert(*arg, ty, "initialization"),
                    }
                }
                None => InitAction::ZeroFill,
            },
        }
    }

    fn array_action(
        &mut self,
        node: ConstructId,
        ty: &Type,
        form: InitForm,
        location: SourceLocation,
        is_static: bool,
    ) -> InitAction {
        let (Some(elem), Some(length)) = (ty.element().cloned(), ty.array_length()) else {
            self.error(
                node,
                "init.arrayBound",
                "definition of an array needs an explicit size or an initializer",
            );
            return InitAction::None;
        };

        let single = match &form {
            InitForm::Copy(arg) => Some(*arg),
            InitForm::List(args) if args.len() == 1 => args.first().copied(),
            _ => None,
        };
        if let Some(arg) = single {
            if let Some(ConstructKind::StringLiteral(text)) = self.kind(arg).cloned() {
                if elem.atomic_kind() == Some(AtomicKind::Char) {
                    if text.len() as u64 + 1 > length {
                        self.error(
                            node,
                            "init.stringLength",
                            format!("initializer-string for '{}' is too long", ty),
                        );
                        return InitAction::None;
                    }
                    return InitAction::StringArray { text };
                }
            }
        }

        match form {
            InitForm::Default | InitForm::Value => {
                let value_init = matches!(form, InitForm::Value);
                if elem.is_class() || elem.is_array() {
                    let elements = (0..length as usize)
                        .map(|i| {
                            let sub_form = if value_init { InitForm::Value } else { InitForm::Default };
                            self.initialize(InitTarget::Subobject(i), &elem, sub_form, location, is_static)
                        })
                        .collect();
                    InitAction::Aggregate {
                        elements,
                        zero_rest: false,
                    }
                } else if is_static || value_init {
                    InitAction::ZeroFill
                } else {
                    InitAction::None
                }
            }
            InitForm::List(args) => {
                if args.len() as u64 > length {
                    self.error(
                        node,
                        "init.arrayExcess",
                        format!("excess elements in array initializer for '{}'", ty),
                    );
                    return InitAction::None;
                }
                let mut elements: Vec<ConstructId> = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| self.initialize(InitTarget::Subobject(i), &elem, InitForm::Copy(*arg), location, is_static))
                    .collect();
                let zero_rest = if elem.is_class() {
                    for i in args.len()..length as usize {
                        let rest = self.initialize(InitTarget::Subobject(i), &elem, InitForm::Value, location, is_static);
                        elements.push(rest);
                    }
                    false
                } else {
                    (args.len() as u64) < length
                };
                InitAction::Aggregate { elements, zero_rest }
            }
            InitForm::Copy(_) | InitForm::Direct(_) => {
                self.error(
                    node,
                    "init.arrayForm",
                    "an array must be initialized with a brace-enclosed initializer",
                );
                InitAction::None
            }
        }
    }

    fn class_action(
        &mut self,
        node: ConstructId,
        ty: &Type,
        class: ClassId,
        form: InitForm,
        location: SourceLocation,
    ) -> InitAction {
        if !ty.is_complete_object_type(&self.program.classes) {
            self.error(node, "init.incomplete", format!("variable has incomplete type '{}'", ty));
            return InitAction::None;
        }

        let ctors = self.constructors(class);
        let has_user_ctor = ctors
            .iter()
            .any(|c| self.program.entities.function(*c).is_some_and(|f| !f.is_implicit));

        if let InitForm::List(args) = &form {
            if !has_user_ctor {
                return self.aggregate_class_action(node, class, args, location);
            }
        }

        let args = form.args();
        let infos: Vec<ArgumentInfo> = args.iter().filter_map(|a| self.argument_info(*a)).collect();
        let resolution = resolve_overload(&ctors, &infos, None, &self.program.entities, &self.program.classes);
        let Some(ctor) = resolution.selected.filter(|_| resolution.viable) else {
            let message = format!("no matching constructor for initialization of '{}'", ty);
            self.report_rejections(node, message, &resolution.rejections);
            return InitAction::None;
        };

        let Some(info) = self.program.entities.function(ctor).cloned() else {
            return InitAction::None;
        };
        if info.is_implicit {
            return match args.first() {
                Some(arg) => InitAction::ClassCopy { arg: *arg },
                None => self.memberwise_default(class, matches!(form, InitForm::Value), location),
            };
        }

        let params = info.signature.param_types.clone();
        let args = args
            .iter()
            .zip(&params)
            .enumerate()
            .map(|(i, (arg, param))| self.initialize(InitTarget::Parameter(i), param, InitForm::Copy(*arg), location, false))
            .collect();
        self.mark_used(ctor, location);
        InitAction::Constructor { ctor, args }
    }

    /// Implicit default constructor: base, then members, each default- or
    /// value-initialized
    fn memberwise_default(&mut self, class: ClassId, value_init: bool, location: SourceLocation) -> InitAction {
        let Some(info) = self.program.classes.get(class).cloned() else {
            return InitAction::None;
        };
        let form = || if value_init { InitForm::Value } else { InitForm::Default };

        let base = info.base.map(|base| {
            let base_type = self.program.classes.class_type(base);
            self.initialize(InitTarget::BaseSubobject, &base_type, form(), location, false)
        });
        let members = info
            .members
            .iter()
            .enumerate()
            .map(|(i, member)| self.initialize(InitTarget::Subobject(i), &member.ty, form(), location, false))
            .collect();
        InitAction::ClassMembers { base, members }
    }

    fn aggregate_class_action(
        &mut self,
        node: ConstructId,
        class: ClassId,
        args: &[ConstructId],
        location: SourceLocation,
    ) -> InitAction {
        let Some(info) = self.program.classes.get(class).cloned() else {
            return InitAction::None;
        };
        if info.base.is_some() {
            self.error(
                node,
                "init.aggregateBase",
                format!("cannot list-initialize '{}': classes with a base class need a constructor", info.name),
            );
            return InitAction::None;
        }
        if args.len() > info.members.len() {
            self.error(
                node,
                "init.aggregateExcess",
                format!("excess elements in initializer for '{}'", info.name),
            );
            return InitAction::None;
        }

        let members = info
            .members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                let form = args.get(i).map_or(InitForm::Value, |arg| InitForm::Copy(*arg));
                self.initialize(InitTarget::Subobject(i), &member.ty, form, location, false)
            })
            .collect();
        InitAction::ClassMembers { base: None, members }
    }

    /// Constructors declared in a class scope, including the implicit ones
    pub(crate) fn constructors(&self, class: ClassId) -> Vec<EntityId> {
        self.program
            .scopes
            .class_scope(class)
            .and_then(|scope| {
                self.program
                    .scopes
                    .lookup_local(scope, CONSTRUCTOR_KEY)
                    .functions(&self.program.entities)
            })
            .unwrap_or_default()
    }

    pub(crate) fn argument_info(&self, arg: ConstructId) -> Option<ArgumentInfo> {
        Some(ArgumentInfo {
            ty: self.ty(arg)?,
            category: self.category(arg)?,
            is_null_constant: self.is_null_constant(arg),
        })
    }

    /// Error for a failed overload resolution, one note per rejected candidate
    pub(crate) fn report_rejections(&mut self, node: ConstructId, message: String, rejections: &[(EntityId, String)]) {
        self.error(node, "call.noMatch", message);
        for (candidate, reason) in rejections {
            let signature = self
                .program
                .entities
                .function(*candidate)
                .map(|f| Type::Function(Box::new(f.signature.clone())).to_string())
                .unwrap_or_default();
            let name = self.program.entities.name(*candidate).to_string();
            self.error(
                node,
                "call.candidate",
                format!("candidate '{}' {} is not viable: {}", name, signature, reason),
            );
        }
    }
}
