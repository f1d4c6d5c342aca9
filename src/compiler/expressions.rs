//! Expressions
//!
//! Every expression construct gets a type and value category, or error
//! notes. Operands are converted explicitly: each conversion the language
//! applies implicitly becomes an `ImplicitConversion` node, so the runtime
//! never has to guess what an operator receives.
//!
//! Operators on class operands are looked up as `operatorX` member
//! functions first and free functions second. `ostream`/`istream` lvalues
//! with a non-class right operand use the built-in stream operators.

use super::initializers::InitForm;
use super::overloads::resolve_overload;
use super::{
    ArgumentInfo, Compiler, ConstructId, ConstructKind, InitTarget, Literal, ValueCategory,
};
use crate::entities::{EntityId, EntityKind, LookupResult, StorageKind};
use crate::parser::ast::{AstNode, BinOp, InitSyntax, SourceLocation, TypeName, UnOp};
use crate::types::{integral_promotion, usual_arithmetic_conversion, ClassId, Type};

/// Which built-in stream an expression denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Output,
    Input,
}

impl Compiler<'_> {
    pub(crate) fn compile_expression(&mut self, node: &AstNode) -> ConstructId {
        let location = node.location();
        match node {
            AstNode::IntLiteral(value, _) => self.literal(Literal::Int(*value), Type::int(), location),
            AstNode::FloatLiteral(value, _) => self.literal(Literal::Float(*value), Type::double(), location),
            AstNode::CharLiteral(value, _) => self.literal(Literal::Int(i64::from(*value)), Type::char(), location),
            AstNode::BoolLiteral(value, _) => self.literal(Literal::Int(i64::from(*value)), Type::bool(), location),
            AstNode::StringLiteral(text, _) => {
                let id = self.add(ConstructKind::StringLiteral(text.clone()), location);
                let ty = Type::array_of(Type::char().const_qualified(), text.len() as u64 + 1);
                self.finish(id, ty, ValueCategory::LValue)
            }
            AstNode::NullPtr { .. } => {
                let id = self.add(ConstructKind::NullptrLiteral, location);
                self.finish(id, Type::pointer_to(Type::void()), ValueCategory::PRValue)
            }
            AstNode::This { .. } => self.compile_this(location),
            AstNode::Identifier(name, _) => self.compile_identifier(name, location),
            AstNode::BinaryOp { op, left, right, .. } => {
                let left = self.compile_expression(left);
                let right = self.compile_expression(right);
                self.compile_binary(*op, left, right, location)
            }
            AstNode::Assignment { lhs, rhs, .. } => self.compile_assignment(lhs, rhs, location),
            AstNode::CompoundAssignment { lhs, op, rhs, .. } => {
                let lhs = self.compile_expression(lhs);
                let rhs = self.compile_expression(rhs);
                self.compile_compound_assignment(*op, lhs, rhs, location)
            }
            AstNode::UnaryOp { op, operand, .. } => {
                let operand = self.compile_expression(operand);
                self.compile_unary(*op, operand, location)
            }
            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                ..
            } => self.compile_ternary(condition, true_expr, false_expr, location),
            AstNode::Comma { left, right, .. } => {
                let left = self.compile_expression(left);
                let right = self.compile_expression(right);
                if !self.well_typed(left) || !self.well_typed(right) {
                    return self.poisoned(location, &[left, right]);
                }
                let id = self.add(ConstructKind::Comma { left, right }, location);
                self.attach(id, &[left, right]);
                let (ty, category) = (self.ty(right), self.category(right));
                match (ty, category) {
                    (Some(ty), Some(category)) => self.finish(id, ty, category),
                    _ => id,
                }
            }
            AstNode::FunctionCall { callee, args, .. } => self.compile_call(callee, args, location),
            AstNode::ArrayAccess { array, index, .. } => {
                let array = self.compile_expression(array);
                let index = self.compile_expression(index);
                self.compile_subscript(array, index, location)
            }
            AstNode::MemberAccess { object, member, .. } => {
                let object = self.compile_expression(object);
                self.member_access(object, member, location)
            }
            AstNode::PointerMemberAccess { object, member, .. } => {
                let pointer = self.compile_expression(object);
                let object = self.dereference(pointer, location);
                self.member_access(object, member, location)
            }
            AstNode::New {
                target_type,
                init,
                array_length,
                ..
            } => self.compile_new(target_type, init.as_ref(), array_length.as_deref(), location),
            AstNode::Delete { operand, is_array, .. } => {
                let operand = self.compile_expression(operand);
                self.compile_delete(operand, *is_array, location)
            }
            _ => self.invalid(location, "expr.expected", "expected an expression"),
        }
    }

    fn finish(&mut self, id: ConstructId, ty: Type, category: ValueCategory) -> ConstructId {
        self.set_type(id, ty, category);
        id
    }

    fn literal(&mut self, value: Literal, ty: Type, location: SourceLocation) -> ConstructId {
        let id = self.add(ConstructKind::NumericLiteral(value), location);
        self.finish(id, ty, ValueCategory::PRValue)
    }

    fn type_name(&self, id: ConstructId) -> String {
        self.ty(id).map(|t| t.to_string()).unwrap_or_default()
    }

    // ===== Names =====

    fn compile_this(&mut self, location: SourceLocation) -> ConstructId {
        let context = self.function.as_ref().and_then(|ctx| ctx.class.map(|class| (class, ctx.is_const)));
        let Some((class, is_const)) = context else {
            return self.invalid(location, "expr.this", "invalid use of 'this' outside of a member function");
        };
        let mut class_type = self.program.classes.class_type(class);
        if is_const {
            class_type = class_type.const_qualified();
        }
        let id = self.add(ConstructKind::This, location);
        self.finish(id, Type::pointer_to(class_type), ValueCategory::PRValue)
    }

    /// `*this`, for members named without an object
    fn implicit_object(&mut self, location: SourceLocation) -> ConstructId {
        let this = self.compile_this(location);
        self.dereference(this, location)
    }

    fn compile_identifier(&mut self, name: &str, location: SourceLocation) -> ConstructId {
        let entity = match self.lookup(name) {
            LookupResult::Entity(id) => id,
            LookupResult::Overloads(_) => {
                return self.invalid(location, "expr.functionValue", format!("reference to overloaded function '{}' must be called", name));
            }
            LookupResult::NotFound => {
                return self.invalid(location, "expr.undeclared", format!("use of undeclared identifier '{}'", name));
            }
            LookupResult::Ambiguous(_) => {
                return self.invalid(location, "expr.ambiguous", format!("reference to '{}' is ambiguous", name));
            }
        };

        match self.entity(entity).map(|e| e.kind.clone()) {
            Some(EntityKind::Object {
                storage: StorageKind::Member { .. },
                ..
            }) => {
                let object = self.implicit_object(location);
                self.member_access(object, name, location)
            }
            Some(EntityKind::Object { ty, .. }) | Some(EntityKind::Reference { ty, .. }) => {
                let id = self.add(ConstructKind::Identifier(entity), location);
                self.finish(id, ty, ValueCategory::LValue)
            }
            Some(EntityKind::Function(_)) => {
                self.invalid(location, "expr.functionValue", format!("reference to function '{}' must be called", name))
            }
            Some(EntityKind::Class(_)) | None => {
                self.invalid(location, "expr.typeName", format!("'{}' does not refer to a value", name))
            }
        }
    }

    // ===== Operators =====

    fn stream_of(&self, id: ConstructId) -> Option<Stream> {
        if self.category(id) != Some(ValueCategory::LValue) {
            return None;
        }
        match self.ty(id)? {
            Type::Class { name, .. } if name == "ostream" => Some(Stream::Output),
            Type::Class { name, .. } if name == "istream" => Some(Stream::Input),
            _ => None,
        }
    }

    fn is_class_operand(&self, id: ConstructId) -> bool {
        self.ty(id).is_some_and(|t| t.is_class())
    }

    fn invalid_operands(&mut self, op: &str, operands: &[ConstructId], location: SourceLocation) -> ConstructId {
        let names: Vec<String> = operands.iter().map(|o| format!("'{}'", self.type_name(*o))).collect();
        let id = self.add(ConstructKind::Invalid, location);
        self.attach(id, operands);
        self.error(
            id,
            "expr.operands",
            format!("invalid operands to operator '{}' ({})", op, names.join(" and ")),
        );
        id
    }

    fn compile_binary(&mut self, op: BinOp, left: ConstructId, right: ConstructId, location: SourceLocation) -> ConstructId {
        if !self.well_typed(left) || !self.well_typed(right) {
            return self.poisoned(location, &[left, right]);
        }

        if let Some(stream) = self.stream_of(left) {
            if !self.is_class_operand(right) {
                match (stream, op) {
                    (Stream::Output, BinOp::Shl) => return self.output_operator(left, right, location),
                    (Stream::Input, BinOp::Shr) => return self.input_operator(left, right, location),
                    _ => {}
                }
            }
        }
        if self.is_class_operand(left) || self.is_class_operand(right) {
            return self
                .overloaded_operator(op.symbol(), &[left, right], location)
                .unwrap_or_else(|| self.invalid_operands(op.symbol(), &[left, right], location));
        }

        let left = self.to_prvalue(left);
        let right = self.to_prvalue(right);
        let (Some(left_type), Some(right_type)) = (self.ty(left), self.ty(right)) else {
            return self.poisoned(location, &[left, right]);
        };

        match op {
            BinOp::And | BinOp::Or => {
                let left = self.convert(left, &Type::bool(), "a logical operand");
                let right = self.convert(right, &Type::bool(), "a logical operand");
                let id = self.add(ConstructKind::Logical { op, left, right }, location);
                self.attach(id, &[left, right]);
                self.finish(id, Type::bool(), ValueCategory::PRValue)
            }
            _ if op.is_relational() && (left_type.is_pointer() || right_type.is_pointer()) => {
                self.pointer_comparison(op, left, right, location)
            }
            BinOp::Add | BinOp::Sub if left_type.is_pointer() || right_type.is_pointer() => {
                self.pointer_arithmetic(op, left, right, location)
            }
            _ => self.arithmetic(op, left, right, location),
        }
    }

    fn pointer_comparison(&mut self, op: BinOp, left: ConstructId, right: ConstructId, location: SourceLocation) -> ConstructId {
        let (Some(left_type), Some(right_type)) = (self.ty(left), self.ty(right)) else {
            return self.poisoned(location, &[left, right]);
        };
        let (left, right) = if left_type.is_pointer() && !right_type.is_pointer() && self.is_null_constant(right) {
            (left, self.convert(right, &left_type, "a comparison"))
        } else if right_type.is_pointer() && !left_type.is_pointer() && self.is_null_constant(left) {
            (self.convert(left, &right_type, "a comparison"), right)
        } else {
            (left, right)
        };

        let comparable = match (self.ty(left), self.ty(right)) {
            (Some(l), Some(r)) => match (l.pointee(), r.pointee()) {
                (Some(lp), Some(rp)) => {
                    lp.cv_unqualified().similar_type(&rp.cv_unqualified())
                        || lp.is_void()
                        || rp.is_void()
                        || lp.sub_type(rp, &self.program.classes)
                        || rp.sub_type(lp, &self.program.classes)
                }
                _ => false,
            },
            _ => false,
        };
        if !comparable {
            return self.invalid_operands(op.symbol(), &[left, right], location);
        }
        let id = self.add(ConstructKind::PointerComparison { op, left, right }, location);
        self.attach(id, &[left, right]);
        self.finish(id, Type::bool(), ValueCategory::PRValue)
    }

    fn pointer_arithmetic(&mut self, op: BinOp, left: ConstructId, right: ConstructId, location: SourceLocation) -> ConstructId {
        let (Some(left_type), Some(right_type)) = (self.ty(left), self.ty(right)) else {
            return self.poisoned(location, &[left, right]);
        };

        if left_type.is_pointer() && right_type.is_pointer() {
            let same = match (left_type.pointee(), right_type.pointee()) {
                (Some(l), Some(r)) => l.cv_unqualified().similar_type(&r.cv_unqualified()),
                _ => false,
            };
            if op != BinOp::Sub || !same {
                return self.invalid_operands(op.symbol(), &[left, right], location);
            }
            let id = self.add(ConstructKind::PointerDifference { left, right }, location);
            self.attach(id, &[left, right]);
            return self.finish(id, Type::int(), ValueCategory::PRValue);
        }

        let (pointer, offset, pointer_type, offset_type) = if left_type.is_pointer() {
            (left, right, left_type, right_type)
        } else if op == BinOp::Add {
            (right, left, right_type, left_type)
        } else {
            return self.invalid_operands(op.symbol(), &[left, right], location);
        };
        let complete = pointer_type
            .pointee()
            .is_some_and(|p| p.is_complete_object_type(&self.program.classes));
        if !offset_type.is_integral() || !complete {
            return self.invalid_operands(op.symbol(), &[left, right], location);
        }
        let offset = self.convert(offset, &Type::int(), "a pointer offset");
        let id = self.add(ConstructKind::PointerOffset { op, pointer, offset }, location);
        self.attach(id, &[pointer, offset]);
        self.finish(id, pointer_type, ValueCategory::PRValue)
    }

    fn arithmetic(&mut self, op: BinOp, left: ConstructId, right: ConstructId, location: SourceLocation) -> ConstructId {
        let kinds = (
            self.ty(left).and_then(|t| t.atomic_kind()),
            self.ty(right).and_then(|t| t.atomic_kind()),
        );
        let (Some(left_kind), Some(right_kind)) = kinds else {
            return self.invalid_operands(op.symbol(), &[left, right], location);
        };

        let integral_only = matches!(
            op,
            BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
        );
        if integral_only && !(left_kind.is_integral() && right_kind.is_integral()) {
            return self.invalid_operands(op.symbol(), &[left, right], location);
        }

        let (left_target, right_target) = if matches!(op, BinOp::Shl | BinOp::Shr) {
            (integral_promotion(left_kind), integral_promotion(right_kind))
        } else {
            let common = usual_arithmetic_conversion(left_kind, right_kind);
            (common, common)
        };
        let left = self.convert(left, &Type::atomic(left_target), "an arithmetic operand");
        let right = self.convert(right, &Type::atomic(right_target), "an arithmetic operand");

        if op.is_relational() {
            let id = self.add(ConstructKind::Relational { op, left, right }, location);
            self.attach(id, &[left, right]);
            return self.finish(id, Type::bool(), ValueCategory::PRValue);
        }

        let id = self.add(ConstructKind::Arithmetic { op, left, right }, location);
        self.attach(id, &[left, right]);
        if op == BinOp::Div && matches!(self.kind(right), Some(ConstructKind::NumericLiteral(Literal::Int(0)))) {
            self.warning(id, "expr.divisionByZero", "division by zero");
        }
        self.finish(id, Type::atomic(left_target), ValueCategory::PRValue)
    }

    fn output_operator(&mut self, stream: ConstructId, operand: ConstructId, location: SourceLocation) -> ConstructId {
        let operand = self.to_prvalue(operand);
        if !self.ty(operand).is_some_and(|t| t.is_atomic()) {
            return self.invalid_operands("<<", &[stream, operand], location);
        }
        let id = self.add(ConstructKind::OutputOperator { stream, operand }, location);
        self.attach(id, &[stream, operand]);
        let ty = self.ty(stream).unwrap_or_else(Type::void);
        self.finish(id, ty, ValueCategory::LValue)
    }

    fn input_operator(&mut self, stream: ConstructId, operand: ConstructId, location: SourceLocation) -> ConstructId {
        if !self.ty(operand).is_some_and(|t| t.is_arithmetic()) {
            return self.invalid_operands(">>", &[stream, operand], location);
        }
        let id = self.add(ConstructKind::InputOperator { stream, operand }, location);
        self.attach(id, &[stream, operand]);
        self.require_modifiable(id, operand);
        let ty = self.ty(stream).unwrap_or_else(Type::void);
        self.finish(id, ty, ValueCategory::LValue)
    }

    /// Error on `node` unless `target` is a modifiable lvalue
    fn require_modifiable(&mut self, node: ConstructId, target: ConstructId) -> bool {
        let Some(ty) = self.ty(target) else {
            return false;
        };
        let message = if self.category(target) != Some(ValueCategory::LValue) {
            "expression is not assignable".to_string()
        } else if ty.is_array() {
            format!("array type '{}' is not assignable", ty)
        } else if ty.is_const() {
            match self.kind(target) {
                Some(ConstructKind::Identifier(entity)) => format!(
                    "cannot assign to variable '{}' with const-qualified type '{}'",
                    self.program.entities.name(*entity),
                    ty
                ),
                _ => format!("cannot assign to an object of const-qualified type '{}'", ty),
            }
        } else {
            return true;
        };
        self.error(node, "expr.notAssignable", message);
        false
    }

    /// Member `operatorX` of the first operand's class, then free `operatorX`
    fn overloaded_operator(&mut self, symbol: &str, operands: &[ConstructId], location: SourceLocation) -> Option<ConstructId> {
        let name = format!("operator{}", symbol);
        let infos: Vec<ArgumentInfo> = operands
            .iter()
            .map(|o| self.argument_info(*o))
            .collect::<Option<_>>()?;
        let (first, rest) = operands.split_first()?;

        if let Some(class) = infos.first().and_then(|i| i.ty.class_id()) {
            let members = self.member_functions(class, &name);
            let receiver = infos.first().map(|i| i.ty.clone());
            let resolution = resolve_overload(&members, &infos[1..], receiver.as_ref(), &self.program.entities, &self.program.classes);
            if resolution.viable {
                return Some(self.build_call(&name, &members, Some(*first), rest.to_vec(), location));
            }
        }

        let free = self.free_functions(&name);
        let resolution = resolve_overload(&free, &infos, None, &self.program.entities, &self.program.classes);
        resolution
            .viable
            .then(|| self.build_call(&name, &free, None, operands.to_vec(), location))
    }

    /// Member functions named `name` in `class` or its bases
    fn member_functions(&self, class: ClassId, name: &str) -> Vec<EntityId> {
        self.program
            .scopes
            .class_scope(class)
            .and_then(|scope| {
                self.program
                    .scopes
                    .lookup_in(scope, name, &self.program.classes)
                    .functions(&self.program.entities)
            })
            .unwrap_or_default()
    }

    /// Non-member functions named `name` visible at namespace scope
    fn free_functions(&self, name: &str) -> Vec<EntityId> {
        let Some(global) = self.program.units.get(self.unit).map(|u| u.global_scope) else {
            return Vec::new();
        };
        self.program
            .scopes
            .lookup(global, name, &self.program.classes)
            .functions(&self.program.entities)
            .unwrap_or_default()
            .into_iter()
            .filter(|f| self.program.entities.function(*f).is_some_and(|info| !info.is_member()))
            .collect()
    }

    fn compile_unary(&mut self, op: UnOp, operand: ConstructId, location: SourceLocation) -> ConstructId {
        if !self.well_typed(operand) {
            return self.poisoned(location, &[operand]);
        }
        if self.is_class_operand(operand) && op != UnOp::AddrOf {
            let mut operands = vec![operand];
            if matches!(op, UnOp::PostInc | UnOp::PostDec) {
                // Postfix operators take a dummy int to tell them apart
                operands.push(self.literal(Literal::Int(0), Type::int(), location));
            }
            return self
                .overloaded_operator(op.symbol(), &operands, location)
                .unwrap_or_else(|| self.invalid_operands(op.symbol(), &[operand], location));
        }

        match op {
            UnOp::Deref => self.dereference(operand, location),
            UnOp::AddrOf => self.address_of(operand, location),
            UnOp::Not => {
                let operand = self.convert(operand, &Type::bool(), "a logical operand");
                let id = self.add(ConstructKind::LogicalNot { operand }, location);
                self.attach(id, &[operand]);
                self.finish(id, Type::bool(), ValueCategory::PRValue)
            }
            UnOp::Neg | UnOp::Plus | UnOp::BitNot => {
                let operand = self.to_prvalue(operand);
                let kind = self.ty(operand).and_then(|t| t.atomic_kind());
                let valid = match (op, kind) {
                    (UnOp::BitNot, Some(kind)) => kind.is_integral(),
                    (_, Some(_)) => true,
                    (_, None) => false,
                };
                let Some(kind) = kind.filter(|_| valid) else {
                    return self.invalid_operands(op.symbol(), &[operand], location);
                };
                let promoted = Type::atomic(integral_promotion(kind));
                let operand = self.convert(operand, &promoted, "an arithmetic operand");
                let id = self.add(ConstructKind::UnaryArithmetic { op, operand }, location);
                self.attach(id, &[operand]);
                self.finish(id, promoted, ValueCategory::PRValue)
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => self.inc_dec(op, operand, location),
        }
    }

    fn inc_dec(&mut self, op: UnOp, operand: ConstructId, location: SourceLocation) -> ConstructId {
        let Some(ty) = self.ty(operand) else {
            return self.poisoned(location, &[operand]);
        };
        let steppable = if ty.is_pointer() {
            ty.pointee().is_some_and(|p| p.is_complete_object_type(&self.program.classes))
        } else {
            ty.is_arithmetic() && !ty.is_bool()
        };
        if !steppable {
            return self.invalid_operands(op.symbol(), &[operand], location);
        }
        let id = self.add(ConstructKind::IncDec { op, operand }, location);
        self.attach(id, &[operand]);
        self.require_modifiable(id, operand);
        match op {
            UnOp::PreInc | UnOp::PreDec => self.finish(id, ty, ValueCategory::LValue),
            _ => self.finish(id, ty.cv_unqualified(), ValueCategory::PRValue),
        }
    }

    pub(crate) fn dereference(&mut self, operand: ConstructId, location: SourceLocation) -> ConstructId {
        if !self.well_typed(operand) {
            return self.poisoned(location, &[operand]);
        }
        let operand = self.to_prvalue(operand);
        let pointee = self.ty(operand).and_then(|t| t.pointee().cloned());
        let Some(pointee) = pointee.filter(|p| p.is_object_type()) else {
            let id = self.add(ConstructKind::Invalid, location);
            self.attach(id, &[operand]);
            let name = self.type_name(operand);
            self.error(id, "expr.dereference", format!("indirection requires a pointer to an object, not '{}'", name));
            return id;
        };
        let id = self.add(ConstructKind::Dereference { operand }, location);
        self.attach(id, &[operand]);
        self.finish(id, pointee, ValueCategory::LValue)
    }

    fn address_of(&mut self, operand: ConstructId, location: SourceLocation) -> ConstructId {
        let Some(ty) = self.ty(operand) else {
            return self.poisoned(location, &[operand]);
        };
        let id = self.add(ConstructKind::AddressOf { operand }, location);
        self.attach(id, &[operand]);
        if self.category(operand) != Some(ValueCategory::LValue) {
            self.error(id, "expr.addressOf", "cannot take the address of an rvalue");
            return id;
        }
        self.finish(id, Type::pointer_to(ty), ValueCategory::PRValue)
    }

    // ===== Assignment =====

    fn compile_assignment(&mut self, lhs: &AstNode, rhs: &AstNode, location: SourceLocation) -> ConstructId {
        let self_assignment = matches!((lhs, rhs), (AstNode::Identifier(a, _), AstNode::Identifier(b, _)) if a == b);
        let lhs = self.compile_expression(lhs);
        let rhs = self.compile_expression(rhs);
        if !self.well_typed(lhs) || !self.well_typed(rhs) {
            return self.poisoned(location, &[lhs, rhs]);
        }

        let id = if self.is_class_operand(lhs) {
            let class = self.ty(lhs).and_then(|t| t.class_id());
            let has_user_operator = class.is_some_and(|c| !self.member_functions(c, "operator=").is_empty());
            if has_user_operator {
                return self
                    .overloaded_operator("=", &[lhs, rhs], location)
                    .unwrap_or_else(|| self.invalid_operands("=", &[lhs, rhs], location));
            }
            self.class_assignment(lhs, rhs, location)
        } else {
            let id = self.add(ConstructKind::Assignment { lhs, rhs }, location);
            if !self.require_modifiable(id, lhs) {
                self.attach(id, &[lhs, rhs]);
                return id;
            }
            let target = self.ty(lhs).map(|t| t.cv_unqualified()).unwrap_or_else(Type::void);
            let rhs = self.convert(rhs, &target, "assignment");
            self.attach(id, &[lhs, rhs]);
            self.program.constructs.set_kind(id, ConstructKind::Assignment { lhs, rhs });
            id
        };

        if self_assignment {
            self.warning(id, "expr.selfAssignment", "explicitly assigning a variable to itself");
        }
        if let (Some(ty), true) = (self.ty(lhs), !self.program.constructs.has_errors(id)) {
            self.set_type(id, ty, ValueCategory::LValue);
        }
        id
    }

    /// Implicit copy assignment: memberwise copy from the same or a derived class
    fn class_assignment(&mut self, lhs: ConstructId, rhs: ConstructId, location: SourceLocation) -> ConstructId {
        let id = self.add(ConstructKind::ClassAssignment { lhs, rhs }, location);
        self.attach(id, &[lhs, rhs]);
        let (Some(lhs_type), Some(rhs_type)) = (self.ty(lhs), self.ty(rhs)) else {
            return id;
        };
        if !(rhs_type.similar_type(&lhs_type) || rhs_type.sub_type(&lhs_type, &self.program.classes)) {
            self.error(
                id,
                "conversion.none",
                format!("cannot assign '{}' to an object of type '{}'", rhs_type, lhs_type),
            );
            return id;
        }
        self.require_modifiable(id, lhs);
        id
    }

    fn compile_compound_assignment(&mut self, op: BinOp, lhs: ConstructId, rhs: ConstructId, location: SourceLocation) -> ConstructId {
        if !self.well_typed(lhs) || !self.well_typed(rhs) {
            return self.poisoned(location, &[lhs, rhs]);
        }
        let symbol = format!("{}=", op.symbol());
        if self.is_class_operand(lhs) {
            return self
                .overloaded_operator(&symbol, &[lhs, rhs], location)
                .unwrap_or_else(|| self.invalid_operands(&symbol, &[lhs, rhs], location));
        }

        let Some(lhs_type) = self.ty(lhs) else {
            return self.poisoned(location, &[lhs, rhs]);
        };
        let rhs = self.to_prvalue(rhs);
        let rhs_kind = self.ty(rhs).and_then(|t| t.atomic_kind());

        let target = match (lhs_type.atomic_kind(), rhs_kind) {
            (None, Some(rk)) if lhs_type.is_pointer() && matches!(op, BinOp::Add | BinOp::Sub) && rk.is_integral() => {
                Some(Type::int())
            }
            (Some(lk), Some(rk)) => {
                let integral_only = matches!(
                    op,
                    BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
                );
                if integral_only && !(lk.is_integral() && rk.is_integral()) {
                    None
                } else if matches!(op, BinOp::Shl | BinOp::Shr) {
                    Some(Type::atomic(integral_promotion(rk)))
                } else {
                    Some(Type::atomic(usual_arithmetic_conversion(lk, rk)))
                }
            }
            _ => None,
        };
        let Some(target) = target else {
            return self.invalid_operands(&symbol, &[lhs, rhs], location);
        };

        let rhs = self.convert(rhs, &target, "compound assignment");
        let id = self.add(ConstructKind::CompoundAssignment { op, lhs, rhs }, location);
        self.attach(id, &[lhs, rhs]);
        if self.require_modifiable(id, lhs) {
            self.set_type(id, lhs_type, ValueCategory::LValue);
        }
        id
    }

    // ===== Conditional =====

    fn compile_ternary(&mut self, condition: &AstNode, then_expr: &AstNode, else_expr: &AstNode, location: SourceLocation) -> ConstructId {
        let condition = self.compile_expression(condition);
        let condition = self.convert(condition, &Type::bool(), "a condition");
        let then_expr = self.compile_expression(then_expr);
        let else_expr = self.compile_expression(else_expr);
        if ![condition, then_expr, else_expr].iter().all(|e| self.well_typed(*e)) {
            return self.poisoned(location, &[condition, then_expr, else_expr]);
        }

        let (Some(then_type), Some(else_type)) = (self.ty(then_expr), self.ty(else_expr)) else {
            return self.poisoned(location, &[condition, then_expr, else_expr]);
        };
        let both_lvalues = self.category(then_expr) == Some(ValueCategory::LValue)
            && self.category(else_expr) == Some(ValueCategory::LValue);

        let (then_expr, else_expr, ty, category) = if then_type.same_type(&else_type) && both_lvalues {
            (then_expr, else_expr, then_type, ValueCategory::LValue)
        } else if then_type.is_void() && else_type.is_void() {
            (then_expr, else_expr, Type::void(), ValueCategory::PRValue)
        } else if then_type.is_class() && then_type.similar_type(&else_type) {
            (then_expr, else_expr, then_type.cv_unqualified(), ValueCategory::PRValue)
        } else {
            let then_value = self.to_prvalue(then_expr);
            let else_value = self.to_prvalue(else_expr);
            match self.common_type(then_value, else_value) {
                Some(common) => {
                    let then_value = self.convert(then_value, &common, "a conditional expression");
                    let else_value = self.convert(else_value, &common, "a conditional expression");
                    (then_value, else_value, common, ValueCategory::PRValue)
                }
                None => {
                    let id = self.add(ConstructKind::Invalid, location);
                    self.attach(id, &[condition, then_value, else_value]);
                    self.error(
                        id,
                        "expr.ternary",
                        format!("incompatible operand types ('{}' and '{}')", then_type, else_type),
                    );
                    return id;
                }
            }
        };

        let id = self.add(
            ConstructKind::Ternary {
                condition,
                then_expr,
                else_expr,
            },
            location,
        );
        self.attach(id, &[condition, then_expr, else_expr]);
        self.finish(id, ty, category)
    }

    /// Common type of two prvalue operands of `?:`
    fn common_type(&self, left: ConstructId, right: ConstructId) -> Option<Type> {
        let (left_type, right_type) = (self.ty(left)?, self.ty(right)?);
        if let (Some(l), Some(r)) = (left_type.atomic_kind(), right_type.atomic_kind()) {
            return Some(Type::atomic(usual_arithmetic_conversion(l, r)));
        }
        if left_type.is_pointer() && right_type.is_pointer() {
            return left_type.similar_type(&right_type).then(|| left_type.cv_unqualified());
        }
        if left_type.is_pointer() && self.is_null_constant(right) {
            return Some(left_type);
        }
        if right_type.is_pointer() && self.is_null_constant(left) {
            return Some(right_type);
        }
        None
    }

    // ===== Postfix =====

    fn compile_subscript(&mut self, array: ConstructId, index: ConstructId, location: SourceLocation) -> ConstructId {
        if !self.well_typed(array) || !self.well_typed(index) {
            return self.poisoned(location, &[array, index]);
        }
        if self.is_class_operand(array) {
            return self
                .overloaded_operator("[]", &[array, index], location)
                .unwrap_or_else(|| self.invalid_operands("[]", &[array, index], location));
        }

        let mut pointer = self.to_prvalue(array);
        let mut index = self.to_prvalue(index);
        // `i[arr]` means the same as `arr[i]`
        if !self.ty(pointer).is_some_and(|t| t.is_pointer()) && self.ty(index).is_some_and(|t| t.is_pointer()) {
            std::mem::swap(&mut pointer, &mut index);
        }

        let pointee = self.ty(pointer).and_then(|t| t.pointee().cloned());
        let index_ok = self.ty(index).is_some_and(|t| t.is_integral());
        let Some(element) = pointee.filter(|p| p.is_complete_object_type(&self.program.classes) && index_ok) else {
            return self.invalid_operands("[]", &[pointer, index], location);
        };
        let index = self.convert(index, &Type::int(), "an array subscript");
        let id = self.add(ConstructKind::Subscript { pointer, index }, location);
        self.attach(id, &[pointer, index]);
        self.finish(id, element, ValueCategory::LValue)
    }

    pub(crate) fn member_access(&mut self, object: ConstructId, member: &str, location: SourceLocation) -> ConstructId {
        if !self.well_typed(object) {
            return self.poisoned(location, &[object]);
        }
        let Some(object_type) = self.ty(object) else {
            return self.poisoned(location, &[object]);
        };
        let Some(class) = object_type.class_id() else {
            let id = self.add(ConstructKind::Invalid, location);
            self.attach(id, &[object]);
            self.error(
                id,
                "expr.memberAccess",
                format!("member reference base type '{}' is not a class", object_type),
            );
            return id;
        };

        let Some((owner, index)) = self.program.classes.find_member(class, member) else {
            let id = self.add(ConstructKind::Invalid, location);
            self.attach(id, &[object]);
            let message = if self.member_functions(class, member).is_empty() {
                format!("no member named '{}' in '{}'", member, object_type.cv_unqualified())
            } else {
                format!("reference to member function '{}' must be called", member)
            };
            self.error(id, "expr.memberAccess", message);
            return id;
        };

        let mut base_hops = 0;
        let mut current = class;
        while current != owner {
            match self.program.classes.get(current).and_then(|c| c.base) {
                Some(base) => {
                    current = base;
                    base_hops += 1;
                }
                None => break,
            }
        }

        let member_type = self
            .program
            .classes
            .get(owner)
            .and_then(|c| c.members.get(index))
            .map(|m| m.ty.clone())
            .unwrap_or_else(Type::void);
        let ty = member_type.with_cv(member_type.cv().union(object_type.cv()));
        let category = match self.category(object) {
            Some(ValueCategory::LValue) => ValueCategory::LValue,
            _ => ValueCategory::XValue,
        };

        let id = self.add(
            ConstructKind::MemberAccess {
                object,
                base_hops,
                index,
            },
            location,
        );
        self.attach(id, &[object]);
        self.finish(id, ty, category)
    }

    // ===== Calls =====

    fn compile_call(&mut self, callee: &AstNode, args: &[AstNode], location: SourceLocation) -> ConstructId {
        match callee {
            AstNode::Identifier(name, _) => {
                let found = self.lookup(name);
                if let LookupResult::Entity(entity) = &found {
                    if let Some(EntityKind::Class(class)) = self.entity(*entity).map(|e| e.kind.clone()) {
                        return self.explicit_temporary(class, args, location);
                    }
                }
                let Some(candidates) = found.functions(&self.program.entities) else {
                    let args: Vec<ConstructId> = args.iter().map(|a| self.compile_expression(a)).collect();
                    let id = self.add(ConstructKind::Invalid, location);
                    self.attach(id, &args);
                    let message = match found {
                        LookupResult::NotFound => format!("use of undeclared identifier '{}'", name),
                        LookupResult::Ambiguous(_) => format!("reference to '{}' is ambiguous", name),
                        _ => format!("called object '{}' is not a function", name),
                    };
                    self.error(id, "call.notFunction", message);
                    return id;
                };

                let is_member = candidates
                    .first()
                    .and_then(|c| self.program.entities.function(*c))
                    .is_some_and(|f| f.is_member());
                let receiver = is_member.then(|| self.implicit_object(location));
                let args: Vec<ConstructId> = args.iter().map(|a| self.compile_expression(a)).collect();
                self.build_call(name, &candidates, receiver, args, location)
            }
            AstNode::MemberAccess { object, member, .. } | AstNode::PointerMemberAccess { object, member, .. } => {
                let object = self.compile_expression(object);
                let object = match callee {
                    AstNode::PointerMemberAccess { .. } => self.dereference(object, location),
                    _ => object,
                };
                let args: Vec<ConstructId> = args.iter().map(|a| self.compile_expression(a)).collect();
                if !self.well_typed(object) {
                    let children: Vec<ConstructId> = std::iter::once(object).chain(args).collect();
                    return self.poisoned(location, &children);
                }
                let candidates = match self.ty(object).and_then(|t| t.class_id()) {
                    Some(class) => self.member_functions(class, member),
                    None => Vec::new(),
                };
                if candidates.is_empty() {
                    let id = self.add(ConstructKind::Invalid, location);
                    let children: Vec<ConstructId> = std::iter::once(object).chain(args).collect();
                    self.attach(id, &children);
                    let type_name = self.type_name(object);
                    self.error(
                        id,
                        "call.notFunction",
                        format!("no member function named '{}' in '{}'", member, type_name),
                    );
                    return id;
                }
                self.build_call(member, &candidates, Some(object), args, location)
            }
            other => {
                let callee = self.compile_expression(other);
                let args: Vec<ConstructId> = args.iter().map(|a| self.compile_expression(a)).collect();
                let children: Vec<ConstructId> = std::iter::once(callee).chain(args).collect();
                if !self.well_typed(callee) {
                    return self.poisoned(location, &children);
                }
                let id = self.add(ConstructKind::Invalid, location);
                self.attach(id, &children);
                let type_name = self.type_name(callee);
                self.error(id, "call.notFunction", format!("called object type '{}' is not a function", type_name));
                id
            }
        }
    }

    /// `Point(1, 2)`: a class prvalue initialized by a constructor
    fn explicit_temporary(&mut self, class: ClassId, args: &[AstNode], location: SourceLocation) -> ConstructId {
        let class_type = self.program.classes.class_type(class);
        let form = if args.is_empty() {
            InitForm::Value
        } else {
            InitForm::Direct(args.iter().map(|a| self.compile_expression(a)).collect())
        };
        let init = self.initialize(InitTarget::Temporary, &class_type, form, location, false);
        let id = self.add(ConstructKind::Temporary { init }, location);
        self.attach(id, &[init]);
        if self.program.constructs.has_errors(init) {
            return id;
        }
        self.finish(id, class_type, ValueCategory::PRValue)
    }

    /// Resolve and build a call to one of `candidates`
    pub(crate) fn build_call(
        &mut self,
        name: &str,
        candidates: &[EntityId],
        receiver: Option<ConstructId>,
        args: Vec<ConstructId>,
        location: SourceLocation,
    ) -> ConstructId {
        let children: Vec<ConstructId> = receiver.iter().copied().chain(args.iter().copied()).collect();
        if children.iter().any(|c| !self.well_typed(*c)) {
            return self.poisoned(location, &children);
        }
        let infos: Option<Vec<ArgumentInfo>> = args.iter().map(|a| self.argument_info(*a)).collect();
        let Some(infos) = infos else {
            return self.poisoned(location, &children);
        };
        let receiver_type = receiver.and_then(|r| self.ty(r));

        let resolution = resolve_overload(
            candidates,
            &infos,
            receiver_type.as_ref(),
            &self.program.entities,
            &self.program.classes,
        );
        let selected = resolution.selected.filter(|_| resolution.viable);
        let Some((function, info)) = selected.and_then(|f| self.program.entities.function(f).cloned().map(|i| (f, i))) else {
            let id = self.add(ConstructKind::Invalid, location);
            self.attach(id, &children);
            self.report_rejections(id, format!("no matching function for call to '{}'", name), &resolution.rejections);
            return id;
        };

        if info.is_member() && receiver.is_none() {
            return self.invalid(
                location,
                "call.noObject",
                format!("call to member function '{}' without an object", name),
            );
        }

        let return_type = info.signature.return_type.clone();
        let (result_type, category) = match return_type.referred() {
            Some(referred) => (referred.clone(), ValueCategory::LValue),
            None => (return_type.clone(), ValueCategory::PRValue),
        };

        if let Some(intrinsic) = info.intrinsic {
            let args: Vec<ConstructId> = args
                .into_iter()
                .zip(&info.signature.param_types)
                .map(|(arg, param)| self.convert(arg, param, "argument"))
                .collect();
            let id = self.add(
                ConstructKind::IntrinsicCall {
                    function,
                    intrinsic,
                    args: args.clone(),
                },
                location,
            );
            self.attach(id, &args);
            return self.finish(id, result_type, category);
        }

        let params: Vec<ConstructId> = args
            .into_iter()
            .zip(info.signature.param_types.iter())
            .enumerate()
            .map(|(index, (arg, param))| {
                let location = self.program.constructs.location(arg);
                self.initialize(InitTarget::Parameter(index), param, InitForm::Copy(arg), location, false)
            })
            .collect();
        let id = self.add(
            ConstructKind::FunctionCall {
                function,
                receiver,
                args: params.clone(),
            },
            location,
        );
        let call_children: Vec<ConstructId> = receiver.into_iter().chain(params).collect();
        self.attach(id, &call_children);
        self.mark_used(function, location);
        if self.program.constructs.has_errors(id) {
            return id;
        }
        self.finish(id, result_type, category)
    }

    // ===== Dynamic memory =====

    fn compile_new(
        &mut self,
        target_type: &TypeName,
        init: Option<&InitSyntax>,
        array_length: Option<&AstNode>,
        location: SourceLocation,
    ) -> ConstructId {
        let allocated = match self.resolve_type(target_type) {
            Ok(ty) => ty,
            Err(message) => return self.invalid(location, "new.type", message),
        };
        if allocated.is_reference() || allocated.is_void() || !allocated.is_complete_object_type(&self.program.classes) {
            return self.invalid(location, "new.type", format!("cannot allocate an object of type '{}'", allocated));
        }

        let length = array_length.map(|len| {
            let len = self.compile_expression(len);
            let is_integral = self.ty(len).is_some_and(|t| t.is_integral());
            if self.well_typed(len) && !is_integral {
                let name = self.type_name(len);
                self.error(len, "new.length", format!("array size expression must have integral type, not '{}'", name));
                return len;
            }
            self.convert(len, &Type::int(), "an array size")
        });

        let form = match (init, length.is_some()) {
            (Some(InitSyntax::List(_)), true) | (Some(InitSyntax::Copy(_)), _) => {
                return self.invalid(location, "new.init", "unsupported initializer for a new-expression");
            }
            (Some(InitSyntax::Direct(_)), true) => {
                return self.invalid(location, "new.init", "array new cannot have initialization arguments");
            }
            _ => self.compile_init_syntax(init),
        };
        let init = self.initialize(InitTarget::NewObject, &allocated, form, location, false);

        let id = self.add(
            ConstructKind::New {
                allocated: allocated.clone(),
                init: Some(init),
                length,
            },
            location,
        );
        let children: Vec<ConstructId> = length.into_iter().chain(std::iter::once(init)).collect();
        self.attach(id, &children);
        self.finish(id, Type::pointer_to(allocated), ValueCategory::PRValue)
    }

    fn compile_delete(&mut self, operand: ConstructId, is_array: bool, location: SourceLocation) -> ConstructId {
        if !self.well_typed(operand) {
            return self.poisoned(location, &[operand]);
        }
        let operand = self.to_prvalue(operand);
        let id = self.add(ConstructKind::Delete { operand, is_array }, location);
        self.attach(id, &[operand]);
        let deletable = self
            .ty(operand)
            .and_then(|t| t.pointee().cloned())
            .is_some_and(|p| p.is_complete_object_type(&self.program.classes));
        if !deletable {
            let name = self.type_name(operand);
            self.error(id, "delete.type", format!("cannot delete expression of type '{}'", name));
            return id;
        }
        self.finish(id, Type::void(), ValueCategory::PRValue)
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{ConstructKind, Program};

    fn errors(source: &str) -> Vec<String> {
        Program::compile_source(source).errors().map(|n| n.message.clone()).collect()
    }

    fn warning_ids(source: &str) -> Vec<&'static str> {
        Program::compile_source(source)
            .notes()
            .filter(|n| !n.is_error())
            .map(|n| n.id)
            .collect()
    }

    #[test]
    fn test_arithmetic_and_pointers_compile() {
        let source = r#"
            int main() {
                int a[3] = {1, 2, 3};
                int* p = a;
                int* q = p + 2;
                int d = q - p;
                bool same = p == a;
                double x = d * 1.5;
                char c = 'a';
                c++;
                cout << x << " " << c << endl;
            }
        "#;
        assert_eq!(errors(source), Vec::<String>::new());
    }

    #[test]
    fn test_assignment_to_const() {
        let messages = errors("int main() { const int x = 1; x = 2; }");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("const-qualified"));
    }

    #[test]
    fn test_undeclared_identifier() {
        let messages = errors("int main() { return y; }");
        assert_eq!(messages, vec!["use of undeclared identifier 'y'".to_string()]);
    }

    #[test]
    fn test_integer_division_warning() {
        let ids = warning_ids("int main() { int a = 7; double d = a / 2; }");
        assert!(ids.contains(&"conversion.integerDivision"));
    }

    #[test]
    fn test_no_matching_function_lists_candidates() {
        let program = Program::compile_source("void f(int a, int b) { } int main() { f(1); }");
        let ids: Vec<&str> = program.errors().map(|n| n.id).collect();
        assert_eq!(ids, vec!["call.noMatch", "call.candidate"]);
    }

    #[test]
    fn test_member_functions_and_operators() {
        let source = r#"
            class Point {
                int x;
                int y;
                Point(int a, int b) : x(a), y(b) { }
                int sum() const { return x + y; }
                Point operator+(const Point& other) const { return Point(x + other.x, y + other.y); }
            };
            int main() {
                Point p(1, 2);
                Point q = p + Point(3, 4);
                const Point& r = q;
                return r.sum();
            }
        "#;
        assert_eq!(errors(source), Vec::<String>::new());
    }

    #[test]
    fn test_const_receiver_rejects_mutator() {
        let source = r#"
            class Counter {
                int n;
                void bump() { n++; }
            };
            int main() {
                const Counter c = {};
                c.bump();
            }
        "#;
        let program = Program::compile_source(source);
        assert!(program.errors().any(|n| n.id == "call.noMatch"));
    }

    #[test]
    fn test_string_literal_is_const_char_array() {
        let program = Program::compile_source(r#"int main() { const char* s = "hi"; }"#);
        assert!(!program.has_errors());
        let literal = (0..program.constructs.len())
            .map(crate::compiler::ConstructId)
            .find(|id| matches!(program.constructs.kind(*id), Some(ConstructKind::StringLiteral(_))));
        let ty = literal.and_then(|id| program.constructs.ty(id).cloned());
        assert_eq!(ty.map(|t| t.to_string()), Some("const char[3]".to_string()));
    }
}
