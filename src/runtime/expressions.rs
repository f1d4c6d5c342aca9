// Expression evaluation

use super::arithmetic::{self, Fault};
use super::engine::Runtime;
use super::events::EventKind;
use super::instance::{EvalResult, Flow, Instance};
use super::streams::{format_value, InputRead};
use crate::compiler::{ConstructId, ConstructKind, ConversionKind, Literal, Program};
use crate::errors::{Result, SimError};
use crate::memory::heap::BlockState;
use crate::memory::{ObjectId, PointerCheck, PointerTarget, RawValue, Region, Value};
use crate::parser::ast::{BinOp, SourceLocation, UnOp};
use crate::types::{integral_promotion, AtomicKind, Type};

impl Runtime {
    pub(crate) fn advance_expression(&mut self, program: &Program, instance: &mut Instance, id: ConstructId) -> Result<Flow> {
        let construct = program
            .constructs
            .get(id)
            .ok_or_else(|| SimError::internal("expression construct missing"))?;
        let location = construct.location;
        let ty = construct.ty.clone().unwrap_or_else(Type::void);

        match &construct.kind {
            ConstructKind::NumericLiteral(Literal::Int(v)) => Ok(done_value(Value::int(*v, ty))),
            ConstructKind::NumericLiteral(Literal::Float(f)) => Ok(done_value(Value::float(*f, ty))),
            ConstructKind::NullptrLiteral => Ok(done_value(Value::null(ty))),
            ConstructKind::StringLiteral(text) => match self.memory.string_literal(text) {
                Some(object) => Ok(Flow::Done(EvalResult::Object(object))),
                None => {
                    self.raise(EventKind::Crash, "static storage is exhausted by string literals", location);
                    Ok(Flow::Halt)
                }
            },
            ConstructKind::Identifier(entity) => Ok(Flow::Done(EvalResult::Object(self.variable(instance.frame, *entity, program)?))),
            ConstructKind::This => {
                let this = self.this_object(instance)?;
                let address = self.memory.object(this).map_or(0, |o| o.address);
                Ok(done_value(Value::pointer(address, ty, PointerTarget::Object(this))))
            }
            ConstructKind::ImplicitConversion { conversion, from, .. } => {
                if let Some(flow) = instance.next_operand(&[*from]) {
                    return Ok(flow);
                }
                self.convert(instance, *conversion, ty, location)
            }
            ConstructKind::Arithmetic { op, left, right } => {
                if let Some(flow) = instance.next_operand(&[*left, *right]) {
                    return Ok(flow);
                }
                let (l, r) = operands(instance)?;
                let (result, fault) = arithmetic::binary(*op, &l, &r, &ty);
                self.report(fault, location);
                Ok(done_value(result))
            }
            ConstructKind::Relational { op, left, right } => {
                if let Some(flow) = instance.next_operand(&[*left, *right]) {
                    return Ok(flow);
                }
                let (l, r) = operands(instance)?;
                Ok(done_value(with_validity(Value::bool(arithmetic::compare(*op, &l, &r)), l.valid && r.valid)))
            }
            ConstructKind::PointerComparison { op, left, right } => {
                if let Some(flow) = instance.next_operand(&[*left, *right]) {
                    return Ok(flow);
                }
                let (l, r) = operands(instance)?;
                let ordered = !matches!(op, BinOp::Eq | BinOp::Ne);
                if ordered && !l.is_null() && !r.is_null() && !same_target(&l, &r) {
                    self.raise(
                        EventKind::UnspecifiedBehavior,
                        format!(
                            "comparing pointers with '{}' that do not point into the same array or object gives an unspecified result",
                            op.symbol()
                        ),
                        location,
                    );
                }
                let result = Value::bool(arithmetic::compare(*op, &l, &r));
                Ok(done_value(with_validity(result, l.valid && r.valid)))
            }
            ConstructKind::PointerOffset { op, pointer, offset } => {
                if let Some(flow) = instance.next_operand(&[*pointer, *offset]) {
                    return Ok(flow);
                }
                let (p, n) = operands(instance)?;
                let steps = if *op == BinOp::Sub { -n.as_int() } else { n.as_int() };
                let moved = self.offset_pointer(&p, steps, n.valid, location);
                Ok(done_value(Value { ty, ..moved }))
            }
            ConstructKind::PointerDifference { left, right } => {
                if let Some(flow) = instance.next_operand(&[*left, *right]) {
                    return Ok(flow);
                }
                let (l, r) = operands(instance)?;
                let mut valid = l.valid && r.valid;
                let array_of = |v: &Value| match v.target {
                    PointerTarget::Array(id) | PointerTarget::Object(id) => Some(id),
                    PointerTarget::None => None,
                };
                if array_of(&l).is_none() || array_of(&l) != array_of(&r) {
                    self.raise(
                        EventKind::UndefinedBehavior,
                        "subtracting pointers that do not point into the same array",
                        location,
                    );
                    valid = false;
                }
                let size = l.ty.pointee().map_or(1, |p| self.memory.size_of(p)).max(1) as i64;
                let difference = (l.as_int() - r.as_int()) / size;
                Ok(done_value(with_validity(Value::int(difference, ty), valid)))
            }
            ConstructKind::Logical { op, left, right } => match instance.results.len() {
                0 => Ok(instance.child(*left)),
                1 => {
                    let l = last_value(instance)?;
                    let short = match op {
                        BinOp::And => !l.is_true(),
                        _ => l.is_true(),
                    };
                    if short {
                        return Ok(done_value(with_validity(Value::bool(l.is_true()), l.valid)));
                    }
                    Ok(instance.child(*right))
                }
                _ => {
                    let (l, r) = operands(instance)?;
                    Ok(done_value(with_validity(Value::bool(r.is_true()), l.valid && r.valid)))
                }
            },
            ConstructKind::LogicalNot { operand } => {
                if let Some(flow) = instance.next_operand(&[*operand]) {
                    return Ok(flow);
                }
                let v = last_value(instance)?;
                Ok(done_value(with_validity(Value::bool(!v.is_true()), v.valid)))
            }
            ConstructKind::UnaryArithmetic { op, operand } => {
                if let Some(flow) = instance.next_operand(&[*operand]) {
                    return Ok(flow);
                }
                let v = last_value(instance)?;
                let (result, fault) = arithmetic::unary(*op, &v, &ty);
                self.report(fault, location);
                Ok(done_value(result))
            }
            ConstructKind::Dereference { operand } => {
                if let Some(flow) = instance.next_operand(&[*operand]) {
                    return Ok(flow);
                }
                let pointer = last_value(instance)?;
                Ok(match self.access(&pointer, location) {
                    Some(object) => Flow::Done(EvalResult::Object(object)),
                    None => Flow::Halt,
                })
            }
            ConstructKind::AddressOf { operand } => {
                if let Some(flow) = instance.next_operand(&[*operand]) {
                    return Ok(flow);
                }
                let object = last_object(instance)?;
                let obj = self
                    .memory
                    .object(object)
                    .ok_or_else(|| SimError::internal("address of an unknown object"))?;
                let in_array = obj
                    .parent
                    .and_then(|p| self.memory.object(p))
                    .is_some_and(|p| p.ty.is_array());
                let target = match (in_array, obj.parent) {
                    (true, Some(array)) => PointerTarget::Array(array),
                    _ => PointerTarget::Object(object),
                };
                Ok(done_value(Value::pointer(obj.address, ty, target)))
            }
            ConstructKind::IncDec { op, operand } => {
                if let Some(flow) = instance.next_operand(&[*operand]) {
                    return Ok(flow);
                }
                let object = last_object(instance)?;
                self.increment(object, *op, location)
            }
            ConstructKind::Assignment { lhs, rhs } => {
                if let Some(flow) = instance.next_operand(&[*rhs, *lhs]) {
                    return Ok(flow);
                }
                let (value, object) = value_then_object(instance)?;
                self.store(object, &value);
                Ok(Flow::Done(EvalResult::Object(object)))
            }
            ConstructKind::ClassAssignment { lhs, rhs } => {
                if let Some(flow) = instance.next_operand(&[*rhs, *lhs]) {
                    return Ok(flow);
                }
                let source = instance
                    .results
                    .first()
                    .and_then(EvalResult::object)
                    .ok_or_else(|| SimError::internal("class assignment source is not an object"))?;
                let dest = last_object(instance)?;
                let source = match (self.memory.object(source), self.memory.object(dest)) {
                    (Some(s), Some(d)) => self.memory.find_subobject(source, s.address, &d.ty).unwrap_or(source),
                    _ => source,
                };
                self.memory.copy_object(dest, source);
                Ok(Flow::Done(EvalResult::Object(dest)))
            }
            ConstructKind::CompoundAssignment { op, lhs, rhs } => {
                if let Some(flow) = instance.next_operand(&[*rhs, *lhs]) {
                    return Ok(flow);
                }
                let (rhs_value, object) = value_then_object(instance)?;
                self.compound_assign(object, *op, &rhs_value, location)
            }
            ConstructKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => match instance.results.len() {
                0 => Ok(instance.child(*condition)),
                1 => {
                    let taken = last_value(instance)?.is_true();
                    Ok(instance.child(if taken { *then_expr } else { *else_expr }))
                }
                _ => Ok(Flow::Done(instance.results.last().cloned().unwrap_or(EvalResult::Void))),
            },
            ConstructKind::Comma { left, right } => {
                if let Some(flow) = instance.next_operand(&[*left, *right]) {
                    return Ok(flow);
                }
                Ok(Flow::Done(instance.results.last().cloned().unwrap_or(EvalResult::Void)))
            }
            ConstructKind::Subscript { pointer, index } => {
                if let Some(flow) = instance.next_operand(&[*pointer, *index]) {
                    return Ok(flow);
                }
                let (p, i) = operands(instance)?;
                let size = p.ty.pointee().map_or(1, |t| self.memory.size_of(t)) as i64;
                let address = p.as_int().wrapping_add(i.as_int().wrapping_mul(size));
                let element = Value {
                    raw: RawValue::Int(address),
                    valid: p.valid && i.valid,
                    ..p
                };
                Ok(match self.access(&element, location) {
                    Some(object) => Flow::Done(EvalResult::Object(object)),
                    None => Flow::Halt,
                })
            }
            ConstructKind::MemberAccess {
                object,
                base_hops,
                index,
            } => {
                if let Some(flow) = instance.next_operand(&[*object]) {
                    return Ok(flow);
                }
                let mut current = last_object(instance)?;
                for _ in 0..*base_hops {
                    current = self
                        .memory
                        .object(current)
                        .and_then(|o| o.base)
                        .ok_or_else(|| SimError::internal("member access through a missing base subobject"))?;
                }
                let member = self
                    .memory
                    .object(current)
                    .and_then(|o| o.subobjects.get(*index).copied())
                    .ok_or_else(|| SimError::internal("member access to a missing member subobject"))?;
                Ok(Flow::Done(EvalResult::Object(member)))
            }
            ConstructKind::FunctionCall { function, receiver, args } => {
                self.advance_function_call(program, instance, *function, *receiver, args, location)
            }
            ConstructKind::IntrinsicCall { intrinsic, args, .. } => {
                self.advance_intrinsic(program, instance, *intrinsic, args, location)
            }
            ConstructKind::OutputOperator { stream, operand } => {
                if let Some(flow) = instance.next_operand(&[*stream, *operand]) {
                    return Ok(flow);
                }
                let stream = first_object(instance)?;
                let value = last_value(instance)?;
                let is_string = value
                    .ty
                    .pointee()
                    .is_some_and(|p| p.atomic_kind() == Some(AtomicKind::Char));
                let text = if is_string {
                    match self.c_string(&value, location) {
                        Some(text) => text,
                        None => return Ok(Flow::Halt),
                    }
                } else {
                    format_value(&value)
                };
                self.output.write(&text, location);
                Ok(Flow::Done(EvalResult::Object(stream)))
            }
            ConstructKind::InputOperator { stream, operand } => {
                if let Some(flow) = instance.next_operand(&[*stream, *operand]) {
                    return Ok(flow);
                }
                let stream = first_object(instance)?;
                let target = last_object(instance)?;
                let target_type = self
                    .memory
                    .object(target)
                    .map(|o| o.ty.clone())
                    .ok_or_else(|| SimError::internal("input target is not an object"))?;
                match self.input.read(&target_type) {
                    InputRead::Blocked => return Ok(Flow::Wait),
                    InputRead::Value { value, consumed } => {
                        self.store(target, &value);
                        if self.echo_input {
                            self.output.write(&consumed, location);
                        }
                    }
                    InputRead::Failed { value } => self.store(target, &value),
                    InputRead::Inactive => {}
                }
                Ok(Flow::Done(EvalResult::Object(stream)))
            }
            ConstructKind::New { allocated, init, length } => self.advance_new(instance, allocated, *init, *length, ty, location),
            ConstructKind::Delete { operand, is_array } => {
                if let Some(flow) = instance.next_operand(&[*operand]) {
                    return Ok(flow);
                }
                self.advance_delete(program, instance, *is_array, location)
            }
            ConstructKind::Temporary { init } => {
                if instance.progress == 0 {
                    instance.progress = 1;
                    let object = self.memory.allocate_temporary(&ty);
                    self.register_temporary(program, instance, object);
                    instance.dest = Some(object);
                    return Ok(Flow::Push(Instance::new(*init, instance.frame).with_dest(Some(object))));
                }
                let object = instance
                    .dest
                    .ok_or_else(|| SimError::internal("temporary object was never allocated"))?;
                Ok(Flow::Done(EvalResult::Object(object)))
            }
            ConstructKind::Invalid => Err(SimError::internal("an invalid construct reached the runtime")),
            other => Err(SimError::internal(format!("cannot evaluate a {} as an expression", other.label()))),
        }
    }

    fn convert(&mut self, instance: &Instance, conversion: ConversionKind, ty: Type, location: SourceLocation) -> Result<Flow> {
        match conversion {
            ConversionKind::LValueToRValue => {
                let object = last_object(instance)?;
                self.check_readable(object, location);
                let value = self
                    .memory
                    .read_value(object)
                    .unwrap_or_else(|| Value::zero(ty.clone()).invalidated());
                Ok(done_value(value))
            }
            ConversionKind::ArrayToPointer => {
                let array = last_object(instance)?;
                let address = self.memory.object(array).map_or(0, |o| o.address);
                Ok(done_value(Value::pointer(address, ty, PointerTarget::Array(array))))
            }
            ConversionKind::NullPointer => Ok(done_value(Value::null(ty))),
            ConversionKind::DerivedToBasePointer => {
                let pointer = last_value(instance)?;
                if pointer.is_null() {
                    return Ok(done_value(Value::null(ty)));
                }
                let base = ty.pointee().cloned().unwrap_or_else(Type::void);
                let target = match pointer.target {
                    PointerTarget::Array(root) | PointerTarget::Object(root) => self
                        .memory
                        .find_subobject(root, pointer.address(), &base)
                        .map_or(pointer.target, PointerTarget::Object),
                    PointerTarget::None => PointerTarget::None,
                };
                Ok(done_value(Value { ty, target, ..pointer }))
            }
            ConversionKind::PointerToBoolean => {
                let pointer = last_value(instance)?;
                Ok(done_value(with_validity(Value::bool(!pointer.is_null()), pointer.valid)))
            }
            ConversionKind::Qualification => {
                let value = last_value(instance)?;
                Ok(done_value(Value { ty, ..value }))
            }
            ConversionKind::FloatingPromotion
            | ConversionKind::IntegralPromotion
            | ConversionKind::IntegralConversion
            | ConversionKind::FloatingConversion
            | ConversionKind::FloatingToIntegral
            | ConversionKind::IntegralToFloating => {
                let value = last_value(instance)?;
                let (result, fault) = arithmetic::convert(&value, &ty);
                self.report(fault, location);
                Ok(done_value(result))
            }
        }
    }

    fn report(&mut self, fault: Option<Fault>, location: SourceLocation) {
        if let Some(fault) = fault {
            self.raise(fault.kind, fault.message, location);
        }
    }

    /// Report a read of an object that is dead or holds no meaningful value
    fn check_readable(&mut self, object: ObjectId, location: SourceLocation) {
        let Some(obj) = self.memory.object(object) else {
            return;
        };
        if obj.region == Region::Invalid || (obj.alive && obj.valid) {
            return;
        }
        let message = if !obj.alive {
            format!("reading '{}', whose lifetime has ended", obj.name)
        } else if obj.written {
            format!("reading an invalid value of '{}'", obj.name)
        } else {
            format!("reading the uninitialized value of '{}'", obj.name)
        };
        self.raise(EventKind::UndefinedBehavior, message, location);
    }

    /// Write a value unless the target is a placeholder for a bad dereference
    fn store(&mut self, object: ObjectId, value: &Value) {
        if self.memory.object(object).is_some_and(|o| o.region != Region::Invalid) {
            self.memory.write_value(object, value);
        }
    }

    /// Object a pointer designates, reporting anything wrong with the access.
    /// Returns `None` when the access crashed the program.
    fn access(&mut self, pointer: &Value, location: SourceLocation) -> Option<ObjectId> {
        let check = self.memory.check_dereference(pointer);
        let dead = check == PointerCheck::Dead;
        let problem = match check {
            PointerCheck::Valid => None,
            PointerCheck::Null => {
                self.raise(EventKind::Crash, "Ow! Your code just dereferenced a null pointer!", location);
                return None;
            }
            PointerCheck::OutsideMemory => {
                let message = format!("dereferenced address 0x{:x}, which is outside of memory", pointer.address());
                self.raise(EventKind::Crash, message, location);
                return None;
            }
            PointerCheck::InvalidValue => Some("dereferencing a pointer whose value is invalid".to_string()),
            PointerCheck::OnePastEnd => Some(format!("dereferencing a pointer one past the end of '{}'", self.target_name(pointer))),
            PointerCheck::OutOfBounds => Some(format!("accessing memory outside the bounds of '{}'", self.target_name(pointer))),
            PointerCheck::Dead => Some(format!(
                "dereferencing a pointer to '{}', whose lifetime has ended",
                self.target_name(pointer)
            )),
            PointerCheck::Unrelated => Some(format!(
                "dereferencing a pointer to address 0x{:x}, where no object of type '{}' lives",
                pointer.address(),
                pointer.ty.pointee().map(|p| p.to_string()).unwrap_or_default()
            )),
        };
        if let Some(message) = problem {
            self.raise(EventKind::UndefinedBehavior, message, location);
        }
        if dead {
            return Some(self.memory.placeholder(pointer));
        }
        Some(self.memory.dereference(pointer))
    }

    fn target_name(&self, pointer: &Value) -> String {
        match pointer.target {
            PointerTarget::Array(id) | PointerTarget::Object(id) => {
                self.memory.object(id).map(|o| o.name.clone()).unwrap_or_default()
            }
            PointerTarget::None => String::new(),
        }
    }

    /// Move a pointer by `steps` elements, reporting arithmetic that leaves
    /// the array it points into
    fn offset_pointer(&mut self, pointer: &Value, steps: i64, steps_valid: bool, location: SourceLocation) -> Value {
        let size = pointer.ty.pointee().map_or(1, |p| self.memory.size_of(p)) as i64;
        let address = pointer.as_int().wrapping_add(steps.wrapping_mul(size));
        let mut moved = Value {
            raw: RawValue::Int(address),
            valid: pointer.valid && steps_valid,
            ..pointer.clone()
        };
        if let PointerTarget::Array(id) | PointerTarget::Object(id) = pointer.target {
            if let Some(object) = self.memory.object(id) {
                let inside = address >= object.address as i64 && address <= object.end() as i64;
                if !inside {
                    let message = format!("pointer arithmetic moved outside the bounds of '{}'", object.name);
                    self.raise(EventKind::UndefinedBehavior, message, location);
                    moved.valid = false;
                }
            }
        }
        moved
    }

    /// `++x`, `--x`, `x++` and `x--`
    fn increment(&mut self, object: ObjectId, op: UnOp, location: SourceLocation) -> Result<Flow> {
        self.check_readable(object, location);
        let old = self
            .memory
            .read_value(object)
            .ok_or_else(|| SimError::internal("increment of an unknown object"))?;
        let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };

        let new = if old.ty.is_pointer() {
            self.offset_pointer(&old, delta, true, location)
        } else {
            let work = if old.ty.is_floating() { Type::double() } else { Type::int() };
            let (widened, _) = arithmetic::convert(&old, &work);
            let (sum, fault) = arithmetic::binary(BinOp::Add, &widened, &Value::int(delta, Type::int()), &work);
            self.report(fault, location);
            let (narrowed, fault) = arithmetic::convert(&sum, &old.ty);
            self.report(fault, location);
            narrowed
        };
        self.store(object, &new);
        match op {
            UnOp::PreInc | UnOp::PreDec => Ok(Flow::Done(EvalResult::Object(object))),
            _ => Ok(done_value(old)),
        }
    }

    /// `x op= v` where `v` is already converted to the operation type
    fn compound_assign(&mut self, object: ObjectId, op: BinOp, rhs: &Value, location: SourceLocation) -> Result<Flow> {
        self.check_readable(object, location);
        let old = self
            .memory
            .read_value(object)
            .ok_or_else(|| SimError::internal("compound assignment to an unknown object"))?;

        let new = if old.ty.is_pointer() {
            let steps = if op == BinOp::Sub { -rhs.as_int() } else { rhs.as_int() };
            self.offset_pointer(&old, steps, rhs.valid, location)
        } else {
            let work = match (op, old.ty.atomic_kind()) {
                (BinOp::Shl | BinOp::Shr, Some(kind)) => Type::atomic(integral_promotion(kind)),
                _ => rhs.ty.clone(),
            };
            let (widened, _) = arithmetic::convert(&old, &work);
            let (result, fault) = arithmetic::binary(op, &widened, rhs, &work);
            self.report(fault, location);
            let (narrowed, fault) = arithmetic::convert(&result, &old.ty);
            self.report(fault, location);
            narrowed
        };
        self.store(object, &new);
        Ok(Flow::Done(EvalResult::Object(object)))
    }

    /// Characters of a null-terminated string a `char*` points to. Returns
    /// `None` when reading it crashed the program.
    fn c_string(&mut self, pointer: &Value, location: SourceLocation) -> Option<String> {
        match self.memory.check_dereference(pointer) {
            PointerCheck::Valid => {}
            PointerCheck::Null => {
                self.raise(EventKind::Crash, "Ow! Your code just wrote a null 'char*' to an output stream!", location);
                return None;
            }
            PointerCheck::OutsideMemory => {
                let message = format!("printing a string at address 0x{:x}, which is outside of memory", pointer.address());
                self.raise(EventKind::Crash, message, location);
                return None;
            }
            _ => {
                self.raise(
                    EventKind::UndefinedBehavior,
                    "printing a string through a pointer that does not point to a live array",
                    location,
                );
                return Some(String::new());
            }
        }

        let start = pointer.address();
        let end = match pointer.target {
            PointerTarget::Array(id) | PointerTarget::Object(id) => self.memory.object(id).map_or(start, |o| o.end()),
            PointerTarget::None => self.memory.layout().total_bytes() as u64,
        };
        let bytes = self
            .memory
            .read_bytes(start, end.saturating_sub(start))
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let text = match bytes.iter().position(|b| *b == 0) {
            Some(nul) => &bytes[..nul],
            None => {
                self.raise(
                    EventKind::UndefinedBehavior,
                    "the printed character array is not null-terminated",
                    location,
                );
                &bytes[..]
            }
        };
        Some(text.iter().map(|b| char::from(*b)).collect())
    }

    /// `new T`, `new T(args)` and `new T[n]`
    fn advance_new(
        &mut self,
        instance: &mut Instance,
        allocated: &Type,
        init: Option<ConstructId>,
        length: Option<ConstructId>,
        ty: Type,
        location: SourceLocation,
    ) -> Result<Flow> {
        if let Some(length) = length {
            if instance.progress == 0 && instance.results.is_empty() {
                return Ok(instance.child(length));
            }
        }

        if instance.progress == 0 {
            let allocation_type = match length {
                Some(_) => {
                    let mut count = last_value(instance)?.as_int();
                    if count < 0 {
                        let message = format!("array new with a negative length of {}", count);
                        self.raise(EventKind::UndefinedBehavior, message, location);
                        count = 0;
                    }
                    Type::array_of(allocated.clone(), count as u64)
                }
                None => allocated.clone(),
            };
            let Some(object) = self.memory.allocate_heap(&allocation_type) else {
                let message = format!("out of heap memory while allocating '{}'", allocation_type);
                self.raise(EventKind::Crash, message, location);
                return Ok(Flow::Halt);
            };
            self.memory.begin_lifetime(object);
            instance.dest = Some(object);
            instance.progress = 1;
        }

        let object = instance
            .dest
            .ok_or_else(|| SimError::internal("new-expression lost its allocation"))?;
        let (address, elements) = self
            .memory
            .object(object)
            .map(|o| (o.address, o.subobjects.clone()))
            .ok_or_else(|| SimError::internal("heap object missing"))?;

        if let Some(init) = init {
            let next = if length.is_some() {
                elements.get(instance.progress - 1).copied()
            } else {
                (instance.progress == 1).then_some(object)
            };
            if let Some(dest) = next {
                instance.progress += 1;
                return Ok(Flow::Push(Instance::new(init, instance.frame).with_dest(Some(dest))));
            }
        }

        let target = if length.is_some() {
            PointerTarget::Array(object)
        } else {
            PointerTarget::Object(object)
        };
        Ok(done_value(Value::pointer(address, ty, target)))
    }

    /// `delete p` and `delete[] p`: destructors, then the heap block is freed
    fn advance_delete(&mut self, program: &Program, instance: &mut Instance, is_array: bool, location: SourceLocation) -> Result<Flow> {
        let pointer = instance
            .results
            .first()
            .and_then(EvalResult::value)
            .cloned()
            .ok_or_else(|| SimError::internal("delete operand is not a value"))?;
        let address = pointer.address();

        if instance.progress == 0 {
            if pointer.is_null() {
                return Ok(Flow::Done(EvalResult::Void));
            }
            let block = self.memory.heap().block(address).map(|b| (b.object, b.state));
            let object = match block {
                None => {
                    let message = format!("deleting address 0x{:x}, which was not allocated with new", address);
                    self.raise(EventKind::UndefinedBehavior, message, location);
                    return Ok(Flow::Done(EvalResult::Void));
                }
                Some((_, BlockState::Tombstone)) => {
                    let message = format!("double delete: the object at 0x{:x} was already deleted", address);
                    self.raise(EventKind::UndefinedBehavior, message, location);
                    return Ok(Flow::Done(EvalResult::Void));
                }
                Some((object, BlockState::Allocated)) => object,
            };

            let allocated_array = self.memory.object(object).is_some_and(|o| o.ty.is_array());
            if allocated_array != is_array {
                let message = if is_array {
                    "using delete[] on an object that was allocated with new"
                } else {
                    "using delete on an array that was allocated with new[]"
                };
                self.raise(EventKind::UndefinedBehavior, message, location);
            }

            let mut parts = Vec::new();
            self.destructible_parts(program, object, &mut parts);
            parts.reverse();
            instance.pending = parts;
            instance.progress = 1;
        }

        if let Some(flow) = self.next_pending_destructor(program, instance)? {
            return Ok(flow);
        }
        self.memory
            .free_heap(address)
            .map_err(|err| SimError::internal(format!("freeing a checked heap block failed: {:?}", err)))?;
        Ok(Flow::Done(EvalResult::Void))
    }
}

fn done_value(value: Value) -> Flow {
    Flow::Done(EvalResult::Value(value))
}

fn with_validity(value: Value, valid: bool) -> Value {
    if valid {
        value
    } else {
        value.invalidated()
    }
}

fn same_target(left: &Value, right: &Value) -> bool {
    match (left.target, right.target) {
        (PointerTarget::Array(a) | PointerTarget::Object(a), PointerTarget::Array(b) | PointerTarget::Object(b)) => a == b,
        _ => false,
    }
}

fn last_value(instance: &Instance) -> Result<Value> {
    instance
        .last_value()
        .cloned()
        .ok_or_else(|| SimError::internal("operand did not produce a value"))
}

fn last_object(instance: &Instance) -> Result<ObjectId> {
    instance
        .last_object()
        .ok_or_else(|| SimError::internal("operand did not produce an object"))
}

fn first_object(instance: &Instance) -> Result<ObjectId> {
    instance
        .results
        .first()
        .and_then(EvalResult::object)
        .ok_or_else(|| SimError::internal("stream operand did not produce an object"))
}

/// The two value operands of a binary operator
fn operands(instance: &Instance) -> Result<(Value, Value)> {
    match instance.results.as_slice() {
        [EvalResult::Value(l), EvalResult::Value(r)] => Ok((l.clone(), r.clone())),
        _ => Err(SimError::internal("binary operator operands are not values")),
    }
}

/// A value operand followed by an object operand (`rhs`, then `lhs`)
fn value_then_object(instance: &Instance) -> Result<(Value, ObjectId)> {
    match instance.results.as_slice() {
        [EvalResult::Value(value), EvalResult::Object(object)] => Ok((value.clone(), *object)),
        _ => Err(SimError::internal("assignment operands are not a value and an object")),
    }
}
