// Object initialization

use super::calls::CallProgress;
use super::engine::Runtime;
use super::instance::{EvalResult, Flow, Instance};
use crate::compiler::{ConstructId, ConstructKind, InitAction, InitTarget, Program};
use crate::entities::{EntityKind, StorageKind};
use crate::errors::{Result, SimError};
use crate::memory::{ObjectId, Region, Value};
use crate::types::Type;

impl Runtime {
    pub(crate) fn advance_initializer(&mut self, program: &Program, instance: &mut Instance, id: ConstructId) -> Result<Flow> {
        let Some(ConstructKind::Initializer { target, action, .. }) = program.constructs.kind(id) else {
            return Err(SimError::internal("initializer construct expected"));
        };
        let ty = program.constructs.ty(id).cloned().unwrap_or_else(Type::void);

        if instance.progress == 0 {
            instance.progress = 1;
            instance.dest = self.init_dest(program, instance, *target)?;
        }
        let dest = instance.dest;

        match action {
            InitAction::None => {
                if let Some(dest) = dest {
                    self.memory.begin_lifetime(dest);
                    self.memory.invalidate(dest);
                }
                Ok(Flow::Done(dest.map_or(EvalResult::Void, EvalResult::Object)))
            }
            InitAction::ZeroFill => match dest {
                Some(dest) => {
                    self.memory.begin_lifetime(dest);
                    self.memory.zero_fill(dest);
                    Ok(Flow::Done(EvalResult::Object(dest)))
                }
                None => Ok(Flow::Done(EvalResult::Value(Value::zero(ty.cv_unqualified())))),
            },
            InitAction::Atomic { arg } => {
                if let Some(flow) = instance.next_operand(&[*arg]) {
                    return Ok(flow);
                }
                let value = instance
                    .last_value()
                    .cloned()
                    .ok_or_else(|| SimError::internal("atomic initializer produced no value"))?;
                let Some(dest) = dest else {
                    return Ok(Flow::Done(EvalResult::Value(value)));
                };
                if self.memory.object(dest).is_some_and(|o| o.region != Region::Invalid) {
                    self.memory.begin_lifetime(dest);
                    self.memory.write_value(dest, &value);
                }
                Ok(Flow::Done(EvalResult::Object(dest)))
            }
            InitAction::Aggregate { elements, zero_rest } => {
                let dest = require_dest(dest)?;
                if instance.results.is_empty() {
                    self.memory.begin_lifetime(dest);
                }
                if let Some(element) = elements.get(instance.results.len()) {
                    return Ok(self.initialize_part(program, instance, dest, *element));
                }
                if *zero_rest {
                    let rest: Vec<ObjectId> = self
                        .memory
                        .object(dest)
                        .map(|o| o.subobjects.iter().skip(elements.len()).copied().collect())
                        .unwrap_or_default();
                    for element in rest {
                        self.memory.zero_fill(element);
                    }
                }
                Ok(Flow::Done(EvalResult::Object(dest)))
            }
            InitAction::StringArray { text } => {
                let dest = require_dest(dest)?;
                self.memory.begin_lifetime(dest);
                let chars = self.memory.object(dest).map(|o| o.subobjects.clone()).unwrap_or_default();
                let mut bytes = text.bytes().chain(std::iter::once(0));
                for element in chars {
                    match bytes.next() {
                        Some(byte) => self.memory.write_value(element, &Value::int(i64::from(byte as i8), Type::char())),
                        None => self.memory.zero_fill(element),
                    }
                }
                Ok(Flow::Done(EvalResult::Object(dest)))
            }
            InitAction::Constructor { ctor, args } => {
                let dest = require_dest(dest)?;
                if instance.call.is_none() {
                    self.memory.begin_lifetime(dest);
                    let location = program.constructs.location(id);
                    let Some(call) = self.enter_call(program, *ctor, Some(dest), location)? else {
                        return Ok(Flow::Halt);
                    };
                    instance.call = Some(call);
                }
                match self.advance_call(program, instance, args)? {
                    CallProgress::Pending(flow) => Ok(flow),
                    CallProgress::Returned(_) => Ok(Flow::Done(EvalResult::Object(dest))),
                }
            }
            InitAction::ClassCopy { arg } => {
                if let Some(flow) = instance.next_operand(&[*arg]) {
                    return Ok(flow);
                }
                let dest = require_dest(dest)?;
                let source = instance
                    .last_object()
                    .ok_or_else(|| SimError::internal("copy initializer source is not an object"))?;
                // A derived source is sliced down to its base subobject
                let source = match (self.memory.object(source), self.memory.object(dest)) {
                    (Some(s), Some(d)) => self.memory.find_subobject(source, s.address, &d.ty).unwrap_or(source),
                    _ => source,
                };
                self.memory.begin_lifetime(dest);
                self.memory.copy_object(dest, source);
                Ok(Flow::Done(EvalResult::Object(dest)))
            }
            InitAction::ClassMembers { base, members } => {
                let dest = require_dest(dest)?;
                if instance.results.is_empty() {
                    self.memory.begin_lifetime(dest);
                }
                let parts: Vec<ConstructId> = base.iter().chain(members).copied().collect();
                match parts.get(instance.results.len()) {
                    Some(part) => Ok(self.initialize_part(program, instance, dest, *part)),
                    None => Ok(Flow::Done(EvalResult::Object(dest))),
                }
            }
            InitAction::Bind { arg, materialize } => {
                if let Some(flow) = instance.next_operand(&[*arg]) {
                    return Ok(flow);
                }
                let object = match instance.results.last().cloned() {
                    Some(EvalResult::Object(object)) if !*materialize => object,
                    Some(EvalResult::Value(value)) => {
                        let referred = ty.referred().cloned().unwrap_or_else(|| value.ty.clone());
                        let temporary = self.memory.allocate_temporary(&referred);
                        self.memory.begin_lifetime(temporary);
                        self.memory.write_value(temporary, &value);
                        if !matches!(target, InitTarget::Entity(_)) {
                            self.register_temporary(program, instance, temporary);
                        }
                        temporary
                    }
                    _ => return Err(SimError::internal("reference initializer produced nothing to bind")),
                };
                if let InitTarget::Entity(entity) = target {
                    let is_static = program.entities.get(*entity).and_then(|e| e.storage()) == Some(StorageKind::Static);
                    let frame = if is_static { None } else { instance.frame };
                    self.memory.bind_reference(frame, *entity, object);
                }
                Ok(Flow::Done(EvalResult::Object(object)))
            }
        }
    }

    /// Object an initializer initializes, if it has one
    fn init_dest(&mut self, program: &Program, instance: &Instance, target: InitTarget) -> Result<Option<ObjectId>> {
        match target {
            InitTarget::Entity(entity) => match program.entities.get(entity).map(|e| &e.kind) {
                Some(EntityKind::Object { .. }) => self.variable(instance.frame, entity, program).map(Some),
                _ => Ok(None),
            },
            InitTarget::Member(index) => {
                let this = self.this_object(instance)?;
                Ok(self.memory.object(this).and_then(|o| o.subobjects.get(index).copied()))
            }
            InitTarget::Base => {
                let this = self.this_object(instance)?;
                Ok(self.memory.object(this).and_then(|o| o.base))
            }
            _ => Ok(instance.dest),
        }
    }

    pub(crate) fn this_object(&self, instance: &Instance) -> Result<ObjectId> {
        instance
            .frame
            .and_then(|f| self.memory.frame(f))
            .and_then(|f| f.this_object)
            .ok_or_else(|| SimError::internal("'this' used outside of a member function call"))
    }

    /// Push the initializer of an element, base or member of `dest`
    fn initialize_part(&self, program: &Program, instance: &Instance, dest: ObjectId, part: ConstructId) -> Flow {
        let object = self.memory.object(dest);
        let part_dest = match program.constructs.kind(part) {
            Some(ConstructKind::Initializer {
                target: InitTarget::Subobject(index),
                ..
            }) => object.and_then(|o| o.subobjects.get(*index).copied()),
            Some(ConstructKind::Initializer {
                target: InitTarget::BaseSubobject,
                ..
            }) => object.and_then(|o| o.base),
            _ => None,
        };
        Flow::Push(Instance::new(part, instance.frame).with_dest(part_dest))
    }
}

fn require_dest(dest: Option<ObjectId>) -> Result<ObjectId> {
    dest.ok_or_else(|| SimError::internal("initializer has no object to initialize"))
}
