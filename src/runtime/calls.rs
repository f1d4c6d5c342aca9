// Function, constructor, destructor and library calls

use tracing::trace;

use super::engine::Runtime;
use super::events::EventKind;
use super::instance::{CallState, EvalResult, Flow, Instance};
use crate::compiler::{ConstructId, ConstructKind, Program};
use crate::entities::{EntityId, EntityKind, StorageKind};
use crate::errors::{Result, SimError};
use crate::library::IntrinsicCall;
use crate::memory::ObjectId;
use crate::parser::ast::SourceLocation;
use crate::types::ClassId;

/// Where a call stands after one step
pub(crate) enum CallProgress {
    Pending(Flow),
    Returned(EvalResult),
}

impl Runtime {
    /// Push the frame of `function` and prepare its call state. Returns
    /// `None` after raising a crash when the stack is exhausted.
    pub(crate) fn enter_call(
        &mut self,
        program: &Program,
        function: EntityId,
        this_object: Option<ObjectId>,
        location: SourceLocation,
    ) -> Result<Option<CallState>> {
        let definition = program.definition(function).ok_or_else(|| {
            SimError::internal(format!("'{}' has no definition", program.entities.name(function)))
        })?;
        let Some(ConstructKind::FunctionDefinition { params, locals, .. }) = program.constructs.kind(definition) else {
            return Err(SimError::internal("function definition construct expected"));
        };

        let objects: Vec<_> = locals
            .iter()
            .filter_map(|entity| match program.entities.get(*entity).map(|e| &e.kind) {
                Some(EntityKind::Object {
                    ty,
                    storage: StorageKind::Automatic,
                }) => Some((*entity, ty.clone(), program.entities.name(*entity).to_string())),
                _ => None,
            })
            .collect();
        let Some(frame) = self.memory.push_frame(function, &objects) else {
            let name = program.entities.name(function).to_string();
            self.raise(
                EventKind::Crash,
                format!("stack overflow while calling '{}'", name),
                location,
            );
            return Ok(None);
        };
        if let Some(frame) = self.memory.frame_mut(frame) {
            frame.this_object = this_object;
        }

        let return_type = program
            .entities
            .function(function)
            .map(|f| f.signature.return_type.clone())
            .ok_or_else(|| SimError::internal("called entity is not a function"))?;
        let return_object = return_type
            .is_class()
            .then(|| self.memory.allocate_temporary(&return_type));

        trace!(function = %program.entities.name(function), frame, "call entered");
        Ok(Some(CallState {
            function,
            frame,
            params: params.clone(),
            next_arg: 0,
            bound: 0,
            return_object,
            entered: false,
        }))
    }

    /// Drive a call whose frame is pushed: bind arguments, run the body, pop
    /// the frame. Returns the body's result once the call completes.
    pub(crate) fn advance_call(
        &mut self,
        program: &Program,
        instance: &mut Instance,
        args: &[ConstructId],
    ) -> Result<CallProgress> {
        let Some(call) = instance.call.as_mut() else {
            return Err(SimError::internal("call advanced before its frame was pushed"));
        };

        let frame = call.frame;
        let finished_param = if call.bound < call.next_arg {
            call.bound += 1;
            call.params.get(call.bound - 1).copied()
        } else {
            None
        };
        let reference_param = finished_param.filter(|p| {
            program
                .entities
                .get(*p)
                .is_some_and(|e| matches!(e.kind, EntityKind::Reference { .. }))
        });
        if let Some(param) = reference_param {
            let object = instance
                .last_object()
                .ok_or_else(|| SimError::internal("reference argument produced no object"))?;
            self.memory.bind_reference(Some(frame), param, object);
        }

        let Some(call) = instance.call.as_mut() else {
            return Err(SimError::internal("call state lost"));
        };
        if let Some(arg) = args.get(call.next_arg) {
            let dest = call
                .params
                .get(call.next_arg)
                .and_then(|p| self.memory.frame(call.frame).and_then(|f| f.objects.get(p).copied()));
            call.next_arg += 1;
            return Ok(CallProgress::Pending(Flow::Push(Instance::new(*arg, instance.frame).with_dest(dest))));
        }

        if !call.entered {
            call.entered = true;
            let definition = program
                .definition(call.function)
                .ok_or_else(|| SimError::internal("called function has no definition"))?;
            let mut body = Instance::new(definition, Some(call.frame));
            body.return_object = call.return_object;
            return Ok(CallProgress::Pending(Flow::Push(body)));
        }

        let result = instance.results.last().cloned().unwrap_or(EvalResult::Void);
        self.memory.pop_frame();
        trace!(function = %program.entities.name(call.function), "call returned");
        Ok(CallProgress::Returned(result))
    }

    /// `f(args)` and `obj.f(args)`
    pub(crate) fn advance_function_call(
        &mut self,
        program: &Program,
        instance: &mut Instance,
        function: EntityId,
        receiver: Option<ConstructId>,
        args: &[ConstructId],
        location: SourceLocation,
    ) -> Result<Flow> {
        if instance.call.is_none() {
            if let Some(receiver) = receiver {
                if instance.results.is_empty() {
                    return Ok(instance.child(receiver));
                }
            }
            let this_object = match receiver {
                Some(_) => {
                    let object = instance
                        .last_object()
                        .ok_or_else(|| SimError::internal("member call receiver is not an object"))?;
                    let class = program.entities.function(function).and_then(|f| f.class);
                    Some(self.subobject_of_class(object, class))
                }
                None => None,
            };
            let Some(call) = self.enter_call(program, function, this_object, location)? else {
                return Ok(Flow::Halt);
            };
            if let Some(object) = call.return_object {
                self.register_temporary(program, instance, object);
            }
            instance.call = Some(call);
        }

        match self.advance_call(program, instance, args)? {
            CallProgress::Pending(flow) => Ok(flow),
            CallProgress::Returned(result) => Ok(Flow::Done(result)),
        }
    }

    /// The base subobject of `object` whose class is `class`; members
    /// inherited from a base run with that subobject as `this`
    fn subobject_of_class(&self, object: ObjectId, class: Option<ClassId>) -> ObjectId {
        let mut current = object;
        while let Some(obj) = self.memory.object(current) {
            match obj.base {
                Some(base) if obj.ty.class_id() != class => current = base,
                _ => break,
            }
        }
        current
    }

    /// Run the destructor body of `instance.dest`, then destroy its members
    pub(crate) fn advance_destructor(&mut self, program: &Program, instance: &mut Instance, dtor: EntityId) -> Result<Flow> {
        let object = instance
            .dest
            .ok_or_else(|| SimError::internal("destructor call without an object"))?;
        if instance.call.is_none() {
            let location = program.entities.get(dtor).map(|e| e.location).unwrap_or_default();
            let Some(call) = self.enter_call(program, dtor, Some(object), location)? else {
                return Ok(Flow::Halt);
            };
            instance.call = Some(call);
        }

        match self.advance_call(program, instance, &[])? {
            CallProgress::Pending(flow) => Ok(flow),
            CallProgress::Returned(_) => {
                if let Some(obj) = self.memory.object(object) {
                    instance.owned = obj.base.into_iter().chain(obj.subobjects.iter().copied()).collect();
                }
                Ok(Flow::Done(EvalResult::Void))
            }
        }
    }

    /// Call a host-provided library function
    pub(crate) fn advance_intrinsic(
        &mut self,
        program: &Program,
        instance: &mut Instance,
        intrinsic: usize,
        args: &[ConstructId],
        location: SourceLocation,
    ) -> Result<Flow> {
        if let Some(flow) = instance.next_operand(args) {
            return Ok(flow);
        }
        let def = program.intrinsic(intrinsic).ok_or_else(|| SimError::UnknownIntrinsic {
            name: format!("#{}", intrinsic),
        })?;
        let values = instance
            .results
            .iter()
            .map(|r| r.value().cloned())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| SimError::internal(format!("argument of '{}' is not a value", def.name)))?;

        let mut call = IntrinsicCall::new(def.name.clone(), values, location);
        let result = (def.operate)(&mut call)?;
        let mut fatal = false;
        for (kind, message) in call.raised {
            fatal |= self.raise(kind, message, location);
        }
        if fatal {
            return Ok(Flow::Halt);
        }
        Ok(Flow::Done(result.map_or(EvalResult::Void, EvalResult::Value)))
    }
}
