// Statements, function bodies and program startup

use tracing::{debug, info};

use super::engine::Runtime;
use super::events::EventKind;
use super::instance::{EvalResult, Flow, Instance, Jump};
use crate::compiler::{ConstructId, ConstructKind, Program};
use crate::entities::{EntityKind, StorageKind};
use crate::errors::{Result, SimError};
use crate::memory::{PointerTarget, Value};
use crate::parser::ast::SourceLocation;
use crate::types::Type;

// Loop progress values
const LOOP_START: usize = 0;
const WHILE_CHECK: usize = 1;
const WHILE_NEXT: usize = 2;
const DO_CONDITION: usize = 1;
const DO_CHECK: usize = 2;
const FOR_CONDITION: usize = 1;
const FOR_CHECK: usize = 2;
const FOR_INCREMENT: usize = 3;

// Startup progress values
const STARTUP_GLOBALS: usize = 1;
const STARTUP_MAIN: usize = 2;
const STARTUP_STATIC_DESTRUCTORS: usize = 3;

impl Runtime {
    pub(crate) fn advance_statement(&mut self, program: &Program, instance: &mut Instance, id: ConstructId) -> Result<Flow> {
        let kind = program
            .constructs
            .kind(id)
            .ok_or_else(|| SimError::internal("statement construct missing"))?;
        match kind {
            ConstructKind::Block { statements, locals } => {
                if instance.progress == 0 {
                    instance.progress = 1;
                    instance.owned = self.automatic_objects(program, instance.frame, locals);
                }
                Ok(instance.next_operand(statements).unwrap_or(Flow::Done(EvalResult::Void)))
            }
            ConstructKind::ExpressionStatement { expr } => {
                Ok(instance.next_operand(&[*expr]).unwrap_or(Flow::Done(EvalResult::Void)))
            }
            ConstructKind::NullStatement => Ok(Flow::Done(EvalResult::Void)),
            ConstructKind::Declaration { definitions } => {
                Ok(instance.next_operand(definitions).unwrap_or(Flow::Done(EvalResult::Void)))
            }
            ConstructKind::VariableDefinition { entity, init } => {
                let is_static = program.entities.get(*entity).and_then(|e| e.storage()) == Some(StorageKind::Static);
                if is_static && instance.frame.is_some() {
                    return Ok(Flow::Done(EvalResult::Void));
                }
                let init: Vec<ConstructId> = init.iter().copied().collect();
                Ok(instance.next_operand(&init).unwrap_or(Flow::Done(EvalResult::Void)))
            }
            ConstructKind::If {
                condition,
                then_branch,
                else_branch,
            } => match instance.results.len() {
                0 => Ok(instance.child(*condition)),
                1 => {
                    let taken = instance.last_value().is_some_and(Value::is_true);
                    match (taken, else_branch) {
                        (true, _) => Ok(instance.child(*then_branch)),
                        (false, Some(else_branch)) => Ok(instance.child(*else_branch)),
                        (false, None) => Ok(Flow::Done(EvalResult::Void)),
                    }
                }
                _ => Ok(Flow::Done(EvalResult::Void)),
            },
            ConstructKind::While { condition, body } => match instance.progress {
                WHILE_CHECK => {
                    if !self.take_condition(instance) {
                        return Ok(Flow::Done(EvalResult::Void));
                    }
                    instance.progress = WHILE_NEXT;
                    Ok(instance.child(*body))
                }
                _ => {
                    instance.progress = WHILE_CHECK;
                    Ok(instance.child(*condition))
                }
            },
            ConstructKind::DoWhile { body, condition } => match instance.progress {
                DO_CONDITION => {
                    instance.progress = DO_CHECK;
                    Ok(instance.child(*condition))
                }
                DO_CHECK => {
                    if !self.take_condition(instance) {
                        return Ok(Flow::Done(EvalResult::Void));
                    }
                    instance.progress = DO_CONDITION;
                    Ok(instance.child(*body))
                }
                _ => {
                    instance.progress = DO_CONDITION;
                    Ok(instance.child(*body))
                }
            },
            ConstructKind::For {
                init,
                condition,
                increment,
                body,
                locals,
            } => loop {
                match instance.progress {
                    LOOP_START => {
                        instance.owned = self.automatic_objects(program, instance.frame, locals);
                        instance.progress = FOR_CONDITION;
                        if let Some(init) = init {
                            return Ok(instance.child(*init));
                        }
                    }
                    FOR_CONDITION => match condition {
                        Some(condition) => {
                            instance.progress = FOR_CHECK;
                            return Ok(instance.child(*condition));
                        }
                        None => {
                            instance.progress = FOR_INCREMENT;
                            return Ok(instance.child(*body));
                        }
                    },
                    FOR_CHECK => {
                        if !self.take_condition(instance) {
                            return Ok(Flow::Done(EvalResult::Void));
                        }
                        instance.progress = FOR_INCREMENT;
                        return Ok(instance.child(*body));
                    }
                    _ => {
                        instance.progress = FOR_CONDITION;
                        instance.results.clear();
                        if let Some(increment) = increment {
                            return Ok(instance.child(*increment));
                        }
                    }
                }
            },
            ConstructKind::Break => Ok(Flow::Jump(Jump::Break)),
            ConstructKind::Continue => Ok(Flow::Jump(Jump::Continue)),
            ConstructKind::Return { init } => match (init, instance.results.last()) {
                (Some(init), None) => {
                    let dest = self.enclosing_return_object(program);
                    Ok(Flow::Push(Instance::new(*init, instance.frame).with_dest(dest)))
                }
                (_, result) => Ok(Flow::Jump(Jump::Return(result.cloned().unwrap_or(EvalResult::Void)))),
            },
            ConstructKind::CtorInitializer { base, members } => {
                let parts: Vec<ConstructId> = base.iter().chain(members).copied().collect();
                Ok(instance.next_operand(&parts).unwrap_or(Flow::Done(EvalResult::Void)))
            }
            other => Err(SimError::internal(format!("cannot execute a {} as a statement", other.label()))),
        }
    }

    /// Condition result of the last child; clears the collected results so
    /// long-running loops do not accumulate them
    fn take_condition(&self, instance: &mut Instance) -> bool {
        let taken = instance.last_value().is_some_and(Value::is_true);
        instance.results.clear();
        taken
    }

    /// Resume a loop after `continue`
    pub(crate) fn continue_loop(&self, program: &Program, instance: &mut Instance) -> Result<()> {
        instance.results.clear();
        instance.progress = match instance.construct().and_then(|id| program.constructs.kind(id)) {
            Some(ConstructKind::While { .. }) => WHILE_NEXT,
            Some(ConstructKind::DoWhile { .. }) => DO_CONDITION,
            Some(ConstructKind::For { .. }) => FOR_INCREMENT,
            _ => return Err(SimError::internal("continue delivered to a non-loop")),
        };
        Ok(())
    }

    /// Parameters, then the constructor initializer, then the body
    pub(crate) fn advance_function_body(&mut self, program: &Program, instance: &mut Instance, id: ConstructId) -> Result<Flow> {
        let Some(ConstructKind::FunctionDefinition {
            entity,
            params,
            body,
            ctor_initializer,
            ..
        }) = program.constructs.kind(id)
        else {
            return Err(SimError::internal("function definition construct expected"));
        };

        if instance.progress == 0 {
            instance.progress = 1;
            instance.owned = self.automatic_objects(program, instance.frame, params);
            if let Some(init) = ctor_initializer {
                return Ok(instance.child(*init));
            }
        }
        if instance.progress == 1 {
            instance.progress = 2;
            return Ok(instance.child(*body));
        }

        // Control reached the closing brace without a return statement
        let return_type = program
            .entities
            .function(*entity)
            .map(|f| f.signature.return_type.clone())
            .unwrap_or_else(Type::void);
        if Some(*entity) == program.main() {
            return Ok(Flow::Done(EvalResult::Value(Value::int(0, return_type))));
        }
        if return_type.is_void() {
            return Ok(Flow::Done(EvalResult::Void));
        }

        let location = program.constructs.location(*body);
        let name = program.entities.name(*entity).to_string();
        self.raise(
            EventKind::UndefinedBehavior,
            format!("control reached the end of non-void function '{}' without returning a value", name),
            location,
        );
        if let Some(object) = instance.return_object {
            return Ok(Flow::Done(EvalResult::Object(object)));
        }
        if let Some(referred) = return_type.referred() {
            let nowhere = Value::pointer(0, Type::pointer_to(referred.clone()), PointerTarget::None);
            return Ok(Flow::Done(EvalResult::Object(self.memory.dereference(&nowhere))));
        }
        Ok(Flow::Done(EvalResult::Value(Value::zero(return_type.cv_unqualified()).invalidated())))
    }

    /// Static initialization, `main`, static destruction and the leak check
    pub(crate) fn advance_startup(&mut self, program: &Program, instance: &mut Instance) -> Result<Flow> {
        if instance.progress == 0 {
            instance.progress = STARTUP_GLOBALS;
            for definition in program.globals() {
                let Some(ConstructKind::VariableDefinition { entity, .. }) = program.constructs.kind(*definition) else {
                    continue;
                };
                let Some(EntityKind::Object { ty, .. }) = program.entities.get(*entity).map(|e| &e.kind) else {
                    continue;
                };
                let name = program.entities.name(*entity);
                if self.memory.allocate_static(*entity, ty, name).is_none() {
                    self.raise(
                        EventKind::Crash,
                        format!("static storage is exhausted while allocating '{}'", name),
                        program.constructs.location(*definition),
                    );
                    return Ok(Flow::Halt);
                }
            }
            debug!(globals = program.globals().len(), "static storage allocated");
        }

        if instance.progress == STARTUP_GLOBALS {
            if let Some(flow) = instance.next_operand(program.globals()) {
                return Ok(flow);
            }
            instance.progress = STARTUP_MAIN;
            let main = program.main().ok_or(SimError::NoMain)?;
            let Some(call) = self.enter_call(program, main, None, SourceLocation::default())? else {
                return Ok(Flow::Halt);
            };
            let definition = program.definition(main).ok_or(SimError::NoMain)?;
            let frame = call.frame;
            instance.call = Some(call);
            return Ok(Flow::Push(Instance::new(definition, Some(frame))));
        }

        if instance.progress == STARTUP_MAIN {
            instance.progress = STARTUP_STATIC_DESTRUCTORS;
            self.exit_code = instance.last_value().map(Value::as_int);
            self.memory.pop_frame();
            info!(exit_code = ?self.exit_code, "main returned");

            let mut parts = Vec::new();
            for definition in program.globals().iter().rev() {
                if let Some(ConstructKind::VariableDefinition { entity, .. }) = program.constructs.kind(*definition) {
                    if let Some(object) = self.memory.static_object(*entity) {
                        self.destructible_parts(program, object, &mut parts);
                    }
                }
            }
            parts.reverse();
            instance.pending = parts;
        }

        if let Some(flow) = self.next_pending_destructor(program, instance)? {
            return Ok(flow);
        }

        for definition in program.globals() {
            if let Some(ConstructKind::VariableDefinition { entity, .. }) = program.constructs.kind(*definition) {
                if let Some(object) = self.memory.static_object(*entity) {
                    self.memory.kill(object);
                }
            }
        }
        for object in self.memory.leaked_objects() {
            let Some(obj) = self.memory.object(object) else {
                continue;
            };
            let message = format!(
                "{} bytes of type '{}' allocated at 0x{:x} were never deleted",
                obj.size, obj.ty, obj.address
            );
            self.raise(EventKind::MemoryLeak, message, SourceLocation::default());
        }
        Ok(Flow::Done(EvalResult::Void))
    }

    /// Push a destructor call for the next object in `instance.pending`
    pub(crate) fn next_pending_destructor(&self, program: &Program, instance: &mut Instance) -> Result<Option<Flow>> {
        let Some(object) = instance.pending.pop() else {
            return Ok(None);
        };
        let call = self
            .memory
            .object(object)
            .and_then(|o| o.ty.class_id())
            .and_then(|class| program.destructor_call(class))
            .ok_or_else(|| SimError::internal("pending object has no destructor"))?;
        Ok(Some(Flow::Push(Instance::new(call, instance.frame).with_dest(Some(object)))))
    }
}
