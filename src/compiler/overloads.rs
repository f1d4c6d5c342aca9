//! Overload resolution
//!
//! A candidate is viable when the argument count matches, a const receiver
//! only meets const member functions, and every argument can initialize its
//! parameter:
//! - reference parameters bind directly to reference-compatible lvalues, and
//!   const references also accept anything convertible to the referred type
//! - class parameters accept the same class or a class derived from it
//! - everything else needs a standard conversion sequence
//!
//! Viable candidates are ranked by the total length of their conversion
//! sequences; ties go to the candidate declared first. When nothing is
//! viable the first candidate is still reported so the call site can be
//! compiled against it and report the real mismatch.

use super::conversions::standard_conversion;
use super::ValueCategory;
use crate::entities::{EntityId, EntityTable};
use crate::types::{reference_compatible, ClassTable, Type};

/// What overload resolution needs to know about one argument
#[derive(Debug, Clone)]
pub struct ArgumentInfo {
    pub ty: Type,
    pub category: ValueCategory,
    pub is_null_constant: bool,
}

/// Outcome of resolving one call
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadResolution {
    /// Best viable candidate, or the first candidate if none is viable
    pub selected: Option<EntityId>,
    pub viable: bool,
    /// Why each rejected candidate was not viable
    pub rejections: Vec<(EntityId, String)>,
}

/// Resolve a call against `candidates` (in declaration order)
pub fn resolve_overload(
    candidates: &[EntityId],
    args: &[ArgumentInfo],
    receiver: Option<&Type>,
    entities: &EntityTable,
    classes: &ClassTable,
) -> OverloadResolution {
    let mut best: Option<(EntityId, usize)> = None;
    let mut rejections = Vec::new();

    for candidate in candidates {
        match candidate_cost(*candidate, args, receiver, entities, classes) {
            Ok(cost) => {
                if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                    best = Some((*candidate, cost));
                }
            }
            Err(reason) => rejections.push((*candidate, reason)),
        }
    }

    match best {
        Some((selected, _)) => OverloadResolution {
            selected: Some(selected),
            viable: true,
            rejections,
        },
        None => OverloadResolution {
            selected: candidates.first().copied(),
            viable: false,
            rejections,
        },
    }
}

/// Total conversion length for a viable candidate, or why it is not viable
fn candidate_cost(
    candidate: EntityId,
    args: &[ArgumentInfo],
    receiver: Option<&Type>,
    entities: &EntityTable,
    classes: &ClassTable,
) -> Result<usize, String> {
    let info = entities
        .function(candidate)
        .ok_or_else(|| "not a function".to_string())?;
    let params = &info.signature.param_types;

    if params.len() != args.len() {
        return Err(format!(
            "expects {} argument(s), but {} were provided",
            params.len(),
            args.len()
        ));
    }

    if let Some(receiver) = receiver {
        if info.is_member() && receiver.is_const() && !info.is_const_member() {
            return Err("cannot be called on a const object because it is not a const member function".to_string());
        }
    }

    let mut total = 0;
    for (index, (param, arg)) in params.iter().zip(args).enumerate() {
        let cost = argument_cost(param, arg, classes)
            .ok_or_else(|| format!("no known conversion from '{}' to '{}' for argument {}", arg.ty, param, index + 1))?;
        total += cost;
    }
    Ok(total)
}

fn argument_cost(param: &Type, arg: &ArgumentInfo, classes: &ClassTable) -> Option<usize> {
    if let Some(referred) = param.referred() {
        if arg.category == ValueCategory::LValue && reference_compatible(referred, &arg.ty, classes) {
            return Some(0);
        }
        if !referred.is_const() {
            return None;
        }
        // const T& also binds to a temporary holding the converted value
        if referred.is_class() {
            return class_argument(referred, &arg.ty, classes).then_some(0);
        }
        return standard_conversion(&arg.ty, arg.category, arg.is_null_constant, referred, classes)
            .map(|steps| steps.len());
    }

    if param.is_class() {
        return class_argument(param, &arg.ty, classes).then_some(0);
    }

    let steps = standard_conversion(&arg.ty, arg.category, arg.is_null_constant, param, classes)?;
    let result = steps.last().map_or_else(|| arg.ty.cv_unqualified(), |s| s.result.clone());
    result
        .cv_unqualified()
        .similar_type(&param.cv_unqualified())
        .then_some(steps.len())
}

fn class_argument(param: &Type, arg: &Type, classes: &ClassTable) -> bool {
    arg.is_class() && (arg.similar_type(param) || arg.sub_type(param, classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Entity, EntityKind, FunctionInfo, FunctionRole};
    use crate::parser::ast::SourceLocation;
    use crate::types::FunctionType;

    fn function(entities: &mut EntityTable, params: Vec<Type>, receiver: Option<Type>) -> EntityId {
        entities.add(Entity {
            name: "f".into(),
            qualified_name: "f".into(),
            kind: EntityKind::Function(FunctionInfo {
                signature: FunctionType {
                    return_type: Type::void(),
                    param_types: params,
                    receiver: receiver.clone(),
                },
                role: FunctionRole::Ordinary,
                class: receiver.and_then(|r| r.class_id()),
                intrinsic: None,
                is_implicit: false,
            }),
            location: SourceLocation::default(),
        })
    }

    fn lvalue(ty: Type) -> ArgumentInfo {
        ArgumentInfo {
            ty,
            category: ValueCategory::LValue,
            is_null_constant: false,
        }
    }

    fn prvalue(ty: Type) -> ArgumentInfo {
        ArgumentInfo {
            ty,
            category: ValueCategory::PRValue,
            is_null_constant: false,
        }
    }

    #[test]
    fn test_exact_match_beats_conversion() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let f_double = function(&mut entities, vec![Type::double()], None);
        let f_int = function(&mut entities, vec![Type::int()], None);

        let result = resolve_overload(&[f_double, f_int], &[prvalue(Type::int())], None, &entities, &classes);
        assert!(result.viable);
        assert_eq!(result.selected, Some(f_int));
    }

    #[test]
    fn test_ties_go_to_first_declared() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let f_double = function(&mut entities, vec![Type::double()], None);
        let f_float = function(&mut entities, vec![Type::float()], None);

        let args = [prvalue(Type::int())];
        let first = resolve_overload(&[f_double, f_float], &args, None, &entities, &classes);
        let again = resolve_overload(&[f_double, f_float], &args, None, &entities, &classes);
        assert_eq!(first.selected, Some(f_double));
        assert_eq!(first, again);
    }

    #[test]
    fn test_arity_mismatch_falls_back_to_first() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let f_one = function(&mut entities, vec![Type::int()], None);
        let f_two = function(&mut entities, vec![Type::int(), Type::int()], None);

        let result = resolve_overload(&[f_one, f_two], &[], None, &entities, &classes);
        assert!(!result.viable);
        assert_eq!(result.selected, Some(f_one));
        assert_eq!(result.rejections.len(), 2);
        assert!(result.rejections[0].1.contains("expects 1 argument"));
    }

    #[test]
    fn test_reference_parameters() {
        let mut entities = EntityTable::new();
        let classes = ClassTable::new();
        let by_ref = function(&mut entities, vec![Type::reference_to(Type::int())], None);
        let by_const_ref = function(&mut entities, vec![Type::reference_to(Type::int().const_qualified())], None);

        let temp = [prvalue(Type::int())];
        assert!(!resolve_overload(&[by_ref], &temp, None, &entities, &classes).viable);
        assert!(resolve_overload(&[by_const_ref], &temp, None, &entities, &classes).viable);

        let const_lvalue = [lvalue(Type::int().const_qualified())];
        assert!(!resolve_overload(&[by_ref], &const_lvalue, None, &entities, &classes).viable);
    }

    #[test]
    fn test_const_receiver_needs_const_member() {
        let mut entities = EntityTable::new();
        let mut classes = ClassTable::new();
        let id = classes.declare("P");
        classes.define(id, None, vec![]);
        let class_type = classes.class_type(id);

        let mutator = function(&mut entities, vec![], Some(class_type.clone()));
        let reader = function(&mut entities, vec![], Some(class_type.const_qualified()));

        let receiver = class_type.const_qualified();
        let result = resolve_overload(&[mutator, reader], &[], Some(&receiver), &entities, &classes);
        assert_eq!(result.selected, Some(reader));
        assert!(!resolve_overload(&[mutator], &[], Some(&receiver), &entities, &classes).viable);
    }

    #[test]
    fn test_class_argument_accepts_derived() {
        let mut entities = EntityTable::new();
        let mut classes = ClassTable::new();
        let base = classes.declare("Base");
        let derived = classes.declare("Derived");
        classes.define(base, None, vec![]);
        classes.define(derived, Some(base), vec![]);

        let takes_base = function(&mut entities, vec![classes.class_type(base)], None);
        let args = [lvalue(classes.class_type(derived))];
        assert!(resolve_overload(&[takes_base], &args, None, &entities, &classes).viable);
    }
}
