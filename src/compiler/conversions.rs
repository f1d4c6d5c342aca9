//! Standard conversion sequences
//!
//! A standard conversion sequence is computed in a fixed order:
//!
//! ```text
//! lvalue-to-rvalue | array-to-pointer  →  type conversion  →  qualification
//! ```
//!
//! [`standard_conversion`] only plans the sequence (overload resolution uses
//! it to rank candidates). The builders on [`Compiler`] realize a plan as a
//! chain of `ImplicitConversion` constructs, each wrapping the previous one
//! and recording the length of the chain so far.

use super::{Compiler, ConstructId, ConstructKind, ConversionKind, Literal, ValueCategory};
use crate::parser::ast::BinOp;
use crate::types::{AtomicKind, ClassTable, Type};

/// One planned conversion and the type it produces
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionStep {
    pub kind: ConversionKind,
    pub result: Type,
}

impl ConversionStep {
    fn new(kind: ConversionKind, result: Type) -> Self {
        ConversionStep { kind, result }
    }
}

/// Plan the standard conversion sequence from an expression of type `from`
/// and value category `category` into a prvalue of type `to`.
///
/// `is_null_constant` marks `nullptr` and the integer literal `0`.
/// Returns `None` when no sequence exists; an empty plan means the
/// expression is already a prvalue of the destination type.
pub fn standard_conversion(
    from: &Type,
    category: ValueCategory,
    is_null_constant: bool,
    to: &Type,
    classes: &ClassTable,
) -> Option<Vec<ConversionStep>> {
    if !to.is_atomic() || !(from.is_atomic() || from.is_array()) {
        return None;
    }

    let mut steps = Vec::new();
    let mut current = from.clone();

    if current.is_array() {
        current = current.decayed()?;
        steps.push(ConversionStep::new(ConversionKind::ArrayToPointer, current.clone()));
    } else if category != ValueCategory::PRValue {
        current = current.cv_unqualified();
        steps.push(ConversionStep::new(ConversionKind::LValueToRValue, current.clone()));
    }

    // prvalues of non-class type carry no top-level cv
    let current = current.cv_unqualified();
    let target = to.cv_unqualified();

    let current = match type_conversion(&current, is_null_constant, &target, classes) {
        Some(step) => {
            let result = step.result.clone();
            steps.push(step);
            result
        }
        None => current,
    };

    if current.same_type(&target) {
        return Some(steps);
    }
    if current.similar_type(&target) && qualification_convertible(&current, &target) {
        steps.push(ConversionStep::new(ConversionKind::Qualification, target));
        return Some(steps);
    }
    None
}

fn type_conversion(from: &Type, is_null_constant: bool, to: &Type, classes: &ClassTable) -> Option<ConversionStep> {
    if from.similar_type(to) {
        return None;
    }
    if to.is_pointer() && is_null_constant {
        return Some(ConversionStep::new(ConversionKind::NullPointer, to.clone()));
    }

    match (from, to) {
        (Type::Pointer { pointee: derived, .. }, Type::Pointer { pointee: base, .. })
            if derived.sub_type(base, classes) =>
        {
            let result = Type::pointer_to(base.with_cv(derived.cv()));
            Some(ConversionStep::new(ConversionKind::DerivedToBasePointer, result))
        }
        (Type::Pointer { .. }, _) if to.is_bool() => Some(ConversionStep::new(ConversionKind::PointerToBoolean, Type::bool())),
        (Type::Atomic { kind: from_kind, .. }, Type::Atomic { kind: to_kind, .. }) => {
            let kind = match (*from_kind, *to_kind) {
                (AtomicKind::Float, AtomicKind::Double) => ConversionKind::FloatingPromotion,
                (AtomicKind::Char | AtomicKind::Bool, AtomicKind::Int) => ConversionKind::IntegralPromotion,
                (f, t) if f.is_integral() && t.is_integral() => ConversionKind::IntegralConversion,
                (f, t) if f.is_floating() && t.is_integral() => ConversionKind::FloatingToIntegral,
                (f, t) if f.is_integral() && t.is_floating() => ConversionKind::IntegralToFloating,
                _ => ConversionKind::FloatingConversion,
            };
            Some(ConversionStep::new(kind, to.clone()))
        }
        _ => None,
    }
}

/// Qualification conversion between similar pointer types: every level may
/// only gain qualifiers, and a level that gains one needs `const` on every
/// level above it.
fn qualification_convertible(from: &Type, to: &Type) -> bool {
    let (mut a, mut b) = (from, to);
    let mut const_above = true;
    while let (Some(pa), Some(pb)) = (a.pointee(), b.pointee()) {
        if !pb.cv().is_at_least(pa.cv()) {
            return false;
        }
        if pb.cv() != pa.cv() && !const_above {
            return false;
        }
        const_above = const_above && pb.is_const();
        a = pa;
        b = pb;
    }
    true
}

impl Compiler<'_> {
    /// `nullptr` or the integer literal `0`
    pub(crate) fn is_null_constant(&self, expr: ConstructId) -> bool {
        match self.kind(expr) {
            Some(ConstructKind::NullptrLiteral) => true,
            Some(ConstructKind::NumericLiteral(Literal::Int(0))) => self.ty(expr).is_some_and(|t| t.is_integral()),
            _ => false,
        }
    }

    pub(crate) fn conversion_length(&self, expr: ConstructId) -> usize {
        match self.kind(expr) {
            Some(ConstructKind::ImplicitConversion { length, .. }) => *length,
            _ => 0,
        }
    }

    fn wrap_conversion(&mut self, from: ConstructId, kind: ConversionKind, result: Type) -> ConstructId {
        let length = self.conversion_length(from) + 1;
        let location = self.program.constructs.location(from);
        let source_type = self.ty(from);

        let id = self.add(
            ConstructKind::ImplicitConversion {
                conversion: kind,
                from,
                length,
            },
            location,
        );
        self.attach(id, &[from]);
        self.set_type(id, result.clone(), ValueCategory::PRValue);

        match kind {
            ConversionKind::FloatingToIntegral if source_type.as_ref().is_some_and(|t| t.is_narrowing_to(&result)) => {
                let from_name = source_type.map(|t| t.to_string()).unwrap_or_default();
                self.warning(
                    id,
                    "conversion.narrowing",
                    format!("implicit conversion from '{}' to '{}' discards the fractional part", from_name, result),
                );
            }
            ConversionKind::IntegralToFloating if self.is_integer_division(from) => {
                self.warning(
                    id,
                    "conversion.integerDivision",
                    format!(
                        "result of integer division converted to '{}'; the fractional part was already lost",
                        result
                    ),
                );
            }
            _ => {}
        }
        id
    }

    fn is_integer_division(&self, expr: ConstructId) -> bool {
        matches!(self.kind(expr), Some(ConstructKind::Arithmetic { op: BinOp::Div, .. }))
            && self.ty(expr).is_some_and(|t| t.is_integral())
    }

    /// Materialize a prvalue: decay arrays, read lvalues of non-class type
    pub(crate) fn to_prvalue(&mut self, expr: ConstructId) -> ConstructId {
        let (Some(ty), Some(category)) = (self.ty(expr), self.category(expr)) else {
            return expr;
        };
        if let Some(pointer) = ty.decayed() {
            return self.wrap_conversion(expr, ConversionKind::ArrayToPointer, pointer);
        }
        if category != ValueCategory::PRValue && ty.is_atomic() {
            return self.wrap_conversion(expr, ConversionKind::LValueToRValue, ty.cv_unqualified());
        }
        expr
    }

    /// Apply the standard conversion sequence into `to`, or return `None`
    /// (leaving `expr` untouched) if there is none
    pub(crate) fn try_convert(&mut self, expr: ConstructId, to: &Type) -> Option<ConstructId> {
        let ty = self.ty(expr)?;
        let category = self.category(expr)?;
        let is_null = self.is_null_constant(expr);
        let steps = standard_conversion(&ty, category, is_null, to, &self.program.classes)?;

        let mut current = expr;
        for step in steps {
            current = self.wrap_conversion(current, step.kind, step.result);
        }
        Some(current)
    }

    /// Convert `expr` into `to`, attaching an error to `expr` if impossible
    pub(crate) fn convert(&mut self, expr: ConstructId, to: &Type, context: &str) -> ConstructId {
        if !self.well_typed(expr) {
            return expr;
        }
        if let Some(converted) = self.try_convert(expr, to) {
            return converted;
        }
        let from = self.ty(expr).map(|t| t.to_string()).unwrap_or_default();
        self.error(
            expr,
            "conversion.none",
            format!("cannot convert '{}' to '{}' in {}", from, to, context),
        );
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(steps: Option<Vec<ConversionStep>>) -> Option<Vec<ConversionKind>> {
        steps.map(|s| s.into_iter().map(|step| step.kind).collect())
    }

    #[test]
    fn test_lvalue_int_to_double() {
        let classes = ClassTable::new();
        let plan = standard_conversion(&Type::int(), ValueCategory::LValue, false, &Type::double(), &classes);
        assert_eq!(
            kinds(plan),
            Some(vec![ConversionKind::LValueToRValue, ConversionKind::IntegralToFloating])
        );
    }

    #[test]
    fn test_prvalue_of_destination_type_needs_nothing() {
        let classes = ClassTable::new();
        for to in [Type::int(), Type::int().const_qualified()] {
            let plan = standard_conversion(&Type::int(), ValueCategory::PRValue, false, &to, &classes);
            assert_eq!(kinds(plan), Some(vec![]));
        }
    }

    #[test]
    fn test_array_decay_and_qualification() {
        let classes = ClassTable::new();
        let arr = Type::array_of(Type::char(), 4);
        let to = Type::pointer_to(Type::char().const_qualified());
        let plan = standard_conversion(&arr, ValueCategory::LValue, false, &to, &classes);
        assert_eq!(
            kinds(plan),
            Some(vec![ConversionKind::ArrayToPointer, ConversionKind::Qualification])
        );
    }

    #[test]
    fn test_null_pointer_and_pointer_to_bool() {
        let classes = ClassTable::new();
        let int_ptr = Type::pointer_to(Type::int());
        let plan = standard_conversion(&Type::int(), ValueCategory::PRValue, true, &int_ptr, &classes);
        assert_eq!(kinds(plan), Some(vec![ConversionKind::NullPointer]));

        let plan = standard_conversion(&Type::int(), ValueCategory::PRValue, false, &int_ptr, &classes);
        assert_eq!(kinds(plan), None);

        let plan = standard_conversion(&int_ptr, ValueCategory::LValue, false, &Type::bool(), &classes);
        assert_eq!(
            kinds(plan),
            Some(vec![ConversionKind::LValueToRValue, ConversionKind::PointerToBoolean])
        );
    }

    #[test]
    fn test_derived_to_base_pointer() {
        let mut classes = ClassTable::new();
        let base = classes.declare("Base");
        let derived = classes.declare("Derived");
        classes.define(base, None, vec![]);
        classes.define(derived, Some(base), vec![]);

        let from = Type::pointer_to(classes.class_type(derived));
        let to = Type::pointer_to(classes.class_type(base));
        let plan = standard_conversion(&from, ValueCategory::PRValue, false, &to, &classes);
        assert_eq!(kinds(plan), Some(vec![ConversionKind::DerivedToBasePointer]));
        let back = standard_conversion(&to, ValueCategory::PRValue, false, &from, &classes);
        assert_eq!(kinds(back), None);
    }

    #[test]
    fn test_unsafe_multilevel_qualification_is_rejected() {
        let classes = ClassTable::new();
        let from = Type::pointer_to(Type::pointer_to(Type::char()));
        let unsafe_to = Type::pointer_to(Type::pointer_to(Type::char().const_qualified()));
        let safe_to = Type::pointer_to(Type::pointer_to(Type::char().const_qualified()).const_qualified());
        assert!(standard_conversion(&from, ValueCategory::PRValue, false, &unsafe_to, &classes).is_none());
        assert!(standard_conversion(&from, ValueCategory::PRValue, false, &safe_to, &classes).is_some());
    }

    #[test]
    fn test_arithmetic_step_kinds() {
        let classes = ClassTable::new();
        let cases = [
            (Type::float(), Type::double(), ConversionKind::FloatingPromotion),
            (Type::char(), Type::int(), ConversionKind::IntegralPromotion),
            (Type::int(), Type::char(), ConversionKind::IntegralConversion),
            (Type::double(), Type::int(), ConversionKind::FloatingToIntegral),
            (Type::double(), Type::float(), ConversionKind::FloatingConversion),
            (Type::int(), Type::bool(), ConversionKind::IntegralConversion),
        ];
        for (from, to, expected) in cases {
            let plan = standard_conversion(&from, ValueCategory::PRValue, false, &to, &classes);
            assert_eq!(kinds(plan), Some(vec![expected]), "{} -> {}", from, to);
        }
    }
}
