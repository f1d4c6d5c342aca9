//! Type system
//!
//! Immutable [`Type`] values and the relations the compiler needs:
//! - [`Type::same_type`]: identical including cv-qualification
//! - [`Type::similar_type`]: identical once cv-qualification is ignored at every level
//! - [`Type::sub_type`]: class derivation, by walking the base-class chain
//! - [`reference_compatible`]: whether a reference to one type may bind to another
//!
//! cv-qualification is applied by producing a new value ([`Type::with_cv`],
//! [`Type::const_qualified`]), never by mutating an existing one.
//!
//! # Type Sizes
//!
//! Sizes are fixed and platform independent:
//! - `char`, `bool`: 1 byte
//! - `int`, `float`: 4 bytes
//! - `double`, pointers: 8 bytes
//! - classes: base subobject followed by members, no padding

pub mod class;

pub use class::{ClassId, ClassInfo, ClassTable, MemberInfo};

use std::fmt;

/// const/volatile qualification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cv {
    pub is_const: bool,
    pub is_volatile: bool,
}

impl Cv {
    pub const NONE: Cv = Cv {
        is_const: false,
        is_volatile: false,
    };

    pub const CONST: Cv = Cv {
        is_const: true,
        is_volatile: false,
    };

    /// Whether `self` carries every qualifier of `other`
    pub fn is_at_least(self, other: Cv) -> bool {
        (self.is_const || !other.is_const) && (self.is_volatile || !other.is_volatile)
    }

    pub fn union(self, other: Cv) -> Cv {
        Cv {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
        }
    }
}

/// Scalar types that fit in one atomic object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicKind {
    Char,
    Int,
    Bool,
    Float,
    Double,
}

impl AtomicKind {
    pub fn is_integral(self) -> bool {
        matches!(self, AtomicKind::Char | AtomicKind::Int | AtomicKind::Bool)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, AtomicKind::Float | AtomicKind::Double)
    }

    pub fn size(self) -> u64 {
        match self {
            AtomicKind::Char | AtomicKind::Bool => 1,
            AtomicKind::Int | AtomicKind::Float => 4,
            AtomicKind::Double => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AtomicKind::Char => "char",
            AtomicKind::Int => "int",
            AtomicKind::Bool => "bool",
            AtomicKind::Float => "float",
            AtomicKind::Double => "double",
        }
    }
}

/// Size of every pointer value in bytes
pub const POINTER_SIZE: u64 = 8;

/// Signature of a function type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub return_type: Type,
    pub param_types: Vec<Type>,
    /// Class type of the implicit object parameter, cv-qualified for const members
    pub receiver: Option<Type>,
}

impl FunctionType {
    /// Whether two signatures declare the same function (same parameter types,
    /// ignoring top-level cv of each parameter, and same receiver)
    pub fn same_signature(&self, other: &FunctionType) -> bool {
        self.param_types.len() == other.param_types.len()
            && self
                .param_types
                .iter()
                .zip(&other.param_types)
                .all(|(a, b)| a.cv_unqualified().same_type(&b.cv_unqualified()))
            && self.receiver == other.receiver
    }
}

/// A type value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Atomic { kind: AtomicKind, cv: Cv },
    Pointer { pointee: Box<Type>, cv: Cv },
    Reference(Box<Type>),
    BoundedArray { elem: Box<Type>, length: u64 },
    ArrayOfUnknownBound { elem: Box<Type> },
    Class { id: ClassId, name: String, cv: Cv },
    Function(Box<FunctionType>),
    Void { cv: Cv },
}

impl Type {
    // ===== Producers =====

    pub fn atomic(kind: AtomicKind) -> Type {
        Type::Atomic { kind, cv: Cv::NONE }
    }

    pub fn int() -> Type {
        Type::atomic(AtomicKind::Int)
    }

    pub fn char() -> Type {
        Type::atomic(AtomicKind::Char)
    }

    pub fn bool() -> Type {
        Type::atomic(AtomicKind::Bool)
    }

    pub fn float() -> Type {
        Type::atomic(AtomicKind::Float)
    }

    pub fn double() -> Type {
        Type::atomic(AtomicKind::Double)
    }

    pub fn void() -> Type {
        Type::Void { cv: Cv::NONE }
    }

    pub fn pointer_to(pointee: Type) -> Type {
        Type::Pointer {
            pointee: Box::new(pointee),
            cv: Cv::NONE,
        }
    }

    pub fn reference_to(referred: Type) -> Type {
        Type::Reference(Box::new(referred))
    }

    pub fn array_of(elem: Type, length: u64) -> Type {
        Type::BoundedArray {
            elem: Box::new(elem),
            length,
        }
    }

    pub fn class(id: ClassId, name: impl Into<String>) -> Type {
        Type::Class {
            id,
            name: name.into(),
            cv: Cv::NONE,
        }
    }

    pub fn function(return_type: Type, param_types: Vec<Type>, receiver: Option<Type>) -> Type {
        Type::Function(Box::new(FunctionType {
            return_type,
            param_types,
            receiver,
        }))
    }

    // ===== cv-qualification =====

    /// Top-level cv-qualification (arrays report their element's)
    pub fn cv(&self) -> Cv {
        match self {
            Type::Atomic { cv, .. } | Type::Pointer { cv, .. } | Type::Class { cv, .. } | Type::Void { cv } => *cv,
            Type::BoundedArray { elem, .. } | Type::ArrayOfUnknownBound { elem } => elem.cv(),
            Type::Reference(_) | Type::Function(_) => Cv::NONE,
        }
    }

    pub fn is_const(&self) -> bool {
        self.cv().is_const
    }

    /// A copy of this type with the given top-level cv-qualification.
    /// References and functions cannot be cv-qualified and are returned as is.
    pub fn with_cv(&self, new_cv: Cv) -> Type {
        match self {
            Type::Atomic { kind, .. } => Type::Atomic { kind: *kind, cv: new_cv },
            Type::Pointer { pointee, .. } => Type::Pointer {
                pointee: pointee.clone(),
                cv: new_cv,
            },
            Type::Class { id, name, .. } => Type::Class {
                id: *id,
                name: name.clone(),
                cv: new_cv,
            },
            Type::Void { .. } => Type::Void { cv: new_cv },
            Type::BoundedArray { elem, length } => Type::BoundedArray {
                elem: Box::new(elem.with_cv(new_cv)),
                length: *length,
            },
            Type::ArrayOfUnknownBound { elem } => Type::ArrayOfUnknownBound {
                elem: Box::new(elem.with_cv(new_cv)),
            },
            Type::Reference(_) | Type::Function(_) => self.clone(),
        }
    }

    pub fn const_qualified(&self) -> Type {
        self.with_cv(self.cv().union(Cv::CONST))
    }

    pub fn cv_unqualified(&self) -> Type {
        self.with_cv(Cv::NONE)
    }

    /// Strip cv-qualification at every level of the type
    fn cv_stripped_deep(&self) -> Type {
        match self {
            Type::Pointer { pointee, .. } => Type::pointer_to(pointee.cv_stripped_deep()),
            Type::Reference(referred) => Type::reference_to(referred.cv_stripped_deep()),
            Type::BoundedArray { elem, length } => Type::array_of(elem.cv_stripped_deep(), *length),
            Type::ArrayOfUnknownBound { elem } => Type::ArrayOfUnknownBound {
                elem: Box::new(elem.cv_stripped_deep()),
            },
            Type::Function(f) => Type::function(
                f.return_type.cv_stripped_deep(),
                f.param_types.iter().map(Type::cv_stripped_deep).collect(),
                f.receiver.as_ref().map(Type::cv_stripped_deep),
            ),
            other => other.cv_unqualified(),
        }
    }

    // ===== Equality tiers =====

    /// Identical, including cv-qualification
    pub fn same_type(&self, other: &Type) -> bool {
        self == other
    }

    /// Identical once cv-qualification is ignored at every level
    pub fn similar_type(&self, other: &Type) -> bool {
        self.cv_stripped_deep() == other.cv_stripped_deep()
    }

    /// Whether `self` is a class type derived (directly or indirectly) from `other`
    pub fn sub_type(&self, other: &Type, classes: &ClassTable) -> bool {
        match (self, other) {
            (Type::Class { id: derived, .. }, Type::Class { id: base, .. }) => {
                classes.is_derived_from(*derived, *base)
            }
            _ => false,
        }
    }

    // ===== Classification predicates =====

    pub fn is_atomic(&self) -> bool {
        matches!(self, Type::Atomic { .. } | Type::Pointer { .. })
    }

    /// Arithmetic types: the atomic kinds (not pointers)
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Type::Atomic { .. })
    }

    pub fn atomic_kind(&self) -> Option<AtomicKind> {
        match self {
            Type::Atomic { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        self.atomic_kind().is_some_and(AtomicKind::is_integral)
    }

    pub fn is_floating(&self) -> bool {
        self.atomic_kind().is_some_and(AtomicKind::is_floating)
    }

    pub fn is_bool(&self) -> bool {
        self.atomic_kind() == Some(AtomicKind::Bool)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::BoundedArray { .. } | Type::ArrayOfUnknownBound { .. })
    }

    pub fn is_bounded_array(&self) -> bool {
        matches!(self, Type::BoundedArray { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Type::Class { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            Type::Class { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Pointed-to type of a pointer
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer { pointee, .. } => Some(pointee),
            _ => None,
        }
    }

    /// Referred-to type of a reference
    pub fn referred(&self) -> Option<&Type> {
        match self {
            Type::Reference(referred) => Some(referred),
            _ => None,
        }
    }

    /// Element type of an array
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::BoundedArray { elem, .. } | Type::ArrayOfUnknownBound { elem } => Some(elem),
            _ => None,
        }
    }

    pub fn array_length(&self) -> Option<u64> {
        match self {
            Type::BoundedArray { length, .. } => Some(*length),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Object types are everything but references, functions and void
    pub fn is_object_type(&self) -> bool {
        !matches!(self, Type::Reference(_) | Type::Function(_) | Type::Void { .. })
    }

    /// Object types whose size is known: excludes unknown-bound arrays
    /// and incomplete classes
    pub fn is_complete_object_type(&self, classes: &ClassTable) -> bool {
        match self {
            Type::Atomic { .. } | Type::Pointer { .. } => true,
            Type::BoundedArray { elem, .. } => elem.is_complete_object_type(classes),
            Type::Class { id, .. } => classes.get(*id).is_some_and(|c| c.is_complete),
            Type::ArrayOfUnknownBound { .. } | Type::Reference(_) | Type::Function(_) | Type::Void { .. } => false,
        }
    }

    /// Type of the prvalue an array decays to
    pub fn decayed(&self) -> Option<Type> {
        self.element().map(|elem| Type::pointer_to(elem.clone()))
    }

    /// Size of an object of this type in bytes
    pub fn size(&self, classes: &ClassTable) -> u64 {
        match self {
            Type::Atomic { kind, .. } => kind.size(),
            Type::Pointer { .. } => POINTER_SIZE,
            Type::BoundedArray { elem, length } => elem.size(classes) * length,
            Type::Class { id, .. } => classes.get(*id).map_or(0, |c| c.size),
            Type::ArrayOfUnknownBound { .. } | Type::Reference(_) | Type::Function(_) | Type::Void { .. } => 0,
        }
    }

    /// Whether a conversion from `self` into `to` can lose information
    /// (floating to integral, or into a narrower integral type)
    pub fn is_narrowing_to(&self, to: &Type) -> bool {
        match (self.atomic_kind(), to.atomic_kind()) {
            (Some(from), Some(to)) => {
                (from.is_floating() && to.is_integral() && to != AtomicKind::Bool)
                    || (from == AtomicKind::Double && to == AtomicKind::Float)
                    || (from.is_integral() && to.is_integral() && to != AtomicKind::Bool && to.size() < from.size())
            }
            _ => false,
        }
    }
}

/// Whether a reference to `referred` can bind directly to an lvalue of type `init`:
/// the types are similar or `init` derives from `referred`, and `referred`
/// is at least as cv-qualified as `init`.
pub fn reference_compatible(referred: &Type, init: &Type, classes: &ClassTable) -> bool {
    (referred.similar_type(init) || init.sub_type(referred, classes)) && referred.cv().is_at_least(init.cv())
}

/// Result type of the usual arithmetic conversions on two arithmetic operands
pub fn usual_arithmetic_conversion(left: AtomicKind, right: AtomicKind) -> AtomicKind {
    if left == AtomicKind::Double || right == AtomicKind::Double {
        AtomicKind::Double
    } else if left == AtomicKind::Float || right == AtomicKind::Float {
        AtomicKind::Float
    } else {
        AtomicKind::Int
    }
}

/// Integral promotion: bool and char promote to int
pub fn integral_promotion(kind: AtomicKind) -> AtomicKind {
    match kind {
        AtomicKind::Bool | AtomicKind::Char => AtomicKind::Int,
        other => other,
    }
}

impl fmt::Display for Cv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_const, self.is_volatile) {
            (true, true) => write!(f, "const volatile "),
            (true, false) => write!(f, "const "),
            (false, true) => write!(f, "volatile "),
            (false, false) => Ok(()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Atomic { kind, cv } => write!(f, "{}{}", cv, kind.name()),
            Type::Void { cv } => write!(f, "{}void", cv),
            Type::Class { name, cv, .. } => write!(f, "{}{}", cv, name),
            Type::Pointer { pointee, cv } => {
                write!(f, "{}*", pointee)?;
                if cv.is_const {
                    write!(f, " const")?;
                }
                Ok(())
            }
            Type::Reference(referred) => write!(f, "{}&", referred),
            Type::BoundedArray { elem, length } => write!(f, "{}[{}]", elem, length),
            Type::ArrayOfUnknownBound { elem } => write!(f, "{}[]", elem),
            Type::Function(func) => {
                write!(f, "{}(", func.return_type)?;
                for (i, param) in func.param_types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")?;
                if func.receiver.as_ref().is_some_and(Type::is_const) {
                    write!(f, " const")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_types() -> Vec<Type> {
        vec![
            Type::int(),
            Type::int().const_qualified(),
            Type::pointer_to(Type::char().const_qualified()),
            Type::pointer_to(Type::char()),
            Type::array_of(Type::double(), 3),
            Type::reference_to(Type::int()),
            Type::void(),
        ]
    }

    #[test]
    fn test_equality_tiers_are_consistent() {
        let types = sample_types();
        for a in &types {
            assert!(a.same_type(a));
            assert!(a.similar_type(a));
            for b in &types {
                assert_eq!(a.similar_type(b), b.similar_type(a));
                if a.same_type(b) {
                    assert!(a.similar_type(b));
                }
            }
        }
    }

    #[test]
    fn test_cv_producers_do_not_mutate() {
        let plain = Type::int();
        let constant = plain.const_qualified();
        assert!(!plain.is_const());
        assert!(constant.is_const());
        assert!(!constant.same_type(&plain));
        assert!(constant.similar_type(&plain));
        assert!(constant.cv_unqualified().same_type(&plain));
    }

    #[test]
    fn test_array_cv_lives_on_element() {
        let arr = Type::array_of(Type::int(), 4).const_qualified();
        assert!(arr.is_const());
        assert!(arr.element().is_some_and(Type::is_const));
    }

    #[test]
    fn test_sizes() {
        let classes = ClassTable::new();
        assert_eq!(Type::char().size(&classes), 1);
        assert_eq!(Type::int().size(&classes), 4);
        assert_eq!(Type::double().size(&classes), 8);
        assert_eq!(Type::pointer_to(Type::char()).size(&classes), 8);
        assert_eq!(Type::array_of(Type::array_of(Type::int(), 3), 2).size(&classes), 24);
    }

    #[test]
    fn test_sub_type_walks_base_chain() {
        let mut classes = ClassTable::new();
        let a = classes.declare("A");
        let b = classes.declare("B");
        let c = classes.declare("C");
        classes.define(a, None, vec![("x".into(), Type::int())]);
        classes.define(b, Some(a), vec![]);
        classes.define(c, Some(b), vec![("y".into(), Type::double())]);

        let ta = Type::class(a, "A");
        let tc = Type::class(c, "C");
        assert!(tc.sub_type(&ta, &classes));
        assert!(!ta.sub_type(&tc, &classes));
        assert!(!ta.sub_type(&ta, &classes));
        assert_eq!(tc.size(&classes), 12);
    }

    #[test]
    fn test_reference_compatibility() {
        let classes = ClassTable::new();
        assert!(reference_compatible(&Type::int().const_qualified(), &Type::int(), &classes));
        assert!(!reference_compatible(&Type::int(), &Type::int().const_qualified(), &classes));
        assert!(!reference_compatible(&Type::int(), &Type::double(), &classes));
    }

    #[test]
    fn test_display() {
        let t = Type::pointer_to(Type::char().const_qualified()).const_qualified();
        assert_eq!(t.to_string(), "const char* const");
        assert_eq!(Type::array_of(Type::int(), 3).to_string(), "int[3]");
        assert_eq!(Type::reference_to(Type::double()).to_string(), "double&");
    }

    #[test]
    fn test_usual_arithmetic_conversions() {
        assert_eq!(usual_arithmetic_conversion(AtomicKind::Int, AtomicKind::Double), AtomicKind::Double);
        assert_eq!(usual_arithmetic_conversion(AtomicKind::Float, AtomicKind::Int), AtomicKind::Float);
        assert_eq!(usual_arithmetic_conversion(AtomicKind::Char, AtomicKind::Bool), AtomicKind::Int);
    }
}
