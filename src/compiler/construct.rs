//! Construct arena
//!
//! A compiled program is a tree of [`Construct`]s stored in a [`ConstructArena`]
//! and addressed by [`ConstructId`]. Each node owns its children (by index) and
//! keeps a non-owning index of its parent.
//!
//! A construct carries a result type and value category only if it compiled
//! successfully; otherwise both stay `None` and the failure is described by
//! the [`Note`]s attached to it or its descendants.

use std::fmt;

use crate::entities::EntityId;
use crate::parser::ast::{BinOp, SourceLocation, UnOp};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstructId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    LValue,
    PRValue,
    XValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A compile-time diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub severity: Severity,
    /// Stable identifier of the rule that produced the note
    pub id: &'static str,
    pub message: String,
    pub location: SourceLocation,
}

impl Note {
    pub fn error(id: &'static str, message: impl Into<String>, location: SourceLocation) -> Self {
        Note {
            severity: Severity::Error,
            id,
            message: message.into(),
            location,
        }
    }

    pub fn warning(id: &'static str, message: impl Into<String>, location: SourceLocation) -> Self {
        Note {
            severity: Severity::Warning,
            id,
            message: message.into(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{} at {}: {}", label, self.location, self.message)
    }
}

/// Steps of a standard conversion sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    LValueToRValue,
    ArrayToPointer,
    NullPointer,
    DerivedToBasePointer,
    PointerToBoolean,
    FloatingPromotion,
    IntegralPromotion,
    IntegralConversion,
    FloatingConversion,
    FloatingToIntegral,
    IntegralToFloating,
    Qualification,
}

impl ConversionKind {
    pub fn describe(self) -> &'static str {
        match self {
            ConversionKind::LValueToRValue => "lvalue-to-rvalue",
            ConversionKind::ArrayToPointer => "array-to-pointer",
            ConversionKind::NullPointer => "null pointer",
            ConversionKind::DerivedToBasePointer => "derived-to-base pointer",
            ConversionKind::PointerToBoolean => "pointer-to-boolean",
            ConversionKind::FloatingPromotion => "floating promotion",
            ConversionKind::IntegralPromotion => "integral promotion",
            ConversionKind::IntegralConversion => "integral conversion",
            ConversionKind::FloatingConversion => "floating conversion",
            ConversionKind::FloatingToIntegral => "floating-to-integral",
            ConversionKind::IntegralToFloating => "integral-to-floating",
            ConversionKind::Qualification => "qualification",
        }
    }
}

/// Value of a numeric literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    Default,
    Value,
    Copy,
    Direct,
    List,
}

/// The object an initializer initializes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitTarget {
    /// A named variable or reference
    Entity(EntityId),
    /// Parameter `i` of the function being called
    Parameter(usize),
    /// The return object of the enclosing function call
    ReturnValue,
    /// The object created by the enclosing `new`
    NewObject,
    /// A temporary object owned by the enclosing full expression
    Temporary,
    /// Element or member `i` of the enclosing initializer's object
    Subobject(usize),
    /// Base subobject of the enclosing initializer's object
    BaseSubobject,
    /// Member `i` of `*this` (constructor initializer lists)
    Member(usize),
    /// Base subobject of `*this` (constructor initializer lists)
    Base,
}

/// What an initializer does at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum InitAction {
    /// Leave the object with an indeterminate value
    None,
    /// Write zero into every atomic subobject
    ZeroFill,
    /// Write the (already converted) value of `arg`
    Atomic { arg: ConstructId },
    /// Initialize array elements; remaining elements are zeroed when `zero_rest`
    Aggregate { elements: Vec<ConstructId>, zero_rest: bool },
    /// Copy a string literal's characters into a char array
    StringArray { text: String },
    /// Call a user-declared constructor
    Constructor { ctor: EntityId, args: Vec<ConstructId> },
    /// Implicit copy constructor: memberwise copy from `arg`
    ClassCopy { arg: ConstructId },
    /// Implicit default constructor: initialize base and members in order
    ClassMembers {
        base: Option<ConstructId>,
        members: Vec<ConstructId>,
    },
    /// Bind a reference; `materialize` copies a prvalue into a temporary first
    Bind { arg: ConstructId, materialize: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstructKind {
    // ===== Expressions =====
    NumericLiteral(Literal),
    StringLiteral(String),
    NullptrLiteral,
    Identifier(EntityId),
    This,
    ImplicitConversion {
        conversion: ConversionKind,
        from: ConstructId,
        /// Number of conversions in the chain up to and including this one
        length: usize,
    },
    Arithmetic {
        op: BinOp,
        left: ConstructId,
        right: ConstructId,
    },
    Relational {
        op: BinOp,
        left: ConstructId,
        right: ConstructId,
    },
    PointerComparison {
        op: BinOp,
        left: ConstructId,
        right: ConstructId,
    },
    PointerOffset {
        op: BinOp,
        pointer: ConstructId,
        offset: ConstructId,
    },
    PointerDifference {
        left: ConstructId,
        right: ConstructId,
    },
    Logical {
        op: BinOp,
        left: ConstructId,
        right: ConstructId,
    },
    LogicalNot {
        operand: ConstructId,
    },
    UnaryArithmetic {
        op: UnOp,
        operand: ConstructId,
    },
    Dereference {
        operand: ConstructId,
    },
    AddressOf {
        operand: ConstructId,
    },
    IncDec {
        op: UnOp,
        operand: ConstructId,
    },
    Assignment {
        lhs: ConstructId,
        rhs: ConstructId,
    },
    /// Implicit copy assignment of class objects
    ClassAssignment {
        lhs: ConstructId,
        rhs: ConstructId,
    },
    CompoundAssignment {
        op: BinOp,
        lhs: ConstructId,
        rhs: ConstructId,
    },
    Ternary {
        condition: ConstructId,
        then_expr: ConstructId,
        else_expr: ConstructId,
    },
    Comma {
        left: ConstructId,
        right: ConstructId,
    },
    Subscript {
        pointer: ConstructId,
        index: ConstructId,
    },
    /// Data member access on a class lvalue; `base_hops` base subobjects are
    /// traversed before selecting member `index`
    MemberAccess {
        object: ConstructId,
        base_hops: usize,
        index: usize,
    },
    FunctionCall {
        function: EntityId,
        /// Object expression for member calls
        receiver: Option<ConstructId>,
        /// One parameter initializer per argument
        args: Vec<ConstructId>,
    },
    IntrinsicCall {
        function: EntityId,
        intrinsic: usize,
        args: Vec<ConstructId>,
    },
    OutputOperator {
        stream: ConstructId,
        operand: ConstructId,
    },
    InputOperator {
        stream: ConstructId,
        operand: ConstructId,
    },
    New {
        allocated: Type,
        init: Option<ConstructId>,
        length: Option<ConstructId>,
    },
    Delete {
        operand: ConstructId,
        is_array: bool,
    },
    /// A class prvalue created by an explicit constructor call, `Point(1, 2)`
    Temporary {
        init: ConstructId,
    },
    /// Placeholder for an expression that could not be compiled at all
    Invalid,

    // ===== Statements =====
    Block {
        statements: Vec<ConstructId>,
        /// Variables declared directly in this block, in declaration order
        locals: Vec<EntityId>,
    },
    ExpressionStatement {
        expr: ConstructId,
    },
    NullStatement,
    Declaration {
        definitions: Vec<ConstructId>,
    },
    VariableDefinition {
        entity: EntityId,
        init: Option<ConstructId>,
    },
    If {
        condition: ConstructId,
        then_branch: ConstructId,
        else_branch: Option<ConstructId>,
    },
    While {
        condition: ConstructId,
        body: ConstructId,
    },
    DoWhile {
        body: ConstructId,
        condition: ConstructId,
    },
    For {
        init: Option<ConstructId>,
        condition: Option<ConstructId>,
        increment: Option<ConstructId>,
        body: ConstructId,
        locals: Vec<EntityId>,
    },
    Break,
    Continue,
    Return {
        init: Option<ConstructId>,
    },

    // ===== Definitions and initialization =====
    FunctionDefinition {
        entity: EntityId,
        params: Vec<EntityId>,
        body: ConstructId,
        /// Every automatic object of the function, parameters first
        locals: Vec<EntityId>,
        ctor_initializer: Option<ConstructId>,
    },
    CtorInitializer {
        base: Option<ConstructId>,
        members: Vec<ConstructId>,
    },
    DestructorCall {
        dtor: EntityId,
    },
    Initializer {
        kind: InitKind,
        target: InitTarget,
        action: InitAction,
    },
}

impl ConstructKind {
    pub fn is_expression(&self) -> bool {
        !matches!(
            self,
            ConstructKind::Block { .. }
                | ConstructKind::ExpressionStatement { .. }
                | ConstructKind::NullStatement
                | ConstructKind::Declaration { .. }
                | ConstructKind::VariableDefinition { .. }
                | ConstructKind::If { .. }
                | ConstructKind::While { .. }
                | ConstructKind::DoWhile { .. }
                | ConstructKind::For { .. }
                | ConstructKind::Break
                | ConstructKind::Continue
                | ConstructKind::Return { .. }
                | ConstructKind::FunctionDefinition { .. }
                | ConstructKind::CtorInitializer { .. }
                | ConstructKind::DestructorCall { .. }
                | ConstructKind::Initializer { .. }
        )
    }

    /// Short name used when displaying the instance stack
    pub fn label(&self) -> &'static str {
        match self {
            ConstructKind::NumericLiteral(_) => "numeric literal",
            ConstructKind::StringLiteral(_) => "string literal",
            ConstructKind::NullptrLiteral => "nullptr",
            ConstructKind::Identifier(_) => "identifier",
            ConstructKind::This => "this",
            ConstructKind::ImplicitConversion { .. } => "implicit conversion",
            ConstructKind::Arithmetic { .. } => "arithmetic",
            ConstructKind::Relational { .. } => "relational",
            ConstructKind::PointerComparison { .. } => "pointer comparison",
            ConstructKind::PointerOffset { .. } => "pointer offset",
            ConstructKind::PointerDifference { .. } => "pointer difference",
            ConstructKind::Logical { .. } => "logical",
            ConstructKind::LogicalNot { .. } => "logical not",
            ConstructKind::UnaryArithmetic { .. } => "unary arithmetic",
            ConstructKind::Dereference { .. } => "dereference",
            ConstructKind::AddressOf { .. } => "address-of",
            ConstructKind::IncDec { .. } => "increment/decrement",
            ConstructKind::Assignment { .. } => "assignment",
            ConstructKind::ClassAssignment { .. } => "class assignment",
            ConstructKind::CompoundAssignment { .. } => "compound assignment",
            ConstructKind::Ternary { .. } => "ternary",
            ConstructKind::Comma { .. } => "comma",
            ConstructKind::Subscript { .. } => "subscript",
            ConstructKind::MemberAccess { .. } => "member access",
            ConstructKind::FunctionCall { .. } => "function call",
            ConstructKind::IntrinsicCall { .. } => "library call",
            ConstructKind::OutputOperator { .. } => "output",
            ConstructKind::InputOperator { .. } => "input",
            ConstructKind::New { .. } => "new",
            ConstructKind::Delete { .. } => "delete",
            ConstructKind::Temporary { .. } => "temporary object",
            ConstructKind::Invalid => "invalid expression",
            ConstructKind::Block { .. } => "block",
            ConstructKind::ExpressionStatement { .. } => "expression statement",
            ConstructKind::NullStatement => "null statement",
            ConstructKind::Declaration { .. } => "declaration",
            ConstructKind::VariableDefinition { .. } => "variable definition",
            ConstructKind::If { .. } => "if",
            ConstructKind::While { .. } => "while",
            ConstructKind::DoWhile { .. } => "do-while",
            ConstructKind::For { .. } => "for",
            ConstructKind::Break => "break",
            ConstructKind::Continue => "continue",
            ConstructKind::Return { .. } => "return",
            ConstructKind::FunctionDefinition { .. } => "function definition",
            ConstructKind::CtorInitializer { .. } => "constructor initializer",
            ConstructKind::DestructorCall { .. } => "destructor call",
            ConstructKind::Initializer { .. } => "initializer",
        }
    }
}

/// One node of the compiled program tree
#[derive(Debug, Clone)]
pub struct Construct {
    pub kind: ConstructKind,
    pub parent: Option<ConstructId>,
    pub children: Vec<ConstructId>,
    pub ty: Option<Type>,
    pub category: Option<ValueCategory>,
    pub notes: Vec<Note>,
    pub location: SourceLocation,
    /// An error note exists somewhere in this subtree
    subtree_error: bool,
}

impl Construct {
    pub fn is_lvalue(&self) -> bool {
        self.category == Some(ValueCategory::LValue)
    }

    pub fn is_prvalue(&self) -> bool {
        self.category == Some(ValueCategory::PRValue)
    }
}

/// Arena owning every construct of a program
#[derive(Debug, Clone, Default)]
pub struct ConstructArena {
    nodes: Vec<Construct>,
}

impl ConstructArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ConstructKind, location: SourceLocation) -> ConstructId {
        let id = ConstructId(self.nodes.len());
        self.nodes.push(Construct {
            kind,
            parent: None,
            children: Vec::new(),
            ty: None,
            category: None,
            notes: Vec::new(),
            location,
            subtree_error: false,
        });
        id
    }

    pub fn get(&self, id: ConstructId) -> Option<&Construct> {
        self.nodes.get(id.0)
    }

    pub fn kind(&self, id: ConstructId) -> Option<&ConstructKind> {
        self.get(id).map(|c| &c.kind)
    }

    pub fn ty(&self, id: ConstructId) -> Option<&Type> {
        self.get(id).and_then(|c| c.ty.as_ref())
    }

    pub fn category(&self, id: ConstructId) -> Option<ValueCategory> {
        self.get(id).and_then(|c| c.category)
    }

    pub fn location(&self, id: ConstructId) -> SourceLocation {
        self.get(id).map(|c| c.location).unwrap_or_default()
    }

    pub fn parent(&self, id: ConstructId) -> Option<ConstructId> {
        self.get(id).and_then(|c| c.parent)
    }

    /// Replace the kind of a construct whose children were only known after creation
    pub fn set_kind(&mut self, id: ConstructId, kind: ConstructKind) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.kind = kind;
        }
    }

    pub fn set_type(&mut self, id: ConstructId, ty: Type, category: ValueCategory) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.ty = Some(ty);
            node.category = Some(category);
        }
    }

    /// Give `child` to `parent`
    pub fn attach(&mut self, parent: ConstructId, child: ConstructId) {
        let child_error = match self.nodes.get_mut(child.0) {
            Some(node) => {
                node.parent = Some(parent);
                node.subtree_error
            }
            None => return,
        };
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
        if child_error {
            self.mark_error(parent);
        }
    }

    pub fn attach_all(&mut self, parent: ConstructId, children: &[ConstructId]) {
        for child in children {
            self.attach(parent, *child);
        }
    }

    pub fn add_note(&mut self, id: ConstructId, note: Note) {
        let is_error = note.is_error();
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.notes.push(note);
        }
        if is_error {
            self.mark_error(id);
        }
    }

    fn mark_error(&mut self, id: ConstructId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get_mut(node_id.0) {
                Some(node) if !node.subtree_error || node_id == id => {
                    node.subtree_error = true;
                    current = node.parent;
                }
                _ => break,
            }
        }
    }

    /// Type present and no error notes anywhere in the subtree
    pub fn is_well_typed(&self, id: ConstructId) -> bool {
        self.get(id).is_some_and(|c| c.ty.is_some() && !c.subtree_error)
    }

    pub fn has_errors(&self, id: ConstructId) -> bool {
        self.get(id).is_some_and(|c| c.subtree_error)
    }

    /// Notes of a construct and all its descendants, in tree order
    pub fn notes_in_subtree(&self, id: ConstructId) -> Vec<&Note> {
        let mut notes = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.get(current) {
                notes.extend(node.notes.iter());
                pending.extend(node.children.iter().rev());
            }
        }
        notes
    }

    /// Every note in the arena, in creation order
    pub fn all_notes(&self) -> impl Iterator<Item = &Note> {
        self.nodes.iter().flat_map(|n| n.notes.iter())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_propagate_to_ancestors() {
        let mut arena = ConstructArena::new();
        let loc = SourceLocation::default();
        let leaf = arena.add(ConstructKind::NumericLiteral(Literal::Int(1)), loc);
        arena.set_type(leaf, Type::int(), ValueCategory::PRValue);
        let stmt = arena.add(ConstructKind::ExpressionStatement { expr: leaf }, loc);
        arena.attach(stmt, leaf);
        arena.set_type(stmt, Type::void(), ValueCategory::PRValue);

        assert!(arena.is_well_typed(stmt));
        arena.add_note(leaf, Note::error("test", "bad", loc));
        assert!(!arena.is_well_typed(leaf));
        assert!(!arena.is_well_typed(stmt));
        assert_eq!(arena.notes_in_subtree(stmt).len(), 1);
    }

    #[test]
    fn test_warnings_do_not_poison() {
        let mut arena = ConstructArena::new();
        let loc = SourceLocation::default();
        let leaf = arena.add(ConstructKind::NullptrLiteral, loc);
        arena.set_type(leaf, Type::pointer_to(Type::void()), ValueCategory::PRValue);
        arena.add_note(leaf, Note::warning("test", "hmm", loc));
        assert!(arena.is_well_typed(leaf));
    }

    #[test]
    fn test_error_child_attached_later_poisons_parent() {
        let mut arena = ConstructArena::new();
        let loc = SourceLocation::default();
        let child = arena.add(ConstructKind::Invalid, loc);
        arena.add_note(child, Note::error("test", "bad", loc));
        let parent = arena.add(ConstructKind::NullStatement, loc);
        arena.set_type(parent, Type::void(), ValueCategory::PRValue);
        arena.attach(parent, child);
        assert!(!arena.is_well_typed(parent));
    }
}
