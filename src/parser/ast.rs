// Syntax tree definitions for the C++ teaching subset

use std::fmt;

/// Source location information for notes and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Base types named by a declaration specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseType {
    Int,
    Char,
    Bool,
    Float,
    Double,
    Void,
    Named(String), // class name
}

/// A spelled type: specifier, cv, pointer levels, reference and array bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub base: BaseType,
    pub is_const: bool,
    pub pointers: Vec<bool>, // one entry per '*', true for `* const`
    pub is_reference: bool,
    pub array_dims: Vec<Option<usize>>, // None for `[]`
}

impl TypeName {
    pub fn new(base: BaseType) -> Self {
        TypeName {
            base,
            is_const: false,
            pointers: Vec::new(),
            is_reference: false,
            array_dims: Vec::new(),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc | UnOp::PostInc => "++",
            UnOp::PreDec | UnOp::PostDec => "--",
            UnOp::Deref => "*",
            UnOp::AddrOf => "&",
        }
    }
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub param_type: TypeName,
    pub location: SourceLocation,
}

/// The syntactic form of an initializer
#[derive(Debug, Clone)]
pub enum InitSyntax {
    /// `= expr`
    Copy(Box<AstNode>),
    /// `(args...)`
    Direct(Vec<AstNode>),
    /// `{elems...}` with at least one element, or `= {elems...}`
    List(Vec<AstNode>),
    /// `{}`
    Value,
}

/// One declared name within a declaration statement
#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: String,
    pub var_type: TypeName,
    pub init: Option<InitSyntax>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Ordinary,
    Constructor,
    Destructor,
}

/// `member(args)` entry of a constructor initializer list
#[derive(Debug, Clone)]
pub struct MemberInit {
    pub name: String,
    pub args: Vec<AstNode>,
    pub location: SourceLocation,
}

/// Function declaration or definition (free or member)
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeName,
    pub body: Option<Vec<AstNode>>, // None for a prototype
    pub is_const: bool,
    pub kind: FunctionKind,
    pub ctor_initializers: Vec<MemberInit>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Field(Declarator),
    Method(FunctionDef),
}

/// Class or struct definition
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub base: Option<String>,
    pub members: Vec<ClassMember>,
    pub location: SourceLocation,
}

/// AST nodes representing declarations, statements and expressions
#[derive(Debug, Clone)]
pub enum AstNode {
    // Top-level declarations
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),

    // Statements
    Declaration {
        declarators: Vec<Declarator>,
        location: SourceLocation,
    },
    Block {
        statements: Vec<AstNode>,
        location: SourceLocation,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    While {
        condition: Box<AstNode>,
        body: Box<AstNode>,
        location: SourceLocation,
    },
    DoWhile {
        body: Box<AstNode>,
        condition: Box<AstNode>,
        location: SourceLocation,
    },
    For {
        init: Option<Box<AstNode>>,
        condition: Option<Box<AstNode>>,
        increment: Option<Box<AstNode>>,
        body: Box<AstNode>,
        location: SourceLocation,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
    Return {
        expr: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    ExpressionStatement {
        expr: Box<AstNode>,
        location: SourceLocation,
    },
    NullStatement {
        location: SourceLocation,
    },

    // Expressions
    IntLiteral(i64, SourceLocation),
    FloatLiteral(f64, SourceLocation),
    CharLiteral(i8, SourceLocation),
    BoolLiteral(bool, SourceLocation),
    StringLiteral(String, SourceLocation),
    NullPtr {
        location: SourceLocation,
    },
    This {
        location: SourceLocation,
    },
    Identifier(String, SourceLocation),
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
        location: SourceLocation,
    },
    Assignment {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
        location: SourceLocation,
    },
    CompoundAssignment {
        lhs: Box<AstNode>,
        op: BinOp,
        rhs: Box<AstNode>,
        location: SourceLocation,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<AstNode>,
        location: SourceLocation,
    },
    TernaryOp {
        condition: Box<AstNode>,
        true_expr: Box<AstNode>,
        false_expr: Box<AstNode>,
        location: SourceLocation,
    },
    Comma {
        left: Box<AstNode>,
        right: Box<AstNode>,
        location: SourceLocation,
    },
    FunctionCall {
        callee: Box<AstNode>,
        args: Vec<AstNode>,
        location: SourceLocation,
    },
    ArrayAccess {
        array: Box<AstNode>,
        index: Box<AstNode>,
        location: SourceLocation,
    },
    MemberAccess {
        object: Box<AstNode>,
        member: String,
        location: SourceLocation,
    },
    PointerMemberAccess {
        object: Box<AstNode>,
        member: String,
        location: SourceLocation,
    },
    New {
        target_type: TypeName,
        init: Option<InitSyntax>,
        array_length: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    Delete {
        operand: Box<AstNode>,
        is_array: bool,
        location: SourceLocation,
    },
}

impl AstNode {
    /// Get the source location of this node
    pub fn location(&self) -> SourceLocation {
        match self {
            AstNode::FunctionDef(def) => def.location,
            AstNode::ClassDef(def) => def.location,
            AstNode::Declaration { location, .. }
            | AstNode::Block { location, .. }
            | AstNode::If { location, .. }
            | AstNode::While { location, .. }
            | AstNode::DoWhile { location, .. }
            | AstNode::For { location, .. }
            | AstNode::Break { location }
            | AstNode::Continue { location }
            | AstNode::Return { location, .. }
            | AstNode::ExpressionStatement { location, .. }
            | AstNode::NullStatement { location }
            | AstNode::NullPtr { location }
            | AstNode::This { location }
            | AstNode::BinaryOp { location, .. }
            | AstNode::Assignment { location, .. }
            | AstNode::CompoundAssignment { location, .. }
            | AstNode::UnaryOp { location, .. }
            | AstNode::TernaryOp { location, .. }
            | AstNode::Comma { location, .. }
            | AstNode::FunctionCall { location, .. }
            | AstNode::ArrayAccess { location, .. }
            | AstNode::MemberAccess { location, .. }
            | AstNode::PointerMemberAccess { location, .. }
            | AstNode::New { location, .. }
            | AstNode::Delete { location, .. } => *location,
            AstNode::IntLiteral(_, loc)
            | AstNode::FloatLiteral(_, loc)
            | AstNode::CharLiteral(_, loc)
            | AstNode::BoolLiteral(_, loc)
            | AstNode::StringLiteral(_, loc)
            | AstNode::Identifier(_, loc) => *loc,
        }
    }
}

/// Top-level contents of one translation unit
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub nodes: Vec<AstNode>, // FunctionDef, ClassDef and global Declaration nodes
}

impl SourceFile {
    pub fn new() -> Self {
        SourceFile::default()
    }
}
