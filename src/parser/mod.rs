//! C++ source code parser
//!
//! This module transforms source text into a syntax tree for the compiler:
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`parse`]: Parser core, errors and helpers (tokens → syntax tree)
//! - [`ast`]: Syntax tree node definitions
//!
//! # Supported C++ Subset
//!
//! - Types: `char`, `int`, `bool`, `float`, `double`, `void`, classes, pointers,
//!   references, arrays
//! - Classes with one base class, constructors, destructors, member functions
//!   and operator overloads
//! - Statements: declarations, expressions, control flow (`if`, `while`, `do`, `for`)
//! - Expressions: arithmetic, logical, bitwise, ternary, comma, calls, `new`/`delete`
//! - `#include` lines are skipped here and resolved by the library registry
//! - No templates, namespaces (other than ignoring `std`), casts or `sizeof`
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with one function per precedence level.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
mod statements;

pub use parse::{ParseError, Parser};
