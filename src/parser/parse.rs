//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including error types, helper methods, and the main parse entry point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: classes, functions, declarators and type names
//! - `statements`: statements (if, while, for, blocks, ...)
//! - `expressions`: expressions with precedence climbing
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state.

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer, Token};
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, Error)]
#[error("Parse error at line {}, column {}: {message}", .location.line, .location.column)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

/// Recursive descent parser for the C++ subset
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    /// Class names seen so far (declared or defined), used to tell
    /// declarations from expressions
    pub(crate) class_names: FxHashSet<String>,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
            class_names: FxHashSet::default(),
        })
    }

    /// Make class names declared elsewhere (e.g. library headers) known
    pub fn with_known_classes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Parse the entire translation unit (top-level declarations)
    pub fn parse_source_file(&mut self) -> Result<SourceFile, ParseError> {
        let mut file = SourceFile::new();

        while !self.is_at_end() {
            if let Some(decl) = self.parse_top_level_declaration()? {
                file.nodes.push(decl);
            }
        }

        Ok(file)
    }

    // ===== Helper methods =====

    /// Whether the upcoming tokens start a type name
    pub(crate) fn is_type_start(&self) -> bool {
        match self.peek() {
            Token::Int(_)
            | Token::Char(_)
            | Token::Bool(_)
            | Token::Float(_)
            | Token::Double(_)
            | Token::Void(_)
            | Token::Const(_)
            | Token::Class(_)
            | Token::Struct(_) => true,
            Token::Ident(name, _) => {
                self.class_names.contains(name)
                    || (name == "std"
                        && matches!(self.peek_ahead(1), Some(Token::ColonColon(_)))
                        && matches!(self.peek_ahead(2), Some(Token::Ident(n, _)) if self.class_names.contains(n)))
            }
            _ => false,
        }
    }

    pub(crate) fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof(_))
    }

    pub(crate) fn peek(&self) -> &Token {
        // The token stream always ends with Eof and `advance` never moves past it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_token(&self) -> Token {
        self.peek().clone()
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn previous_location(&self) -> SourceLocation {
        self.previous().location()
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location()
    }

    pub(crate) fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            location: self.current_location(),
        })
    }

    pub(crate) fn expect_token(&mut self, token: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            self.error(format!("{}, found {}", message, self.peek()))
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(
            &Token::LParen(self.current_location()),
            &format!("Expected '(' {ctx}"),
        )
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(
            &Token::RParen(self.current_location()),
            &format!("Expected ')' {ctx}"),
        )
    }

    pub(crate) fn expect_lbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(
            &Token::LBrace(self.current_location()),
            &format!("Expected '{{' {ctx}"),
        )
    }

    pub(crate) fn expect_rbrace(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(
            &Token::RBrace(self.current_location()),
            &format!("Expected '}}' {ctx}"),
        )
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(
            &Token::Semicolon(self.current_location()),
            &format!("Expected ';' {ctx}"),
        )
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let Token::Ident(name, _) = self.peek_token() {
            self.advance();
            Ok(name)
        } else {
            self.error(format!("Expected identifier, found {}", self.peek()))
        }
    }

    /// Drop a leading `std::` qualifier if present
    pub(crate) fn skip_std_qualifier(&mut self) {
        if matches!(self.peek(), Token::Ident(name, _) if name == "std")
            && matches!(self.peek_ahead(1), Some(Token::ColonColon(_)))
        {
            self.advance();
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceFile {
        let mut parser = Parser::new(source).unwrap();
        parser.parse_source_file().unwrap()
    }

    #[test]
    fn test_parse_simple_function() {
        let file = parse("int main() { return 0; }");

        assert_eq!(file.nodes.len(), 1);
        match &file.nodes[0] {
            AstNode::FunctionDef(def) => {
                assert_eq!(def.name, "main");
                assert_eq!(def.params.len(), 0);
                assert_eq!(def.return_type.base, BaseType::Int);
                assert_eq!(def.body.as_ref().map(Vec::len), Some(1));
            }
            _ => panic!("Expected function definition"),
        }
    }

    #[test]
    fn test_parse_expression() {
        let file = parse("int main() { int x = 1 + 2 * 3; }");
        assert_eq!(file.nodes.len(), 1);
    }

    #[test]
    fn test_parse_if_statement() {
        let file = parse("int main() { int x = 1; if (x > 0) return 1; else return 0; }");
        assert_eq!(file.nodes.len(), 1);
    }

    #[test]
    fn test_parse_class() {
        let file = parse(
            "class Point { public: int x; int y; Point(int a, int b) : x(a), y(b) {} int sum() const { return x + y; } };",
        );

        assert_eq!(file.nodes.len(), 1);
        match &file.nodes[0] {
            AstNode::ClassDef(def) => {
                assert_eq!(def.name, "Point");
                assert_eq!(def.members.len(), 4);
                match &def.members[2] {
                    ClassMember::Method(ctor) => {
                        assert_eq!(ctor.kind, FunctionKind::Constructor);
                        assert_eq!(ctor.ctor_initializers.len(), 2);
                    }
                    _ => panic!("Expected constructor"),
                }
                match &def.members[3] {
                    ClassMember::Method(method) => assert!(method.is_const),
                    _ => panic!("Expected member function"),
                }
            }
            _ => panic!("Expected class definition"),
        }
    }

    #[test]
    fn test_parse_global_and_prototype() {
        let file = parse("int counter = 0; double avg(int a, int b);");
        assert_eq!(file.nodes.len(), 2);
        assert!(matches!(file.nodes[0], AstNode::Declaration { .. }));
        match &file.nodes[1] {
            AstNode::FunctionDef(def) => assert!(def.body.is_none()),
            _ => panic!("Expected prototype"),
        }
    }

    #[test]
    fn test_using_namespace_is_skipped() {
        let file = parse("using namespace std; int main() { std::cout << 1; }");
        assert_eq!(file.nodes.len(), 1);
    }

    #[test]
    fn test_parse_error_reports_location() {
        let mut parser = Parser::new("int main() { int x = ; }").unwrap();
        let err = parser.parse_source_file().unwrap_err();
        assert_eq!(err.location.line, 1);
    }
}
