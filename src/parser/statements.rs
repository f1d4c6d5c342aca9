//! Statement parsing implementation
//!
//! This module handles parsing of all C++ statement types in the subset:
//!
//! - Variable declarations: `int x = 42;`, `Point p(1, 2);`
//! - Control flow: `if`, `while`, `for`, `do-while`
//! - Jump statements: `return`, `break`, `continue`
//! - Compound statements: `{ ... }`
//! - Expression and null statements
//!
//! # Grammar
//!
//! ```text
//! statement ::= declaration | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | return_stmt | break_stmt
//!             | continue_stmt | block | expr_stmt | ";"
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse block statements (inside braces, excluding the braces themselves)
    pub(crate) fn parse_block_statements(&mut self) -> Result<Vec<AstNode>, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&Token::RBrace(self.current_location())) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(statements)
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        if self.match_token(&Token::Return(loc)) {
            return self.parse_return_statement();
        }

        if self.match_token(&Token::If(loc)) {
            return self.parse_if_statement();
        }

        if self.match_token(&Token::While(loc)) {
            return self.parse_while_statement();
        }

        if self.match_token(&Token::Do(loc)) {
            return self.parse_do_while_statement();
        }

        if self.match_token(&Token::For(loc)) {
            return self.parse_for_statement();
        }

        if self.match_token(&Token::Break(loc)) {
            self.expect_semicolon("after 'break'")?;
            return Ok(AstNode::Break { location: loc });
        }

        if self.match_token(&Token::Continue(loc)) {
            self.expect_semicolon("after 'continue'")?;
            return Ok(AstNode::Continue { location: loc });
        }

        if self.match_token(&Token::Semicolon(loc)) {
            return Ok(AstNode::NullStatement { location: loc });
        }

        if self.match_token(&Token::LBrace(loc)) {
            let statements = self.parse_block_statements()?;
            self.expect_rbrace("after block")?;
            return Ok(AstNode::Block {
                statements,
                location: loc,
            });
        }

        if self.is_type_start() {
            return self.parse_variable_declaration();
        }

        // Otherwise, it's an expression statement
        let expr = self.parse_expression()?;
        self.expect_semicolon("after expression")?;
        Ok(AstNode::ExpressionStatement {
            expr: Box::new(expr),
            location: loc,
        })
    }

    /// Parse return statement
    fn parse_return_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        let expr = if self.check(&Token::Semicolon(self.current_location())) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect_semicolon("after return")?;

        Ok(AstNode::Return {
            expr,
            location: loc,
        })
    }

    /// Parse if statement
    fn parse_if_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'if'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after if condition")?;

        let then_branch = Box::new(self.parse_statement()?);

        let else_branch = if self.match_token(&Token::Else(self.current_location())) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(AstNode::If {
            condition,
            then_branch,
            else_branch,
            location: loc,
        })
    }

    /// Parse while statement
    fn parse_while_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'while'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after while condition")?;

        let body = Box::new(self.parse_statement()?);

        Ok(AstNode::While {
            condition,
            body,
            location: loc,
        })
    }

    /// Parse do-while statement
    fn parse_do_while_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        let body = Box::new(self.parse_statement()?);

        self.expect_token(
            &Token::While(self.current_location()),
            "Expected 'while' after do body",
        )?;
        self.expect_lparen("after 'while'")?;
        let condition = Box::new(self.parse_expression()?);
        self.expect_rparen("after do-while condition")?;
        self.expect_semicolon("after do-while")?;

        Ok(AstNode::DoWhile {
            body,
            condition,
            location: loc,
        })
    }

    /// Parse for statement
    fn parse_for_statement(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();

        self.expect_lparen("after 'for'")?;

        // Init (optional)
        let init = if self.match_token(&Token::Semicolon(self.current_location())) {
            None
        } else if self.is_type_start() {
            // Declaration includes its semicolon
            Some(Box::new(self.parse_variable_declaration()?))
        } else {
            let expr_loc = self.current_location();
            let expr = self.parse_expression()?;
            self.expect_semicolon("after for init")?;
            Some(Box::new(AstNode::ExpressionStatement {
                expr: Box::new(expr),
                location: expr_loc,
            }))
        };

        // Condition (optional)
        let condition = if self.check(&Token::Semicolon(self.current_location())) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_semicolon("after for condition")?;

        // Increment (optional)
        let increment = if self.check(&Token::RParen(self.current_location())) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect_rparen("after for clauses")?;

        let body = Box::new(self.parse_statement()?);

        Ok(AstNode::For {
            init,
            condition,
            increment,
            body,
            location: loc,
        })
    }

    /// Parse a local variable declaration, including the trailing `;`
    pub(crate) fn parse_variable_declaration(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        let spec = self.parse_type_specifier()?;
        let (name, var_type, name_loc) = self.parse_declarator(&spec)?;
        let declarators = self.parse_declarator_list(&spec, name, var_type, name_loc)?;

        Ok(AstNode::Declaration {
            declarators,
            location: loc,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn body_of(source: &str) -> Vec<AstNode> {
        let file = Parser::new(source)
            .expect("Parser creation failed")
            .parse_source_file()
            .expect("Parse failed");
        match file.nodes.into_iter().next() {
            Some(AstNode::FunctionDef(def)) => def.body.unwrap_or_default(),
            _ => panic!("Expected function definition"),
        }
    }

    #[test]
    fn test_loops() {
        let body = body_of(
            "void f() { for (int i = 0; i < 3; i++) { } while (true) break; do { continue; } while (false); }",
        );
        assert_eq!(body.len(), 3);
        match &body[0] {
            AstNode::For { init, condition, increment, .. } => {
                assert!(matches!(init.as_deref(), Some(AstNode::Declaration { .. })));
                assert!(condition.is_some());
                assert!(increment.is_some());
            }
            _ => panic!("Expected for loop"),
        }
        assert!(matches!(body[1], AstNode::While { .. }));
        assert!(matches!(body[2], AstNode::DoWhile { .. }));
    }

    #[test]
    fn test_empty_for_clauses_and_null_statement() {
        let body = body_of("void f() { for (;;) ; }");
        match &body[0] {
            AstNode::For { init, condition, increment, body, .. } => {
                assert!(init.is_none() && condition.is_none() && increment.is_none());
                assert!(matches!(**body, AstNode::NullStatement { .. }));
            }
            _ => panic!("Expected for loop"),
        }
    }

    #[test]
    fn test_dangling_else_binds_to_nearest_if() {
        let body = body_of("int f(int x) { if (x) if (x > 1) return 2; else return 1; return 0; }");
        match &body[0] {
            AstNode::If { then_branch, else_branch, .. } => {
                assert!(else_branch.is_none());
                assert!(matches!(
                    **then_branch,
                    AstNode::If { else_branch: Some(_), .. }
                ));
            }
            _ => panic!("Expected if"),
        }
    }

    #[test]
    fn test_class_typed_local_declaration() {
        let file = Parser::new("class P { }; void f() { P p; P* q = &p; }")
            .unwrap()
            .parse_source_file()
            .unwrap();
        let AstNode::FunctionDef(def) = &file.nodes[1] else {
            panic!("Expected function");
        };
        let body = def.body.as_ref().unwrap();
        assert!(body.iter().all(|s| matches!(s, AstNode::Declaration { .. })));
    }
}
