//! Expression parsing implementation
//!
//! This module handles parsing of C++ expressions using precedence climbing
//! for binary operators and recursive descent for other expression forms.
//!
//! # Supported Expressions
//!
//! - Literals: integers, floating point, characters, strings, `true`/`false`, `nullptr`
//! - Identifiers (optionally `std::` qualified) and `this`
//! - Binary operators: arithmetic, comparison, logical, bitwise, comma
//! - Unary operators: `-`, `+`, `!`, `~`, `&`, `*`, `++`, `--`
//! - Postfix: `[]`, `.`, `->`, `()`, `++`, `--`
//! - Ternary: `? :`
//! - `new T`, `new T(args)`, `new T[n]`, `delete p`, `delete[] p`
//!
//! # Precedence
//!
//! Binary operators follow C++ precedence rules, one parsing function per level.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::parser::parse::{ParseError, Parser};

type Level = fn(&mut Parser) -> Result<AstNode, ParseError>;

impl Parser {
    /// Parse expression (top-level entry point, includes the comma operator)
    pub(crate) fn parse_expression(&mut self) -> Result<AstNode, ParseError> {
        let mut left = self.parse_assignment_expression()?;

        while self.match_token(&Token::Comma(self.current_location())) {
            let loc = self.previous_location();
            let right = Box::new(self.parse_assignment_expression()?);
            left = AstNode::Comma {
                left: Box::new(left),
                right,
                location: loc,
            };
        }

        Ok(left)
    }

    /// Parse assignment or ternary (right-associative)
    pub(crate) fn parse_assignment_expression(&mut self) -> Result<AstNode, ParseError> {
        let expr = self.parse_ternary()?;

        let loc = self.current_location();
        if self.match_token(&Token::Eq(loc)) {
            let rhs = Box::new(self.parse_assignment_expression()?);
            return Ok(AstNode::Assignment {
                lhs: Box::new(expr),
                rhs,
                location: loc,
            });
        }

        let compound_op = if self.match_token(&Token::PlusEq(loc)) {
            Some(BinOp::Add)
        } else if self.match_token(&Token::MinusEq(loc)) {
            Some(BinOp::Sub)
        } else if self.match_token(&Token::StarEq(loc)) {
            Some(BinOp::Mul)
        } else if self.match_token(&Token::SlashEq(loc)) {
            Some(BinOp::Div)
        } else if self.match_token(&Token::PercentEq(loc)) {
            Some(BinOp::Mod)
        } else {
            None
        };

        if let Some(op) = compound_op {
            let rhs = Box::new(self.parse_assignment_expression()?);
            return Ok(AstNode::CompoundAssignment {
                lhs: Box::new(expr),
                op,
                rhs,
                location: loc,
            });
        }

        Ok(expr)
    }

    /// Parse ternary: condition ? true_expr : false_expr
    fn parse_ternary(&mut self) -> Result<AstNode, ParseError> {
        let expr = self.parse_logical_or()?;

        if self.match_token(&Token::Question(self.current_location())) {
            let loc = self.previous_location();
            let true_expr = Box::new(self.parse_expression()?);
            self.expect_token(
                &Token::Colon(self.current_location()),
                "Expected ':' in ternary expression",
            )?;
            let false_expr = Box::new(self.parse_assignment_expression()?);

            return Ok(AstNode::TernaryOp {
                condition: Box::new(expr),
                true_expr,
                false_expr,
                location: loc,
            });
        }

        Ok(expr)
    }

    /// Parse one left-associative binary precedence level
    fn parse_binary_level(&mut self, next: Level, ops: &[(Token, BinOp)]) -> Result<AstNode, ParseError> {
        let mut left = next(self)?;

        'outer: loop {
            let loc = self.current_location();
            for (token, op) in ops {
                if self.match_token(token) {
                    let right = Box::new(next(self)?);
                    left = AstNode::BinaryOp {
                        op: *op,
                        left: Box::new(left),
                        right,
                        location: loc,
                    };
                    continue 'outer;
                }
            }
            break;
        }

        Ok(left)
    }

    /// Parse logical OR (||)
    fn parse_logical_or(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(Parser::parse_logical_and, &[(Token::OrOr(loc), BinOp::Or)])
    }

    /// Parse logical AND (&&)
    fn parse_logical_and(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(Parser::parse_bitwise_or, &[(Token::AndAnd(loc), BinOp::And)])
    }

    /// Parse bitwise OR (|)
    fn parse_bitwise_or(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(Parser::parse_bitwise_xor, &[(Token::Pipe(loc), BinOp::BitOr)])
    }

    /// Parse bitwise XOR (^)
    fn parse_bitwise_xor(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(Parser::parse_bitwise_and, &[(Token::Caret(loc), BinOp::BitXor)])
    }

    /// Parse bitwise AND (&)
    fn parse_bitwise_and(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(Parser::parse_equality, &[(Token::Amp(loc), BinOp::BitAnd)])
    }

    /// Parse equality (== !=)
    fn parse_equality(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            Parser::parse_relational,
            &[(Token::EqEq(loc), BinOp::Eq), (Token::NotEq(loc), BinOp::Ne)],
        )
    }

    /// Parse relational (< <= > >=)
    fn parse_relational(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            Parser::parse_shift,
            &[
                (Token::Lt(loc), BinOp::Lt),
                (Token::Le(loc), BinOp::Le),
                (Token::Gt(loc), BinOp::Gt),
                (Token::Ge(loc), BinOp::Ge),
            ],
        )
    }

    /// Parse shift (<< >>), which is also the stream insertion/extraction level
    fn parse_shift(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            Parser::parse_additive,
            &[(Token::LtLt(loc), BinOp::Shl), (Token::GtGt(loc), BinOp::Shr)],
        )
    }

    /// Parse additive (+ -)
    fn parse_additive(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            Parser::parse_multiplicative,
            &[(Token::Plus(loc), BinOp::Add), (Token::Minus(loc), BinOp::Sub)],
        )
    }

    /// Parse multiplicative (* / %)
    fn parse_multiplicative(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();
        self.parse_binary_level(
            Parser::parse_unary,
            &[
                (Token::Star(loc), BinOp::Mul),
                (Token::Slash(loc), BinOp::Div),
                (Token::Percent(loc), BinOp::Mod),
            ],
        )
    }

    /// Parse unary (! ~ - + & * ++ -- new delete)
    fn parse_unary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        let prefix = match self.peek() {
            Token::Bang(_) => Some(UnOp::Not),
            Token::Tilde(_) => Some(UnOp::BitNot),
            Token::Minus(_) => Some(UnOp::Neg),
            Token::Plus(_) => Some(UnOp::Plus),
            Token::Amp(_) => Some(UnOp::AddrOf),
            Token::Star(_) => Some(UnOp::Deref),
            Token::PlusPlus(_) => Some(UnOp::PreInc),
            Token::MinusMinus(_) => Some(UnOp::PreDec),
            _ => None,
        };

        if let Some(op) = prefix {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Ok(AstNode::UnaryOp {
                op,
                operand,
                location: loc,
            });
        }

        if self.match_token(&Token::New(loc)) {
            return self.parse_new(loc);
        }

        if self.match_token(&Token::Delete(loc)) {
            let is_array = if self.match_token(&Token::LBracket(self.current_location())) {
                self.expect_token(
                    &Token::RBracket(self.current_location()),
                    "Expected ']' after 'delete['",
                )?;
                true
            } else {
                false
            };
            let operand = Box::new(self.parse_unary()?);
            return Ok(AstNode::Delete {
                operand,
                is_array,
                location: loc,
            });
        }

        self.parse_postfix()
    }

    /// Parse new-expression after the `new` keyword
    fn parse_new(&mut self, loc: SourceLocation) -> Result<AstNode, ParseError> {
        let spec = self.parse_type_specifier()?;
        let mut target_type = spec;
        while self.match_token(&Token::Star(self.current_location())) {
            target_type.pointers.push(false);
        }

        if self.match_token(&Token::LBracket(self.current_location())) {
            let length = Box::new(self.parse_expression()?);
            self.expect_token(
                &Token::RBracket(self.current_location()),
                "Expected ']' after array length",
            )?;
            let init = if self.check(&Token::LBrace(self.current_location())) {
                self.parse_initializer()?
            } else {
                None
            };
            return Ok(AstNode::New {
                target_type,
                init,
                array_length: Some(length),
                location: loc,
            });
        }

        let init = if self.check(&Token::LParen(self.current_location()))
            || self.check(&Token::LBrace(self.current_location()))
        {
            self.parse_initializer()?
        } else {
            None
        };

        Ok(AstNode::New {
            target_type,
            init,
            array_length: None,
            location: loc,
        })
    }

    /// Parse postfix (++ -- [] . -> ())
    fn parse_postfix(&mut self) -> Result<AstNode, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let loc = self.current_location();

            if self.match_token(&Token::PlusPlus(loc)) {
                expr = AstNode::UnaryOp {
                    op: UnOp::PostInc,
                    operand: Box::new(expr),
                    location: loc,
                };
            } else if self.match_token(&Token::MinusMinus(loc)) {
                expr = AstNode::UnaryOp {
                    op: UnOp::PostDec,
                    operand: Box::new(expr),
                    location: loc,
                };
            } else if self.match_token(&Token::LBracket(loc)) {
                let index = Box::new(self.parse_expression()?);
                self.expect_token(
                    &Token::RBracket(self.current_location()),
                    "Expected ']' after array index",
                )?;
                expr = AstNode::ArrayAccess {
                    array: Box::new(expr),
                    index,
                    location: loc,
                };
            } else if self.match_token(&Token::Dot(loc)) {
                let member = self.expect_identifier()?;
                expr = AstNode::MemberAccess {
                    object: Box::new(expr),
                    member,
                    location: loc,
                };
            } else if self.match_token(&Token::Arrow(loc)) {
                let member = self.expect_identifier()?;
                expr = AstNode::PointerMemberAccess {
                    object: Box::new(expr),
                    member,
                    location: loc,
                };
            } else if self.match_token(&Token::LParen(loc)) {
                let args = self.parse_argument_list_until(&Token::RParen(self.current_location()))?;
                self.expect_rparen("after function arguments")?;
                expr = AstNode::FunctionCall {
                    callee: Box::new(expr),
                    args,
                    location: loc,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse comma-separated assignment expressions up to (not including) `end`
    pub(crate) fn parse_argument_list_until(&mut self, end: &Token) -> Result<Vec<AstNode>, ParseError> {
        let mut args = Vec::new();

        if self.check(end) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_assignment_expression()?);

            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }

        Ok(args)
    }

    /// Parse primary (literals, identifiers, `this`, parenthesized expressions)
    fn parse_primary(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.current_location();

        match self.peek_token() {
            Token::IntLiteral(n, loc) => {
                self.advance();
                Ok(AstNode::IntLiteral(n, loc))
            }
            Token::FloatLiteral(x, loc) => {
                self.advance();
                Ok(AstNode::FloatLiteral(x, loc))
            }
            Token::CharLiteral(c, loc) => {
                self.advance();
                Ok(AstNode::CharLiteral(c, loc))
            }
            Token::StringLiteral(s, loc) => {
                self.advance();
                // Adjacent string literals are concatenated
                let mut text = s;
                while let Token::StringLiteral(more, _) = self.peek_token() {
                    self.advance();
                    text.push_str(&more);
                }
                Ok(AstNode::StringLiteral(text, loc))
            }
            Token::True(loc) => {
                self.advance();
                Ok(AstNode::BoolLiteral(true, loc))
            }
            Token::False(loc) => {
                self.advance();
                Ok(AstNode::BoolLiteral(false, loc))
            }
            Token::Nullptr(loc) => {
                self.advance();
                Ok(AstNode::NullPtr { location: loc })
            }
            Token::This(loc) => {
                self.advance();
                Ok(AstNode::This { location: loc })
            }
            Token::Ident(_, _) => {
                self.skip_std_qualifier();
                let loc = self.current_location();
                let name = self.expect_identifier()?;
                Ok(AstNode::Identifier(name, loc))
            }
            Token::LParen(_) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            _ => Err(ParseError {
                message: format!("Unexpected token: {}", self.peek()),
                location: loc,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn expr_of(source: &str) -> AstNode {
        let text = format!("void f() {{ {}; }}", source);
        let file = Parser::new(&text)
            .expect("Parser creation failed")
            .with_known_classes(["Point"])
            .parse_source_file()
            .expect("Parse failed");
        match file.nodes.into_iter().next() {
            Some(AstNode::FunctionDef(def)) => match def.body.unwrap_or_default().into_iter().next() {
                Some(AstNode::ExpressionStatement { expr, .. }) => *expr,
                other => panic!("Expected expression statement, got {:?}", other),
            },
            _ => panic!("Expected function definition"),
        }
    }

    #[test]
    fn test_precedence() {
        match expr_of("1 + 2 * 3") {
            AstNode::BinaryOp { op: BinOp::Add, right, .. } => {
                assert!(matches!(*right, AstNode::BinaryOp { op: BinOp::Mul, .. }));
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        match expr_of("a = b = 3") {
            AstNode::Assignment { rhs, .. } => {
                assert!(matches!(*rhs, AstNode::Assignment { .. }));
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_comma_has_lowest_precedence() {
        assert!(matches!(expr_of("a = 1, b = 2"), AstNode::Comma { .. }));
    }

    #[test]
    fn test_stream_chain_is_left_associative() {
        match expr_of("std::cout << x << std::endl") {
            AstNode::BinaryOp { op: BinOp::Shl, left, right, .. } => {
                assert!(matches!(*left, AstNode::BinaryOp { op: BinOp::Shl, .. }));
                assert!(matches!(*right, AstNode::Identifier(ref n, _) if n == "endl"));
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_postfix_chain() {
        match expr_of("p->next[2].value(1)") {
            AstNode::FunctionCall { callee, args, .. } => {
                assert_eq!(args.len(), 1);
                assert!(matches!(*callee, AstNode::MemberAccess { .. }));
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_and_delete() {
        assert!(matches!(
            expr_of("new int[5]"),
            AstNode::New { array_length: Some(_), .. }
        ));
        assert!(matches!(
            expr_of("new Point(1, 2)"),
            AstNode::New { init: Some(InitSyntax::Direct(_)), .. }
        ));
        assert!(matches!(expr_of("delete[] p"), AstNode::Delete { is_array: true, .. }));
    }

    #[test]
    fn test_unary_and_ternary() {
        match expr_of("x ? -*p : !y") {
            AstNode::TernaryOp { true_expr, false_expr, .. } => {
                assert!(matches!(*true_expr, AstNode::UnaryOp { op: UnOp::Neg, .. }));
                assert!(matches!(*false_expr, AstNode::UnaryOp { op: UnOp::Not, .. }));
            }
            other => panic!("Unexpected {:?}", other),
        }
    }
}
