//! Statements
//!
//! Blocks open a scope; the bodies of `if`, loops and `for` get their own
//! scope as well so a declaration there cannot leak into the enclosing block.

use super::initializers::InitForm;
use super::{Compiler, ConstructId, ConstructKind, InitTarget, ValueCategory};
use crate::entities::ScopeKind;
use crate::parser::ast::{AstNode, SourceLocation};
use crate::types::Type;

impl Compiler<'_> {
    pub(crate) fn compile_statement(&mut self, node: &AstNode) -> ConstructId {
        let location = node.location();
        let id = match node {
            AstNode::Declaration { declarators, location } => {
                return self.compile_declaration(declarators, *location, false);
            }
            AstNode::Block { statements, .. } => return self.compile_block(statements, location),
            AstNode::ExpressionStatement { expr, .. } => {
                let expr = self.compile_expression(expr);
                let id = self.add(ConstructKind::ExpressionStatement { expr }, location);
                self.attach(id, &[expr]);
                id
            }
            AstNode::NullStatement { .. } => self.add(ConstructKind::NullStatement, location),
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let condition = self.compile_condition(condition);
                let then_branch = self.compile_substatement(then_branch);
                let else_branch = else_branch.as_ref().map(|e| self.compile_substatement(e));
                let id = self.add(
                    ConstructKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    location,
                );
                let children: Vec<ConstructId> = [condition, then_branch].into_iter().chain(else_branch).collect();
                self.attach(id, &children);
                id
            }
            AstNode::While { condition, body, .. } => {
                let condition = self.compile_condition(condition);
                let body = self.compile_loop_body(body);
                let id = self.add(ConstructKind::While { condition, body }, location);
                self.attach(id, &[condition, body]);
                id
            }
            AstNode::DoWhile { body, condition, .. } => {
                let body = self.compile_loop_body(body);
                let condition = self.compile_condition(condition);
                let id = self.add(ConstructKind::DoWhile { body, condition }, location);
                self.attach(id, &[body, condition]);
                id
            }
            AstNode::For {
                init,
                condition,
                increment,
                body,
                ..
            } => return self.compile_for(init.as_deref(), condition.as_deref(), increment.as_deref(), body, location),
            AstNode::Break { .. } | AstNode::Continue { .. } => {
                let (kind, word) = match node {
                    AstNode::Break { .. } => (ConstructKind::Break, "break"),
                    _ => (ConstructKind::Continue, "continue"),
                };
                let id = self.add(kind, location);
                if self.loop_depth == 0 {
                    self.error(id, "stmt.outsideLoop", format!("'{}' statement not in loop statement", word));
                }
                id
            }
            AstNode::Return { expr, .. } => self.compile_return(expr.as_deref(), location),
            other => {
                // A bare expression where a statement is expected
                let expr = self.compile_expression(other);
                let id = self.add(ConstructKind::ExpressionStatement { expr }, location);
                self.attach(id, &[expr]);
                id
            }
        };
        self.set_type(id, Type::void(), ValueCategory::PRValue);
        id
    }

    fn compile_block(&mut self, statements: &[AstNode], location: SourceLocation) -> ConstructId {
        let outer = self.scope;
        self.scope = self.program.scopes.create(ScopeKind::Block, Some(outer));
        if let Some(ctx) = self.function.as_mut() {
            ctx.block_locals.push(Vec::new());
        }

        let compiled: Vec<ConstructId> = statements.iter().map(|s| self.compile_statement(s)).collect();

        let locals = self
            .function
            .as_mut()
            .and_then(|ctx| ctx.block_locals.pop())
            .unwrap_or_default();
        self.scope = outer;

        let id = self.add(
            ConstructKind::Block {
                statements: compiled.clone(),
                locals,
            },
            location,
        );
        self.attach(id, &compiled);
        self.set_type(id, Type::void(), ValueCategory::PRValue);
        id
    }

    /// A statement in its own scope; a declaration becomes a one-statement block
    fn compile_substatement(&mut self, node: &AstNode) -> ConstructId {
        match node {
            AstNode::Block { .. } => self.compile_statement(node),
            other => self.compile_block(std::slice::from_ref(other), other.location()),
        }
    }

    fn compile_loop_body(&mut self, body: &AstNode) -> ConstructId {
        self.loop_depth += 1;
        let body = self.compile_substatement(body);
        self.loop_depth -= 1;
        body
    }

    /// A condition converted to `bool`
    fn compile_condition(&mut self, condition: &AstNode) -> ConstructId {
        let expr = self.compile_expression(condition);
        if matches!(condition, AstNode::Assignment { .. }) {
            self.warning(
                expr,
                "stmt.assignmentCondition",
                "using the result of an assignment as a condition; did you mean '=='?",
            );
        }
        self.convert(expr, &Type::bool(), "a condition")
    }

    fn compile_for(
        &mut self,
        init: Option<&AstNode>,
        condition: Option<&AstNode>,
        increment: Option<&AstNode>,
        body: &AstNode,
        location: SourceLocation,
    ) -> ConstructId {
        let outer = self.scope;
        self.scope = self.program.scopes.create(ScopeKind::Block, Some(outer));
        if let Some(ctx) = self.function.as_mut() {
            ctx.block_locals.push(Vec::new());
        }

        let init = init.map(|i| self.compile_statement(i));
        let condition = condition.map(|c| self.compile_condition(c));
        let increment = increment.map(|i| self.compile_expression(i));
        let body = self.compile_loop_body(body);

        let locals = self
            .function
            .as_mut()
            .and_then(|ctx| ctx.block_locals.pop())
            .unwrap_or_default();
        self.scope = outer;

        let id = self.add(
            ConstructKind::For {
                init,
                condition,
                increment,
                body,
                locals,
            },
            location,
        );
        let children: Vec<ConstructId> = init
            .into_iter()
            .chain(condition)
            .chain(increment)
            .chain(std::iter::once(body))
            .collect();
        self.attach(id, &children);
        self.set_type(id, Type::void(), ValueCategory::PRValue);
        id
    }

    fn compile_return(&mut self, expr: Option<&AstNode>, location: SourceLocation) -> ConstructId {
        let id = self.add(ConstructKind::Return { init: None }, location);
        let Some(return_type) = self.function.as_ref().map(|ctx| ctx.return_type.clone()) else {
            self.error(id, "stmt.return", "return statement outside of a function");
            return id;
        };
        if let Some(ctx) = self.function.as_mut() {
            ctx.has_return = true;
        }

        match (expr, return_type.is_void()) {
            (None, true) => {}
            (None, false) => {
                self.error(
                    id,
                    "stmt.returnValue",
                    format!("non-void function should return a value of type '{}'", return_type),
                );
            }
            (Some(expr), true) => {
                let value = self.compile_expression(expr);
                self.attach(id, &[value]);
                self.error(id, "stmt.returnVoid", "void function should not return a value");
            }
            (Some(expr), false) => {
                let value = self.compile_expression(expr);
                let init = self.initialize(InitTarget::ReturnValue, &return_type, InitForm::Copy(value), location, false);
                self.attach(id, &[init]);
                self.program.constructs.set_kind(id, ConstructKind::Return { init: Some(init) });
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::Program;

    fn error_ids(source: &str) -> Vec<&'static str> {
        Program::compile_source(source).errors().map(|n| n.id).collect()
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(error_ids("int main() { break; }"), vec!["stmt.outsideLoop"]);
        assert!(error_ids("int main() { while (true) { break; } }").is_empty());
    }

    #[test]
    fn test_return_checks() {
        assert_eq!(error_ids("void f() { return 1; } int main() { f(); }"), vec!["stmt.returnVoid"]);
        assert_eq!(error_ids("int f() { return; } int main() { f(); }"), vec!["stmt.returnValue"]);
    }

    #[test]
    fn test_assignment_condition_warns() {
        let program = Program::compile_source("int main() { int x = 0; if (x = 1) { } }");
        assert!(!program.has_errors());
        assert!(program.notes().any(|n| n.id == "stmt.assignmentCondition"));
    }

    #[test]
    fn test_block_scopes_allow_shadowing() {
        let program = Program::compile_source("int main() { int x = 1; { int x = 2; } for (int i = 0; i < 2; i++) { int x = i; } }");
        assert!(!program.has_errors());
    }

    #[test]
    fn test_redeclaration_in_same_block() {
        assert_eq!(error_ids("int main() { int x = 1; int x = 2; }"), vec!["decl.redefinition"]);
    }
}
