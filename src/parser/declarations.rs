//! Declaration parsing implementation
//!
//! This module handles parsing of declarations in C++ programs:
//!
//! - Class definitions: `class Name : public Base { ... };`
//! - Function definitions and prototypes: `type name(params) [const] { ... }`
//! - Constructors with initializer lists, destructors, operator overloads
//! - Variable declarations with `=`, `(...)` and `{...}` initializers
//! - Type parsing: specifiers, cv, pointers, references, arrays
//!
//! # Grammar
//!
//! ```text
//! declaration ::= class_def | function_def | var_decl | "using" "namespace" ident ";"
//! class_def   ::= ("class" | "struct") ident [":" [access] ident] "{" member* "}" ";"
//! function_def ::= type declarator "(" params ")" ["const"] (block | ";")
//! var_decl    ::= type declarator [init] ("," declarator [init])* ";"
//! declarator  ::= ("*" ["const"])* ["&"] ident ("[" int "]")*
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse a top-level declaration. Returns `None` for constructs that
    /// produce no syntax tree node (`using namespace`, forward declarations).
    pub(crate) fn parse_top_level_declaration(&mut self) -> Result<Option<AstNode>, ParseError> {
        let loc = self.current_location();

        if self.match_token(&Token::Semicolon(loc)) {
            return Ok(None);
        }

        if self.match_token(&Token::Using(loc)) {
            self.expect_token(
                &Token::Namespace(self.current_location()),
                "Expected 'namespace' after 'using'",
            )?;
            self.expect_identifier()?;
            self.expect_semicolon("after using directive")?;
            return Ok(None);
        }

        if self.check(&Token::Class(loc)) || self.check(&Token::Struct(loc)) {
            // class Name { ... };   <- definition
            // class Name;           <- forward declaration
            // class Name f(...)     <- elaborated return type
            if let (Some(Token::Ident(name, _)), Some(next)) =
                (self.peek_ahead(1).cloned(), self.peek_ahead(2).cloned())
            {
                match next {
                    Token::LBrace(_) | Token::Colon(_) => {
                        self.advance();
                        return self.parse_class_definition().map(Some);
                    }
                    Token::Semicolon(_) => {
                        self.advance();
                        self.advance();
                        self.advance();
                        self.class_names.insert(name);
                        return Ok(None);
                    }
                    _ => {}
                }
            }
        }

        let spec = self.parse_type_specifier()?;

        if self.match_token(&Token::Operator(self.current_location())) {
            let name = self.parse_operator_name()?;
            return self
                .parse_function_rest(name, spec, FunctionKind::Ordinary, loc)
                .map(|f| Some(AstNode::FunctionDef(f)));
        }

        let (name, var_type, name_loc) = self.parse_declarator(&spec)?;

        if self.check(&Token::LParen(self.current_location())) && self.looks_like_parameter_list() {
            return self
                .parse_function_rest(name, var_type, FunctionKind::Ordinary, name_loc)
                .map(|f| Some(AstNode::FunctionDef(f)));
        }

        let declarators = self.parse_declarator_list(&spec, name, var_type, name_loc)?;
        Ok(Some(AstNode::Declaration {
            declarators,
            location: loc,
        }))
    }

    /// Parse class definition after the `class`/`struct` keyword:
    /// Name [: [public] Base] { members };
    pub(crate) fn parse_class_definition(&mut self) -> Result<AstNode, ParseError> {
        let loc = self.previous_location();
        let name = self.expect_identifier()?;
        self.class_names.insert(name.clone());

        let base = if self.match_token(&Token::Colon(self.current_location())) {
            let _ = self.match_token(&Token::Public(self.current_location()))
                || self.match_token(&Token::Private(self.current_location()))
                || self.match_token(&Token::Protected(self.current_location()));
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect_lbrace("after class name")?;

        let mut members = Vec::new();
        while !self.check(&Token::RBrace(self.current_location())) && !self.is_at_end() {
            self.parse_class_member(&name, &mut members)?;
        }

        self.expect_rbrace("after class members")?;
        self.expect_semicolon("after class definition")?;

        Ok(AstNode::ClassDef(ClassDef {
            name,
            base,
            members,
            location: loc,
        }))
    }

    /// Parse one member declaration, appending to `members`
    fn parse_class_member(
        &mut self,
        class_name: &str,
        members: &mut Vec<ClassMember>,
    ) -> Result<(), ParseError> {
        let loc = self.current_location();

        // Access specifiers carry no meaning in this subset
        if self.match_token(&Token::Public(loc))
            || self.match_token(&Token::Private(loc))
            || self.match_token(&Token::Protected(loc))
        {
            self.expect_token(
                &Token::Colon(self.current_location()),
                "Expected ':' after access specifier",
            )?;
            return Ok(());
        }

        if self.match_token(&Token::Semicolon(loc)) {
            return Ok(());
        }

        // Destructor
        if self.match_token(&Token::Tilde(loc)) {
            let name = self.expect_identifier()?;
            if name != class_name {
                return self.error(format!("Destructor name '~{}' does not match class", name));
            }
            let def = self.parse_function_rest(
                format!("~{}", name),
                TypeName::new(BaseType::Void),
                FunctionKind::Destructor,
                loc,
            )?;
            members.push(ClassMember::Method(def));
            return Ok(());
        }

        // Constructor
        if matches!(self.peek(), Token::Ident(name, _) if name == class_name)
            && matches!(self.peek_ahead(1), Some(Token::LParen(_)))
        {
            self.advance();
            let def = self.parse_function_rest(
                class_name.to_string(),
                TypeName::new(BaseType::Void),
                FunctionKind::Constructor,
                loc,
            )?;
            members.push(ClassMember::Method(def));
            return Ok(());
        }

        let spec = self.parse_type_specifier()?;

        if self.match_token(&Token::Operator(self.current_location())) {
            let name = self.parse_operator_name()?;
            let def = self.parse_function_rest(name, spec, FunctionKind::Ordinary, loc)?;
            members.push(ClassMember::Method(def));
            return Ok(());
        }

        let (name, member_type, name_loc) = self.parse_declarator(&spec)?;

        if self.check(&Token::LParen(self.current_location())) {
            let def = self.parse_function_rest(name, member_type, FunctionKind::Ordinary, name_loc)?;
            members.push(ClassMember::Method(def));
            return Ok(());
        }

        let mut declarator = Some((name, member_type, name_loc));
        loop {
            let (name, var_type, location) = match declarator.take() {
                Some(d) => d,
                None => self.parse_declarator(&spec)?,
            };
            if self.check(&Token::Eq(self.current_location())) {
                return self.error("Default member initializers are not supported");
            }
            members.push(ClassMember::Field(Declarator {
                name,
                var_type,
                init: None,
                location,
            }));
            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }
        self.expect_semicolon("after member declaration")?;
        Ok(())
    }

    /// Parse the remainder of a function after its name:
    /// (params) [const] [: ctor-inits] (body | ;)
    pub(crate) fn parse_function_rest(
        &mut self,
        name: String,
        return_type: TypeName,
        kind: FunctionKind,
        location: SourceLocation,
    ) -> Result<FunctionDef, ParseError> {
        self.expect_lparen("after function name")?;
        let params = self.parse_parameter_list()?;
        self.expect_rparen("after parameters")?;

        let is_const = self.match_token(&Token::Const(self.current_location()));

        let mut ctor_initializers = Vec::new();
        if kind == FunctionKind::Constructor && self.match_token(&Token::Colon(self.current_location())) {
            loop {
                let init_loc = self.current_location();
                let member = self.expect_identifier()?;
                let args = if self.match_token(&Token::LBrace(self.current_location())) {
                    let args = self.parse_argument_list_until(&Token::RBrace(self.current_location()))?;
                    self.expect_rbrace("after member initializer")?;
                    args
                } else {
                    self.expect_lparen("after member name in initializer list")?;
                    let args = self.parse_argument_list_until(&Token::RParen(self.current_location()))?;
                    self.expect_rparen("after member initializer")?;
                    args
                };
                ctor_initializers.push(MemberInit {
                    name: member,
                    args,
                    location: init_loc,
                });
                if !self.match_token(&Token::Comma(self.current_location())) {
                    break;
                }
            }
        }

        let body = if self.match_token(&Token::Semicolon(self.current_location())) {
            None
        } else {
            self.expect_lbrace("before function body")?;
            let body = self.parse_block_statements()?;
            self.expect_rbrace("after function body")?;
            Some(body)
        };

        Ok(FunctionDef {
            name,
            params,
            return_type,
            body,
            is_const,
            kind,
            ctor_initializers,
            location,
        })
    }

    /// Parse the operator symbol following the `operator` keyword
    fn parse_operator_name(&mut self) -> Result<String, ParseError> {
        if self.match_token(&Token::LBracket(self.current_location())) {
            self.expect_token(
                &Token::RBracket(self.current_location()),
                "Expected ']' in 'operator[]'",
            )?;
            return Ok("operator[]".to_string());
        }
        if self.check(&Token::LParen(self.current_location()))
            && matches!(self.peek_ahead(1), Some(Token::RParen(_)))
        {
            self.advance();
            self.advance();
            return Ok("operator()".to_string());
        }
        match self.peek().operator_spelling() {
            Some(op) => {
                self.advance();
                Ok(format!("operator{}", op))
            }
            None => self.error(format!("Expected operator symbol, found {}", self.peek())),
        }
    }

    /// Whether the `(` at the cursor opens a parameter list rather than a
    /// direct initializer
    fn looks_like_parameter_list(&self) -> bool {
        match self.peek_ahead(1) {
            Some(Token::RParen(_)) => true,
            Some(Token::Ident(name, _)) => self.class_names.contains(name) || name == "std",
            Some(
                Token::Int(_)
                | Token::Char(_)
                | Token::Bool(_)
                | Token::Float(_)
                | Token::Double(_)
                | Token::Void(_)
                | Token::Const(_)
                | Token::Class(_)
                | Token::Struct(_),
            ) => true,
            _ => false,
        }
    }

    /// Parse parameter list: (type [name], type [name], ...)
    pub(crate) fn parse_parameter_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        if self.check(&Token::RParen(self.current_location())) {
            return Ok(params);
        }

        // (void) means no parameters
        if self.check(&Token::Void(self.current_location()))
            && matches!(self.peek_ahead(1), Some(Token::RParen(_)))
        {
            self.advance();
            return Ok(params);
        }

        loop {
            let location = self.current_location();
            let spec = self.parse_type_specifier()?;
            let mut param_type = self.parse_abstract_declarator(spec)?;
            let name = if let Token::Ident(name, _) = self.peek_token() {
                self.advance();
                Some(name)
            } else {
                None
            };
            param_type.array_dims.extend(self.parse_array_dims()?);
            params.push(Param {
                name,
                param_type,
                location,
            });

            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }

        Ok(params)
    }

    /// Parse declarators after the first one, with their initializers, up to `;`
    pub(crate) fn parse_declarator_list(
        &mut self,
        spec: &TypeName,
        name: String,
        var_type: TypeName,
        location: SourceLocation,
    ) -> Result<Vec<Declarator>, ParseError> {
        let mut declarators = Vec::new();
        let mut current = Some((name, var_type, location));

        loop {
            let (name, var_type, location) = match current.take() {
                Some(d) => d,
                None => self.parse_declarator(spec)?,
            };
            let init = self.parse_initializer()?;
            declarators.push(Declarator {
                name,
                var_type,
                init,
                location,
            });
            if !self.match_token(&Token::Comma(self.current_location())) {
                break;
            }
        }

        self.expect_semicolon("after declaration")?;
        Ok(declarators)
    }

    /// Parse an optional initializer: `= expr`, `= {..}`, `(args)`, `{..}`
    pub(crate) fn parse_initializer(&mut self) -> Result<Option<InitSyntax>, ParseError> {
        if self.match_token(&Token::Eq(self.current_location())) {
            if self.match_token(&Token::LBrace(self.current_location())) {
                let elems = self.parse_argument_list_until(&Token::RBrace(self.current_location()))?;
                self.expect_rbrace("after initializer list")?;
                return Ok(Some(if elems.is_empty() {
                    InitSyntax::Value
                } else {
                    InitSyntax::List(elems)
                }));
            }
            let expr = self.parse_assignment_expression()?;
            return Ok(Some(InitSyntax::Copy(Box::new(expr))));
        }

        if self.match_token(&Token::LParen(self.current_location())) {
            let args = self.parse_argument_list_until(&Token::RParen(self.current_location()))?;
            self.expect_rparen("after initializer arguments")?;
            return Ok(Some(InitSyntax::Direct(args)));
        }

        if self.match_token(&Token::LBrace(self.current_location())) {
            let elems = self.parse_argument_list_until(&Token::RBrace(self.current_location()))?;
            self.expect_rbrace("after initializer list")?;
            return Ok(Some(if elems.is_empty() {
                InitSyntax::Value
            } else {
                InitSyntax::List(elems)
            }));
        }

        Ok(None)
    }

    /// Parse a type specifier: [const] base_type [const]
    pub(crate) fn parse_type_specifier(&mut self) -> Result<TypeName, ParseError> {
        let mut is_const = self.match_token(&Token::Const(self.current_location()));

        // Elaborated type specifiers are accepted
        let _ = self.match_token(&Token::Class(self.current_location()))
            || self.match_token(&Token::Struct(self.current_location()));
        self.skip_std_qualifier();

        let base = match self.peek_token() {
            Token::Int(_) => BaseType::Int,
            Token::Char(_) => BaseType::Char,
            Token::Bool(_) => BaseType::Bool,
            Token::Float(_) => BaseType::Float,
            Token::Double(_) => BaseType::Double,
            Token::Void(_) => BaseType::Void,
            Token::Ident(name, _) if self.class_names.contains(&name) => BaseType::Named(name),
            _ => return self.error(format!("Expected type, found {}", self.peek())),
        };
        self.advance();

        if self.match_token(&Token::Const(self.current_location())) {
            is_const = true;
        }

        let mut spec = TypeName::new(base);
        spec.is_const = is_const;
        Ok(spec)
    }

    /// Parse pointer and reference operators applied to a specifier
    pub(crate) fn parse_abstract_declarator(&mut self, mut ty: TypeName) -> Result<TypeName, ParseError> {
        while self.match_token(&Token::Star(self.current_location())) {
            let is_const = self.match_token(&Token::Const(self.current_location()));
            ty.pointers.push(is_const);
        }
        if self.match_token(&Token::Amp(self.current_location())) {
            ty.is_reference = true;
        }
        if self.check(&Token::AndAnd(self.current_location())) {
            return self.error("Rvalue references are not supported");
        }
        Ok(ty)
    }

    /// Parse a named declarator: ptr-ops name [dims]
    pub(crate) fn parse_declarator(
        &mut self,
        spec: &TypeName,
    ) -> Result<(String, TypeName, SourceLocation), ParseError> {
        let mut ty = self.parse_abstract_declarator(spec.clone())?;
        let location = self.current_location();
        let name = self.expect_identifier()?;
        ty.array_dims = self.parse_array_dims()?;
        Ok((name, ty, location))
    }

    /// Parse array bounds: [N][M]...; `[]` yields an unknown bound
    fn parse_array_dims(&mut self) -> Result<Vec<Option<usize>>, ParseError> {
        let mut dims = Vec::new();
        while self.match_token(&Token::LBracket(self.current_location())) {
            if self.match_token(&Token::RBracket(self.current_location())) {
                dims.push(None);
                continue;
            }
            match self.peek_token() {
                Token::IntLiteral(n, _) if n >= 0 => {
                    self.advance();
                    dims.push(Some(n as usize));
                }
                _ => return self.error("Array size must be a constant integer"),
            }
            self.expect_token(
                &Token::RBracket(self.current_location()),
                "Expected ']' after array size",
            )?;
        }
        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn parse(source: &str) -> SourceFile {
        Parser::new(source)
            .expect("Parser creation failed")
            .parse_source_file()
            .expect("Parse failed")
    }

    #[test]
    fn test_pointer_and_reference_declarators() {
        let file = parse("int main() { const int* const* p; int& r = *p[0]; int a[2][3]; }");
        let AstNode::FunctionDef(def) = &file.nodes[0] else {
            panic!("Expected function");
        };
        let body = def.body.as_ref().unwrap();
        match &body[0] {
            AstNode::Declaration { declarators, .. } => {
                let ty = &declarators[0].var_type;
                assert!(ty.is_const);
                assert_eq!(ty.pointers, vec![true, false]);
            }
            _ => panic!("Expected declaration"),
        }
        match &body[1] {
            AstNode::Declaration { declarators, .. } => {
                assert!(declarators[0].var_type.is_reference);
                assert!(matches!(declarators[0].init, Some(InitSyntax::Copy(_))));
            }
            _ => panic!("Expected declaration"),
        }
        match &body[2] {
            AstNode::Declaration { declarators, .. } => {
                assert_eq!(declarators[0].var_type.array_dims, vec![Some(2), Some(3)]);
            }
            _ => panic!("Expected declaration"),
        }
    }

    #[test]
    fn test_initializer_forms() {
        let file = parse("int main() { int a = 1, b(2), c{3}, d{}, e[] = {1, 2}; }");
        let AstNode::FunctionDef(def) = &file.nodes[0] else {
            panic!("Expected function");
        };
        let AstNode::Declaration { declarators, .. } = &def.body.as_ref().unwrap()[0] else {
            panic!("Expected declaration");
        };
        assert_eq!(declarators.len(), 5);
        assert!(matches!(declarators[0].init, Some(InitSyntax::Copy(_))));
        assert!(matches!(declarators[1].init, Some(InitSyntax::Direct(_))));
        assert!(matches!(declarators[2].init, Some(InitSyntax::List(_))));
        assert!(matches!(declarators[3].init, Some(InitSyntax::Value)));
        assert_eq!(declarators[4].var_type.array_dims, vec![None]);
    }

    #[test]
    fn test_class_with_base_destructor_and_operator() {
        let file = parse(
            "class A { public: int v; };\n\
             class B : public A { public: ~B() {} B operator+(const B& o) const; };",
        );
        let AstNode::ClassDef(b) = &file.nodes[1] else {
            panic!("Expected class");
        };
        assert_eq!(b.base.as_deref(), Some("A"));
        let names: Vec<_> = b
            .members
            .iter()
            .map(|m| match m {
                ClassMember::Method(f) => f.name.clone(),
                ClassMember::Field(d) => d.name.clone(),
            })
            .collect();
        assert_eq!(names, vec!["~B", "operator+"]);
    }

    #[test]
    fn test_free_operator_and_forward_declaration() {
        let file = parse("class P; class P { }; bool operator==(P a, P b) { return true; }");
        assert_eq!(file.nodes.len(), 2);
        match &file.nodes[1] {
            AstNode::FunctionDef(def) => {
                assert_eq!(def.name, "operator==");
                assert_eq!(def.params.len(), 2);
            }
            _ => panic!("Expected operator function"),
        }
    }

    #[test]
    fn test_global_direct_initialization_is_not_a_function() {
        let file = parse("class P { public: P(int x) {} }; P origin(0);");
        assert!(matches!(file.nodes[1], AstNode::Declaration { .. }));
    }
}
