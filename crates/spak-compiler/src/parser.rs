// AISpec parser
// Recursive descent over the token stream, producing a positioned parse tree.

use crate::lexer::{Lexer, Token, TokenKind};
use crate::ParseError;

/// Parse tree root: optional metadata block plus exactly one system.
#[derive(Debug, Clone)]
pub struct SpecTree {
    /// Metadata pairs in source order; later keys override earlier ones
    /// during transformation.
    pub meta: Vec<(String, String)>,
    pub system: SystemNode,
}

#[derive(Debug, Clone)]
pub struct SystemNode {
    pub name: String,
    pub decls: Vec<DeclNode>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub enum DeclNode {
    Component(ComponentNode),
    Effect(EffectNode),
    Workflow(WorkflowNode),
    Import {
        name: String,
        line: u32,
        column: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ComponentNode {
    pub name: String,
    pub members: Vec<MemberNode>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub enum MemberNode {
    Description(String),
    State { name: String, fields: Vec<FieldNode> },
    Function(FunctionNode),
    Invariant(String),
    Constraint(String),
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<FieldNode>,
    pub return_type: TypeNode,
    pub body: Option<String>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct EffectNode {
    pub name: String,
    pub operations: Vec<FunctionNode>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub name: String,
    pub params: Vec<FieldNode>,
    pub steps: Vec<StepNode>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct StepNode {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct FieldNode {
    pub name: String,
    pub ty: TypeNode,
}

#[derive(Debug, Clone)]
pub struct TypeNode {
    pub name: String,
    pub args: Vec<TypeNode>,
    pub line: u32,
    pub column: u32,
}

/// Parse AISpec source into a [`SpecTree`]. No partial tree is returned on
/// failure.
pub fn parse(source: &str) -> Result<SpecTree, ParseError> {
    Parser::new(source).parse_spec()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().expect("token was just peeked"))
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        ParseError::Syntax {
            path: None,
            line: token.line,
            column: token.column,
            token: token.kind.to_string(),
            expected: expected.to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.unexpected(&token, expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(String, u32, u32), ParseError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.line, token.column)),
            _ => Err(self.unexpected(&token, expected)),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<Token, ParseError> {
        let token = self.next()?;
        if token.kind.is_ident(word) {
            Ok(token)
        } else {
            Err(self.unexpected(&token, &format!("`{}`", word)))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if &self.peek()?.kind == kind {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Opaque logic body: raw text up to the enclosing `}`. Only legal when
    /// no token is buffered, which the call sites guarantee by consuming
    /// through `expect`/`next` immediately before.
    fn raw_body(&mut self) -> Result<String, ParseError> {
        debug_assert!(self.peeked.is_none());
        self.lexer.raw_until_brace()
    }

    fn parse_spec(&mut self) -> Result<SpecTree, ParseError> {
        let meta = if self.peek()?.kind.is_ident("meta") {
            self.parse_meta()?
        } else {
            Vec::new()
        };

        let system = self.parse_system()?;

        let token = self.next()?;
        if token.kind != TokenKind::Eof {
            return Err(self.unexpected(&token, "end of input"));
        }
        Ok(SpecTree { meta, system })
    }

    fn parse_meta(&mut self) -> Result<Vec<(String, String)>, ParseError> {
        self.expect_keyword("meta")?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut pairs = Vec::new();
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::RBrace => return Ok(pairs),
                TokenKind::Ident(key) => {
                    self.expect(TokenKind::Eq, "`=`")?;
                    let value = self.next()?;
                    match value.kind {
                        TokenKind::Str(text) => pairs.push((key, text)),
                        _ => return Err(self.unexpected(&value, "string literal")),
                    }
                }
                _ => return Err(self.unexpected(&token, "metadata key or `}`")),
            }
        }
    }

    fn parse_system(&mut self) -> Result<SystemNode, ParseError> {
        self.expect_keyword("system")?;
        let (name, line, column) = self.expect_ident("system name")?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut decls = Vec::new();
        loop {
            if self.eat(&TokenKind::Semi)? {
                continue;
            }
            let token = self.peek()?;
            match &token.kind {
                TokenKind::RBrace => {
                    self.next()?;
                    return Ok(SystemNode {
                        name,
                        decls,
                        line,
                        column,
                    });
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "component" => decls.push(DeclNode::Component(self.parse_component()?)),
                    "effect" => decls.push(DeclNode::Effect(self.parse_effect()?)),
                    "workflow" => decls.push(DeclNode::Workflow(self.parse_workflow()?)),
                    "import" => {
                        self.next()?;
                        let (name, line, column) = self.expect_ident("import name")?;
                        decls.push(DeclNode::Import { name, line, column });
                    }
                    _ => {
                        let token = self.next()?;
                        return Err(self.unexpected(
                            &token,
                            "`component`, `effect`, `workflow`, or `import`",
                        ));
                    }
                },
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "declaration or `}`"));
                }
            }
        }
    }

    fn parse_component(&mut self) -> Result<ComponentNode, ParseError> {
        self.expect_keyword("component")?;
        let (name, line, column) = self.expect_ident("component name")?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut members = Vec::new();
        loop {
            if self.eat(&TokenKind::Semi)? {
                continue;
            }
            let token = self.peek()?;
            match &token.kind {
                TokenKind::RBrace => {
                    self.next()?;
                    return Ok(ComponentNode {
                        name,
                        members,
                        line,
                        column,
                    });
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "description" => {
                        self.next()?;
                        self.expect(TokenKind::Colon, "`:`")?;
                        let value = self.next()?;
                        match value.kind {
                            TokenKind::Str(text) => members.push(MemberNode::Description(text)),
                            _ => return Err(self.unexpected(&value, "string literal")),
                        }
                    }
                    "state" => {
                        self.next()?;
                        let (name, _, _) = self.expect_ident("state name")?;
                        self.expect(TokenKind::LBrace, "`{`")?;
                        let fields = self.parse_state_fields()?;
                        members.push(MemberNode::State { name, fields });
                    }
                    "function" => {
                        let function = self.parse_function(true)?;
                        members.push(MemberNode::Function(function));
                    }
                    "invariant" => {
                        self.next()?;
                        self.expect(TokenKind::Colon, "`:`")?;
                        members.push(MemberNode::Invariant(self.raw_body()?));
                    }
                    "constraint" => {
                        self.next()?;
                        self.expect(TokenKind::Colon, "`:`")?;
                        members.push(MemberNode::Constraint(self.raw_body()?));
                    }
                    _ => {
                        let token = self.next()?;
                        return Err(self.unexpected(&token, "component member"));
                    }
                },
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "component member or `}`"));
                }
            }
        }
    }

    /// `function NAME(params) -> type [; | { body }]`, or an effect
    /// `operation` when `allow_body` is false.
    fn parse_function(&mut self, allow_body: bool) -> Result<FunctionNode, ParseError> {
        self.next()?; // `function` / `operation` keyword, checked by caller
        let (name, line, column) = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::Arrow, "`->`")?;
        let return_type = self.parse_type()?;

        let mut body = None;
        if self.eat(&TokenKind::Semi)? {
            // bodiless form, explicit terminator
        } else if allow_body && self.peek()?.kind == TokenKind::LBrace {
            self.next()?;
            body = Some(self.raw_body()?);
            self.expect(TokenKind::RBrace, "`}`")?;
        }

        Ok(FunctionNode {
            name,
            params,
            return_type,
            body,
            line,
            column,
        })
    }

    fn parse_effect(&mut self) -> Result<EffectNode, ParseError> {
        self.expect_keyword("effect")?;
        let (name, line, column) = self.expect_ident("effect name")?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut operations = Vec::new();
        loop {
            if self.eat(&TokenKind::Semi)? {
                continue;
            }
            let token = self.peek()?;
            match &token.kind {
                TokenKind::RBrace => {
                    self.next()?;
                    return Ok(EffectNode {
                        name,
                        operations,
                        line,
                        column,
                    });
                }
                TokenKind::Ident(word) if word == "operation" => {
                    operations.push(self.parse_function(false)?);
                }
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "`operation` or `}`"));
                }
            }
        }
    }

    fn parse_workflow(&mut self) -> Result<WorkflowNode, ParseError> {
        self.expect_keyword("workflow")?;
        let (name, line, column) = self.expect_ident("workflow name")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut steps = Vec::new();
        loop {
            if self.eat(&TokenKind::Semi)? {
                continue;
            }
            let token = self.peek()?;
            match &token.kind {
                TokenKind::RBrace => {
                    self.next()?;
                    return Ok(WorkflowNode {
                        name,
                        params,
                        steps,
                        line,
                        column,
                    });
                }
                TokenKind::Ident(word) if word == "step" => {
                    self.next()?;
                    let (name, _, _) = self.expect_ident("step name")?;
                    self.expect(TokenKind::LBrace, "`{`")?;
                    let body = self.raw_body()?;
                    self.expect(TokenKind::RBrace, "`}`")?;
                    steps.push(StepNode { name, body });
                }
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "`step` or `}`"));
                }
            }
        }
    }

    /// State fields: whitespace-separated `name: type` declarations,
    /// permissive about interleaved `,`/`;`.
    fn parse_state_fields(&mut self) -> Result<Vec<FieldNode>, ParseError> {
        let mut fields = Vec::new();
        loop {
            if self.eat(&TokenKind::Comma)? || self.eat(&TokenKind::Semi)? {
                continue;
            }
            let token = self.peek()?;
            match &token.kind {
                TokenKind::RBrace => {
                    self.next()?;
                    return Ok(fields);
                }
                TokenKind::Ident(_) => fields.push(self.parse_field()?),
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "field declaration or `}`"));
                }
            }
        }
    }

    /// Parameter list: `(` already consumed by the caller for workflows and
    /// functions; comma-separated, possibly empty.
    fn parse_params(&mut self) -> Result<Vec<FieldNode>, ParseError> {
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen)? {
            return Ok(params);
        }
        loop {
            params.push(self.parse_field()?);
            let token = self.next()?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(params),
                _ => return Err(self.unexpected(&token, "`,` or `)`")),
            }
        }
    }

    fn parse_field(&mut self) -> Result<FieldNode, ParseError> {
        let (name, _, _) = self.expect_ident("field name")?;
        self.expect(TokenKind::Colon, "`:`")?;
        let ty = self.parse_type()?;
        Ok(FieldNode { name, ty })
    }

    /// Type reference: a bare name, or `List`/`Map`/`Result` followed by
    /// generic arguments in either `[...]` or `<...>` form.
    fn parse_type(&mut self) -> Result<TypeNode, ParseError> {
        let (name, line, column) = self.expect_ident("type name")?;

        let takes_args = matches!(name.as_str(), "List" | "Map" | "Result");
        let mut args = Vec::new();
        if takes_args {
            let closer = match self.peek()?.kind {
                TokenKind::LBracket => {
                    self.next()?;
                    TokenKind::RBracket
                }
                TokenKind::Lt => {
                    self.next()?;
                    TokenKind::Gt
                }
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "`[` or `<`"));
                }
            };
            loop {
                args.push(self.parse_type()?);
                let token = self.next()?;
                if token.kind == TokenKind::Comma {
                    continue;
                }
                if token.kind == closer {
                    break;
                }
                return Err(self.unexpected(&token, "`,` or closing bracket"));
            }
        }

        Ok(TypeNode {
            name,
            args,
            line,
            column,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_system() {
        let tree = parse("system Foo { }").unwrap();
        assert_eq!(tree.system.name, "Foo");
        assert!(tree.meta.is_empty());
        assert!(tree.system.decls.is_empty());
    }

    #[test]
    fn parses_meta_pairs_in_order() {
        let tree = parse(r#"meta { version = "1" author = "ops" } system S { }"#).unwrap();
        assert_eq!(
            tree.meta,
            vec![
                ("version".to_string(), "1".to_string()),
                ("author".to_string(), "ops".to_string()),
            ]
        );
    }

    #[test]
    fn parses_component_with_members() {
        let source = r#"
            system Demo {
                component Chat {
                    description: "A chat component"
                    state Memory {
                        history: List[Text]
                        turns: Int
                    }
                    function chat(message: Text) -> Text;
                    function reset() -> Unit { clear history }
                }
            }
        "#;
        let tree = parse(source).unwrap();
        let DeclNode::Component(component) = &tree.system.decls[0] else {
            panic!("expected component");
        };
        assert_eq!(component.name, "Chat");
        assert_eq!(component.members.len(), 4);
        match &component.members[3] {
            MemberNode::Function(f) => {
                assert_eq!(f.name, "reset");
                assert_eq!(f.body.as_deref(), Some("clear history"));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn parses_generic_types_in_both_brackets() {
        let source = "system S { component C { function f(m: Map<Text, Int>) -> List[Text]; } }";
        let tree = parse(source).unwrap();
        let DeclNode::Component(component) = &tree.system.decls[0] else {
            panic!("expected component");
        };
        let MemberNode::Function(f) = &component.members[0] else {
            panic!("expected function");
        };
        assert_eq!(f.params[0].ty.name, "Map");
        assert_eq!(f.params[0].ty.args.len(), 2);
        assert_eq!(f.return_type.name, "List");
    }

    #[test]
    fn parses_effect_and_workflow() {
        let source = r#"
            system S {
                effect Net {
                    operation fetch(url: Text) -> Text;
                }
                workflow respond(query: Text) {
                    step understand { parse the query }
                    step answer { reply with the result }
                }
                import Common
            }
        "#;
        let tree = parse(source).unwrap();
        assert_eq!(tree.system.decls.len(), 3);
        let DeclNode::Workflow(workflow) = &tree.system.decls[1] else {
            panic!("expected workflow");
        };
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[0].body, "parse the query");
    }

    #[test]
    fn reports_position_of_offending_token() {
        let err = parse("system Foo { component }").unwrap_err();
        match err {
            ParseError::Syntax {
                line,
                column,
                token,
                ..
            } => {
                assert_eq!(line, 1);
                assert_eq!(column, 24);
                assert_eq!(token, "`}`");
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn no_partial_tree_on_failure() {
        assert!(parse("system Foo {").is_err());
        assert!(parse("component Bar { }").is_err());
    }
}
