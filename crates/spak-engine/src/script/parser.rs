// AgentScript parser
// nom-based lexer/parser for the restricted artifact language.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1, not_line_ending},
    combinator::{map, map_res, not, opt, recognize, value},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::ast::{
    BinaryOp, ComponentDecl, Expr, Literal, MethodDecl, ScriptFile, Stmt, UnaryOp,
};
use super::ScriptError;

/// Words that can never be variable names.
const RESERVED: &[&str] = &[
    "let", "return", "if", "else", "for", "in", "component", "fn", "import", "true", "false",
    "null",
];

/// Parse an AgentScript source into a [`ScriptFile`].
pub fn parse_script(source: &str) -> Result<ScriptFile, ScriptError> {
    match script_file(source) {
        Ok((rest, file)) => {
            if rest.trim().is_empty() {
                Ok(file)
            } else {
                Err(ScriptError::Parse(format!(
                    "invalid syntax near `{}`",
                    snippet(rest)
                )))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ScriptError::Parse(format!(
            "invalid syntax near `{}`",
            snippet(e.input)
        ))),
        Err(nom::Err::Incomplete(_)) => {
            Err(ScriptError::Parse("unexpected end of input".to_string()))
        }
    }
}

fn snippet(input: &str) -> String {
    let flat: String = input
        .trim_start()
        .chars()
        .take(30)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    flat
}

enum Item {
    Component(ComponentDecl),
    Statement(Stmt),
}

fn script_file(input: &str) -> IResult<&str, ScriptFile> {
    let (input, items) = many0(preceded(sep0, item))(input)?;
    let (input, _) = sep0(input)?;

    let mut components = Vec::new();
    let mut statements = Vec::new();
    for item in items {
        match item {
            Item::Component(component) => components.push(component),
            Item::Statement(statement) => statements.push(statement),
        }
    }
    Ok((
        input,
        ScriptFile {
            components,
            statements,
        },
    ))
}

fn item(input: &str) -> IResult<&str, Item> {
    alt((
        map(component_decl, Item::Component),
        map(statement, Item::Statement),
    ))(input)
}

/// Whitespace and comments between tokens.
fn trivia0(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(tag("//"), not_line_ending)),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

/// Statement separators: trivia plus stray semicolons.
fn sep0(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), char(';')),
            value((), pair(tag("//"), not_line_ending)),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

fn sym<'a>(t: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(trivia0, tag(t))
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        preceded(
            trivia0,
            recognize(pair(
                alt((alpha1, tag("_"))),
                many0(alt((alphanumeric1, tag("_")))),
            )),
        ),
        |s: &str| s.to_string(),
    )(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    map_res(identifier, move |id| {
        if id == word {
            Ok(())
        } else {
            Err(())
        }
    })
}

fn variable_name(input: &str) -> IResult<&str, String> {
    map_res(identifier, |id| {
        if RESERVED.contains(&id.as_str()) {
            Err(())
        } else {
            Ok(id)
        }
    })(input)
}

// --- Declarations ---

fn component_decl(input: &str) -> IResult<&str, ComponentDecl> {
    let (input, _) = keyword("component")(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = sym("{")(input)?;
    let (input, methods) = many0(preceded(sep0, method_decl))(input)?;
    let (input, _) = sep0(input)?;
    let (input, _) = sym("}")(input)?;
    Ok((input, ComponentDecl { name, methods }))
}

fn method_decl(input: &str) -> IResult<&str, MethodDecl> {
    let (input, _) = keyword("fn")(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = sym("(")(input)?;
    let (input, params) = separated_list0(sym(","), variable_name)(input)?;
    let (input, _) = sym(")")(input)?;
    let (input, body) = block(input)?;
    Ok((input, MethodDecl { name, params, body }))
}

fn block(input: &str) -> IResult<&str, Vec<Stmt>> {
    let (input, _) = sym("{")(input)?;
    let (input, stmts) = many0(preceded(sep0, statement))(input)?;
    let (input, _) = sep0(input)?;
    let (input, _) = sym("}")(input)?;
    Ok((input, stmts))
}

// --- Statements ---

fn statement(input: &str) -> IResult<&str, Stmt> {
    alt((
        import_stmt,
        let_stmt,
        return_stmt,
        if_stmt,
        for_stmt,
        assign_stmt,
        map(expression, Stmt::Expr),
    ))(input)
}

fn import_stmt(input: &str) -> IResult<&str, Stmt> {
    let (input, _) = keyword("import")(input)?;
    let (input, name) = identifier(input)?;
    Ok((input, Stmt::Import(name)))
}

fn let_stmt(input: &str) -> IResult<&str, Stmt> {
    let (input, _) = keyword("let")(input)?;
    let (input, name) = variable_name(input)?;
    let (input, _) = assign_op(input)?;
    let (input, value) = expression(input)?;
    Ok((input, Stmt::Let { name, value }))
}

fn return_stmt(input: &str) -> IResult<&str, Stmt> {
    let (input, _) = keyword("return")(input)?;
    let (input, expr) = opt(expression)(input)?;
    Ok((input, Stmt::Return(expr)))
}

fn if_stmt(input: &str) -> IResult<&str, Stmt> {
    let (input, _) = keyword("if")(input)?;
    let (input, condition) = expression(input)?;
    let (input, then_branch) = block(input)?;
    let (input, else_branch) = opt(preceded(
        keyword("else"),
        alt((block, map(if_stmt, |stmt| vec![stmt]))),
    ))(input)?;
    Ok((
        input,
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        },
    ))
}

fn for_stmt(input: &str) -> IResult<&str, Stmt> {
    let (input, _) = keyword("for")(input)?;
    let (input, binding) = variable_name(input)?;
    let (input, _) = keyword("in")(input)?;
    let (input, iterable) = expression(input)?;
    let (input, body) = block(input)?;
    Ok((
        input,
        Stmt::For {
            binding,
            iterable,
            body,
        },
    ))
}

/// A bare `=` that is not the first half of `==`.
fn assign_op(input: &str) -> IResult<&str, ()> {
    let (input, _) = sym("=")(input)?;
    let (input, _) = not(char('='))(input)?;
    Ok((input, ()))
}

fn assign_stmt(input: &str) -> IResult<&str, Stmt> {
    let (input, name) = variable_name(input)?;
    let (input, _) = assign_op(input)?;
    let (input, value) = expression(input)?;
    Ok((input, Stmt::Assign { name, value }))
}

// --- Expressions, lowest precedence first ---

fn expression(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

fn fold_binary<'a>(
    mut operand: impl FnMut(&'a str) -> IResult<&'a str, Expr>,
    mut operator: impl FnMut(&'a str) -> IResult<&'a str, BinaryOp>,
    input: &'a str,
) -> IResult<&'a str, Expr> {
    let (input, first) = operand(input)?;
    fold_many0(
        pair(&mut operator, &mut operand),
        move || first.clone(),
        |left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(and_expr, value(BinaryOp::Or, sym("||")), input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(equality_expr, value(BinaryOp::And, sym("&&")), input)
}

fn equality_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(
        comparison_expr,
        alt((value(BinaryOp::Eq, sym("==")), value(BinaryOp::Ne, sym("!=")))),
        input,
    )
}

fn comparison_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(
        additive_expr,
        alt((
            value(BinaryOp::Le, sym("<=")),
            value(BinaryOp::Ge, sym(">=")),
            value(BinaryOp::Lt, sym("<")),
            value(BinaryOp::Gt, sym(">")),
        )),
        input,
    )
}

fn additive_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(
        multiplicative_expr,
        alt((value(BinaryOp::Add, sym("+")), value(BinaryOp::Sub, sym("-")))),
        input,
    )
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    fold_binary(
        unary_expr,
        alt((
            value(BinaryOp::Mul, sym("*")),
            value(BinaryOp::Div, sym("/")),
            value(BinaryOp::Mod, sym("%")),
        )),
        input,
    )
}

fn unary_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(sym("-"), unary_expr), |expr| Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(expr),
        }),
        map(preceded(sym("!"), unary_expr), |expr| Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }),
        postfix_expr,
    ))(input)
}

/// Postfix chain: guarded attribute calls and item access.
fn postfix_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = primary_expr(input)?;

    enum Postfix {
        Method(String, Vec<Expr>),
        Index(Expr),
    }

    fold_many0(
        alt((
            map(
                tuple((
                    preceded(sym("."), identifier),
                    delimited(sym("("), call_args, sym(")")),
                )),
                |(method, args)| Postfix::Method(method, args),
            ),
            map(delimited(sym("["), expression, sym("]")), Postfix::Index),
        )),
        move || first.clone(),
        |target, postfix| match postfix {
            Postfix::Method(method, args) => Expr::MethodCall {
                target: Box::new(target),
                method,
                args,
            },
            Postfix::Index(index) => Expr::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
        },
    )(input)
}

fn call_args(input: &str) -> IResult<&str, Vec<Expr>> {
    separated_list0(sym(","), expression)(input)
}

fn primary_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(literal, Expr::Literal),
        ident_or_call,
        delimited(sym("("), expression, sym(")")),
        list_literal,
        map_literal,
    ))(input)
}

/// An identifier is a call when immediately applied, a variable otherwise.
fn ident_or_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = variable_name(input)?;
    match delimited(sym("("), call_args, sym(")"))(input) {
        Ok((input, args)) => Ok((
            input,
            Expr::Call {
                function: name,
                args,
            },
        )),
        Err(_) => Ok((input, Expr::Variable(name))),
    }
}

fn list_literal(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(sym("["), separated_list0(sym(","), expression), sym("]")),
        Expr::List,
    )(input)
}

fn map_literal(input: &str) -> IResult<&str, Expr> {
    let key = alt((string_literal, identifier));
    let entry = pair(terminated(key, sym(":")), expression);
    map(
        delimited(sym("{"), separated_list0(sym(","), entry), sym("}")),
        Expr::MapLit,
    )(input)
}

// --- Literals ---

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(number_literal, Literal::Number),
        map(string_literal, Literal::Text),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        value(Literal::Null, keyword("null")),
    ))(input)
}

fn number_literal(input: &str) -> IResult<&str, f64> {
    map_res(
        preceded(
            trivia0,
            recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        ),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    preceded(trivia0, alt((quoted('"'), quoted('\''))))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input| {
        delimited(
            char(quote),
            map(
                many0(alt((
                    map(
                        take_while1(move |c: char| c != quote && c != '\\'),
                        |s: &str| s.to_string(),
                    ),
                    map(pair(char('\\'), char('n')), |_| "\n".to_string()),
                    map(pair(char('\\'), char('t')), |_| "\t".to_string()),
                    map(pair(char('\\'), char('r')), |_| "\r".to_string()),
                    map(pair(char('\\'), char('\\')), |_| "\\".to_string()),
                    map(pair(char('\\'), char('"')), |_| "\"".to_string()),
                    map(pair(char('\\'), char('\'')), |_| "'".to_string()),
                ))),
                |parts| parts.join(""),
            ),
            char(quote),
        )(input)
    }
}
