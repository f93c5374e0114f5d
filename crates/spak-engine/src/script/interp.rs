// AgentScript interpreter
// Tree-walking evaluator with guarded access, captured output, and effect
// builtins bridging into the ambient runtime.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use spak_types::Value;

use crate::ambient::perform;
use crate::effect::{
    CodeExecution, Effect, FileRead, FileWrite, LlmRequest, MathOperation, Message, SubTask,
    UserInput, UserOutput,
};

use super::ast::{BinaryOp, ComponentDecl, Expr, Literal, ScriptFile, Stmt, UnaryOp};
use super::ScriptError;

/// Character budget applied to captured output.
pub const DEFAULT_OUTPUT_BUDGET: usize = 2000;

/// Sibling method calls may nest this deep before the run is aborted.
const MAX_CALL_DEPTH: u32 = 64;

/// The safe module allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Re,
    Math,
    Json,
}

impl Module {
    pub fn from_name(name: &str) -> Option<Module> {
        match name {
            "re" => Some(Module::Re),
            "math" => Some(Module::Math),
            "json" => Some(Module::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Module::Re => "re",
            Module::Math => "math",
            Module::Json => "json",
        }
    }
}

/// A persistent sandbox environment: variables, imported modules, and the
/// captured output buffer. One session is owned per code handler and per
/// component instance; sessions are never shared across runtimes.
#[derive(Debug, Default)]
pub struct Session {
    vars: HashMap<String, Value>,
    modules: HashSet<Module>,
    output: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a variable, mostly for tests and the interactive evaluator.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Drain the captured output buffer.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

/// Evaluate a snippet under the sandbox policy.
///
/// Compile-class failures return `Compilation Error: ...`, runtime failures
/// `Runtime Error: ...`; both are ordinary result strings. An empty capture
/// buffer yields the fixed success sentinel, otherwise the output is clipped
/// to `output_budget` characters. Variables persist in the session across
/// snippets; the output buffer is per-run.
pub fn run_snippet(
    session: &mut Session,
    source: &str,
    output_budget: usize,
    timeout: Duration,
) -> String {
    let file = match ScriptFile::compile(source) {
        Ok(file) => file,
        Err(e) => return format!("Compilation Error: {}", e),
    };

    session.output.clear();
    let deadline = Instant::now() + timeout;
    let Session {
        vars,
        modules,
        output,
    } = &mut *session;
    let mut ctx = Ctx {
        vars,
        modules,
        output,
        component: None,
        deadline: Some(deadline),
        depth: 0,
    };

    for stmt in &file.statements {
        match exec_stmt(&mut ctx, stmt) {
            Ok(Flow::Normal) => {}
            Ok(Flow::Return(_)) => break,
            Err(e) => return format!("Runtime Error: {}", e),
        }
    }

    if session.output.trim().is_empty() {
        return "Executed successfully (no output).".to_string();
    }
    clip(&session.output, output_budget)
}

fn clip(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    text.chars().take(budget).collect()
}

/// An instantiated component artifact.
///
/// Instantiation takes no arguments: the artifact's top-level statements run
/// once as module scope, and each method call starts from a copy of that
/// scope with the arguments bound over it.
#[derive(Debug)]
pub struct ComponentInstance {
    decl: ComponentDecl,
    session: RefCell<Session>,
}

impl ComponentInstance {
    pub fn instantiate(file: &ScriptFile, name: &str) -> Result<ComponentInstance, ScriptError> {
        let decl = file
            .component(name)
            .ok_or_else(|| ScriptError::UnknownName(name.to_string()))?
            .clone();

        let mut session = Session::new();
        {
            let Session {
                vars,
                modules,
                output,
            } = &mut session;
            let mut ctx = Ctx {
                vars,
                modules,
                output,
                component: Some(&decl),
                deadline: None,
                depth: 0,
            };
            for stmt in &file.statements {
                if let Flow::Return(_) = exec_stmt(&mut ctx, stmt)? {
                    break;
                }
            }
        }

        Ok(ComponentInstance {
            decl,
            session: RefCell::new(session),
        })
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.decl.method_names()
    }

    /// Invoke a method with arguments bound by parameter name.
    pub fn call(
        &self,
        method: &str,
        args: &BTreeMap<String, Value>,
    ) -> Result<Value, ScriptError> {
        let decl = self
            .decl
            .method(method)
            .ok_or_else(|| ScriptError::UnknownName(method.to_string()))?;

        for param in &decl.params {
            if !args.contains_key(param) {
                return Err(ScriptError::MissingArgument {
                    method: method.to_string(),
                    name: param.clone(),
                });
            }
        }
        for name in args.keys() {
            if !decl.params.contains(name) {
                return Err(ScriptError::UnknownArgument {
                    method: method.to_string(),
                    name: name.clone(),
                });
            }
        }

        let bound: Vec<(String, Value)> = decl
            .params
            .iter()
            .map(|p| (p.clone(), args[p].clone()))
            .collect();
        self.invoke(method, bound)
    }

    /// Invoke a method with positional arguments.
    pub fn call_positional(&self, method: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
        let decl = self
            .decl
            .method(method)
            .ok_or_else(|| ScriptError::UnknownName(method.to_string()))?;

        if decl.params.len() != args.len() {
            return Err(ScriptError::ArityMismatch {
                method: method.to_string(),
                expected: decl.params.len(),
                got: args.len(),
            });
        }

        let bound: Vec<(String, Value)> =
            decl.params.iter().cloned().zip(args).collect();
        self.invoke(method, bound)
    }

    fn invoke(&self, method: &str, bound: Vec<(String, Value)>) -> Result<Value, ScriptError> {
        let body = &self
            .decl
            .method(method)
            .ok_or_else(|| ScriptError::UnknownName(method.to_string()))?
            .body;

        let mut session = self.session.borrow_mut();
        let Session {
            vars: globals,
            modules,
            output,
        } = &mut *session;

        let mut locals = globals.clone();
        locals.extend(bound);

        let mut ctx = Ctx {
            vars: &mut locals,
            modules,
            output,
            component: Some(&self.decl),
            deadline: None,
            depth: 0,
        };
        match exec_block(&mut ctx, body)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Unit),
        }
    }

    /// Drain output captured by `print` calls inside methods.
    pub fn take_output(&self) -> String {
        self.session.borrow_mut().take_output()
    }
}

// --- Evaluation core ---

struct Ctx<'a> {
    vars: &'a mut HashMap<String, Value>,
    modules: &'a mut HashSet<Module>,
    output: &'a mut String,
    component: Option<&'a ComponentDecl>,
    deadline: Option<Instant>,
    depth: u32,
}

enum Flow {
    Normal,
    Return(Value),
}

fn check_deadline(ctx: &Ctx<'_>) -> Result<(), ScriptError> {
    if let Some(deadline) = ctx.deadline {
        if Instant::now() > deadline {
            return Err(ScriptError::Timeout);
        }
    }
    Ok(())
}

fn exec_block(ctx: &mut Ctx<'_>, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
    for stmt in stmts {
        if let Flow::Return(value) = exec_stmt(ctx, stmt)? {
            return Ok(Flow::Return(value));
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(ctx: &mut Ctx<'_>, stmt: &Stmt) -> Result<Flow, ScriptError> {
    check_deadline(ctx)?;
    match stmt {
        Stmt::Import(name) => {
            let module = Module::from_name(name).ok_or_else(|| {
                ScriptError::Restricted(format!("import of '{}' is not permitted", name))
            })?;
            ctx.modules.insert(module);
            Ok(Flow::Normal)
        }
        Stmt::Let { name, value } | Stmt::Assign { name, value } => {
            let value = eval(ctx, value)?;
            ctx.vars.insert(name.clone(), value);
            Ok(Flow::Normal)
        }
        Stmt::Return(expr) => {
            let value = match expr {
                Some(expr) => eval(ctx, expr)?,
                None => Value::Unit,
            };
            Ok(Flow::Return(value))
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval(ctx, condition)?.is_truthy() {
                exec_block(ctx, then_branch)
            } else if let Some(else_branch) = else_branch {
                exec_block(ctx, else_branch)
            } else {
                Ok(Flow::Normal)
            }
        }
        Stmt::For {
            binding,
            iterable,
            body,
        } => {
            // Guarded iteration: lists and strings only.
            let items: Vec<Value> = match eval(ctx, iterable)? {
                Value::List(items) => items,
                Value::Text(text) => text
                    .chars()
                    .map(|c| Value::Text(c.to_string()))
                    .collect(),
                other => {
                    return Err(ScriptError::Type(format!(
                        "value of type {} is not iterable",
                        type_name(&other)
                    )))
                }
            };
            for item in items {
                check_deadline(ctx)?;
                ctx.vars.insert(binding.clone(), item);
                if let Flow::Return(value) = exec_block(ctx, body)? {
                    return Ok(Flow::Return(value));
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Expr(expr) => {
            eval(ctx, expr)?;
            Ok(Flow::Normal)
        }
    }
}

fn eval(ctx: &mut Ctx<'_>, expr: &Expr) -> Result<Value, ScriptError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Number(n) => Value::Number(*n),
            Literal::Text(s) => Value::Text(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Unit,
        }),
        Expr::Variable(name) => ctx
            .vars
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UnknownName(name.clone())),
        Expr::Unary { op, expr } => {
            let value = eval(ctx, expr)?;
            match op {
                UnaryOp::Neg => match value {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    other => Err(ScriptError::Type(format!(
                        "cannot negate a {}",
                        type_name(&other)
                    ))),
                },
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = eval(ctx, left)?;
            match op {
                BinaryOp::And => {
                    if !left.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(eval(ctx, right)?.is_truthy()))
                }
                BinaryOp::Or => {
                    if left.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(eval(ctx, right)?.is_truthy()))
                }
                _ => {
                    let right = eval(ctx, right)?;
                    apply_binary(*op, left, right)
                }
            }
        }
        Expr::Call { function, args } => {
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(eval(ctx, arg)?);
            }
            call_function(ctx, function, argv)
        }
        Expr::MethodCall {
            target,
            method,
            args,
        } => {
            // Imported modules are addressed by bare name; a local variable
            // of the same name shadows the module.
            if let Expr::Variable(name) = target.as_ref() {
                if !ctx.vars.contains_key(name) {
                    if let Some(module) = Module::from_name(name) {
                        if ctx.modules.contains(&module) {
                            let mut argv = Vec::with_capacity(args.len());
                            for arg in args {
                                argv.push(eval(ctx, arg)?);
                            }
                            return call_module(module, method, argv);
                        }
                    }
                }
            }

            let receiver = eval(ctx, target)?;
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(eval(ctx, arg)?);
            }
            call_method(receiver, method, argv)
        }
        Expr::Index { target, index } => {
            let target = eval(ctx, target)?;
            let index = eval(ctx, index)?;
            item_access(target, index)
        }
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(ctx, item)?);
            }
            Ok(Value::List(out))
        }
        Expr::MapLit(entries) => {
            let mut out = BTreeMap::new();
            for (key, value) in entries {
                out.insert(key.clone(), eval(ctx, value)?);
            }
            Ok(Value::Map(out))
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Unit => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::Text(_) => "text",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, ScriptError> {
    use Value::{List, Number, Text};
    match (op, left, right) {
        (BinaryOp::Add, Number(a), Number(b)) => Ok(Number(a + b)),
        (BinaryOp::Add, Text(a), Text(b)) => Ok(Text(format!("{}{}", a, b))),
        (BinaryOp::Add, List(mut a), List(b)) => {
            a.extend(b);
            Ok(List(a))
        }
        (BinaryOp::Sub, Number(a), Number(b)) => Ok(Number(a - b)),
        (BinaryOp::Mul, Number(a), Number(b)) => Ok(Number(a * b)),
        (BinaryOp::Div, Number(a), Number(b)) => {
            if b == 0.0 {
                Err(ScriptError::Type("division by zero".to_string()))
            } else {
                Ok(Number(a / b))
            }
        }
        (BinaryOp::Mod, Number(a), Number(b)) => {
            if b == 0.0 {
                Err(ScriptError::Type("modulo by zero".to_string()))
            } else {
                Ok(Number(a % b))
            }
        }
        (BinaryOp::Eq, a, b) => Ok(Value::Bool(a == b)),
        (BinaryOp::Ne, a, b) => Ok(Value::Bool(a != b)),
        (BinaryOp::Lt, Number(a), Number(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::Le, Number(a), Number(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Gt, Number(a), Number(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::Ge, Number(a), Number(b)) => Ok(Value::Bool(a >= b)),
        (BinaryOp::Lt, Text(a), Text(b)) => Ok(Value::Bool(a < b)),
        (BinaryOp::Le, Text(a), Text(b)) => Ok(Value::Bool(a <= b)),
        (BinaryOp::Gt, Text(a), Text(b)) => Ok(Value::Bool(a > b)),
        (BinaryOp::Ge, Text(a), Text(b)) => Ok(Value::Bool(a >= b)),
        (op, left, right) => Err(ScriptError::Type(format!(
            "unsupported operand types for {:?}: {} and {}",
            op,
            type_name(&left),
            type_name(&right)
        ))),
    }
}

fn item_access(target: Value, index: Value) -> Result<Value, ScriptError> {
    match (target, index) {
        (Value::List(items), Value::Number(n)) => {
            let i = n as usize;
            if n < 0.0 || n.fract() != 0.0 || i >= items.len() {
                return Err(ScriptError::Index(format!(
                    "list index {} out of range (len {})",
                    n,
                    items.len()
                )));
            }
            Ok(items[i].clone())
        }
        (Value::Text(text), Value::Number(n)) => {
            let i = n as usize;
            match text.chars().nth(i) {
                Some(c) if n >= 0.0 && n.fract() == 0.0 => Ok(Value::Text(c.to_string())),
                _ => Err(ScriptError::Index(format!(
                    "string index {} out of range",
                    n
                ))),
            }
        }
        (Value::Map(entries), Value::Text(key)) => entries
            .get(&key)
            .cloned()
            .ok_or(ScriptError::Index(format!("key '{}' not found", key))),
        (target, index) => Err(ScriptError::Index(format!(
            "cannot index {} with {}",
            type_name(&target),
            type_name(&index)
        ))),
    }
}

// --- Builtins ---

fn call_function(
    ctx: &mut Ctx<'_>,
    function: &str,
    argv: Vec<Value>,
) -> Result<Value, ScriptError> {
    match function {
        "print" => {
            let line = argv
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            ctx.output.push_str(&line);
            ctx.output.push('\n');
            Ok(Value::Unit)
        }
        "len" => {
            let [value] = take_args::<1>(function, argv)?;
            let n = match &value {
                Value::Text(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(ScriptError::Type(format!(
                        "len() does not apply to {}",
                        type_name(other)
                    )))
                }
            };
            Ok(Value::Number(n as f64))
        }
        "str" => {
            let [value] = take_args::<1>(function, argv)?;
            Ok(Value::Text(value.to_string()))
        }
        "num" => {
            let [value] = take_args::<1>(function, argv)?;
            match value {
                Value::Number(n) => Ok(Value::Number(n)),
                Value::Bool(b) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
                Value::Text(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
                    ScriptError::Type(format!("cannot convert '{}' to a number", s))
                }),
                other => Err(ScriptError::Type(format!(
                    "cannot convert {} to a number",
                    type_name(&other)
                ))),
            }
        }
        "range" => {
            let (start, end) = match argv.len() {
                1 => (0.0, expect_number(function, &argv[0])?),
                2 => (
                    expect_number(function, &argv[0])?,
                    expect_number(function, &argv[1])?,
                ),
                n => {
                    return Err(ScriptError::Type(format!(
                        "range() takes 1 or 2 arguments, got {}",
                        n
                    )))
                }
            };
            let mut items = Vec::new();
            let mut current = start;
            while current < end {
                items.push(Value::Number(current));
                current += 1.0;
            }
            Ok(Value::List(items))
        }

        // Effect bridge: synthesized code reaches the ambient runtime here.
        "llm" => {
            let prompt = match argv.len() {
                1 | 2 => expect_text(function, &argv[0])?,
                n => {
                    return Err(ScriptError::Type(format!(
                        "llm() takes 1 or 2 arguments, got {}",
                        n
                    )))
                }
            };
            let mut request = LlmRequest::prompt(prompt);
            if argv.len() == 2 {
                request.model = Some(expect_text(function, &argv[1])?);
            }
            perform_effect(Effect::Generate(request))
        }
        "math" => {
            let [op, a, b] = take_args::<3>(function, argv)?;
            let op = expect_text(function, &op)?;
            let a = expect_number(function, &a)?;
            let b = expect_number(function, &b)?;
            perform_effect(Effect::Math(MathOperation::new(op, a, b)))
        }
        "read_file" => {
            let [path] = take_args::<1>(function, argv)?;
            perform_effect(Effect::ReadFile(FileRead {
                path: PathBuf::from(expect_text(function, &path)?),
            }))
        }
        "write_file" => {
            let [path, content] = take_args::<2>(function, argv)?;
            perform_effect(Effect::WriteFile(FileWrite {
                path: PathBuf::from(expect_text(function, &path)?),
                content: expect_text(function, &content)?,
            }))
        }
        "listen" => {
            let prompt = match argv.len() {
                0 => None,
                1 => Some(expect_text(function, &argv[0])?),
                n => {
                    return Err(ScriptError::Type(format!(
                        "listen() takes 0 or 1 arguments, got {}",
                        n
                    )))
                }
            };
            perform_effect(Effect::Listen(UserInput { prompt }))
        }
        "reply" => {
            let [message] = take_args::<1>(function, argv)?;
            perform_effect(Effect::Reply(UserOutput {
                message: message.to_string(),
            }))
        }
        "send_message" => {
            let [recipient, content] = take_args::<2>(function, argv)?;
            let recipient = match recipient {
                Value::Unit => None,
                other => Some(expect_text(function, &other)?),
            };
            perform_effect(Effect::SendMessage(Message {
                recipient,
                content: expect_text(function, &content)?,
                broadcast: false,
            }))
        }
        "broadcast" => {
            let [content] = take_args::<1>(function, argv)?;
            perform_effect(Effect::SendMessage(Message {
                recipient: None,
                content: expect_text(function, &content)?,
                broadcast: true,
            }))
        }
        "execute" => {
            let [code] = take_args::<1>(function, argv)?;
            perform_effect(Effect::ExecuteCode(CodeExecution::new(expect_text(
                function, &code,
            )?)))
        }
        "recurse" => {
            if argv.len() != 2 && argv.len() != 3 {
                return Err(ScriptError::Type(format!(
                    "recurse() takes 2 or 3 arguments, got {}",
                    argv.len()
                )));
            }
            let query = expect_text(function, &argv[0])?;
            let spec_path = expect_text(function, &argv[1])?;
            let context = if argv.len() == 3 {
                expect_text(function, &argv[2])?
            } else {
                String::new()
            };
            perform_effect(Effect::Recurse(SubTask {
                query,
                spec_path: Some(PathBuf::from(spec_path)),
                context,
            }))
        }

        // Sibling methods of the enclosing component.
        _ => {
            if let Some(component) = ctx.component {
                if let Some(method) = component.method(function) {
                    if ctx.depth >= MAX_CALL_DEPTH {
                        return Err(ScriptError::Type("call depth exceeded".to_string()));
                    }
                    if method.params.len() != argv.len() {
                        return Err(ScriptError::ArityMismatch {
                            method: function.to_string(),
                            expected: method.params.len(),
                            got: argv.len(),
                        });
                    }
                    let mut locals: HashMap<String, Value> = method
                        .params
                        .iter()
                        .cloned()
                        .zip(argv)
                        .collect();
                    let mut inner = Ctx {
                        vars: &mut locals,
                        modules: &mut *ctx.modules,
                        output: &mut *ctx.output,
                        component: ctx.component,
                        deadline: ctx.deadline,
                        depth: ctx.depth + 1,
                    };
                    return match exec_block(&mut inner, &method.body)? {
                        Flow::Return(value) => Ok(value),
                        Flow::Normal => Ok(Value::Unit),
                    };
                }
            }
            Err(ScriptError::UnknownName(function.to_string()))
        }
    }
}

fn perform_effect(effect: Effect) -> Result<Value, ScriptError> {
    perform(effect).map_err(|e| ScriptError::Effect(e.to_string()))
}

fn take_args<const N: usize>(
    function: &str,
    argv: Vec<Value>,
) -> Result<[Value; N], ScriptError> {
    let got = argv.len();
    argv.try_into().map_err(|_| {
        ScriptError::Type(format!("{}() takes {} argument(s), got {}", function, N, got))
    })
}

fn expect_text(function: &str, value: &Value) -> Result<String, ScriptError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        other => Err(ScriptError::Type(format!(
            "{}() expected text, got {}",
            function,
            type_name(other)
        ))),
    }
}

fn expect_number(function: &str, value: &Value) -> Result<f64, ScriptError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(ScriptError::Type(format!(
            "{}() expected a number, got {}",
            function,
            type_name(other)
        ))),
    }
}

// --- Guarded attribute access ---

fn call_method(receiver: Value, method: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    match receiver {
        Value::Text(text) => text_method(&text, method, argv),
        Value::List(items) => list_method(items, method, argv),
        Value::Map(entries) => map_method(&entries, method, argv),
        other => Err(ScriptError::Attribute(format!(
            "no method '{}' on {}",
            method,
            type_name(&other)
        ))),
    }
}

fn text_method(text: &str, method: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    match method {
        "upper" => Ok(Value::Text(text.to_uppercase())),
        "lower" => Ok(Value::Text(text.to_lowercase())),
        "trim" => Ok(Value::Text(text.trim().to_string())),
        "contains" => {
            let [needle] = take_args::<1>(method, argv)?;
            Ok(Value::Bool(text.contains(&expect_text(method, &needle)?)))
        }
        "starts_with" => {
            let [prefix] = take_args::<1>(method, argv)?;
            Ok(Value::Bool(
                text.starts_with(&expect_text(method, &prefix)?),
            ))
        }
        "split" => {
            let [separator] = take_args::<1>(method, argv)?;
            let separator = expect_text(method, &separator)?;
            Ok(Value::List(
                text.split(separator.as_str())
                    .map(|part| Value::Text(part.to_string()))
                    .collect(),
            ))
        }
        "replace" => {
            let [from, to] = take_args::<2>(method, argv)?;
            Ok(Value::Text(text.replace(
                &expect_text(method, &from)?,
                &expect_text(method, &to)?,
            )))
        }
        _ => Err(ScriptError::Attribute(format!(
            "no method '{}' on text",
            method
        ))),
    }
}

fn list_method(items: Vec<Value>, method: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    match method {
        "contains" => {
            let [needle] = take_args::<1>(method, argv)?;
            Ok(Value::Bool(items.contains(&needle)))
        }
        "join" => {
            let [separator] = take_args::<1>(method, argv)?;
            let separator = expect_text(method, &separator)?;
            let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            Ok(Value::Text(parts.join(&separator)))
        }
        "get" => {
            let [index] = take_args::<1>(method, argv)?;
            let n = expect_number(method, &index)?;
            let i = n as usize;
            if n < 0.0 || n.fract() != 0.0 || i >= items.len() {
                return Ok(Value::Unit);
            }
            Ok(items[i].clone())
        }
        _ => Err(ScriptError::Attribute(format!(
            "no method '{}' on list",
            method
        ))),
    }
}

fn map_method(
    entries: &BTreeMap<String, Value>,
    method: &str,
    argv: Vec<Value>,
) -> Result<Value, ScriptError> {
    match method {
        "get" => {
            let [key] = take_args::<1>(method, argv)?;
            let key = expect_text(method, &key)?;
            Ok(entries.get(&key).cloned().unwrap_or(Value::Unit))
        }
        "keys" => Ok(Value::List(
            entries.keys().map(|k| Value::Text(k.clone())).collect(),
        )),
        "has" => {
            let [key] = take_args::<1>(method, argv)?;
            Ok(Value::Bool(entries.contains_key(&expect_text(method, &key)?)))
        }
        _ => Err(ScriptError::Attribute(format!(
            "no method '{}' on map",
            method
        ))),
    }
}

// --- Module dispatch ---

fn call_module(module: Module, function: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    match module {
        Module::Re => re_module(function, argv),
        Module::Math => math_module(function, argv),
        Module::Json => json_module(function, argv),
    }
}

fn compile_pattern(pattern: &str) -> Result<regex::Regex, ScriptError> {
    regex::Regex::new(pattern)
        .map_err(|e| ScriptError::Type(format!("invalid pattern: {}", e)))
}

fn re_module(function: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    match function {
        "matches" => {
            let [pattern, text] = take_args::<2>("re.matches", argv)?;
            let regex = compile_pattern(&expect_text("re.matches", &pattern)?)?;
            Ok(Value::Bool(regex.is_match(&expect_text(
                "re.matches",
                &text,
            )?)))
        }
        "find_all" => {
            let [pattern, text] = take_args::<2>("re.find_all", argv)?;
            let regex = compile_pattern(&expect_text("re.find_all", &pattern)?)?;
            let text = expect_text("re.find_all", &text)?;
            Ok(Value::List(
                regex
                    .find_iter(&text)
                    .map(|m| Value::Text(m.as_str().to_string()))
                    .collect(),
            ))
        }
        "replace" => {
            let [pattern, text, replacement] = take_args::<3>("re.replace", argv)?;
            let regex = compile_pattern(&expect_text("re.replace", &pattern)?)?;
            let text = expect_text("re.replace", &text)?;
            let replacement = expect_text("re.replace", &replacement)?;
            Ok(Value::Text(
                regex.replace_all(&text, replacement.as_str()).into_owned(),
            ))
        }
        _ => Err(ScriptError::Attribute(format!(
            "module 're' has no function '{}'",
            function
        ))),
    }
}

fn math_module(function: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    let unary = |argv: Vec<Value>, f: fn(f64) -> f64| -> Result<Value, ScriptError> {
        let [x] = take_args::<1>(function, argv)?;
        Ok(Value::Number(f(expect_number(function, &x)?)))
    };
    match function {
        "sqrt" => unary(argv, f64::sqrt),
        "floor" => unary(argv, f64::floor),
        "ceil" => unary(argv, f64::ceil),
        "abs" => unary(argv, f64::abs),
        "pow" => {
            let [a, b] = take_args::<2>("math.pow", argv)?;
            Ok(Value::Number(
                expect_number("math.pow", &a)?.powf(expect_number("math.pow", &b)?),
            ))
        }
        _ => Err(ScriptError::Attribute(format!(
            "module 'math' has no function '{}'",
            function
        ))),
    }
}

fn json_module(function: &str, argv: Vec<Value>) -> Result<Value, ScriptError> {
    match function {
        "parse" => {
            let [text] = take_args::<1>("json.parse", argv)?;
            let text = expect_text("json.parse", &text)?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| ScriptError::Type(format!("invalid json: {}", e)))?;
            Ok(Value::from_json(&json))
        }
        "stringify" => {
            let [value] = take_args::<1>("json.stringify", argv)?;
            serde_json::to_string(&value.to_json())
                .map(Value::Text)
                .map_err(|e| ScriptError::Type(format!("cannot serialize value: {}", e)))
        }
        _ => Err(ScriptError::Attribute(format!(
            "module 'json' has no function '{}'",
            function
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(source: &str) -> String {
        let mut session = Session::new();
        run_snippet(
            &mut session,
            source,
            DEFAULT_OUTPUT_BUDGET,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn captures_print_output() {
        assert_eq!(snippet("print('hello', 42)"), "hello 42\n");
    }

    #[test]
    fn empty_output_returns_sentinel() {
        assert_eq!(snippet("let x = 1 + 2"), "Executed successfully (no output).");
    }

    #[test]
    fn compile_errors_are_folded_into_the_result() {
        let result = snippet("import os; os.system('rm -rf /')");
        assert!(result.starts_with("Compilation Error:"), "got: {}", result);
    }

    #[test]
    fn runtime_errors_are_folded_into_the_result() {
        let result = snippet("print(1 / 0)");
        assert_eq!(result, "Runtime Error: division by zero");

        let result = snippet("print(missing)");
        assert_eq!(result, "Runtime Error: unknown name 'missing'");
    }

    #[test]
    fn output_is_clipped_to_the_budget() {
        let mut session = Session::new();
        let result = run_snippet(
            &mut session,
            "for i in range(100) { print('aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa') }",
            100,
            Duration::from_secs(5),
        );
        assert_eq!(result.chars().count(), 100);
    }

    #[test]
    fn variables_persist_across_snippets() {
        let mut session = Session::new();
        run_snippet(
            &mut session,
            "let counter = 41",
            DEFAULT_OUTPUT_BUDGET,
            Duration::from_secs(5),
        );
        let result = run_snippet(
            &mut session,
            "print(counter + 1)",
            DEFAULT_OUTPUT_BUDGET,
            Duration::from_secs(5),
        );
        assert_eq!(result, "42\n");
    }

    #[test]
    fn guarded_iteration_rejects_non_iterables() {
        let result = snippet("for x in 5 { print(x) }");
        assert_eq!(result, "Runtime Error: value of type number is not iterable");
    }

    #[test]
    fn guarded_index_rejects_out_of_range() {
        let result = snippet("let xs = [1, 2]\nprint(xs[5])");
        assert!(result.starts_with("Runtime Error: list index 5 out of range"));
    }

    #[test]
    fn string_and_list_methods() {
        assert_eq!(snippet("print('Hello World'.upper())"), "HELLO WORLD\n");
        assert_eq!(snippet("print('a,b,c'.split(',').join('-'))"), "a-b-c\n");
        assert_eq!(snippet("print(len('abc') + len([1, 2]))"), "5\n");
    }

    #[test]
    fn re_module_round_trip() {
        let source = r#"
            import re
            let nums = re.find_all('[0-9]+', 'call 12 and 7')
            print(nums.join(','))
        "#;
        assert_eq!(snippet(source), "12,7\n");
    }

    #[test]
    fn json_module_round_trip() {
        let source = r#"
            import json
            let data = json.parse('{"answer": 42}')
            print(data.get('answer'))
        "#;
        assert_eq!(snippet(source), "42\n");
    }

    #[test]
    fn component_methods_bind_named_arguments() {
        let source = r#"
            component Adder {
                fn add(a, b) {
                    return a + b
                }
            }
        "#;
        let file = ScriptFile::compile(source).unwrap();
        let instance = ComponentInstance::instantiate(&file, "Adder").unwrap();

        let mut args = BTreeMap::new();
        args.insert("a".to_string(), Value::Number(2.0));
        args.insert("b".to_string(), Value::Number(3.0));
        assert_eq!(instance.call("add", &args).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn bad_invocations_are_classified() {
        let source = "component C { fn f(a) { return a } }";
        let file = ScriptFile::compile(source).unwrap();
        let instance = ComponentInstance::instantiate(&file, "C").unwrap();

        let err = instance.call("f", &BTreeMap::new()).unwrap_err();
        assert!(err.is_bad_invocation());

        let mut args = BTreeMap::new();
        args.insert("a".to_string(), Value::Number(1.0));
        args.insert("bogus".to_string(), Value::Number(2.0));
        let err = instance.call("f", &args).unwrap_err();
        assert!(err.is_bad_invocation());

        let err = instance
            .call_positional("f", vec![Value::Number(1.0), Value::Number(2.0)])
            .unwrap_err();
        assert!(err.is_bad_invocation());
    }

    #[test]
    fn sibling_methods_are_callable() {
        let source = r#"
            component Greeter {
                fn exclaim(text) {
                    return text + "!"
                }

                fn greet(name) {
                    return exclaim("hi " + name)
                }
            }
        "#;
        let file = ScriptFile::compile(source).unwrap();
        let instance = ComponentInstance::instantiate(&file, "Greeter").unwrap();
        let value = instance
            .call_positional("greet", vec![Value::Text("spak".to_string())])
            .unwrap();
        assert_eq!(value, Value::Text("hi spak!".to_string()));
    }

    #[test]
    fn module_scope_runs_once_at_instantiation() {
        let source = r#"
            let greeting = "hello"

            component C {
                fn get() {
                    return greeting
                }
            }
        "#;
        let file = ScriptFile::compile(source).unwrap();
        let instance = ComponentInstance::instantiate(&file, "C").unwrap();
        assert_eq!(
            instance.call_positional("get", vec![]).unwrap(),
            Value::Text("hello".to_string())
        );
    }

    #[test]
    fn timeout_aborts_long_loops() {
        let mut session = Session::new();
        let result = run_snippet(
            &mut session,
            "for a in range(10000) { for b in range(10000) { let x = a * b } }",
            DEFAULT_OUTPUT_BUDGET,
            Duration::from_millis(50),
        );
        assert_eq!(result, "Runtime Error: execution timed out");
    }
}
