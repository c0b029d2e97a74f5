//! Execution state, registries, and the statement executor.
//!
//! A statement is `name (arguments)` on its own line. The executor groups
//! a label's tokens into statements, evaluates each argument list, and
//! dispatches to the named builtin. Conditionals are not syntax: `if`,
//! `else` and `endif` are ordinary builtins that manipulate the
//! `should_run` stack, and every other builtin consults that stack before
//! doing anything.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use super::expr;
use super::lexer::Token;
use super::preprocess::{self, Label};
use super::value::Value;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error raised by a builtin.
///
/// `raw` marks a message that already carries its full context (line,
/// label) and must not be decorated again; `call` uses it so an error
/// from a called label reports the failing line inside that label, not
/// the line of the `call` statement.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub raw: bool,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        ScriptError { message: message.into(), raw: false }
    }

    pub fn raw(message: impl Into<String>) -> Self {
        ScriptError { message: message.into(), raw: true }
    }
}

impl From<String> for ScriptError {
    fn from(message: String) -> Self {
        ScriptError::new(message)
    }
}

impl From<&str> for ScriptError {
    fn from(message: &str) -> Self {
        ScriptError::new(message)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub type BuiltinFn = Rc<dyn Fn(&[Value], &mut ScriptState) -> Result<Value, ScriptError>>;

/// A named callable. `arity` of -1 accepts any argument count; the
/// builtin then validates the count itself.
#[derive(Clone)]
pub struct Builtin {
    pub arity: i32,
    pub run: BuiltinFn,
}

impl Builtin {
    pub fn new(
        arity: i32,
        run: impl Fn(&[Value], &mut ScriptState) -> Result<Value, ScriptError> + 'static,
    ) -> Self {
        Builtin { arity, run: Rc::new(run) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Binary,
    Unary,
}

pub type OperatorFn = Rc<dyn Fn(&Value, &Value, &mut ScriptState) -> Result<Value, String>>;

/// One operator definition. A symbol may carry several definitions
/// (e.g. binary and unary `-`); the expression evaluator tries each one
/// that fits the position. Lower `priority` binds tighter.
#[derive(Clone)]
pub struct Operator {
    pub priority: i32,
    pub kind: OpKind,
    pub run: OperatorFn,
}

impl Operator {
    pub fn binary(
        priority: i32,
        run: impl Fn(&Value, &Value, &mut ScriptState) -> Result<Value, String> + 'static,
    ) -> Self {
        Operator { priority, kind: OpKind::Binary, run: Rc::new(run) }
    }

    pub fn unary(
        priority: i32,
        run: impl Fn(&Value, &Value, &mut ScriptState) -> Result<Value, String> + 'static,
    ) -> Self {
        Operator { priority, kind: OpKind::Unary, run: Rc::new(run) }
    }
}

/// Literal recognizer: turns a bare token into a value, or declines.
/// Checks run in registration order; the first `Some` wins.
pub type TypeCheckFn = Rc<dyn Fn(&Token, &ScriptState) -> Option<Value>>;

/// Everything name-addressable: builtins, operator definitions, textual
/// macros, and literal typechecks. Shared behind `Rc<RefCell<_>>` so
/// child states (from `call` and `exec`) and running builtins (`bake`)
/// can see and extend the same tables.
#[derive(Clone, Default)]
pub struct Registry {
    pub builtins: HashMap<String, Builtin>,
    pub operators: HashMap<String, Vec<Operator>>,
    pub macros: HashMap<String, String>,
    pub typechecks: Vec<TypeCheckFn>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn add_builtin(
        &mut self,
        name: &str,
        arity: i32,
        run: impl Fn(&[Value], &mut ScriptState) -> Result<Value, ScriptError> + 'static,
    ) {
        self.builtins.insert(name.to_string(), Builtin::new(arity, run));
    }

    pub fn add_operator(&mut self, name: &str, op: Operator) {
        self.operators.entry(name.to_string()).or_default().push(op);
    }

    pub fn add_typecheck(&mut self, check: impl Fn(&Token, &ScriptState) -> Option<Value> + 'static) {
        self.typechecks.push(Rc::new(check));
    }

    pub fn add_macro(&mut self, name: &str, replacement: &str) {
        self.macros.insert(name.to_string(), replacement.to_string());
    }

    pub fn has_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }
}

// ── Host ──────────────────────────────────────────────────────────────────────

/// Capabilities the interpreter borrows from its embedder: writing
/// output, reading a line of input, and terminating the process.
pub trait ScriptHost {
    fn print(&mut self, text: &str);
    fn read_line(&mut self, prompt: &str) -> Result<String, String>;
    fn terminate(&mut self, code: i32);
}

/// Production host: stdout, stdin, `std::process::exit`.
#[derive(Default)]
pub struct StdHost;

impl ScriptHost for StdHost {
    fn print(&mut self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn read_line(&mut self, prompt: &str) -> Result<String, String> {
        self.print(prompt);
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("cannot read input: {e}"))?;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    fn terminate(&mut self, code: i32) {
        std::process::exit(code);
    }
}

/// Capture host for tests and embedders: output accumulates in a
/// string, input is served from a queue, termination is recorded.
#[derive(Default)]
pub struct MemoryHost {
    pub output: String,
    pub input: std::collections::VecDeque<String>,
    pub exit_code: Option<i32>,
}

impl ScriptHost for MemoryHost {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn read_line(&mut self, prompt: &str) -> Result<String, String> {
        self.output.push_str(prompt);
        self.input.pop_front().ok_or_else(|| "no input available".to_string())
    }

    fn terminate(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

// ── ScriptState ───────────────────────────────────────────────────────────────

/// Mutable execution state threaded through every builtin, operator and
/// typecheck. Registry, host, and extension loader are shared handles;
/// everything else belongs to this run.
pub struct ScriptState {
    pub registry: Rc<RefCell<Registry>>,
    pub host: Rc<RefCell<dyn ScriptHost>>,
    pub loader: Option<Rc<RefCell<dyn super::extension::ExtensionLoader>>>,
    pub variables: HashMap<String, Value>,
    pub constants: HashMap<String, Value>,
    pub labels: HashMap<String, Label>,
    /// Conditional nesting: top of the stack says whether statements at
    /// the current depth execute.
    pub should_run: Vec<bool>,
    /// Number of `endif`s that close `if`s which pushed nothing because
    /// they appeared inside a skipped region.
    pub ignore_endifs: u32,
    pub return_value: Value,
    pub exit: bool,
    /// Source line of the statement currently executing.
    pub line: u32,
    pub label_stack: Vec<String>,
}

impl ScriptState {
    pub fn new(registry: Rc<RefCell<Registry>>, host: Rc<RefCell<dyn ScriptHost>>) -> Self {
        ScriptState {
            registry,
            host,
            loader: None,
            variables: HashMap::new(),
            constants: HashMap::new(),
            labels: HashMap::new(),
            should_run: Vec::new(),
            ignore_endifs: 0,
            return_value: Value::Null,
            exit: false,
            line: 0,
            label_stack: Vec::new(),
        }
    }

    /// Fresh state for a nested run (`call`): same registry, host and
    /// loader, same label table and constants, everything else reset.
    pub fn child(&self) -> Self {
        let mut child = ScriptState::new(Rc::clone(&self.registry), Rc::clone(&self.host));
        child.loader = self.loader.clone();
        child.constants = self.constants.clone();
        child.labels = self.labels.clone();
        child
    }

    /// True while inside the skipped branch of a conditional.
    pub fn ignoring(&self) -> bool {
        matches!(self.should_run.last(), Some(false))
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn print(&self, text: &str) {
        self.host.borrow_mut().print(text);
    }

    /// Run a label to completion. Unknown label names are a no-op here;
    /// `call` reports them before reaching this point.
    pub fn run_label(&mut self, name: &str, args: Vec<Value>) -> Result<(), String> {
        let label = match self.labels.get(name) {
            Some(l) => l.clone(),
            None => return Ok(()),
        };

        let statements = group_statements(&label.body);
        for stmt in &statements {
            if stmt.len() != 2 || stmt[0].quoted || stmt[1].quoted || !stmt[1].text.starts_with('(')
            {
                return Err(format!(
                    "line {} is invalid (in label {name})",
                    stmt[0].line
                ));
            }
        }

        for (param, arg) in label.params.iter().zip(args) {
            self.variables.insert(param.clone(), arg);
        }

        self.label_stack.push(name.to_string());
        let result = self.run_statements(&statements, name);
        self.label_stack.pop();
        result
    }

    fn run_statements(&mut self, statements: &[Vec<Token>], label_name: &str) -> Result<(), String> {
        for stmt in statements {
            if self.exit {
                break;
            }
            let line = stmt[0].line;
            self.line = line;
            let name = &stmt[0].text;

            let arglist = expr::parse_argument_list(&stmt[1].text, self)
                .map_err(|e| format!("line {line}: {e} (in label {label_name})"))?;

            let builtin = self.registry.borrow().builtins.get(name).cloned();
            let builtin = builtin.ok_or_else(|| {
                format!("line {line}: unknown function: {name} (in label {label_name})")
            })?;
            if builtin.arity >= 0 && builtin.arity as usize != arglist.len() {
                return Err(format!(
                    "line {line}: {name}: invalid argument count (in label {label_name})"
                ));
            }

            (builtin.run)(&arglist, self).map_err(|e| {
                if e.raw {
                    e.message
                } else {
                    format!("line {line}: {name}: {} (in label {label_name})", e.message)
                }
            })?;
        }
        Ok(())
    }
}

/// Group a flat token list into runs sharing a source line.
pub(crate) fn group_statements(tokens: &[Token]) -> Vec<Vec<Token>> {
    let mut statements: Vec<Vec<Token>> = Vec::new();
    let mut current_line = None;
    for token in tokens {
        if current_line != Some(token.line) {
            current_line = Some(token.line);
            statements.push(Vec::new());
        }
        if let Some(stmt) = statements.last_mut() {
            stmt.push(token.clone());
        }
    }
    statements
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// Embedding facade: owns one execution state, loads source with
/// [`pre_process`](Interpreter::pre_process), runs labels, evaluates
/// standalone expressions, and exposes the registry for extension.
pub struct Interpreter {
    state: ScriptState,
    error_callback: Option<Rc<dyn Fn(&str)>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// Interpreter with the default registry and the stdio host.
    pub fn new() -> Self {
        Interpreter::with_host(Rc::new(RefCell::new(StdHost)))
    }

    pub fn with_host(host: Rc<RefCell<dyn ScriptHost>>) -> Self {
        let registry = Rc::new(RefCell::new(super::builtins::default_registry()));
        Interpreter { state: ScriptState::new(registry, host), error_callback: None }
    }

    /// Register a callback invoked with the message whenever
    /// [`pre_process`](Interpreter::pre_process) or
    /// [`run`](Interpreter::run) is about to fail. The error is still
    /// returned afterwards.
    pub fn on_error(&mut self, callback: impl Fn(&str) + 'static) {
        self.error_callback = Some(Rc::new(callback));
    }

    fn report_error(&self, message: &str) {
        if let Some(callback) = &self.error_callback {
            callback(message);
        }
    }

    pub fn state(&self) -> &ScriptState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ScriptState {
        &mut self.state
    }

    pub fn set_loader(&mut self, loader: Rc<RefCell<dyn super::extension::ExtensionLoader>>) {
        self.state.loader = Some(loader);
    }

    pub fn add_builtin(
        &mut self,
        name: &str,
        arity: i32,
        run: impl Fn(&[Value], &mut ScriptState) -> Result<Value, ScriptError> + 'static,
    ) {
        self.state.registry.borrow_mut().add_builtin(name, arity, run);
    }

    pub fn add_operator(&mut self, name: &str, op: Operator) {
        self.state.registry.borrow_mut().add_operator(name, op);
    }

    pub fn add_typecheck(&mut self, check: impl Fn(&Token, &ScriptState) -> Option<Value> + 'static) {
        self.state.registry.borrow_mut().add_typecheck(check);
    }

    pub fn add_macro(&mut self, name: &str, replacement: &str) {
        self.state.registry.borrow_mut().add_macro(name, replacement);
    }

    pub fn load_extension(&mut self, ext: &dyn super::extension::Extension) {
        self.state.registry.borrow_mut().merge(ext);
    }

    /// Build the label table (and evaluate `@const` / `@bake`
    /// directives) from script source.
    pub fn pre_process(&mut self, source: &str) -> Result<(), String> {
        match preprocess::pre_process(source, &mut self.state) {
            Ok(labels) => {
                self.state.labels = labels;
                Ok(())
            }
            Err(e) => {
                self.report_error(&e);
                Err(e)
            }
        }
    }

    /// Run a label and yield its `return(..)` value, `Null` if it never
    /// returned. Arguments bind positionally to the label's parameters.
    pub fn run(&mut self, label: &str, args: Vec<Value>) -> Result<Value, String> {
        self.state.exit = false;
        self.state.return_value = Value::Null;
        self.state.should_run.clear();
        self.state.ignore_endifs = 0;
        if let Err(e) = self.state.run_label(label, args) {
            self.report_error(&e);
            return Err(e);
        }
        self.state.exit = false;
        Ok(std::mem::replace(&mut self.state.return_value, Value::Null))
    }

    /// Evaluate a standalone expression against the current state.
    pub fn eval(&mut self, source: &str) -> Result<Value, String> {
        expr::evaluate_expression(source, &mut self.state)
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.state.get_var(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.state.set_var(name, value);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
