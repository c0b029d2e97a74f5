//! Expression evaluation.
//!
//! Operators are data, not grammar: a symbol may carry several
//! definitions (binary and unary), so the evaluator cannot know up front
//! which one a given occurrence means. It classifies each operator
//! position (unary at the start or after another operator, binary after
//! an operand), then speculatively tries every registered definition for
//! every position, backtracking on failure. The first assignment that
//! evaluates the whole token list without error wins; if none does, the
//! messages from all failed trials are reported together.
//!
//! Precedence climbing resolves the chosen definitions: numerically
//! *lower* priority binds *tighter*.

use super::interp::{OpKind, Operator, ScriptState, TypeCheckFn};
use super::lexer::{Lexer, Token};
use super::value::Value;

fn is_operator_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '^' | '%' | '$')
}

// ── Error accumulator ─────────────────────────────────────────────────────────

/// Collects messages across speculative trials. `fresh` distinguishes
/// "this trial just failed" from "earlier trials failed"; it is reset
/// between trials while the messages stay for the final report.
#[derive(Default)]
struct ErrorAcc {
    messages: Vec<String>,
    fresh: bool,
}

impl ErrorAcc {
    fn push(&mut self, message: String) {
        self.messages.push(message);
        self.fresh = true;
    }

    fn changed(&self) -> bool {
        self.fresh
    }

    fn reset(&mut self) {
        self.fresh = false;
    }
}

// ── Marked-up tokens ──────────────────────────────────────────────────────────

/// Expression token after classification. Calls and groups stay
/// unevaluated until an accepted trial actually needs their value.
#[derive(Clone)]
enum ExprToken {
    /// Operator occurrence; `op` is filled in by the speculative search.
    Op { name: String, op: Option<Operator> },
    Val(Value),
    Call { function: String, arguments: String },
    /// Parenthesized subexpression, delimiters included.
    Group(String),
}

fn describe(token: &ExprToken) -> String {
    match token {
        ExprToken::Op { name, .. } => name.clone(),
        ExprToken::Val(v) => v.printable(),
        ExprToken::Call { function, arguments } => format!("{function}{arguments}"),
        ExprToken::Group(text) => text.clone(),
    }
}

fn prepare_tokens(tokens: &[Token], state: &mut ScriptState, errors: &mut ErrorAcc) -> Vec<ExprToken> {
    let typechecks: Vec<TypeCheckFn> = state.registry.borrow().typechecks.clone();
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if !token.quoted && state.registry.borrow().has_operator(&token.text) {
            out.push(ExprToken::Op { name: token.text.clone(), op: None });
        } else if !token.quoted && token.text.starts_with('(') {
            out.push(ExprToken::Group(token.text.clone()));
        } else if !token.quoted && state.registry.borrow().has_builtin(&token.text) {
            match tokens.get(i + 1) {
                None => {
                    errors.push("function call without argument list".to_string());
                    return Vec::new();
                }
                Some(next) if next.quoted => {
                    errors.push("function call without argument list".to_string());
                    return Vec::new();
                }
                Some(next) if !next.text.starts_with('(') => {
                    errors.push(format!(
                        "function call with invalid argument list: {} {}",
                        token.text, next.text
                    ));
                    return Vec::new();
                }
                Some(next) => {
                    out.push(ExprToken::Call {
                        function: token.text.clone(),
                        arguments: next.text.clone(),
                    });
                    i += 1;
                }
            }
        } else {
            let mut value = None;
            for check in &typechecks {
                if let Some(v) = check(token, state) {
                    value = Some(v);
                    break;
                }
            }
            match value {
                Some(v) => out.push(ExprToken::Val(v)),
                None => errors.push(format!("invalid literal: {}", token.to_source())),
            }
        }
        i += 1;
    }
    out
}

/// Evaluate a call or group token; plain values pass through.
fn resolve(token: &ExprToken, state: &mut ScriptState, errors: &mut ErrorAcc) -> Value {
    match token {
        ExprToken::Val(v) => v.clone(),
        ExprToken::Call { function, arguments } => {
            let args = match parse_argument_list(arguments, state) {
                Ok(a) => a,
                Err(e) => {
                    errors.push(format!("error parsing argument list: {e}"));
                    return Value::Null;
                }
            };
            let builtin = state.registry.borrow().builtins.get(function).cloned();
            let builtin = match builtin {
                Some(b) => b,
                None => {
                    errors.push(format!("unknown function: {function}"));
                    return Value::Null;
                }
            };
            if builtin.arity >= 0 {
                let needed = builtin.arity as usize;
                if args.len() < needed {
                    errors.push(format!(
                        "function call with too few arguments: {function}{arguments} (needs {needed}, got {})",
                        args.len()
                    ));
                    return Value::Null;
                }
                if args.len() > needed {
                    errors.push(format!(
                        "function call with too many arguments: {function}{arguments} (needs {needed}, got {})",
                        args.len()
                    ));
                    return Value::Null;
                }
            }
            match (builtin.run)(&args, state) {
                Ok(v) => v,
                Err(e) => {
                    errors.push(e.message);
                    Value::Null
                }
            }
        }
        ExprToken::Group(text) => {
            let inner = text
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .unwrap_or(text);
            match evaluate_expression(inner, state) {
                Ok(v) => v,
                Err(e) => {
                    errors.push(format!("error while parsing {text}: {e}"));
                    Value::Null
                }
            }
        }
        ExprToken::Op { name, .. } => {
            errors.push(format!("standalone operator: {name}"));
            Value::Null
        }
    }
}

// ── Precedence climbing ───────────────────────────────────────────────────────

fn check_prec(
    tokens: &[ExprToken],
    pos: &mut usize,
    maxprec: i32,
    state: &mut ScriptState,
    errors: &mut ErrorAcc,
) -> Value {
    if errors.changed() {
        return Value::Null;
    }
    if *pos >= tokens.len() {
        errors.push("unexpected end of expression".to_string());
        return Value::Null;
    }
    let mut lhs = tokens[*pos].clone();
    *pos += 1;

    if let ExprToken::Op { name, op } = &lhs {
        match op.clone() {
            Some(op) => {
                let operand = check_prec(tokens, pos, op.priority, state, errors);
                if errors.changed() {
                    return Value::Null;
                }
                match (op.run)(&operand, &Value::Null, state) {
                    Ok(v) => lhs = ExprToken::Val(v),
                    Err(e) => {
                        errors.push(e);
                        return Value::Null;
                    }
                }
            }
            None => {
                errors.push(format!("standalone operator: {name}"));
                return Value::Null;
            }
        }
    }

    while *pos < tokens.len() {
        let (op_name, op) = match &tokens[*pos] {
            ExprToken::Op { name, op } => (name.clone(), op.clone()),
            other => {
                errors.push(format!("expected operator, found: {}", describe(other)));
                return Value::Null;
            }
        };
        let op = match op {
            Some(o) => o,
            None => {
                errors.push(format!("standalone operator: {op_name}"));
                return Value::Null;
            }
        };
        if op.kind != OpKind::Binary {
            errors.push(format!("expected binary operator: {op_name}"));
            return Value::Null;
        }
        if op.priority >= maxprec {
            break;
        }
        *pos += 1;
        let rhs = check_prec(tokens, pos, op.priority, state, errors);
        if errors.changed() {
            return Value::Null;
        }
        let left = resolve(&lhs, state, errors);
        if errors.changed() {
            return Value::Null;
        }
        match (op.run)(&left, &rhs, state) {
            Ok(v) => lhs = ExprToken::Val(v),
            Err(e) => {
                errors.push(format!("{} {op_name} {}: {e}", left.printable(), rhs.printable()));
                return Value::Null;
            }
        }
    }
    resolve(&lhs, state, errors)
}

// ── Speculative search ────────────────────────────────────────────────────────

/// Assign a definition to every operator position from `i` onward, then
/// hand the fully marked-up token list to the precedence climber. Tries
/// each candidate definition in registration order; `None` means every
/// assignment failed and `errors` holds the trial messages.
fn force_parse(
    tokens: &[ExprToken],
    state: &mut ScriptState,
    errors: &mut ErrorAcc,
    i: usize,
) -> Option<Value> {
    if errors.changed() {
        return None;
    }
    if tokens.len() == 1 {
        if let ExprToken::Op { name, .. } = &tokens[0] {
            errors.push(format!("standalone operator: {name}"));
            return None;
        }
        let v = resolve(&tokens[0], state, errors);
        return if errors.changed() { None } else { Some(v) };
    }
    if i >= tokens.len() {
        let mut pos = 0;
        let v = check_prec(tokens, &mut pos, i32::MAX, state, errors);
        return if errors.changed() { None } else { Some(v) };
    }

    // Unary when the position starts the expression or follows another
    // operator, binary when it follows an operand.
    let (idx, name, wanted) = match &tokens[i] {
        ExprToken::Op { name, .. } => (i, name.clone(), OpKind::Unary),
        _ => {
            let next = i + 1;
            if next >= tokens.len() {
                let mut pos = 0;
                let v = check_prec(tokens, &mut pos, i32::MAX, state, errors);
                return if errors.changed() { None } else { Some(v) };
            }
            match &tokens[next] {
                ExprToken::Op { name, .. } => (next, name.clone(), OpKind::Binary),
                other => {
                    errors.push(format!("expected operator, found: {}", describe(other)));
                    return None;
                }
            }
        }
    };

    let candidates: Vec<Operator> = state
        .registry
        .borrow()
        .operators
        .get(&name)
        .cloned()
        .unwrap_or_default();
    let mut tried = false;
    for option in candidates {
        if option.kind != wanted {
            continue;
        }
        tried = true;
        let mut trial = tokens.to_vec();
        if let ExprToken::Op { op, .. } = &mut trial[idx] {
            *op = Some(option);
        }
        if let Some(v) = force_parse(&trial, state, errors, idx + 1) {
            return Some(v);
        }
        errors.reset();
    }
    if !tried {
        let position = match wanted {
            OpKind::Binary => "binary",
            OpKind::Unary => "unary",
        };
        errors.push(format!("no {position} definition for operator: {name}"));
    }
    None
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Evaluate one expression. On failure the message aggregates every
/// speculative trial's complaint.
pub fn evaluate_expression(source: &str, state: &mut ScriptState) -> Result<Value, String> {
    let lexer = Lexer::new()
        .quote('"')
        .capsule('(', ')')
        .capsule('[', ']')
        .capsule('{', '}')
        .extract_if(is_operator_char)
        .ignore(' ')
        .ignore('\t')
        .backslash_sub('t', '\t')
        .backslash_sub('n', '\n')
        .backslash_sub('r', '\r')
        .backslash_sub('\\', '\\')
        .backslash_sub('"', '"')
        .drop_empty();

    let mut errors = ErrorAcc::default();
    let result = match lexer.lex(source) {
        Ok(tokens) => {
            let prepared = prepare_tokens(&tokens, state, &mut errors);
            force_parse(&prepared, state, &mut errors, 0)
        }
        Err(e) => {
            errors.push(e);
            None
        }
    };

    match result {
        Some(v) => Ok(v),
        None => {
            let mut message = format!("error in expression: {}", source.trim());
            for m in &errors.messages {
                message.push('\n');
                message.push_str(m);
            }
            Err(message)
        }
    }
}

/// Split a parenthesized argument list into comma-separated expressions
/// and evaluate each. Quoted tokens regain their quotes and unquoted
/// tokens matching a registered macro are substituted before the pieces
/// are re-joined for evaluation.
pub fn parse_argument_list(source: &str, state: &mut ScriptState) -> Result<Vec<Value>, String> {
    let lexer = Lexer::new()
        .capsule('(', ')')
        .capsule('[', ']')
        .capsule('{', '}')
        .quote('"')
        .ignore(' ')
        .ignore('\t')
        .ignore('\n')
        .keep_backslashes()
        .extract_if(is_operator_char)
        .extract(',')
        .drop_empty();

    let inner = source
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(source);
    let tokens = lexer.lex(inner)?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut groups: Vec<String> = Vec::new();
    let mut current = String::new();
    {
        let registry = state.registry.borrow();
        for token in &tokens {
            if !token.quoted && token.text == "," {
                groups.push(std::mem::take(&mut current));
            } else if token.quoted {
                current.push_str(" \"");
                current.push_str(&token.text);
                current.push('"');
            } else if let Some(replacement) = registry.macros.get(&token.text) {
                current.push(' ');
                current.push_str(replacement);
            } else {
                current.push(' ');
                current.push_str(&token.text);
            }
        }
    }
    groups.push(current);

    let mut values = Vec::with_capacity(groups.len());
    for group in groups {
        values.push(evaluate_expression(&group, state)?);
    }
    Ok(values)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::builtins::default_registry;
    use crate::script::interp::MemoryHost;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn state() -> ScriptState {
        ScriptState::new(
            Rc::new(RefCell::new(default_registry())),
            Rc::new(RefCell::new(MemoryHost::default())),
        )
    }

    fn eval(src: &str) -> Result<Value, String> {
        evaluate_expression(src, &mut state())
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(eval("3 * 4 + 2").unwrap(), Value::Number(14.0));
    }

    #[test]
    fn power_binds_tighter_than_multiplication() {
        assert_eq!(eval("2 * 3 ^ 2").unwrap(), Value::Number(18.0));
    }

    #[test]
    fn groups_override_precedence() {
        assert_eq!(eval("(2 + 3) * 4").unwrap(), Value::Number(20.0));
    }

    #[test]
    fn unary_minus_resolves_against_binary() {
        assert_eq!(eval("-5").unwrap(), Value::Number(-5.0));
        assert_eq!(eval("2 - -3").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn not_operator() {
        assert_eq!(eval("not 0").unwrap(), Value::Number(1.0));
        assert_eq!(eval("not 3").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval("\"foo\" + \"bar\"").unwrap(), Value::Str("foobar".into()));
    }

    #[test]
    fn mixed_types_do_not_add() {
        let err = eval("\"foo\" + 1").unwrap_err();
        assert!(err.contains("error in expression"), "{err}");
    }

    #[test]
    fn comparisons_yield_numbers() {
        assert_eq!(eval("3 more 2").unwrap(), Value::Number(1.0));
        assert_eq!(eval("3 less 2").unwrap(), Value::Number(0.0));
        assert_eq!(eval("2 is 2").unwrap(), Value::Number(1.0));
        assert_eq!(eval("2 isnt 2").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn logic_operators() {
        assert_eq!(eval("1 and 1").unwrap(), Value::Number(1.0));
        assert_eq!(eval("1 and 0").unwrap(), Value::Number(0.0));
        assert_eq!(eval("0 or 1").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn division_by_zero_reports() {
        let err = eval("5 / 0").unwrap_err();
        assert!(err.contains("division"), "{err}");
        assert!(err.contains("not allowed"), "{err}");
    }

    #[test]
    fn dollar_reads_variables_then_constants() {
        let mut st = state();
        st.variables.insert("x".into(), Value::Number(10.0));
        st.constants.insert("x".into(), Value::Number(1.0));
        st.constants.insert("c".into(), Value::Number(2.0));
        assert_eq!(evaluate_expression("$x", &mut st).unwrap(), Value::Number(10.0));
        assert_eq!(evaluate_expression("$c", &mut st).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn dollar_on_unknown_name_fails() {
        let err = eval("$missing").unwrap_err();
        assert!(err.contains("not a registered variable or constant"), "{err}");
    }

    #[test]
    fn null_literal_is_a_value() {
        assert_eq!(eval("null").unwrap(), Value::Null);
    }

    #[test]
    fn invalid_literal_reports() {
        let err = eval("3kitten").unwrap_err();
        assert!(err.contains("invalid literal"), "{err}");
    }

    #[test]
    fn function_calls_inside_expressions() {
        assert_eq!(eval("typeof(5)").unwrap(), Value::Str("number".into()));
        assert_eq!(eval("to_number(\"12\") + 1").unwrap(), Value::Number(13.0));
    }

    #[test]
    fn string_escapes_in_expression_text() {
        assert_eq!(eval("\"a\\nb\"").unwrap(), Value::Str("a\nb".into()));
    }

    #[test]
    fn empty_expression_fails() {
        assert!(eval("").is_err());
    }

    #[test]
    fn argument_list_splits_on_top_level_commas_only() {
        let mut st = state();
        let args = parse_argument_list("(1 + 2, \"a,b\", (3, 4))", &mut st);
        // the capsule keeps its comma, so the group is not an argument split
        assert!(args.is_err() || args.as_ref().unwrap().len() == 3, "{args:?}");
        let args = parse_argument_list("(1 + 2, \"a,b\")", &mut st).unwrap();
        assert_eq!(args, vec![Value::Number(3.0), Value::Str("a,b".into())]);
    }

    #[test]
    fn empty_argument_list() {
        let mut st = state();
        assert_eq!(parse_argument_list("()", &mut st).unwrap(), Vec::<Value>::new());
    }
}
