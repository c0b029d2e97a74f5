//! Source preprocessing: label table construction and `@` directives.
//!
//! A script is a sequence of labels. The preprocessor tokenizes the whole
//! source, groups tokens by line, and routes each line either into the
//! current label's body or through a directive:
//!
//! ```text
//! @const [pi = 3.14159]      # evaluate and pin constants
//! @bake ["my_extension"]     # load an extension before execution
//! @greet [who]               # open label `greet` with one parameter
//! ```
//!
//! Statement bodies are kept as flat token lists; the executor re-groups
//! them at run time.

use std::collections::HashMap;

use super::expr::evaluate_expression;
use super::interp::{group_statements, ScriptState};
use super::lexer::{Lexer, Token};

/// One label: parameter names, body tokens, and the source line of the
/// `@name [..]` directive that opened it (0 for the implicit `main`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label {
    pub params: Vec<String>,
    pub body: Vec<Token>,
    pub line: u32,
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '^' | '%' | '$')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Bare identifier: name characters only, not starting with a digit.
fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        None => false,
        Some(c) if c.is_ascii_digit() => false,
        Some(c) if !is_name_char(c) => false,
        Some(_) => chars.all(is_name_char),
    }
}

/// Parse a `[a, b, c]` parameter list. `None` if the text is not a
/// well-formed parameter list at all (the caller then rejects the
/// directive); `Some(Err(..))` for a list with a duplicate name.
fn parse_label_params(s: &str) -> Option<Result<Vec<String>, String>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    let lexer = Lexer::new()
        .extract(',')
        .ignore(' ')
        .ignore('\t')
        .keep_backslashes()
        .drop_empty();
    let tokens = lexer.lex(inner).ok()?;

    let mut params: Vec<String> = Vec::new();
    let mut expect_name = true;
    for token in &tokens {
        if expect_name {
            if token.quoted || !is_name(&token.text) {
                return None;
            }
            if params.contains(&token.text) {
                return Some(Err(format!("duplicate parameter: {}", token.text)));
            }
            params.push(token.text.clone());
        } else if token.text != "," {
            return None;
        }
        expect_name = !expect_name;
    }
    if expect_name && !params.is_empty() {
        // trailing comma
        return None;
    }
    Some(Ok(params))
}

/// Evaluate the body of a `@const` block: one `name = expression` per
/// line, each visible to the lines after it.
fn parse_const_block(source: &str, state: &mut ScriptState) -> Result<(), String> {
    let lexer = Lexer::new()
        .quote('"')
        .capsule('(', ')')
        .capsule('[', ']')
        .ignore(' ')
        .ignore('\t')
        .linebreak('\n')
        .lineskip('#')
        .extract_if(is_operator_char)
        .keep_backslashes()
        .drop_empty();

    let tokens = lexer.lex(source)?;
    for line in group_statements(&tokens) {
        let lineno = line[0].line;
        if line.len() < 3
            || line[0].quoted
            || line[1].quoted
            || !is_name(&line[0].text)
            || line[1].text != "="
        {
            return Err(format!("line {lineno}: invalid syntax, expected <name> = <expression>"));
        }
        let name = line[0].text.clone();
        let body = line[2..]
            .iter()
            .map(|t| t.to_source())
            .collect::<Vec<_>>()
            .join(" ");
        let value = evaluate_expression(&body, state)
            .map_err(|e| format!("line {lineno}: {e}"))?;
        state.constants.insert(name, value);
    }
    Ok(())
}

/// Load every extension named in a `@bake` block body.
fn bake_block(source: &str, state: &mut ScriptState, lineno: u32) -> Result<(), String> {
    let lexer = Lexer::new()
        .quote('"')
        .ignore(' ')
        .ignore('\t')
        .ignore('\n')
        .drop_empty();
    let tokens = lexer
        .lex(source)
        .map_err(|e| format!("line {lineno}: bake: {e}"))?;
    for token in &tokens {
        if !token.quoted {
            return Err(format!("line {lineno}: bake: expected value: {}", token.text));
        }
        let loader = state
            .loader
            .clone()
            .ok_or_else(|| format!("line {lineno}: bake: no extension loader installed"))?;
        let ext = loader.borrow_mut().load(&token.text).map_err(|e| {
            format!("line {lineno}: bake: error loading extension: {}: {e}", token.text)
        })?;
        state.registry.borrow_mut().merge(ext.as_ref());
    }
    Ok(())
}

/// Check a directive's single `[..]` body token and return its interior.
fn directive_body<'a>(token: &'a Token, inst: &str, lineno: u32) -> Result<&'a str, String> {
    if token.quoted {
        return Err(format!("line {lineno}: {inst}: unexpected string"));
    }
    if token.text.len() < 2 {
        return Err(format!("line {lineno}: {inst}: unexpected token"));
    }
    token
        .text
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("line {lineno}: {inst}: expected body"))
}

/// Build the label table from script source, evaluating `@const` and
/// `@bake` directives along the way. Tokens outside any explicit label
/// accumulate in the implicit `main` label.
pub fn pre_process(source: &str, state: &mut ScriptState) -> Result<HashMap<String, Label>, String> {
    let lexer = Lexer::new()
        .quote('"')
        .capsule('(', ')')
        .capsule('[', ']')
        .ignore(' ')
        .ignore('\t')
        .linebreak('\n')
        .lineskip('#')
        .extract('@')
        .keep_backslashes()
        .drop_empty();

    let tokens = lexer.lex(source)?;
    let lines = group_statements(&tokens);

    let mut labels: HashMap<String, Label> = HashMap::new();
    let mut current = "main".to_string();
    for line in &lines {
        let lineno = line[0].line;
        if line[0].text != "@" || line[0].quoted {
            labels
                .entry(current.clone())
                .or_default()
                .body
                .extend(line.iter().cloned());
            continue;
        }

        if line.len() != 3 {
            return Err(format!(
                "line {lineno}: invalid preprocessor instruction: must have 2 arguments (got: {})",
                line.len() - 1
            ));
        }
        if line[1].quoted || !is_name(&line[1].text) {
            return Err(format!(
                "line {lineno}: invalid preprocessor instruction: expected instruction"
            ));
        }
        let inst = line[1].text.as_str();

        match inst {
            "const" => {
                let body = directive_body(&line[2], "const", lineno)?;
                parse_const_block(body, state)
                    .map_err(|e| format!("line {lineno}: const: {e}"))?;
            }
            "bake" => {
                let body = directive_body(&line[2], "bake", lineno)?;
                bake_block(body, state, lineno)?;
            }
            _ => match (line[2].quoted, parse_label_params(&line[2].text)) {
                (false, Some(params)) => {
                    if labels.contains_key(inst) {
                        return Err(format!(
                            "line {lineno}: can't open label twice: {inst}"
                        ));
                    }
                    let params = params.map_err(|e| format!("line {lineno}: {e}"))?;
                    current = inst.to_string();
                    labels.insert(
                        current.clone(),
                        Label { params, body: Vec::new(), line: line[1].line },
                    );
                }
                _ => {
                    return Err(format!(
                        "line {lineno}: invalid preprocessor instruction: no match for: {inst}"
                    ));
                }
            },
        }
    }

    Ok(labels)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::builtins::default_registry;
    use crate::script::interp::MemoryHost;
    use crate::script::value::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn state() -> ScriptState {
        ScriptState::new(
            Rc::new(RefCell::new(default_registry())),
            Rc::new(RefCell::new(MemoryHost::default())),
        )
    }

    #[test]
    fn statements_accumulate_in_main() {
        let mut st = state();
        let labels = pre_process("echo(\"a\")\necho(\"b\")", &mut st).unwrap();
        assert_eq!(labels.len(), 1);
        assert!(labels.contains_key("main"));
        assert_eq!(labels["main"].params, Vec::<String>::new());
    }

    #[test]
    fn labels_split_the_body() {
        let mut st = state();
        let src = "echo(\"m\")\n@helper [a, b]\necho($a)";
        let labels = pre_process(src, &mut st).unwrap();
        assert_eq!(labels["helper"].params, vec!["a", "b"]);
        assert_eq!(labels["helper"].line, 2);
        assert!(!labels["main"].body.is_empty());
    }

    #[test]
    fn label_without_params() {
        let mut st = state();
        let labels = pre_process("@go []\necho(1)", &mut st).unwrap();
        assert!(labels["go"].params.is_empty());
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut st = state();
        let err = pre_process("@go []\n@go []", &mut st).unwrap_err();
        assert!(err.contains("can't open label twice: go"), "{err}");
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let mut st = state();
        let err = pre_process("@go [a, a]", &mut st).unwrap_err();
        assert!(err.contains("duplicate parameter: a"), "{err}");
    }

    #[test]
    fn const_block_defines_constants_in_order() {
        let mut st = state();
        pre_process("@const [x = 2\ny = $x * 3]", &mut st).unwrap();
        assert_eq!(st.constants["x"], Value::Number(2.0));
        assert_eq!(st.constants["y"], Value::Number(6.0));
    }

    #[test]
    fn const_block_syntax_error_reports_directive_line() {
        let mut st = state();
        let err = pre_process("echo(1)\n@const [broken]", &mut st).unwrap_err();
        assert!(err.starts_with("line 2: const:"), "{err}");
    }

    #[test]
    fn unknown_directive_is_rejected() {
        let mut st = state();
        let err = pre_process("@frobnicate [1]", &mut st).unwrap_err();
        assert!(err.contains("no match for: frobnicate"), "{err}");
    }

    #[test]
    fn directive_argument_count_is_checked() {
        let mut st = state();
        let err = pre_process("@const", &mut st).unwrap_err();
        assert!(err.contains("must have 2 arguments"), "{err}");
    }

    #[test]
    fn bake_without_loader_fails() {
        let mut st = state();
        let err = pre_process("@bake [\"ext\"]", &mut st).unwrap_err();
        assert!(err.contains("no extension loader"), "{err}");
    }

    #[test]
    fn comments_are_stripped() {
        let mut st = state();
        let labels = pre_process("# just a comment\necho(1) # trailing\n", &mut st).unwrap();
        assert_eq!(labels["main"].body.len(), 2);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let src = "@const [k = 1]\necho($k)\n@go [x]\necho($x)";
        let mut st1 = state();
        let mut st2 = state();
        let first = pre_process(src, &mut st1).unwrap();
        let second = pre_process(src, &mut st2).unwrap();
        assert_eq!(first, second);
    }
}
