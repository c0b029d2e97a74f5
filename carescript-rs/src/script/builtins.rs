//! Default registry: builtins, operators, literal typechecks, macros.
//!
//! Every builtin that does work begins by consulting the conditional
//! stack: inside a skipped `if` branch it returns `Null` without side
//! effects. `if`, `else` and `endif` are the exceptions, since they are
//! the ones maintaining that stack.

use std::rc::Rc;

use super::interp::{Operator, Registry, ScriptError, ScriptState};
use super::preprocess;
use super::value::Value;

// ── Argument helpers ──────────────────────────────────────────────────────────

fn want_number(args: &[Value], i: usize) -> Result<f64, ScriptError> {
    args[i].as_number().ok_or_else(|| {
        ScriptError::new(format!(
            "argument {} must be a number (got: {})",
            i + 1,
            args[i].kind()
        ))
    })
}

fn want_string(args: &[Value], i: usize) -> Result<String, ScriptError> {
    match &args[i] {
        Value::Str(s) => Ok(s.clone()),
        other => Err(ScriptError::new(format!(
            "argument {} must be a string (got: {})",
            i + 1,
            other.kind()
        ))),
    }
}

fn want_name(args: &[Value], i: usize) -> Result<String, ScriptError> {
    match &args[i] {
        Value::Name(n) => Ok(n.clone()),
        other => Err(ScriptError::new(format!(
            "argument {} must be a name (got: {})",
            i + 1,
            other.kind()
        ))),
    }
}

/// Index argument for the string builtins: in range for `len`, else the
/// classic overflow/underflow complaints.
fn want_index(args: &[Value], i: usize, len: usize) -> Result<usize, ScriptError> {
    let n = want_number(args, i)?;
    if n < 0.0 {
        return Err(ScriptError::new("index underflow"));
    }
    let idx = n as usize;
    if idx >= len {
        return Err(ScriptError::new("index overflow"));
    }
    Ok(idx)
}

fn count(args: &[Value], n: usize) -> Result<(), ScriptError> {
    if args.len() != n {
        return Err(ScriptError::new(format!("requires {n} arguments")));
    }
    Ok(())
}

// ── String modification ───────────────────────────────────────────────────────

fn strmod(args: &[Value], state: &mut ScriptState) -> Result<Value, ScriptError> {
    if args.len() < 2 {
        return Err(ScriptError::new("requires at least two arguments"));
    }
    let sub = want_name(args, 0)?;
    let var = want_name(args, 1)?;
    let text = match state.variables.get(&var) {
        Some(Value::Str(s)) => s.clone(),
        _ => return Err(ScriptError::new("requires string variable")),
    };
    let chars: Vec<char> = text.chars().collect();
    let require_nonempty = || -> Result<(), ScriptError> {
        if chars.is_empty() {
            Err(ScriptError::new("string empty"))
        } else {
            Ok(())
        }
    };

    match sub.as_str() {
        "ERASE" => {
            count(args, 3)?;
            require_nonempty()?;
            let idx = want_index(args, 2, chars.len())?;
            let mut out = chars;
            out.remove(idx);
            state.variables.insert(var, Value::Str(out.into_iter().collect()));
            Ok(Value::Null)
        }
        "INSERT" => {
            count(args, 4)?;
            require_nonempty()?;
            let idx = want_index(args, 2, chars.len())?;
            let ins = want_string(args, 3)?;
            // splices in place of the character before the index; at the
            // front there is nothing to displace
            let mut out: String = chars[..idx.saturating_sub(1)].iter().collect();
            out.push_str(&ins);
            out.extend(&chars[idx..]);
            state.variables.insert(var, Value::Str(out));
            Ok(Value::Null)
        }
        "PUT" => {
            count(args, 4)?;
            require_nonempty()?;
            let idx = want_index(args, 2, chars.len())?;
            let ins = want_string(args, 3)?;
            let mut out: String = chars[..idx].iter().collect();
            out.push_str(&ins);
            out.extend(&chars[idx + 1..]);
            state.variables.insert(var, Value::Str(out));
            Ok(Value::Null)
        }
        "BACK" => {
            count(args, 2)?;
            require_nonempty()?;
            Ok(Value::Str(chars[chars.len() - 1].to_string()))
        }
        "SIZE" => {
            count(args, 2)?;
            Ok(Value::Number(chars.len() as f64))
        }
        "AT" => {
            count(args, 3)?;
            require_nonempty()?;
            let idx = want_index(args, 2, chars.len())?;
            Ok(Value::Str(chars[idx].to_string()))
        }
        "SUBSTR" => {
            count(args, 4)?;
            require_nonempty()?;
            let a = want_index(args, 2, chars.len())?;
            let b = want_index(args, 3, chars.len())?;
            let (from, to) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::Str(chars[from..to].iter().collect()))
        }
        _ => Err(ScriptError::new("unknown enum type")),
    }
}

// ── Builtins ──────────────────────────────────────────────────────────────────

fn install_builtins(registry: &mut Registry) {
    registry.add_builtin("set", 2, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let name = want_name(args, 0)?;
        if matches!(args[1], Value::Name(_)) {
            return Err(ScriptError::new(format!(
                "argument 2 must not be a name (got: {})",
                args[1].kind()
            )));
        }
        state.variables.insert(name, args[1].clone());
        Ok(Value::Null)
    });

    registry.add_builtin("if", 1, |args, state| {
        if state.ignoring() {
            state.ignore_endifs += 1;
            return Ok(Value::Null);
        }
        let cond = want_number(args, 0)?;
        state.should_run.push(cond != 0.0);
        Ok(Value::Null)
    });

    registry.add_builtin("else", 0, |_args, state| {
        if state.ignore_endifs > 0 {
            // inside a skipped nested conditional; its else is inert
            return Ok(Value::Null);
        }
        match state.should_run.last_mut() {
            Some(top) => {
                *top = !*top;
                Ok(Value::Null)
            }
            None => Err(ScriptError::new("no if")),
        }
    });

    registry.add_builtin("endif", 0, |_args, state| {
        if state.ignore_endifs > 0 {
            state.ignore_endifs -= 1;
            return Ok(Value::Null);
        }
        match state.should_run.pop() {
            Some(_) => Ok(Value::Null),
            None => Err(ScriptError::new("no if")),
        }
    });

    registry.add_builtin("echo", -1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        for arg in args {
            state.print(&arg.printable());
        }
        Ok(Value::Null)
    });

    registry.add_builtin("echoln", -1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        for arg in args {
            state.print(&arg.printable());
        }
        state.print("\n");
        Ok(Value::Null)
    });

    registry.add_builtin("input", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let prompt = want_string(args, 0)?;
        let line = state.host.borrow_mut().read_line(&prompt)?;
        Ok(Value::Str(line))
    });

    registry.add_builtin("to_number", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        match &args[0] {
            Value::Number(n) => Ok(Value::Number(*n)),
            Value::Str(s) => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| ScriptError::new(format!("invalid input: \"{s}\""))),
            other => Err(ScriptError::new(format!(
                "argument 1 must be a number or string (got: {})",
                other.kind()
            ))),
        }
    });

    registry.add_builtin("to_string", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        match &args[0] {
            Value::Str(s) => Ok(Value::Str(s.clone())),
            Value::Number(n) => Ok(Value::Str(Value::Number(*n).printable())),
            other => Err(ScriptError::new(format!(
                "argument 1 must be a number or string (got: {})",
                other.kind()
            ))),
        }
    });

    registry.add_builtin("exec", -1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        if args.len() < 2 {
            return Err(ScriptError::new("requires at least two arguments"));
        }
        let path = want_string(args, 0)?;
        let label = want_string(args, 1)?;
        let source = std::fs::read_to_string(&path)
            .map_err(|e| ScriptError::new(format!("cannot open file: {path}: {e}")))?;

        // the executed script gets its own registry copy: additions it
        // bakes in do not leak back
        let registry = Rc::new(std::cell::RefCell::new(state.registry.borrow().clone()));
        let mut child = ScriptState::new(registry, Rc::clone(&state.host));
        child.loader = state.loader.clone();
        child.labels = preprocess::pre_process(&source, &mut child).map_err(ScriptError::new)?;
        child
            .run_label(&label, args[2..].to_vec())
            .map_err(ScriptError::new)?;
        Ok(child.return_value)
    });

    registry.add_builtin("exit", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let code = want_number(args, 0)?;
        state.host.borrow_mut().terminate(code as i32);
        state.exit = true;
        Ok(Value::Null)
    });

    registry.add_builtin("system", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let command = want_string(args, 0)?;
        std::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .status()
            .map_err(|e| ScriptError::new(format!("cannot run command: {e}")))?;
        Ok(Value::Null)
    });

    registry.add_builtin("read", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let path = want_string(args, 0)?;
        std::fs::read_to_string(&path)
            .map(Value::Str)
            .map_err(|e| ScriptError::new(format!("cannot open file: {path}: {e}")))
    });

    registry.add_builtin("write", 2, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let path = want_string(args, 0)?;
        let content = want_string(args, 1)?;
        std::fs::write(&path, content)
            .map_err(|e| ScriptError::new(format!("cannot write file: {path}: {e}")))?;
        Ok(Value::Null)
    });

    registry.add_builtin("call", -1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        if args.is_empty() {
            return Err(ScriptError::new("requires at least one argument"));
        }
        let name = want_name(args, 0)?;
        let label = state
            .labels
            .get(&name)
            .ok_or_else(|| ScriptError::new(format!("no such label {name}")))?;
        let run_args = args[1..].to_vec();
        if label.params.len() > run_args.len() {
            return Err(ScriptError::new("too few arguments"));
        }
        if label.params.len() < run_args.len() {
            return Err(ScriptError::new("too many arguments"));
        }
        let mut child = state.child();
        child
            .run_label(&name, run_args)
            .map_err(ScriptError::raw)?;
        Ok(child.return_value)
    });

    registry.add_builtin("return", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        state.return_value = args[0].clone();
        state.exit = true;
        Ok(Value::Null)
    });

    registry.add_builtin("strmod", -1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        strmod(args, state)
    });

    registry.add_builtin("bake", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        let name = want_string(args, 0)?;
        let loader = match state.loader.clone() {
            Some(l) => l,
            None => return Ok(Value::from(false)),
        };
        let loaded = loader.borrow_mut().load(&name);
        match loaded {
            Ok(ext) => {
                state.registry.borrow_mut().merge(ext.as_ref());
                Ok(Value::from(true))
            }
            Err(_) => Ok(Value::from(false)),
        }
    });

    registry.add_builtin("typeof", 1, |args, state| {
        if state.ignoring() {
            return Ok(Value::Null);
        }
        Ok(Value::Str(args[0].kind().to_string()))
    });
}

// ── Typechecks ────────────────────────────────────────────────────────────────

fn install_typechecks(registry: &mut Registry) {
    // string literal: any quoted token
    registry.add_typecheck(|token, _state| {
        if token.quoted {
            Some(Value::Str(token.text.clone()))
        } else {
            None
        }
    });
    // number literal
    registry.add_typecheck(|token, _state| {
        if token.quoted {
            return None;
        }
        token.text.parse::<f64>().ok().map(Value::Number)
    });
    // null literal
    registry.add_typecheck(|token, _state| {
        if !token.quoted && token.text == "null" {
            Some(Value::Null)
        } else {
            None
        }
    });
    // bare name
    registry.add_typecheck(|token, _state| {
        if token.quoted || token.text.is_empty() {
            return None;
        }
        let mut chars = token.text.chars();
        match chars.next() {
            Some(c) if c.is_ascii_digit() => return None,
            Some(c) if !(c.is_ascii_alphanumeric() || c == '_') => return None,
            _ => {}
        }
        if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Some(Value::Name(token.text.clone()))
        } else {
            None
        }
    });
}

// ── Operators ─────────────────────────────────────────────────────────────────

fn same_type(op: &str, l: &Value, r: &Value) -> Result<(), String> {
    if l.kind() != r.kind() {
        return Err(format!(
            "{op}: operands must have the same type (left: {}, right: {})",
            l.kind(),
            r.kind()
        ));
    }
    Ok(())
}

fn number_operand(op: &str, v: &Value) -> Result<f64, String> {
    v.as_number()
        .ok_or_else(|| format!("{op}: operand must be a number (got: {})", v.kind()))
}

fn number_pair(op: &'static str) -> impl Fn(&Value, &Value) -> Result<(f64, f64), String> {
    move |l, r| {
        same_type(op, l, r)?;
        Ok((number_operand(op, l)?, number_operand(op, r)?))
    }
}

fn install_operators(registry: &mut Registry) {
    registry.add_operator(
        "+",
        Operator::binary(0, |l, r, _| {
            same_type("+", l, r)?;
            match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                _ => Err(format!(
                    "+: operand must be a number or string (got: {})",
                    l.kind()
                )),
            }
        }),
    );

    registry.add_operator(
        "-",
        Operator::binary(0, |l, r, _| {
            let (a, b) = number_pair("-")(l, r)?;
            Ok(Value::Number(a - b))
        }),
    );
    registry.add_operator(
        "-",
        Operator::unary(-3, |operand, _, _| {
            Ok(Value::Number(-number_operand("-", operand)?))
        }),
    );

    registry.add_operator(
        "*",
        Operator::binary(-1, |l, r, _| {
            let (a, b) = number_pair("*")(l, r)?;
            Ok(Value::Number(a * b))
        }),
    );

    registry.add_operator(
        "/",
        Operator::binary(-1, |l, r, _| {
            let (a, b) = number_pair("/")(l, r)?;
            if b == 0.0 {
                return Err("/: division through 0 is not allowed".to_string());
            }
            Ok(Value::Number(a / b))
        }),
    );

    registry.add_operator(
        "^",
        Operator::binary(-2, |l, r, _| {
            let (a, b) = number_pair("^")(l, r)?;
            Ok(Value::Number(a.powf(b)))
        }),
    );

    registry.add_operator(
        "is",
        Operator::binary(2, |l, r, _| {
            same_type("is", l, r)?;
            Ok(Value::from(l == r))
        }),
    );
    registry.add_operator(
        "isnt",
        Operator::binary(2, |l, r, _| {
            same_type("isnt", l, r)?;
            Ok(Value::from(l != r))
        }),
    );

    registry.add_operator(
        "and",
        Operator::binary(3, |l, r, _| {
            let (a, b) = number_pair("and")(l, r)?;
            Ok(Value::from(a != 0.0 && b != 0.0))
        }),
    );
    registry.add_operator(
        "or",
        Operator::binary(4, |l, r, _| {
            let (a, b) = number_pair("or")(l, r)?;
            Ok(Value::from(a != 0.0 || b != 0.0))
        }),
    );

    registry.add_operator(
        "more",
        Operator::binary(5, |l, r, _| {
            let (a, b) = number_pair("more")(l, r)?;
            Ok(Value::from(a > b))
        }),
    );
    registry.add_operator(
        "less",
        Operator::binary(5, |l, r, _| {
            let (a, b) = number_pair("less")(l, r)?;
            Ok(Value::from(a < b))
        }),
    );

    registry.add_operator(
        "not",
        Operator::unary(-4, |operand, _, _| {
            Ok(Value::from(number_operand("not", operand)? == 0.0))
        }),
    );

    registry.add_operator(
        "$",
        Operator::unary(-5, |operand, _, state| {
            let name = match operand {
                Value::Name(n) => n,
                other => {
                    return Err(format!("$: operand must be a name (got: {})", other.kind()))
                }
            };
            if let Some(v) = state.variables.get(name) {
                return Ok(v.clone());
            }
            if let Some(v) = state.constants.get(name) {
                return Ok(v.clone());
            }
            Err("$: left is not a registered variable or constant!".to_string())
        }),
    );
}

// ── Macros ────────────────────────────────────────────────────────────────────

fn install_macros(registry: &mut Registry) {
    let (windows, linux, unknown, osname) = if cfg!(target_os = "windows") {
        ("1", "0", "0", "\"WINDOWS\"")
    } else if cfg!(target_os = "linux") {
        ("0", "1", "0", "\"LINUX\"")
    } else {
        ("0", "0", "1", "\"UNKNOWN\"")
    };
    registry.add_macro("WINDOWS", windows);
    registry.add_macro("LINUX", linux);
    registry.add_macro("UNKNOWN", unknown);
    registry.add_macro("OSNAME", osname);
}

/// The registry every fresh interpreter starts from.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    install_builtins(&mut registry);
    install_typechecks(&mut registry);
    install_operators(&mut registry);
    install_macros(&mut registry);
    registry
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::extension::{Extension, ExtensionLoader};
    use crate::script::interp::{Builtin, Interpreter, MemoryHost};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run(source: &str) -> (Result<Value, String>, String) {
        let host = Rc::new(RefCell::new(MemoryHost::default()));
        let mut interp = Interpreter::with_host(host.clone());
        let result = interp
            .pre_process(source)
            .and_then(|_| interp.run("main", Vec::new()));
        let output = host.borrow().output.clone();
        (result, output)
    }

    fn output_of(source: &str) -> String {
        let (result, output) = run(source);
        assert!(result.is_ok(), "{result:?}");
        output
    }

    #[test]
    fn set_rejects_a_name_value() {
        let (result, _) = run("set(x, y)");
        assert!(result.unwrap_err().contains("must not be a name"));
    }

    #[test]
    fn if_true_runs_then_branch() {
        let out = output_of("if(1)\necho(\"A\")\nelse()\necho(\"B\")\nendif()");
        assert_eq!(out, "A");
    }

    #[test]
    fn if_false_runs_else_branch() {
        let out = output_of("if(0)\necho(\"A\")\nelse()\necho(\"B\")\nendif()");
        assert_eq!(out, "B");
    }

    #[test]
    fn nested_if_inside_skipped_branch_is_inert() {
        let out = output_of(
            "if(0)\nif(1)\necho(\"X\")\nelse()\necho(\"Y\")\nendif()\necho(\"Z\")\nendif()\necho(\"done\")",
        );
        assert_eq!(out, "done");
    }

    #[test]
    fn endif_without_if_is_an_error() {
        let (result, _) = run("endif()");
        assert!(result.unwrap_err().contains("no if"));
    }

    #[test]
    fn else_without_if_is_an_error() {
        let (result, _) = run("else()");
        assert!(result.unwrap_err().contains("no if"));
    }

    #[test]
    fn to_number_parses_full_strings_only() {
        let (result, _) = run("set(x, to_number(\"12x\"))");
        assert!(result.unwrap_err().contains("invalid input"));
        let out = output_of("echo(to_number(\"12\") + 1)");
        assert_eq!(out, "13");
    }

    #[test]
    fn typeof_reports_kinds() {
        assert_eq!(output_of("echo(typeof(1))"), "number");
        assert_eq!(output_of("echo(typeof(\"s\"))"), "string");
        assert_eq!(output_of("echo(typeof(null))"), "null");
    }

    #[test]
    fn strmod_substr_is_half_open() {
        let out = output_of("set(v, \"hello\")\necho(strmod(SUBSTR, v, 1, 3))");
        assert_eq!(out, "el");
    }

    #[test]
    fn strmod_substr_orders_its_bounds() {
        let out = output_of("set(v, \"hello\")\necho(strmod(SUBSTR, v, 3, 1))");
        assert_eq!(out, "el");
    }

    #[test]
    fn strmod_size_back_at() {
        assert_eq!(output_of("set(v, \"hello\")\necho(strmod(SIZE, v))"), "5");
        assert_eq!(output_of("set(v, \"hello\")\necho(strmod(BACK, v))"), "o");
        assert_eq!(output_of("set(v, \"hello\")\necho(strmod(AT, v, 1))"), "e");
    }

    #[test]
    fn strmod_erase_and_put_modify_in_place() {
        assert_eq!(output_of("set(v, \"hello\")\nstrmod(ERASE, v, 0)\necho($v)"), "ello");
        assert_eq!(output_of("set(v, \"hello\")\nstrmod(PUT, v, 0, \"j\")\necho($v)"), "jello");
    }

    #[test]
    fn strmod_insert_drops_the_char_before_the_index() {
        // at the front there is nothing to displace
        assert_eq!(
            output_of("set(v, \"hello\")\nstrmod(INSERT, v, 0, \"j\")\necho($v)"),
            "jhello"
        );
        assert_eq!(
            output_of("set(v, \"hello\")\nstrmod(INSERT, v, 2, \"X\")\necho($v)"),
            "hXllo"
        );
    }

    #[test]
    fn strmod_requires_a_string_variable() {
        let (result, _) = run("set(v, 5)\nstrmod(SIZE, v)");
        assert!(result.unwrap_err().contains("requires string variable"));
        let (result, _) = run("strmod(SIZE, w)");
        assert!(result.unwrap_err().contains("requires string variable"));
    }

    #[test]
    fn strmod_index_bounds() {
        let (result, _) = run("set(v, \"abc\")\necho(strmod(AT, v, 3))");
        assert!(result.unwrap_err().contains("index overflow"));
    }

    #[test]
    fn call_passes_arguments_and_returns() {
        let src = "set(r, call(add_one, 5))\necho($r)\n@add_one [n]\nreturn($n + 1)";
        assert_eq!(output_of(src), "6");
    }

    #[test]
    fn call_unknown_label() {
        let (result, _) = run("call(nowhere)");
        assert!(result.unwrap_err().contains("no such label nowhere"));
    }

    #[test]
    fn call_checks_argument_count() {
        let (result, _) = run("call(f)\n@f [a]\nreturn($a)");
        assert!(result.unwrap_err().contains("too few arguments"));
        let (result, _) = run("call(f, 1, 2)\n@f [a]\nreturn($a)");
        assert!(result.unwrap_err().contains("too many arguments"));
    }

    #[test]
    fn call_error_keeps_inner_label_context() {
        let (result, _) = run("call(f)\n@f []\nnope()");
        let err = result.unwrap_err();
        assert!(err.contains("in label f"), "{err}");
        assert!(!err.contains("in label main"), "{err}");
    }

    #[test]
    fn bake_without_loader_reports_failure() {
        assert_eq!(output_of("echo(bake(\"whatever\"))"), "0");
    }

    struct UpperExt;

    impl Extension for UpperExt {
        fn builtins(&self) -> Vec<(String, Builtin)> {
            vec![(
                "upper".to_string(),
                Builtin::new(1, |args, _| match &args[0] {
                    Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
                    other => Err(ScriptError::new(format!(
                        "expected string, got {}",
                        other.kind()
                    ))),
                }),
            )]
        }
    }

    struct UpperLoader;

    impl ExtensionLoader for UpperLoader {
        fn load(&mut self, name: &str) -> Result<Box<dyn Extension>, String> {
            match name {
                "upper" => Ok(Box::new(UpperExt)),
                other => Err(format!("no such extension: {other}")),
            }
        }
    }

    #[test]
    fn bake_through_a_loader_extends_the_registry_mid_run() {
        let host = Rc::new(RefCell::new(MemoryHost::default()));
        let mut interp = Interpreter::with_host(host.clone());
        interp.set_loader(Rc::new(RefCell::new(UpperLoader)));
        interp
            .pre_process("echo(bake(\"upper\"))\necho(upper(\"hi\"))")
            .unwrap();
        interp.run("main", Vec::new()).unwrap();
        assert_eq!(host.borrow().output, "1HI");
    }

    #[test]
    fn input_reads_from_host_queue() {
        let host = Rc::new(RefCell::new(MemoryHost::default()));
        host.borrow_mut().input.push_back("tom".to_string());
        let mut interp = Interpreter::with_host(host.clone());
        interp.pre_process("set(n, input(\"name? \"))\necho($n)").unwrap();
        interp.run("main", Vec::new()).unwrap();
        assert_eq!(host.borrow().output, "name? tom");
    }

    #[test]
    fn os_macros_expand_in_argument_lists() {
        let out = output_of("echo(LINUX + WINDOWS + UNKNOWN)");
        assert_eq!(out, "1");
    }
}
