//! Runtime value model.

use std::fmt;

/// A CareScript runtime value.
///
/// `Name` is an evaluation-time placeholder for a bare identifier that no
/// typecheck claimed as a literal; operators such as `$` consume it to
/// perform variable lookup. It should not survive a finished evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Name(String),
    Null,
}

impl Value {
    /// Human-readable rendering used by `echo` and friends. Numbers print
    /// with up to six decimal places, trailing zeros trimmed; strings
    /// print their content without quotes.
    pub fn printable(&self) -> String {
        match self {
            Value::Number(n) => {
                let mut s = format!("{n:.6}");
                if s.contains('.') {
                    while s.ends_with('0') {
                        s.pop();
                    }
                    if s.ends_with('.') {
                        s.pop();
                    }
                }
                s
            }
            Value::Str(s) => s.clone(),
            Value::Name(n) => n.clone(),
            Value::Null => "null".to_string(),
        }
    }

    /// Source-form rendering: strings regain their quotes. Re-lexing the
    /// result reproduces the value.
    pub fn to_source(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{s}\""),
            other => other.printable(),
        }
    }

    /// Type name as reported by `typeof` and used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Name(_) => "name",
            Value::Null => "null",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truth for `if`: a nonzero number. Everything else is false.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Number(n) if *n != 0.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.printable())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
