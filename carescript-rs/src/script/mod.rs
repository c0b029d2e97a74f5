//! The CareScript engine: tokenizer, preprocessor, expression evaluator,
//! statement executor, and the registries that make all of it open for
//! extension.

pub mod builtins;
pub mod expr;
pub mod extension;
pub mod interp;
pub mod lexer;
pub mod preprocess;
pub mod value;

pub use extension::{Extension, ExtensionLoader};
pub use interp::{
    Builtin, Interpreter, MemoryHost, OpKind, Operator, Registry, ScriptError, ScriptHost,
    ScriptState, StdHost,
};
pub use lexer::{Lexer, Token};
pub use preprocess::Label;
pub use value::Value;
