//! Embeddable CareScript interpreter.
//!
//! ```no_run
//! use carescript::script::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.pre_process("echoln(\"hello from carescript\")")?;
//! interp.run("main", Vec::new())?;
//! assert_eq!(interp.eval("2 + 3 * 4")?, Value::Number(14.0));
//! # Ok::<(), String>(())
//! ```

pub mod cli;
pub mod script;

pub use script::{Interpreter, Value};
