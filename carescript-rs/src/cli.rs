//! Command-line argument parsing.
//!
//! Usage:
//!   carescript [-l <label>] <file> [<args>...]
//!   carescript -e <expression>

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Script file to run.
    pub script: Option<PathBuf>,
    /// Label to start from (`-l <label>`, default `main`).
    pub label: Option<String>,
    /// Evaluate a single expression instead of running a file (`-e`).
    pub eval: Option<String>,
    /// Arguments handed to the start label, bound positionally.
    pub script_args: Vec<String>,
    /// `-h` / `--help`.
    pub show_help: bool,
}

pub const USAGE: &str = "\
usage: carescript [-l <label>] <file> [<args>...]
       carescript -e <expression>

  -l <label>   run this label instead of main
  -e <expr>    evaluate an expression and print the result
  -h, --help   show this help";

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        match arg {
            "-h" | "--help" => args.show_help = true,
            "-l" | "--label" => {
                i += 1;
                let value = argv
                    .get(i)
                    .ok_or_else(|| format!("{arg} requires a label name"))?;
                args.label = Some(value.clone());
            }
            "-e" | "--eval" => {
                i += 1;
                let value = argv
                    .get(i)
                    .ok_or_else(|| format!("{arg} requires an expression"))?;
                args.eval = Some(value.clone());
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("unknown option: {arg}"));
            }
            _ => {
                // the first positional is the script; everything after it
                // belongs to the script, flags included
                positional.push(arg.to_string());
                positional.extend(argv[i + 1..].iter().cloned());
                break;
            }
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    args.script = positional.next().map(PathBuf::from);
    args.script_args = positional.collect();

    if args.eval.is_some() && args.script.is_some() {
        return Err("cannot combine -e with a script file".to_string());
    }
    if !args.show_help && args.eval.is_none() && args.script.is_none() {
        return Err(format!("no script file given\n{USAGE}"));
    }
    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_script() {
        let args = parse_argv(&argv(&["run.ccs"])).unwrap();
        assert_eq!(args.script, Some(PathBuf::from("run.ccs")));
        assert_eq!(args.label, None);
        assert!(args.script_args.is_empty());
    }

    #[test]
    fn label_flag() {
        let args = parse_argv(&argv(&["-l", "setup", "run.ccs"])).unwrap();
        assert_eq!(args.label.as_deref(), Some("setup"));
        assert_eq!(args.script, Some(PathBuf::from("run.ccs")));
    }

    #[test]
    fn script_args_pass_through_untouched() {
        let args = parse_argv(&argv(&["run.ccs", "-l", "weird"])).unwrap();
        assert_eq!(args.script_args, vec!["-l", "weird"]);
    }

    #[test]
    fn double_dash_ends_flags() {
        let args = parse_argv(&argv(&["--", "-e"])).unwrap();
        assert_eq!(args.script, Some(PathBuf::from("-e")));
    }

    #[test]
    fn eval_mode() {
        let args = parse_argv(&argv(&["-e", "1 + 2"])).unwrap();
        assert_eq!(args.eval.as_deref(), Some("1 + 2"));
        assert_eq!(args.script, None);
    }

    #[test]
    fn eval_and_script_conflict() {
        assert!(parse_argv(&argv(&["-e", "1", "run.ccs"])).is_err());
    }

    #[test]
    fn missing_flag_value() {
        assert!(parse_argv(&argv(&["-l"])).is_err());
    }

    #[test]
    fn unknown_option() {
        assert!(parse_argv(&argv(&["-z", "run.ccs"])).is_err());
    }

    #[test]
    fn no_arguments_is_an_error() {
        assert!(parse_argv(&[]).is_err());
    }

    #[test]
    fn help_alone_is_fine() {
        assert!(parse_argv(&argv(&["-h"])).unwrap().show_help);
    }
}
