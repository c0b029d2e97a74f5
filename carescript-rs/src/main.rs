use carescript::cli;
use carescript::script::{Interpreter, Value};

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("carescript: {e}");
            std::process::exit(1);
        }
    };

    if args.show_help {
        println!("{}", cli::USAGE);
        return;
    }

    let mut interp = Interpreter::new();

    if let Some(expr) = &args.eval {
        match interp.eval(expr) {
            Ok(value) => {
                if !value.is_null() {
                    println!("{value}");
                }
            }
            Err(e) => {
                eprintln!("carescript: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    // parse_argv guarantees a script path when not in eval/help mode
    let Some(path) = &args.script else {
        eprintln!("carescript: no script file given");
        std::process::exit(1);
    };
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("carescript: cannot open {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    if let Err(e) = interp.pre_process(&source) {
        eprintln!("carescript: {}: {e}", path.display());
        std::process::exit(1);
    }

    let label = args.label.as_deref().unwrap_or("main");
    let script_args: Vec<Value> = args
        .script_args
        .iter()
        .map(|s| Value::Str(s.clone()))
        .collect();

    match interp.run(label, script_args) {
        Ok(value) => {
            if !value.is_null() {
                println!("{value}");
            }
        }
        Err(e) => {
            eprintln!("carescript: {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}
