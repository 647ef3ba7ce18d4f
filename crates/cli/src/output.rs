//! Shared list/row printing: `--json` dumps the raw value, otherwise a
//! human-readable `{:#?}`-style debug rendering.

use serde::Serialize;

pub fn print_value<T: Serialize + std::fmt::Debug>(value: &T, as_json: bool) {
    if as_json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize output: {e}"),
        }
    } else {
        println!("{value:#?}");
    }
}

/// Exit codes per the CLI contract: 0 success, 1 execution error, 2
/// validation error.
pub enum ExitCode {
    Success = 0,
    ExecutionError = 1,
    ValidationError = 2,
}

pub fn exit_on_error(err: &engine::SpineError) -> ! {
    eprintln!("error: {err}");
    let code = match err.category() {
        queue::resilience::ErrorCategory::Validation => ExitCode::ValidationError,
        _ => ExitCode::ExecutionError,
    };
    std::process::exit(code as i32);
}

pub fn exit_on_anyhow(err: &anyhow::Error) -> ! {
    eprintln!("error: {err:#}");
    std::process::exit(ExitCode::ExecutionError as i32);
}
