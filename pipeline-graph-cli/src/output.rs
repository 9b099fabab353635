// Output formatting helpers for CLI commands

use pipeline_graph::RunResult;

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}

/// Print a row for a node or step, marked and coloured by its result.
/// Nodes without a result (placeholders, skipped nodes) are dimmed.
pub fn result_row(result: Option<RunResult>, message: &str) {
    let (color, mark) = match result {
        Some(RunResult::Success) => ("32", "\u{2713}"),
        Some(RunResult::Unstable) => ("33", "!"),
        Some(RunResult::Failure) => ("31", "\u{2717}"),
        Some(RunResult::Aborted) => ("35", "\u{2717}"),
        Some(RunResult::Unknown) => ("36", "\u{2026}"),
        Some(RunResult::NotBuilt) | None => ("2", "-"),
    };
    println!("\x1b[{}m  {}\x1b[0m {}", color, mark, message);
}

/// Human readable duration, `-` when unknown
pub fn duration(millis: Option<u64>) -> String {
    match millis {
        None => "-".to_string(),
        Some(ms) if ms < 1_000 => format!("{}ms", ms),
        Some(ms) if ms < 60_000 => format!("{:.1}s", ms as f64 / 1_000.0),
        Some(ms) => format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1_000),
    }
}
