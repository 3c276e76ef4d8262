//! Progress indicators for rtsync.
//!
//! Spinners are only drawn when stderr is a terminal and output is not quiet.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Whether spinners should be drawn at all
pub fn enabled(quiet: bool) -> bool {
    !quiet && console::Term::stderr().is_term()
}

/// Start a spinner with `msg`; hidden when progress is disabled
pub fn spinner(msg: &str, quiet: bool) -> ProgressBar {
    if !enabled(quiet) {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a spinner with a success line
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    if !pb.is_hidden() {
        eprintln!("{} {}", "✓".green(), msg);
    }
}

/// Clear a spinner without leaving a line
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Run `f` under a spinner, clearing it whatever the outcome
pub fn with_spinner<T, E>(
    msg: &str,
    quiet: bool,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let pb = spinner(msg, quiet);
    let result = f();
    match &result {
        Ok(_) => finish_success(&pb, msg.trim_end_matches("...")),
        Err(_) => finish_clear(&pb),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_spinner_is_hidden() {
        let pb = spinner("Fetching", true);
        assert!(pb.is_hidden());
        finish_success(&pb, "done");
    }

    #[test]
    fn test_with_spinner_passes_result_through() {
        let ok: Result<u32, String> = with_spinner("Working...", true, || Ok(7));
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = with_spinner("Working...", true, || Err("boom".into()));
        assert_eq!(err, Err("boom".to_string()));
    }
}
