use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner-style progress bar with a uniform appearance. Hidden when
/// `visible` is false so that logging and piped output stay clean.
pub fn spinner_progress(label: impl Into<String>, message: impl Into<String>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let label = label.into();
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{prefix:.bold.dim} {spinner:.green} {msg} [{elapsed_precise}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_prefix(label);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(75));
    pb
}
