//! Module containing terminal/progress-bar rendering utilities.
//!
//! These are rendering primitives only — whether a given operation uses them
//! at all is a configuration value threaded through `modctl_core`'s progress
//! tracker, not decided here.

use indicatif::{MultiProgress, MultiProgressAlignment, ProgressBar, ProgressStyle};
use std::sync::{Arc, LazyLock};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The multi-progress bar for CLI visualizations.
pub static MULTI_PROGRESS: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| {
    let mp = MultiProgress::new();
    mp.set_alignment(MultiProgressAlignment::Top);
    Arc::new(mp)
});

/// The checkmark for CLI visualizations.
pub static CHECKMARK: LazyLock<String> =
    LazyLock::new(|| format!("{}", console::style("✓").green()));

/// The error mark for CLI visualizations.
pub static ERROR_MARK: LazyLock<String> =
    LazyLock::new(|| format!("{}", console::style("✗").red()));

/// The tick strings for CLI visualizations.
pub static TICK_STRINGS: LazyLock<[&str; 11]> =
    LazyLock::new(|| ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", &CHECKMARK]);

/// The error tick strings for CLI visualizations.
pub static ERROR_TICK_STRINGS: LazyLock<[&str; 2]> = LazyLock::new(|| ["⠏", &ERROR_MARK]);

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if the process is running in an interactive terminal environment.
pub fn is_interactive_terminal() -> bool {
    let stdin_is_tty = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
    let stdout_is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };
    let is_tty = stdin_is_tty && stdout_is_tty;

    let has_term = std::env::var("TERM").is_ok();
    if is_tty && !has_term {
        tracing::debug!("detected TTY without TERM environment variable");
    }

    is_tty
}

/// Determines if the process is running in an ANSI-capable terminal environment.
pub fn is_ansi_interactive_terminal() -> bool {
    is_interactive_terminal() && !std::env::var("TERM").unwrap_or_default().contains("dumb")
}

/// Creates a progress bar keyed visually by `message`, inserted at the given
/// multi-progress position (or appended if `None`), sized if `len` is given
/// or rendered as an indeterminate spinner otherwise.
pub fn create_bar(message: String, insert_at_position: Option<usize>, len: Option<u64>) -> ProgressBar {
    let pb = if let Some(len) = len {
        ProgressBar::new(len)
    } else {
        ProgressBar::new_spinner()
    };

    let pb = if let Some(pos) = insert_at_position {
        MULTI_PROGRESS.insert(pos, pb)
    } else {
        MULTI_PROGRESS.add(pb)
    };

    let style = if len.is_some() {
        ProgressStyle::with_template("{spinner} {msg} {bytes:.bold}/{total_bytes:.dim}")
            .unwrap()
            .tick_strings(&*TICK_STRINGS)
    } else {
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap()
            .tick_strings(&*TICK_STRINGS)
    };

    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Finishes a bar with an error mark (✗) instead of a checkmark.
pub fn finish_with_error(pb: &ProgressBar) {
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap()
        .tick_strings(&*ERROR_TICK_STRINGS);

    pb.set_style(style);
    pb.finish();
}
