//! Terminal styling for clap's generated `--help` output.

use clap::builder::{styling::AnsiColor, Styles};

/// The style sheet applied to [`crate::ModctlArgs`]'s generated help text.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
}
