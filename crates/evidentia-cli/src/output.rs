//! Console output helpers shared by every subcommand.

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table output with colors.
    #[default]
    Table,
    /// Machine-readable JSON output.
    Json,
}

/// Create a table using the crate-wide preset.
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table
}

/// Print a JSON value, pretty-printed.
pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "ERROR:".bright_red().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "\u{2713}".bright_green().bold(), msg);
}

/// Print an informational message.
pub fn print_info(msg: &str) {
    println!("{} {}", "\u{2139}".bright_blue().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_applies_preset() {
        let mut table = create_table();
        table.set_header(vec!["a", "b"]);
        table.add_row(vec!["1", "2"]);
        assert!(table.to_string().contains('1'));
    }
}
