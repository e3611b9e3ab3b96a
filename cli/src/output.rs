//! Status line helpers for CLI commands

use colored::Colorize;
use std::path::Path;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a written file with its size
pub fn file(label: &str, path: &Path, bytes: usize) {
    println!(
        "  {:<9} {} {}",
        label,
        path.display().to_string().bold(),
        format!("({} bytes)", bytes).dimmed()
    );
}
