//! GARAGE path utilities

use std::path::PathBuf;

/// Data directory (~/.motorcrew), falling back to ./.motorcrew without a home
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".motorcrew")
}

/// Default config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Replace characters that are not allowed in file names.
///
/// Spaces are kept so that `Tesla Model 3` maps to `Tesla Model 3_report.md`.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect()
}
