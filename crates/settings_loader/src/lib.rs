//! # Settings Loader
//!
//! Loads [`ParserSettings`] for the statement parsers from JSON files.
//!
//! Every key of the settings file is optional; missing keys keep the
//! compile-time defaults of [`ParserSettings::default`].
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/abonos.json")?;
//!
//! // Load optional settings (defaults if no path is given)
//! let path = Some(PathBuf::from("abonos.json"));
//! let settings = settings_loader::load_optional_settings(path.as_ref())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use models::ParserSettings;

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<ParserSettings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: ParserSettings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads settings from an optional path, returning the defaults if no path is provided
pub fn load_optional_settings(path: Option<&PathBuf>) -> Result<ParserSettings> {
    match path {
        Some(settings_path) => load_settings(settings_path),
        None => Ok(ParserSettings::default()),
    }
}

/// Writes settings as pretty JSON, e.g. to produce a starting file to edit
pub fn write_settings<P: AsRef<Path>>(path: P, settings: &ParserSettings) -> Result<()> {
    let path = path.as_ref();
    let formatted = serde_json::to_string_pretty(settings)?;
    fs::write(path, formatted)
        .with_context(|| format!("Writing settings file: {}", path.display()))?;
    Ok(())
}

/// Checks if a settings file exists at the given path
pub fn settings_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists() && path.as_ref().is_file()
}
