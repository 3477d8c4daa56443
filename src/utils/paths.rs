//! Path Utilities
//!
//! Resolves the application data directory and default file locations.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the codetrail data directory (~/.codetrail/)
pub fn codetrail_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".codetrail"))
}

/// Get the default database file path (~/.codetrail/events.db)
pub fn default_database_path() -> AppResult<PathBuf> {
    Ok(codetrail_dir()?.join("events.db"))
}
