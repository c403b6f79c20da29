use crate::error::ArazuError;
use std::path::PathBuf;

pub fn check_git_installed() -> Result<PathBuf, ArazuError> {
    which::which("git").map_err(|_| ArazuError::git("lookup", not_found_message("git")))
}

fn not_found_message(command: &str) -> String {
    format!("`{command}` not found. Please install `{command}` first.")
}
