use crate::{
    error::ArazuError,
    log, run_command,
    utils::command::{SHELL, failure_output},
};
use std::path::Path;

/// Run the configured build command in `root` through the platform shell.
///
/// The environment is inherited. Output is echoed as it is collected, and
/// kept in the error when the command fails.
#[rustfmt::skip]
pub fn build_project(root: &Path, command: &str) -> Result<(), ArazuError> {
    if command.trim().is_empty() {
        log!("build"; "no build command configured, skipping");
        return Ok(())
    }

    log!("build"; "running `{command}` in `{}`", root.display());
    let output = run_command!(root; SHELL; command)
        .map_err(|err| ArazuError::Build {
            command: command.to_owned(),
            code: None,
            output: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(ArazuError::Build {
            command: command.to_owned(),
            code: output.status.code(),
            output: failure_output(&output),
        });
    }

    log!("build"; "finished `{command}`");
    Ok(())
}
