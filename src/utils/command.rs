use crate::log;
use std::{
    ffi::OsString,
    io,
    path::Path,
    process::{Command, Output},
};

/// Program and leading arguments used to hand a command line to the shell.
#[cfg(not(windows))]
pub const SHELL: [&str; 2] = ["sh", "-c"];
#[cfg(windows)]
pub const SHELL: [&str; 2] = ["cmd", "/C"];

/// Run `$command` with `$args` inside `$root`.
///
/// Empty arguments are dropped, so optional flags can be written inline as
/// `if flag { "--flag" } else { "" }`.
#[macro_export]
macro_rules! run_command {
    ($root:expr; $command:expr; $($arg:expr),*) => {{
        use $crate::utils::command::{run_command, into_arg};
        use std::ffi::OsString;

        let args: Vec<OsString> = [$(into_arg($arg),)*].into_iter().filter(|a| !a.is_empty()).collect();
        let command: Vec<OsString> = $command.iter().map(into_arg).collect();

        run_command($root, &command, &args)
    }};
}

/// Like [`run_command!`], but stdout is only returned, never echoed.
///
/// For git calls that read state (`status`, `rev-parse`) whose output is data.
#[macro_export]
macro_rules! query_command {
    ($root:expr; $command:expr; $($arg:expr),*) => {{
        use $crate::utils::command::{Echo, into_arg, run_command_with};
        use std::ffi::OsString;

        let args: Vec<OsString> = [$(into_arg($arg),)*].into_iter().filter(|a| !a.is_empty()).collect();
        let command: Vec<OsString> = $command.iter().map(into_arg).collect();

        run_command_with($root, &command, &args, Echo::StderrOnly)
    }};
}

/// Which streams of a finished command get logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    All,
    StderrOnly,
}

pub fn into_arg<S>(arg: S) -> OsString
where
    S: Into<OsString>,
{
    arg.into()
}

/// Spawn the command with an explicit working directory and wait for it.
///
/// The exit status is not checked here; callers decide what a failure means.
pub fn run_command(root: &Path, command: &[OsString], args: &[OsString]) -> io::Result<Output> {
    run_command_with(root, command, args, Echo::All)
}

pub fn run_command_with(root: &Path, command: &[OsString], args: &[OsString], echo: Echo) -> io::Result<Output> {
    let (program, leading) = command
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    let args: Vec<&OsString> = leading.iter().chain(args).collect();

    let output = Command::new(program)
        .args(args)
        .current_dir(root)
        .output()?;

    log_for_command(&program.to_string_lossy(), &output, echo);

    Ok(output)
}

pub fn log_for_command(name: &str, output: &Output, echo: Echo) {
    echoed_lines(output, echo).iter().for_each(|s| log!(name; "{s}"));
}

#[rustfmt::skip]
fn echoed_lines(output: &Output, echo: Echo) -> Vec<String> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = if echo == Echo::All { stdout.as_ref() } else { "" };

    stdout.lines().chain(stderr.lines())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

/// The most useful text a failed command left behind: stderr, else stdout.
pub fn failure_output(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if !stderr.is_empty() { return stderr }
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}
