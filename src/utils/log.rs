use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        use $crate::utils::log::log;

        let log_message = format!($($arg)*);
        log($module, log_message)
    }};
}

/// Silence everything except the `error` module.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

pub fn log(module: &str, message: String) {
    use colored::Colorize;
    use crossterm::{execute, terminal::{Clear, ClearType}};
    use std::io::{Write, stderr, stdout};

    let module_lower = module.to_lowercase();
    let is_error = module_lower == "error";
    if is_quiet() && !is_error { return }

    let colored_prefix = match module_lower.as_str() {
        "deploy" => format!("[{module}]").bright_blue().bold(),
        "build" => format!("[{module}]").bright_green().bold(),
        "error" => format!("[{module}]").bright_red().bold(),
        _ => format!("[{module}]").bright_yellow().bold(),
    };

    let log_msg = format!("{colored_prefix} {message}");

    if is_error {
        let mut stderr = stderr().lock();
        writeln!(stderr, "{log_msg}").ok();
        stderr.flush().ok();
    } else {
        let mut stdout = stdout().lock();
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
        writeln!(stdout, "{log_msg}").ok();
        stdout.flush().ok();
    }
}
