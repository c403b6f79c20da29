use crate::{config::ConfigError, utils::copy::CopyError};
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// Everything that can stop a deploy.
#[derive(Debug, Error)]
pub enum ArazuError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot deploy with local changes, commit or stash them first:\n{}", list_paths(.paths))]
    DirtyWorkingTree { paths: Vec<PathBuf> },

    #[error("build command `{command}` {}:\n{output}", describe_exit(.code))]
    Build {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("git {operation} failed: {message}")]
    Git {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Copy(#[from] CopyError),

    #[error("failed to reset deploy folder `{}`", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArazuError {
    pub fn git(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::Git { operation, message: message.to_string() }
    }
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths.iter()
        .map(|path| format!("  {}", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "could not be run to completion".into(),
    }
}
