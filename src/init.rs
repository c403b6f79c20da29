use crate::{config::ConfigError, log};
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

// default config path
pub const CONFIG: &str = "arazu.toml";

// starting point written by `arazu init`, every `fill this in` has to be replaced
pub const TEMPLATE: &str = r#"# arazu config - check this in to source control

[source]
# git working tree to build, related to this file
path = "./"

[build]
# build command - runs in the source path through the shell
command = "fill this in"

# folder with build output - this gets committed into the deploy repo
output = "fill this in"

[deploy]
# where the deployed output lives
repo = "fill this in"

# if github, use master for user or organization sites, gh-pages for project sites
branch = "gh-pages"

# scratch clone of the deploy repo, recreated on every deploy
folder = ".deploy"

# format for commit message - can include {date} and {sha}
commit_template = """
Deploy {date}

SHA: {sha}
"""

# top-level files in the deploy branch to keep across deploys, e.g. ["CNAME"]
preserve = []

# delete the scratch clone once the deploy is pushed
cleanup = false
"#;

/// Write the config template to `path`, refusing to touch an existing file.
pub fn new_config(path: &Path) -> Result<(), ConfigError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => ConfigError::AlreadyExists(path.to_path_buf()),
            _ => ConfigError::Io(path.to_path_buf(), err),
        })?;

    file.write_all(TEMPLATE.as_bytes())
        .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

    log!("init"; "new config template at `{}`", path.display());
    log!("init"; "fill it out and run `arazu deploy`");
    Ok(())
}
