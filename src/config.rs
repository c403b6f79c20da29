use chrono::format::{Item, StrftimeItems};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// Value the `init` template leaves in every field the user must fill in.
pub const PLACEHOLDER: &str = "fill this in";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config file `{}`, run `arazu init` to create one", .0.display())]
    NotFound(PathBuf),

    #[error("config file `{}` already exists, delete it to continue", .0.display())]
    AlreadyExists(PathBuf),

    #[error("IO error when accessing `{}`", .0.display())]
    Io(
        PathBuf,
        #[source] io::Error,
    ),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config file validation error: {0}")]
    Validation(String),
}

// for default value in serde
pub mod serde_defaults {
    pub fn r#false() -> bool { false }

    pub mod source {
        use std::path::PathBuf;

        pub fn path() -> PathBuf { "./".into() }
    }

    pub mod deploy {
        use std::path::PathBuf;

        pub fn branch() -> String { "gh-pages".into() }
        pub fn folder() -> PathBuf { ".deploy".into() }
        pub fn commit_template() -> String { "Deploy {date}\n\nSHA: {sha}\n".into() }
        pub fn date_format() -> String { "%Y-%m-%d %H:%M:%S %z".into() }
    }
}

// `[source]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    // git working tree holding the project, related to the config file
    #[serde(default = "serde_defaults::source::path")]
    #[educe(Default = serde_defaults::source::path())]
    pub path: PathBuf,
}

// `[build]` in toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    // shell command producing the output folder, empty to skip the build
    pub command: String,

    // build output related to the source path
    pub output: PathBuf,
}

// `[deploy]` in toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    // remote url of the deploy repository
    pub repo: String,

    // e.g., "gh-pages" for github project sites, "master" for user sites
    #[serde(default = "serde_defaults::deploy::branch")]
    #[educe(Default = serde_defaults::deploy::branch())]
    pub branch: String,

    // scratch clone of the deploy repository, related to the source path
    #[serde(default = "serde_defaults::deploy::folder")]
    #[educe(Default = serde_defaults::deploy::folder())]
    pub folder: PathBuf,

    // may contain `{date}` and `{sha}`
    #[serde(default = "serde_defaults::deploy::commit_template")]
    #[educe(Default = serde_defaults::deploy::commit_template())]
    pub commit_template: String,

    // chrono format string used for `{date}`
    #[serde(default = "serde_defaults::deploy::date_format")]
    #[educe(Default = serde_defaults::deploy::date_format())]
    pub date_format: String,

    // top-level names in the deploy branch that survive a deploy, e.g. "CNAME"
    #[serde(default)]
    pub preserve: Vec<PathBuf>,

    // remove the deploy folder once the deploy went through
    #[serde(default = "serde_defaults::r#false")]
    #[educe(Default = false)]
    pub cleanup: bool,
}

// top-level toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default)]
    pub source: SourceConfig,

    pub build: BuildConfig,

    #[serde(rename = "deploy")]
    pub target: TargetConfig,

    // directory holding the config file, relative paths resolve against it
    #[serde(skip)]
    root: PathBuf,
}

impl DeployConfig {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: DeployConfig = toml::from_str(content)?;
        config.root = PathBuf::from("./");
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(path.to_path_buf(), err),
        })?;
        let root = path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("./"));
        Ok(Self::from_str(&content)?.with_root(root))
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// The source working tree.
    pub fn source_root(&self) -> PathBuf {
        resolve(&self.root, &self.source.path)
    }

    /// Where the build command leaves its artifacts.
    pub fn output_dir(&self) -> PathBuf {
        self.source_root().join(&self.build.output)
    }

    /// Local scratch clone of the deploy repository.
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_dir_in(&self.source_root())
    }

    /// The deploy folder resolved against an already located `source`.
    pub fn workspace_dir_in(&self, source: &Path) -> PathBuf {
        resolve(source, &self.target.folder)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let output = self.build.output.to_string_lossy();
        let unfilled = [
            ("build.command", self.build.command.as_str()),
            ("build.output", output.as_ref()),
            ("deploy.repo", self.target.repo.as_str()),
        ]
        .into_iter()
        .find(|(_, value)| value.trim() == PLACEHOLDER);
        if let Some((field, _)) = unfilled {
            return Err(invalid(format!("you must set the `{field}` value")));
        }

        if self.target.repo.trim().is_empty() {
            return Err(invalid("`deploy.repo` cannot be empty"));
        }

        let output = &self.build.output;
        if output.as_os_str().is_empty() || output.is_absolute() {
            return Err(invalid("`build.output` should be a relative path inside the source repository"));
        }
        if output.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(invalid("`build.output` cannot leave the source repository"));
        }
        if output.components().all(|c| matches!(c, Component::CurDir)) {
            return Err(invalid("`build.output` cannot be the source repository itself"));
        }

        let branch = self.target.branch.trim();
        if branch.is_empty() || branch.contains(char::is_whitespace) {
            return Err(invalid("`deploy.branch` should be a branch name without whitespace"));
        }

        let folder = &self.target.folder;
        if folder.as_os_str().is_empty() || folder.components().all(|c| matches!(c, Component::CurDir)) {
            return Err(invalid("`deploy.folder` cannot be empty or `.`"));
        }

        if StrftimeItems::new(&self.target.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid(format!("`deploy.date_format` `{}` is not a valid date format", self.target.date_format)));
        }

        if self.target.commit_template.trim().is_empty() {
            return Err(invalid("`deploy.commit_template` cannot be empty"));
        }

        for name in &self.target.preserve {
            let mut components = name.components();
            let single_name = matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            );
            if !single_name || name == Path::new(".git") {
                return Err(invalid(format!(
                    "`deploy.preserve` entry `{}` should be a top-level file or directory name",
                    name.display()
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    let path = shellexpand::path::tilde(path);
    if path.is_absolute() { path.into_owned() } else { base.join(path) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
        [source]
        path = "site"

        [build]
        command = "npm run build"
        output = "dist"

        [deploy]
        repo = "git@github.com:someone/someone.github.io.git"
        branch = "master"
        preserve = ["CNAME"]
    "#;

    #[test]
    fn parse_config() {
        let config = DeployConfig::from_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.build.command, "npm run build");
        assert_eq!(config.target.branch, "master");
        assert_eq!(config.target.preserve, vec![PathBuf::from("CNAME")]);
        assert_eq!(config.output_dir(), PathBuf::from("./site/dist"));
    }

    #[test]
    fn default_values() {
        let config_str = r#"
            [build]
            command = "make"
            output = "public"

            [deploy]
            repo = "https://example.com/site.git"
        "#;

        let config = DeployConfig::from_str(config_str).unwrap();

        assert_eq!(config.source.path, PathBuf::from("./"));
        assert_eq!(config.target.branch, "gh-pages");
        assert_eq!(config.target.folder, PathBuf::from(".deploy"));
        assert_eq!(config.target.commit_template, "Deploy {date}\n\nSHA: {sha}\n");
        assert!(!config.target.cleanup);
        assert!(config.target.preserve.is_empty());
        assert_eq!(config.workspace_dir(), PathBuf::from("./").join(".deploy"));
    }

    #[test]
    fn missing_required_field() {
        let without_repo = r#"
            [build]
            command = "make"
            output = "public"

            [deploy]
            branch = "gh-pages"
        "#;
        assert!(matches!(DeployConfig::from_str(without_repo), Err(ConfigError::Toml(_))));

        let without_build = r#"
            [deploy]
            repo = "https://example.com/site.git"
        "#;
        assert!(matches!(DeployConfig::from_str(without_build), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn malformed_file() {
        assert!(matches!(DeployConfig::from_str("[build"), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let config_str = r#"
            [build]
            command = "make"
            output = "public"
            minify = true

            [deploy]
            repo = "https://example.com/site.git"
        "#;
        assert!(matches!(DeployConfig::from_str(config_str), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn config_validation() {
        let with = |build: &str, deploy: &str| DeployConfig::from_str(&format!(
            "[build]\n{build}\n[deploy]\n{deploy}\n"
        ));

        let placeholder = with(
            "command = \"make\"\noutput = \"fill this in\"",
            "repo = \"https://example.com/site.git\"",
        );
        assert!(matches!(placeholder, Err(ConfigError::Validation(msg)) if msg.contains("build.output")));

        let escaping_output = with(
            "command = \"make\"\noutput = \"../public\"",
            "repo = \"https://example.com/site.git\"",
        );
        assert!(matches!(escaping_output, Err(ConfigError::Validation(_))));

        let current_dir_folder = with(
            "command = \"make\"\noutput = \"public\"",
            "repo = \"https://example.com/site.git\"\nfolder = \".\"",
        );
        assert!(matches!(current_dir_folder, Err(ConfigError::Validation(_))));

        let bad_date_format = with(
            "command = \"make\"\noutput = \"public\"",
            "repo = \"https://example.com/site.git\"\ndate_format = \"%Q\"",
        );
        assert!(matches!(bad_date_format, Err(ConfigError::Validation(_))));

        let spaced_branch = with(
            "command = \"make\"\noutput = \"public\"",
            "repo = \"https://example.com/site.git\"\nbranch = \"gh pages\"",
        );
        assert!(matches!(spaced_branch, Err(ConfigError::Validation(_))));

        let nested_preserve = with(
            "command = \"make\"\noutput = \"public\"",
            "repo = \"https://example.com/site.git\"\npreserve = [\"assets/CNAME\"]",
        );
        assert!(matches!(nested_preserve, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn empty_build_command_is_allowed() {
        let config = DeployConfig::from_str(
            "[build]\ncommand = \"\"\noutput = \"public\"\n[deploy]\nrepo = \"https://example.com/site.git\"\n",
        )
        .unwrap();
        assert!(config.build.command.is_empty());
    }

    #[test]
    fn from_path_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arazu.toml");
        fs::write(&path, SAMPLE_CONFIG).unwrap();

        let config = DeployConfig::from_path(&path).unwrap();
        assert_eq!(config.source_root(), dir.path().join("site"));
        assert_eq!(config.workspace_dir(), dir.path().join("site").join(".deploy"));
    }

    #[test]
    fn from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arazu.toml");
        assert!(matches!(DeployConfig::from_path(&path), Err(ConfigError::NotFound(_))));
    }
}
