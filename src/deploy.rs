//! The deploy lifecycle.
//!
//! `Idle → Preflight → Building → PreparingWorkspace → CopyingArtifacts →
//! Committing → Pushing → Done`. The first failing stage stops the run and
//! nothing is rolled back.

use crate::{
    build::build_project,
    config::{ConfigError, DeployConfig},
    error::ArazuError,
    log,
    utils::{
        copy::replace_contents,
        git::{BranchState, CommitOutcome, GitBackend},
    },
};
use std::{
    fmt, fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Preflight,
    Building,
    PreparingWorkspace,
    CopyingArtifacts,
    Committing,
    Pushing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Stage::Idle => "waiting to start",
            Stage::Preflight => "checking for local changes",
            Stage::Building => "running the build command",
            Stage::PreparingWorkspace => "preparing the deploy folder",
            Stage::CopyingArtifacts => "copying the build output",
            Stage::Committing => "committing the deploy",
            Stage::Pushing => "pushing the deploy",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(description)
    }
}

/// A deploy that stopped, and the stage it stopped in.
#[derive(Debug, Error)]
#[error("deploy aborted while {stage}")]
pub struct DeployFailure {
    pub stage: Stage,
    #[source]
    pub cause: ArazuError,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Commit but do not push, and keep the deploy folder around.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Pushed { source_sha: String, commit: String },
    NothingToCommit { source_sha: String },
    DryRun { source_sha: String, workspace: PathBuf, message: String },
}

pub struct Deployer<'a, G: GitBackend> {
    config: &'a DeployConfig,
    git: &'a G,
    options: DeployOptions,
    stage: Stage,
}

impl<'a, G: GitBackend> Deployer<'a, G> {
    pub fn new(config: &'a DeployConfig, git: &'a G, options: DeployOptions) -> Self {
        Self { config, git, options, stage: Stage::Idle }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run(&mut self) -> Result<DeployOutcome, DeployFailure> {
        match self.run_stages() {
            Ok(outcome) => {
                self.stage = Stage::Done;
                Ok(outcome)
            }
            Err(cause) => {
                let stage = self.stage;
                self.stage = Stage::Failed;
                Err(DeployFailure { stage, cause })
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        log!("deploy"; "{stage}");
    }

    fn run_stages(&mut self) -> Result<DeployOutcome, ArazuError> {
        let (config, git) = (self.config, self.git);
        let target = &config.target;

        self.enter(Stage::Preflight);
        let paths = DeployPaths::resolve(config)?;
        let exclude = paths.owned_by_arazu();
        let dirty = git.dirty_paths(&paths.source, &exclude)?;
        if !dirty.is_empty() {
            return Err(ArazuError::DirtyWorkingTree { paths: dirty });
        }
        let source_sha = git.current_head_hash(&paths.source)?;

        self.enter(Stage::Building);
        build_project(&paths.source, &config.build.command)?;

        self.enter(Stage::PreparingWorkspace);
        prepare_workspace(git, &paths.workspace, &target.repo, &target.branch)?;

        self.enter(Stage::CopyingArtifacts);
        let copied = replace_contents(&paths.output, &paths.workspace, &target.preserve)?;
        log!("deploy"; "copied {copied} files from `{}`", paths.output.display());

        self.enter(Stage::Committing);
        git.add_all(&paths.workspace)?;
        let message = render_commit_message(
            &target.commit_template,
            &chrono::Local::now().format(&target.date_format).to_string(),
            &source_sha,
        );
        let outcome = git.commit(&paths.workspace, &message)?;

        let commit = match outcome {
            CommitOutcome::NothingToCommit => {
                log!("deploy"; "nothing changed since the last deploy, skipping push");
                self.cleanup(&paths.workspace);
                return Ok(DeployOutcome::NothingToCommit { source_sha });
            }
            CommitOutcome::Committed { id } => id,
        };

        if self.options.dry_run {
            log!("deploy"; "dry run, commit `{commit}` was not pushed");
            return Ok(DeployOutcome::DryRun { source_sha, workspace: paths.workspace, message });
        }

        self.enter(Stage::Pushing);
        git.push(&paths.workspace, &target.branch)?;
        self.cleanup(&paths.workspace);

        Ok(DeployOutcome::Pushed { source_sha, commit })
    }

    fn cleanup(&self, workspace: &Path) {
        if !self.config.target.cleanup || self.options.dry_run { return }

        match fs::remove_dir_all(workspace) {
            Ok(()) => log!("deploy"; "removed deploy folder `{}`", workspace.display()),
            Err(err) => log!("error"; "failed to delete deploy folder `{}`, please delete it by hand: {err}", workspace.display()),
        }
    }
}

/// Absolute, normalized locations one deploy works with.
#[derive(Debug)]
struct DeployPaths {
    source: PathBuf,
    output: PathBuf,
    workspace: PathBuf,
}

impl DeployPaths {
    fn resolve(config: &DeployConfig) -> Result<Self, ArazuError> {
        let source = config.source_root();
        let source = source.canonicalize().map_err(|err| ConfigError::Io(source, err))?;
        let output = source.join(&config.build.output);
        let workspace = normalize(&config.workspace_dir_in(&source));

        if source.starts_with(&workspace) {
            return Err(ConfigError::Validation(format!(
                "deploy folder `{}` would remove the source repository",
                workspace.display()
            ))
            .into());
        }
        if output.starts_with(&workspace) || workspace.starts_with(&output) {
            return Err(ConfigError::Validation(format!(
                "deploy folder `{}` and build output `{}` must not contain each other",
                workspace.display(),
                output.display()
            ))
            .into());
        }

        Ok(Self { source, output, workspace })
    }

    /// Paths below the source root that arazu itself writes to.
    fn owned_by_arazu(&self) -> Vec<PathBuf> {
        [&self.output, &self.workspace]
            .into_iter()
            .filter_map(|path| path.strip_prefix(&self.source).ok())
            .map(Path::to_path_buf)
            .collect()
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => { normalized.pop(); },
            other => normalized.push(other),
        }
    }
    normalized
}

fn prepare_workspace<G: GitBackend>(git: &G, workspace: &Path, repo: &str, branch: &str) -> Result<(), ArazuError> {
    match fs::remove_dir_all(workspace) {
        Ok(()) => log!("deploy"; "removed previous deploy folder `{}`", workspace.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (),
        Err(source) => return Err(ArazuError::Workspace { path: workspace.to_path_buf(), source }),
    }
    if let Some(parent) = workspace.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| ArazuError::Workspace { path: workspace.to_path_buf(), source })?;
    }

    git.clone_repo(repo, workspace)?;
    match git.checkout_or_create_branch(workspace, branch)? {
        BranchState::Existing => log!("deploy"; "checked out branch `{branch}`"),
        BranchState::Created => log!("deploy"; "created branch `{branch}`"),
    }
    Ok(())
}

pub fn render_commit_message(template: &str, date: &str, sha: &str) -> String {
    template.replace("{date}", date).replace("{sha}", sha)
}
