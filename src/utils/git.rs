// Local reads go through gix, everything that touches a remote or the index
// goes through the `git` binary so credentials and hooks behave as usual.

use crate::{error::ArazuError, log, query_command, run_command, utils::command::failure_output};
use std::{
    io,
    path::{Path, PathBuf},
    process::Output,
};

/// Length of the abbreviated hashes put into commit messages.
pub const SHORT_HASH_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Existing,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { id: String },
    NothingToCommit,
}

/// The handful of git operations a deploy needs.
///
/// Every call names the directory it works in, nothing depends on the
/// process working directory.
pub trait GitBackend {
    /// Modified, staged and untracked paths in `repo`.
    ///
    /// `exclude` is relative to `repo`; anything below one of those paths is
    /// not reported.
    fn dirty_paths(&self, repo: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>, ArazuError>;

    fn is_working_tree_clean(&self, repo: &Path, exclude: &[PathBuf]) -> Result<bool, ArazuError> {
        Ok(self.dirty_paths(repo, exclude)?.is_empty())
    }

    /// Abbreviated id of the commit `HEAD` points at.
    fn current_head_hash(&self, repo: &Path) -> Result<String, ArazuError>;

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), ArazuError>;

    /// Switch to `branch`, starting it as an empty orphan when the remote
    /// does not have it yet.
    fn checkout_or_create_branch(&self, repo: &Path, branch: &str) -> Result<BranchState, ArazuError>;

    fn add_all(&self, repo: &Path) -> Result<(), ArazuError>;

    fn commit(&self, repo: &Path, message: &str) -> Result<CommitOutcome, ArazuError>;

    fn push(&self, repo: &Path, branch: &str) -> Result<(), ArazuError>;
}

/// [`GitBackend`] backed by the system `git` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

fn checked(operation: &'static str, result: io::Result<Output>) -> Result<Output, ArazuError> {
    let output = result.map_err(|err| ArazuError::git(operation, format!("could not run git: {err}")))?;
    if !output.status.success() {
        return Err(ArazuError::git(operation, failure_output(&output)));
    }
    Ok(output)
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

/// Paths out of `git status --porcelain -z`.
fn parse_porcelain(raw: &[u8]) -> Vec<PathBuf> {
    let raw = String::from_utf8_lossy(raw);
    let mut records = raw.split('\0').filter(|record| !record.is_empty());
    let mut paths = vec![];

    while let Some(record) = records.next() {
        let Some((status, path)) = record.split_at_checked(3) else { continue };
        // renames and copies carry their origin as a separate record
        if status.contains(['R', 'C']) {
            records.next();
        }
        paths.push(PathBuf::from(path.trim_end_matches('/')));
    }

    paths
}

impl GitBackend for SystemGit {
    fn dirty_paths(&self, repo: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>, ArazuError> {
        // status reports paths from the top of the work tree
        let prefix = checked("status", query_command!(repo; ["git"]; "rev-parse", "--show-prefix"))?;
        let prefix = PathBuf::from(stdout_of(&prefix));
        let exclude: Vec<PathBuf> = exclude.iter().map(|path| prefix.join(path)).collect();

        let output = checked("status", query_command!(repo; ["git"];
            "status", "--porcelain", "-z", "--untracked-files=all"
        ))?;

        let paths = parse_porcelain(&output.stdout)
            .into_iter()
            .filter(|path| !exclude.iter().any(|excluded| path.starts_with(excluded)))
            .collect();
        Ok(paths)
    }

    fn current_head_hash(&self, repo: &Path) -> Result<String, ArazuError> {
        let repo = gix::discover(repo).map_err(|err| ArazuError::git("rev-parse", err))?;
        let id = repo.head_id()
            .map_err(|err| ArazuError::git("rev-parse", format!("cannot resolve HEAD: {err}")))?;
        Ok(id.to_hex_with_len(SHORT_HASH_LEN).to_string())
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), ArazuError> {
        let parent = dest.parent().unwrap_or(Path::new("./"));
        log!("git"; "cloning `{url}` into `{}`", dest.display());
        checked("clone", run_command!(parent; ["git"]; "clone", "--quiet", url, dest))?;
        Ok(())
    }

    fn checkout_or_create_branch(&self, repo: &Path, branch: &str) -> Result<BranchState, ArazuError> {
        let remote_branch = format!("origin/{branch}");
        let remote_ref = format!("refs/remotes/{remote_branch}");
        let exists = query_command!(repo; ["git"]; "rev-parse", "--verify", "--quiet", &remote_ref)
            .map_err(|err| ArazuError::git("checkout", err))?
            .status
            .success();

        if exists {
            checked("checkout", run_command!(repo; ["git"];
                "checkout", "--quiet", "-B", branch, &remote_branch
            ))?;
            return Ok(BranchState::Existing);
        }

        log!("git"; "branch `{branch}` not found on the remote, starting it empty");
        checked("checkout", run_command!(repo; ["git"]; "checkout", "--quiet", "--orphan", branch))?;
        checked("checkout", run_command!(repo; ["git"];
            "rm", "-r", "-f", "--quiet", "--ignore-unmatch", "."
        ))?;
        Ok(BranchState::Created)
    }

    fn add_all(&self, repo: &Path) -> Result<(), ArazuError> {
        checked("add", run_command!(repo; ["git"]; "add", "--all", "."))?;
        Ok(())
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<CommitOutcome, ArazuError> {
        let status = checked("commit", query_command!(repo; ["git"]; "status", "--porcelain"))?;
        if stdout_of(&status).is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }

        checked("commit", run_command!(repo; ["git"]; "commit", "--quiet", "-m", message))?;
        let id = self.current_head_hash(repo)?;
        Ok(CommitOutcome::Committed { id })
    }

    fn push(&self, repo: &Path, branch: &str) -> Result<(), ArazuError> {
        checked("push", run_command!(repo; ["git"];
            "push", "--quiet", "--set-upstream", "origin", branch
        ))?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_paths() {
        let raw = b" M src/main.rs\0?? notes.txt\0R  new.rs\0old.rs\0?? .deploy/\0";
        assert_eq!(
            parse_porcelain(raw),
            vec![
                PathBuf::from("src/main.rs"),
                PathBuf::from("notes.txt"),
                PathBuf::from("new.rs"),
                PathBuf::from(".deploy"),
            ]
        );
    }

    #[test]
    fn porcelain_empty() {
        assert!(parse_porcelain(b"").is_empty());
    }

    // needs a `git` binary, skipped where there is none
    #[cfg(unix)]
    #[test]
    fn system_git_sees_untracked_files() {
        if which::which("git").is_err() { return }

        let dir = tempfile::tempdir().unwrap();
        checked("init", run_command!(dir.path(); ["git"]; "init", "--quiet")).unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/index.html"), "built").unwrap();
        std::fs::write(dir.path().join("draft.md"), "wip").unwrap();

        let git = SystemGit;
        let dirty = git.dirty_paths(dir.path(), &[PathBuf::from("public")]).unwrap();
        assert_eq!(dirty, vec![PathBuf::from("draft.md")]);

        std::fs::remove_file(dir.path().join("draft.md")).unwrap();
        assert!(git.is_working_tree_clean(dir.path(), &[PathBuf::from("public")]).unwrap());
    }

    #[cfg(unix)]
    fn git_output(root: &Path, args: &[&str]) -> String {
        use crate::utils::command::run_command;
        use std::ffi::OsString;

        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        stdout_of(&checked("test", run_command(root, &[OsString::from("git")], &args)).unwrap())
    }

    // a fresh clone has no identity of its own, commits take it from here
    #[cfg(unix)]
    fn set_test_identity() {
        static IDENTITY: std::sync::Once = std::sync::Once::new();
        IDENTITY.call_once(|| unsafe {
            std::env::set_var("GIT_AUTHOR_NAME", "arazu");
            std::env::set_var("GIT_AUTHOR_EMAIL", "arazu@example.com");
            std::env::set_var("GIT_COMMITTER_NAME", "arazu");
            std::env::set_var("GIT_COMMITTER_EMAIL", "arazu@example.com");
        });
    }

    #[cfg(unix)]
    #[test]
    fn system_git_deploys_to_bare_remote() {
        use crate::{
            config::DeployConfig,
            deploy::{DeployOptions, DeployOutcome, Deployer},
        };

        if which::which("git").is_err() { return }
        set_test_identity();

        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote.git");
        let source = dir.path().join("site");
        std::fs::create_dir_all(&source).unwrap();

        git_output(dir.path(), &["init", "--quiet", "--bare", "remote.git"]);
        git_output(&source, &["init", "--quiet"]);
        std::fs::write(source.join("README.md"), "site").unwrap();
        git_output(&source, &["add", "README.md"]);
        git_output(&source, &["commit", "--quiet", "--no-gpg-sign", "-m", "initial"]);
        let head = git_output(&source, &["rev-parse", "HEAD"]);
        let short = &head[..SHORT_HASH_LEN];

        let content = format!(
            "[build]\ncommand = \"mkdir -p public && printf 'home' > public/index.html\"\noutput = \"public\"\n\n[deploy]\nrepo = \"{}\"\n",
            remote.display()
        );
        let config = DeployConfig::from_str(&content).unwrap().with_root(&source);

        let outcome = Deployer::new(&config, &SystemGit, DeployOptions::default()).run().unwrap();
        let DeployOutcome::Pushed { source_sha, .. } = outcome else { panic!("expected a push, got {outcome:?}") };
        assert_eq!(source_sha, short);

        let git_dir = format!("--git-dir={}", remote.display());
        assert_eq!(git_output(dir.path(), &[&git_dir, "rev-list", "--count", "gh-pages"]), "1");
        let message = git_output(dir.path(), &[&git_dir, "log", "-1", "--format=%B", "gh-pages"]);
        assert!(message.contains(&format!("SHA: {short}")), "{message}");
        assert_eq!(git_output(dir.path(), &[&git_dir, "ls-tree", "--name-only", "gh-pages"]), "index.html");

        let outcome = Deployer::new(&config, &SystemGit, DeployOptions::default()).run().unwrap();
        assert_eq!(outcome, DeployOutcome::NothingToCommit { source_sha: short.to_owned() });
        assert_eq!(git_output(dir.path(), &[&git_dir, "rev-list", "--count", "gh-pages"]), "1");
    }
}
