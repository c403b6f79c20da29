use crate::log;
use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("build output folder `{}` does not exist, did the build write somewhere else?", .0.display())]
    MissingOutput(PathBuf),

    #[error("failed to {action} `{}`", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> CopyError {
    let path = path.to_path_buf();
    move |source| CopyError::Io { action, path, source }
}

/// Make `workspace` hold exactly the contents of `output`.
///
/// Top-level entries named in `preserve` and the `.git` directory are left
/// alone; everything else in `workspace` is removed before copying.
pub fn replace_contents(output: &Path, workspace: &Path, preserve: &[PathBuf]) -> Result<u64, CopyError> {
    if !output.is_dir() {
        return Err(CopyError::MissingOutput(output.to_path_buf()));
    }

    clear_workspace(workspace, preserve)?;
    copy_dir_recursively(output, workspace)
}

fn clear_workspace(workspace: &Path, preserve: &[PathBuf]) -> Result<(), CopyError> {
    let entries = fs::read_dir(workspace).map_err(io_error("read", workspace))?;

    for entry in entries {
        let entry = entry.map_err(io_error("read", workspace))?;
        let name = entry.file_name();
        if name == OsStr::new(".git") || preserve.iter().any(|keep| keep.as_os_str() == name) {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type().map_err(io_error("inspect", &path))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(io_error("remove", &path))?;
        } else {
            fs::remove_file(&path).map_err(io_error("remove", &path))?;
        }
    }

    Ok(())
}

/// Copy every file below `src` into `dst`, returning how many entries were written.
///
/// Symlinks are recreated as links, never followed, so a link pointing back
/// up the tree cannot make the copy recurse forever.
pub fn copy_dir_recursively(src: &Path, dst: &Path) -> Result<u64, CopyError> {
    if !dst.exists() {
        fs::create_dir_all(dst).map_err(io_error("create", dst))?;
    }

    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(io_error("read", src))? {
        let entry = entry.map_err(io_error("read", src))?;
        let entry_path = entry.path();
        let dest_path = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(io_error("inspect", &entry_path))?;

        if file_type.is_dir() {
            if fs::symlink_metadata(&dest_path).is_ok_and(|meta| !meta.is_dir()) {
                fs::remove_file(&dest_path).map_err(io_error("remove", &dest_path))?;
            }
            copied += copy_dir_recursively(&entry_path, &dest_path)?;
            continue;
        }

        remove_existing(&dest_path)?;
        if file_type.is_symlink() {
            copy_symlink(&entry_path, &dest_path)?;
        } else {
            fs::copy(&entry_path, &dest_path).map_err(io_error("copy", &entry_path))?;
        }
        log!("copy"; "{}", dest_path.display());
        copied += 1;
    }

    Ok(copied)
}

fn remove_existing(path: &Path) -> Result<(), CopyError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(io_error("remove", path)),
        Ok(_) => fs::remove_file(path).map_err(io_error("remove", path)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error("inspect", path)(err)),
    }
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), CopyError> {
    let target = fs::read_link(src).map_err(io_error("read link", src))?;
    std::os::unix::fs::symlink(&target, dst).map_err(io_error("link", dst))
}

// links to files are copied as the file they point at, links to folders are refused
#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), CopyError> {
    if src.is_dir() {
        let source = io::Error::new(io::ErrorKind::Unsupported, "symlinked folders cannot be copied here");
        return Err(io_error("copy", src)(source));
    }
    fs::copy(src, dst).map(|_| ()).map_err(io_error("copy", src))
}
