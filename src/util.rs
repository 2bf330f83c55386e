#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Filesystem helpers for the staging and collection steps: bounded-depth
//! searches, merge-copies, forced removals, and JSON artifact normalization.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::glob;
use tracing::debug;

/// A glob utility function to find paths to files with a certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    Ok(glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect())
}

/// Finds the first file with the given name anywhere under `root`.
pub fn find_file_named(name: &str, root: &Path) -> Option<PathBuf> {
    find_named(name, root, true)
}

/// Finds the first directory with the given name anywhere under `root`.
pub fn find_dir_named(name: &str, root: &Path) -> Option<PathBuf> {
    find_named(name, root, false)
}

/// Recursive search for a path with an exact file name. `want_file` selects
/// between file and directory matches.
fn find_named(name: &str, root: &Path, want_file: bool) -> Option<PathBuf> {
    let pattern = root.join("**").join(name);
    let pattern = pattern.to_str()?;

    glob(pattern)
        .ok()?
        .filter_map(Result::ok)
        .find(|p| if want_file { p.is_file() } else { p.is_dir() })
}

/// Copies the tree rooted at `src` into `dst`, creating `dst` if needed.
///
/// Existing files at the destination that are not present in the source are
/// preserved; conflicting files are overwritten. This mirrors a merge rather
/// than a replace, so repeated staging into the same destination is stable.
pub fn copy_tree_merge(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("Could not create {}", dst.display()))?;

    for entry in fs::read_dir(src).with_context(|| format!("Could not read {}", src.display()))? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let path = entry.path();

        if path.is_dir() {
            copy_tree_merge(&path, &target)?;
        } else {
            fs::copy(&path, &target).with_context(|| {
                format!("Could not copy {} to {}", path.display(), target.display())
            })?;
        }
    }

    Ok(())
}

/// Removes a directory tree, clearing read-only attributes and retrying once
/// when the first attempt fails with a permission error. A missing tree is
/// not an error.
pub fn remove_tree_forced(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            debug!("clearing read-only attributes under {}", path.display());
            clear_readonly(path)?;
            fs::remove_dir_all(path)
                .with_context(|| format!("Could not remove {}", path.display()))
        }
        Err(err) => {
            Err(err).with_context(|| format!("Could not remove {}", path.display()))
        }
    }
}

/// Removes a single file, tolerating a missing path and retrying once after
/// clearing the read-only attribute on a permission error.
pub fn remove_file_forced(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            set_writable(path)?;
            fs::remove_file(path)
                .with_context(|| format!("Could not remove {}", path.display()))
        }
        Err(err) => {
            Err(err).with_context(|| format!("Could not remove {}", path.display()))
        }
    }
}

/// Recursively marks every entry under `path` writable. Cloned repositories
/// leave read-only object files behind on some platforms.
fn clear_readonly(path: &Path) -> Result<()> {
    set_writable(path)?;
    if path.is_dir() {
        for entry in
            fs::read_dir(path).with_context(|| format!("Could not read {}", path.display()))?
        {
            clear_readonly(&entry?.path())?;
        }
    }
    Ok(())
}

/// Clears the read-only permission bit on a single path.
fn set_writable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .with_context(|| format!("Could not stat {}", path.display()))?
        .permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
        .with_context(|| format!("Could not chmod {}", path.display()))
}

/// Rewrites a JSON file with stable four-space indentation so downstream
/// parsers and humans see the same formatting regardless of the emitting
/// plugin's settings. Fails if the file is missing or not valid JSON.
pub fn reindent_json_file(path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Could not parse {} as JSON", path.display()))?;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(&value, &mut serializer)?;

    fs::write(path, out).with_context(|| format!("Could not write {}", path.display()))
}

/// Returns true when `child` lies under `parent`, comparing canonicalized
/// forms when both resolve and falling back to the raw paths otherwise.
pub fn is_subpath(parent: &Path, child: &Path) -> bool {
    match (fs::canonicalize(parent), fs::canonicalize(child)) {
        (Ok(parent), Ok(child)) => child.starts_with(parent),
        _ => child.starts_with(parent),
    }
}

/// Removes every directory named one of `names` under `root`. Removal errors
/// are logged rather than raised; cache clearing must never abort a run.
pub fn remove_dirs_named(root: &Path, names: &[&str]) {
    for name in names {
        while let Some(dir) = find_dir_named(name, root) {
            if remove_tree_forced(&dir).is_err() {
                debug!("could not remove cache directory {}", dir.display());
                break;
            }
        }
    }
}

/// Removes every file with the given extension under `root`, logging instead
/// of raising on failure.
pub fn remove_files_with_extension(root: &Path, extension: &str) {
    let Ok(files) = find_files(extension, 10, root) else {
        return;
    };
    for file in files {
        if remove_file_forced(&file).is_err() {
            debug!("could not remove {}", file.display());
        }
    }
}
