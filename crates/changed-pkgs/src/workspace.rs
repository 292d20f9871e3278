use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::ChangedPkgsError;
use crate::manifest::MANIFEST_FILE_NAME;

/// Canonical locations for one invocation: the git repository and the Go module
/// whose packages are loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoPaths {
    repo_root: PathBuf,
    module_root: PathBuf,
}

impl RepoPaths {
    /// Resolves both directories to absolute, symlink-free paths.
    pub fn resolve(
        repo_root: impl AsRef<Path>,
        module_root: impl AsRef<Path>,
    ) -> Result<Self, ChangedPkgsError> {
        Ok(Self {
            repo_root: canonical_dir(repo_root.as_ref(), "repository")?,
            module_root: canonical_dir(module_root.as_ref(), "module")?,
        })
    }

    /// Builds paths without touching the filesystem. Callers are expected to pass
    /// absolute, already-normalized directories.
    pub fn new(repo_root: PathBuf, module_root: PathBuf) -> Self {
        Self {
            repo_root,
            module_root,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    /// Module root relative to the repository root, or `None` when the module lives
    /// outside the repository.
    pub fn module_dir_in_repo(&self) -> Option<PathBuf> {
        self.module_root
            .strip_prefix(&self.repo_root)
            .ok()
            .map(Path::to_path_buf)
    }

    /// Repository-relative path of the manifest governing the loaded module.
    pub fn module_manifest(&self) -> Option<PathBuf> {
        self.module_dir_in_repo()
            .map(|dir| dir.join(MANIFEST_FILE_NAME))
    }

    /// True when the repository-relative `manifest` is the one governing the loaded
    /// module.
    pub fn governs_module(&self, manifest: &str) -> bool {
        match self.module_manifest() {
            Some(expected) => normalize(Path::new(manifest)) == normalize(&expected),
            None => false,
        }
    }
}

fn canonical_dir(path: &Path, what: &str) -> Result<PathBuf, ChangedPkgsError> {
    let canonical = fs::canonicalize(path).map_err(|err| {
        ChangedPkgsError::Workspace(format!(
            "unable to resolve {what} directory {}: {err}",
            path.display()
        ))
    })?;
    if !canonical.is_dir() {
        return Err(ChangedPkgsError::Workspace(format!(
            "{what} path {} is not a directory",
            canonical.display()
        )));
    }
    Ok(canonical)
}

/// Lexically drops `.` segments so `./go.mod` and `go.mod` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
