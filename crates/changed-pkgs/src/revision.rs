use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use crate::error::ChangedPkgsError;
use crate::process::{self, CancellationToken};

/// Read access to two points in repository history.
pub trait RevisionSource: Send + Sync {
    /// Repository-relative paths that differ between `from` and `to`, without duplicates.
    fn changed_files(&self, from: &str, to: &str) -> Result<Vec<String>, ChangedPkgsError>;

    /// Raw content of `path` as recorded at `rev`.
    fn read_file_at(&self, rev: &str, path: &str) -> Result<Vec<u8>, ChangedPkgsError>;
}

impl<R> RevisionSource for Arc<R>
where
    R: RevisionSource + ?Sized,
{
    fn changed_files(&self, from: &str, to: &str) -> Result<Vec<String>, ChangedPkgsError> {
        (**self).changed_files(from, to)
    }

    fn read_file_at(&self, rev: &str, path: &str) -> Result<Vec<u8>, ChangedPkgsError> {
        (**self).read_file_at(rev, path)
    }
}

/// `RevisionSource` backed by the `git` executable.
pub struct GitRevisionSource {
    repo: PathBuf,
    token: CancellationToken,
}

impl GitRevisionSource {
    pub fn new(repo: impl Into<PathBuf>, token: CancellationToken) -> Self {
        Self {
            repo: repo.into(),
            token,
        }
    }

    fn git<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo).args(args);
        cmd
    }

    fn verify_revision(&self, rev: &str) -> Result<(), ChangedPkgsError> {
        if rev.is_empty() || rev.starts_with('-') {
            return Err(ChangedPkgsError::InvalidRevision(rev.to_string()));
        }
        let spec = format!("{rev}^{{commit}}");
        let output = process::run_command(
            self.git(["rev-parse", "--verify", "--quiet", spec.as_str()]),
            &self.token,
        )?;
        if !output.status.success() {
            return Err(ChangedPkgsError::InvalidRevision(rev.to_string()));
        }
        Ok(())
    }
}

impl RevisionSource for GitRevisionSource {
    fn changed_files(&self, from: &str, to: &str) -> Result<Vec<String>, ChangedPkgsError> {
        self.verify_revision(from)?;
        self.verify_revision(to)?;

        let out = process::run_checked(
            self.git(["diff", "--name-only", "-z", from, to]),
            &self.token,
        )?;
        Ok(split_nul_paths(&out))
    }

    fn read_file_at(&self, rev: &str, path: &str) -> Result<Vec<u8>, ChangedPkgsError> {
        self.verify_revision(rev)?;

        let object = format!("{rev}:{path}");
        let exists =
            process::run_command(self.git(["cat-file", "-e", object.as_str()]), &self.token)?;
        if !exists.status.success() {
            return Err(ChangedPkgsError::MissingAtRevision {
                path: path.to_string(),
                rev: rev.to_string(),
            });
        }

        process::run_checked(self.git(["show", object.as_str()]), &self.token)
    }
}

/// Splits `-z` output; git terminates every entry, including the last, with NUL.
fn split_nul_paths(out: &[u8]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for entry in out.split(|&b| b == 0).filter(|entry| !entry.is_empty()) {
        let path = match std::str::from_utf8(entry) {
            Ok(path) => path.to_string(),
            Err(_) => {
                let path = String::from_utf8_lossy(entry).into_owned();
                tracing::debug!(%path, "changed path is not valid UTF-8; it matches no package");
                path
            }
        };
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_nul_terminated_output() {
        assert_eq!(
            split_nul_paths(b"go.mod\0pkg/a/a.go\0"),
            vec!["go.mod".to_string(), "pkg/a/a.go".to_string()]
        );
    }

    #[test]
    fn non_utf8_paths_are_kept_in_lossy_form() {
        assert_eq!(
            split_nul_paths(b"caf\xe9.go\0pkg/a.go\0"),
            vec!["caf\u{fffd}.go".to_string(), "pkg/a.go".to_string()]
        );
    }

    #[test]
    fn empty_diff_has_no_paths() {
        assert!(split_nul_paths(b"").is_empty());
    }

    #[test]
    fn duplicate_entries_are_dropped() {
        assert_eq!(split_nul_paths(b"a.go\0a.go\0b.go\0"), vec!["a.go", "b.go"]);
    }

    #[test]
    fn option_like_revisions_are_rejected_without_running_git() {
        let source = GitRevisionSource::new("/nonexistent", CancellationToken::new());
        let err = source.changed_files("--output=/tmp/x", "HEAD").unwrap_err();
        assert!(matches!(err, ChangedPkgsError::InvalidRevision(rev) if rev == "--output=/tmp/x"));
    }
}
