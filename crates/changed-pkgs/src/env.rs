use std::sync::Arc;

use crate::loader::{GoListLoader, GraphLoader};
use crate::process::CancellationToken;
use crate::revision::{GitRevisionSource, RevisionSource};
use crate::workspace::RepoPaths;

/// Collaborators the impact pipeline reads from.
pub struct ChangeEnv {
    pub revisions: Arc<dyn RevisionSource>,
    pub loader: Arc<dyn GraphLoader>,
}

impl ChangeEnv {
    pub fn new(revisions: Arc<dyn RevisionSource>, loader: Arc<dyn GraphLoader>) -> Self {
        Self { revisions, loader }
    }

    /// `git` for history and `go list` for packages, both aborted when `token` is
    /// cancelled.
    pub fn git_and_go(paths: &RepoPaths, token: CancellationToken) -> Self {
        Self {
            revisions: Arc::new(GitRevisionSource::new(paths.repo_root(), token.clone())),
            loader: Arc::new(GoListLoader::new(token)),
        }
    }
}
