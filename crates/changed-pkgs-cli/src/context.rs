use changed_pkgs::{CancellationToken, ChangeEnv, RepoPaths};

use crate::error::CliError;

/// Resolved directories plus the collaborators that read from them.
pub struct CliSession {
    pub paths: RepoPaths,
    pub env: ChangeEnv,
}

impl CliSession {
    pub fn bootstrap(
        repo_dir: &str,
        mod_dir: &str,
        token: CancellationToken,
    ) -> Result<Self, CliError> {
        let paths = RepoPaths::resolve(repo_dir, mod_dir)?;
        let env = ChangeEnv::git_and_go(&paths, token);

        Ok(Self { paths, env })
    }
}
