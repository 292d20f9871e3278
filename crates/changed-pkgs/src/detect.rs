use std::collections::BTreeSet;
use std::path::Path;

use crate::manifest::MANIFEST_FILE_NAME;
use crate::owner::FileOwnerIndex;

/// Packages edited directly, and the manifests found among the changed files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectChanges {
    pub packages: BTreeSet<String>,
    /// Repository-relative manifest paths, in first-seen order.
    pub manifests: Vec<String>,
}

/// Resolves repository-relative `changed` paths to their owning packages.
///
/// Files without an owner are skipped. A changed manifest is reported regardless of
/// whether any package owns it.
pub fn detect_direct<S: AsRef<str>>(
    changed: &[S],
    repo_root: &Path,
    index: &FileOwnerIndex<'_>,
) -> DirectChanges {
    let mut direct = DirectChanges::default();

    for path in changed {
        let path = path.as_ref();
        if is_manifest(path) && !direct.manifests.iter().any(|seen| seen == path) {
            direct.manifests.push(path.to_string());
        }

        if let Some(pkg) = index.owner_of(&repo_root.join(path)) {
            tracing::debug!(
                package = %pkg.path,
                file = %path,
                "package detected changed because of file"
            );
            direct.packages.insert(pkg.path.clone());
        }
    }

    direct
}

fn is_manifest(path: &str) -> bool {
    Path::new(path)
        .file_name()
        .is_some_and(|name| name == MANIFEST_FILE_NAME)
}
