use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::detect::detect_direct;
use crate::env::ChangeEnv;
use crate::error::ChangedPkgsError;
use crate::manifest::{ManifestSnapshot, diff_modules, parse_manifest};
use crate::owner::FileOwnerIndex;
use crate::propagate::propagate;
use crate::revision::RevisionSource;
use crate::workspace::RepoPaths;

/// The two revisions to compare and where to find the repository and module.
#[derive(Clone, Debug)]
pub struct ImpactRequest {
    pub paths: RepoPaths,
    pub from_ref: String,
    pub to_ref: String,
}

/// Packages impacted between two revisions, plus the third-party modules whose
/// effective version changed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSet {
    pub packages: BTreeSet<String>,
    pub modules: BTreeSet<String>,
}

/// Computes the packages changed between `request.from_ref` and `request.to_ref`.
///
/// A package is changed when it owns an edited file, imports a package from a
/// third-party module whose required version or `replace` target changed in the
/// module's `go.mod`, or imports a local package for which either holds.
pub fn changed_packages(
    env: &ChangeEnv,
    request: &ImpactRequest,
) -> Result<ChangeSet, ChangedPkgsError> {
    let paths = &request.paths;

    let changed_files = env
        .revisions
        .changed_files(&request.from_ref, &request.to_ref)
        .map_err(|err| err.context("listing changed files"))?;
    tracing::info!(files = ?changed_files, "changed files");

    let graph = env
        .loader
        .load(paths.module_root())
        .map_err(|err| err.context("loading local packages"))?;

    let index = FileOwnerIndex::build(&graph);
    let direct = detect_direct(changed_files.as_slice(), paths.repo_root(), &index);

    let mut modules = BTreeSet::new();
    for manifest in &direct.manifests {
        if !paths.governs_module(manifest) {
            tracing::info!(
                manifest = %manifest,
                "skipping manifest of a module outside the loaded package graph"
            );
            continue;
        }
        modules.extend(diff_manifest(
            env.revisions.as_ref(),
            manifest,
            &request.from_ref,
            &request.to_ref,
        )?);
    }
    if !direct.manifests.is_empty() {
        tracing::info!(modules = ?modules, "changed 3rd party modules");
    }

    let packages = propagate(&graph, &direct.packages, &modules);
    Ok(ChangeSet { packages, modules })
}

/// Reads `manifest` at both revisions and returns the modules whose effective
/// version changed.
pub fn diff_manifest(
    revisions: &dyn RevisionSource,
    manifest: &str,
    from_ref: &str,
    to_ref: &str,
) -> Result<BTreeSet<String>, ChangedPkgsError> {
    let old = read_manifest(revisions, manifest, from_ref)?;
    let new = read_manifest(revisions, manifest, to_ref)?;
    Ok(diff_modules(&old, &new))
}

fn read_manifest(
    revisions: &dyn RevisionSource,
    manifest: &str,
    rev: &str,
) -> Result<ManifestSnapshot, ChangedPkgsError> {
    let data = revisions
        .read_file_at(rev, manifest)
        .map_err(|err| err.context(format!("reading {manifest} at {rev}")))?;
    parse_manifest(manifest, &data)
        .map_err(|err| err.context(format!("parsing mod file {manifest} at {rev}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::graph::{Module, Package, PackageGraph};
    use crate::loader::GraphLoader;

    struct StubRevisions {
        changed: Vec<String>,
        files: HashMap<(String, String), String>,
    }

    impl RevisionSource for StubRevisions {
        fn changed_files(&self, _from: &str, _to: &str) -> Result<Vec<String>, ChangedPkgsError> {
            Ok(self.changed.clone())
        }

        fn read_file_at(&self, rev: &str, path: &str) -> Result<Vec<u8>, ChangedPkgsError> {
            self.files
                .get(&(rev.to_string(), path.to_string()))
                .map(|text| text.as_bytes().to_vec())
                .ok_or_else(|| ChangedPkgsError::MissingAtRevision {
                    path: path.to_string(),
                    rev: rev.to_string(),
                })
        }
    }

    struct StubLoader(PackageGraph);

    impl GraphLoader for StubLoader {
        fn load(&self, _module_root: &Path) -> Result<PackageGraph, ChangedPkgsError> {
            Ok(self.0.clone())
        }
    }

    fn request() -> ImpactRequest {
        ImpactRequest {
            paths: RepoPaths::new(PathBuf::from("/repo"), PathBuf::from("/repo")),
            from_ref: "old".into(),
            to_ref: "new".into(),
        }
    }

    fn env(changed: &[&str], files: &[(&str, &str, &str)], graph: PackageGraph) -> ChangeEnv {
        let revisions = StubRevisions {
            changed: changed.iter().map(|s| s.to_string()).collect(),
            files: files
                .iter()
                .map(|(rev, path, text)| ((rev.to_string(), path.to_string()), text.to_string()))
                .collect(),
        };
        ChangeEnv::new(Arc::new(revisions), Arc::new(StubLoader(graph)))
    }

    fn graph() -> PackageGraph {
        let dep = Module::new("example.com/dep", Some("v1.0.0"));
        let a = Package::new("m/a").with_file("/repo/a/a.go");
        let b = Package::new("m/b")
            .with_file("/repo/b/b.go")
            .importing("example.com/dep/x", Some(dep));
        let c = Package::new("m/c").importing_package(&b);
        PackageGraph::new(vec![a, b, c])
    }

    #[test]
    fn file_edits_without_manifest_changes() {
        let env = env(&["b/b.go"], &[], graph());
        let result = changed_packages(&env, &request()).unwrap();

        assert_eq!(
            result.packages,
            BTreeSet::from(["m/b".to_string(), "m/c".to_string()])
        );
        assert!(result.modules.is_empty());
    }

    #[test]
    fn nested_manifests_of_other_modules_are_not_read() {
        // reading tools/go.mod would fail: the stub has no content for it
        let env = env(&["tools/go.mod"], &[], graph());
        let result = changed_packages(&env, &request()).unwrap();
        assert!(result.packages.is_empty());
    }

    #[test]
    fn missing_manifest_at_old_revision_fails_with_context() {
        let env = env(
            &["go.mod"],
            &[("new", "go.mod", "module m\n")],
            graph(),
        );
        let err = changed_packages(&env, &request()).unwrap_err();

        assert!(matches!(
            err.root(),
            ChangedPkgsError::MissingAtRevision { rev, .. } if rev == "old"
        ));
        assert!(err.to_string().starts_with("reading go.mod at old"));
    }

    #[test]
    fn malformed_manifest_fails_the_run() {
        let env = env(
            &["go.mod", "a/a.go"],
            &[
                ("old", "go.mod", "module m\n"),
                ("new", "go.mod", "module m\nrequire (\n"),
            ],
            graph(),
        );
        let err = changed_packages(&env, &request()).unwrap_err();
        assert!(matches!(err.root(), ChangedPkgsError::Manifest { .. }));
        assert!(err.to_string().contains("parsing mod file go.mod at new"));
    }
}
