use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ChangedPkgsError;
use crate::graph::{Import, Module, Package, PackageGraph};
use crate::process::{self, CancellationToken};

/// Produces the local package graph of the module rooted at a directory.
pub trait GraphLoader: Send + Sync {
    /// Returns every local package, leaves-first. Fails if any package could not be
    /// loaded; a partial graph is never returned.
    fn load(&self, module_root: &Path) -> Result<PackageGraph, ChangedPkgsError>;
}

impl<G> GraphLoader for Arc<G>
where
    G: GraphLoader + ?Sized,
{
    fn load(&self, module_root: &Path) -> Result<PackageGraph, ChangedPkgsError> {
        (**self).load(module_root)
    }
}

/// Loads packages with `go list -deps`, which lists a package only after all of its
/// dependencies.
pub struct GoListLoader {
    go: PathBuf,
    token: CancellationToken,
}

impl GoListLoader {
    pub fn new(token: CancellationToken) -> Self {
        Self::with_go_binary("go", token)
    }

    pub fn with_go_binary(go: impl Into<PathBuf>, token: CancellationToken) -> Self {
        Self {
            go: go.into(),
            token,
        }
    }
}

impl GraphLoader for GoListLoader {
    fn load(&self, module_root: &Path) -> Result<PackageGraph, ChangedPkgsError> {
        let mut cmd = Command::new(&self.go);
        cmd.args(["list", "-e", "-deps", "-json", "./..."])
            .current_dir(module_root)
            // go reports directories relative to $PWD when it names the working directory
            .env("PWD", module_root);

        let command = process::describe(&cmd);
        let output = process::run_command(cmd, &self.token)?;
        if !output.status.success() {
            return Err(ChangedPkgsError::Graph(format!(
                "failed listing local packages with `{command}`: {}",
                output.stderr_lossy()
            )));
        }

        let graph = parse_go_list(&output.stdout)?;
        tracing::debug!(
            packages = graph.len(),
            root = %module_root.display(),
            "loaded local packages"
        );
        Ok(graph)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedPackage {
    import_path: String,
    dir: Option<PathBuf>,
    #[serde(default)]
    go_files: Vec<String>,
    #[serde(default)]
    cgo_files: Vec<String>,
    #[serde(default)]
    other_files: Vec<String>,
    #[serde(default)]
    embed_files: Vec<String>,
    #[serde(default)]
    imports: Vec<String>,
    module: Option<ListedModule>,
    #[serde(default)]
    dep_only: bool,
    error: Option<ListedError>,
    #[serde(default)]
    deps_errors: Vec<ListedError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedModule {
    path: String,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedError {
    #[serde(default)]
    pos: String,
    err: String,
}

impl ListedError {
    fn describe(&self) -> String {
        if self.pos.is_empty() {
            self.err.clone()
        } else {
            format!("{}: {}", self.pos, self.err)
        }
    }
}

impl From<ListedModule> for Module {
    fn from(module: ListedModule) -> Self {
        Module {
            path: module.path,
            version: module.version,
        }
    }
}

/// Decodes the concatenated JSON objects written by `go list -deps -json`.
///
/// Packages listed only as dependencies resolve the modules behind imports; the rest
/// form the graph, in the order go emitted them.
pub fn parse_go_list(data: &[u8]) -> Result<PackageGraph, ChangedPkgsError> {
    let mut listed = Vec::new();
    for entry in serde_json::Deserializer::from_slice(data).into_iter::<ListedPackage>() {
        listed.push(entry.map_err(|err| {
            ChangedPkgsError::from(err).context("decoding `go list` output")
        })?);
    }

    for pkg in listed.iter().filter(|pkg| !pkg.dep_only) {
        let mut errors: Vec<String> = pkg.error.iter().map(ListedError::describe).collect();
        errors.extend(pkg.deps_errors.iter().map(ListedError::describe));
        if !errors.is_empty() {
            return Err(ChangedPkgsError::PackageLoad {
                package: pkg.import_path.clone(),
                message: errors.join("; "),
            });
        }
    }

    let modules: HashMap<String, Option<Module>> = listed
        .iter()
        .map(|pkg| {
            let module = pkg.module.as_ref().map(|m| Module {
                path: m.path.clone(),
                version: m.version.clone(),
            });
            (pkg.import_path.clone(), module)
        })
        .collect();

    let packages = listed
        .into_iter()
        .filter(|pkg| !pkg.dep_only)
        .map(|pkg| into_package(pkg, &modules))
        .collect();
    Ok(PackageGraph::new(packages))
}

fn into_package(pkg: ListedPackage, modules: &HashMap<String, Option<Module>>) -> Package {
    let files: BTreeSet<PathBuf> = match &pkg.dir {
        Some(dir) => pkg
            .go_files
            .iter()
            .chain(&pkg.cgo_files)
            .chain(&pkg.other_files)
            .chain(&pkg.embed_files)
            .map(|file| dir.join(file))
            .collect(),
        None => BTreeSet::new(),
    };

    let imports: BTreeMap<String, Import> = pkg
        .imports
        .into_iter()
        .map(|path| {
            let module = modules.get(&path).cloned().flatten();
            (path.clone(), Import { path, module })
        })
        .collect();

    Package {
        path: pkg.import_path,
        dir: pkg.dir,
        files,
        imports,
        module: pkg.module.map(Module::from),
    }
}
