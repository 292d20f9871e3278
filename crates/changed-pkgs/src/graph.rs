use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Third-party module backing one or more packages.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Module {
    pub path: String,
    pub version: Option<String>,
}

impl Module {
    pub fn new(path: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            path: path.into(),
            version: version.map(str::to_string),
        }
    }
}

/// Direct import edge from a package to the package at `path`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub module: Option<Module>,
}

/// A local package together with the files it owns and what it imports.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    pub path: String,
    pub dir: Option<PathBuf>,
    pub files: BTreeSet<PathBuf>,
    pub imports: BTreeMap<String, Import>,
    pub module: Option<Module>,
}

impl Package {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.files.insert(file.into());
        self
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    /// Adds an import of the package at `path`, backed by `module` when it is third-party.
    pub fn importing(mut self, path: impl Into<String>, module: Option<Module>) -> Self {
        let path = path.into();
        self.imports.insert(path.clone(), Import { path, module });
        self
    }

    /// Adds an import of another local package, inheriting its backing module.
    pub fn importing_package(self, other: &Package) -> Self {
        let module = other.module.clone();
        self.importing(other.path.clone(), module)
    }
}

/// Local packages of one module, expected leaves-first: each package after every
/// local package it imports.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageGraph {
    packages: Vec<Package>,
}

impl PackageGraph {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Package> {
        self.packages.iter().find(|pkg| pkg.path == path)
    }

    /// Checks that every import of a package in this graph refers to a package that
    /// appears earlier. Imports of packages outside the graph are not constrained.
    pub fn is_leaves_first(&self) -> bool {
        let local: HashSet<&str> = self.packages.iter().map(|pkg| pkg.path.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.packages.len());

        for pkg in &self.packages {
            for import in pkg.imports.keys() {
                if local.contains(import.as_str()) && !seen.contains(import.as_str()) {
                    return false;
                }
            }
            seen.insert(pkg.path.as_str());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_first_accepts_dependency_order() {
        let a = Package::new("m/a");
        let b = Package::new("m/b").importing_package(&a);
        let c = Package::new("m/c")
            .importing_package(&b)
            .importing("fmt", None);
        let graph = PackageGraph::new(vec![a, b, c]);

        assert!(graph.is_leaves_first());
    }

    #[test]
    fn leaves_first_rejects_dependent_before_dependency() {
        let a = Package::new("m/a");
        let b = Package::new("m/b").importing_package(&a);
        let graph = PackageGraph::new(vec![b, a]);

        assert!(!graph.is_leaves_first());
    }

    #[test]
    fn leaves_first_rejects_import_cycles() {
        let a = Package::new("m/a").importing("m/a", None);
        let graph = PackageGraph::new(vec![a]);

        assert!(!graph.is_leaves_first());
    }

    #[test]
    fn importing_package_inherits_module() {
        let module = Module::new("example.com/dep", Some("v1.0.0"));
        let dep = Package::new("example.com/dep/x").with_module(module.clone());
        let user = Package::new("m/user").importing_package(&dep);

        assert_eq!(
            user.imports["example.com/dep/x"].module.as_ref(),
            Some(&module)
        );
        assert!(PackageGraph::new(vec![user]).get("m/user").is_some());
    }
}
