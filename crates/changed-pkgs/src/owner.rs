use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use crate::graph::{Package, PackageGraph};

/// Maps owned file paths back to the package that owns them.
///
/// A file claimed by more than one package belongs to whichever appears first in
/// graph order.
pub struct FileOwnerIndex<'g> {
    graph: &'g PackageGraph,
    owners: HashMap<PathBuf, usize>,
}

impl<'g> FileOwnerIndex<'g> {
    pub fn build(graph: &'g PackageGraph) -> Self {
        let mut owners = HashMap::new();
        for (idx, pkg) in graph.packages().iter().enumerate() {
            for file in &pkg.files {
                match owners.entry(file.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(idx);
                    }
                    Entry::Occupied(existing) => {
                        tracing::debug!(
                            file = %file.display(),
                            owner = %graph.packages()[*existing.get()].path,
                            claimant = %pkg.path,
                            "file claimed by more than one package"
                        );
                    }
                }
            }
        }
        Self { graph, owners }
    }

    pub fn owner_of(&self, path: &Path) -> Option<&'g Package> {
        self.owners
            .get(path)
            .map(|&idx| &self.graph.packages()[idx])
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
