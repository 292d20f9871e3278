use std::collections::BTreeSet;

use crate::graph::{Package, PackageGraph};

/// Expands `direct` to every package that imports, directly or transitively, a
/// changed package or a package backed by one of `changed_modules`.
///
/// When the graph is leaves-first every dependency is settled before its dependents
/// are visited, so a single pass reaches the closure. Otherwise passes repeat until
/// one marks nothing new.
pub fn propagate(
    graph: &PackageGraph,
    direct: &BTreeSet<String>,
    changed_modules: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut changed = direct.clone();

    if graph.is_leaves_first() {
        sweep(graph, &mut changed, changed_modules);
        return changed;
    }

    tracing::warn!(
        packages = graph.len(),
        "package graph is not in dependency order; iterating to a fixed point"
    );
    let mut passes = 1;
    while sweep(graph, &mut changed, changed_modules) > 0 {
        passes += 1;
    }
    tracing::debug!(passes, "propagation reached a fixed point");
    changed
}

/// One pass over the graph; returns how many packages were newly marked.
fn sweep(
    graph: &PackageGraph,
    changed: &mut BTreeSet<String>,
    changed_modules: &BTreeSet<String>,
) -> usize {
    let mut marked = 0;
    for pkg in graph.packages() {
        if changed.contains(&pkg.path) {
            continue;
        }
        if is_changed_from_imports(pkg, changed, changed_modules) {
            changed.insert(pkg.path.clone());
            marked += 1;
        }
    }
    marked
}

fn is_changed_from_imports(
    pkg: &Package,
    changed: &BTreeSet<String>,
    changed_modules: &BTreeSet<String>,
) -> bool {
    for (import_path, import) in &pkg.imports {
        if changed.contains(import_path) {
            tracing::debug!(
                package = %pkg.path,
                dependency = %import_path,
                "package detected changed because of dependent package"
            );
            return true;
        }
        if let Some(module) = &import.module {
            if changed_modules.contains(&module.path) {
                tracing::debug!(
                    package = %pkg.path,
                    module = %module.path,
                    "package detected changed because of dependent 3rd party module"
                );
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Module;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn chain() -> PackageGraph {
        let a = Package::new("m/a");
        let b = Package::new("m/b").importing_package(&a);
        let c = Package::new("m/c").importing_package(&b);
        let d = Package::new("m/d");
        PackageGraph::new(vec![a, b, c, d])
    }

    #[test]
    fn propagates_across_two_hops() {
        let result = propagate(&chain(), &set(&["m/a"]), &BTreeSet::new());
        assert_eq!(result, set(&["m/a", "m/b", "m/c"]));
    }

    #[test]
    fn changed_module_marks_importers() {
        let dep = Module::new("example.com/dep", Some("v1.0.0"));
        let x = Package::new("m/x").importing("example.com/dep/pkg", Some(dep));
        let y = Package::new("m/y").importing_package(&x);
        let graph = PackageGraph::new(vec![x, y]);

        let result = propagate(&graph, &BTreeSet::new(), &set(&["example.com/dep"]));
        assert_eq!(result, set(&["m/x", "m/y"]));
    }

    #[test]
    fn unrelated_modules_do_not_propagate() {
        let dep = Module::new("example.com/dep", Some("v1.0.0"));
        let x = Package::new("m/x").importing("example.com/dep/pkg", Some(dep));
        let graph = PackageGraph::new(vec![x]);

        let result = propagate(&graph, &BTreeSet::new(), &set(&["example.com/other"]));
        assert!(result.is_empty());
    }

    #[test]
    fn direct_changes_outside_graph_are_kept() {
        let result = propagate(&chain(), &set(&["m/elsewhere"]), &BTreeSet::new());
        assert_eq!(result, set(&["m/elsewhere"]));
    }

    #[test]
    fn is_idempotent() {
        let graph = chain();
        let first = propagate(&graph, &set(&["m/b"]), &BTreeSet::new());
        let second = propagate(&graph, &set(&["m/b"]), &BTreeSet::new());
        assert_eq!(first, second);
        assert_eq!(propagate(&graph, &first, &BTreeSet::new()), first);
    }

    #[test]
    fn adding_a_direct_change_never_shrinks_the_result() {
        let graph = chain();
        let base = propagate(&graph, &set(&["m/b"]), &BTreeSet::new());
        for extra in ["m/a", "m/c", "m/d", "m/unknown"] {
            let mut direct = set(&["m/b"]);
            direct.insert(extra.to_string());
            let grown = propagate(&graph, &direct, &BTreeSet::new());
            assert!(grown.is_superset(&base), "{extra}: {grown:?} vs {base:?}");
        }
    }

    #[test]
    fn misordered_graph_reaches_same_closure() {
        let ordered = chain();
        let mut reversed: Vec<Package> = ordered.packages().to_vec();
        reversed.reverse();
        let reversed = PackageGraph::new(reversed);
        assert!(!reversed.is_leaves_first());

        let expected = propagate(&ordered, &set(&["m/a"]), &BTreeSet::new());
        let actual = propagate(&reversed, &set(&["m/a"]), &BTreeSet::new());
        assert_eq!(actual, expected);
    }
}
