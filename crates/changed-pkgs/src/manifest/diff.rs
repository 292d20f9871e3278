use std::collections::{BTreeSet, HashMap};

use super::{ManifestSnapshot, ModuleVersion};

/// Returns the module paths whose effective version differs between `old` and `new`.
///
/// A module counts as changed when:
///
/// * it is required by both snapshots at different versions, or
/// * it is the source of a `replace` that was added, retargeted, or removed.
///
/// Requirements present on only one side are not reported: nothing can depend on a
/// dropped requirement, and packages that start importing a new module are already
/// changed through their own file edits.
pub fn diff_modules(old: &ManifestSnapshot, new: &ManifestSnapshot) -> BTreeSet<String> {
    let mut changed = changed_from_replacements(old, new);

    let old_versions: HashMap<&str, &str> = old
        .requirements
        .iter()
        .map(|req| (req.module.as_str(), req.version.as_str()))
        .collect();
    for req in &new.requirements {
        if let Some(old_version) = old_versions.get(req.module.as_str()) {
            if *old_version != req.version {
                changed.insert(req.module.clone());
            }
        }
    }

    changed
}

fn changed_from_replacements(old: &ManifestSnapshot, new: &ManifestSnapshot) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();
    let mut remaining = effective_replacements(old);

    for (source, target) in effective_replacements(new) {
        match remaining.remove(source) {
            Some(old_target) if old_target == target => {}
            _ => {
                changed.insert(source.to_string());
            }
        }
    }

    // whatever is left was replaced before and no longer is
    changed.extend(remaining.into_keys().map(str::to_string));
    changed
}

/// One target per source path; a later `replace` of the same path wins.
fn effective_replacements(snapshot: &ManifestSnapshot) -> HashMap<&str, &ModuleVersion> {
    snapshot
        .replacements
        .iter()
        .map(|rep| (rep.source.as_str(), &rep.target))
        .collect()
}
