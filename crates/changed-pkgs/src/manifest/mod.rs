mod diff;
mod parse;

use serde::{Deserialize, Serialize};

pub use diff::diff_modules;
pub use parse::parse_manifest;

/// Base name of the dependency manifest tracked between revisions.
pub const MANIFEST_FILE_NAME: &str = "go.mod";

/// A module path paired with an optional version. Filesystem replacement targets
/// carry no version.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleVersion {
    pub path: String,
    pub version: Option<String>,
}

/// Direct requirement listed by a manifest.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirement {
    pub module: String,
    pub version: String,
    #[serde(default)]
    pub indirect: bool,
}

/// `replace` directive substituting `source` with `target`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Replacement {
    pub source: String,
    pub source_version: Option<String>,
    pub target: ModuleVersion,
}

/// Parsed manifest as it existed at one revision.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestSnapshot {
    pub module: Option<String>,
    pub requirements: Vec<Requirement>,
    pub replacements: Vec<Replacement>,
}

impl ManifestSnapshot {
    /// The replacement that wins for `source`: the last one listed, whatever its
    /// source version.
    pub fn replacement(&self, source: &str) -> Option<&Replacement> {
        self.replacements.iter().rfind(|rep| rep.source == source)
    }
}
