pub mod detect;
pub mod env;
pub mod error;
pub mod graph;
pub mod impact;
pub mod loader;
pub mod manifest;
pub mod owner;
pub mod process;
pub mod propagate;
pub mod revision;
pub mod workspace;

pub use detect::{DirectChanges, detect_direct};
pub use env::ChangeEnv;
pub use error::ChangedPkgsError;
pub use graph::{Import, Module, Package, PackageGraph};
pub use impact::{ChangeSet, ImpactRequest, changed_packages, diff_manifest};
pub use loader::{GoListLoader, GraphLoader, parse_go_list};
pub use manifest::{
    MANIFEST_FILE_NAME, ManifestSnapshot, ModuleVersion, Replacement, Requirement, diff_modules,
    parse_manifest,
};
pub use owner::FileOwnerIndex;
pub use process::CancellationToken;
pub use propagate::propagate;
pub use revision::{GitRevisionSource, RevisionSource};
pub use workspace::RepoPaths;
