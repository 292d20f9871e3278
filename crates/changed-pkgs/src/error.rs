use std::fmt;

use thiserror::Error;

/// Error type shared across the change-impact pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum ChangedPkgsError {
    #[error("invalid revision: {0}")]
    InvalidRevision(String),
    #[error("{path} does not exist at {rev}")]
    MissingAtRevision { path: String, rev: String },
    #[error("running command `{command}`: {message}")]
    Command { command: String, message: String },
    #[error("{file}:{line}: {message}")]
    Manifest {
        file: String,
        line: usize,
        message: String,
    },
    #[error("failed querying package {package}: {message}")]
    PackageLoad { package: String, message: String },
    #[error("graph error: {0}")]
    Graph(String),
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("interrupted")]
    Cancelled,
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ChangedPkgsError>,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChangedPkgsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ChangedPkgsError {
    /// Wraps the error with a description of the step that failed. Cancellation is
    /// left untouched so callers can still recognise it.
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            ChangedPkgsError::Cancelled => ChangedPkgsError::Cancelled,
            other => ChangedPkgsError::Context {
                context: ctx.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Innermost error beneath any context layers.
    pub fn root(&self) -> &ChangedPkgsError {
        match self {
            ChangedPkgsError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), ChangedPkgsError::Cancelled)
    }
}
