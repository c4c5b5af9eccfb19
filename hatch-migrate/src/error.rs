use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("I/O error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid manifest {path:?}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    ManifestWrite(#[from] toml::ser::Error),

    #[error("Invalid schema snapshot {path:?}: {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Revision {0} is declared more than once")]
    DuplicateRevision(String),

    #[error("Revision {revision} names unknown parent {parent}")]
    UnknownParent { revision: String, parent: String },

    #[error("Revision graph contains a cycle through: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Revision graph has more than one root: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("Multiple heads present ({}); create a merge revision with `hatch db merge`", .0.join(", "))]
    MultipleHeads(Vec<String>),

    #[error("Unknown revision: {0}")]
    UnknownRevision(String),

    #[error("Revision prefix '{prefix}' is ambiguous: {}", .candidates.join(", "))]
    AmbiguousRevision {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("Cannot reach {to} from {from}")]
    Unreachable { from: String, to: String },

    #[error("Revision {revision} is a merge point; downgrade to an explicit revision instead")]
    AmbiguousStep { revision: String },

    #[error("Cannot roll back {steps} step(s); only {available} applied")]
    RollbackTooFar { steps: usize, available: usize },

    #[error("Database is at revision {0}, which is not in the manifest")]
    UnrecordedRevision(String),

    #[error("No changes detected between the models and the head revision")]
    EmptyDiff,

    #[error("Nothing to merge: {heads} head(s) present")]
    NothingToMerge { heads: usize },

    #[error("Heads disagree on {object}; reconcile the branches before merging")]
    MergeConflict { object: String },

    #[error("Another migration run holds the migration lock")]
    Locked,

    #[error("Revision {revision} failed: {reason}")]
    StepFailed { revision: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unreachable(from: Option<&str>, to: Option<&str>) -> Self {
        Self::Unreachable {
            from: from.unwrap_or(crate::BASE).to_string(),
            to: to.unwrap_or(crate::BASE).to_string(),
        }
    }

    pub fn step_failed(revision: impl Into<String>, reason: impl ToString) -> Self {
        Self::StepFailed {
            revision: revision.into(),
            reason: reason.to_string(),
        }
    }
}
