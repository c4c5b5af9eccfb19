//! hatch-migrate: schema migrations organised as a revision graph.
//!
//! Revisions live in `<dir>/manifest.toml`; each one owns an upgrade script,
//! a downgrade script and a JSON snapshot of the full schema after it is
//! applied. New revisions are generated by diffing the live model definitions
//! ([`Schema`]) against the head snapshot.
//!
//! The database records exactly one applied revision (or none, "base") in the
//! `schema_revisions` table. [`Migrator`] plans paths through the graph and
//! hands them to a [`MigrationBackend`] that applies each plan atomically.

pub mod backend;
pub mod diff;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod migrator;
pub mod plan;
pub mod postgres;
pub mod schema;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use backend::MigrationBackend;
pub use diff::{diff, SchemaChange};
pub use error::{MigrationError, Result};
pub use graph::RevisionGraph;
pub use manifest::{Manifest, RevisionEntry};
pub use migrator::{HistoryEntry, MigrationOutcome, MigrationSet, Migrator};
pub use plan::{Direction, MigrationPlan, PlannedStep};
pub use postgres::PgMigrationBackend;
pub use schema::{ColumnDef, ColumnType, IndexDef, Schema, TableDef};

#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryMigrationBackend, MemoryState};

/// Symbolic target for "no revision applied".
pub const BASE: &str = "base";

/// Symbolic target for the single newest revision.
pub const HEAD: &str = "head";

/// Table holding the applied revision id.
pub const REVISION_TABLE: &str = "schema_revisions";
