//! Loaded migration directory and the operations run against a backend.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::backend::MigrationBackend;
use crate::diff::{diff, invert, render};
use crate::error::{MigrationError, Result};
use crate::graph::RevisionGraph;
use crate::manifest::{revision_id, slugify, Manifest, RevisionEntry};
use crate::plan::{downgrade_path, rollback_target, upgrade_path, Direction, MigrationPlan, PlannedStep};
use crate::schema::Schema;
use crate::{BASE, HEAD};

/// A migrations directory: manifest, scripts and snapshots.
#[derive(Debug, Clone)]
pub struct MigrationSet {
    dir: PathBuf,
    manifest: Manifest,
    graph: RevisionGraph,
}

impl MigrationSet {
    /// Load and validate `<dir>/manifest.toml`. A missing directory or
    /// manifest is an empty set.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let manifest = Manifest::load(&dir)?;
        let graph = RevisionGraph::new(manifest.revisions.clone())?;
        Ok(Self {
            dir,
            manifest,
            graph,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn graph(&self) -> &RevisionGraph {
        &self.graph
    }

    /// Schema after `revision`; the empty schema at base.
    pub fn snapshot(&self, revision: Option<&str>) -> Result<Schema> {
        let Some(id) = revision else {
            return Ok(Schema::default());
        };
        let entry = self
            .graph
            .get(id)
            .ok_or_else(|| MigrationError::UnknownRevision(id.to_string()))?;
        Schema::read(&self.dir.join(&entry.snapshot))
    }

    fn script(&self, entry: &RevisionEntry, direction: Direction) -> Result<String> {
        let file = match direction {
            Direction::Upgrade => &entry.upgrade,
            Direction::Downgrade => &entry.downgrade,
        };
        let path = self.dir.join(file);
        fs::read_to_string(&path).map_err(|e| MigrationError::io(path, e))
    }

    /// Steps that move the database from `current` to `target`.
    pub fn plan(
        &self,
        direction: Direction,
        current: Option<&str>,
        target: Option<&str>,
    ) -> Result<MigrationPlan> {
        let path = match direction {
            Direction::Upgrade => upgrade_path(&self.graph, current, target)?,
            Direction::Downgrade => downgrade_path(&self.graph, current, target)?,
        };

        let steps = path
            .into_iter()
            .map(|entry| {
                Ok(PlannedStep {
                    revision: entry.id.clone(),
                    message: entry.message.clone(),
                    sql: self.script(entry, direction)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MigrationPlan {
            direction,
            from: current.map(str::to_string),
            to: target.map(str::to_string),
            steps,
        })
    }

    /// Author a revision that brings the head snapshot in line with `models`.
    ///
    /// Fails with [`MigrationError::EmptyDiff`] when nothing changed; no file
    /// is written in that case.
    pub fn generate(&mut self, message: &str, models: &Schema) -> Result<RevisionEntry> {
        let head = self.graph.head()?.map(str::to_string);
        let current = self.snapshot(head.as_deref())?;

        let changes = diff(&current, models);
        if changes.is_empty() {
            return Err(MigrationError::EmptyDiff);
        }

        let upgrade = render(message, &changes);
        let downgrade = render(&format!("Revert: {message}"), &invert(&changes));
        let entry = self.add_revision(head.into_iter().collect(), message, &upgrade, &downgrade, models)?;

        tracing::info!(
            revision = %entry.id,
            changes = changes.len(),
            "Generated revision {}",
            entry.message
        );
        Ok(entry)
    }

    /// Author a revision joining every current head.
    pub fn merge(&mut self, message: &str) -> Result<RevisionEntry> {
        let heads = self.graph.heads();
        if heads.len() < 2 {
            return Err(MigrationError::NothingToMerge { heads: heads.len() });
        }
        let parents: Vec<String> = heads.iter().map(|e| e.id.clone()).collect();

        let base = self.common_ancestor(&parents);
        let base = self.snapshot(base.as_deref())?;
        let mut snapshot = self.snapshot(Some(&parents[0]))?;
        for parent in &parents[1..] {
            snapshot = Schema::merge(&base, &snapshot, &self.snapshot(Some(parent))?)?;
        }

        let header = format!("{message}\nMerges {}", parents.join(", "));
        let upgrade = render(&header, &[]);
        let downgrade = render(&format!("Revert: {header}"), &[]);
        let entry = self.add_revision(parents, message, &upgrade, &downgrade, &snapshot)?;

        tracing::info!(revision = %entry.id, parents = ?entry.parents, "Merged heads");
        Ok(entry)
    }

    /// Newest revision every one of `ids` descends from.
    fn common_ancestor(&self, ids: &[String]) -> Option<String> {
        let lineages: Vec<HashSet<&str>> = ids
            .iter()
            .map(|id| self.graph.ancestors(Some(id.as_str())))
            .collect();
        self.graph
            .topological()
            .rev()
            .find(|entry| lineages.iter().all(|l| l.contains(entry.id.as_str())))
            .map(|entry| entry.id.clone())
    }

    fn add_revision(
        &mut self,
        parents: Vec<String>,
        message: &str,
        upgrade: &str,
        downgrade: &str,
        snapshot: &Schema,
    ) -> Result<RevisionEntry> {
        let id = revision_id(&parents, message, upgrade);
        let stem = format!("{id}_{}", slugify(message));
        let entry = RevisionEntry {
            id,
            parents,
            message: message.to_string(),
            created_at: Utc::now(),
            upgrade: format!("{stem}.up.sql"),
            downgrade: format!("{stem}.down.sql"),
            snapshot: format!("{stem}.schema.json"),
        };

        let mut manifest = self.manifest.clone();
        manifest.revisions.push(entry.clone());
        let graph = RevisionGraph::new(manifest.revisions.clone())?;

        fs::create_dir_all(&self.dir).map_err(|e| MigrationError::io(&self.dir, e))?;
        let write = |file: &str, content: &str| {
            let path = self.dir.join(file);
            fs::write(&path, content).map_err(|e| MigrationError::io(path, e))
        };
        write(&entry.upgrade, upgrade)?;
        write(&entry.downgrade, downgrade)?;
        snapshot.write(&self.dir.join(&entry.snapshot))?;
        manifest.save(&self.dir)?;

        self.manifest = manifest;
        self.graph = graph;
        Ok(entry)
    }

    /// Every revision, newest first.
    pub fn history(&self, current: Option<&str>) -> Vec<HistoryEntry> {
        let heads: HashSet<&str> = self.graph.heads().iter().map(|e| e.id.as_str()).collect();
        self.graph
            .topological()
            .rev()
            .map(|entry| HistoryEntry {
                id: entry.id.clone(),
                parents: entry.parents.clone(),
                message: entry.message.clone(),
                created_at: entry.created_at,
                is_head: heads.contains(entry.id.as_str()),
                is_current: current == Some(entry.id.as_str()),
                is_merge: entry.is_merge(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub parents: Vec<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_head: bool,
    pub is_current: bool,
    pub is_merge: bool,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parents = if self.parents.is_empty() {
            format!("<{BASE}>")
        } else {
            self.parents.join(", ")
        };
        write!(f, "{parents} -> {}", self.id)?;
        if self.is_head {
            f.write_str(" (head)")?;
        }
        if self.is_current {
            f.write_str(" (current)")?;
        }
        if self.is_merge {
            f.write_str(" (mergepoint)")?;
        }
        write!(f, ", {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub direction: Direction,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Revisions whose scripts ran, in execution order
    pub applied: Vec<String>,
}

impl MigrationOutcome {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Runs planned migrations against one backend.
///
/// Every operation except [`Migrator::current`] requires a single head.
pub struct Migrator<B> {
    set: MigrationSet,
    backend: B,
}

impl<B: MigrationBackend> Migrator<B> {
    pub fn new(set: MigrationSet, backend: B) -> Self {
        Self { set, backend }
    }

    pub fn set(&self) -> &MigrationSet {
        &self.set
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Recorded revision; errors when the database names a revision the
    /// manifest does not know.
    pub async fn current(&self) -> Result<Option<String>> {
        let current = self.backend.current().await?;
        if let Some(id) = &current {
            if !self.set.graph.contains(id) {
                return Err(MigrationError::UnrecordedRevision(id.clone()));
            }
        }
        Ok(current)
    }

    pub async fn upgrade(&self, target: &str) -> Result<MigrationOutcome> {
        self.set.graph.head()?;
        let target = self.set.graph.resolve(target)?;
        let current = self.current().await?;
        let plan = self
            .set
            .plan(Direction::Upgrade, current.as_deref(), target.as_deref())?;
        self.run(plan).await
    }

    pub async fn downgrade(&self, target: &str) -> Result<MigrationOutcome> {
        self.set.graph.head()?;
        let target = self.set.graph.resolve(target)?;
        let current = self.current().await?;
        let plan = self
            .set
            .plan(Direction::Downgrade, current.as_deref(), target.as_deref())?;
        self.run(plan).await
    }

    /// Downgrade by following `steps` parent links.
    pub async fn rollback(&self, steps: usize) -> Result<MigrationOutcome> {
        self.set.graph.head()?;
        let current = self.current().await?;
        let target = rollback_target(&self.set.graph, current.as_deref(), steps)?;
        let plan = self
            .set
            .plan(Direction::Downgrade, current.as_deref(), target.as_deref())?;
        self.run(plan).await
    }

    /// Record `target` as applied without running scripts.
    pub async fn stamp(&self, target: &str) -> Result<Option<String>> {
        self.set.graph.head()?;
        let target = self.set.graph.resolve(target)?;
        self.backend.stamp(target.as_deref()).await?;
        tracing::info!(revision = target.as_deref().unwrap_or(BASE), "Stamped");
        Ok(target)
    }

    /// Downgrade to base, then upgrade to head.
    pub async fn reset(&self) -> Result<(MigrationOutcome, MigrationOutcome)> {
        let down = self.downgrade(BASE).await?;
        let up = self.upgrade(HEAD).await?;
        Ok((down, up))
    }

    async fn run(&self, plan: MigrationPlan) -> Result<MigrationOutcome> {
        let outcome = MigrationOutcome {
            direction: plan.direction,
            from: plan.from.clone(),
            to: plan.to.clone(),
            applied: plan.steps.iter().map(|s| s.revision.clone()).collect(),
        };

        if plan.is_empty() {
            tracing::info!(
                revision = plan.to.as_deref().unwrap_or(BASE),
                "Already at target revision"
            );
            return Ok(outcome);
        }

        self.backend.apply(&plan).await?;
        tracing::info!(
            direction = %plan.direction,
            from = plan.from.as_deref().unwrap_or(BASE),
            to = plan.to.as_deref().unwrap_or(BASE),
            steps = plan.steps.len(),
            "Migration complete"
        );
        Ok(outcome)
    }
}
