//! Path planning through the revision graph.

use std::fmt;

use crate::error::{MigrationError, Result};
use crate::graph::RevisionGraph;
use crate::manifest::RevisionEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upgrade => f.write_str("upgrade"),
            Direction::Downgrade => f.write_str("downgrade"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub revision: String,
    pub message: String,
    pub sql: String,
}

/// Steps to move the database from `from` to `to`. Backends apply a plan
/// and the final revision-row update as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub direction: Direction,
    pub from: Option<String>,
    pub to: Option<String>,
    pub steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Revisions to upgrade through, oldest first.
///
/// `target` must descend from (or equal) `current`.
pub fn upgrade_path<'g>(
    graph: &'g RevisionGraph,
    current: Option<&str>,
    target: Option<&str>,
) -> Result<Vec<&'g RevisionEntry>> {
    let wanted = graph.ancestors(target);
    if let Some(current) = current {
        if !wanted.contains(current) {
            return Err(MigrationError::unreachable(Some(current), target));
        }
    }
    let done = graph.ancestors(current);

    Ok(graph
        .topological()
        .filter(|e| wanted.contains(e.id.as_str()) && !done.contains(e.id.as_str()))
        .collect())
}

/// Revisions to downgrade through, newest first.
///
/// `target` must be an ancestor of (or equal) `current`.
pub fn downgrade_path<'g>(
    graph: &'g RevisionGraph,
    current: Option<&str>,
    target: Option<&str>,
) -> Result<Vec<&'g RevisionEntry>> {
    let applied = graph.ancestors(current);
    if let Some(target) = target {
        if !applied.contains(target) {
            return Err(MigrationError::unreachable(current, Some(target)));
        }
    }
    let keep = graph.ancestors(target);

    Ok(graph
        .topological()
        .rev()
        .filter(|e| applied.contains(e.id.as_str()) && !keep.contains(e.id.as_str()))
        .collect())
}

/// Revision reached by following `steps` parent links from `current`.
///
/// Refuses to step across a merge revision, which has no single parent.
pub fn rollback_target(
    graph: &RevisionGraph,
    current: Option<&str>,
    steps: usize,
) -> Result<Option<String>> {
    let mut position = current.map(str::to_string);
    for taken in 0..steps {
        let Some(id) = position else {
            return Err(MigrationError::RollbackTooFar {
                steps,
                available: taken,
            });
        };
        let entry = graph
            .get(&id)
            .ok_or_else(|| MigrationError::UnrecordedRevision(id.clone()))?;
        position = match entry.parents.as_slice() {
            [] => None,
            [parent] => Some(parent.clone()),
            _ => return Err(MigrationError::AmbiguousStep { revision: id }),
        };
    }
    Ok(position)
}
