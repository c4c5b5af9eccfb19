//! Revision DAG built from the manifest.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{MigrationError, Result};
use crate::manifest::RevisionEntry;
use crate::{BASE, HEAD};

#[derive(Debug, Clone, Default)]
pub struct RevisionGraph {
    entries: Vec<RevisionEntry>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    /// Topological order, ties broken by manifest order
    order: Vec<usize>,
}

impl RevisionGraph {
    /// Validate and index the revisions.
    ///
    /// Rejects duplicate ids, unknown parents, cycles and more than one root.
    /// Several heads are allowed here; see [`RevisionGraph::head`].
    pub fn new(entries: Vec<RevisionEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.id.clone(), i).is_some() {
                return Err(MigrationError::DuplicateRevision(entry.id.clone()));
            }
        }

        let mut children = vec![Vec::new(); entries.len()];
        let mut pending = vec![0usize; entries.len()];
        for (i, entry) in entries.iter().enumerate() {
            for parent in &entry.parents {
                let Some(&p) = index.get(parent) else {
                    return Err(MigrationError::UnknownParent {
                        revision: entry.id.clone(),
                        parent: parent.clone(),
                    });
                };
                children[p].push(i);
                pending[i] += 1;
            }
        }

        let roots: Vec<String> = entries
            .iter()
            .filter(|e| e.parents.is_empty())
            .map(|e| e.id.clone())
            .collect();
        if roots.len() > 1 {
            return Err(MigrationError::MultipleRoots(roots));
        }

        // Kahn's algorithm
        let mut ready: BTreeSet<usize> = (0..entries.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(entries.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &child in &children[next] {
                pending[child] -= 1;
                if pending[child] == 0 {
                    ready.insert(child);
                }
            }
        }
        if order.len() != entries.len() {
            let stuck = (0..entries.len())
                .filter(|&i| pending[i] > 0)
                .map(|i| entries[i].id.clone())
                .collect();
            return Err(MigrationError::Cycle(stuck));
        }

        Ok(Self {
            entries,
            index,
            children,
            order,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<&RevisionEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Revisions without children, in manifest order.
    pub fn heads(&self) -> Vec<&RevisionEntry> {
        (0..self.entries.len())
            .filter(|&i| self.children[i].is_empty())
            .map(|i| &self.entries[i])
            .collect()
    }

    /// The single head, `None` for an empty graph.
    pub fn head(&self) -> Result<Option<&str>> {
        let heads = self.heads();
        match heads.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.id.as_str())),
            many => Err(MigrationError::MultipleHeads(
                many.iter().map(|e| e.id.clone()).collect(),
            )),
        }
    }

    /// Revisions in topological order, oldest first.
    pub fn topological(&self) -> impl DoubleEndedIterator<Item = &RevisionEntry> + '_ {
        self.order.iter().map(|&i| &self.entries[i])
    }

    /// Ids of `id` and every revision it descends from.
    pub fn ancestors<'a>(&'a self, id: Option<&'a str>) -> HashSet<&'a str> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = id.into_iter().collect();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(entry) = self.get(current) {
                stack.extend(entry.parents.iter().map(String::as_str));
            }
        }
        seen
    }

    /// Resolve `head`, `base`, a full id or a unique id prefix.
    /// `base` resolves to `None`.
    pub fn resolve(&self, target: &str) -> Result<Option<String>> {
        let target = target.trim();
        if target.eq_ignore_ascii_case(BASE) {
            return Ok(None);
        }
        if target.eq_ignore_ascii_case(HEAD) {
            return Ok(self.head()?.map(str::to_string));
        }
        if self.contains(target) {
            return Ok(Some(target.to_string()));
        }
        if target.is_empty() {
            return Err(MigrationError::UnknownRevision(target.to_string()));
        }

        let candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.id.starts_with(target))
            .map(|e| e.id.clone())
            .collect();
        match candidates.len() {
            0 => Err(MigrationError::UnknownRevision(target.to_string())),
            1 => Ok(candidates.into_iter().next()),
            _ => Err(MigrationError::AmbiguousRevision {
                prefix: target.to_string(),
                candidates,
            }),
        }
    }
}
