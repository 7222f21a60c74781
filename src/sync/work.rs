//! Reindex work units and their per-batch deduplication.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::DocumentId;
use crate::tx::ChangeKind;

/// What to do with one index document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkOp {
    Add,
    Update,
    Delete,
}

impl WorkOp {
    /// The operation that mirrors a change to the document's own entity.
    pub fn for_change(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Create => WorkOp::Add,
            ChangeKind::Update => WorkOp::Update,
            ChangeKind::Delete => WorkOp::Delete,
        }
    }

    /// Combine an earlier and a later operation on the same document.
    ///
    /// DELETE beats UPDATE in either order and beats an earlier ADD. A later
    /// ADD beats an earlier DELETE: the entity was re-created. ADD absorbs UPDATE.
    pub fn merge(earlier: WorkOp, later: WorkOp) -> WorkOp {
        use WorkOp::*;
        match (earlier, later) {
            (Delete, Add) => Add,
            (Delete, _) | (_, Delete) => Delete,
            (Add, _) | (_, Add) => Add,
            (Update, Update) => Update,
        }
    }
}

impl fmt::Display for WorkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkOp::Add => "ADD",
            WorkOp::Update => "UPDATE",
            WorkOp::Delete => "DELETE",
        })
    }
}

/// One operation on one index document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReindexWorkUnit {
    pub target: DocumentId,
    pub op: WorkOp,
}

impl ReindexWorkUnit {
    pub fn new(target: DocumentId, op: WorkOp) -> Self {
        Self { target, op }
    }
}

/// Deduplicated work units in first-seen order, at most one per document.
#[derive(Debug, Clone, Default)]
pub struct WorkSet {
    units: Vec<ReindexWorkUnit>,
    slots: HashMap<DocumentId, usize>,
}

impl WorkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: ReindexWorkUnit) {
        match self.slots.get(&unit.target) {
            Some(&slot) => {
                let existing = &mut self.units[slot];
                existing.op = WorkOp::merge(existing.op, unit.op);
            }
            None => {
                self.slots.insert(unit.target.clone(), self.units.len());
                self.units.push(unit);
            }
        }
    }

    pub fn get(&self, target: &DocumentId) -> Option<WorkOp> {
        self.slots.get(target).map(|&slot| self.units[slot].op)
    }

    pub fn len(&self) -> usize { self.units.len() }
    pub fn is_empty(&self) -> bool { self.units.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &ReindexWorkUnit> {
        self.units.iter()
    }

    pub fn into_units(self) -> Vec<ReindexWorkUnit> {
        self.units
    }
}

impl Extend<ReindexWorkUnit> for WorkSet {
    fn extend<T: IntoIterator<Item = ReindexWorkUnit>>(&mut self, iter: T) {
        for unit in iter {
            self.push(unit);
        }
    }
}

impl FromIterator<ReindexWorkUnit> for WorkSet {
    fn from_iter<T: IntoIterator<Item = ReindexWorkUnit>>(iter: T) -> Self {
        let mut set = WorkSet::new();
        set.extend(iter);
        set
    }
}
