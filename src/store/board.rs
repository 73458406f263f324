use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::logic::state::StateCell;
use crate::model::{Id, Relation, RelationKind};

/// Local, owner-keyed relation collections that list views render and the
/// coordinator mutates.
#[derive(Debug, Clone, Default)]
pub struct RelationBoard {
    entries: Arc<RwLock<HashMap<(RelationKind, Id), Vec<Relation>>>>,
}

impl RelationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current relations for an owner; empty if never loaded
    pub fn get(&self, kind: RelationKind, owner_id: &Id) -> Vec<Relation> {
        self.entries
            .read()
            .get(&(kind, owner_id.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: RelationKind, owner_id: &Id, right_id: &Id) -> bool {
        self.entries
            .read()
            .get(&(kind, owner_id.clone()))
            .map(|relations| relations.iter().any(|r| &r.right_id == right_id))
            .unwrap_or(false)
    }

    /// Replace an owner's relations
    pub fn set(&self, kind: RelationKind, owner_id: &Id, relations: Vec<Relation>) {
        self.entries.write().insert((kind, owner_id.clone()), relations);
    }

    /// State cell over one owner's relations, for the coordinator
    pub fn owner(&self, kind: RelationKind, owner_id: &Id) -> OwnerRelations<'_> {
        OwnerRelations {
            board: self,
            kind,
            owner_id: owner_id.clone(),
        }
    }
}

pub struct OwnerRelations<'b> {
    board: &'b RelationBoard,
    kind: RelationKind,
    owner_id: Id,
}

impl StateCell<Vec<Relation>> for OwnerRelations<'_> {
    fn snapshot(&self) -> Vec<Relation> {
        self.board.get(self.kind, &self.owner_id)
    }

    fn apply(&self, next: Vec<Relation>) {
        self.board.set(self.kind, &self.owner_id, next);
    }
}
