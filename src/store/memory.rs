use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::model::{
    Id, Location, NewRelation, Relation, RelationKind, RelationUpdate, ResourceError,
};
use crate::store::traits::{LocationStore, RelationStore};

/// In-process stand-in for the Flora backend.
///
/// Follows the same server rules (duplicate assignment is a 409, unknown
/// relation is a 404, the default location cannot be deleted, a new default
/// tax demotes the old one). Failures can be scripted with [`fail_next`].
///
/// [`fail_next`]: MemoryRelationStore::fail_next
#[derive(Debug, Default)]
pub struct MemoryRelationStore {
    relations: Mutex<HashMap<(RelationKind, Id), Vec<Relation>>>,
    locations: Mutex<Vec<Location>>,
    scripted_failures: Mutex<VecDeque<ResourceError>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations(locations: Vec<Location>) -> Self {
        let store = Self::default();
        *store.locations.lock() = locations;
        store
    }

    pub fn seed(&self, kind: RelationKind, owner_id: &Id, relations: Vec<Relation>) {
        self.relations.lock().insert((kind, owner_id.clone()), relations);
    }

    /// Queue an error for the next call (any operation). Queued errors are
    /// consumed in order.
    pub fn fail_next(&self, error: ResourceError) {
        self.scripted_failures.lock().push_back(error);
    }

    pub fn fail_next_with_status(&self, status: u16, times: usize) {
        for _ in 0..times {
            self.fail_next(ResourceError::from_status(status, format!("Scripted failure {}", status)));
        }
    }

    /// How many times an operation was invoked, failed calls included
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    pub fn stored(&self, kind: RelationKind, owner_id: &Id) -> Vec<Relation> {
        self.relations
            .lock()
            .get(&(kind, owner_id.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, operation: &'static str) -> Result<(), ResourceError> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        match self.scripted_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl RelationStore for MemoryRelationStore {
    async fn list_relations(&self, kind: RelationKind, owner_id: &Id) -> Result<Vec<Relation>, ResourceError> {
        self.enter("list_relations")?;
        Ok(self.stored(kind, owner_id))
    }

    async fn create_relation(&self, kind: RelationKind, relation: &NewRelation) -> Result<Relation, ResourceError> {
        self.enter("create_relation")?;
        let mut relations = self.relations.lock();
        let rows = relations.entry((kind, relation.owner_id.clone())).or_default();

        if rows.iter().any(|r| r.right_id == relation.right_id) {
            return Err(ResourceError::from_status(
                409,
                format!("{} {} is already assigned", kind.noun(), relation.right_id),
            ));
        }
        if kind.has_exclusive_default() && relation.attributes.is_default {
            rows.iter_mut().for_each(|r| r.attributes.is_default = false);
        }

        let mut created = Relation::new(
            relation.owner_id.clone(),
            relation.right_id.clone(),
            relation.attributes.clone(),
        );
        created.updated_at = Some(chrono::Utc::now());
        rows.push(created.clone());
        Ok(created)
    }

    async fn update_relation(
        &self,
        kind: RelationKind,
        owner_id: &Id,
        right_id: &Id,
        update: &RelationUpdate,
    ) -> Result<Relation, ResourceError> {
        self.enter("update_relation")?;
        let mut relations = self.relations.lock();
        let rows = relations.entry((kind, owner_id.clone())).or_default();

        if !rows.iter().any(|r| &r.right_id == right_id) {
            return Err(ResourceError::from_status(404, "Relation not found"));
        }
        let demote = kind.has_exclusive_default() && update.is_default == Some(true);
        let mut updated = None;
        for row in rows.iter_mut() {
            if &row.right_id == right_id {
                row.attributes.apply(update);
                row.updated_at = Some(chrono::Utc::now());
                updated = Some(row.clone());
            } else if demote {
                row.attributes.is_default = false;
            }
        }
        updated.ok_or_else(|| ResourceError::from_status(404, "Relation not found"))
    }

    async fn delete_relation(&self, kind: RelationKind, owner_id: &Id, right_id: &Id) -> Result<(), ResourceError> {
        self.enter("delete_relation")?;
        let mut relations = self.relations.lock();
        let rows = relations.entry((kind, owner_id.clone())).or_default();
        let before = rows.len();
        rows.retain(|r| &r.right_id != right_id);
        if rows.len() == before {
            return Err(ResourceError::from_status(404, "Relation not found"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LocationStore for MemoryRelationStore {
    async fn list_locations(&self) -> Result<Vec<Location>, ResourceError> {
        self.enter("list_locations")?;
        Ok(self.locations.lock().clone())
    }

    async fn delete_location(&self, id: &Id) -> Result<(), ResourceError> {
        self.enter("delete_location")?;
        let mut locations = self.locations.lock();
        let Some(index) = locations.iter().position(|l| &l.id == id) else {
            return Err(ResourceError::from_status(404, "Location not found"));
        };
        if locations[index].is_default {
            return Err(ResourceError::from_status(409, "Cannot delete default location"));
        }
        locations.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorKind, RelationAttributes};

    fn owner() -> Id {
        "3".to_string()
    }

    #[tokio::test]
    async fn test_server_rules() {
        let store = MemoryRelationStore::new();
        let new = NewRelation {
            owner_id: owner(),
            right_id: "5".to_string(),
            attributes: RelationAttributes::default_tax(),
        };
        store.create_relation(RelationKind::LocationTax, &new).await.unwrap();

        let duplicate = store.create_relation(RelationKind::LocationTax, &new).await.unwrap_err();
        assert_eq!(duplicate.status, Some(409));

        let second = NewRelation {
            right_id: "7".to_string(),
            ..new.clone()
        };
        store.create_relation(RelationKind::LocationTax, &second).await.unwrap();
        let stored = store.stored(RelationKind::LocationTax, &owner());
        assert!(!stored[0].attributes.is_default);
        assert!(stored[1].attributes.is_default);

        let missing = store
            .delete_relation(RelationKind::LocationTax, &owner(), &"99".to_string())
            .await
            .unwrap_err();
        assert_eq!(missing.kind, ErrorKind::Client);
        assert_eq!(store.calls("create_relation"), 3);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let store = MemoryRelationStore::new();
        store.fail_next_with_status(503, 2);

        assert_eq!(store.list_relations(RelationKind::LocationTax, &owner()).await.unwrap_err().status, Some(503));
        assert_eq!(store.list_relations(RelationKind::LocationTax, &owner()).await.unwrap_err().status, Some(503));
        assert!(store.list_relations(RelationKind::LocationTax, &owner()).await.is_ok());
        assert_eq!(store.calls("list_relations"), 3);
    }

    #[tokio::test]
    async fn test_default_location_is_protected() {
        let mut main = Location::new("1", "Main");
        main.is_default = true;
        let store = MemoryRelationStore::with_locations(vec![main, Location::new("2", "Harbor")]);

        let err = store.delete_location(&"1".to_string()).await.unwrap_err();
        assert_eq!(err.message, "Cannot delete default location");
        store.delete_location(&"2".to_string()).await.unwrap();
        assert_eq!(store.list_locations().await.unwrap().len(), 1);
    }
}
