use crate::model::{Id, Location, NewRelation, Relation, RelationKind, RelationUpdate, ResourceError};

/// Remote relation endpoints (location ↔ tax rate, location ↔ employee)
#[async_trait::async_trait]
pub trait RelationStore: Send + Sync {
    /// List the relations owned by one location
    async fn list_relations(&self, kind: RelationKind, owner_id: &Id) -> Result<Vec<Relation>, ResourceError>;
    /// Create a relation; the backend echoes the stored row
    async fn create_relation(&self, kind: RelationKind, relation: &NewRelation) -> Result<Relation, ResourceError>;
    /// Change attributes of an existing relation
    async fn update_relation(
        &self,
        kind: RelationKind,
        owner_id: &Id,
        right_id: &Id,
        update: &RelationUpdate,
    ) -> Result<Relation, ResourceError>;
    async fn delete_relation(&self, kind: RelationKind, owner_id: &Id, right_id: &Id) -> Result<(), ResourceError>;
}

#[async_trait::async_trait]
pub trait LocationStore: Send + Sync {
    async fn list_locations(&self) -> Result<Vec<Location>, ResourceError>;
    async fn delete_location(&self, id: &Id) -> Result<(), ResourceError>;
}

pub trait Store: RelationStore + LocationStore + Send + Sync {}
impl<T: RelationStore + LocationStore + Send + Sync> Store for T {}
