use serde::{Deserialize, Serialize};

use crate::model::{deserialize_id, Id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Location {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_default: false,
        }
    }
}

/// Rows rendered by a list view are addressed by id.
pub trait ListEntity: Clone + Send + Sync {
    fn entity_id(&self) -> &Id;
}

impl ListEntity for Location {
    fn entity_id(&self) -> &Id {
        &self.id
    }
}
