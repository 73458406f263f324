use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{deserialize_id, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    LocationTax,
    LocationEmployee,
}

impl RelationKind {
    /// Path segment of the relation collection on the backend
    pub const fn segment(self) -> &'static str {
        match self {
            Self::LocationTax => "location-taxes",
            Self::LocationEmployee => "location-employees",
        }
    }

    /// Tax relations carry a single default per location. Promoting one
    /// demotes the others.
    pub const fn has_exclusive_default(self) -> bool {
        matches!(self, Self::LocationTax)
    }

    pub const fn noun(self) -> &'static str {
        match self {
            Self::LocationTax => "tax rate",
            Self::LocationEmployee => "employee",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.segment())
    }
}

impl std::str::FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tax" | "taxes" | "location-taxes" => Ok(Self::LocationTax),
            "employee" | "employees" | "location-employees" => Ok(Self::LocationEmployee),
            other => Err(format!("unknown relation kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationAttributes {
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_manager: bool,
}

impl RelationAttributes {
    pub fn default_tax() -> Self {
        Self {
            is_default: true,
            is_manager: false,
        }
    }

    pub fn manager() -> Self {
        Self {
            is_default: false,
            is_manager: true,
        }
    }

    pub fn apply(&mut self, update: &RelationUpdate) {
        if let Some(is_default) = update.is_default {
            self.is_default = is_default;
        }
        if let Some(is_manager) = update.is_manager {
            self.is_manager = is_manager;
        }
    }
}

/// A many-to-many association between an owner (a location) and another
/// entity. Identity is `(left_id, right_id)` within one relation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(alias = "owner_id", alias = "location_id", deserialize_with = "deserialize_id")]
    pub left_id: Id,
    #[serde(
        alias = "tax_rate_id",
        alias = "employee_id",
        alias = "user_id",
        deserialize_with = "deserialize_id"
    )]
    pub right_id: Id,
    #[serde(flatten)]
    pub attributes: RelationAttributes,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Relation {
    pub fn new(left_id: impl Into<Id>, right_id: impl Into<Id>, attributes: RelationAttributes) -> Self {
        Self {
            left_id: left_id.into(),
            right_id: right_id.into(),
            attributes,
            label: None,
            updated_at: None,
        }
    }

    pub fn is_same(&self, left_id: &str, right_id: &str) -> bool {
        self.left_id == left_id && self.right_id == right_id
    }
}

/// One owner's collection of one relation kind. Optimistic changes snapshot
/// and restore the whole collection, so this is also the unit that at most
/// one coordinated mutation may hold at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKey {
    pub kind: RelationKind,
    pub owner_id: Id,
}

impl OwnerKey {
    pub fn new(kind: RelationKind, owner_id: impl Into<Id>) -> Self {
        Self {
            kind,
            owner_id: owner_id.into(),
        }
    }
}

impl std::fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.owner_id)
    }
}

/// Body of `POST /{segment}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRelation {
    pub owner_id: Id,
    pub right_id: Id,
    pub attributes: RelationAttributes,
}

/// Body of `PUT /{segment}/{right_id}`; only changed attributes are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_manager: Option<bool>,
}

impl RelationUpdate {
    pub fn make_default() -> Self {
        Self {
            is_default: Some(true),
            is_manager: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_default.is_none() && self.is_manager.is_none()
    }
}

// Pure transforms used as optimistic updates. None of them mutate their input.

/// Add `relation` to `relations`, demoting any previous default first when the
/// kind only allows one default.
pub fn with_assigned(relations: &[Relation], relation: Relation, kind: RelationKind) -> Vec<Relation> {
    let demote = kind.has_exclusive_default() && relation.attributes.is_default;
    let mut next: Vec<Relation> = relations
        .iter()
        .filter(|r| !r.is_same(&relation.left_id, &relation.right_id))
        .cloned()
        .map(|mut r| {
            if demote {
                r.attributes.is_default = false;
            }
            r
        })
        .collect();
    next.push(relation);
    next
}

pub fn with_updated(
    relations: &[Relation],
    left_id: &str,
    right_id: &str,
    update: &RelationUpdate,
    kind: RelationKind,
) -> Vec<Relation> {
    let demote = kind.has_exclusive_default() && update.is_default == Some(true);
    relations
        .iter()
        .cloned()
        .map(|mut r| {
            if r.is_same(left_id, right_id) {
                r.attributes.apply(update);
            } else if demote {
                r.attributes.is_default = false;
            }
            r
        })
        .collect()
}

pub fn without(relations: &[Relation], left_id: &str, right_id: &str) -> Vec<Relation> {
    relations
        .iter()
        .filter(|r| !r.is_same(left_id, right_id))
        .cloned()
        .collect()
}
