use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Flora IM returns ids as JSON numbers on some endpoints and as strings on
/// others. Both are accepted and normalized to a string id.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<Id, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Returns true if the id is usable as a path segment on the backend.
pub fn is_valid_id(id: &str) -> bool {
    let trimmed = id.trim();
    !trimmed.is_empty() && trimmed != "0" && !trimmed.contains('/')
}
