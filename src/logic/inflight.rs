use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{OwnerKey, ResourceError};

/// Tracks which owner collections have a coordinated mutation in flight.
///
/// A second mutation on a key that is still pending is rejected with a
/// `Conflict` error before it touches local state.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    keys: Arc<Mutex<HashSet<OwnerKey>>>,
}

/// Releases its key when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<OwnerKey>>>,
    key: OwnerKey,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: OwnerKey) -> Result<InFlightGuard, ResourceError> {
        let mut keys = self.keys.lock();
        if !keys.insert(key.clone()) {
            return Err(ResourceError::conflict(format!(
                "Another {} change at location {} is still in progress",
                key.kind.noun(),
                key.owner_id
            )));
        }
        Ok(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.keys.lock().len()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorKind, RelationKind};

    fn key(owner: &str) -> OwnerKey {
        OwnerKey::new(RelationKind::LocationTax, owner)
    }

    #[test]
    fn test_overlapping_acquire_is_rejected() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire(key("3")).unwrap();

        let err = registry.try_acquire(key("3")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.message, "Another tax rate change at location 3 is still in progress");

        // another location is independent
        let other = registry.try_acquire(key("4")).unwrap();
        assert_eq!(registry.pending_count(), 2);

        drop(guard);
        drop(other);
        assert_eq!(registry.pending_count(), 0);
        assert!(registry.try_acquire(key("3")).is_ok());
    }

    #[test]
    fn test_kind_is_part_of_the_key() {
        let registry = InFlightRegistry::new();
        let _tax = registry.try_acquire(key("3")).unwrap();
        let employees = OwnerKey::new(RelationKind::LocationEmployee, "3");
        assert!(registry.try_acquire(employees).is_ok());
    }
}
