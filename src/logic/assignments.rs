use std::sync::Arc;

use crate::logic::optimistic::{MutationContext, MutationCoordinator, MutationReport};
use crate::logic::retry;
use crate::model::{
    is_valid_id, with_assigned, with_updated, without, Id, NewRelation, Relation, RelationAttributes,
    OwnerKey, RelationKind, RelationUpdate, ResourceError,
};
use crate::store::board::RelationBoard;
use crate::store::traits::RelationStore;

/// Tax-rate and employee assignment flows for locations.
///
/// Every mutation validates locally first, then goes through the coordinator:
/// the board shows the change immediately, the backend call is retried per
/// policy, and the board is either reloaded from the server or rolled back.
pub struct AssignmentService<S: RelationStore> {
    store: Arc<S>,
    board: RelationBoard,
    coordinator: MutationCoordinator,
}

impl<S: RelationStore> AssignmentService<S> {
    pub fn new(store: Arc<S>, coordinator: MutationCoordinator) -> Self {
        Self::with_board(store, coordinator, RelationBoard::new())
    }

    pub fn with_board(store: Arc<S>, coordinator: MutationCoordinator, board: RelationBoard) -> Self {
        Self {
            store,
            board,
            coordinator,
        }
    }

    pub fn board(&self) -> &RelationBoard {
        &self.board
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn relations(&self, kind: RelationKind, owner_id: &Id) -> Vec<Relation> {
        self.board.get(kind, owner_id)
    }

    /// Fetch an owner's relations (with retries) and put them on the board
    pub async fn load(&self, kind: RelationKind, owner_id: &Id) -> Result<Vec<Relation>, ResourceError> {
        if !is_valid_id(owner_id) {
            return Err(self.coordinator.reject(ResourceError::validation("Location is required")));
        }
        self.fetch(kind, owner_id).await
    }

    async fn fetch(&self, kind: RelationKind, owner_id: &Id) -> Result<Vec<Relation>, ResourceError> {
        let store = &*self.store;
        let relations = retry::execute(self.coordinator.policy(), move || store.list_relations(kind, owner_id)).await?;
        self.board.set(kind, owner_id, relations.clone());
        Ok(relations)
    }

    pub async fn assign(
        &self,
        kind: RelationKind,
        owner_id: &Id,
        right_id: &Id,
        attributes: RelationAttributes,
    ) -> Result<MutationReport<Relation>, ResourceError> {
        self.validate_pair(kind, owner_id, right_id)?;
        if self.board.contains(kind, owner_id, right_id) {
            return Err(self.coordinator.reject(ResourceError::validation(format!(
                "{} {} is already assigned to location {}",
                capitalize(kind.noun()),
                right_id,
                owner_id
            ))));
        }

        let body = NewRelation {
            owner_id: owner_id.clone(),
            right_id: right_id.clone(),
            attributes: attributes.clone(),
        };
        let optimistic = Relation::new(owner_id.clone(), right_id.clone(), attributes);
        let ctx = MutationContext::new(
            format!("Assigned {} {} to location {}", kind.noun(), right_id, owner_id),
            format!("Failed to assign {} {}", kind.noun(), right_id),
        )
        .with_key(key(kind, owner_id));

        let store = &*self.store;
        let body = &body;
        self.coordinator
            .apply_optimistic_with_refresh(
                ctx,
                &self.board.owner(kind, owner_id),
                move |current: &Vec<Relation>| with_assigned(current, optimistic, kind),
                move || store.create_relation(kind, body),
                || self.fetch(kind, owner_id),
            )
            .await
    }

    pub async fn update(
        &self,
        kind: RelationKind,
        owner_id: &Id,
        right_id: &Id,
        update: RelationUpdate,
    ) -> Result<MutationReport<Relation>, ResourceError> {
        self.validate_pair(kind, owner_id, right_id)?;
        if update.is_empty() {
            return Err(self.coordinator.reject(ResourceError::validation("Nothing to update")));
        }
        let current = self
            .board
            .get(kind, owner_id)
            .into_iter()
            .find(|r| &r.right_id == right_id);
        let Some(current) = current else {
            return Err(self.coordinator.reject(not_assigned(kind, owner_id, right_id)));
        };
        let mut target = current.attributes.clone();
        target.apply(&update);
        if target == current.attributes {
            return Err(self.coordinator.reject(ResourceError::validation(format!(
                "{} {} already has these settings",
                capitalize(kind.noun()),
                right_id
            ))));
        }

        let ctx = MutationContext::new(
            format!("Updated {} {} at location {}", kind.noun(), right_id, owner_id),
            format!("Failed to update {} {}", kind.noun(), right_id),
        )
        .with_key(key(kind, owner_id));

        let store = &*self.store;
        let update = &update;
        self.coordinator
            .apply_optimistic_with_refresh(
                ctx,
                &self.board.owner(kind, owner_id),
                move |current: &Vec<Relation>| with_updated(current, owner_id, right_id, update, kind),
                move || store.update_relation(kind, owner_id, right_id, update),
                || self.fetch(kind, owner_id),
            )
            .await
    }

    /// Make `tax_rate_id` the default tax of the location
    pub async fn set_default(&self, owner_id: &Id, tax_rate_id: &Id) -> Result<MutationReport<Relation>, ResourceError> {
        self.update(RelationKind::LocationTax, owner_id, tax_rate_id, RelationUpdate::make_default())
            .await
    }

    pub async fn set_manager(
        &self,
        owner_id: &Id,
        employee_id: &Id,
        is_manager: bool,
    ) -> Result<MutationReport<Relation>, ResourceError> {
        let update = RelationUpdate {
            is_default: None,
            is_manager: Some(is_manager),
        };
        self.update(RelationKind::LocationEmployee, owner_id, employee_id, update)
            .await
    }

    pub async fn remove(
        &self,
        kind: RelationKind,
        owner_id: &Id,
        right_id: &Id,
    ) -> Result<MutationReport<()>, ResourceError> {
        self.validate_pair(kind, owner_id, right_id)?;
        if !self.board.contains(kind, owner_id, right_id) {
            return Err(self.coordinator.reject(not_assigned(kind, owner_id, right_id)));
        }

        let ctx = MutationContext::new(
            format!("Removed {} {} from location {}", kind.noun(), right_id, owner_id),
            format!("Failed to remove {} {}", kind.noun(), right_id),
        )
        .with_key(key(kind, owner_id));

        let store = &*self.store;
        self.coordinator
            .apply_optimistic_with_refresh(
                ctx,
                &self.board.owner(kind, owner_id),
                move |current: &Vec<Relation>| without(current, owner_id, right_id),
                move || store.delete_relation(kind, owner_id, right_id),
                || self.fetch(kind, owner_id),
            )
            .await
    }

    fn validate_pair(&self, kind: RelationKind, owner_id: &Id, right_id: &Id) -> Result<(), ResourceError> {
        if !is_valid_id(owner_id) {
            return Err(self.coordinator.reject(ResourceError::validation("Location is required")));
        }
        if !is_valid_id(right_id) {
            return Err(self.coordinator.reject(ResourceError::validation(format!(
                "{} is required",
                capitalize(kind.noun())
            ))));
        }
        Ok(())
    }
}

fn key(kind: RelationKind, owner_id: &Id) -> OwnerKey {
    OwnerKey::new(kind, owner_id.clone())
}

fn not_assigned(kind: RelationKind, owner_id: &Id, right_id: &Id) -> ResourceError {
    ResourceError::validation(format!(
        "{} {} is not assigned to location {}",
        capitalize(kind.noun()),
        right_id,
        owner_id
    ))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::notify::Notifier;
    use crate::logic::retry::RetryPolicy;
    use crate::model::{ErrorKind, MutationOutcome, NotificationLevel};
    use crate::store::memory::MemoryRelationStore;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Records what the board showed each time the backend was asked to
    /// create or delete something
    struct ObservingStore {
        inner: MemoryRelationStore,
        board: RelationBoard,
        seen: Mutex<Vec<Vec<Relation>>>,
        create_delay: Duration,
    }

    #[async_trait::async_trait]
    impl RelationStore for ObservingStore {
        async fn list_relations(&self, kind: RelationKind, owner_id: &Id) -> Result<Vec<Relation>, ResourceError> {
            self.inner.list_relations(kind, owner_id).await
        }

        async fn create_relation(&self, kind: RelationKind, relation: &NewRelation) -> Result<Relation, ResourceError> {
            self.seen.lock().push(self.board.get(kind, &relation.owner_id));
            if !self.create_delay.is_zero() {
                tokio::time::sleep(self.create_delay).await;
            }
            self.inner.create_relation(kind, relation).await
        }

        async fn update_relation(
            &self,
            kind: RelationKind,
            owner_id: &Id,
            right_id: &Id,
            update: &RelationUpdate,
        ) -> Result<Relation, ResourceError> {
            self.seen.lock().push(self.board.get(kind, owner_id));
            self.inner.update_relation(kind, owner_id, right_id, update).await
        }

        async fn delete_relation(&self, kind: RelationKind, owner_id: &Id, right_id: &Id) -> Result<(), ResourceError> {
            self.seen.lock().push(self.board.get(kind, owner_id));
            self.inner.delete_relation(kind, owner_id, right_id).await
        }
    }

    fn service() -> (AssignmentService<ObservingStore>, Arc<ObservingStore>) {
        service_with_create_delay(Duration::ZERO)
    }

    fn service_with_create_delay(create_delay: Duration) -> (AssignmentService<ObservingStore>, Arc<ObservingStore>) {
        let board = RelationBoard::new();
        let store = Arc::new(ObservingStore {
            inner: MemoryRelationStore::new(),
            board: board.clone(),
            seen: Mutex::new(Vec::new()),
            create_delay,
        });
        let coordinator = MutationCoordinator::new(RetryPolicy::default(), Arc::new(Notifier::default()));
        (
            AssignmentService::with_board(Arc::clone(&store), coordinator, board),
            store,
        )
    }

    fn id(s: &str) -> Id {
        s.to_string()
    }

    fn default_tax(location: &str, tax: &str) -> Relation {
        Relation::new(location, tax, RelationAttributes::default_tax())
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_assign_rolls_back_after_exhausted_retries() {
        let (service, store) = service();
        store.inner.fail_next_with_status(503, 3);

        let err = service
            .assign(RelationKind::LocationTax, &id("3"), &id("7"), RelationAttributes::default_tax())
            .await
            .unwrap_err();

        assert_eq!(err.status, Some(503));
        assert_eq!(store.inner.calls("create_relation"), 3);
        // optimistic state was visible during every attempt
        for seen in store.seen.lock().iter() {
            assert_eq!(seen, &vec![default_tax("3", "7")]);
        }
        assert!(service.relations(RelationKind::LocationTax, &id("3")).is_empty());

        let latest = service.coordinator().notifier().latest().unwrap();
        assert_eq!(latest.level, NotificationLevel::Error);
        assert!(latest.message.contains("Scripted failure 503"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_assign_succeeds_on_second_attempt_and_reloads() {
        let (service, store) = service();
        store.inner.fail_next_with_status(503, 1);

        let report = service
            .assign(RelationKind::LocationTax, &id("3"), &id("7"), RelationAttributes::default_tax())
            .await
            .unwrap();

        assert_eq!(report.outcome, MutationOutcome::Committed);
        assert_eq!(report.attempts, 2);
        let relations = service.relations(RelationKind::LocationTax, &id("3"));
        assert_eq!(relations.len(), 1);
        assert!(relations[0].attributes.is_default);
        // server-confirmed copy carries the backend timestamp
        assert!(relations[0].updated_at.is_some());

        let success = service.coordinator().notifier().latest().unwrap();
        assert_eq!(success.level, NotificationLevel::Success);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(service.coordinator().notifier().active().is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_remove_with_not_found_rolls_back_without_delay() {
        let (service, store) = service();
        store
            .inner
            .seed(RelationKind::LocationTax, &id("3"), vec![default_tax("3", "7")]);
        service.load(RelationKind::LocationTax, &id("3")).await.unwrap();
        store.inner.fail_next_with_status(404, 1);

        let started = Instant::now();
        let err = service
            .remove(RelationKind::LocationTax, &id("3"), &id("7"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Client);
        assert_eq!(store.inner.calls("delete_relation"), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(store.seen.lock().as_slice(), &[Vec::<Relation>::new()]);
        assert_eq!(
            service.relations(RelationKind::LocationTax, &id("3")),
            vec![default_tax("3", "7")]
        );
        assert_eq!(
            service.coordinator().notifier().latest().unwrap().level,
            NotificationLevel::Error
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_validation_errors_skip_the_backend() {
        let (service, store) = service();
        store
            .inner
            .seed(RelationKind::LocationTax, &id("3"), vec![default_tax("3", "7")]);
        service.load(RelationKind::LocationTax, &id("3")).await.unwrap();

        let missing = service
            .assign(RelationKind::LocationTax, &id("3"), &id(""), RelationAttributes::default())
            .await
            .unwrap_err();
        assert_eq!(missing.kind, ErrorKind::Validation);
        assert_eq!(missing.message, "Tax rate is required");

        let duplicate = service
            .assign(RelationKind::LocationTax, &id("3"), &id("7"), RelationAttributes::default())
            .await
            .unwrap_err();
        assert_eq!(duplicate.kind, ErrorKind::Validation);

        let absent = service
            .remove(RelationKind::LocationTax, &id("3"), &id("8"))
            .await
            .unwrap_err();
        assert_eq!(absent.kind, ErrorKind::Validation);

        let already = service.set_default(&id("3"), &id("7")).await.unwrap_err();
        assert_eq!(already.kind, ErrorKind::Validation);

        assert_eq!(store.inner.calls("create_relation"), 0);
        assert_eq!(store.inner.calls("delete_relation"), 0);
        assert_eq!(store.inner.calls("update_relation"), 0);
        assert!(store.seen.lock().is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_set_default_demotes_previous_default() {
        let (service, store) = service();
        store.inner.seed(
            RelationKind::LocationTax,
            &id("3"),
            vec![
                default_tax("3", "5"),
                Relation::new("3", "7", RelationAttributes::default()),
            ],
        );
        service.load(RelationKind::LocationTax, &id("3")).await.unwrap();

        service.set_default(&id("3"), &id("7")).await.unwrap();

        let optimistic = store.seen.lock()[0].clone();
        assert!(!optimistic[0].attributes.is_default);
        assert!(optimistic[1].attributes.is_default);

        let relations = service.relations(RelationKind::LocationTax, &id("3"));
        let defaults: Vec<&str> = relations
            .iter()
            .filter(|r| r.attributes.is_default)
            .map(|r| r.right_id.as_str())
            .collect();
        assert_eq!(defaults, vec!["7"]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_employee_manager_flag() {
        let (service, store) = service();

        service
            .assign(RelationKind::LocationEmployee, &id("3"), &id("12"), RelationAttributes::default())
            .await
            .unwrap();
        service.set_manager(&id("3"), &id("12"), true).await.unwrap();

        let stored = store.inner.stored(RelationKind::LocationEmployee, &id("3"));
        assert!(stored[0].attributes.is_manager);
        assert_eq!(service.relations(RelationKind::LocationEmployee, &id("3")), stored);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_load_retries_server_errors() {
        let (service, store) = service();
        store.inner.fail_next_with_status(500, 2);
        store
            .inner
            .seed(RelationKind::LocationTax, &id("3"), vec![default_tax("3", "7")]);

        let loaded = service.load(RelationKind::LocationTax, &id("3")).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.inner.calls("list_relations"), 3);
        assert_eq!(service.relations(RelationKind::LocationTax, &id("3")), loaded);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_concurrent_assigns_on_one_location_leave_no_rejected_rows() {
        let (service, store) = service_with_create_delay(Duration::from_millis(10));
        store.inner.fail_next_with_status(400, 1);
        let location = id("3");
        let (seven, eight) = (id("7"), id("8"));

        let (first, second) = tokio::join!(
            service.assign(RelationKind::LocationTax, &location, &seven, RelationAttributes::default()),
            service.assign(RelationKind::LocationTax, &location, &eight, RelationAttributes::default()),
        );

        assert_eq!(first.unwrap_err().status, Some(400));
        assert_eq!(second.unwrap_err().kind, ErrorKind::Conflict);
        assert_eq!(store.inner.calls("create_relation"), 1);
        assert!(service.relations(RelationKind::LocationTax, &location).is_empty());
        assert_eq!(service.coordinator().in_flight().pending_count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_concurrent_assigns_on_different_locations_both_commit() {
        let (service, store) = service_with_create_delay(Duration::from_millis(10));
        let (main, harbor, seven) = (id("3"), id("4"), id("7"));

        let (first, second) = tokio::join!(
            service.assign(RelationKind::LocationTax, &main, &seven, RelationAttributes::default_tax()),
            service.assign(RelationKind::LocationTax, &harbor, &seven, RelationAttributes::default_tax()),
        );

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(store.inner.calls("create_relation"), 2);
        for owner in [&main, &harbor] {
            assert_eq!(
                service.relations(RelationKind::LocationTax, owner),
                store.inner.stored(RelationKind::LocationTax, owner)
            );
            assert_eq!(service.relations(RelationKind::LocationTax, owner).len(), 1);
        }
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("tax rate"), "Tax rate");
        assert_eq!(capitalize(""), "");
    }
}
