use parking_lot::{Mutex, MutexGuard};
use std::collections::HashSet;
use std::future::Future;

use crate::logic::optimistic::{MutationContext, MutationCoordinator, MutationReport};
use crate::logic::selection::SelectionStore;
use crate::logic::state::{SharedState, StateCell};
use crate::model::{Id, ListEntity, ResourceError};

/// Rows of one admin list (locations, users, ...) together with their
/// selection/expansion state and optimistic deletes.
pub struct ListView<E: ListEntity> {
    noun: &'static str,
    rows: SharedState<Vec<E>>,
    selection: Mutex<SelectionStore<Id>>,
    coordinator: MutationCoordinator,
}

impl<E: ListEntity> ListView<E> {
    pub fn new(noun: &'static str, coordinator: MutationCoordinator) -> Self {
        Self::with_selection(noun, coordinator, SelectionStore::new())
    }

    pub fn with_selection(noun: &'static str, coordinator: MutationCoordinator, selection: SelectionStore<Id>) -> Self {
        Self {
            noun,
            rows: SharedState::new(Vec::new()),
            selection: Mutex::new(selection),
            coordinator,
        }
    }

    pub fn rows(&self) -> Vec<E> {
        self.rows.snapshot()
    }

    pub fn row_ids(&self) -> Vec<Id> {
        self.rows.read(|rows| rows.iter().map(|r| r.entity_id().clone()).collect())
    }

    /// Replace the rows with freshly loaded ones. Selection and expansion
    /// entries for rows that disappeared are dropped.
    pub fn replace_rows(&self, rows: Vec<E>) {
        let present: HashSet<Id> = rows.iter().map(|r| r.entity_id().clone()).collect();
        self.rows.apply(rows);
        self.selection.lock().retain(|id| present.contains(id));
    }

    pub fn selection(&self) -> MutexGuard<'_, SelectionStore<Id>> {
        self.selection.lock()
    }

    pub fn toggle_selected(&self, id: &Id) -> bool {
        self.selection.lock().toggle_selected(id.clone())
    }

    /// The expand hook runs after the selection lock is released, so it may
    /// read or change this view.
    pub fn toggle_expanded(&self, id: &Id) -> bool {
        let (expanded, hook) = {
            let mut selection = self.selection.lock();
            (selection.flip_expanded(id.clone()), selection.on_expand())
        };
        if expanded {
            if let Some(hook) = hook {
                hook(id);
            }
        }
        expanded
    }

    pub fn select_all(&self) {
        let ids = self.row_ids();
        self.selection.lock().select_all(ids);
    }

    /// Selected ids in row order
    pub fn selected_ids(&self) -> Vec<Id> {
        let ids = self.row_ids();
        self.selection.lock().selected_in(&ids)
    }

    /// Remove the row right away, then confirm with `remote`. The row comes
    /// back if the backend refuses.
    pub async fn delete<R, RFut, Out>(&self, id: &Id, remote: R) -> Result<MutationReport<Out>, ResourceError>
    where
        R: FnMut() -> RFut,
        RFut: Future<Output = Result<Out, ResourceError>>,
    {
        if !self.rows.read(|rows| rows.iter().any(|r| r.entity_id() == id)) {
            return Err(self
                .coordinator
                .reject(ResourceError::validation(format!("{} {} is not in the list", self.noun, id))));
        }

        let ctx = MutationContext::new(
            format!("Deleted {} {}", self.noun, id),
            format!("Failed to delete {} {}", self.noun, id),
        );
        let target = id.clone();
        let report = self
            .coordinator
            .apply_optimistic(
                ctx,
                &self.rows,
                move |rows: &Vec<E>| rows.iter().filter(|r| r.entity_id() != &target).cloned().collect(),
                remote,
            )
            .await?;

        self.selection.lock().forget(id);
        Ok(report)
    }

    /// Delete every selected row, one coordinated mutation per row in row
    /// order. Failures do not stop the remaining deletes.
    pub async fn delete_selected<F, RFut, Out>(&self, mut remote: F) -> Vec<(Id, Result<Out, ResourceError>)>
    where
        F: FnMut(&Id) -> RFut,
        RFut: Future<Output = Result<Out, ResourceError>>,
    {
        let mut outcomes = Vec::new();
        for id in self.selected_ids() {
            let result = self
                .delete(&id, || remote(&id))
                .await
                .map(|report| report.value);
            outcomes.push((id, result));
        }
        outcomes
    }
}
