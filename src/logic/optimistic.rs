use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;

use crate::logic::inflight::InFlightRegistry;
use crate::logic::notify::Notifier;
use crate::logic::retry::{self, RetryPolicy};
use crate::logic::state::StateCell;
use crate::model::{MutationOutcome, OwnerKey, ResourceError};

/// One optimistic change against a state cell: `begin` applies it, then the
/// caller settles it with `commit` or `rollback`.
///
/// Dropping an unsettled transaction rolls back.
pub struct OptimisticTxn<'c, T, C: StateCell<T> + ?Sized> {
    cell: &'c C,
    snapshot: Option<T>,
}

impl<'c, T, C: StateCell<T> + ?Sized> OptimisticTxn<'c, T, C> {
    pub fn begin(cell: &'c C, update: impl FnOnce(&T) -> T) -> Self {
        let snapshot = cell.snapshot();
        cell.apply(update(&snapshot));
        Self {
            cell,
            snapshot: Some(snapshot),
        }
    }

    /// The pre-mutation state
    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    /// Replace the visible state without settling, e.g. with a server echo
    pub fn apply(&self, next: T) {
        self.cell.apply(next);
    }

    /// Keep the optimistic state and discard the snapshot
    pub fn commit(mut self) {
        self.snapshot = None;
    }

    /// Restore the exact pre-mutation state
    pub fn rollback(mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.cell.apply(snapshot);
        }
    }
}

impl<'c, T, C: StateCell<T> + ?Sized> Drop for OptimisticTxn<'c, T, C> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            debug!("optimistic transaction dropped before settling; rolling back");
            self.cell.apply(snapshot);
        }
    }
}

/// Messages and guard key for one coordinated mutation
#[derive(Debug, Clone)]
pub struct MutationContext {
    pub key: Option<OwnerKey>,
    pub success_message: String,
    pub failure_message: String,
}

impl MutationContext {
    pub fn new(success_message: impl Into<String>, failure_message: impl Into<String>) -> Self {
        Self {
            key: None,
            success_message: success_message.into(),
            failure_message: failure_message.into(),
        }
    }

    pub fn with_key(mut self, key: OwnerKey) -> Self {
        self.key = Some(key);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationReport<Out> {
    pub outcome: MutationOutcome,
    pub value: Out,
    pub attempts: usize,
}

/// Runs the apply → remote call → commit-or-rollback cycle and reports the
/// result through the notifier.
#[derive(Debug, Clone)]
pub struct MutationCoordinator {
    policy: RetryPolicy,
    notifier: Arc<Notifier>,
    in_flight: InFlightRegistry,
}

impl MutationCoordinator {
    pub fn new(policy: RetryPolicy, notifier: Arc<Notifier>) -> Self {
        Self {
            policy,
            notifier,
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Surface an error that stopped a mutation before it started. Local
    /// state is never touched.
    pub fn reject(&self, error: ResourceError) -> ResourceError {
        debug!("mutation rejected before start: {} ({})", error.message, error.kind);
        self.notifier.error(error.message.clone());
        error
    }

    pub async fn apply_optimistic<T, C, U, R, RFut, Out>(
        &self,
        ctx: MutationContext,
        cell: &C,
        update: U,
        remote: R,
    ) -> Result<MutationReport<Out>, ResourceError>
    where
        T: Clone,
        C: StateCell<T> + ?Sized,
        U: FnOnce(&T) -> T,
        R: FnMut() -> RFut,
        RFut: Future<Output = Result<Out, ResourceError>>,
    {
        self.coordinate(
            ctx,
            cell,
            update,
            remote,
            None::<fn() -> std::future::Ready<Result<T, ResourceError>>>,
        )
        .await
    }

    /// Like [`apply_optimistic`](Self::apply_optimistic), then replaces the
    /// committed state with whatever `refresh` loads from the server.
    pub async fn apply_optimistic_with_refresh<T, C, U, R, RFut, Out, F, FFut>(
        &self,
        ctx: MutationContext,
        cell: &C,
        update: U,
        remote: R,
        refresh: F,
    ) -> Result<MutationReport<Out>, ResourceError>
    where
        T: Clone,
        C: StateCell<T> + ?Sized,
        U: FnOnce(&T) -> T,
        R: FnMut() -> RFut,
        RFut: Future<Output = Result<Out, ResourceError>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, ResourceError>>,
    {
        self.coordinate(ctx, cell, update, remote, Some(refresh)).await
    }

    async fn coordinate<T, C, U, R, RFut, Out, F, FFut>(
        &self,
        ctx: MutationContext,
        cell: &C,
        update: U,
        remote: R,
        refresh: Option<F>,
    ) -> Result<MutationReport<Out>, ResourceError>
    where
        T: Clone,
        C: StateCell<T> + ?Sized,
        U: FnOnce(&T) -> T,
        R: FnMut() -> RFut,
        RFut: Future<Output = Result<Out, ResourceError>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, ResourceError>>,
    {
        let _guard = match ctx.key.clone() {
            Some(key) => match self.in_flight.try_acquire(key) {
                Ok(guard) => Some(guard),
                Err(err) => {
                    warn!("{}: {}", ctx.failure_message, err.message);
                    self.notifier.warning(err.message.clone());
                    return Err(err);
                }
            },
            None => None,
        };

        let txn = OptimisticTxn::begin(cell, update);

        let mut failures = 0usize;
        let result = retry::execute_observed(&self.policy, remote, |attempt| {
            failures = attempt.attempt_number;
            if !attempt.is_final() {
                debug!(
                    "{}: attempt {}/{} failed, retrying",
                    ctx.failure_message, attempt.attempt_number, attempt.max_attempts
                );
            }
        })
        .await;

        match result {
            Ok(value) => {
                txn.commit();
                let mut outcome = MutationOutcome::Committed;

                if let Some(refresh) = refresh {
                    match refresh().await {
                        Ok(fresh) => cell.apply(fresh),
                        Err(err) => {
                            warn!("refresh after '{}' failed: {}", ctx.success_message, err);
                            self.notifier
                                .warning(format!("{}, but reloading failed: {}", ctx.success_message, err.message));
                            outcome = MutationOutcome::CommittedStale;
                        }
                    }
                }

                info!("{}", ctx.success_message);
                self.notifier.success(ctx.success_message);
                Ok(MutationReport {
                    outcome,
                    value,
                    attempts: failures + 1,
                })
            }
            Err(err) => {
                txn.rollback();
                warn!(
                    "{} after {} attempt(s), rolled back: {} ({})",
                    ctx.failure_message, failures, err.message, err.kind
                );
                self.notifier.error(format!("{}: {}", ctx.failure_message, err.message));
                Err(err)
            }
        }
    }
}
