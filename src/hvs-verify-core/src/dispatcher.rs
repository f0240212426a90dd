//! Verification queue dispatcher.
//!
//! Decides which hosts of a flavorgroup need re-verification after a policy
//! or membership change and submits them to the verification queue:
//!
//! 1. Resolve the flavorgroup's member hosts
//! 2. Unless forced, drop hosts already waiting in the queue
//! 3. Set every remaining host to `QUEUED`
//! 4. Enqueue every host whose status update succeeded; a host that cannot
//!    be enqueued is set back to `UNKNOWN` so a later dispatch picks it up
//!
//! ## Concurrency
//!
//! All four steps run under one mutex owned by the dispatcher, so two
//! triggers cannot both see a host as "not yet queued" and enqueue it twice.
//! The lock is coarse (not per flavorgroup); dispatch is driven by
//! administrative changes, not steady-state traffic.
//!
//! Per-host failures in steps 3 and 4 are logged and recorded in the
//! [`DispatchOutcome`]; the rest of the batch continues.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{HostStatusStore, MembershipLookup, QueueMembership, VerificationQueue};
use crate::error::VerifyError;
use crate::types::{DispatchOutcome, FlavorgroupId, HostFailure, HostId, HostStatus};

/// Selects hosts for re-verification and queues each at most once per trigger.
pub struct VerificationDispatcher {
    membership: Arc<dyn MembershipLookup>,
    queue_state: Arc<dyn QueueMembership>,
    status_store: Arc<dyn HostStatusStore>,
    queue: Arc<dyn VerificationQueue>,
    /// Serializes whole dispatch operations.
    lock: Mutex<()>,
}

impl VerificationDispatcher {
    /// Create a dispatcher over its collaborators.
    pub fn new(
        membership: Arc<dyn MembershipLookup>,
        queue_state: Arc<dyn QueueMembership>,
        status_store: Arc<dyn HostStatusStore>,
        queue: Arc<dyn VerificationQueue>,
    ) -> Self {
        Self {
            membership,
            queue_state,
            status_store,
            queue,
            lock: Mutex::new(()),
        }
    }

    /// Queue the members of a flavorgroup for verification.
    ///
    /// # Errors
    ///
    /// Returns error only if membership resolution or the already-queued
    /// filter fails; nothing has been changed in that case. Failures for
    /// individual hosts are reported in [`DispatchOutcome::failed`].
    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        flavorgroup_id: &str,
        force_update: bool,
    ) -> Result<DispatchOutcome, VerifyError> {
        let _guard = self.lock.lock().await;
        let flavorgroup_id: FlavorgroupId = flavorgroup_id.to_string();
        let mut outcome = DispatchOutcome::empty(&flavorgroup_id, force_update);

        let members = self.membership.hosts_for_flavorgroup(&flavorgroup_id).await?;
        outcome.resolved = members.len();
        if members.is_empty() {
            debug!("Flavorgroup has no member hosts, nothing to dispatch");
            return Ok(outcome);
        }

        let pending = if force_update {
            members
        } else {
            self.queue_state
                .hosts_not_already_queued(members, false)
                .await?
        };
        if pending.is_empty() {
            debug!(
                resolved = outcome.resolved,
                "All member hosts already queued"
            );
            return Ok(outcome);
        }

        // Status first, so no task ever sees a queued host that is not QUEUED.
        let mut ready: Vec<HostId> = Vec::with_capacity(pending.len());
        for host_id in pending {
            match self
                .status_store
                .set_host_status(&host_id, HostStatus::Queued)
                .await
            {
                Ok(()) => ready.push(host_id),
                Err(e) => {
                    warn!(host_id = %host_id, error = %e, "Failed to set host status to QUEUED");
                    outcome.failed.push(HostFailure {
                        host_id,
                        reason: e.to_string(),
                    });
                },
            }
        }

        for host_id in ready {
            match self
                .queue
                .enqueue_for_verification(&host_id, force_update)
                .await
            {
                Ok(()) => outcome.queued.push(host_id),
                Err(e) => {
                    warn!(host_id = %host_id, error = %e, "Failed to enqueue host for verification");
                    // No task exists for this host, so it must not stay QUEUED.
                    if let Err(reset) = self
                        .status_store
                        .set_host_status(&host_id, HostStatus::Unknown)
                        .await
                    {
                        warn!(
                            host_id = %host_id,
                            error = %reset,
                            "Failed to reset status of unqueued host"
                        );
                    }
                    outcome.failed.push(HostFailure {
                        host_id,
                        reason: e.to_string(),
                    });
                },
            }
        }

        info!(
            force_update = force_update,
            resolved = outcome.resolved,
            queued = outcome.queued.len(),
            failed = outcome.failed.len(),
            "Dispatch complete"
        );
        Ok(outcome)
    }

    /// Run [`dispatch`](Self::dispatch) as a background task.
    ///
    /// The caller is not blocked beyond task submission; the returned handle
    /// reports completion and the outcome.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        flavorgroup_id: impl Into<FlavorgroupId>,
        force_update: bool,
    ) -> DispatchHandle {
        let flavorgroup_id = flavorgroup_id.into();
        let dispatcher = Arc::clone(self);
        let task_flavorgroup = flavorgroup_id.clone();
        let handle = tokio::spawn(async move {
            dispatcher
                .dispatch(&task_flavorgroup, force_update)
                .await
        });
        DispatchHandle {
            flavorgroup_id,
            handle,
        }
    }
}

/// Handle to a dispatch running in the background.
pub struct DispatchHandle {
    flavorgroup_id: FlavorgroupId,
    handle: JoinHandle<Result<DispatchOutcome, VerifyError>>,
}

impl DispatchHandle {
    /// Flavorgroup this dispatch was triggered for.
    pub fn flavorgroup_id(&self) -> &str {
        &self.flavorgroup_id
    }

    /// Whether the dispatch has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the dispatch to complete.
    ///
    /// # Errors
    ///
    /// Returns the dispatch error, or [`VerifyError::TaskFailed`] if the task
    /// panicked or was aborted.
    pub async fn wait(self) -> Result<DispatchOutcome, VerifyError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(VerifyError::TaskFailed {
                message: format!("dispatch for {}: {}", self.flavorgroup_id, e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryInventory;

    fn dispatcher(inventory: &Arc<InMemoryInventory>) -> Arc<VerificationDispatcher> {
        Arc::new(VerificationDispatcher::new(
            inventory.clone(),
            inventory.clone(),
            inventory.clone(),
            inventory.clone(),
        ))
    }

    #[tokio::test]
    async fn test_empty_membership_has_no_side_effects() {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.add_flavorgroup("fg-empty", Default::default());
        let dispatcher = dispatcher(&inventory);

        let outcome = dispatcher.dispatch("fg-empty", true).await.unwrap();

        assert_eq!(outcome.resolved, 0);
        assert!(outcome.queued.is_empty());
        assert_eq!(inventory.status_updates(), 0);
        assert!(inventory.queued_hosts().is_empty());
    }

    #[tokio::test]
    async fn test_second_dispatch_skips_queued_hosts() {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.add_flavorgroup("fg", Default::default());
        inventory.add_host("h1", ["fg"]);
        inventory.add_host("h2", ["fg"]);
        let dispatcher = dispatcher(&inventory);

        let first = dispatcher.dispatch("fg", false).await.unwrap();
        let second = dispatcher.dispatch("fg", false).await.unwrap();

        assert_eq!(first.queued, vec!["h1".to_string(), "h2".to_string()]);
        assert_eq!(second.resolved, 2);
        assert!(second.queued.is_empty());
        assert_eq!(inventory.queued_hosts().len(), 2);
        assert_eq!(inventory.host_status("h1"), Some(HostStatus::Queued));
    }

    #[tokio::test]
    async fn test_force_update_requeues_everything() {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.add_flavorgroup("fg", Default::default());
        inventory.add_host("h1", ["fg"]);
        inventory.add_host("h2", ["fg"]);
        let dispatcher = dispatcher(&inventory);

        dispatcher.dispatch("fg", false).await.unwrap();
        let forced = dispatcher.dispatch("fg", true).await.unwrap();

        assert_eq!(forced.queued.len(), 2);
        assert!(forced.force_update);
        assert_eq!(inventory.enqueue_count(), 4);
    }

    #[tokio::test]
    async fn test_spawned_dispatch_reports_completion() {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.add_flavorgroup("fg", Default::default());
        inventory.add_host("h1", ["fg"]);
        let dispatcher = dispatcher(&inventory);

        let handle = dispatcher.spawn_dispatch("fg", false);
        assert_eq!(handle.flavorgroup_id(), "fg");
        let outcome = handle.wait().await.unwrap();

        assert_eq!(outcome.queued, vec!["h1".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_flavorgroup_is_an_error() {
        let inventory = Arc::new(InMemoryInventory::new());
        let dispatcher = dispatcher(&inventory);

        let result = dispatcher.dispatch("missing", false).await;
        assert!(matches!(result, Err(VerifyError::Membership { .. })));
    }
}
