//! Verification service wiring and change-event entry points.
//!
//! Builds the policy cache, verification worker and dispatcher from a
//! [`ServiceConfig`] and a set of collaborators. Flavor and flavorgroup
//! changes enter through [`VerificationService::on_flavor_updated`] and
//! [`VerificationService::on_flavorgroup_updated`], which invalidate the
//! cached policy and trigger a dispatch without blocking the caller.

use std::sync::Arc;

use tracing::info;

use crate::cache::PolicyCache;
use crate::collaborators::{
    EvidenceSource, HostStatusStore, MembershipLookup, PolicySource, QueueMembership,
    TrustReportSink,
};
use crate::config::ServiceConfig;
use crate::dispatcher::{DispatchHandle, VerificationDispatcher};
use crate::engine::VerificationEngine;
use crate::error::VerifyError;
use crate::types::DispatchOutcome;
use crate::worker::{self, VerificationWorker, WorkerHandle};

/// External collaborators the service runs against.
#[derive(Clone)]
pub struct Collaborators {
    /// Host/flavorgroup membership.
    pub membership: Arc<dyn MembershipLookup>,
    /// Verification queue state.
    pub queue_state: Arc<dyn QueueMembership>,
    /// Host status repository.
    pub status_store: Arc<dyn HostStatusStore>,
    /// Flavorgroup policy catalog.
    pub policies: Arc<dyn PolicySource>,
    /// Evidence collection.
    pub evidence: Arc<dyn EvidenceSource>,
    /// Trust report consumer.
    pub sink: Arc<dyn TrustReportSink>,
}

/// Running trust core: cache, dispatcher and worker.
pub struct VerificationService {
    cache: Arc<PolicyCache>,
    dispatcher: Arc<VerificationDispatcher>,
}

impl VerificationService {
    /// Build the service and start its verification worker.
    ///
    /// Dropping the service (and any outstanding [`DispatchHandle`]s) closes
    /// the queue; the returned [`WorkerHandle`] then finishes once the
    /// remaining tasks are processed.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] if the configuration is invalid.
    pub fn start(
        config: &ServiceConfig,
        collaborators: Collaborators,
    ) -> Result<(Self, WorkerHandle), VerifyError> {
        config.validate()?;
        info!(
            policy_cache_ttl_secs = config.policy_cache_ttl_secs,
            worker_concurrency = config.worker_concurrency,
            queue_capacity = config.queue_capacity,
            "VerificationService: starting"
        );

        let cache = Arc::new(PolicyCache::new(
            collaborators.policies,
            config.policy_cache_ttl(),
        ));
        let engine = Arc::new(VerificationEngine::new(
            collaborators.membership.clone(),
            cache.clone(),
            collaborators.evidence,
        ));

        let (queue, receiver) = worker::channel(config.queue_capacity);
        let worker = VerificationWorker::new(
            engine,
            collaborators.status_store.clone(),
            collaborators.sink,
            config.worker_concurrency,
        )
        .spawn(receiver);

        let dispatcher = Arc::new(VerificationDispatcher::new(
            collaborators.membership,
            collaborators.queue_state,
            collaborators.status_store,
            Arc::new(queue),
        ));

        Ok((Self { cache, dispatcher }, worker))
    }

    /// The shared policy cache.
    pub fn cache(&self) -> &Arc<PolicyCache> {
        &self.cache
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Arc<VerificationDispatcher> {
        &self.dispatcher
    }

    /// A flavorgroup's policy was replaced: re-verify every member host.
    pub fn on_flavorgroup_updated(&self, flavorgroup_id: &str) -> DispatchHandle {
        info!(flavorgroup_id = %flavorgroup_id, "Flavorgroup updated, forcing re-verification");
        self.cache.invalidate(flavorgroup_id);
        self.dispatcher.spawn_dispatch(flavorgroup_id, true)
    }

    /// A flavor in a flavorgroup changed: queue member hosts not already queued.
    pub fn on_flavor_updated(&self, flavorgroup_id: &str) -> DispatchHandle {
        info!(flavorgroup_id = %flavorgroup_id, "Flavor updated, queueing re-verification");
        self.cache.invalidate(flavorgroup_id);
        self.dispatcher.spawn_dispatch(flavorgroup_id, false)
    }

    /// Dispatch a flavorgroup inline and wait for the outcome.
    ///
    /// # Errors
    ///
    /// See [`VerificationDispatcher::dispatch`].
    pub async fn dispatch(
        &self,
        flavorgroup_id: &str,
        force_update: bool,
    ) -> Result<DispatchOutcome, VerifyError> {
        self.dispatcher.dispatch(flavorgroup_id, force_update).await
    }
}
