//! Interfaces to the repositories and queues around the trust core.
//!
//! The core consumes these traits and never implements them for production;
//! [`crate::memory::InMemoryInventory`] is a reference implementation for
//! tooling and tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use hvs_flavor::{EvidenceInstance, FlavorMatchPolicyCollection, FlavorPart};

use crate::error::VerifyError;
use crate::types::{FlavorgroupId, HostId, HostStatus, TrustReport};

/// Host/flavorgroup membership repository.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    /// Hosts currently linked to a flavorgroup.
    async fn hosts_for_flavorgroup(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<BTreeSet<HostId>, VerifyError>;

    /// Flavorgroups a host currently belongs to.
    async fn flavorgroups_for_host(
        &self,
        host_id: &HostId,
    ) -> Result<BTreeSet<FlavorgroupId>, VerifyError>;
}

/// Owner of verification queue state.
#[async_trait]
pub trait QueueMembership: Send + Sync {
    /// Drop hosts already waiting in the queue.
    ///
    /// Must return `host_ids` unchanged when `force_update` is set.
    async fn hosts_not_already_queued(
        &self,
        host_ids: BTreeSet<HostId>,
        force_update: bool,
    ) -> Result<BTreeSet<HostId>, VerifyError>;
}

/// Host status repository.
#[async_trait]
pub trait HostStatusStore: Send + Sync {
    /// Set a host's status.
    async fn set_host_status(&self, host_id: &HostId, status: HostStatus)
        -> Result<(), VerifyError>;
}

/// Verification task queue.
#[async_trait]
pub trait VerificationQueue: Send + Sync {
    /// Submit a host for verification.
    async fn enqueue_for_verification(
        &self,
        host_id: &HostId,
        force_update: bool,
    ) -> Result<(), VerifyError>;
}

/// Flavorgroup policy catalog.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Current match policy collection of a flavorgroup.
    async fn policy_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<FlavorMatchPolicyCollection, VerifyError>;

    /// Parts the flavorgroup has ever had a flavor for.
    async fn ever_defined_parts_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<BTreeSet<FlavorPart>, VerifyError>;

    /// Policy and ever-defined parts taken from the same catalog state.
    ///
    /// Implementations that can change between the two lookups should
    /// override this.
    async fn policy_state_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<(FlavorMatchPolicyCollection, BTreeSet<FlavorPart>), VerifyError> {
        let policy = self.policy_for(flavorgroup_id).await?;
        let ever_defined = self.ever_defined_parts_for(flavorgroup_id).await?;
        Ok((policy, ever_defined))
    }
}

/// Evidence collection for a host.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Evidence collected for a host.
    async fn evidence_for(&self, host_id: &HostId) -> Result<Vec<EvidenceInstance>, VerifyError>;
}

/// Destination for finished trust reports.
#[async_trait]
pub trait TrustReportSink: Send + Sync {
    /// Hand a report to the reporting layer.
    async fn publish(&self, report: TrustReport) -> Result<(), VerifyError>;
}
