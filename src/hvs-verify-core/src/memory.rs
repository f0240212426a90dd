//! In-memory host inventory.
//!
//! Implements every collaborator trait over a single mutex-guarded state.
//! Used by the `hvs-verify` CLI and by tests; it is not a persistence layer.
//!
//! "Already queued" means the host's status is `QUEUED`. Hosts enqueued here
//! are recorded in submission order so callers can inspect them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use hvs_flavor::{parse_evidence, EvidenceInstance, FlavorMatchPolicyCollection, FlavorPart};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collaborators::{
    EvidenceSource, HostStatusStore, MembershipLookup, PolicySource, QueueMembership,
    TrustReportSink, VerificationQueue,
};
use crate::error::VerifyError;
use crate::types::{Flavorgroup, FlavorgroupId, Host, HostId, HostStatus, TrustReport};

/// Serializable inventory contents.
///
/// Evidence is kept raw so that malformed entries are dropped per instance
/// when loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// Registered hosts.
    #[serde(default)]
    pub hosts: Vec<Host>,
    /// Flavorgroups with their policies.
    #[serde(default)]
    pub flavorgroups: Vec<Flavorgroup>,
    /// Raw evidence per host.
    #[serde(default)]
    pub evidence: BTreeMap<HostId, Vec<serde_json::Value>>,
}

#[derive(Debug, Default)]
struct InventoryState {
    hosts: BTreeMap<HostId, Host>,
    flavorgroups: BTreeMap<FlavorgroupId, Flavorgroup>,
    evidence: HashMap<HostId, Vec<EvidenceInstance>>,
    submitted: Vec<(HostId, bool)>,
    reports: Vec<TrustReport>,
    status_updates: usize,
    failing_status: BTreeSet<HostId>,
    failing_enqueue: BTreeSet<HostId>,
    unreachable: BTreeSet<HostId>,
}

/// Reference implementation of every collaborator interface.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    state: Mutex<InventoryState>,
}

impl InMemoryInventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from a snapshot.
    ///
    /// Membership given on either side (host or flavorgroup) is linked both
    /// ways.
    pub fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        let inventory = Self::new();
        {
            let mut state = inventory.state();
            for flavorgroup in snapshot.flavorgroups {
                state.flavorgroups.insert(flavorgroup.id.clone(), flavorgroup);
            }
            for host in snapshot.hosts {
                state.hosts.insert(host.id.clone(), host);
            }

            let links: Vec<(HostId, FlavorgroupId)> = state
                .hosts
                .values()
                .flat_map(|h| h.flavorgroup_ids.iter().map(|fg| (h.id.clone(), fg.clone())))
                .chain(state.flavorgroups.values().flat_map(|fg| {
                    fg.member_host_ids
                        .iter()
                        .map(|h| (h.clone(), fg.id.clone()))
                }))
                .collect();
            for (host_id, flavorgroup_id) in links {
                link(&mut state, &host_id, &flavorgroup_id);
            }

            for (host_id, raw) in snapshot.evidence {
                let parsed = parse_evidence(&raw);
                state.evidence.insert(host_id, parsed);
            }
            info!(
                hosts = state.hosts.len(),
                flavorgroups = state.flavorgroups.len(),
                "Inventory loaded"
            );
        }
        inventory
    }

    /// Parse a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON or an invalid policy collection.
    pub fn from_json(json: &str) -> Result<Self, VerifyError> {
        let snapshot: InventorySnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    fn state(&self) -> MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a flavorgroup with no members.
    pub fn add_flavorgroup(&self, id: &str, policy: FlavorMatchPolicyCollection) {
        let mut state = self.state();
        let ever_defined = policy.entries().map(|e| e.flavor_part).collect();
        state.flavorgroups.insert(
            id.to_string(),
            Flavorgroup {
                id: id.to_string(),
                policy,
                ever_defined_parts: ever_defined,
                member_host_ids: BTreeSet::new(),
            },
        );
    }

    /// Replace a flavorgroup's policy wholesale.
    pub fn update_policy(&self, id: &str, policy: FlavorMatchPolicyCollection) {
        let mut state = self.state();
        if let Some(flavorgroup) = state.flavorgroups.get_mut(id) {
            flavorgroup
                .ever_defined_parts
                .extend(policy.entries().map(|e| e.flavor_part));
            flavorgroup.policy = policy;
        }
    }

    /// Record that a flavorgroup has defined flavors of these parts.
    pub fn set_ever_defined(&self, id: &str, parts: impl IntoIterator<Item = FlavorPart>) {
        let mut state = self.state();
        if let Some(flavorgroup) = state.flavorgroups.get_mut(id) {
            flavorgroup.ever_defined_parts = parts.into_iter().collect();
        }
    }

    /// Register a host and link it to flavorgroups.
    pub fn add_host<'a>(&self, id: &str, flavorgroups: impl IntoIterator<Item = &'a str>) {
        let mut state = self.state();
        state.hosts.entry(id.to_string()).or_insert_with(|| Host {
            id: id.to_string(),
            flavorgroup_ids: BTreeSet::new(),
            status: HostStatus::Unknown,
        });
        for flavorgroup_id in flavorgroups {
            link(&mut state, id, flavorgroup_id);
        }
    }

    /// Replace a host's evidence.
    pub fn set_evidence(&self, host_id: &str, evidence: Vec<EvidenceInstance>) {
        self.state().evidence.insert(host_id.to_string(), evidence);
    }

    /// Make status updates for a host fail.
    pub fn fail_status_updates_for(&self, host_id: &str) {
        self.state().failing_status.insert(host_id.to_string());
    }

    /// Make enqueueing a host fail.
    pub fn fail_enqueue_for(&self, host_id: &str) {
        self.state().failing_enqueue.insert(host_id.to_string());
    }

    /// Let enqueueing a host succeed again.
    pub fn restore_enqueue_for(&self, host_id: &str) {
        self.state().failing_enqueue.remove(host_id);
    }

    /// Make evidence collection for a host fail.
    pub fn mark_unreachable(&self, host_id: &str) {
        self.state().unreachable.insert(host_id.to_string());
    }

    /// Current status of a host.
    pub fn host_status(&self, host_id: &str) -> Option<HostStatus> {
        self.state().hosts.get(host_id).map(|h| h.status)
    }

    /// Successful status updates so far.
    pub fn status_updates(&self) -> usize {
        self.state().status_updates
    }

    /// Hosts submitted for verification, in order.
    pub fn queued_hosts(&self) -> Vec<HostId> {
        self.state()
            .submitted
            .iter()
            .map(|(host_id, _)| host_id.clone())
            .collect()
    }

    /// Number of successful submissions.
    pub fn enqueue_count(&self) -> usize {
        self.state().submitted.len()
    }

    /// Reports published so far.
    pub fn reports(&self) -> Vec<TrustReport> {
        self.state().reports.clone()
    }
}

fn link(state: &mut InventoryState, host_id: &str, flavorgroup_id: &str) {
    if let Some(host) = state.hosts.get_mut(host_id) {
        host.flavorgroup_ids.insert(flavorgroup_id.to_string());
    }
    if let Some(flavorgroup) = state.flavorgroups.get_mut(flavorgroup_id) {
        flavorgroup.member_host_ids.insert(host_id.to_string());
    }
}

#[async_trait]
impl MembershipLookup for InMemoryInventory {
    async fn hosts_for_flavorgroup(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<BTreeSet<HostId>, VerifyError> {
        self.state()
            .flavorgroups
            .get(flavorgroup_id)
            .map(|fg| fg.member_host_ids.clone())
            .ok_or_else(|| VerifyError::Membership {
                id: flavorgroup_id.clone(),
                message: "unknown flavorgroup".into(),
            })
    }

    async fn flavorgroups_for_host(
        &self,
        host_id: &HostId,
    ) -> Result<BTreeSet<FlavorgroupId>, VerifyError> {
        self.state()
            .hosts
            .get(host_id)
            .map(|h| h.flavorgroup_ids.clone())
            .ok_or_else(|| VerifyError::Membership {
                id: host_id.clone(),
                message: "unknown host".into(),
            })
    }
}

#[async_trait]
impl QueueMembership for InMemoryInventory {
    async fn hosts_not_already_queued(
        &self,
        host_ids: BTreeSet<HostId>,
        force_update: bool,
    ) -> Result<BTreeSet<HostId>, VerifyError> {
        if force_update {
            return Ok(host_ids);
        }
        let state = self.state();
        Ok(host_ids
            .into_iter()
            .filter(|id| {
                state
                    .hosts
                    .get(id)
                    .map_or(true, |h| h.status != HostStatus::Queued)
            })
            .collect())
    }
}

#[async_trait]
impl HostStatusStore for InMemoryInventory {
    async fn set_host_status(
        &self,
        host_id: &HostId,
        status: HostStatus,
    ) -> Result<(), VerifyError> {
        let mut state = self.state();
        if state.failing_status.contains(host_id) {
            return Err(VerifyError::HostStatus {
                host_id: host_id.clone(),
                message: "status store rejected update".into(),
            });
        }
        let host = state
            .hosts
            .get_mut(host_id)
            .ok_or_else(|| VerifyError::HostStatus {
                host_id: host_id.clone(),
                message: "unknown host".into(),
            })?;
        host.status = status;
        state.status_updates += 1;
        debug!(host_id = %host_id, status = %status, "Host status updated");
        Ok(())
    }
}

#[async_trait]
impl VerificationQueue for InMemoryInventory {
    async fn enqueue_for_verification(
        &self,
        host_id: &HostId,
        force_update: bool,
    ) -> Result<(), VerifyError> {
        let mut state = self.state();
        if state.failing_enqueue.contains(host_id) {
            return Err(VerifyError::Enqueue {
                host_id: host_id.clone(),
                message: "queue rejected host".into(),
            });
        }
        state.submitted.push((host_id.clone(), force_update));
        Ok(())
    }
}

#[async_trait]
impl PolicySource for InMemoryInventory {
    async fn policy_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<FlavorMatchPolicyCollection, VerifyError> {
        self.state()
            .flavorgroups
            .get(flavorgroup_id)
            .map(|fg| fg.policy.clone())
            .ok_or_else(|| VerifyError::PolicyLookup {
                flavorgroup_id: flavorgroup_id.clone(),
                message: "unknown flavorgroup".into(),
            })
    }

    async fn ever_defined_parts_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<BTreeSet<FlavorPart>, VerifyError> {
        self.state()
            .flavorgroups
            .get(flavorgroup_id)
            .map(|fg| fg.ever_defined_parts.clone())
            .ok_or_else(|| VerifyError::PolicyLookup {
                flavorgroup_id: flavorgroup_id.clone(),
                message: "unknown flavorgroup".into(),
            })
    }

    async fn policy_state_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<(FlavorMatchPolicyCollection, BTreeSet<FlavorPart>), VerifyError> {
        self.state()
            .flavorgroups
            .get(flavorgroup_id)
            .map(|fg| (fg.policy.clone(), fg.ever_defined_parts.clone()))
            .ok_or_else(|| VerifyError::PolicyLookup {
                flavorgroup_id: flavorgroup_id.clone(),
                message: "unknown flavorgroup".into(),
            })
    }
}

#[async_trait]
impl EvidenceSource for InMemoryInventory {
    async fn evidence_for(&self, host_id: &HostId) -> Result<Vec<EvidenceInstance>, VerifyError> {
        let state = self.state();
        if state.unreachable.contains(host_id) {
            return Err(VerifyError::Evidence {
                host_id: host_id.clone(),
                message: "host unreachable".into(),
            });
        }
        Ok(state.evidence.get(host_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TrustReportSink for InMemoryInventory {
    async fn publish(&self, report: TrustReport) -> Result<(), VerifyError> {
        self.state().reports.push(report);
        Ok(())
    }
}
