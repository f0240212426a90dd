//! Domain types for hosts, flavorgroups and trust reports.

use std::collections::BTreeSet;
use std::fmt;

use hvs_flavor::{FlavorMatchPolicyCollection, FlavorPart, TrustVerdict};
use serde::{Deserialize, Serialize};

/// Host identifier.
pub type HostId = String;

/// Flavorgroup identifier.
pub type FlavorgroupId = String;

/// Connection and verification status of a host.
///
/// Owned by the host repository; the dispatcher and worker only set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostStatus {
    /// Waiting in the verification queue.
    Queued,
    /// Reachable and verified at least once.
    Connected,
    /// Evidence could not be collected.
    ConnectionFailure,
    /// Never contacted.
    #[default]
    Unknown,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "QUEUED",
            Self::Connected => "CONNECTED",
            Self::ConnectionFailure => "CONNECTION_FAILURE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A registered host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Host identifier.
    pub id: HostId,
    /// Flavorgroups this host belongs to.
    #[serde(default)]
    pub flavorgroup_ids: BTreeSet<FlavorgroupId>,
    /// Current status.
    #[serde(default)]
    pub status: HostStatus,
}

/// A named set of hosts sharing one trust policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavorgroup {
    /// Flavorgroup identifier.
    pub id: FlavorgroupId,
    /// Match policy for every member host.
    #[serde(default)]
    pub policy: FlavorMatchPolicyCollection,
    /// Parts this flavorgroup has ever had a flavor for.
    #[serde(default)]
    pub ever_defined_parts: BTreeSet<FlavorPart>,
    /// Member hosts.
    #[serde(default)]
    pub member_host_ids: BTreeSet<HostId>,
}

/// Verdict of one host against one flavorgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorgroupVerdict {
    /// Flavorgroup evaluated.
    pub flavorgroup_id: FlavorgroupId,
    /// Its verdict.
    pub verdict: TrustVerdict,
}

/// Trust report for one host, consumed by the reporting layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustReport {
    /// Host evaluated.
    pub host_id: HostId,
    /// True iff the host belongs to at least one flavorgroup and every verdict is trusted.
    pub trusted: bool,
    /// Per-flavorgroup verdicts in flavorgroup id order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FlavorgroupVerdict>,
    /// Generation time (Unix seconds).
    pub generated_at: i64,
}

impl TrustReport {
    /// Build a report from per-flavorgroup verdicts.
    #[must_use]
    pub fn new(host_id: HostId, results: Vec<FlavorgroupVerdict>) -> Self {
        let trusted = !results.is_empty() && results.iter().all(|r| r.verdict.trusted);
        Self {
            host_id,
            trusted,
            results,
            generated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A host that could not be processed during a dispatch batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    /// Host that failed.
    pub host_id: HostId,
    /// What went wrong.
    pub reason: String,
}

/// Result of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Flavorgroup that triggered the dispatch.
    pub flavorgroup_id: FlavorgroupId,
    /// Whether already-queued hosts were re-queued.
    pub force_update: bool,
    /// Member hosts resolved before filtering.
    pub resolved: usize,
    /// Hosts set to QUEUED and enqueued, in id order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queued: Vec<HostId>,
    /// Hosts skipped because a collaborator failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<HostFailure>,
}

impl DispatchOutcome {
    pub(crate) fn empty(flavorgroup_id: &str, force_update: bool) -> Self {
        Self {
            flavorgroup_id: flavorgroup_id.to_string(),
            force_update,
            ..Self::default()
        }
    }
}
