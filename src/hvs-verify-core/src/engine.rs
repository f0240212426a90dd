//! Host verification engine.
//!
//! Runs one verification task: resolves the host's flavorgroups, collects
//! its evidence once, evaluates it against each flavorgroup's policy and
//! builds a [`TrustReport`].
//!
//! A host is trusted only if it belongs to at least one flavorgroup and every
//! flavorgroup verdict is trusted.

use std::sync::Arc;

use hvs_flavor::evaluate;
use tracing::{debug, info, instrument};

use crate::collaborators::{EvidenceSource, MembershipLookup, PolicySource};
use crate::error::VerifyError;
use crate::types::{FlavorgroupVerdict, HostId, TrustReport};

/// Evaluates hosts against their flavorgroup policies.
pub struct VerificationEngine {
    membership: Arc<dyn MembershipLookup>,
    policies: Arc<dyn PolicySource>,
    evidence: Arc<dyn EvidenceSource>,
}

impl VerificationEngine {
    /// Create an engine.
    ///
    /// `policies` is normally a [`crate::cache::PolicyCache`].
    pub fn new(
        membership: Arc<dyn MembershipLookup>,
        policies: Arc<dyn PolicySource>,
        evidence: Arc<dyn EvidenceSource>,
    ) -> Self {
        Self {
            membership,
            policies,
            evidence,
        }
    }

    /// Verify one host against all of its flavorgroups.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Evidence`] if evidence collection failed, or a
    /// lookup error if membership or policy could not be resolved.
    #[instrument(skip(self))]
    pub async fn verify_host(&self, host_id: &str) -> Result<TrustReport, VerifyError> {
        let host_id: HostId = host_id.to_string();
        let flavorgroups = self.membership.flavorgroups_for_host(&host_id).await?;
        let evidence = self.evidence.evidence_for(&host_id).await?;
        debug!(
            flavorgroups = flavorgroups.len(),
            evidence = evidence.len(),
            "Collected host evidence"
        );

        let mut results = Vec::with_capacity(flavorgroups.len());
        for flavorgroup_id in flavorgroups {
            let (policy, ever_defined) = self.policies.policy_state_for(&flavorgroup_id).await?;
            let verdict = evaluate(&evidence, &policy, &ever_defined);
            debug!(
                flavorgroup_id = %flavorgroup_id,
                trusted = verdict.trusted,
                faults = verdict.faults.len(),
                "Flavorgroup evaluated"
            );
            results.push(FlavorgroupVerdict {
                flavorgroup_id,
                verdict,
            });
        }

        let report = TrustReport::new(host_id, results);
        info!(
            trusted = report.trusted,
            flavorgroups = report.results.len(),
            "Host verification complete"
        );
        Ok(report)
    }
}
