//! Flavor match policy evaluation.
//!
//! ## Algorithm
//!
//! For each [`FlavorPart`] in canonical order:
//!
//! 1. Resolve the part's [`MatchPolicy`] (explicit entry or default)
//! 2. Partition the part's evidence into passed and failed
//! 3. Requiredness: a `REQUIRED` part with no evidence, or a
//!    `REQUIRED_IF_DEFINED` part that was ever defined and has no evidence,
//!    yields `RequiredFlavorTypeMissing`
//! 4. Match type (only when evidence exists): `ALL_OF` with any failure
//!    yields `RuleAllOfFlavorsMissing`; `ANY_OF` with no pass yields
//!    `RuleNoMatchingFlavor`
//!
//! Every part is evaluated; there is no early exit. The evaluator is a pure
//! function and may run on any number of threads at once.

use std::collections::BTreeSet;

use tracing::trace;

use crate::evidence::{parse_evidence, EvidenceInstance};
use crate::fault::{Fault, TrustVerdict};
use crate::policy::FlavorMatchPolicyCollection;
use crate::types::{FlavorPart, MatchType, Requiredness};

/// Evaluate collected evidence against a policy collection.
///
/// `ever_defined` holds the parts the flavorgroup has ever had a flavor for;
/// it only matters for `REQUIRED_IF_DEFINED` rules. Evidence with
/// unrecognized parts is ignored.
#[must_use]
pub fn evaluate(
    evidence: &[EvidenceInstance],
    policy: &FlavorMatchPolicyCollection,
    ever_defined: &BTreeSet<FlavorPart>,
) -> TrustVerdict {
    let mut faults = Vec::new();

    for part in FlavorPart::ALL {
        let rule = policy.policy_for(part);

        let mut passed = 0usize;
        let mut failed_ids = Vec::new();
        for instance in evidence.iter().filter(|e| e.part() == Some(part)) {
            if instance.passed {
                passed += 1;
            } else {
                failed_ids.push(instance.identifier.clone());
            }
        }
        // Arrival order must not leak into the verdict.
        failed_ids.sort();
        let total = passed + failed_ids.len();

        let required = match rule.required {
            Requiredness::Required => true,
            Requiredness::RequiredIfDefined => ever_defined.contains(&part),
            Requiredness::Optional => false,
        };
        if required && total == 0 {
            faults.push(Fault::required_flavor_type_missing(part));
        }

        if total > 0 {
            match rule.match_type {
                MatchType::AllOf if !failed_ids.is_empty() => {
                    faults.push(Fault::all_of_flavors_missing(part, failed_ids));
                },
                MatchType::AnyOf if passed == 0 => {
                    faults.push(Fault::no_matching_flavor(part, failed_ids));
                },
                _ => {},
            }
        }

        trace!(part = %part, total = total, passed = passed, "Evaluated flavor part");
    }

    TrustVerdict::from_faults(faults)
}

/// Parse raw evidence values and evaluate the ones that parse.
///
/// Malformed values are dropped (see [`parse_evidence`]); the verdict is
/// always produced.
#[must_use]
pub fn evaluate_raw(
    raw: &[serde_json::Value],
    policy: &FlavorMatchPolicyCollection,
    ever_defined: &BTreeSet<FlavorPart>,
) -> TrustVerdict {
    let evidence = parse_evidence(raw);
    evaluate(&evidence, policy, ever_defined)
}
