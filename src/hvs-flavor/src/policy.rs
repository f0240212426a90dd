//! Flavor match policy collections.
//!
//! A collection maps each [`FlavorPart`] to at most one [`MatchPolicy`]. Parts
//! without an entry fall back to [`MatchPolicy::default`]. Collections are
//! built once per flavorgroup and replaced wholesale on update; there is no
//! partial mutation API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::types::{FlavorPart, MatchPolicy, MatchType, Requiredness};

/// A single `part -> policy` entry as it appears in policy documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorMatchPolicy {
    /// Evidence category the rule applies to.
    pub flavor_part: FlavorPart,
    /// Rule for that category.
    pub match_policy: MatchPolicy,
}

impl FlavorMatchPolicy {
    /// Create an entry.
    #[must_use]
    pub const fn new(flavor_part: FlavorPart, match_type: MatchType, required: Requiredness) -> Self {
        Self {
            flavor_part,
            match_policy: MatchPolicy::new(match_type, required),
        }
    }
}

/// Wire shape of a policy collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    flavor_match_policies: Vec<FlavorMatchPolicy>,
}

/// Immutable mapping from flavor part to match policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyDocument", into = "PolicyDocument")]
pub struct FlavorMatchPolicyCollection {
    policies: BTreeMap<FlavorPart, MatchPolicy>,
}

impl FlavorMatchPolicyCollection {
    /// Build a collection from explicit entries.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::DuplicateFlavorPart`] if any part appears twice.
    pub fn new(
        entries: impl IntoIterator<Item = FlavorMatchPolicy>,
    ) -> Result<Self, PolicyError> {
        let mut policies = BTreeMap::new();
        for entry in entries {
            if policies
                .insert(entry.flavor_part, entry.match_policy)
                .is_some()
            {
                return Err(PolicyError::DuplicateFlavorPart {
                    part: entry.flavor_part,
                });
            }
        }
        Ok(Self { policies })
    }

    /// Collection with no explicit rules; every part uses the default.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a policy document.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, unknown parts or duplicate parts.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = serde_json::from_str(json)?;
        Self::try_from(document)
    }

    /// Resolve the effective policy for a part.
    #[must_use]
    pub fn policy_for(&self, part: FlavorPart) -> MatchPolicy {
        self.policies.get(&part).copied().unwrap_or_default()
    }

    /// Whether the part has an explicit rule.
    #[must_use]
    pub fn has_explicit(&self, part: FlavorPart) -> bool {
        self.policies.contains_key(&part)
    }

    /// Explicit entries in canonical part order.
    pub fn entries(&self) -> impl Iterator<Item = FlavorMatchPolicy> + '_ {
        self.policies.iter().map(|(part, policy)| FlavorMatchPolicy {
            flavor_part: *part,
            match_policy: *policy,
        })
    }

    /// Number of explicit entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when no part has an explicit rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl TryFrom<PolicyDocument> for FlavorMatchPolicyCollection {
    type Error = PolicyError;

    fn try_from(document: PolicyDocument) -> Result<Self, Self::Error> {
        Self::new(document.flavor_match_policies)
    }
}

impl From<FlavorMatchPolicyCollection> for PolicyDocument {
    fn from(collection: FlavorMatchPolicyCollection) -> Self {
        Self {
            flavor_match_policies: collection.entries().collect(),
        }
    }
}
