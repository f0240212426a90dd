//! Flavor taxonomy: evidence categories and match rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Category of attestation evidence.
///
/// Declaration order is the canonical evaluation order. Fault lists are
/// emitted in this order regardless of how evidence arrived.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlavorPart {
    /// Platform firmware and BIOS measurements.
    Platform,
    /// Operating system and kernel measurements.
    Os,
    /// Measurements unique to a single host.
    HostUnique,
    /// Provisioned asset tag certificate.
    AssetTag,
    /// Application and software measurements.
    Software,
}

impl FlavorPart {
    /// Every part, in canonical order.
    pub const ALL: [FlavorPart; 5] = [
        Self::Platform,
        Self::Os,
        Self::HostUnique,
        Self::AssetTag,
        Self::Software,
    ];

    /// Wire name of this part.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "PLATFORM",
            Self::Os => "OS",
            Self::HostUnique => "HOST_UNIQUE",
            Self::AssetTag => "ASSET_TAG",
            Self::Software => "SOFTWARE",
        }
    }
}

impl fmt::Display for FlavorPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlavorPart {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|part| part.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| PolicyError::UnknownFlavorPart {
                name: s.to_string(),
            })
    }
}

/// How the evidence instances of one part combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Every instance of the part must pass.
    AllOf,
    /// At least one instance of the part must pass.
    AnyOf,
}

/// Whether a part must be present for a host to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Requiredness {
    /// The part must always have at least one instance.
    Required,
    /// The part must have an instance once the flavorgroup has ever defined it.
    RequiredIfDefined,
    /// Absence of the part is never a fault.
    Optional,
}

/// Per-part rule: a match type plus requiredness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// How instances combine.
    pub match_type: MatchType,
    /// Whether the part must be present.
    pub required: Requiredness,
}

impl MatchPolicy {
    /// Create a match policy.
    #[must_use]
    pub const fn new(match_type: MatchType, required: Requiredness) -> Self {
        Self {
            match_type,
            required,
        }
    }
}

impl Default for MatchPolicy {
    /// Parts without an explicit rule: `{ANY_OF, OPTIONAL}`.
    fn default() -> Self {
        Self::new(MatchType::AnyOf, Requiredness::Optional)
    }
}
