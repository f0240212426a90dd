//! Fault model and trust verdicts.
//!
//! Faults are the only explanation surface of an evaluation. They are built
//! fresh for every evaluation and never mutated afterwards.
//!
//! The serialized form is meant to evolve: empty fields are omitted on write,
//! and unknown fields or fault kinds are accepted on read.

use serde::{Deserialize, Serialize};

use crate::evidence::EvidencePart;
use crate::types::FlavorPart;

/// Specific reason a trust evaluation did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// A required part had no evidence at all.
    RequiredFlavorTypeMissing,
    /// An ALL_OF part had at least one instance that did not match.
    RuleAllOfFlavorsMissing,
    /// An ANY_OF part had instances but none of them matched.
    RuleNoMatchingFlavor,
    /// Fault kind written by a newer producer.
    #[serde(other)]
    Unknown,
}

impl FaultKind {
    /// Message template for this kind, with `{part}` as placeholder.
    #[must_use]
    pub const fn template(&self) -> &'static str {
        match self {
            Self::RequiredFlavorTypeMissing => "Required flavor type missing: {part}",
            Self::RuleAllOfFlavorsMissing => "All of the flavors of type {part} must match",
            Self::RuleNoMatchingFlavor => "No matching flavor found for flavor part {part}",
            Self::Unknown => "Unrecognized fault for flavor part {part}",
        }
    }

    fn render(&self, part: FlavorPart) -> String {
        self.template().replace("{part}", part.as_str())
    }
}

/// A single typed fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Fault variant.
    pub kind: FaultKind,

    /// Human-readable description. Names the part, never individual flavors.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Part the fault is about. Parts unknown to this version are kept
    /// as written.
    pub flavor_part: EvidencePart,

    /// Identifiers of the failed flavors behind a match-rule fault.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flavor_ids: Vec<String>,
}

impl Fault {
    fn with_kind(kind: FaultKind, part: FlavorPart, flavor_ids: Vec<String>) -> Self {
        Self {
            kind,
            message: kind.render(part),
            flavor_part: EvidencePart::Known(part),
            flavor_ids,
        }
    }

    /// `RequiredFlavorTypeMissing` for `part`.
    #[must_use]
    pub fn required_flavor_type_missing(part: FlavorPart) -> Self {
        Self::with_kind(FaultKind::RequiredFlavorTypeMissing, part, Vec::new())
    }

    /// `RuleAllOfFlavorsMissing` for `part`.
    #[must_use]
    pub fn all_of_flavors_missing(part: FlavorPart, failed_ids: Vec<String>) -> Self {
        Self::with_kind(FaultKind::RuleAllOfFlavorsMissing, part, failed_ids)
    }

    /// `RuleNoMatchingFlavor` for `part`.
    #[must_use]
    pub fn no_matching_flavor(part: FlavorPart, failed_ids: Vec<String>) -> Self {
        Self::with_kind(FaultKind::RuleNoMatchingFlavor, part, failed_ids)
    }

    /// The part, if it is in the known taxonomy.
    #[must_use]
    pub fn part(&self) -> Option<FlavorPart> {
        self.flavor_part.known()
    }
}

#[derive(Deserialize)]
struct VerdictDocument {
    #[serde(default)]
    faults: Vec<Fault>,
}

/// Outcome of one evaluation: ordered faults plus the derived trust flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VerdictDocument")]
pub struct TrustVerdict {
    /// True iff `faults` is empty.
    pub trusted: bool,
    /// Faults in canonical part order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<Fault>,
}

impl TrustVerdict {
    /// Build a verdict, deriving `trusted` from the fault list.
    #[must_use]
    pub fn from_faults(faults: Vec<Fault>) -> Self {
        Self {
            trusted: faults.is_empty(),
            faults,
        }
    }

    /// Faults for one part.
    pub fn faults_for(&self, part: FlavorPart) -> impl Iterator<Item = &Fault> {
        self.faults.iter().filter(move |f| f.part() == Some(part))
    }
}

impl From<VerdictDocument> for TrustVerdict {
    fn from(document: VerdictDocument) -> Self {
        Self::from_faults(document.faults)
    }
}
