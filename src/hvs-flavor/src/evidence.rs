//! Collected evidence instances.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::FlavorPart;

/// Category tag carried by an evidence instance or a fault.
///
/// Evidence and serialized verdicts may come from producers newer than this
/// crate, so categories outside [`FlavorPart`] are kept as-is rather than
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvidencePart {
    /// A category in the known taxonomy.
    Known(FlavorPart),
    /// A category this version does not recognize.
    Unrecognized(String),
}

impl EvidencePart {
    /// The known part, if any.
    #[must_use]
    pub fn known(&self) -> Option<FlavorPart> {
        match self {
            Self::Known(part) => Some(*part),
            Self::Unrecognized(_) => None,
        }
    }
}

impl From<FlavorPart> for EvidencePart {
    fn from(part: FlavorPart) -> Self {
        Self::Known(part)
    }
}

impl From<String> for EvidencePart {
    fn from(name: String) -> Self {
        match name.parse::<FlavorPart>() {
            Ok(part) => Self::Known(part),
            Err(_) => Self::Unrecognized(name),
        }
    }
}

impl From<EvidencePart> for String {
    fn from(part: EvidencePart) -> Self {
        match part {
            EvidencePart::Known(part) => part.as_str().to_string(),
            EvidencePart::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for EvidencePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(part) => f.write_str(part.as_str()),
            Self::Unrecognized(name) => f.write_str(name),
        }
    }
}

/// One collected flavor for a host, already matched against its reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceInstance {
    /// Category of the flavor.
    pub flavor_part: EvidencePart,
    /// Whether the host's measurements matched this flavor.
    pub passed: bool,
    /// Flavor identifier.
    #[serde(alias = "flavor_id")]
    pub identifier: String,
}

impl EvidenceInstance {
    /// Evidence for a known part.
    pub fn new(part: FlavorPart, passed: bool, identifier: impl Into<String>) -> Self {
        Self {
            flavor_part: EvidencePart::Known(part),
            passed,
            identifier: identifier.into(),
        }
    }

    /// Known part of this instance, if recognized.
    #[must_use]
    pub fn part(&self) -> Option<FlavorPart> {
        self.flavor_part.known()
    }
}

/// Parse raw evidence values one at a time.
///
/// Values that fail to parse are logged and dropped; the remainder is
/// returned in input order.
pub fn parse_evidence(raw: &[serde_json::Value]) -> Vec<EvidenceInstance> {
    let mut parsed = Vec::with_capacity(raw.len());
    for (index, value) in raw.iter().enumerate() {
        match EvidenceInstance::deserialize(value) {
            Ok(instance) => parsed.push(instance),
            Err(e) => {
                warn!(index = index, error = %e, "Dropping malformed evidence instance");
            },
        }
    }
    debug!(
        total = raw.len(),
        parsed = parsed.len(),
        "Evidence parsed"
    );
    parsed
}
