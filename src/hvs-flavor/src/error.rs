//! Policy configuration error types.

use thiserror::Error;

use crate::types::FlavorPart;

/// Errors raised while building or loading a flavor match policy collection.
///
/// These are contract violations in configuration. Evidence problems never
/// surface here; they degrade the evaluation instead.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The same part was given more than one match policy.
    #[error("Duplicate match policy for flavor part {part}")]
    DuplicateFlavorPart {
        /// The repeated part.
        part: FlavorPart,
    },

    /// A policy named a part outside the known taxonomy.
    #[error("Unknown flavor part: {name}")]
    UnknownFlavorPart {
        /// The unrecognized name.
        name: String,
    },

    /// Policy document could not be parsed.
    #[error("Invalid policy document: {0}")]
    Json(#[from] serde_json::Error),
}
