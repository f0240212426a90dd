//! # hvs-flavor
//!
//! Flavor match policy engine for the host verification service.
//!
//! A host's collected attestation evidence ("flavors") is checked against a
//! per-flavorgroup [`FlavorMatchPolicyCollection`]. The result is a
//! [`TrustVerdict`]: an ordered, explainable list of [`Fault`]s plus a
//! trusted flag that is true only when the list is empty.
//!
//! ```text
//!   evidence ──► parse_evidence ──► evaluate ──► TrustVerdict
//!                 (drop malformed)     ▲
//!                                      │
//!        FlavorMatchPolicyCollection ──┤
//!        ever-defined parts ───────────┘
//! ```
//!
//! ## Properties
//!
//! - **Deterministic**: faults follow the canonical [`FlavorPart`] order,
//!   independent of evidence order
//! - **Pure**: no I/O and no shared state; safe to run concurrently
//! - **Forward-compatible**: unrecognized evidence categories never fail
//!   closed, while unrecognized or duplicate policy entries do

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod error;
mod evaluator;
mod evidence;
mod fault;
mod policy;
mod types;

pub use error::PolicyError;
pub use evaluator::{evaluate, evaluate_raw};
pub use evidence::{parse_evidence, EvidenceInstance, EvidencePart};
pub use fault::{Fault, FaultKind, TrustVerdict};
pub use policy::{FlavorMatchPolicy, FlavorMatchPolicyCollection};
pub use types::{FlavorPart, MatchPolicy, MatchType, Requiredness};
