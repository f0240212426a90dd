//! # hvs-verify-core
//!
//! Trust-decision core of the host verification service: decides which
//! hosts need re-verification when policy or membership changes, queues
//! each at most once per trigger, and evaluates queued hosts against their
//! flavorgroup policies.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  VerificationService                         │
//! │                                                              │
//! │  flavor / flavorgroup change                                 │
//! │            │                                                 │
//! │            ▼                                                 │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │           VerificationDispatcher                  │      │
//! │  │  (membership → filter queued → QUEUED → enqueue)  │      │
//! │  │            single process-wide lock               │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │ WorkerQueue                      │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │            VerificationWorker                     │      │
//! │  │      (bounded concurrent host verification)      │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │ PolicyCache  │  │  Evidence    │  │ hvs_flavor:: │      │
//! │  │ (invalidate) │─►│  Source      │─►│  evaluate    │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │                  TrustReportSink                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything outside this box (persistence, transport, reporting) is
//! reached through the traits in [`collaborators`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod memory;
pub mod service;
pub mod types;
pub mod worker;

pub use cache::PolicyCache;
pub use collaborators::{
    EvidenceSource, HostStatusStore, MembershipLookup, PolicySource, QueueMembership,
    TrustReportSink, VerificationQueue,
};
pub use config::ServiceConfig;
pub use dispatcher::{DispatchHandle, VerificationDispatcher};
pub use engine::VerificationEngine;
pub use error::VerifyError;
pub use memory::{InMemoryInventory, InventorySnapshot};
pub use service::{Collaborators, VerificationService};
pub use types::{
    DispatchOutcome, Flavorgroup, FlavorgroupId, FlavorgroupVerdict, Host, HostFailure, HostId,
    HostStatus, TrustReport,
};
pub use worker::{VerificationTask, VerificationWorker, WorkerHandle, WorkerQueue, WorkerSummary};
