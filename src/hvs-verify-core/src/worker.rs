//! Verification worker.
//!
//! A bounded channel stands in for the verification queue: [`WorkerQueue`]
//! is the sending side and implements [`VerificationQueue`], and
//! [`VerificationWorker`] drains the receiving side, running up to
//! `concurrency` host verifications at once.
//!
//! For each task the worker:
//!
//! 1. Runs the [`VerificationEngine`]
//! 2. Publishes the report to the [`TrustReportSink`]
//! 3. Sets the host status: `CONNECTED` on success, `CONNECTION_FAILURE` if
//!    evidence could not be collected, `UNKNOWN` on any other error so the
//!    host can be dispatched again
//!
//! The worker stops once every [`WorkerQueue`] clone has been dropped and
//! the channel is drained.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::collaborators::{HostStatusStore, TrustReportSink, VerificationQueue};
use crate::engine::VerificationEngine;
use crate::error::VerifyError;
use crate::types::{HostId, HostStatus};

/// One queued host verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTask {
    /// Host to verify.
    pub host_id: HostId,
    /// Whether the dispatch that queued it was forced.
    pub force_update: bool,
}

/// Sending side of the verification queue.
#[derive(Debug, Clone)]
pub struct WorkerQueue {
    sender: mpsc::Sender<VerificationTask>,
}

/// Create a verification queue with the given capacity.
pub fn channel(capacity: usize) -> (WorkerQueue, mpsc::Receiver<VerificationTask>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (WorkerQueue { sender }, receiver)
}

#[async_trait]
impl VerificationQueue for WorkerQueue {
    async fn enqueue_for_verification(
        &self,
        host_id: &HostId,
        force_update: bool,
    ) -> Result<(), VerifyError> {
        self.sender
            .send(VerificationTask {
                host_id: host_id.clone(),
                force_update,
            })
            .await
            .map_err(|_| VerifyError::QueueClosed)
    }
}

/// Counts of processed tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Tasks processed.
    pub processed: usize,
    /// Hosts reported trusted.
    pub trusted: usize,
    /// Hosts reported untrusted.
    pub untrusted: usize,
    /// Tasks that produced no report.
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    trusted: AtomicUsize,
    untrusted: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            processed: self.processed.load(Ordering::SeqCst),
            trusted: self.trusted.load(Ordering::SeqCst),
            untrusted: self.untrusted.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Consumes verification tasks and publishes trust reports.
pub struct VerificationWorker {
    engine: Arc<VerificationEngine>,
    status_store: Arc<dyn HostStatusStore>,
    sink: Arc<dyn TrustReportSink>,
    concurrency: usize,
}

impl VerificationWorker {
    /// Create a worker. A `concurrency` of zero is treated as one.
    pub fn new(
        engine: Arc<VerificationEngine>,
        status_store: Arc<dyn HostStatusStore>,
        sink: Arc<dyn TrustReportSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            engine,
            status_store,
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Process tasks until the queue is closed and drained.
    pub async fn run(self, receiver: mpsc::Receiver<VerificationTask>) -> WorkerSummary {
        info!(concurrency = self.concurrency, "Verification worker started");
        let counters = Counters::default();

        let tasks = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|task| (task, receiver))
        });
        tasks
            .for_each_concurrent(self.concurrency, |task| self.process(task, &counters))
            .await;

        let summary = counters.summary();
        info!(
            processed = summary.processed,
            trusted = summary.trusted,
            untrusted = summary.untrusted,
            failed = summary.failed,
            "Verification worker stopped"
        );
        summary
    }

    /// Run the worker as a background task.
    pub fn spawn(self, receiver: mpsc::Receiver<VerificationTask>) -> WorkerHandle {
        WorkerHandle {
            handle: tokio::spawn(self.run(receiver)),
        }
    }

    async fn process(&self, task: VerificationTask, counters: &Counters) {
        let host_id = task.host_id;
        debug!(host_id = %host_id, force_update = task.force_update, "Processing verification task");
        counters.processed.fetch_add(1, Ordering::SeqCst);

        let status = match self.engine.verify_host(&host_id).await {
            Ok(report) => {
                let trusted = report.trusted;
                match self.sink.publish(report).await {
                    Ok(()) => {
                        let counter = if trusted {
                            &counters.trusted
                        } else {
                            &counters.untrusted
                        };
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                    Err(e) => {
                        error!(host_id = %host_id, error = %e, "Failed to publish trust report");
                        counters.failed.fetch_add(1, Ordering::SeqCst);
                    },
                }
                HostStatus::Connected
            },
            Err(e) if e.is_connection_failure() => {
                warn!(host_id = %host_id, error = %e, "Evidence collection failed");
                counters.failed.fetch_add(1, Ordering::SeqCst);
                HostStatus::ConnectionFailure
            },
            Err(e) => {
                error!(host_id = %host_id, error = %e, "Host verification failed");
                counters.failed.fetch_add(1, Ordering::SeqCst);
                HostStatus::Unknown
            },
        };

        if let Err(e) = self.status_store.set_host_status(&host_id, status).await {
            warn!(host_id = %host_id, status = %status, error = %e, "Failed to update host status");
        }
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    handle: JoinHandle<WorkerSummary>,
}

impl WorkerHandle {
    /// Whether the worker has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to drain the queue and stop.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::TaskFailed`] if the worker panicked or was aborted.
    pub async fn wait(self) -> Result<WorkerSummary, VerifyError> {
        self.handle.await.map_err(|e| VerifyError::TaskFailed {
            message: format!("verification worker: {}", e),
        })
    }
}
