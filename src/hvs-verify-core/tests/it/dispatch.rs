//! Dispatcher behavior against the in-memory inventory.
//!
//! Covers the exactly-once guarantee under concurrent triggers and the
//! best-effort handling of per-host failures.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use hvs_verify_core::{
    HostId, HostStatus, HostStatusStore, InMemoryInventory, QueueMembership,
    VerificationDispatcher, VerifyError,
};

/// Filter that yields mid-dispatch and counts its invocations.
struct SlowQueueState {
    inner: Arc<InMemoryInventory>,
    calls: AtomicUsize,
    delay: Duration,
}

impl SlowQueueState {
    fn new(inner: Arc<InMemoryInventory>, delay: Duration) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueMembership for SlowQueueState {
    async fn hosts_not_already_queued(
        &self,
        host_ids: BTreeSet<HostId>,
        force_update: bool,
    ) -> Result<BTreeSet<HostId>, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .inner
            .hosts_not_already_queued(host_ids, force_update)
            .await;
        tokio::time::sleep(self.delay).await;
        pending
    }
}

fn dispatcher_with(
    inventory: &Arc<InMemoryInventory>,
    queue_state: Arc<SlowQueueState>,
) -> Arc<VerificationDispatcher> {
    Arc::new(VerificationDispatcher::new(
        inventory.clone(),
        queue_state,
        inventory.clone(),
        inventory.clone(),
    ))
}

fn inventory_with(flavorgroup_id: &str, hosts: &[&str]) -> Arc<InMemoryInventory> {
    let inventory = Arc::new(InMemoryInventory::new());
    inventory.add_flavorgroup(flavorgroup_id, Default::default());
    for host_id in hosts {
        inventory.add_host(host_id, [flavorgroup_id]);
    }
    inventory
}

fn ids(names: &[&str]) -> Vec<HostId> {
    names.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_enqueue_each_host_once() {
    let inventory = inventory_with("fg", &["h1", "h2", "h3"]);
    let queue_state = Arc::new(SlowQueueState::new(
        inventory.clone(),
        Duration::from_millis(20),
    ));
    let dispatcher = dispatcher_with(&inventory, queue_state.clone());

    let first = dispatcher.spawn_dispatch("fg", false);
    let second = dispatcher.spawn_dispatch("fg", false);
    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();

    assert_eq!(first.queued.len() + second.queued.len(), 3);
    assert!(first.queued.is_empty() || second.queued.is_empty());
    assert_eq!(inventory.enqueue_count(), 3);
    assert_eq!(queue_state.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_flavorgroups_enqueue_shared_host_once() {
    let inventory = inventory_with("fg-a", &["h1", "shared"]);
    inventory.add_flavorgroup("fg-b", Default::default());
    inventory.add_host("h2", ["fg-b"]);
    inventory.add_host("shared", ["fg-b"]);
    let queue_state = Arc::new(SlowQueueState::new(
        inventory.clone(),
        Duration::from_millis(20),
    ));
    let dispatcher = dispatcher_with(&inventory, queue_state);

    let a = dispatcher.spawn_dispatch("fg-a", false);
    let b = dispatcher.spawn_dispatch("fg-b", false);
    a.wait().await.unwrap();
    b.wait().await.unwrap();

    let queued = inventory.queued_hosts();
    assert_eq!(queued.len(), 3);
    assert_eq!(queued.iter().filter(|h| *h == "shared").count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_forced_dispatches_each_enqueue_all() {
    let inventory = inventory_with("fg", &["h1", "h2"]);
    let queue_state = Arc::new(SlowQueueState::new(
        inventory.clone(),
        Duration::from_millis(5),
    ));
    let dispatcher = dispatcher_with(&inventory, queue_state.clone());

    let first = dispatcher.spawn_dispatch("fg", true);
    let second = dispatcher.spawn_dispatch("fg", true);
    assert_eq!(first.wait().await.unwrap().queued.len(), 2);
    assert_eq!(second.wait().await.unwrap().queued.len(), 2);

    assert_eq!(inventory.enqueue_count(), 4);
    assert_eq!(queue_state.calls(), 0);
}

// =============================================================================
// Per-host failures
// =============================================================================

#[tokio::test]
async fn status_failure_skips_only_that_host() {
    let inventory = inventory_with("fg", &["h1", "h2", "h3"]);
    inventory.fail_status_updates_for("h2");
    let queue_state = Arc::new(SlowQueueState::new(inventory.clone(), Duration::ZERO));
    let dispatcher = dispatcher_with(&inventory, queue_state);

    let outcome = dispatcher.dispatch("fg", false).await.unwrap();

    assert_eq!(outcome.queued, ids(&["h1", "h3"]));
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].host_id, "h2");
    assert_eq!(inventory.queued_hosts(), ids(&["h1", "h3"]));
    assert_eq!(inventory.host_status("h2"), Some(HostStatus::Unknown));
}

#[tokio::test]
async fn enqueue_failure_is_recorded_and_batch_continues() {
    let inventory = inventory_with("fg", &["h1", "h2", "h3"]);
    inventory.fail_enqueue_for("h2");
    let queue_state = Arc::new(SlowQueueState::new(inventory.clone(), Duration::ZERO));
    let dispatcher = dispatcher_with(&inventory, queue_state);

    let outcome = dispatcher.dispatch("fg", false).await.unwrap();

    assert_eq!(outcome.queued, ids(&["h1", "h3"]));
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].host_id, "h2");
    assert_eq!(inventory.host_status("h2"), Some(HostStatus::Unknown));
}

#[tokio::test]
async fn host_that_failed_to_enqueue_is_picked_up_by_next_dispatch() {
    let inventory = inventory_with("fg", &["h1"]);
    inventory.fail_enqueue_for("h1");
    let queue_state = Arc::new(SlowQueueState::new(inventory.clone(), Duration::ZERO));
    let dispatcher = dispatcher_with(&inventory, queue_state);

    let first = dispatcher.dispatch("fg", false).await.unwrap();
    assert!(first.queued.is_empty());
    assert_eq!(first.failed.len(), 1);
    assert_ne!(inventory.host_status("h1"), Some(HostStatus::Queued));

    inventory.restore_enqueue_for("h1");
    let second = dispatcher.dispatch("fg", false).await.unwrap();

    assert_eq!(second.queued, ids(&["h1"]));
    assert_eq!(inventory.queued_hosts(), ids(&["h1"]));
    assert_eq!(inventory.host_status("h1"), Some(HostStatus::Queued));
}

#[tokio::test]
async fn empty_membership_calls_no_collaborators() {
    let inventory = inventory_with("fg-empty", &[]);
    let queue_state = Arc::new(SlowQueueState::new(inventory.clone(), Duration::ZERO));
    let dispatcher = dispatcher_with(&inventory, queue_state.clone());

    let outcome = dispatcher.dispatch("fg-empty", false).await.unwrap();

    assert_eq!(outcome.resolved, 0);
    assert_eq!(queue_state.calls(), 0);
    assert_eq!(inventory.status_updates(), 0);
    assert_eq!(inventory.enqueue_count(), 0);
}

#[tokio::test]
async fn membership_failure_aborts_without_side_effects() {
    let inventory = inventory_with("fg", &["h1"]);
    let queue_state = Arc::new(SlowQueueState::new(inventory.clone(), Duration::ZERO));
    let dispatcher = dispatcher_with(&inventory, queue_state.clone());

    let result = dispatcher.dispatch("fg-missing", false).await;

    assert!(matches!(result, Err(VerifyError::Membership { .. })));
    assert_eq!(queue_state.calls(), 0);
    assert_eq!(inventory.status_updates(), 0);
    assert_eq!(inventory.enqueue_count(), 0);
}

// =============================================================================
// Properties
// =============================================================================

/// Host count and the subset already queued before dispatch.
fn membership() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (0usize..12).prop_flat_map(|n| (Just(n), prop::collection::vec(any::<bool>(), n)))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    /// A plain dispatch queues exactly the hosts not already queued, and a
    /// repeat dispatch queues nothing.
    #[test]
    fn dispatch_queues_exactly_unqueued_hosts((n, prequeued) in membership()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let inventory = Arc::new(InMemoryInventory::new());
            inventory.add_flavorgroup("fg", Default::default());
            let mut expected = BTreeSet::new();
            for (i, queued) in prequeued.iter().enumerate() {
                let host_id = format!("host-{:02}", i);
                inventory.add_host(&host_id, ["fg"]);
                if *queued {
                    inventory.set_host_status(&host_id, HostStatus::Queued).await.unwrap();
                } else {
                    expected.insert(host_id);
                }
            }
            let queue_state = Arc::new(SlowQueueState::new(inventory.clone(), Duration::ZERO));
            let dispatcher = dispatcher_with(&inventory, queue_state);

            let first = dispatcher.dispatch("fg", false).await.unwrap();
            let second = dispatcher.dispatch("fg", false).await.unwrap();

            prop_assert_eq!(first.resolved, n);
            prop_assert_eq!(first.queued.into_iter().collect::<BTreeSet<_>>(), expected);
            prop_assert!(second.queued.is_empty());
            prop_assert!(first.failed.is_empty());
            Ok(())
        })?;
    }
}
