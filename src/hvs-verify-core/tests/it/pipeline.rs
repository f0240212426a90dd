//! End-to-end: change event -> dispatch -> worker -> trust report.

use std::sync::Arc;

use hvs_flavor::{
    EvidenceInstance, FaultKind, FlavorMatchPolicy, FlavorMatchPolicyCollection, FlavorPart,
    MatchType, Requiredness,
};
use hvs_verify_core::{
    Collaborators, HostStatus, InMemoryInventory, PolicySource, ServiceConfig, TrustReport,
    VerificationService,
};

fn collaborators(inventory: &Arc<InMemoryInventory>) -> Collaborators {
    Collaborators {
        membership: inventory.clone(),
        queue_state: inventory.clone(),
        status_store: inventory.clone(),
        policies: inventory.clone(),
        evidence: inventory.clone(),
        sink: inventory.clone(),
    }
}

fn platform_all_of_required() -> FlavorMatchPolicyCollection {
    FlavorMatchPolicyCollection::new([FlavorMatchPolicy::new(
        FlavorPart::Platform,
        MatchType::AllOf,
        Requiredness::Required,
    )])
    .unwrap()
}

fn report_for<'a>(reports: &'a [TrustReport], host_id: &str) -> &'a TrustReport {
    reports
        .iter()
        .find(|r| r.host_id == host_id)
        .unwrap_or_else(|| panic!("no report for {}", host_id))
}

#[tokio::test]
async fn flavor_update_verifies_every_member() {
    let inventory = Arc::new(InMemoryInventory::new());
    inventory.add_flavorgroup("fg", platform_all_of_required());
    inventory.add_host("good", ["fg"]);
    inventory.add_host("bad", ["fg"]);
    inventory.add_host("offline", ["fg"]);
    inventory.set_evidence(
        "good",
        vec![
            EvidenceInstance::new(FlavorPart::Platform, true, "p-1"),
            EvidenceInstance::new(FlavorPart::Os, true, "os-1"),
        ],
    );
    inventory.set_evidence(
        "bad",
        vec![
            EvidenceInstance::new(FlavorPart::Platform, true, "p-1"),
            EvidenceInstance::new(FlavorPart::Platform, false, "p-2"),
        ],
    );
    inventory.mark_unreachable("offline");

    let (service, worker) =
        VerificationService::start(&ServiceConfig::default(), collaborators(&inventory)).unwrap();
    let outcome = service.on_flavor_updated("fg").wait().await.unwrap();
    assert_eq!(outcome.queued.len(), 3);
    assert!(!outcome.force_update);

    drop(service);
    let summary = worker.wait().await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.trusted, 1);
    assert_eq!(summary.untrusted, 1);
    assert_eq!(summary.failed, 1);

    let reports = inventory.reports();
    assert_eq!(reports.len(), 2);
    assert!(report_for(&reports, "good").trusted);

    let bad = report_for(&reports, "bad");
    assert!(!bad.trusted);
    let fault = &bad.results[0].verdict.faults[0];
    assert_eq!(fault.kind, FaultKind::RuleAllOfFlavorsMissing);
    assert_eq!(fault.flavor_ids, vec!["p-2".to_string()]);

    assert_eq!(inventory.host_status("good"), Some(HostStatus::Connected));
    assert_eq!(inventory.host_status("bad"), Some(HostStatus::Connected));
    assert_eq!(
        inventory.host_status("offline"),
        Some(HostStatus::ConnectionFailure)
    );
}

#[tokio::test]
async fn flavorgroup_update_uses_replaced_policy() {
    let inventory = Arc::new(InMemoryInventory::new());
    inventory.add_flavorgroup("fg", FlavorMatchPolicyCollection::empty());
    inventory.add_host("h1", ["fg"]);

    let (service, worker) =
        VerificationService::start(&ServiceConfig::default(), collaborators(&inventory)).unwrap();

    // Warm the cache with the old, permissive policy.
    let cached = service.cache().policy_for(&"fg".to_string()).await.unwrap();
    assert!(cached.is_empty());

    inventory.update_policy("fg", platform_all_of_required());
    let outcome = service.on_flavorgroup_updated("fg").wait().await.unwrap();
    assert!(outcome.force_update);

    drop(service);
    worker.wait().await.unwrap();

    let reports = inventory.reports();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].trusted);
    assert_eq!(
        reports[0].results[0].verdict.faults[0].kind,
        FaultKind::RequiredFlavorTypeMissing
    );
}

#[tokio::test]
async fn snapshot_with_required_if_defined_policy() {
    let json = r#"{
        "flavorgroups": [
            {
                "id": "automatic",
                "policy": {
                    "flavor_match_policies": [
                        {
                            "flavor_part": "HOST_UNIQUE",
                            "match_policy": {"match_type": "ANY_OF", "required": "REQUIRED_IF_DEFINED"}
                        },
                        {
                            "flavor_part": "ASSET_TAG",
                            "match_policy": {"match_type": "ANY_OF", "required": "REQUIRED_IF_DEFINED"}
                        }
                    ]
                },
                "ever_defined_parts": ["HOST_UNIQUE"],
                "member_host_ids": ["h1", "h2"]
            }
        ],
        "hosts": [{"id": "h1"}, {"id": "h2"}],
        "evidence": {
            "h1": [
                {"flavor_part": "HOST_UNIQUE", "passed": false, "identifier": "hu-old"},
                {"flavor_part": "HOST_UNIQUE", "passed": true, "identifier": "hu-new"}
            ],
            "h2": [
                {"flavor_part": "SOFTWARE", "passed": true, "identifier": "sw-1"},
                {"flavor_part": "HOST_UNIQUE"}
            ]
        }
    }"#;
    let inventory = Arc::new(InMemoryInventory::from_json(json).unwrap());

    let (service, worker) =
        VerificationService::start(&ServiceConfig::default(), collaborators(&inventory)).unwrap();
    service.dispatch("automatic", false).await.unwrap();
    drop(service);
    worker.wait().await.unwrap();

    let reports = inventory.reports();
    assert!(report_for(&reports, "h1").trusted);

    // The malformed HOST_UNIQUE entry is dropped, so the part is missing.
    let h2 = report_for(&reports, "h2");
    assert!(!h2.trusted);
    let faults = &h2.results[0].verdict.faults;
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].kind, FaultKind::RequiredFlavorTypeMissing);
    assert_eq!(faults[0].part(), Some(FlavorPart::HostUnique));
}
