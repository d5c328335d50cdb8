mod common;

use std::time::Duration;

use serde_json::json;

use converge_core::catalog::{FIREWALL, FIREWALL_RULE, LKE_CLUSTER, LKE_NODE_POOL};
use converge_core::{
    Collection, ConvergeError, EventStatus, OperationKind, RecordedActions, RemoteStore,
    ResourceRef, Settings, StoreError,
};
use converge_reconcile::{
    AppliedChange, Completion, ConvergenceController, ConvergenceRequest, ResourceAction,
    WaitMode,
};
use converge_store::{InjectedFailure, MemoryStore, StoreCall};

use common::{attrs, desired, fast, UnreadableAfterUpdate};

fn cluster_with_pool(store: &MemoryStore) -> ResourceRef {
    let cluster = store.seed(
        &Collection::top_level("lke_cluster"),
        attrs(json!({"label": "prod", "region": "us-east", "k8s_version": "1.29"})),
    );
    store.seed(
        &Collection::under(&cluster.reference, "lke_node_pool"),
        attrs(json!({"type": "g6-standard-1", "count": 3})),
    );
    cluster.reference
}

#[test]
fn update_waits_for_the_event_then_refetches() {
    let store = MemoryStore::new().with_event_latency(3);
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let request = ConvergenceRequest::existing(
        &LKE_CLUSTER,
        cluster.clone(),
        desired(json!({"label": "prod-eu", "k8s_version": "1.29"})),
    )
    .with_collection(
        &LKE_NODE_POOL,
        vec![
            desired(json!({"type": "g6-standard-1", "count": 5})),
            desired(json!({"type": "g6-standard-2", "count": 2})),
        ],
    )
    .timeout(Duration::from_secs(5));
    let report = controller.converge(request).expect("converge");

    assert!(report.is_success(), "{:?}", report.errors);
    assert!(!report.created);
    assert_eq!(report.applied.len(), 3);
    match &report.completion {
        Completion::Completed(record) => {
            assert_eq!(record.action.0, "lke_cluster_update");
            assert_eq!(record.status, EventStatus::Finished);
        }
        other => panic!("unexpected completion: {other}"),
    }
    let object = report.object.as_ref().expect("refetched");
    assert_eq!(object.get("label"), Some(&json!("prod-eu")));
    assert_eq!(
        store.calls().last(),
        Some(&StoreCall::Get(cluster.clone())),
        "refetch is the last call"
    );
}

#[test]
fn missing_resource_is_created_with_children() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let request = ConvergenceRequest::create(&FIREWALL, desired(json!({"label": "edge"})))
        .with_collection(
            &FIREWALL_RULE,
            vec![
                desired(json!({"label": "ssh", "protocol": "TCP", "ports": "22"})),
                desired(json!({"label": "https", "protocol": "TCP", "ports": "443"})),
            ],
        )
        .timeout(Duration::from_secs(5));
    let report = controller.converge(request).expect("converge");

    assert!(report.is_success(), "{:?}", report.errors);
    assert!(report.created);
    assert_eq!(report.resource, "firewall/1");
    assert_eq!(report.applied.iter().filter(|c| c.is_create()).count(), 3);
    assert!(matches!(
        report.completion,
        Completion::Completed(ref r) if r.action.0 == "firewall_create" && r.entity_id.0 == 1
    ));

    let rules = store
        .list(&Collection::under(&ResourceRef::new("firewall", 1), "firewall_rule"))
        .expect("list");
    assert_eq!(rules.len(), 2);
}

#[test]
fn stale_reference_is_recreated() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let gone = ResourceRef::new("firewall", 41);
    let plan = controller
        .plan(&ConvergenceRequest::existing(&FIREWALL, gone, desired(json!({"label": "edge"}))))
        .expect("plan");
    assert!(matches!(plan.action, ResourceAction::Create { .. }));
    assert_eq!(store.mutation_calls(), 0);
}

#[test]
fn immutable_change_aborts_before_any_mutation() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let request = ConvergenceRequest::existing(
        &LKE_CLUSTER,
        cluster,
        desired(json!({"label": "renamed", "region": "eu-west"})),
    )
    .with_collection(
        &LKE_NODE_POOL,
        vec![desired(json!({"type": "g6-standard-2", "count": 1}))],
    );
    let err = controller.converge(request).unwrap_err();

    assert!(matches!(err, ConvergeError::NonMutableField { ref field, .. } if field == "region"));
    assert_eq!(store.mutation_calls(), 0);
    assert!(log.is_empty());
}

#[test]
fn foreign_collection_is_rejected() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log);

    let request = ConvergenceRequest::existing(&LKE_CLUSTER, cluster, desired(json!({})))
        .with_collection(&FIREWALL_RULE, vec![]);
    let err = controller.plan(&request).unwrap_err();
    assert!(matches!(err, ConvergeError::InvalidValue { ref field, .. } if field == "firewall_rule"));
}

#[test]
fn second_pass_reports_no_changes() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());
    let request = || {
        ConvergenceRequest::existing(&LKE_CLUSTER, cluster.clone(), desired(json!({"label": "prod-eu"})))
            .with_collection(
                &LKE_NODE_POOL,
                vec![desired(json!({"type": "g6-standard-1", "count": 4}))],
            )
            .timeout(Duration::from_secs(5))
    };

    let first = controller.converge(request()).expect("first pass");
    assert_eq!(first.applied.len(), 2);

    store.clear_calls();
    let second = controller.converge(request()).expect("second pass");
    assert!(second.applied.is_empty());
    assert!(second.is_success());
    assert_eq!(second.completion, Completion::NotRequired);
    assert_eq!(second.summary(), format!("{cluster}: no changes"));
    assert_eq!(store.mutation_calls(), 0);
}

#[test]
fn no_wait_reads_completion_once() {
    let store = MemoryStore::new().with_event_latency(50);
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let report = controller
        .converge(
            ConvergenceRequest::existing(&LKE_CLUSTER, cluster, desired(json!({"label": "x"})))
                .no_wait(),
        )
        .expect("converge");

    assert!(report.is_success());
    assert!(matches!(
        report.completion,
        Completion::Observed(ref r) if r.status == EventStatus::Started
    ));
    assert_eq!(store.count_calls(|c| matches!(c, StoreCall::GetEvent(_))), 0);
}

#[test]
fn no_wait_tolerates_missing_event() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let report = controller
        .converge(
            ConvergenceRequest::existing(&LKE_CLUSTER, cluster, desired(json!({"label": "x"})))
                .await_action("lke_cluster_recycle")
                .no_wait(),
        )
        .expect("converge");

    assert!(report.is_success());
    assert_eq!(report.completion, Completion::Pending);
    assert!(report.object.is_some());
}

#[test]
fn timeout_is_reported_with_the_applied_changes() {
    let store = MemoryStore::new().with_event_latency(100_000);
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&store);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let report = controller
        .converge(
            ConvergenceRequest::existing(&LKE_CLUSTER, cluster, desired(json!({"label": "slow"})))
                .timeout(Duration::from_millis(100)),
        )
        .expect("converge");

    assert_eq!(report.completion, Completion::TimedOut);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].is_timeout());
    assert!(report.object.is_none());
    assert!(!report.summary().contains("no changes"));
}

#[test]
fn collected_failures_sit_next_to_applied_changes() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let firewall = store.seed(&Collection::top_level("firewall"), attrs(json!({"label": "edge"})));
    let rules = Collection::under(&firewall.reference, "firewall_rule");
    store.seed(&rules, attrs(json!({"label": "telnet"})));
    store.fail(InjectedFailure::new(OperationKind::Delete, "firewall_rule"));
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let report = controller
        .converge(
            ConvergenceRequest::existing(&FIREWALL, firewall.reference.clone(), desired(json!({})))
                .with_collection(&FIREWALL_RULE, vec![desired(json!({"label": "ssh"}))]),
        )
        .expect("converge");

    assert_eq!(report.applied.len(), 1);
    assert!(report.applied[0].is_create());
    assert_eq!(report.errors.len(), 1);
    assert!(!report.is_success());
    assert_eq!(
        report.summary(),
        format!("{}: 1 change(s) applied, 1 error(s)", firewall.reference)
    );
}

#[test]
fn accepted_update_is_reported_and_awaited_when_reread_fails() {
    let memory = MemoryStore::new();
    let log = RecordedActions::new();
    let cluster = cluster_with_pool(&memory);
    let store = UnreadableAfterUpdate::new(&memory);
    let controller = ConvergenceController::new(&store, &log).with_intervals(fast());

    let report = controller
        .converge(ConvergenceRequest::existing(
            &LKE_CLUSTER,
            cluster.clone(),
            desired(json!({"label": "staging"})),
        ))
        .expect("converge");

    assert_eq!(report.applied.len(), 1);
    assert!(matches!(
        &report.applied[0],
        AppliedChange::Updated { reference, changes, .. }
            if *reference == cluster && changes[0].field == "label"
    ));
    match &report.completion {
        Completion::Completed(record) => assert_eq!(record.action.0, "lke_cluster_update"),
        other => panic!("unexpected completion: {other:?}"),
    }
    assert!(!report.errors.is_empty());
    assert!(report
        .errors
        .iter()
        .all(|err| matches!(err, ConvergeError::Store(StoreError::Transport(_)))));
    assert_eq!(
        report.summary(),
        format!("{cluster}: 1 change(s) applied, {} error(s)", report.errors.len())
    );
}

#[test]
fn settings_drive_the_request() {
    let settings = Settings {
        timeout_secs: 30,
        strict_identity: true,
        wait: false,
        ..Settings::default()
    };
    let request = ConvergenceRequest::create(&FIREWALL, desired(json!({"label": "edge"})))
        .with_settings(&settings);
    assert_eq!(request.timeout, Duration::from_secs(30));
    assert!(request.strict_identity);
    assert_eq!(request.wait, WaitMode::NoWait);
}
