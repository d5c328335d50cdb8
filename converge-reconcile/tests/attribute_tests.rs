mod common;

use rstest::rstest;
use serde_json::{json, Value};

use converge_core::catalog::LKE_CLUSTER;
use converge_core::{
    Collection, ConvergeError, OperationKind, RecordedActions, RemoteStore, StoreError,
};
use converge_reconcile::{diff, AttributeReconciler};
use converge_store::{InjectedFailure, MemoryStore, StoreCall};

use common::{attrs, desired, UnreadableAfterUpdate};

fn seeded_cluster(store: &MemoryStore) -> converge_core::RemoteObject {
    store.seed(
        &Collection::top_level("lke_cluster"),
        attrs(json!({
            "label": "prod",
            "region": "us-east",
            "k8s_version": "1.29",
            "tags": ["web"],
        })),
    )
}

#[rstest]
#[case(json!({"label": "staging"}), vec!["label"])]
#[case(json!({"tags": ["web", "db"]}), vec!["tags"])]
#[case(json!({"label": "staging", "k8s_version": "1.30"}), vec!["k8s_version", "label"])]
#[case(json!({"label": "prod", "region": "us-east"}), vec![])]
fn diff_returns_exactly_the_mutable_differences(
    #[case] want: Value,
    #[case] expected: Vec<&str>,
) {
    let store = MemoryStore::new();
    let remote = seeded_cluster(&store);
    let changes = diff(
        &LKE_CLUSTER,
        &remote,
        &desired(want),
        &LKE_CLUSTER.mutability_policy(),
    )
    .expect("diff");
    let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(fields, expected);
}

#[test]
fn immutable_difference_fails_without_any_update() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let remote = seeded_cluster(&store);
    let reconciler = AttributeReconciler::new(&store, &log, &LKE_CLUSTER);

    let err = reconciler
        .reconcile(&remote, &desired(json!({"label": "staging", "region": "eu-west"})))
        .unwrap_err();

    assert!(matches!(err, ConvergeError::NonMutableField { ref field, .. } if field == "region"));
    assert_eq!(store.update_calls(), 0);
    assert!(log.is_empty());
}

#[test]
fn wrong_value_kind_is_rejected_before_update() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let remote = seeded_cluster(&store);
    let reconciler = AttributeReconciler::new(&store, &log, &LKE_CLUSTER);

    let err = reconciler
        .reconcile(&remote, &desired(json!({"tags": "web"})))
        .unwrap_err();
    assert!(matches!(err, ConvergeError::InvalidValue { ref field, .. } if field == "tags"));
    assert_eq!(store.update_calls(), 0);
}

#[test]
fn one_update_with_changed_fields_then_refetch() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let remote = seeded_cluster(&store);
    store.clear_calls();
    let reconciler = AttributeReconciler::new(&store, &log, &LKE_CLUSTER);

    let outcome = reconciler
        .reconcile(
            &remote,
            &desired(json!({"label": "staging", "k8s_version": "1.30", "tags": ["web"]})),
        )
        .expect("reconcile");

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Update(
                remote.reference.clone(),
                vec!["k8s_version".to_string(), "label".to_string()]
            ),
            StoreCall::Get(remote.reference.clone()),
        ]
    );
    let object = outcome.object().expect("refetched");
    assert_eq!(object.get("label"), Some(&json!("staging")));
    assert_eq!(outcome.changes.len(), 2);
    assert_eq!(log.len(), 2);
    assert!(log.entries()[0].starts_with("update lke_cluster/1: k8s_version"));
}

#[test]
fn converged_object_issues_no_calls() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let remote = seeded_cluster(&store);
    store.clear_calls();

    let outcome = AttributeReconciler::new(&store, &log, &LKE_CLUSTER)
        .reconcile(&remote, &desired(json!({"label": "prod", "unknown": 1})))
        .expect("reconcile");
    assert!(outcome.changes.is_empty());
    assert!(store.calls().is_empty());
}

#[test]
fn store_rejection_carries_kind_and_identity() {
    let store = MemoryStore::new();
    let log = RecordedActions::new();
    let remote = seeded_cluster(&store);
    store.fail(InjectedFailure::new(OperationKind::Update, "lke_cluster"));

    let err = AttributeReconciler::new(&store, &log, &LKE_CLUSTER)
        .reconcile(&remote, &desired(json!({"label": "staging"})))
        .unwrap_err();
    match err {
        ConvergeError::OperationFailed {
            kind,
            identity,
            source: StoreError::Status { status, .. },
            ..
        } => {
            assert_eq!(kind, OperationKind::Update);
            assert_eq!(identity, "lke_cluster/1");
            assert_eq!(status, 400);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(log.is_empty());
    let unchanged = store.get(&remote.reference).expect("get").expect("exists");
    assert_eq!(unchanged.get("label"), Some(&json!("prod")));
}

#[test]
fn failed_reread_keeps_the_accepted_update() {
    let memory = MemoryStore::new();
    let log = RecordedActions::new();
    let remote = seeded_cluster(&memory);
    let store = UnreadableAfterUpdate::new(&memory);

    let outcome = AttributeReconciler::new(&store, &log, &LKE_CLUSTER)
        .reconcile(&remote, &desired(json!({"label": "staging"})))
        .expect("update accepted");

    assert_eq!(outcome.changes.len(), 1);
    assert!(matches!(
        outcome.refetch,
        Err(ConvergeError::Store(StoreError::Transport(_)))
    ));
    assert_eq!(log.len(), 1);
    let written = memory.get(&remote.reference).expect("get").expect("exists");
    assert_eq!(written.get("label"), Some(&json!("staging")));
}
