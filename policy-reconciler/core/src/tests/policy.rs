use super::{labels, limit_range, map, quota, TEST_NAMESPACE};
use crate::{
    DesiredSpec, InvalidPolicy, PodCleanupSpec, PodPhase, PolicyKind, PolicyObject, QuotaSpec,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn well_formed_objects_validate() {
    let objects = [
        quota(TEST_NAMESPACE, &[("requests.cpu", "2"), ("pods", "20")], 1),
        limit_range(TEST_NAMESPACE, &[("cpu", "500m"), ("memory", "512Mi")], 2),
        labels(
            TEST_NAMESPACE,
            &[
                ("pod-security.kubernetes.io/enforce", "baseline"),
                ("pod-security.kubernetes.io/enforce-version", "latest"),
            ],
            3,
        ),
        PolicyObject::pod_cleanup(4),
    ];
    for object in &objects {
        assert_eq!(object.validate(), Ok(()), "{object:?}");
    }
}

#[test]
fn quota_requires_namespace() {
    let object = PolicyObject::new(
        None,
        DesiredSpec::ResourceQuota(QuotaSpec {
            name: "q".to_string(),
            hard: map([("pods", "1")]),
        }),
        1,
    );
    assert_eq!(
        object.validate(),
        Err(InvalidPolicy::MissingNamespace(PolicyKind::ResourceQuota))
    );
}

#[test]
fn quota_rejects_bad_quantity() {
    let err = quota(TEST_NAMESPACE, &[("limits.cpu", "lots")], 1)
        .validate()
        .unwrap_err();
    assert_eq!(err.to_string(), "limits.cpu: invalid quantity: \"lots\"");
}

#[rstest]
#[case("pod-security.kubernetes.io/enforce", "strict")]
#[case("pod-security.kubernetes.io/warn", "")]
#[case("", "baseline")]
fn rejects_invalid_labels(#[case] key: &str, #[case] value: &str) {
    let object = labels(TEST_NAMESPACE, &[(key, value)], 1);
    assert!(
        matches!(object.validate(), Err(InvalidPolicy::Label { .. })),
        "{key}={value}"
    );
}

#[test]
fn rejects_long_label_values() {
    let value = "x".repeat(64);
    let object = labels(TEST_NAMESPACE, &[("team", value.as_str())], 1);
    assert!(matches!(
        object.validate(),
        Err(InvalidPolicy::Label { .. })
    ));
}

#[test]
fn cleanup_phases_must_be_terminal() {
    let object = PolicyObject::new(
        None,
        DesiredSpec::PodCleanupRule(PodCleanupSpec {
            phases: vec![PodPhase::Failed, PodPhase::Running],
        }),
        1,
    );
    assert_eq!(
        object.validate(),
        Err(InvalidPolicy::NonTerminalPhase(PodPhase::Running))
    );
}

#[test]
fn unsupported_kinds_defer_to_reconcile() {
    let object = PolicyObject::new(None, DesiredSpec::Unsupported("Ingress".to_string()), 1);
    assert_eq!(object.validate(), Ok(()));
    assert_eq!(object.kind(), None);
    assert_eq!(object.spec.kind_name(), "Ingress");
}

#[rstest]
#[case(PolicyKind::ResourceQuota)]
#[case(PolicyKind::LimitRange)]
#[case(PolicyKind::NamespaceLabelSet)]
#[case(PolicyKind::PodCleanupRule)]
fn kind_names_round_trip(#[case] kind: PolicyKind) {
    assert_eq!(PolicyKind::from_name(kind.as_str()), Some(kind));
}

#[test]
fn targets_name_the_object() {
    assert_eq!(quota(TEST_NAMESPACE, &[("pods", "1")], 1).target(), "blog/compute-quota");
    assert_eq!(labels(TEST_NAMESPACE, &[("a", "b")], 1).target(), "blog");
    assert_eq!(PolicyObject::pod_cleanup(1).target(), "*");
}
