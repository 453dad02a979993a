use super::map;
use crate::{
    compute_delta, Change, Delta, DesiredSpec, LabelSetSpec, LimitItem, LimitRangeSpec, Observed,
    PodCleanupSpec, PodPhase, PodRef, QuotaSpec,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn quota_spec(hard: &[(&str, &str)]) -> DesiredSpec {
    DesiredSpec::ResourceQuota(QuotaSpec {
        name: "compute-quota".to_string(),
        hard: map(hard.iter().copied()),
    })
}

fn pod(namespace: &str, name: &str, phase: PodPhase) -> PodRef {
    PodRef {
        namespace: namespace.to_string(),
        name: name.to_string(),
        phase,
    }
}

#[test]
fn absent_quota_is_created() {
    let delta = compute_delta(&quota_spec(&[("pods", "10")]), &Observed::Quota(None));
    assert_eq!(delta, Delta::Create);
}

#[rstest]
#[case::same_text(&[("limits.cpu", "2")], &[("limits.cpu", "2")])]
#[case::same_magnitude(&[("limits.cpu", "2")], &[("limits.cpu", "2000m")])]
#[case::extra_observed_key(&[("pods", "10")], &[("pods", "10"), ("services", "5")])]
fn quota_no_change(#[case] desired: &[(&str, &str)], #[case] observed: &[(&str, &str)]) {
    let observed = Observed::Quota(Some(map(observed.iter().copied())));
    assert_eq!(compute_delta(&quota_spec(desired), &observed), Delta::NoChange);
}

#[test]
fn quota_update_lists_each_change() {
    let observed = Observed::Quota(Some(map([("limits.cpu", "500m"), ("pods", "20")])));
    let desired = quota_spec(&[("limits.cpu", "250m"), ("limits.memory", "1Gi"), ("pods", "20")]);

    let delta = compute_delta(&desired, &observed);
    assert_eq!(
        delta,
        Delta::Update(vec![
            Change {
                field: "limits.cpu".to_string(),
                current: Some("500m".to_string()),
                desired: "250m".to_string(),
            },
            Change {
                field: "limits.memory".to_string(),
                current: None,
                desired: "1Gi".to_string(),
            },
        ])
    );
    let rendered = delta
        .changes()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    assert_eq!(
        rendered,
        vec!["limits.cpu 500m → 250m", "limits.memory unset → 1Gi"]
    );
}

#[test]
fn limit_range_items_match_by_type() {
    let desired = DesiredSpec::LimitRange(LimitRangeSpec {
        name: "default-limits".to_string(),
        limits: vec![LimitItem {
            type_: "Container".to_string(),
            default: map([("cpu", "500m")]),
            default_request: map([("cpu", "100m")]),
            ..Default::default()
        }],
    });
    let observed = Observed::LimitRange(Some(vec![
        LimitItem {
            type_: "Pod".to_string(),
            max: map([("cpu", "2")]),
            ..Default::default()
        },
        LimitItem {
            type_: "Container".to_string(),
            default: map([("cpu", "0.5")]),
            default_request: map([("cpu", "200m")]),
            ..Default::default()
        },
    ]));

    assert_eq!(
        compute_delta(&desired, &observed),
        Delta::Update(vec![Change {
            field: "Container.defaultRequest.cpu".to_string(),
            current: Some("200m".to_string()),
            desired: "100m".to_string(),
        }])
    );
    assert_eq!(compute_delta(&desired, &Observed::LimitRange(None)), Delta::Create);
}

#[test]
fn labels_create_update_and_no_change() {
    let desired = DesiredSpec::NamespaceLabelSet(LabelSetSpec {
        labels: map([
            ("pod-security.kubernetes.io/enforce", "baseline"),
            ("pod-security.kubernetes.io/warn", "restricted"),
        ]),
    });

    let unlabeled = Observed::Labels(map([("kubernetes.io/metadata.name", "blog")]));
    assert_eq!(compute_delta(&desired, &unlabeled), Delta::Create);

    let partial = Observed::Labels(map([
        ("kubernetes.io/metadata.name", "blog"),
        ("pod-security.kubernetes.io/enforce", "privileged"),
    ]));
    assert_eq!(
        compute_delta(&desired, &partial),
        Delta::Update(vec![
            Change {
                field: "pod-security.kubernetes.io/enforce".to_string(),
                current: Some("privileged".to_string()),
                desired: "baseline".to_string(),
            },
            Change {
                field: "pod-security.kubernetes.io/warn".to_string(),
                current: None,
                desired: "restricted".to_string(),
            },
        ])
    );

    let converged = Observed::Labels(map([
        ("kubernetes.io/metadata.name", "blog"),
        ("pod-security.kubernetes.io/enforce", "baseline"),
        ("pod-security.kubernetes.io/warn", "restricted"),
    ]));
    assert_eq!(compute_delta(&desired, &converged), Delta::NoChange);
}

#[test]
fn cleanup_updates_when_terminal_pods_exist() {
    let rule = DesiredSpec::PodCleanupRule(PodCleanupSpec::default());

    assert_eq!(
        compute_delta(&rule, &Observed::Pods(vec![])),
        Delta::NoChange
    );

    let pods = vec![
        pod("blog", "backup-1", PodPhase::Succeeded),
        pod("blog", "wordpress-0", PodPhase::Running),
        pod("monitoring", "probe-1", PodPhase::Failed),
    ];
    let delta = compute_delta(&rule, &Observed::Pods(pods));
    assert_eq!(delta.changes().len(), 2);
    assert_eq!(delta.changes()[0].field, "pod blog/backup-1");
}

#[test]
fn cleanup_honors_selected_phases() {
    let rule = DesiredSpec::PodCleanupRule(PodCleanupSpec {
        phases: vec![PodPhase::Failed],
    });
    let pods = vec![pod("blog", "backup-1", PodPhase::Succeeded)];
    assert_eq!(compute_delta(&rule, &Observed::Pods(pods)), Delta::NoChange);
}

#[test]
fn mismatched_observation_is_treated_as_absent() {
    let delta = compute_delta(&quota_spec(&[("pods", "10")]), &Observed::Nothing);
    assert_eq!(delta, Delta::Create);
}
