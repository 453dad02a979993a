use super::*;
use k8s_openapi::api::core::v1::PodStatus;
use pretty_assertions::assert_eq;

fn map(pairs: &[(&str, &str)]) -> Map {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn quota_object_is_labeled_and_named() {
    let spec = QuotaSpec {
        name: "compute-quota".to_string(),
        hard: map(&[("limits.cpu", "4"), ("pods", "20")]),
    };
    let quota = quota_object("blog", &spec, "cluster-policy");

    let value = serde_json::to_value(&quota).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "ResourceQuota",
            "metadata": {
                "name": "compute-quota",
                "namespace": "blog",
                "labels": {
                    "app.kubernetes.io/managed-by": "cluster-policy",
                },
            },
            "spec": {
                "hard": {
                    "limits.cpu": "4",
                    "pods": "20",
                },
            },
        })
    );
    assert_eq!(quota_hard(quota), spec.hard);
}

#[test]
fn limit_range_object_omits_empty_constraints() {
    let spec = LimitRangeSpec {
        name: "default-limits".to_string(),
        limits: vec![LimitItem {
            type_: "Container".to_string(),
            default: map(&[("cpu", "500m")]),
            default_request: map(&[("cpu", "100m")]),
            ..Default::default()
        }],
    };
    let limits = limit_range_object("blog", &spec, "cluster-policy");

    let value = serde_json::to_value(&limits).unwrap();
    assert_eq!(
        value["spec"],
        serde_json::json!({
            "limits": [{
                "type": "Container",
                "default": { "cpu": "500m" },
                "defaultRequest": { "cpu": "100m" },
            }],
        })
    );
    assert_eq!(limit_items(limits), spec.limits);
}

#[test]
fn labels_patch_is_a_metadata_merge() {
    let patch = labels_patch(&map(&[("pod-security.kubernetes.io/enforce", "baseline")]));
    let patch_str = serde_json::to_string(&patch).unwrap();
    assert_eq!(
        patch_str,
        r#"
{
    "metadata": {
        "labels": {
            "pod-security.kubernetes.io/enforce": "baseline"
        }
    }
}
"#
        .replace("\n", "")
        .replace(" ", "")
    );
}

#[test]
fn pod_refs_require_namespace_and_known_phase() {
    let pod = |namespace: Option<&str>, phase: Option<&str>| Pod {
        metadata: ObjectMeta {
            name: Some("backup-1".to_string()),
            namespace: namespace.map(ToString::to_string),
            ..Default::default()
        },
        status: Some(PodStatus {
            phase: phase.map(ToString::to_string),
            ..Default::default()
        }),
        ..Default::default()
    };

    assert_eq!(
        pod_ref(pod(Some("blog"), Some("Succeeded"))),
        Some(PodRef {
            namespace: "blog".to_string(),
            name: "backup-1".to_string(),
            phase: PodPhase::Succeeded,
        })
    );
    assert_eq!(pod_ref(pod(None, Some("Failed"))), None);
    assert_eq!(pod_ref(pod(Some("blog"), None)), None);
    assert_eq!(pod_ref(pod(Some("blog"), Some("Evicted"))), None);
}

#[test]
fn missing_quota_spec_reads_as_empty() {
    let quota = ResourceQuota::default();
    assert!(quota_hard(quota).is_empty());
}
