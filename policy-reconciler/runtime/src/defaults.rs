//! The built-in policy set, applied when no policy file is given.
//!
//! Namespaces get baseline pod security with restricted audit/warn, and
//! application namespaces get compute quotas and container defaults.
//! Privileged node-tuning workloads are not part of this set.

use crate::core::{LimitItem, LimitRangeSpec, Map, PolicyObject, QuotaSpec};

pub const BLOG_NAMESPACE: &str = "blog";
pub const MONITORING_NAMESPACE: &str = "monitoring";
pub const INGRESS_NAMESPACE: &str = "ingress-nginx";

const QUOTA_NAME: &str = "compute-quota";
const LIMITS_NAME: &str = "default-limits";

const ENFORCE: &str = "pod-security.kubernetes.io/enforce";
const AUDIT: &str = "pod-security.kubernetes.io/audit";
const WARN: &str = "pod-security.kubernetes.io/warn";

pub fn policy() -> Vec<PolicyObject> {
    vec![
        PolicyObject::resource_quota(
            BLOG_NAMESPACE,
            QuotaSpec {
                name: QUOTA_NAME.to_string(),
                hard: map(&[
                    ("requests.cpu", "2"),
                    ("requests.memory", "4Gi"),
                    ("limits.cpu", "4"),
                    ("limits.memory", "8Gi"),
                    ("pods", "20"),
                ]),
            },
            10,
        ),
        PolicyObject::limit_range(
            BLOG_NAMESPACE,
            LimitRangeSpec {
                name: LIMITS_NAME.to_string(),
                limits: vec![LimitItem {
                    type_: "Container".to_string(),
                    default: map(&[("cpu", "500m"), ("memory", "512Mi")]),
                    default_request: map(&[("cpu", "100m"), ("memory", "128Mi")]),
                    ..Default::default()
                }],
            },
            20,
        ),
        PolicyObject::resource_quota(
            MONITORING_NAMESPACE,
            QuotaSpec {
                name: QUOTA_NAME.to_string(),
                hard: map(&[
                    ("requests.cpu", "1"),
                    ("requests.memory", "2Gi"),
                    ("limits.cpu", "2"),
                    ("limits.memory", "4Gi"),
                ]),
            },
            30,
        ),
        PolicyObject::labels(
            BLOG_NAMESPACE,
            map(&[(ENFORCE, "baseline"), (AUDIT, "restricted"), (WARN, "restricted")]),
            40,
        ),
        PolicyObject::labels(INGRESS_NAMESPACE, map(&[(ENFORCE, "baseline")]), 50),
        PolicyObject::pod_cleanup(100),
    ]
}

fn map(pairs: &[(&str, &str)]) -> Map {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_policy_is_valid_and_ordered() {
        let objects = policy();
        for object in &objects {
            assert_eq!(object.validate(), Ok(()), "{object:?}");
        }
        let orders = objects.iter().map(|o| o.apply_order).collect::<Vec<_>>();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn default_policy_prints_as_a_loadable_policy_file() {
        let yaml = config::to_yaml(&policy()).unwrap();
        assert_eq!(config::parse(&yaml).unwrap(), policy());
    }
}
