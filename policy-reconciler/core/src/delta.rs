//! Pure comparison of desired policy against observed cluster state.

use crate::{
    cluster::PodRef,
    policy::{DesiredSpec, LabelSetSpec, LimitItem, LimitRangeSpec, Map, PodCleanupSpec, QuotaSpec},
    quantity::same_quantity,
};
use std::fmt;

/// A snapshot of the cluster state relevant to one policy object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    /// The `hard` limits of a ResourceQuota, if it exists.
    Quota(Option<Map>),
    LimitRange(Option<Vec<LimitItem>>),
    /// The labels currently set on the target namespace.
    Labels(Map),
    /// Pods in the rule's phases, across all namespaces.
    Pods(Vec<PodRef>),
    Nothing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delta {
    NoChange,
    Create,
    Update(Vec<Change>),
}

/// A single field that differs from its desired value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub field: String,
    pub current: Option<String>,
    pub desired: String,
}

/// Computes what has to happen for `spec` to be satisfied by `observed`.
pub fn compute_delta(spec: &DesiredSpec, observed: &Observed) -> Delta {
    match (spec, observed) {
        (DesiredSpec::ResourceQuota(spec), Observed::Quota(current)) => {
            quota_delta(spec, current.as_ref())
        }
        (DesiredSpec::LimitRange(spec), Observed::LimitRange(current)) => {
            limit_range_delta(spec, current.as_deref())
        }
        (DesiredSpec::NamespaceLabelSet(spec), Observed::Labels(current)) => {
            labels_delta(spec, current)
        }
        (DesiredSpec::PodCleanupRule(spec), Observed::Pods(pods)) => cleanup_delta(spec, pods),
        // State observed for another kind says nothing about this one.
        _ => Delta::Create,
    }
}

pub fn quota_delta(desired: &QuotaSpec, current: Option<&Map>) -> Delta {
    let Some(current) = current else {
        return Delta::Create;
    };
    Delta::from_changes(quantity_changes("", &desired.hard, current))
}

pub fn limit_range_delta(desired: &LimitRangeSpec, current: Option<&[LimitItem]>) -> Delta {
    let Some(current) = current else {
        return Delta::Create;
    };

    let empty = LimitItem::default();
    let mut changes = Vec::new();
    for item in &desired.limits {
        let observed = current
            .iter()
            .find(|c| c.type_ == item.type_)
            .unwrap_or(&empty);
        for ((field, want), (_, have)) in item.fields().into_iter().zip(observed.fields()) {
            let prefix = format!("{}.{field}.", item.type_);
            changes.extend(quantity_changes(&prefix, want, have));
        }
    }
    Delta::from_changes(changes)
}

pub fn labels_delta(desired: &LabelSetSpec, current: &Map) -> Delta {
    if !desired.labels.keys().any(|k| current.contains_key(k)) {
        return Delta::Create;
    }

    let changes = desired
        .labels
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, value)| Change {
            field: key.clone(),
            current: current.get(key).cloned(),
            desired: value.clone(),
        })
        .collect();
    Delta::from_changes(changes)
}

/// Pod cleanup is cluster-wide: any pod in one of the rule's phases, in any
/// namespace, is due for deletion.
pub fn cleanup_delta(desired: &PodCleanupSpec, pods: &[PodRef]) -> Delta {
    let changes = pods
        .iter()
        .filter(|pod| desired.phases.contains(&pod.phase))
        .map(|pod| Change {
            field: format!("pod {pod}"),
            current: Some(pod.phase.to_string()),
            desired: "deleted".to_string(),
        })
        .collect();
    Delta::from_changes(changes)
}

fn quantity_changes(prefix: &str, desired: &Map, current: &Map) -> Vec<Change> {
    desired
        .iter()
        .filter(|(key, value)| match current.get(*key) {
            Some(current) => !same_quantity(current, value),
            None => true,
        })
        .map(|(key, value)| Change {
            field: format!("{prefix}{key}"),
            current: current.get(key).cloned(),
            desired: value.clone(),
        })
        .collect()
}

// === impl Delta ===

impl Delta {
    fn from_changes(changes: Vec<Change>) -> Self {
        if changes.is_empty() {
            Self::NoChange
        } else {
            Self::Update(changes)
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, Self::NoChange)
    }

    pub fn changes(&self) -> &[Change] {
        match self {
            Self::Update(changes) => changes,
            _ => &[],
        }
    }
}

// === impl Change ===

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.as_deref().unwrap_or("unset");
        write!(f, "{} {current} → {}", self.field, self.desired)
    }
}
