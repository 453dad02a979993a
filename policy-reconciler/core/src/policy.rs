use crate::quantity::Quantity;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fmt};

pub type Map = BTreeMap<String, String>;

const POD_SECURITY_PREFIX: &str = "pod-security.kubernetes.io/";
const POD_SECURITY_MODES: [&str; 3] = ["enforce", "audit", "warn"];
const POD_SECURITY_LEVELS: [&str; 3] = ["privileged", "baseline", "restricted"];
const MAX_LABEL_VALUE_LEN: usize = 63;

/// The kinds of governance object the reconciler knows how to converge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    ResourceQuota,
    LimitRange,
    NamespaceLabelSet,
    PodCleanupRule,
}

/// One declarative governance artifact to converge toward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyObject {
    /// The namespace the object applies to. Pod cleanup is cluster-wide and
    /// normally leaves this unset.
    pub namespace: Option<String>,
    pub spec: DesiredSpec,
    /// Objects are reconciled in ascending order.
    pub apply_order: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DesiredSpec {
    ResourceQuota(QuotaSpec),
    LimitRange(LimitRangeSpec),
    NamespaceLabelSet(LabelSetSpec),
    PodCleanupRule(PodCleanupSpec),

    /// A kind named in configuration that this reconciler does not support.
    Unsupported(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSpec {
    pub name: String,
    #[serde(deserialize_with = "quantity_map")]
    pub hard: Map,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRangeSpec {
    pub name: String,
    pub limits: Vec<LimitItem>,
}

/// Constraints applied to one type of workload unit (`Container`, `Pod`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitItem {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(
        default,
        deserialize_with = "quantity_map",
        skip_serializing_if = "Map::is_empty"
    )]
    pub default: Map,
    #[serde(
        default,
        deserialize_with = "quantity_map",
        skip_serializing_if = "Map::is_empty"
    )]
    pub default_request: Map,
    #[serde(
        default,
        deserialize_with = "quantity_map",
        skip_serializing_if = "Map::is_empty"
    )]
    pub min: Map,
    #[serde(
        default,
        deserialize_with = "quantity_map",
        skip_serializing_if = "Map::is_empty"
    )]
    pub max: Map,
    #[serde(
        default,
        deserialize_with = "quantity_map",
        skip_serializing_if = "Map::is_empty"
    )]
    pub max_limit_request_ratio: Map,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSetSpec {
    pub labels: Map,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodCleanupSpec {
    #[serde(default = "PodCleanupSpec::terminal_phases")]
    pub phases: Vec<PodPhase>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPolicy {
    #[error("{0} requires a target namespace")]
    MissingNamespace(PolicyKind),

    #[error("{0} requires a name")]
    MissingName(PolicyKind),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{key}: {source}")]
    Quantity {
        key: String,
        #[source]
        source: crate::quantity::InvalidQuantity,
    },

    #[error("invalid label {key:?}: {reason}")]
    Label { key: String, reason: &'static str },

    #[error("pod phase {0} is not terminal")]
    NonTerminalPhase(PodPhase),
}

// === impl PolicyKind ===

impl PolicyKind {
    pub const ALL: [Self; 4] = [
        Self::ResourceQuota,
        Self::LimitRange,
        Self::NamespaceLabelSet,
        Self::PodCleanupRule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceQuota => "ResourceQuota",
            Self::LimitRange => "LimitRange",
            Self::NamespaceLabelSet => "NamespaceLabelSet",
            Self::PodCleanupRule => "PodCleanupRule",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl PolicyObject ===

impl PolicyObject {
    pub fn new(namespace: Option<&str>, spec: DesiredSpec, apply_order: i32) -> Self {
        Self {
            namespace: namespace.map(ToString::to_string),
            spec,
            apply_order,
        }
    }

    pub fn resource_quota(namespace: &str, spec: QuotaSpec, apply_order: i32) -> Self {
        Self::new(Some(namespace), DesiredSpec::ResourceQuota(spec), apply_order)
    }

    pub fn limit_range(namespace: &str, spec: LimitRangeSpec, apply_order: i32) -> Self {
        Self::new(Some(namespace), DesiredSpec::LimitRange(spec), apply_order)
    }

    pub fn labels(namespace: &str, labels: Map, apply_order: i32) -> Self {
        Self::new(
            Some(namespace),
            DesiredSpec::NamespaceLabelSet(LabelSetSpec { labels }),
            apply_order,
        )
    }

    pub fn pod_cleanup(apply_order: i32) -> Self {
        Self::new(
            None,
            DesiredSpec::PodCleanupRule(PodCleanupSpec::default()),
            apply_order,
        )
    }

    pub fn kind(&self) -> Option<PolicyKind> {
        self.spec.kind()
    }

    /// Names the object for reports, e.g. `blog/compute-quota`, `blog` or `*`
    /// for cluster-wide rules.
    pub fn target(&self) -> String {
        let name = match &self.spec {
            DesiredSpec::ResourceQuota(QuotaSpec { name, .. })
            | DesiredSpec::LimitRange(LimitRangeSpec { name, .. }) => Some(name.as_str()),
            _ => None,
        };
        match (self.namespace.as_deref(), name) {
            (Some(ns), Some(name)) => format!("{ns}/{name}"),
            (Some(ns), None) => ns.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => "*".to_string(),
        }
    }

    /// Checks that the desired spec is well-formed before it is sent to the
    /// cluster. Unsupported kinds pass validation; they fail at reconcile
    /// time without affecting other objects.
    pub fn validate(&self) -> Result<(), InvalidPolicy> {
        let Some(kind) = self.kind() else {
            return Ok(());
        };
        if kind != PolicyKind::PodCleanupRule && self.namespace.as_deref().unwrap_or("").is_empty()
        {
            return Err(InvalidPolicy::MissingNamespace(kind));
        }

        match &self.spec {
            DesiredSpec::ResourceQuota(QuotaSpec { name, hard }) => {
                if name.is_empty() {
                    return Err(InvalidPolicy::MissingName(kind));
                }
                if hard.is_empty() {
                    return Err(InvalidPolicy::Empty("hard"));
                }
                validate_quantities(hard)
            }

            DesiredSpec::LimitRange(LimitRangeSpec { name, limits }) => {
                if name.is_empty() {
                    return Err(InvalidPolicy::MissingName(kind));
                }
                if limits.is_empty() {
                    return Err(InvalidPolicy::Empty("limits"));
                }
                for item in limits {
                    if item.type_.is_empty() {
                        return Err(InvalidPolicy::Empty("type"));
                    }
                    for map in item.maps() {
                        validate_quantities(map)?;
                    }
                }
                Ok(())
            }

            DesiredSpec::NamespaceLabelSet(LabelSetSpec { labels }) => {
                if labels.is_empty() {
                    return Err(InvalidPolicy::Empty("labels"));
                }
                labels
                    .iter()
                    .try_for_each(|(key, value)| validate_label(key, value))
            }

            DesiredSpec::PodCleanupRule(PodCleanupSpec { phases }) => {
                if phases.is_empty() {
                    return Err(InvalidPolicy::Empty("phases"));
                }
                match phases.iter().find(|phase| !phase.is_terminal()) {
                    Some(phase) => Err(InvalidPolicy::NonTerminalPhase(*phase)),
                    None => Ok(()),
                }
            }

            DesiredSpec::Unsupported(_) => Ok(()),
        }
    }
}

// === impl DesiredSpec ===

impl DesiredSpec {
    pub fn kind(&self) -> Option<PolicyKind> {
        match self {
            Self::ResourceQuota(_) => Some(PolicyKind::ResourceQuota),
            Self::LimitRange(_) => Some(PolicyKind::LimitRange),
            Self::NamespaceLabelSet(_) => Some(PolicyKind::NamespaceLabelSet),
            Self::PodCleanupRule(_) => Some(PolicyKind::PodCleanupRule),
            Self::Unsupported(_) => None,
        }
    }

    /// The kind as written in configuration.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Unsupported(name) => name.as_str(),
            spec => spec.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }
}

// === impl LimitItem ===

impl LimitItem {
    /// Returns each constraint map paired with its field name.
    pub fn fields(&self) -> [(&'static str, &Map); 5] {
        [
            ("default", &self.default),
            ("defaultRequest", &self.default_request),
            ("min", &self.min),
            ("max", &self.max),
            ("maxLimitRequestRatio", &self.max_limit_request_ratio),
        ]
    }

    fn maps(&self) -> impl Iterator<Item = &Map> {
        self.fields().into_iter().map(|(_, map)| map)
    }
}

// === impl PodCleanupSpec ===

impl PodCleanupSpec {
    fn terminal_phases() -> Vec<PodPhase> {
        vec![PodPhase::Succeeded, PodPhase::Failed]
    }
}

impl Default for PodCleanupSpec {
    fn default() -> Self {
        Self {
            phases: Self::terminal_phases(),
        }
    }
}

// === impl PodPhase ===

impl PodPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PodPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Running" => Ok(Self::Running),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            "Unknown" => Ok(Self::Unknown),
            s => Err(format!("unknown pod phase: {s}")),
        }
    }
}

/// Quantities may be written as YAML numbers (`pods: 20`).
fn quantity_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        String(String),
        Int(i64),
        Float(f64),
    }

    let raw = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Scalar::String(s) => s,
                Scalar::Int(i) => i.to_string(),
                Scalar::Float(f) => f.to_string(),
            };
            (key, value)
        })
        .collect())
}

fn validate_quantities(map: &Map) -> Result<(), InvalidPolicy> {
    for (key, value) in map {
        value
            .parse::<Quantity>()
            .map_err(|source| InvalidPolicy::Quantity {
                key: key.clone(),
                source,
            })?;
    }
    Ok(())
}

fn validate_label(key: &str, value: &str) -> Result<(), InvalidPolicy> {
    let invalid = |reason| {
        Err(InvalidPolicy::Label {
            key: key.to_string(),
            reason,
        })
    };

    if key.is_empty() {
        return invalid("empty key");
    }
    if value.len() > MAX_LABEL_VALUE_LEN {
        return invalid("value longer than 63 characters");
    }
    if let Some(mode) = key.strip_prefix(POD_SECURITY_PREFIX) {
        if POD_SECURITY_MODES.contains(&mode) && !POD_SECURITY_LEVELS.contains(&value) {
            return invalid("pod-security level must be privileged, baseline or restricted");
        }
    }
    Ok(())
}
