use crate::policy::{LimitItem, LimitRangeSpec, Map, PodPhase, QuotaSpec};
use std::fmt;

/// The cluster control-plane operations the reconciler depends on.
///
/// Reads never mutate. Each write is an upsert or a conditional delete, so
/// repeating it converges to the same state.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    /// Returns the control plane's version; used to check reachability before
    /// any policy is processed.
    async fn server_version(&self) -> Result<String, ApiError>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, ApiError>;

    /// Returns the labels of a namespace, or `None` if it does not exist.
    async fn namespace_labels(&self, name: &str) -> Result<Option<Map>, ApiError>;

    /// Returns the `hard` limits of a ResourceQuota, or `None` if it does not
    /// exist.
    async fn resource_quota(&self, namespace: &str, name: &str)
        -> Result<Option<Map>, ApiError>;

    async fn limit_range(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Vec<LimitItem>>, ApiError>;

    /// Lists pods in any of the given phases across all namespaces.
    async fn pods_in_phases(&self, phases: &[PodPhase]) -> Result<Vec<PodRef>, ApiError>;

    async fn patch_namespace_labels(&self, namespace: &str, labels: &Map) -> Result<(), ApiError>;

    async fn apply_resource_quota(&self, namespace: &str, spec: &QuotaSpec)
        -> Result<(), ApiError>;

    async fn apply_limit_range(&self, namespace: &str, spec: &LimitRangeSpec)
        -> Result<(), ApiError>;

    /// Deletes the given pods, returning how many were deleted. Pods that are
    /// already gone are not an error.
    async fn delete_pods(&self, pods: &[PodRef]) -> Result<usize, ApiError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
}

/// A failed call against the control plane.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timeout")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
