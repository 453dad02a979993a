#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A [`ClusterApi`] backed by the Kubernetes API server.

use cluster_policy_core::{
    ApiError, ClusterApi, LimitItem, LimitRangeSpec, Map, PodPhase, PodRef, QuotaSpec,
    MANAGED_BY_LABEL,
};
use k8s_openapi::{
    api::core::v1::{
        LimitRange, LimitRangeItem, LimitRangeSpec as K8sLimitRangeSpec, Namespace, Pod,
        ResourceQuota, ResourceQuotaSpec,
    },
    apimachinery::pkg::api::resource::Quantity,
};
use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, ResourceExt},
    Client,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    field_manager: String,
}

// === impl KubeCluster ===

impl KubeCluster {
    pub fn new(client: Client, field_manager: impl ToString) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
        }
    }

    fn apply_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager).force()
    }
}

#[async_trait::async_trait]
impl ClusterApi for KubeCluster {
    async fn server_version(&self) -> Result<String, ApiError> {
        let info = self.client.apiserver_version().await.map_err(api_error)?;
        Ok(info.git_version)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ApiError> {
        let api = Api::<Namespace>::all(self.client.clone());
        let ns = api.get_opt(name).await.map_err(api_error)?;
        Ok(ns.is_some())
    }

    async fn namespace_labels(&self, name: &str) -> Result<Option<Map>, ApiError> {
        let api = Api::<Namespace>::all(self.client.clone());
        let ns = api.get_opt(name).await.map_err(api_error)?;
        Ok(ns.map(|ns| ns.labels().clone()))
    }

    async fn resource_quota(&self, namespace: &str, name: &str) -> Result<Option<Map>, ApiError> {
        let api = Api::<ResourceQuota>::namespaced(self.client.clone(), namespace);
        let quota = api.get_opt(name).await.map_err(api_error)?;
        Ok(quota.map(quota_hard))
    }

    async fn limit_range(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Vec<LimitItem>>, ApiError> {
        let api = Api::<LimitRange>::namespaced(self.client.clone(), namespace);
        let limits = api.get_opt(name).await.map_err(api_error)?;
        Ok(limits.map(limit_items))
    }

    async fn pods_in_phases(&self, phases: &[PodPhase]) -> Result<Vec<PodRef>, ApiError> {
        let api = Api::<Pod>::all(self.client.clone());
        let mut pods = Vec::new();
        for phase in phases {
            let params = ListParams::default().fields(&format!("status.phase={phase}"));
            let list = api.list(&params).await.map_err(api_error)?;
            pods.extend(list.items.into_iter().filter_map(pod_ref));
        }
        debug!(pods = pods.len(), ?phases, "listed pods");
        Ok(pods)
    }

    async fn patch_namespace_labels(&self, namespace: &str, labels: &Map) -> Result<(), ApiError> {
        let api = Api::<Namespace>::all(self.client.clone());
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        api.patch(namespace, &params, &Patch::Merge(labels_patch(labels)))
            .await
            .map_err(api_error)?;
        info!(%namespace, "patched namespace labels");
        Ok(())
    }

    async fn apply_resource_quota(&self, namespace: &str, spec: &QuotaSpec) -> Result<(), ApiError> {
        let api = Api::<ResourceQuota>::namespaced(self.client.clone(), namespace);
        let quota = quota_object(namespace, spec, &self.field_manager);
        api.patch(&spec.name, &self.apply_params(), &Patch::Apply(&quota))
            .await
            .map_err(api_error)?;
        info!(%namespace, name = %spec.name, "applied ResourceQuota");
        Ok(())
    }

    async fn apply_limit_range(
        &self,
        namespace: &str,
        spec: &LimitRangeSpec,
    ) -> Result<(), ApiError> {
        let api = Api::<LimitRange>::namespaced(self.client.clone(), namespace);
        let limits = limit_range_object(namespace, spec, &self.field_manager);
        api.patch(&spec.name, &self.apply_params(), &Patch::Apply(&limits))
            .await
            .map_err(api_error)?;
        info!(%namespace, name = %spec.name, "applied LimitRange");
        Ok(())
    }

    async fn delete_pods(&self, pods: &[PodRef]) -> Result<usize, ApiError> {
        let mut deleted = 0;
        for pod in pods {
            let api = Api::<Pod>::namespaced(self.client.clone(), &pod.namespace);
            match api.delete(&pod.name, &DeleteParams::default()).await {
                Ok(_) => {
                    debug!(namespace = %pod.namespace, name = %pod.name, phase = %pod.phase, "deleted pod");
                    deleted += 1;
                }
                Err(kube::Error::Api(error)) if error.code == 404 => {
                    debug!(namespace = %pod.namespace, name = %pod.name, "pod already deleted");
                }
                Err(error) => return Err(api_error(error)),
            }
        }
        Ok(deleted)
    }
}

fn api_error(error: kube::Error) -> ApiError {
    match error {
        kube::Error::Api(response) => match response.code {
            404 => ApiError::NotFound(response.message),
            401 | 403 => ApiError::Forbidden(response.message),
            400 | 422 => ApiError::Invalid(response.message),
            409 => ApiError::Conflict(response.message),
            _ => ApiError::Transport(response.message),
        },
        error => ApiError::Transport(error.to_string()),
    }
}

fn quantities(map: &Map) -> BTreeMap<String, Quantity> {
    map.iter()
        .map(|(k, v)| (k.clone(), Quantity(v.clone())))
        .collect()
}

fn from_quantities(map: Option<BTreeMap<String, Quantity>>) -> Map {
    map.unwrap_or_default()
        .into_iter()
        .map(|(k, Quantity(v))| (k, v))
        .collect()
}

fn metadata(namespace: &str, name: &str, manager: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            manager.to_string(),
        )])),
        ..Default::default()
    }
}

pub(crate) fn quota_hard(quota: ResourceQuota) -> Map {
    from_quantities(quota.spec.and_then(|spec| spec.hard))
}

pub(crate) fn quota_object(namespace: &str, spec: &QuotaSpec, manager: &str) -> ResourceQuota {
    ResourceQuota {
        metadata: metadata(namespace, &spec.name, manager),
        spec: Some(ResourceQuotaSpec {
            hard: Some(quantities(&spec.hard)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn limit_items(limits: LimitRange) -> Vec<LimitItem> {
    limits
        .spec
        .map(|spec| spec.limits)
        .unwrap_or_default()
        .into_iter()
        .map(|item| LimitItem {
            type_: item.type_,
            default: from_quantities(item.default),
            default_request: from_quantities(item.default_request),
            min: from_quantities(item.min),
            max: from_quantities(item.max),
            max_limit_request_ratio: from_quantities(item.max_limit_request_ratio),
        })
        .collect()
}

pub(crate) fn limit_range_object(
    namespace: &str,
    spec: &LimitRangeSpec,
    manager: &str,
) -> LimitRange {
    let optional = |map: &Map| (!map.is_empty()).then(|| quantities(map));
    LimitRange {
        metadata: metadata(namespace, &spec.name, manager),
        spec: Some(K8sLimitRangeSpec {
            limits: spec
                .limits
                .iter()
                .map(|item| LimitRangeItem {
                    type_: item.type_.clone(),
                    default: optional(&item.default),
                    default_request: optional(&item.default_request),
                    min: optional(&item.min),
                    max: optional(&item.max),
                    max_limit_request_ratio: optional(&item.max_limit_request_ratio),
                })
                .collect(),
        }),
    }
}

pub(crate) fn labels_patch(labels: &Map) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "labels": labels,
        }
    })
}

pub(crate) fn pod_ref(pod: Pod) -> Option<PodRef> {
    let namespace = pod.namespace()?;
    let phase = pod.status?.phase?.parse().ok()?;
    Some(PodRef {
        namespace,
        name: pod.metadata.name?,
        phase,
    })
}

#[cfg(test)]
mod tests;
