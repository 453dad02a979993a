//! Policy files.
//!
//! A policy file is a YAML list of objects:
//!
//! ```yaml
//! - kind: ResourceQuota
//!   namespace: blog
//!   applyOrder: 10
//!   spec:
//!     name: compute-quota
//!     hard:
//!       limits.cpu: "4"
//! - kind: PodCleanupRule
//!   applyOrder: 100
//! ```

use crate::core::{DesiredSpec, InvalidPolicy, PolicyKind, PolicyObject};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub apply_order: i32,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("policy object {index} ({kind}): {source}")]
    Spec {
        index: usize,
        kind: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("policy object {index} ({kind}): {source}")]
    Invalid {
        index: usize,
        kind: String,
        #[source]
        source: InvalidPolicy,
    },

    #[error("failed to render policy: {0}")]
    Render(#[source] serde_yaml::Error),

    #[error("policy file contains no objects")]
    Empty,
}

/// Reads and validates a policy file.
pub fn load(path: &Path) -> Result<Vec<PolicyObject>, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded policy file");
    parse(&yaml)
}

/// Parses and validates policy objects, returning them in apply order.
pub fn parse(yaml: &str) -> Result<Vec<PolicyObject>, ConfigError> {
    let documents: Vec<PolicyDocument> = serde_yaml::from_str(yaml)?;
    if documents.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut objects = documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| {
            let kind = document.kind.clone();
            let object = document
                .into_object()
                .map_err(|source| ConfigError::Spec {
                    index,
                    kind: kind.clone(),
                    source,
                })?;
            object
                .validate()
                .map_err(|source| ConfigError::Invalid { index, kind, source })?;
            Ok(object)
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    objects.sort_by_key(|object| object.apply_order);
    Ok(objects)
}

/// Renders policy objects in the policy file format.
pub fn to_yaml(objects: &[PolicyObject]) -> Result<String, ConfigError> {
    let documents = objects
        .iter()
        .map(PolicyDocument::from_object)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ConfigError::Render)?;
    serde_yaml::to_string(&documents).map_err(ConfigError::Render)
}

// === impl PolicyDocument ===

impl PolicyDocument {
    pub fn into_object(self) -> Result<PolicyObject, serde_yaml::Error> {
        let spec = if self.spec.is_null() {
            Value::Mapping(Default::default())
        } else {
            self.spec
        };

        let spec = match PolicyKind::from_name(&self.kind) {
            Some(PolicyKind::ResourceQuota) => DesiredSpec::ResourceQuota(serde_yaml::from_value(spec)?),
            Some(PolicyKind::LimitRange) => DesiredSpec::LimitRange(serde_yaml::from_value(spec)?),
            Some(PolicyKind::NamespaceLabelSet) => {
                DesiredSpec::NamespaceLabelSet(serde_yaml::from_value(spec)?)
            }
            Some(PolicyKind::PodCleanupRule) => {
                DesiredSpec::PodCleanupRule(serde_yaml::from_value(spec)?)
            }
            None => DesiredSpec::Unsupported(self.kind),
        };

        Ok(PolicyObject {
            namespace: self.namespace,
            spec,
            apply_order: self.apply_order,
        })
    }

    pub fn from_object(object: &PolicyObject) -> Result<Self, serde_yaml::Error> {
        let spec = match &object.spec {
            DesiredSpec::ResourceQuota(spec) => serde_yaml::to_value(spec)?,
            DesiredSpec::LimitRange(spec) => serde_yaml::to_value(spec)?,
            DesiredSpec::NamespaceLabelSet(spec) => serde_yaml::to_value(spec)?,
            DesiredSpec::PodCleanupRule(spec) => serde_yaml::to_value(spec)?,
            DesiredSpec::Unsupported(_) => Value::Null,
        };
        Ok(Self {
            kind: object.spec.kind_name().to_string(),
            namespace: object.namespace.clone(),
            apply_order: object.apply_order,
            spec,
        })
    }
}
