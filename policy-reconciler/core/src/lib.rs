#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod delta;
pub mod policy;
pub mod quantity;
mod reconcile;
pub mod report;


pub use self::{
    cluster::{ApiError, ClusterApi, PodRef},
    delta::{compute_delta, Change, Delta, Observed},
    policy::{
        DesiredSpec, InvalidPolicy, LabelSetSpec, LimitItem, LimitRangeSpec, Map, PodCleanupSpec,
        PodPhase, PolicyKind, PolicyObject, QuotaSpec,
    },
    quantity::Quantity,
    reconcile::{Error, Mode, Reconciler},
    report::{ReconciliationResult, Report, Status, Summary},
};

/// Label recorded on every object the reconciler creates.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

pub const MANAGER_NAME: &str = "cluster-policy";
