use crate::{
    cluster::{ApiError, ClusterApi},
    delta::{compute_delta, Delta, Observed},
    policy::{DesiredSpec, PolicyObject},
    report::{ReconciliationResult, Report, Status},
};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

const ALREADY_SATISFIED: &str = "already satisfied";
const UNSUPPORTED_KIND: &str = "unsupported kind";
const TIMEOUT: &str = "timeout";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Apply,
    DryRun,
}

/// Errors that abort a run before any policy object is processed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no policy objects to reconcile")]
    NoObjects,

    #[error("cluster unreachable: {0}")]
    Unreachable(#[source] ApiError),
}

/// Converges cluster state toward a fixed set of policy objects.
#[derive(Debug)]
pub struct Reconciler<C> {
    cluster: C,
}

// === impl Mode ===

impl Mode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Self::DryRun
        } else {
            Self::Apply
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

// === impl Reconciler ===

impl<C: ClusterApi> Reconciler<C> {
    pub fn new(cluster: C) -> Self {
        Self { cluster }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Reconciles `objects` in ascending `apply_order`.
    ///
    /// A failure on one object is recorded in the report and never stops the
    /// objects after it. When `deadline` passes, the object in flight and all
    /// remaining objects are recorded as failed; results already collected are
    /// kept.
    pub async fn run(
        &self,
        mode: Mode,
        objects: &[PolicyObject],
        deadline: Instant,
    ) -> Result<Report, Error> {
        if objects.is_empty() {
            return Err(Error::NoObjects);
        }

        let version = match time::timeout_at(deadline, self.cluster.server_version()).await {
            Ok(Ok(version)) => version,
            Ok(Err(error)) => return Err(Error::Unreachable(error)),
            Err(_) => return Err(Error::Unreachable(ApiError::Timeout)),
        };
        info!(%version, ?mode, objects = objects.len(), "reconciling cluster policy");

        let mut ordered = objects.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|object| object.apply_order);

        let mut results = Vec::with_capacity(ordered.len());
        let mut expired = false;
        for object in ordered {
            if !expired && Instant::now() >= deadline {
                expired = true;
            }
            if expired {
                results.push(ReconciliationResult::failed(object, TIMEOUT));
                continue;
            }

            let result = match time::timeout_at(deadline, self.reconcile(mode, object)).await {
                Ok(result) => result,
                Err(_) => {
                    error!(kind = object.spec.kind_name(), id = %object.target(), "deadline exceeded");
                    expired = true;
                    ReconciliationResult::failed(object, TIMEOUT)
                }
            };
            results.push(result);
        }

        Ok(Report::new(mode, results))
    }

    /// Returns whether the namespace exists. Never mutates.
    pub async fn check_namespace_exists(&self, name: &str) -> Result<bool, ApiError> {
        self.cluster.namespace_exists(name).await
    }

    /// Observes the current state for `object` and compares it to the desired
    /// spec.
    pub async fn compute_delta(&self, object: &PolicyObject) -> Result<Delta, ApiError> {
        let observed = self.observe(object).await?;
        Ok(compute_delta(&object.spec, &observed))
    }

    async fn reconcile(&self, mode: Mode, object: &PolicyObject) -> ReconciliationResult {
        let kind = object.spec.kind_name();
        let id = object.target();

        if let DesiredSpec::Unsupported(_) = object.spec {
            error!(%kind, %id, "unsupported policy kind");
            return ReconciliationResult::failed(object, UNSUPPORTED_KIND);
        }

        if let Some(ns) = object.namespace.as_deref() {
            match self.check_namespace_exists(ns).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(%kind, namespace = %ns, "namespace not found; skipping");
                    return ReconciliationResult::skipped(
                        object,
                        format!("namespace {ns} not found"),
                    );
                }
                Err(error) => {
                    error!(%kind, namespace = %ns, %error, "failed to look up namespace");
                    return ReconciliationResult::failed(object, error.to_string());
                }
            }
        }

        let observed = match self.observe(object).await {
            Ok(observed) => observed,
            Err(error) => {
                error!(%kind, %id, %error, "failed to read current state");
                return ReconciliationResult::failed(object, error.to_string());
            }
        };
        let delta = compute_delta(&object.spec, &observed);
        debug!(%kind, %id, ?delta);

        if delta.is_no_change() {
            let status = match mode {
                Mode::Apply => Status::Applied,
                Mode::DryRun => Status::WouldApply,
            };
            return ReconciliationResult::new(object, status, ALREADY_SATISFIED);
        }

        let action = Action::describe(object, &delta);
        if mode.is_dry_run() {
            info!(%kind, %id, "would {action}");
            return ReconciliationResult::new(object, Status::WouldApply, format!("would {action}"));
        }

        match self.mutate(object, &observed).await {
            Ok(()) => {
                info!(%kind, %id, "{}", action.past());
                ReconciliationResult::new(object, Status::Applied, action.past())
            }
            Err(error) => {
                error!(%kind, %id, %error, "failed to apply");
                ReconciliationResult::failed(object, error.to_string())
            }
        }
    }

    async fn observe(&self, object: &PolicyObject) -> Result<Observed, ApiError> {
        let ns = object.namespace.as_deref();
        match (&object.spec, ns) {
            (DesiredSpec::ResourceQuota(spec), Some(ns)) => self
                .cluster
                .resource_quota(ns, &spec.name)
                .await
                .map(Observed::Quota),
            (DesiredSpec::LimitRange(spec), Some(ns)) => self
                .cluster
                .limit_range(ns, &spec.name)
                .await
                .map(Observed::LimitRange),
            (DesiredSpec::NamespaceLabelSet(_), Some(ns)) => {
                let labels = self.cluster.namespace_labels(ns).await?;
                labels
                    .map(Observed::Labels)
                    .ok_or_else(|| ApiError::NotFound(format!("namespace {ns}")))
            }
            // Cleanup is cluster-wide; the target namespace does not narrow it.
            (DesiredSpec::PodCleanupRule(spec), _) => self
                .cluster
                .pods_in_phases(&spec.phases)
                .await
                .map(Observed::Pods),
            (DesiredSpec::Unsupported(_), _) => Ok(Observed::Nothing),
            (_, None) => Err(ApiError::Invalid(format!(
                "{} requires a target namespace",
                object.spec.kind_name()
            ))),
        }
    }

    /// Issues the single converging write for `object`.
    async fn mutate(&self, object: &PolicyObject, observed: &Observed) -> Result<(), ApiError> {
        let ns = object.namespace.as_deref().unwrap_or_default();
        match &object.spec {
            DesiredSpec::ResourceQuota(spec) => self.cluster.apply_resource_quota(ns, spec).await,
            DesiredSpec::LimitRange(spec) => self.cluster.apply_limit_range(ns, spec).await,
            DesiredSpec::NamespaceLabelSet(spec) => {
                self.cluster.patch_namespace_labels(ns, &spec.labels).await
            }
            DesiredSpec::PodCleanupRule(spec) => {
                let pods = match observed {
                    Observed::Pods(pods) => pods
                        .iter()
                        .filter(|pod| spec.phases.contains(&pod.phase))
                        .cloned()
                        .collect::<Vec<_>>(),
                    _ => Vec::new(),
                };
                let deleted = self.cluster.delete_pods(&pods).await?;
                debug!(deleted, "deleted terminal pods");
                Ok(())
            }
            DesiredSpec::Unsupported(kind) => Err(ApiError::Invalid(format!(
                "unsupported kind {kind}"
            ))),
        }
    }
}

/// Describes the converging write for reports, e.g. `update limits.cpu 500m →
/// 250m`.
struct Action {
    verb: Verb,
    what: String,
}

#[derive(Copy, Clone)]
enum Verb {
    Create,
    Update,
    Set,
    Delete,
}

// === impl Action ===

impl Action {
    fn describe(object: &PolicyObject, delta: &Delta) -> Self {
        let changes = || {
            delta
                .changes()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        match (&object.spec, delta) {
            (DesiredSpec::PodCleanupRule(_), delta) => Self {
                verb: Verb::Delete,
                what: format!("{} terminal pods", delta.changes().len()),
            },
            (DesiredSpec::NamespaceLabelSet(spec), Delta::Create) => Self {
                verb: Verb::Set,
                what: format!(
                    "labels {}",
                    spec.labels
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            (spec, Delta::Create) => Self {
                verb: Verb::Create,
                what: format!("{} {}", spec.kind_name(), object.target()),
            },
            (_, _) => Self {
                verb: Verb::Update,
                what: changes(),
            },
        }
    }

    fn past(&self) -> String {
        let verb = match self.verb {
            Verb::Create => "created",
            Verb::Update => "updated",
            Verb::Set => "set",
            Verb::Delete => "deleted",
        };
        format!("{verb} {}", self.what)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.verb {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Set => "set",
            Verb::Delete => "delete",
        };
        write!(f, "{verb} {}", self.what)
    }
}
