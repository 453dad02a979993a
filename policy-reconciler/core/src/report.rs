use crate::{policy::PolicyObject, reconcile::Mode};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Applied,
    WouldApply,
    Skipped,
    Failed,
}

/// The outcome of reconciling one policy object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub object: PolicyObject,
    pub status: Status,
    /// Always set for `Skipped` and `Failed`.
    pub detail: Option<String>,
}

/// All results of one run, in apply order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    mode: Mode,
    results: Vec<ReconciliationResult>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub applied: usize,
    pub would_apply: usize,
    pub skipped: usize,
    pub failed: usize,
}

// === impl Status ===

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::WouldApply => "WouldApply",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pad so that report lines align.
        f.pad(self.as_str())
    }
}

// === impl ReconciliationResult ===

impl ReconciliationResult {
    pub(crate) fn new(object: &PolicyObject, status: Status, detail: impl Into<String>) -> Self {
        Self {
            object: object.clone(),
            status,
            detail: Some(detail.into()),
        }
    }

    pub(crate) fn failed(object: &PolicyObject, detail: impl Into<String>) -> Self {
        Self::new(object, Status::Failed, detail)
    }

    pub(crate) fn skipped(object: &PolicyObject, detail: impl Into<String>) -> Self {
        Self::new(object, Status::Skipped, detail)
    }
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {} {}",
            self.status,
            self.object.spec.kind_name(),
            self.object.target()
        )?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

// === impl Report ===

impl Report {
    pub(crate) fn new(mode: Mode, results: Vec<ReconciliationResult>) -> Self {
        Self { mode, results }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn results(&self) -> &[ReconciliationResult] {
        &self.results
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.results.iter().map(|r| r.status).collect()
    }

    pub fn summary(&self) -> Summary {
        self.results
            .iter()
            .fold(Summary::default(), |mut summary, result| {
                match result.status {
                    Status::Applied => summary.applied += 1,
                    Status::WouldApply => summary.would_apply += 1,
                    Status::Skipped => summary.skipped += 1,
                    Status::Failed => summary.failed += 1,
                }
                summary
            })
    }

    /// A run fails if and only if at least one object failed. Skipped and
    /// dry-run results do not count.
    pub fn is_failed(&self) -> bool {
        self.results.iter().any(|r| r.status == Status::Failed)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{result}")?;
        }
        writeln!(f, "{}", self.summary())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "applied={} would_apply={} skipped={} failed={}",
            self.applied, self.would_apply, self.skipped, self.failed
        )
    }
}
