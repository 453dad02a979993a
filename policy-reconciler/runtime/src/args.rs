use crate::{
    config,
    core::{Mode, Reconciler, Report, MANAGER_NAME},
    defaults,
    k8s::KubeCluster,
};
use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use tokio::time::{Duration, Instant};
use tracing::info;

/// Applies resource quotas, limit ranges, pod-security labels and terminal pod
/// cleanup to a cluster.
///
/// Every step is idempotent, so the tool can be run repeatedly. The process
/// exits non-zero if any policy object fails or the cluster is unreachable.
#[derive(Debug, Parser)]
#[clap(name = "cluster-policy", version, about)]
pub struct Args {
    #[clap(
        long,
        default_value = "cluster_policy=info,warn",
        env = "CLUSTER_POLICY_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "CLUSTER_POLICY_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// Report what would change without modifying the cluster.
    #[clap(long, env = "CLUSTER_POLICY_DRY_RUN")]
    dry_run: bool,

    /// YAML policy file. The built-in policy set is used when omitted.
    #[clap(long, env = "CLUSTER_POLICY_FILE")]
    policy_file: Option<PathBuf>,

    /// Overall deadline for the run.
    #[clap(long, default_value = "120")]
    timeout_secs: u64,

    /// Field manager recorded on server-side applied objects.
    #[clap(long, default_value = MANAGER_NAME)]
    field_manager: String,

    /// Print the built-in policy set as a policy file and exit.
    #[clap(long)]
    print_default_policy: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<ExitCode> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<ExitCode> {
        let Self {
            log_level,
            log_format,
            client,
            dry_run,
            policy_file,
            timeout_secs,
            field_manager,
            print_default_policy,
        } = self;

        if print_default_policy {
            print!("{}", config::to_yaml(&defaults::policy())?);
            return Ok(ExitCode::SUCCESS);
        }

        log_format.try_init(log_level)?;

        let objects = match policy_file {
            Some(path) => config::load(&path)?,
            None => defaults::policy(),
        };
        let mode = Mode::from_dry_run(dry_run);
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        let client = client.try_client().await?;
        let reconciler = Reconciler::new(KubeCluster::new(client, field_manager));
        let report = reconciler.run(mode, &objects, deadline).await?;

        print!("{report}");
        let summary = report.summary();
        info!(
            applied = summary.applied,
            would_apply = summary.would_apply,
            skipped = summary.skipped,
            failed = summary.failed,
            "reconciliation complete"
        );
        Ok(exit_code(&report))
    }
}

/// Exits non-zero if and only if an object failed.
pub fn exit_code(report: &Report) -> ExitCode {
    if report.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
