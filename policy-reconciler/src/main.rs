#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    cluster_policy_runtime::Args::parse_and_run().await
}
