//! `otel-collector-test`: send every telemetry signal to a live collector.
//!
//! Startup sequence:
//! 1. Parse [`cli::Args`], falling back to `OTEL_*` environment variables.
//! 2. Install and initialise the process-wide observability manager.
//! 3. Run the harness, then shut the manager down whatever the outcome.
//!
//! Exits `0` when the sequence completed and `1` otherwise.

mod cli;
mod harness;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use otel_observability::{global, ObservabilityManager};

use crate::harness::CollectorTester;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let args = cli::Args::parse();
    let config = args
        .to_config()
        .context("otel-collector-test configuration invalid")?;

    // -----------------------------------------------------------------------
    // 2. Observability
    // -----------------------------------------------------------------------
    let manager = global::install(ObservabilityManager::new(config));
    let tester = match manager
        .initialize_all()
        .and_then(|()| CollectorTester::new(manager.clone(), args.flush_wait()))
    {
        Ok(tester) => tester,
        Err(e) => {
            manager.shutdown().ok();
            return Err(e).context("failed to initialise observability");
        }
    };

    // -----------------------------------------------------------------------
    // 3. Harness
    // -----------------------------------------------------------------------
    let _shutdown = tester.shutdown_guard();
    let success = tester.run_comprehensive_test().await;

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
