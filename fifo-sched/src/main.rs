/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use fifo_sched::config::Workload;
use fifo_sched::scheduler::RequeuePolicy;
use fifo_sched::sim::Simulation;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Where a preempted task is put back.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RequeueArg {
    /// Head of the level of the task that displaced it.
    Incoming,
    /// Head of its own priority level (Linux SCHED_FIFO).
    Own,
}

impl From<RequeueArg> for RequeuePolicy {
    fn from(arg: RequeueArg) -> Self {
        match arg {
            RequeueArg::Incoming => RequeuePolicy::IncomingLevel,
            RequeueArg::Own => RequeuePolicy::OwnLevel,
        }
    }
}

/// Discrete-event simulation of a multi-core SCHED_FIFO scheduler.
///
/// Example:
///   fifo-sim -w demos/workload.yaml --cores 4 --report out.yaml
#[derive(Debug, Parser)]
#[command(
    name = "fifo-sim",
    about = "Multi-core SCHED_FIFO scheduling simulator",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML workload file.
    #[arg(short = 'w', long = "workload")]
    workload: PathBuf,

    /// Override the number of cores from the workload file.
    #[arg(short = 'c', long = "cores")]
    cores: Option<usize>,

    /// Override the requeue policy from the workload file.
    #[arg(short = 'r', long = "requeue", value_enum)]
    requeue: Option<RequeueArg>,

    /// Stop before the first event later than this time (seconds).
    #[arg(short = 'u', long = "until")]
    until: Option<f64>,

    /// Write the full YAML report to this path.
    #[arg(short = 'o', long = "report")]
    report: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        workload = %cli.workload.display(),
        cores    = ?cli.cores,
        requeue  = ?cli.requeue,
        until    = ?cli.until,
        report   = ?cli.report,
        "Configuration"
    );

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut workload = Workload::load_from_file(&cli.workload)?;
    if let Some(cores) = cli.cores {
        workload.scheduler.cores = cores;
    }
    if let Some(requeue) = cli.requeue {
        workload.scheduler.requeue = requeue.into();
    }

    let report = Simulation::new(workload)
        .context("Cannot build scheduling engine")?
        .run(cli.until);

    for task in &report.tasks {
        match (task.completion, task.response_time) {
            (Some(done), Some(response)) => info!(
                "  [{id}] origin={origin} prio={prio} arrival={arrival} done={done} response={response} preempted={pre}x",
                id = task.id,
                origin = task.origin,
                prio = task.priority,
                arrival = task.arrival,
                pre = task.preemptions,
            ),
            _ => info!(
                "  [{id}] origin={origin} prio={prio} arrival={arrival} unfinished",
                id = task.id,
                origin = task.origin,
                prio = task.priority,
                arrival = task.arrival,
            ),
        }
    }

    if let Some(path) = &cli.report {
        let yaml = report.to_yaml().context("Cannot serialise report")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Cannot write report: {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
