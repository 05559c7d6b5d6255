// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use clap::Parser;
use nodebox::bootstrap::{EngineCommand, exec_workload, start_engine};
use nodebox::readiness::{DEFAULT_ATTEMPTS, ProbeSpec, ReadinessCheck};
use nodebox::settings::{init_logging, parse_seconds};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nodebox-bootstrap")]
#[command(about = "Start the engine, wait until it is ready, then exec the workload")]
#[command(version)]
struct Args {
    /// Shell command that starts the engine in the background
    #[arg(long, env = "NODEBOX_ENGINE_COMMAND")]
    engine: String,

    /// Readiness probe (exec:<cmd>, tcp://host:port or http(s)://...)
    #[arg(long, env = "NODEBOX_ENGINE_PROBE")]
    probe: ProbeSpec,

    /// Seconds to sleep after each failed probe
    #[arg(long, env = "NODEBOX_READINESS_INTERVAL", value_parser = parse_seconds, default_value = "1")]
    interval: Duration,

    /// Probes before giving up
    #[arg(long, env = "NODEBOX_READINESS_ATTEMPTS", default_value_t = DEFAULT_ATTEMPTS)]
    attempts: u32,

    /// Seconds each probe may take
    #[arg(long, value_parser = parse_seconds, default_value = "5")]
    probe_timeout: Duration,

    /// Append the engine's stdout here instead of inheriting it
    #[arg(long)]
    engine_stdout: Option<PathBuf>,

    /// Append the engine's stderr here instead of inheriting it
    #[arg(long)]
    engine_stderr: Option<PathBuf>,

    /// Workload command, after `--`
    #[arg(last = true, required = true)]
    workload: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let engine = EngineCommand {
        shell: args.engine,
        stdout: args.engine_stdout,
        stderr: args.engine_stderr,
    };
    let check = ReadinessCheck::new(
        args.probe.with_timeout(args.probe_timeout),
        args.interval,
        args.attempts,
    );
    start_engine(&engine, check).await?;

    Err(exec_workload(&args.workload).into())
}
