// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use nodebox::health::HealthServer;
use nodebox::readiness::ProbeSpec;
use nodebox::settings::{init_logging, parse_seconds};
use nodebox::shutdown::termination_signal;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nodebox-api")]
#[command(about = "Liveness endpoint for the node: GET /health probes the engine")]
#[command(version)]
struct Args {
    /// Address to serve on
    #[arg(long, env = "NODEBOX_API_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,

    /// Engine status probe (exec:<cmd>, tcp://host:port or http(s)://...)
    #[arg(long, env = "NODEBOX_ENGINE_PROBE", default_value = "tcp://127.0.0.1:5005")]
    engine_probe: ProbeSpec,

    /// Seconds the engine has to answer each health request
    #[arg(long, env = "NODEBOX_ENGINE_TIMEOUT", value_parser = parse_seconds, default_value = "2")]
    engine_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let timeout = args.engine_timeout;
    info!("engine probe: {} (timeout {timeout:?})", args.engine_probe);

    let probe = args.engine_probe.with_timeout(timeout);
    let server = HealthServer::bind(&args.addr, probe, timeout).await?;
    info!("listening on {}", server.local_addr()?);

    let shutdown = termination_signal().context("Failed to setup signal handlers")?;
    server.run(shutdown).await;
    Ok(())
}
