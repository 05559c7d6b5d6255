// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use clap::Parser;
use log::{debug, error};
use nodebox::health::HealthCheckSpec;
use nodebox::readiness::{Probe, ProbeSpec};
use nodebox::settings::{init_logging, parse_seconds};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nodebox-healthcheck")]
#[command(about = "Probe the node once: exit 0 if healthy, 1 otherwise")]
#[command(version)]
struct Args {
    /// What to probe; usually the API's /health endpoint
    #[arg(env = "NODEBOX_HEALTH_ENDPOINT", default_value = "http://127.0.0.1:8080/health")]
    endpoint: ProbeSpec,

    /// Seconds before the probe counts as failed
    #[arg(long, value_parser = parse_seconds, default_value = "3")]
    timeout: Duration,

    /// Print the Dockerfile HEALTHCHECK line for this endpoint and exit
    #[arg(long)]
    print_directive: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging() {
        eprintln!("failed to initialise logging: {e}");
    }

    if args.print_directive {
        let mut spec = HealthCheckSpec::new(args.endpoint.to_string());
        spec.timeout = args.timeout;
        println!("{}", spec.dockerfile_directive());
        return ExitCode::SUCCESS;
    }

    match args.endpoint.clone().with_timeout(args.timeout).check().await {
        Ok(()) => {
            debug!("{} is healthy", args.endpoint);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{} is unhealthy: {e}", args.endpoint);
            ExitCode::FAILURE
        }
    }
}
