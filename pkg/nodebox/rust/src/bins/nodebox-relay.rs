// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use nodebox::relay::{PortRelay, PortRelayRule};
use nodebox::settings::init_logging;
use nodebox::shutdown::termination_signal;

#[derive(Parser, Debug)]
#[command(name = "nodebox-relay")]
#[command(about = "Forward an exposed TCP port to an internal backend")]
#[command(version)]
struct Args {
    /// Port or host:port to listen on
    #[arg(long, env = "NODEBOX_RELAY_LISTEN", default_value = "8081")]
    listen: String,

    /// Backend host:port every connection is forwarded to
    #[arg(long, env = "NODEBOX_RELAY_BACKEND", default_value = "127.0.0.1:5005")]
    backend: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let rule = PortRelayRule::parse(&args.listen, &args.backend)?;
    let relay = PortRelay::bind(rule).await?;
    info!("listening on {}", relay.local_addr()?);

    let shutdown = termination_signal().context("Failed to setup signal handlers")?;
    relay.run(shutdown).await;
    Ok(())
}
