// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::{error, info, warn};
use nodebox::config::load_configs;
use nodebox::settings::{Settings, init_logging};
use nodebox::shutdown::termination_signal;
use nodebox::supervisor::{Supervisor, is_readiness_failure};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    info!("nodeboxd starting (version {})", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_env();
    let configs = if settings.config_dir.is_dir() {
        load_configs(&settings.config_dir)?
    } else {
        warn!(
            "config directory {} does not exist",
            settings.config_dir.display()
        );
        Vec::new()
    };
    info!("loaded {} process config(s)", configs.len());

    let shutdown = termination_signal().context("Failed to setup signal handlers")?;
    let mut supervisor = Supervisor::new(configs, &settings.log_dir);
    if let Err(e) = supervisor.run_all(shutdown).await {
        if is_readiness_failure(&e) {
            error!("readiness gate failed, started processes are left running");
        }
        return Err(e.context("bootstrap failed"));
    }

    info!("nodeboxd shutting down");
    Ok(())
}
