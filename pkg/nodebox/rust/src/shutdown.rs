// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::supervisor::Supervisor;
use log::{info, warn};
use nix::sys::signal::Signal;
use std::future::Future;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Duration, Instant, timeout_at};

const SIGKILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves on the first SIGTERM or SIGINT. Handlers are installed when this
/// is called, not when the future is first polled.
pub fn termination_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    })
}

impl Supervisor {
    /// Send SIGTERM to every running child, wait its `stop_timeout`, then
    /// SIGKILL stragglers. No restarts happen from here on.
    pub async fn shutdown(&mut self) {
        let running: Vec<String> = self
            .launch_order
            .iter()
            .filter(|name| self.processes.get(*name).is_some_and(|p| p.is_running()))
            .cloned()
            .collect();

        for name in &running {
            if let Some(proc) = self.processes.get(name) {
                info!("[{name}] sending SIGTERM");
                proc.send_signal(Signal::SIGTERM);
            }
        }

        // Every stop_timeout counts from the SIGTERM broadcast.
        let signalled_at = Instant::now();
        for name in &running {
            let Some(stop) = self.processes.get(name).map(|p| p.stop_timeout()) else {
                continue;
            };
            if self.wait_for_exit(name, signalled_at + stop).await {
                continue;
            }
            warn!(
                "[{name}] stop timeout ({}s) reached, sending SIGKILL",
                stop.as_secs()
            );
            if let Some(proc) = self.processes.get(name) {
                proc.send_signal(Signal::SIGKILL);
            }
            if !self
                .wait_for_exit(name, Instant::now() + SIGKILL_TIMEOUT)
                .await
            {
                warn!("[{name}] still running after SIGKILL, giving up");
            }
        }
        info!("all managed processes stopped");
    }

    /// Drain exit events until `name` is no longer running or `deadline` passes.
    async fn wait_for_exit(&mut self, name: &str, deadline: Instant) -> bool {
        loop {
            if !self.processes.get(name).is_some_and(|p| p.is_running()) {
                return true;
            }
            match timeout_at(deadline, self.exit_rx.recv()).await {
                Ok(Some(event)) => {
                    self.record_exit(event);
                }
                Ok(None) | Err(_) => return false,
            }
        }
    }
}
