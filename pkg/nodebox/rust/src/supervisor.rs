// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::bootstrap::{self, BootstrapError};
use crate::config::{ProcessConfig, sort_launch_order};
use crate::process::ManagedProcess;
use crate::state::ProcessState;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::process::ExitStatus;
use tokio::process::Child;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Sent by a child's watcher task when the child exits.
#[derive(Debug)]
pub struct ExitEvent {
    pub name: String,
    pub pid: u32,
    pub status: std::io::Result<ExitStatus>,
}

/// Owns every managed process. Entries are only mutated from the methods
/// below, driven by [`Supervisor::run`]; watcher tasks only send [`ExitEvent`]s.
pub struct Supervisor {
    pub(crate) processes: BTreeMap<String, ManagedProcess>,
    pub(crate) launch_order: Vec<String>,
    exit_tx: UnboundedSender<ExitEvent>,
    pub(crate) exit_rx: UnboundedReceiver<ExitEvent>,
}

impl Supervisor {
    pub fn new(mut configs: Vec<(String, ProcessConfig)>, log_dir: &Path) -> Self {
        sort_launch_order(&mut configs);
        let launch_order = configs.iter().map(|(name, _)| name.clone()).collect();
        let processes = configs
            .into_iter()
            .map(|(name, config)| {
                let proc = ManagedProcess::new(name.clone(), config, log_dir);
                (name, proc)
            })
            .collect();
        let (exit_tx, exit_rx) = unbounded_channel();
        Self {
            processes,
            launch_order,
            exit_tx,
            exit_rx,
        }
    }

    pub fn process(&self, name: &str) -> Option<&ManagedProcess> {
        self.processes.get(name)
    }

    /// Current state of every entry, in launch order.
    pub fn states(&self) -> Vec<(String, ProcessState)> {
        self.launch_order
            .iter()
            .filter_map(|name| self.processes.get(name))
            .map(|proc| (proc.name.clone(), proc.state()))
            .collect()
    }

    /// Launch every readiness-gated entry in launch order and wait on each
    /// gate. Nothing is killed if a gate fails.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let gated: Vec<String> = self
            .launch_order
            .iter()
            .filter(|name| self.processes.get(*name).is_some_and(|p| p.is_gated()))
            .cloned()
            .collect();

        for name in gated {
            let Some(proc) = self.processes.get(&name) else {
                continue;
            };
            if !proc.should_start() {
                continue;
            }
            let Some(readiness) = proc.config().readiness.clone() else {
                continue;
            };
            self.launch(&name)
                .with_context(|| format!("[{name}] engine could not be started"))?;
            bootstrap::gate(&name, readiness.check()).await?;
        }
        Ok(())
    }

    /// Launch every autostart entry not started by [`Supervisor::bootstrap`].
    /// Launch failures are logged and leave the entry `FatalFailed`.
    pub fn start_remaining(&mut self) {
        let pending: Vec<String> = self
            .launch_order
            .iter()
            .filter(|name| {
                self.processes
                    .get(*name)
                    .is_some_and(|p| p.state() == ProcessState::NotStarted && !p.is_gated())
            })
            .cloned()
            .collect();

        for name in pending {
            if !self.processes.get(&name).is_some_and(|p| p.should_start()) {
                continue;
            }
            if let Err(e) = self.launch(&name) {
                error!("{e:#}");
            }
        }
    }

    /// Bootstrap, then start the rest, then supervise until `shutdown` resolves.
    /// A shutdown during bootstrap stops whatever was launched and returns Ok;
    /// a bootstrap failure returns Err with every child left running.
    pub async fn run_all<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<()> {
        tokio::pin!(shutdown);
        tokio::select! {
            result = self.bootstrap() => result?,
            () = &mut shutdown => {
                info!("shutdown requested during bootstrap");
                self.shutdown().await;
                return Ok(());
            }
        }
        self.start_remaining();
        self.run(shutdown).await;
        Ok(())
    }

    /// Reconciliation loop: apply restart policy to every exit until
    /// `shutdown` resolves, then stop all children.
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(event) = self.exit_rx.recv() => self.handle_exit(event),
            }
        }
        self.shutdown().await;
    }

    fn launch(&mut self, name: &str) -> Result<()> {
        let proc = self
            .processes
            .get_mut(name)
            .with_context(|| format!("unknown process {name}"))?;
        proc.spawn()?;
        let (Some(pid), Some(child)) = (proc.pid(), proc.take_child()) else {
            anyhow::bail!("[{name}] spawned without a pid");
        };
        spawn_watcher(name.to_string(), pid, child, self.exit_tx.clone());
        Ok(())
    }

    /// Record an exit for the current incarnation. Returns false for events
    /// about a child that is no longer tracked.
    pub(crate) fn record_exit(&mut self, event: ExitEvent) -> bool {
        let Some(proc) = self.processes.get_mut(&event.name) else {
            warn!("exit event for unknown process {}", event.name);
            return false;
        };
        if !proc.is_running() || proc.pid() != Some(event.pid) {
            debug!("[{}] ignoring stale exit of pid {}", event.name, event.pid);
            return false;
        }

        let status = match event.status {
            Ok(status) => {
                info!("[{}] exited with {status}", event.name);
                Some(status)
            }
            Err(e) => {
                warn!("[{}] failed to wait on pid {}: {e}", event.name, event.pid);
                None
            }
        };
        if let Err(e) = proc.mark_exited(status) {
            error!("[{}] {e}", event.name);
            return false;
        }
        true
    }

    pub(crate) fn handle_exit(&mut self, event: ExitEvent) {
        let name = event.name.clone();
        if !self.record_exit(event) {
            return;
        }
        let Some(proc) = self.processes.get_mut(&name) else {
            return;
        };
        if !proc.config().autorestart {
            info!("[{name}] autorestart=false, not restarting");
            return;
        }
        if let Err(e) = proc.mark_restarting() {
            error!("[{name}] {e}");
            return;
        }
        info!("[{name}] restarting (restart #{})", proc.restarts());
        if let Err(e) = self.launch(&name) {
            error!("{e:#}");
        }
    }
}

fn spawn_watcher(name: String, pid: u32, mut child: Child, tx: UnboundedSender<ExitEvent>) {
    tokio::spawn(async move {
        let status = child.wait().await;
        if tx.send(ExitEvent { name, pid, status }).is_err() {
            debug!("supervisor gone, dropping exit of pid {pid}");
        }
    });
}

/// True if the error came from a readiness gate that was never passed.
pub fn is_readiness_failure(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<BootstrapError>(),
        Some(BootstrapError::ReadinessTimeout { .. })
    )
}
