// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Start the engine, wait for it to become ready, then hand over to the workload.
//!
//! The engine is never killed here: if readiness is not reached the caller
//! exits non-zero and the container restarts as a whole.

use crate::readiness::{Probe, ReadinessCheck, ReadinessTimeout};
use log::{error, info};
use std::fs::{File, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("[{name}] failed to start")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("[{name}] never became ready")]
    ReadinessTimeout {
        name: String,
        #[source]
        source: ReadinessTimeout,
    },
    #[error("no workload command given")]
    MissingWorkload,
    #[error("failed to exec {program}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// How to launch the engine in the background.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    /// Run through `/bin/sh -c`.
    pub shell: String,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl EngineCommand {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            stdout: None,
            stderr: None,
        }
    }

    /// Spawn the engine in its own process group and return its pid. Nobody
    /// waits on it: it outlives the bootstrapper and whatever replaces it.
    pub fn spawn_detached(&self) -> Result<u32, BootstrapError> {
        let spawn_err = |source| BootstrapError::Spawn {
            name: "engine".to_string(),
            source,
        };

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&self.shell)
            .stdin(Stdio::null())
            .process_group(0);
        cmd.stdout(log_target(self.stdout.as_deref()).map_err(spawn_err)?);
        cmd.stderr(log_target(self.stderr.as_deref()).map_err(spawn_err)?);

        let child = cmd.spawn().map_err(spawn_err)?;
        info!("[engine] spawned (pid={}, cmd={})", child.id(), self.shell);
        Ok(child.id())
    }
}

fn log_target(path: Option<&Path>) -> std::io::Result<Stdio> {
    match path {
        None => Ok(Stdio::inherit()),
        Some(path) => {
            let file: File = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Stdio::from(file))
        }
    }
}

/// Block until `name` passes its readiness check.
pub async fn gate<P: Probe>(name: &str, check: ReadinessCheck<P>) -> Result<u32, BootstrapError> {
    info!(
        "[{name}] waiting for readiness ({} attempt(s))",
        check.remaining_attempts()
    );
    match check.wait_ready().await {
        Ok(attempt) => {
            info!("[{name}] ready");
            Ok(attempt)
        }
        Err(source) => {
            error!("[{name}] {source}");
            Err(BootstrapError::ReadinessTimeout {
                name: name.to_string(),
                source,
            })
        }
    }
}

/// Launch the engine detached and gate on it. Returns the engine pid.
pub async fn start_engine<P: Probe>(
    engine: &EngineCommand,
    check: ReadinessCheck<P>,
) -> Result<u32, BootstrapError> {
    let pid = engine.spawn_detached()?;
    gate("engine", check).await?;
    Ok(pid)
}

/// Replace the current process image with `argv`. Only returns on failure.
pub fn exec_workload(argv: &[String]) -> BootstrapError {
    let Some((program, args)) = argv.split_first() else {
        return BootstrapError::MissingWorkload;
    };
    info!("handing over to workload: {}", argv.join(" "));
    let source = Command::new(program).args(args).exec();
    BootstrapError::Exec {
        program: program.clone(),
        source,
    }
}
