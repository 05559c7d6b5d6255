// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::ProcessConfig;
use crate::env::load_environment_file;
use crate::state::ProcessState;
use anyhow::{Context, Result};
use log::{info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::time::Duration;

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn suffix(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout.log",
            Stream::Stderr => "stderr.log",
        }
    }
}

/// Runtime entry for one declared process. Only the supervisor loop mutates it.
pub struct ManagedProcess {
    pub name: String,
    config: ProcessConfig,
    log_dir: PathBuf,
    state: ProcessState,
    child: Option<Child>,
    pid: Option<u32>,
    restarts: u32,
    last_exit: Option<ExitStatus>,
}

impl ManagedProcess {
    pub fn new(name: String, config: ProcessConfig, log_dir: &Path) -> Self {
        Self {
            name,
            config,
            log_dir: log_dir.to_path_buf(),
            state: ProcessState::NotStarted,
            child: None,
            pid: None,
            restarts: 0,
            last_exit: None,
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn last_exit(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    pub fn is_running(&self) -> bool {
        self.state.is_alive()
    }

    /// Carries a readiness block, so it launches in the bootstrap phase.
    pub fn is_gated(&self) -> bool {
        self.config.readiness.is_some()
    }

    pub fn stop_timeout(&self) -> Duration {
        self.config
            .stop_timeout
            .map_or(DEFAULT_STOP_TIMEOUT, Duration::from_secs)
    }

    /// Check `autostart` and `condition_path_exists`.
    pub fn should_start(&self) -> bool {
        if !self.config.autostart {
            info!("[{}] autostart=false, skipping", self.name);
            return false;
        }
        if let Some(ref path) = self.config.condition_path_exists
            && !Path::new(path).exists()
        {
            info!("[{}] condition_path_exists not met: {path}", self.name);
            return false;
        }
        true
    }

    /// Launch the declared command. Valid from `NotStarted` and `Restarting`;
    /// a launch that cannot be performed leaves the entry in `FatalFailed`.
    pub fn spawn(&mut self) -> Result<()> {
        self.state.transition(ProcessState::Running)?;

        match self.build_command().and_then(|mut cmd| {
            cmd.spawn()
                .with_context(|| format!("[{}] failed to spawn: {}", self.name, self.config.command))
        }) {
            Ok(child) => {
                let pid = child.id();
                info!(
                    "[{}] spawned (pid={}, cmd={})",
                    self.name,
                    pid.unwrap_or(0),
                    self.command_line()
                );
                self.pid = pid;
                self.child = Some(child);
                self.state = ProcessState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = ProcessState::FatalFailed;
                Err(e)
            }
        }
    }

    fn build_command(&self) -> Result<Command> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);

        if let Some(ref spec) = self.config.environment_file {
            for (k, v) in load_environment_file(spec)? {
                cmd.env(k, v);
            }
        }
        for (k, v) in &self.config.env {
            cmd.env(k, v);
        }

        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(self.stdio_for(Stream::Stdout)?);
        cmd.stderr(self.stdio_for(Stream::Stderr)?);
        Ok(cmd)
    }

    fn stdio_for(&self, stream: Stream) -> Result<Stdio> {
        let target = match stream {
            Stream::Stdout => self.config.stdout.as_deref(),
            Stream::Stderr => self.config.stderr.as_deref(),
        };
        let path = match target {
            Some("inherit") => return Ok(Stdio::inherit()),
            Some("null") => return Ok(Stdio::null()),
            Some(path) => PathBuf::from(path),
            None => self
                .log_dir
                .join(format!("{}.{}", self.name, stream.suffix())),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Stdio::from(file))
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.config.command.as_str())
            .chain(self.config.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Hand the child handle to whoever waits on it. The entry stays `Running`
    /// and keeps the pid for signalling.
    pub fn take_child(&mut self) -> Option<Child> {
        self.child.take()
    }

    pub fn send_signal(&self, sig: Signal) {
        if !self.is_running() {
            return;
        }
        if let Some(pid) = self.pid
            && let Err(e) = signal::kill(Pid::from_raw(pid as i32), sig)
        {
            warn!("[{}] failed to send {sig}: {e}", self.name);
        }
    }

    /// Record an exit observed for the current child.
    pub fn mark_exited(&mut self, status: Option<ExitStatus>) -> Result<()> {
        self.state = self.state.transition(ProcessState::Exited)?;
        self.pid = None;
        self.child = None;
        self.last_exit = status;
        Ok(())
    }

    pub fn mark_restarting(&mut self) -> Result<()> {
        self.state = self.state.transition(ProcessState::Restarting)?;
        self.restarts += 1;
        Ok(())
    }
}
