// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::readiness::{
    DEFAULT_ATTEMPTS, DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT, ProbeSpec, ReadinessCheck,
    TimedProbe,
};
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PRIORITY: i32 = 999;

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_interval_sec() -> f64 {
    DEFAULT_POLL_INTERVAL.as_secs_f64()
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_timeout_sec() -> f64 {
    DEFAULT_PROBE_TIMEOUT.as_secs_f64()
}

/// One managed process, as declared in `<name>.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub environment_file: Option<String>,
    pub working_dir: Option<String>,
    /// Launch order only; lower launches first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub autostart: bool,
    #[serde(default)]
    pub autorestart: bool,
    /// Log file path, `inherit` or `null`. Defaults to `<log_dir>/<name>.stdout.log`.
    pub stdout: Option<String>,
    /// Log file path, `inherit` or `null`. Defaults to `<log_dir>/<name>.stderr.log`.
    pub stderr: Option<String>,
    pub condition_path_exists: Option<String>,
    /// Seconds to wait after SIGTERM before SIGKILL.
    pub stop_timeout: Option<u64>,
    /// Marks this process as a gated engine: nothing else launches until it is ready.
    pub readiness: Option<ReadinessConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadinessConfig {
    pub probe: ProbeSpec,
    #[serde(default = "default_interval_sec")]
    pub interval_sec: f64,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: f64,
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_sec).unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_sec).unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }

    /// A fresh check with a full attempt budget.
    pub fn check(&self) -> ReadinessCheck<TimedProbe> {
        ReadinessCheck::new(
            self.probe.clone().with_timeout(self.probe_timeout()),
            self.interval(),
            self.attempts,
        )
    }
}

/// Scan a directory for `*.yaml`/`*.yml` declarations, one process per file,
/// named after the file stem. Unparseable files are logged and skipped. The
/// result is in launch order: ascending priority, then name.
pub fn load_configs(dir: &Path) -> Result<Vec<(String, ProcessConfig)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read config directory: {}", dir.display()))?;

    let mut configs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !is_yaml {
            debug!("skipping non-YAML file: {}", path.display());
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("skipping {}: file name is not valid UTF-8", path.display());
            continue;
        };

        match parse_config(&path) {
            Ok(config) => configs.push((name.to_string(), config)),
            Err(e) => warn!("skipping {}: {e:#}", path.display()),
        }
    }

    sort_launch_order(&mut configs);
    Ok(configs)
}

pub fn sort_launch_order(configs: &mut [(String, ProcessConfig)]) {
    configs.sort_by(|(a_name, a), (b_name, b)| {
        a.priority.cmp(&b.priority).then_with(|| a_name.cmp(b_name))
    });
}

fn parse_config(path: &Path) -> Result<ProcessConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: ProcessConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    anyhow::ensure!(!config.command.trim().is_empty(), "command must not be empty");
    Ok(config)
}
