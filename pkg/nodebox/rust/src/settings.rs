// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use log::Level;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_DIR_ENV: &str = "NODEBOX_CONFIG_DIR";
pub const LOG_DIR_ENV: &str = "NODEBOX_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "NODEBOX_LOG_LEVEL";

pub const DEFAULT_CONFIG_DIR: &str = "/etc/nodebox/processes.d";
pub const DEFAULT_LOG_DIR: &str = "/var/log/nodebox";

/// Supervisor settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            config_dir: path_from_env(CONFIG_DIR_ENV, DEFAULT_CONFIG_DIR),
            log_dir: path_from_env(LOG_DIR_ENV, DEFAULT_LOG_DIR),
        }
    }
}

fn path_from_env(key: &str, default: &str) -> PathBuf {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

/// `NODEBOX_LOG_LEVEL`, then `RUST_LOG`, then info. Unparseable values are skipped.
pub fn log_level() -> Level {
    [LOG_LEVEL_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|value| Level::from_str(value.trim()).ok())
        .unwrap_or(Level::Info)
}

pub fn init_logging() -> Result<()> {
    simple_logger::init_with_level(log_level())?;
    Ok(())
}

/// Parse a number of seconds (`"1"`, `"0.5"`) for CLI flags.
pub fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("'{s}' is not a number of seconds: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{s}' is not a valid duration: {e}"))
}
