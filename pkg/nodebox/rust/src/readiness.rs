// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Status probes and the bounded readiness poll loop.
//!
//! A probe is written as a single string so it fits in YAML, CLI flags and
//! environment variables alike:
//!
//! - `exec:<shell command>`: ready when the command exits 0
//! - `tcp://host:port`: ready when a TCP connection is accepted
//! - `http://...` / `https://...`: ready on a 2xx response to `GET`

use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{sleep, timeout};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ATTEMPTS: u32 = 30;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe command exited with {0}")]
    CommandFailed(std::process::ExitStatus),
    #[error("probe request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseProbeError {
    #[error("probe '{0}' must start with exec:, tcp://, http:// or https://")]
    UnknownScheme(String),
    #[error("exec probe has an empty command")]
    EmptyCommand,
    #[error("tcp probe address '{0}' must be host:port")]
    InvalidAddress(String),
}

/// Something that can answer "is the target up right now?".
pub trait Probe: Send + Sync {
    fn check(&self) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ProbeSpec {
    Exec(String),
    Tcp(String),
    Http(String),
}

impl ProbeSpec {
    /// Bound every check of this probe by `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> TimedProbe {
        TimedProbe {
            spec: self,
            timeout,
        }
    }
}

impl FromStr for ProbeSpec {
    type Err = ParseProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(command) = s.strip_prefix("exec:") {
            let command = command.trim();
            if command.is_empty() {
                return Err(ParseProbeError::EmptyCommand);
            }
            return Ok(ProbeSpec::Exec(command.to_string()));
        }
        if let Some(addr) = s.strip_prefix("tcp://") {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(ParseProbeError::InvalidAddress(addr.to_string()));
            }
            return Ok(ProbeSpec::Tcp(addr.to_string()));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(ProbeSpec::Http(s.to_string()));
        }
        Err(ParseProbeError::UnknownScheme(s.to_string()))
    }
}

impl TryFrom<String> for ProbeSpec {
    type Error = ParseProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ProbeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeSpec::Exec(command) => write!(f, "exec:{command}"),
            ProbeSpec::Tcp(addr) => write!(f, "tcp://{addr}"),
            ProbeSpec::Http(url) => write!(f, "{url}"),
        }
    }
}

/// A probe whose every check is bounded in time.
#[derive(Debug, Clone)]
pub struct TimedProbe {
    spec: ProbeSpec,
    timeout: Duration,
}

impl TimedProbe {
    async fn run(&self) -> Result<(), ProbeError> {
        match &self.spec {
            ProbeSpec::Exec(command) => {
                let status = Command::new("/bin/sh")
                    .arg("-c")
                    .arg(command)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .status()
                    .await?;
                if status.success() {
                    Ok(())
                } else {
                    Err(ProbeError::CommandFailed(status))
                }
            }
            ProbeSpec::Tcp(addr) => {
                TcpStream::connect(addr.as_str()).await?;
                Ok(())
            }
            ProbeSpec::Http(url) => {
                let client = reqwest::Client::builder().timeout(self.timeout).build()?;
                client.get(url).send().await?.error_for_status()?;
                Ok(())
            }
        }
    }
}

impl Probe for TimedProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        timeout(self.timeout, self.run())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

#[derive(Debug, Error)]
#[error("not ready after {attempts} attempt(s) spaced {interval:?} apart")]
pub struct ReadinessTimeout {
    pub attempts: u32,
    pub interval: Duration,
}

/// One bounded readiness poll. Consumed by [`ReadinessCheck::wait_ready`], so a
/// fresh check (and budget) is needed for every bootstrap.
pub struct ReadinessCheck<P> {
    probe: P,
    poll_interval: Duration,
    remaining_attempts: u32,
}

impl<P: Probe> ReadinessCheck<P> {
    pub fn new(probe: P, poll_interval: Duration, attempts: u32) -> Self {
        Self {
            probe,
            poll_interval,
            remaining_attempts: attempts,
        }
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.remaining_attempts
    }

    /// Probe until success or until the attempt budget is spent, sleeping
    /// `poll_interval` after every failed attempt. Returns the number of the
    /// attempt that succeeded.
    pub async fn wait_ready(mut self) -> Result<u32, ReadinessTimeout> {
        let budget = self.remaining_attempts;
        let mut attempt = 0;

        while self.remaining_attempts > 0 {
            attempt += 1;
            match self.probe.check().await {
                Ok(()) => {
                    info!("ready after {attempt}/{budget} attempt(s)");
                    return Ok(attempt);
                }
                Err(e) => debug!("readiness attempt {attempt}/{budget} failed: {e}"),
            }
            self.remaining_attempts -= 1;
            sleep(self.poll_interval).await;
        }

        Err(ReadinessTimeout {
            attempts: budget,
            interval: self.poll_interval,
        })
    }
}
