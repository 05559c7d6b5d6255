// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Byte-for-byte TCP forwarding from an exposed port to an internal backend.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, sleep};

/// Pause after a failed `accept`. The pending connection stays queued, so
/// retrying at once would spin until a descriptor frees up.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// One exposed port forwarded to one backend address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRelayRule {
    pub listen_host: String,
    pub listen_port: u16,
    pub backend_host: String,
    pub backend_port: u16,
}

impl PortRelayRule {
    /// `listen` is `port` or `host:port`; `backend` is `host:port`.
    pub fn parse(listen: &str, backend: &str) -> Result<Self> {
        let (listen_host, listen_port) = match listen.parse::<u16>() {
            Ok(port) => (DEFAULT_LISTEN_HOST.to_string(), port),
            Err(_) => split_host_port(listen).context("invalid listen address")?,
        };
        let (backend_host, backend_port) =
            split_host_port(backend).context("invalid backend address")?;
        Ok(Self {
            listen_host,
            listen_port,
            backend_host,
            backend_port,
        })
    }

    pub fn listen_addr(&self) -> String {
        join_host_port(&self.listen_host, self.listen_port)
    }

    pub fn backend_addr(&self) -> String {
        join_host_port(&self.backend_host, self.backend_port)
    }
}

impl fmt::Display for PortRelayRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.listen_addr(), self.backend_addr())
    }
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        bail!("'{addr}' must be host:port");
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        bail!("'{addr}' has an empty host");
    }
    let port = port
        .parse::<u16>()
        .with_context(|| format!("'{addr}' has an invalid port"))?;
    Ok((host.to_string(), port))
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

pub struct PortRelay {
    rule: PortRelayRule,
    listener: TcpListener,
}

impl PortRelay {
    pub async fn bind(rule: PortRelayRule) -> Result<Self> {
        let listener = TcpListener::bind(rule.listen_addr())
            .await
            .with_context(|| format!("failed to bind relay on {}", rule.listen_addr()))?;
        Ok(Self { rule, listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and forward until `shutdown` resolves. Connections already
    /// being relayed keep running on their own tasks.
    pub async fn run<F: Future<Output = ()>>(self, shutdown: F) {
        info!("relaying {}", self.rule);
        let backend = self.rule.backend_addr();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((inbound, peer)) => {
                        let backend = backend.clone();
                        tokio::spawn(async move {
                            if let Err(e) = relay_connection(inbound, &backend).await {
                                debug!("relay {peer} -> {backend} closed: {e}");
                            }
                        });
                    }
                    Err(e) => accept_backoff("relay", &e).await,
                },
            }
        }
        info!("relay on {} stopped", self.rule.listen_addr());
    }
}

/// Log a failed `accept` and wait [`ACCEPT_BACKOFF`] before the caller retries.
pub(crate) async fn accept_backoff(listener: &str, err: &io::Error) {
    warn!("failed to accept {listener} connection: {err}, retrying in {ACCEPT_BACKOFF:?}");
    sleep(ACCEPT_BACKOFF).await;
}

/// Copy bytes both ways between `inbound` and a fresh connection to `backend`.
/// EOF on one side shuts down the peer's write half; the other direction keeps
/// flowing until its own EOF or error.
pub async fn relay_connection(mut inbound: TcpStream, backend: &str) -> io::Result<()> {
    let mut outbound = TcpStream::connect(backend).await?;
    let (up, down) = copy_bidirectional(&mut inbound, &mut outbound).await?;
    debug!("relay to {backend} done ({up} bytes up, {down} bytes down)");
    Ok(())
}
