// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Liveness endpoint served by the API process, and the orchestrator-side
//! health-check policy that polls it.

use crate::readiness::Probe;
use crate::relay::accept_backoff;
use anyhow::{Context, Result};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;

pub const HEALTH_PATH: &str = "/health";
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(2);

static NOTFOUND: &[u8] = b"Not found";
static INTERNAL_ERROR: &[u8] = b"Internal Server Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: Status,
    pub engine: EngineStatus,
    pub timestamp: String,
}

impl HealthReport {
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            Status::Healthy => StatusCode::OK,
            Status::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Probe the engine once, bounded by `limit`. Never cached.
pub async fn check_health<P: Probe>(probe: &P, limit: Duration) -> HealthReport {
    let engine = match tokio::time::timeout(limit, probe.check()).await {
        Ok(Ok(())) => EngineStatus::Up,
        Ok(Err(e)) => {
            debug!("engine probe failed: {e}");
            EngineStatus::Down
        }
        Err(_) => {
            debug!("engine probe timed out after {limit:?}");
            EngineStatus::Down
        }
    };
    let status = match engine {
        EngineStatus::Up => Status::Healthy,
        EngineStatus::Down => Status::Unhealthy,
    };
    HealthReport {
        status,
        engine,
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
    }
}

fn full(bytes: impl Into<Bytes>) -> BoxBody<Bytes, io::Error> {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response<BoxBody<Bytes, io::Error>>> {
    let bytes = serde_json::to_vec(body).context("Failed to serialize response")?;
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(bytes))
        .context("Failed to build response")
}

fn not_found() -> Result<Response<BoxBody<Bytes, io::Error>>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(full(NOTFOUND))
        .context("Failed to build not found response")
}

fn internal_error() -> Response<BoxBody<Bytes, io::Error>> {
    let mut response = Response::new(full(INTERNAL_ERROR));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

async fn handle_request<P: Probe>(
    req: Request<Incoming>,
    probe: &P,
    limit: Duration,
) -> Result<Response<BoxBody<Bytes, io::Error>>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, HEALTH_PATH) => {
            let report = check_health(probe, limit).await;
            json_response(report.status_code(), &report)
        }
        _ => {
            debug!(
                "{} request to unknown endpoint: {}",
                req.method(),
                req.uri().path()
            );
            not_found()
        }
    }
}

/// HTTP/1 server answering `GET /health` from a live engine probe.
pub struct HealthServer<P> {
    listener: TcpListener,
    probe: Arc<P>,
    limit: Duration,
}

impl<P: Probe + 'static> HealthServer<P> {
    pub async fn bind(addr: &str, probe: P, limit: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind health endpoint on {addr}"))?;
        Ok(Self {
            listener,
            probe: Arc::new(probe),
            limit,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(self, shutdown: F) {
        if let Ok(addr) = self.local_addr() {
            info!("serving {HEALTH_PATH} on {addr}");
        }
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            accept_backoff("health", &e).await;
                            continue;
                        }
                    };
                    let probe = Arc::clone(&self.probe);
                    let limit = self.limit;
                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let probe = Arc::clone(&probe);
                            async move {
                                Ok::<_, anyhow::Error>(
                                    handle_request(req, probe.as_ref(), limit)
                                        .await
                                        .unwrap_or_else(|e| {
                                            error!("Request handling failed: {e:#}");
                                            internal_error()
                                        }),
                                )
                            }
                        });
                        if let Err(err) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            debug!("Error serving connection: {err}");
                        }
                    });
                }
            }
        }
    }
}

/// How the container orchestrator polls the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub endpoint: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub start_period: Duration,
    pub retries: u32,
}

impl HealthCheckSpec {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(3),
            start_period: Duration::from_secs(10),
            retries: 3,
        }
    }

    /// The Dockerfile `HEALTHCHECK` line running `nodebox-healthcheck`.
    pub fn dockerfile_directive(&self) -> String {
        format!(
            "HEALTHCHECK --interval={}s --timeout={}s --start-period={}s --retries={} CMD [\"nodebox-healthcheck\", \"{}\"]",
            self.interval.as_secs(),
            self.timeout.as_secs(),
            self.start_period.as_secs(),
            self.retries,
            self.endpoint
        )
    }
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self::new(format!("http://127.0.0.1:8080{HEALTH_PATH}"))
    }
}
