// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Single-container runtime for a ledger node: engine bootstrap, process
//! supervision, TCP port relay and the health endpoint.

pub mod bootstrap;
pub mod config;
pub mod env;
pub mod health;
pub mod process;
pub mod readiness;
pub mod relay;
pub mod settings;
pub mod shutdown;
pub mod state;
pub mod supervisor;
