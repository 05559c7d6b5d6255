// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::debug;

/// Load a systemd-style environment file for a managed process.
///
/// A leading `-` marks the file optional: a missing file yields no variables
/// instead of an error. Lines are `KEY=VALUE`, optionally quoted; `#` comments
/// and lines without `=` are ignored.
pub fn load_environment_file(spec: &str) -> Result<Vec<(String, String)>> {
    let (path, optional) = match spec.strip_prefix('-') {
        Some(path) => (path, true),
        None => (spec, false),
    };

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => {
            debug!("optional environment file {path} not found, skipping");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("reading environment file: {path}")),
    };

    Ok(parse_environment(&contents))
}

fn parse_environment(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, raw)| {
            let value = raw.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}
