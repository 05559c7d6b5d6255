// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Declaration loaded, never launched.
    NotStarted,
    /// Child process is alive.
    Running,
    /// Child exited (any status). Terminal unless autorestart is set.
    Exited,
    /// Exited and about to be relaunched with the same command.
    Restarting,
    /// A launch could not be attempted (e.g. missing command). Terminal.
    FatalFailed,
}

impl ProcessState {
    pub fn is_alive(self) -> bool {
        self == ProcessState::Running
    }

    /// Move to `next` if the lifecycle allows it.
    pub fn transition(self, next: ProcessState) -> Result<ProcessState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub(crate) fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (NotStarted, Running)
                | (NotStarted, FatalFailed)
                | (Running, Exited)
                | (Exited, Restarting)
                | (Restarting, Running)
                | (Restarting, FatalFailed)
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid state transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ProcessState,
    pub to: ProcessState,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotStarted => write!(f, "not-started"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::Restarting => write!(f, "restarting"),
            ProcessState::FatalFailed => write!(f, "fatal"),
        }
    }
}
