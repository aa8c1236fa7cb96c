/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the FIFO scheduling engine.
//!
//! Two error enums model the two failure layers:
//!
//! * [`SchedulerError`] — caller mistakes: a task submitted with a priority
//!   outside the configured range or an unusable service time, or an engine
//!   built from an unusable configuration.  These are ordinary `Result` errors.
//! * [`InvariantViolation`] — engine bugs.  The engine panics with one of
//!   these messages when a core is double-assigned or released while idle;
//!   [`SchedulingEngine::check_invariants()`] returns them as values so tests
//!   can assert on a whole engine state.
//!
//! **Do not** replace these with `anyhow::Error` in the engine path — the
//! structured variants are intentional.
//!
//! [`SchedulingEngine::check_invariants()`]: super::SchedulingEngine::check_invariants

use thiserror::Error;

use crate::task::{Task, TaskId};

// ── Caller-facing errors ──────────────────────────────────────────────────────

/// Error returned by engine construction and by
/// [`SchedulingEngine::submit()`](super::SchedulingEngine::submit).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `submit()` was called with a task whose priority is outside
    /// `[min, max]`.  Nothing was enqueued; the task is handed back so the
    /// caller keeps ownership of it.
    #[error(
        "task {} has priority {} outside the configured range [{min}, {max}]",
        .task.id(),
        .task.priority()
    )]
    PriorityOutOfRange { task: Box<Task>, min: i32, max: i32 },

    /// `submit()` was called with a negative or non-finite service time.
    /// Nothing was enqueued; the task is handed back.
    #[error("task {} has invalid service time {}", .task.id(), .task.remaining())]
    InvalidServiceTime { task: Box<Task> },

    /// The engine was configured with zero cores.
    #[error("scheduler needs at least one core")]
    NoCores,

    /// The engine was configured with `min_priority > max_priority`.
    #[error("priority range is inverted: min {min} > max {max}")]
    InvertedPriorityRange { min: i32, max: i32 },
}

impl SchedulerError {
    /// Recover the task refused by `submit()`.
    pub fn into_rejected_task(self) -> Option<Task> {
        match self {
            SchedulerError::PriorityOutOfRange { task, .. }
            | SchedulerError::InvalidServiceTime { task } => Some(*task),
            _ => None,
        }
    }
}

// ── Engine bugs ───────────────────────────────────────────────────────────────

/// A broken structural invariant.  Never produced by a correct engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// A task was assigned to a core that is already running another task.
    #[error("core {core} is busy with {running}, cannot assign {incoming}")]
    AssignToBusyCore {
        core: usize,
        running: TaskId,
        incoming: TaskId,
    },

    /// An idle core was asked to give up its task.
    #[error("core {core} is idle, nothing to release")]
    ReleaseIdleCore { core: usize },

    /// A core index past the end of the core array.
    #[error("core {core} does not exist (engine has {cores} cores)")]
    NoSuchCore { core: usize, cores: usize },

    /// The same task id was found in more than one container.
    #[error("task {task} is held in more than one place")]
    DuplicateTask { task: TaskId },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
