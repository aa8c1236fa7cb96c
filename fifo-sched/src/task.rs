/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core task data structures for the FIFO scheduling engine.
//!
//! ```text
//! producer ──(Task)──►  PriorityLadder  ──(advance)──►  CoreSet  ──(complete)──►  notifier(origin)
//!                       queued                          running
//! ```
//!
//! # Ownership model
//! A `Task` is **moved** into the engine by `submit()` and lives in exactly
//! one container at a time: a ladder queue or a core slot.  When its remaining
//! service time reaches zero the engine moves it out again, handing it to the
//! completion notifier together with its [`Origin`].  There is never more than
//! one live copy, so "a task in two places" cannot be expressed without a
//! `clone()` that the engine never performs.

use std::fmt;

use serde::Serialize;

// ── Time ──────────────────────────────────────────────────────────────────────

/// Simulated time in seconds.
///
/// Service times are real-valued, so timestamps are too.  The clock driving
/// the engine owns the epoch; the engine only ever looks at differences.
pub type SimTime = f64;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Opaque task identity, unique for the lifetime of the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Non-owning handle naming whoever submitted a task.
///
/// The engine never inspects it beyond passing it to the completion notifier
/// and printing it in log lines.  It is a name, not a pointer, so no reference
/// cycle back into the submitting component can form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// A schedulable unit of CPU work.
///
/// `priority` is fixed at construction; there is deliberately no setter.
/// `remaining` is only ever decreased, and only by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    priority: i32,
    remaining: SimTime,
    origin: Origin,
}

impl Task {
    /// Create a task needing `service_time` seconds of CPU at `priority`.
    pub fn new(id: TaskId, priority: i32, service_time: SimTime, origin: Origin) -> Self {
        Self {
            id,
            priority,
            remaining: service_time,
            origin,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Service time still owed to this task, in seconds.
    pub fn remaining(&self) -> SimTime {
        self.remaining
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// `true` once the remaining service time has dropped to zero or below.
    pub fn is_complete(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Charge `elapsed` seconds of CPU time against the task.
    ///
    /// Returns `true` if this completes the task.
    pub(crate) fn consume(&mut self, elapsed: SimTime) -> bool {
        self.remaining -= elapsed;
        self.is_complete()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
