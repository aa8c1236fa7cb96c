/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Completion notification: handing a finished task back to whoever
//! submitted it.
//!
//! Delivery is synchronous inside `advance()` and happens exactly once per
//! task.  The finished task itself is moved into the notifier, so after the
//! call the engine holds no trace of it.

use crate::task::{Origin, SimTime, Task};

/// Receiver of finished tasks.
pub trait CompletionNotifier {
    fn task_completed(&mut self, origin: &Origin, task: Task, now: SimTime);
}

impl<F> CompletionNotifier for F
where
    F: FnMut(&Origin, Task, SimTime),
{
    fn task_completed(&mut self, origin: &Origin, task: Task, now: SimTime) {
        self(origin, task, now)
    }
}

/// A finished task waiting to be delivered to its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub origin: Origin,
    pub task: Task,
    pub at: SimTime,
}

/// Buffers completions until the driver drains them after `advance()`.
#[derive(Debug, Default)]
pub struct CompletionQueue {
    pending: Vec<Completion>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything delivered since the last drain, oldest first.
    pub fn drain(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[Completion] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl CompletionNotifier for CompletionQueue {
    fn task_completed(&mut self, origin: &Origin, task: Task, now: SimTime) {
        self.pending.push(Completion {
            origin: origin.clone(),
            task,
            at: now,
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
