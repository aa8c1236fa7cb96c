/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Metrics collaborator interface and the stock sinks.
//!
//! The engine reports four event kinds: a task was added, began running, was
//! preempted, or completed.  Each report carries the engine's logical name,
//! the task, and the timestamp.  Reporting is fire-and-forget: the methods
//! return nothing, so a sink has no way to influence a scheduling decision.
//!
//! | Sink | Use |
//! |---|---|
//! | [`NoopMetrics`] | default; discards everything |
//! | [`TracingMetrics`] | one `tracing` event per report |
//! | [`MetricsRecorder`] | ordered in-memory log, used by the simulation report |

use serde::Serialize;
use tracing::debug;

use crate::task::{SimTime, Task, TaskId};

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Receiver for scheduling events.  Every method defaults to a no-op.
pub trait MetricsSink {
    /// `task` entered its priority queue via `submit`.
    fn task_added(&mut self, _scheduler: &str, _task: &Task, _now: SimTime) {}

    /// `task` was placed on `core`.
    fn task_running(&mut self, _scheduler: &str, _task: &Task, _core: usize, _now: SimTime) {}

    /// `task` was displaced from `core` by a higher-priority task.
    fn task_preempted(&mut self, _scheduler: &str, _task: &Task, _core: usize, _now: SimTime) {}

    /// `task` finished its service time.
    fn task_completed(&mut self, _scheduler: &str, _task: &Task, _now: SimTime) {}
}

impl<M: MetricsSink + ?Sized> MetricsSink for Box<M> {
    fn task_added(&mut self, scheduler: &str, task: &Task, now: SimTime) {
        (**self).task_added(scheduler, task, now)
    }

    fn task_running(&mut self, scheduler: &str, task: &Task, core: usize, now: SimTime) {
        (**self).task_running(scheduler, task, core, now)
    }

    fn task_preempted(&mut self, scheduler: &str, task: &Task, core: usize, now: SimTime) {
        (**self).task_preempted(scheduler, task, core, now)
    }

    fn task_completed(&mut self, scheduler: &str, task: &Task, now: SimTime) {
        (**self).task_completed(scheduler, task, now)
    }
}

// ── NoopMetrics ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

// ── TracingMetrics ────────────────────────────────────────────────────────────

/// Emits every report as a `debug!` event on the `fifo_sched::metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn task_added(&mut self, scheduler: &str, task: &Task, now: SimTime) {
        debug!(
            target: "fifo_sched::metrics",
            scheduler,
            task = %task.id(),
            priority = task.priority(),
            now,
            "add"
        );
    }

    fn task_running(&mut self, scheduler: &str, task: &Task, core: usize, now: SimTime) {
        debug!(
            target: "fifo_sched::metrics",
            scheduler,
            task = %task.id(),
            core,
            remaining = task.remaining(),
            now,
            "run"
        );
    }

    fn task_preempted(&mut self, scheduler: &str, task: &Task, core: usize, now: SimTime) {
        debug!(
            target: "fifo_sched::metrics",
            scheduler,
            task = %task.id(),
            core,
            remaining = task.remaining(),
            now,
            "preempt"
        );
    }

    fn task_completed(&mut self, scheduler: &str, task: &Task, now: SimTime) {
        debug!(
            target: "fifo_sched::metrics",
            scheduler,
            task = %task.id(),
            origin = %task.origin(),
            now,
            "complete"
        );
    }
}

// ── MetricsRecorder ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Running,
    Preempted,
    Completed,
}

/// One recorded scheduling event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEvent {
    pub kind: EventKind,
    pub scheduler: String,
    pub task: TaskId,
    pub priority: i32,
    /// Core involved, for `Running` and `Preempted` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<usize>,
    pub at: SimTime,
}

/// Keeps every event in arrival order.
#[derive(Debug, Default, Clone)]
pub struct MetricsRecorder {
    events: Vec<MetricEvent>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[MetricEvent] {
        &self.events
    }

    /// Number of recorded events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Events concerning a single task, in order.
    pub fn for_task(&self, id: TaskId) -> impl Iterator<Item = &MetricEvent> {
        self.events.iter().filter(move |e| e.task == id)
    }

    fn push(
        &mut self,
        kind: EventKind,
        scheduler: &str,
        task: &Task,
        core: Option<usize>,
        at: SimTime,
    ) {
        self.events.push(MetricEvent {
            kind,
            scheduler: scheduler.to_string(),
            task: task.id(),
            priority: task.priority(),
            core,
            at,
        });
    }
}

impl MetricsSink for MetricsRecorder {
    fn task_added(&mut self, scheduler: &str, task: &Task, now: SimTime) {
        self.push(EventKind::Added, scheduler, task, None, now);
    }

    fn task_running(&mut self, scheduler: &str, task: &Task, core: usize, now: SimTime) {
        self.push(EventKind::Running, scheduler, task, Some(core), now);
    }

    fn task_preempted(&mut self, scheduler: &str, task: &Task, core: usize, now: SimTime) {
        self.push(EventKind::Preempted, scheduler, task, Some(core), now);
    }

    fn task_completed(&mut self, scheduler: &str, task: &Task, now: SimTime) {
        self.push(EventKind::Completed, scheduler, task, None, now);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
