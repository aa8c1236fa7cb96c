/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Minimal discrete-event clock driving one [`SchedulingEngine`].
//!
//! The engine itself has no notion of time passing; this module plays the
//! part of the simulation kernel around it:
//!
//! ```text
//! loop:
//!   t = min(next arrival, pending wake)
//!   submit every task arriving at t
//!   wake = engine.advance(t)
//!   deliver completions to their origins
//! ```
//!
//! Every event calls `advance`, mirroring a kernel that reschedules on each
//! arrival as well as on each requested wake-up.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{TaskSpec, Workload};
use crate::metrics::{EventKind, MetricsRecorder};
use crate::notify::CompletionQueue;
use crate::scheduler::{NextWake, RequeuePolicy, SchedulerError, SchedulingEngine};
use crate::task::{Origin, SimTime, TaskId};

// ── Report ────────────────────────────────────────────────────────────────────

/// Per-task outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub origin: Origin,
    pub priority: i32,
    pub service_time: SimTime,
    pub arrival: SimTime,
    /// First time the task was placed on a core.
    pub first_run: Option<SimTime>,
    pub completion: Option<SimTime>,
    /// `completion - arrival`.
    pub response_time: Option<SimTime>,
    pub preemptions: usize,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimReport {
    pub scheduler: String,
    pub cores: usize,
    pub requeue: RequeuePolicy,
    /// Time of the last processed event.
    pub end_time: SimTime,
    /// Number of `advance` calls made.
    pub decisions: usize,
    pub added: usize,
    pub runs: usize,
    pub preemptions: usize,
    pub completed: usize,
    /// Tasks that had not finished when the run stopped.
    pub unfinished: usize,
    pub tasks: Vec<TaskRecord>,
}

impl SimReport {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|r| r.id == id)
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

pub struct Simulation {
    engine: SchedulingEngine<CompletionQueue, MetricsRecorder>,
    /// Not yet submitted, sorted by arrival (stable, so file order breaks ties).
    arrivals: VecDeque<TaskSpec>,
    records: BTreeMap<TaskId, TaskRecord>,
    pending_wake: Option<SimTime>,
    now: SimTime,
    decisions: usize,
}

impl Simulation {
    /// Build the engine described by `workload` and queue its arrivals.
    pub fn new(workload: Workload) -> Result<Self, SchedulerError> {
        let engine = SchedulingEngine::with_metrics(
            &workload.scheduler,
            CompletionQueue::new(),
            MetricsRecorder::new(),
        )?;

        let mut arrivals = workload.tasks;
        arrivals.sort_by(|a, b| a.arrival.total_cmp(&b.arrival));

        let records = arrivals
            .iter()
            .map(|spec| {
                let record = TaskRecord {
                    id: spec.id,
                    origin: spec.origin.clone(),
                    priority: spec.priority,
                    service_time: spec.service_time,
                    arrival: spec.arrival,
                    first_run: None,
                    completion: None,
                    response_time: None,
                    preemptions: 0,
                };
                (spec.id, record)
            })
            .collect();

        Ok(Self {
            engine,
            arrivals: arrivals.into(),
            records,
            pending_wake: None,
            now: 0.0,
            decisions: 0,
        })
    }

    pub fn engine(&self) -> &SchedulingEngine<CompletionQueue, MetricsRecorder> {
        &self.engine
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Time of the next event, or `None` once nothing is left to happen.
    pub fn next_event(&self) -> Option<SimTime> {
        let arrival = self.arrivals.front().map(|spec| spec.arrival);
        match (arrival, self.pending_wake) {
            (Some(a), Some(w)) => Some(a.min(w)),
            (a, w) => a.or(w),
        }
    }

    /// Process the next event.  Returns its timestamp, or `None` when the
    /// simulation has run dry.
    pub fn step(&mut self) -> Option<SimTime> {
        let t = self.next_event()?;
        self.now = t;

        while let Some(spec) = self.arrivals.front() {
            if spec.arrival > t {
                break;
            }
            let Some(spec) = self.arrivals.pop_front() else {
                break;
            };
            if let Err(e) = self.engine.submit_at(spec.to_task(), t) {
                // Workload validation already checks priority and service time
                warn!(task = %spec.id, "dropping task: {e}");
                self.records.remove(&spec.id);
            }
        }

        let wake = self.engine.advance(t);
        self.decisions += 1;
        self.pending_wake = wake.time();

        for done in self.engine.notifier_mut().drain() {
            debug!(
                task = %done.task.id(),
                origin = %done.origin,
                at = done.at,
                "delivered completion"
            );
            if let Some(record) = self.records.get_mut(&done.task.id()) {
                record.completion = Some(done.at);
                record.response_time = Some(done.at - record.arrival);
            }
        }

        if let NextWake::At(w) = wake {
            debug!(now = t, wake = w, "next decision point");
        }
        Some(t)
    }

    /// Run until no events remain or the next event lies past `until`.
    pub fn run(mut self, until: Option<SimTime>) -> SimReport {
        info!(
            scheduler = %self.engine.name(),
            cores = self.engine.core_count(),
            tasks = self.records.len(),
            until = ?until,
            "simulation started"
        );

        while let Some(t) = self.next_event() {
            if until.is_some_and(|limit| t > limit) {
                info!(next_event = t, "stopping at horizon");
                break;
            }
            self.step();
        }

        self.into_report()
    }

    fn into_report(mut self) -> SimReport {
        let metrics = self.engine.metrics();
        for event in metrics.events() {
            let Some(record) = self.records.get_mut(&event.task) else {
                continue;
            };
            match event.kind {
                EventKind::Running if record.first_run.is_none() => {
                    record.first_run = Some(event.at)
                }
                EventKind::Preempted => record.preemptions += 1,
                _ => {}
            }
        }

        let tasks: Vec<TaskRecord> = self.records.into_values().collect();
        let completed = metrics.count(EventKind::Completed);
        let report = SimReport {
            scheduler: self.engine.name().to_string(),
            cores: self.engine.core_count(),
            requeue: self.engine.requeue_policy(),
            end_time: self.now,
            decisions: self.decisions,
            added: metrics.count(EventKind::Added),
            runs: metrics.count(EventKind::Running),
            preemptions: metrics.count(EventKind::Preempted),
            completed,
            unfinished: tasks.len().saturating_sub(completed),
            tasks,
        };

        info!(
            end_time = report.end_time,
            decisions = report.decisions,
            completed = report.completed,
            preemptions = report.preemptions,
            unfinished = report.unfinished,
            "simulation finished"
        );
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
