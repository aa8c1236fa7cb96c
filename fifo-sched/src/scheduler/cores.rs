/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fixed array of identical cores, each idle or running exactly one task.
//!
//! A core's state is derived from its slot (`Busy` iff a task is present), so
//! the "busy without a task" state cannot be represented.

use super::error::InvariantViolation;
use crate::task::{SimTime, Task, TaskId};

// ── CoreState ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Idle,
    Busy,
}

// ── Core ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Core {
    index: usize,
    current: Option<Task>,
}

impl Core {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> CoreState {
        match self.current {
            Some(_) => CoreState::Busy,
            None => CoreState::Idle,
        }
    }

    /// The task this core is running, if any.
    pub fn current(&self) -> Option<&Task> {
        self.current.as_ref()
    }
}

// ── CoreSet ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CoreSet {
    cores: Vec<Core>,
}

impl CoreSet {
    /// `count` idle cores, indexed `0..count`.
    pub fn new(count: usize) -> Self {
        Self {
            cores: (0..count)
                .map(|index| Core {
                    index,
                    current: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Core> {
        self.cores.get(index)
    }

    /// Cores in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Core> {
        self.cores.iter()
    }

    /// Put `task` on an idle core.
    ///
    /// # Errors
    /// [`InvariantViolation::AssignToBusyCore`] if the core is already running
    /// something, [`InvariantViolation::NoSuchCore`] for a bad index.  The
    /// engine treats both as fatal.
    pub fn assign(&mut self, index: usize, task: Task) -> Result<(), InvariantViolation> {
        let cores = self.cores.len();
        let core = self
            .cores
            .get_mut(index)
            .ok_or(InvariantViolation::NoSuchCore { core: index, cores })?;

        if let Some(running) = &core.current {
            return Err(InvariantViolation::AssignToBusyCore {
                core: index,
                running: running.id(),
                incoming: task.id(),
            });
        }
        core.current = Some(task);
        Ok(())
    }

    /// Take the task off a busy core, leaving it idle.
    ///
    /// # Errors
    /// [`InvariantViolation::ReleaseIdleCore`] if there is nothing to release.
    pub fn release(&mut self, index: usize) -> Result<Task, InvariantViolation> {
        let cores = self.cores.len();
        self.cores
            .get_mut(index)
            .ok_or(InvariantViolation::NoSuchCore { core: index, cores })?
            .current
            .take()
            .ok_or(InvariantViolation::ReleaseIdleCore { core: index })
    }

    /// Charge `elapsed` against every running task, in core order.
    ///
    /// A task is finished once its remaining time is `<= 0`, or once what is
    /// left is too small to move a clock reading of `now` forward (the
    /// rounding residue of `(now + r) - now`).
    ///
    /// Returns the indices of the cores whose task finished; those tasks are
    /// still in place and must be released by the caller.
    pub fn consume(&mut self, elapsed: SimTime, now: SimTime) -> Vec<usize> {
        self.cores
            .iter_mut()
            .filter_map(|core| {
                let task = core.current.as_mut()?;
                let done = task.consume(elapsed) || now + task.remaining() <= now;
                done.then_some(core.index)
            })
            .collect()
    }

    /// Smallest remaining service time among busy cores.
    pub fn min_remaining(&self) -> Option<SimTime> {
        self.cores
            .iter()
            .filter_map(|core| core.current.as_ref().map(Task::remaining))
            .reduce(f64::min)
    }

    /// Ids of the running tasks, in core order (idle cores skipped).
    pub fn running_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.cores.iter().filter_map(|c| c.current.as_ref().map(Task::id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
