/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The priority ladder: one FIFO queue of waiting tasks per priority level.
//!
//! Callers resolve a priority into a [`Level`] through
//! [`PriorityLadder::level_of`] (which fails for out-of-range values) or
//! obtain levels by walking the ladder with [`PriorityLadder::highest`] and
//! [`PriorityLadder::next_below`]; every queue access then goes through that
//! token.
//!
//! Only occupied levels are stored, so the cost of a walk depends on the
//! number of waiting tasks, not on the width of the range.

use std::collections::{BTreeMap, VecDeque};

use super::error::SchedulerError;
use crate::task::Task;

// ── PriorityRange ─────────────────────────────────────────────────────────────

/// Inclusive priority range `[min, max]`.  Higher value = served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityRange {
    pub min: i32,
    pub max: i32,
}

impl PriorityRange {
    /// Build a range, rejecting `min > max`.
    pub fn new(min: i32, max: i32) -> Result<Self, SchedulerError> {
        if min > max {
            return Err(SchedulerError::InvertedPriorityRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, priority: i32) -> bool {
        (self.min..=self.max).contains(&priority)
    }

    /// Number of distinct levels in the range.
    pub fn level_count(&self) -> u64 {
        (i64::from(self.max) - i64::from(self.min) + 1) as u64
    }
}

impl Default for PriorityRange {
    /// The Linux real-time range, `1..=99`.
    fn default() -> Self {
        Self { min: 1, max: 99 }
    }
}

// ── Level ─────────────────────────────────────────────────────────────────────

/// A priority value proven to lie inside a ladder's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    priority: i32,
}

impl Level {
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

// ── PriorityLadder ────────────────────────────────────────────────────────────

/// Waiting tasks grouped by priority, arrival order preserved within a level.
///
/// A level has an entry in `queues` iff at least one task waits there.
#[derive(Debug)]
pub struct PriorityLadder {
    range: PriorityRange,
    queues: BTreeMap<i32, VecDeque<Task>>,
}

impl PriorityLadder {
    pub fn new(range: PriorityRange) -> Self {
        Self {
            range,
            queues: BTreeMap::new(),
        }
    }

    pub fn range(&self) -> PriorityRange {
        self.range
    }

    /// Resolve `priority` into a level of this ladder, or `None` if it is out
    /// of range.
    pub fn level_of(&self, priority: i32) -> Option<Level> {
        self.range
            .contains(priority)
            .then_some(Level { priority })
    }

    /// Highest occupied level.
    pub fn highest(&self) -> Option<Level> {
        self.queues
            .keys()
            .next_back()
            .map(|&priority| Level { priority })
    }

    /// Highest occupied level strictly below `level`.
    ///
    /// Reads the current contents, so a level filled after the walk started
    /// is still found.
    pub fn next_below(&self, level: Level) -> Option<Level> {
        self.queues
            .range(..level.priority)
            .next_back()
            .map(|(&priority, _)| Level { priority })
    }

    /// Append `task` to the tail of its own priority level.
    ///
    /// # Errors
    /// [`SchedulerError::PriorityOutOfRange`] if the task's priority has no
    /// level here.  The task travels back inside the error.
    pub fn enqueue_tail(&mut self, task: Task) -> Result<(), SchedulerError> {
        match self.level_of(task.priority()) {
            Some(level) => {
                self.queues.entry(level.priority).or_default().push_back(task);
                Ok(())
            }
            None => Err(SchedulerError::PriorityOutOfRange {
                task: Box::new(task),
                min: self.range.min,
                max: self.range.max,
            }),
        }
    }

    /// Insert `task` at the head of `level`, ahead of everything waiting
    /// there.  Only preemption requeues use this.
    ///
    /// `level` is not required to match the task's own priority.
    pub fn enqueue_head(&mut self, task: Task, level: Level) {
        self.queues.entry(level.priority).or_default().push_front(task);
    }

    /// Remove and return the oldest task waiting at `level`.
    pub fn pop_head(&mut self, level: Level) -> Option<Task> {
        let queue = self.queues.get_mut(&level.priority)?;
        let task = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(&level.priority);
        }
        task
    }

    pub fn is_level_empty(&self, level: Level) -> bool {
        !self.queues.contains_key(&level.priority)
    }

    /// Tasks waiting at `priority`, head first.  Empty for out-of-range
    /// priorities.
    pub fn queued_at(&self, priority: i32) -> impl Iterator<Item = &Task> {
        self.queues.get(&priority).into_iter().flatten()
    }

    /// Every waiting task, highest level first.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.queues.values().rev().flatten()
    }

    /// Total number of waiting tasks across all levels.
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
