//! Preemptive multi-core SCHED_FIFO decision engine.
//!
//! [`SchedulingEngine`] owns a [`PriorityLadder`] of waiting tasks and a
//! [`CoreSet`].  Producers hand it tasks with [`submit`]; an external clock
//! calls [`advance`] with the current time, and the engine
//!
//! 1. charges the elapsed time to every running task and completes the ones
//!    that ran out,
//! 2. walks the ladder from the highest level down, filling idle cores and
//!    preempting cores that run something of strictly lower priority,
//! 3. returns when it next needs to be called ([`NextWake`]).
//!
//! # Ordering rules
//!
//! | Rule | Effect |
//! |---|---|
//! | FIFO within a level | equal priorities run in arrival order |
//! | Strict preemption | a running task is only displaced by a strictly higher level |
//! | Core order | lower core indices are filled / preempted first |
//! | Head requeue | a displaced task goes to the *head* of a queue, ahead of later arrivals |
//!
//! # Requeue level
//! With [`RequeuePolicy::IncomingLevel`] (the default) a displaced task is put
//! back at the head of the level that displaced it, not at its own priority.
//! It keeps its own `priority` field, so it can be displaced again by anything
//! above that.  [`RequeuePolicy::OwnLevel`] puts it back at the head of its own
//! level instead, which is the Linux `SCHED_FIFO` rule.  See the tests at the
//! bottom of this file for a case where the two diverge.
//!
//! # Example
//! ```rust
//! use fifo_sched::config::EngineConfig;
//! use fifo_sched::notify::CompletionQueue;
//! use fifo_sched::scheduler::{NextWake, SchedulingEngine};
//! use fifo_sched::task::{Origin, Task, TaskId};
//!
//! let config = EngineConfig { cores: 1, ..Default::default() };
//! let mut engine = SchedulingEngine::new(&config, CompletionQueue::new()).unwrap();
//!
//! engine.submit(Task::new(TaskId(1), 50, 10.0, Origin::new("camera"))).unwrap();
//! assert_eq!(engine.advance(0.0), NextWake::At(10.0));
//! assert_eq!(engine.advance(10.0), NextWake::Idle);
//! assert_eq!(engine.notifier_mut().drain().len(), 1);
//! ```
//!
//! [`submit`]: SchedulingEngine::submit
//! [`advance`]: SchedulingEngine::advance

pub mod cores;
pub mod error;
pub mod ladder;

pub use cores::{Core, CoreSet, CoreState};
pub use error::{InvariantViolation, SchedulerError};
pub use ladder::{Level, PriorityLadder, PriorityRange};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::notify::CompletionNotifier;
use crate::task::{SimTime, Task};

// ── Public value types ────────────────────────────────────────────────────────

/// Where a task displaced by preemption is put back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeuePolicy {
    /// Head of the level of the task that displaced it.
    #[default]
    IncomingLevel,
    /// Head of the displaced task's own priority level.
    OwnLevel,
}

/// Result of [`SchedulingEngine::advance`]: when the clock must call again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextWake {
    /// Earliest completion among the running tasks.
    At(SimTime),
    /// No core is busy; nothing will happen until the next `submit`.
    Idle,
}

impl NextWake {
    pub fn time(self) -> Option<SimTime> {
        match self {
            NextWake::At(t) => Some(t),
            NextWake::Idle => None,
        }
    }

    pub fn is_idle(self) -> bool {
        matches!(self, NextWake::Idle)
    }
}

// ── SchedulingEngine ──────────────────────────────────────────────────────────

/// One independent scheduler instance.
///
/// `N` receives finished tasks, `M` receives metrics events.  All scheduling
/// state lives inside the instance; any number of engines can coexist.
///
/// The engine is single-threaded by construction (`&mut self` on every
/// mutating call).  A concurrent host must serialise `submit` / `advance`
/// itself, in timestamp order.
pub struct SchedulingEngine<N, M = NoopMetrics> {
    name: String,
    ladder: PriorityLadder,
    cores: CoreSet,
    requeue: RequeuePolicy,
    /// `None` until the first `advance`; the clock picks the epoch.
    last_time: Option<SimTime>,
    notifier: N,
    metrics: M,
}

impl<N: CompletionNotifier> SchedulingEngine<N, NoopMetrics> {
    /// Build an engine that discards metrics.
    ///
    /// # Errors
    /// [`SchedulerError::NoCores`] or [`SchedulerError::InvertedPriorityRange`]
    /// for an unusable configuration.
    pub fn new(config: &EngineConfig, notifier: N) -> Result<Self, SchedulerError> {
        Self::with_metrics(config, notifier, NoopMetrics)
    }
}

impl<N: CompletionNotifier, M: MetricsSink> SchedulingEngine<N, M> {
    /// Build an engine reporting to `metrics`.
    pub fn with_metrics(
        config: &EngineConfig,
        notifier: N,
        metrics: M,
    ) -> Result<Self, SchedulerError> {
        let range = config.validate()?;

        info!(
            scheduler = %config.name,
            cores = config.cores,
            min_priority = range.min,
            max_priority = range.max,
            requeue = ?config.requeue,
            "scheduling engine initialised"
        );

        Ok(Self {
            name: config.name.clone(),
            ladder: PriorityLadder::new(range),
            cores: CoreSet::new(config.cores),
            requeue: config.requeue,
            last_time: None,
            notifier,
            metrics,
        })
    }

    // ── Public operations ─────────────────────────────────────────────────────

    /// Queue `task` at the tail of its priority level.
    ///
    /// Nothing is placed on a core until the next [`advance`](Self::advance).
    /// The metrics "added" event is stamped with the time of the last
    /// `advance` (`0.0` before the first one); use
    /// [`submit_at`](Self::submit_at) when the producer knows the current
    /// time.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidServiceTime`] for a negative or non-finite
    /// service time, [`SchedulerError::PriorityOutOfRange`] if the priority is
    /// outside the configured range.  Nothing is mutated and the task is
    /// returned inside the error.
    pub fn submit(&mut self, task: Task) -> Result<(), SchedulerError> {
        let now = self.last_time.unwrap_or(0.0);
        self.submit_at(task, now)
    }

    /// [`submit`](Self::submit) with an explicit timestamp for the metrics
    /// event.  `now` does not influence elapsed-time accounting.
    pub fn submit_at(&mut self, task: Task, now: SimTime) -> Result<(), SchedulerError> {
        let service = task.remaining();
        if !service.is_finite() || service < 0.0 {
            warn!(
                scheduler = %self.name,
                task = %task.id(),
                service,
                "rejecting task with invalid service time"
            );
            return Err(SchedulerError::InvalidServiceTime {
                task: Box::new(task),
            });
        }

        let range = self.ladder.range();
        if !range.contains(task.priority()) {
            warn!(
                scheduler = %self.name,
                task = %task.id(),
                priority = task.priority(),
                min = range.min,
                max = range.max,
                "rejecting task with out-of-range priority"
            );
            return Err(SchedulerError::PriorityOutOfRange {
                task: Box::new(task),
                min: range.min,
                max: range.max,
            });
        }

        debug!(
            scheduler = %self.name,
            task = %task.id(),
            origin = %task.origin(),
            priority = task.priority(),
            service = task.remaining(),
            "task queued"
        );
        self.metrics.task_added(&self.name, &task, now);
        self.ladder.enqueue_tail(task)
    }

    /// Run one decision step at time `now` and return the next wake time.
    ///
    /// The first call sets the baseline, so any epoch (negative included)
    /// works.  A `now` earlier than the previous call is treated as no
    /// elapsed time; the engine's clock never moves backwards.
    pub fn advance(&mut self, now: SimTime) -> NextWake {
        let last = self.last_time.unwrap_or(now);
        let elapsed = if now < last {
            warn!(
                scheduler = %self.name,
                now,
                last,
                "clock went backwards, accounting zero elapsed time"
            );
            0.0
        } else {
            now - last
        };
        let now = last.max(now);
        self.last_time = Some(now);

        self.complete_finished(elapsed, now);
        self.reassign(now);
        self.next_wake(now)
    }

    // ── Step 1: accounting ────────────────────────────────────────────────────

    fn complete_finished(&mut self, elapsed: SimTime, now: SimTime) {
        for index in self.cores.consume(elapsed, now) {
            let task = self.cores.release(index).unwrap_or_else(|v| fatal(v));
            debug!(
                scheduler = %self.name,
                task = %task.id(),
                origin = %task.origin(),
                core = index,
                now,
                "task completed"
            );
            self.metrics.task_completed(&self.name, &task, now);
            let origin = task.origin().clone();
            self.notifier.task_completed(&origin, task, now);
        }
    }

    // ── Step 2: assignment / preemption ───────────────────────────────────────

    fn reassign(&mut self, now: SimTime) {
        // Re-read after each level: an own-level requeue can fill a level
        // below the one being served.
        let mut cursor = self.ladder.highest();
        while let Some(level) = cursor {
            for index in 0..self.cores.len() {
                if self.ladder.is_level_empty(level) {
                    break;
                }

                let running = self
                    .cores
                    .get(index)
                    .and_then(Core::current)
                    .map(Task::priority);

                match running {
                    None => self.start(index, level, now),
                    Some(priority) if priority < level.priority() => {
                        self.preempt(index, level, now)
                    }
                    // Equal or higher priority keeps its core
                    Some(_) => {}
                }
            }
            cursor = self.ladder.next_below(level);
        }
    }

    /// Idle core: take the head of `level`.
    fn start(&mut self, index: usize, level: Level, now: SimTime) {
        if let Some(task) = self.ladder.pop_head(level) {
            self.run_on(index, task, now);
        }
    }

    /// Busy core running something below `level`: swap in the head of
    /// `level`, requeue the displaced task at the head of a queue.
    fn preempt(&mut self, index: usize, level: Level, now: SimTime) {
        let Some(incoming) = self.ladder.pop_head(level) else {
            return;
        };
        let displaced = self.cores.release(index).unwrap_or_else(|v| fatal(v));

        let requeue_level = match self.requeue {
            RequeuePolicy::IncomingLevel => level,
            // Always Some: the displaced task passed the range check on submit
            RequeuePolicy::OwnLevel => self
                .ladder
                .level_of(displaced.priority())
                .unwrap_or(level),
        };

        debug!(
            scheduler = %self.name,
            core = index,
            displaced = %displaced.id(),
            displaced_priority = displaced.priority(),
            incoming = %incoming.id(),
            incoming_priority = incoming.priority(),
            requeue_level = requeue_level.priority(),
            remaining = displaced.remaining(),
            "preempting"
        );
        self.metrics.task_preempted(&self.name, &displaced, index, now);
        self.ladder.enqueue_head(displaced, requeue_level);
        self.run_on(index, incoming, now);
    }

    fn run_on(&mut self, index: usize, task: Task, now: SimTime) {
        self.cores.assign(index, task).unwrap_or_else(|v| fatal(v));
        if let Some(task) = self.cores.get(index).and_then(Core::current) {
            self.metrics.task_running(&self.name, task, index, now);
        }
    }

    // ── Step 3: next wake ─────────────────────────────────────────────────────

    fn next_wake(&self, now: SimTime) -> NextWake {
        for core in self.cores.iter() {
            if let Some(task) = core.current() {
                debug!(
                    scheduler = %self.name,
                    task = %task.id(),
                    origin = %task.origin(),
                    core = core.index(),
                    remaining = task.remaining(),
                    "running"
                );
            }
        }

        match self.cores.min_remaining() {
            Some(remaining) => NextWake::At(now + remaining),
            None => NextWake::Idle,
        }
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    /// Logical name reported to metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority_range(&self) -> PriorityRange {
        self.ladder.range()
    }

    pub fn requeue_policy(&self) -> RequeuePolicy {
        self.requeue
    }

    /// Timestamp of the most recent `advance`, `None` before the first.
    pub fn last_time(&self) -> Option<SimTime> {
        self.last_time
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Number of waiting tasks.
    pub fn queued_len(&self) -> usize {
        self.ladder.len()
    }

    /// Tasks waiting in the queue for `priority`, head first.
    pub fn queued_at(&self, priority: i32) -> impl Iterator<Item = &Task> {
        self.ladder.queued_at(priority)
    }

    /// Task currently running on `core`.
    pub fn running_on(&self, core: usize) -> Option<&Task> {
        self.cores.get(core).and_then(Core::current)
    }

    pub fn core_states(&self) -> Vec<CoreState> {
        self.cores.iter().map(Core::state).collect()
    }

    /// `true` when no task is waiting or running.
    pub fn is_quiescent(&self) -> bool {
        self.ladder.is_empty() && self.cores.iter().all(|c| c.state() == CoreState::Idle)
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Verify that no task is held in more than one place.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::new();
        let queued = self.ladder.iter().map(Task::id);
        for id in queued.chain(self.cores.running_ids()) {
            if !seen.insert(id) {
                return Err(InvariantViolation::DuplicateTask { task: id });
            }
        }
        Ok(())
    }
}

/// Engine bugs are not recoverable.
fn fatal(violation: InvariantViolation) -> ! {
    panic!("scheduler invariant violated: {violation}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{EventKind, MetricsRecorder};
    use crate::notify::CompletionQueue;
    use crate::task::{Origin, TaskId};

    // ── Test helpers ──────────────────────────────────────────────────────────

    type Engine = SchedulingEngine<CompletionQueue, MetricsRecorder>;

    fn engine_with(cores: usize, min: i32, max: i32, requeue: RequeuePolicy) -> Engine {
        let config = EngineConfig {
            name: "cpu".into(),
            cores,
            min_priority: min,
            max_priority: max,
            requeue,
        };
        SchedulingEngine::with_metrics(&config, CompletionQueue::new(), MetricsRecorder::new())
            .unwrap()
    }

    fn engine(cores: usize) -> Engine {
        engine_with(cores, 1, 10, RequeuePolicy::IncomingLevel)
    }

    fn task(id: u64, priority: i32, service: SimTime) -> Task {
        Task::new(TaskId(id), priority, service, Origin::new(format!("src{id}")))
    }

    fn running_id(e: &Engine, core: usize) -> Option<u64> {
        e.running_on(core).map(|t| t.id().0)
    }

    fn queued_ids(e: &Engine, priority: i32) -> Vec<u64> {
        e.queued_at(priority).map(|t| t.id().0).collect()
    }

    fn completed_ids(e: &mut Engine) -> Vec<u64> {
        e.notifier_mut()
            .drain()
            .into_iter()
            .map(|c| c.task.id().0)
            .collect()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn zero_cores_is_rejected() {
        let config = EngineConfig {
            cores: 0,
            ..Default::default()
        };
        assert!(matches!(
            SchedulingEngine::new(&config, CompletionQueue::new()),
            Err(SchedulerError::NoCores)
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let config = EngineConfig {
            min_priority: 5,
            max_priority: 1,
            ..Default::default()
        };
        assert!(matches!(
            SchedulingEngine::new(&config, CompletionQueue::new()),
            Err(SchedulerError::InvertedPriorityRange { min: 5, max: 1 })
        ));
    }

    #[test]
    fn independent_engines_do_not_share_state() {
        let mut a = engine(1);
        let b = engine(1);
        a.submit(task(1, 5, 1.0)).unwrap();
        assert_eq!(a.queued_len(), 1);
        assert_eq!(b.queued_len(), 0);
    }

    // ── Scenario 1: FIFO on one core ──────────────────────────────────────────

    #[test]
    fn equal_priority_runs_in_arrival_order() {
        let mut e = engine(1);
        e.submit(task(1, 5, 10.0)).unwrap();
        e.submit(task(2, 5, 5.0)).unwrap();

        assert_eq!(e.advance(0.0), NextWake::At(10.0));
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(queued_ids(&e, 5), vec![2]);

        assert_eq!(e.advance(10.0), NextWake::At(15.0));
        assert_eq!(completed_ids(&mut e), vec![1]);
        assert_eq!(running_id(&e, 0), Some(2));
    }

    // ── Scenario 2: preemption ────────────────────────────────────────────────

    #[test]
    fn higher_priority_arrival_preempts() {
        let mut e = engine(1);
        e.submit(task(1, 3, 20.0)).unwrap();
        assert_eq!(e.advance(0.0), NextWake::At(20.0));

        e.submit(task(2, 7, 4.0)).unwrap();
        assert_eq!(e.advance(5.0), NextWake::At(9.0));

        assert_eq!(running_id(&e, 0), Some(2));
        let displaced: Vec<&Task> = e.queued_at(7).collect();
        assert_eq!(displaced.len(), 1);
        assert_eq!(displaced[0].id(), TaskId(1));
        assert!((displaced[0].remaining() - 15.0).abs() < 1e-12);
        assert!(completed_ids(&mut e).is_empty());
    }

    #[test]
    fn preempted_task_resumes_with_remaining_time() {
        let mut e = engine(1);
        e.submit(task(1, 3, 20.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 7, 4.0)).unwrap();
        e.advance(5.0);

        // B finishes at 9, A resumes with 15 left
        assert_eq!(e.advance(9.0), NextWake::At(24.0));
        assert_eq!(completed_ids(&mut e), vec![2]);
        assert_eq!(running_id(&e, 0), Some(1));

        assert_eq!(e.advance(24.0), NextWake::Idle);
        assert_eq!(completed_ids(&mut e), vec![1]);
        assert!(e.is_quiescent());
    }

    // ── Scenario 3: idle ──────────────────────────────────────────────────────

    #[test]
    fn nothing_submitted_returns_idle() {
        let mut e = engine(2);
        assert_eq!(e.advance(0.0), NextWake::Idle);
        assert_eq!(e.core_states(), vec![CoreState::Idle, CoreState::Idle]);
    }

    // ── Scenario 4: configuration error ───────────────────────────────────────

    #[test]
    fn out_of_range_priority_is_rejected_without_mutation() {
        let mut e = engine(1);
        let err = e.submit(task(1, 11, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::PriorityOutOfRange { min: 1, max: 10, .. }
        ));
        assert_eq!(e.queued_len(), 0);
        assert_eq!(e.metrics().count(EventKind::Added), 0);

        let err = e.submit(task(2, 0, 1.0)).unwrap_err();
        assert_eq!(err.into_rejected_task().unwrap().id(), TaskId(2));
        assert_eq!(e.advance(0.0), NextWake::Idle);
    }

    #[test]
    fn invalid_service_times_are_rejected_without_mutation() {
        let mut e = engine(1);
        for (id, service) in [
            (1, f64::NAN),
            (2, -3.0),
            (3, f64::INFINITY),
            (4, f64::NEG_INFINITY),
        ] {
            let err = e.submit(task(id, 5, service)).unwrap_err();
            assert!(
                matches!(err, SchedulerError::InvalidServiceTime { .. }),
                "{service}"
            );
            assert_eq!(err.into_rejected_task().unwrap().id(), TaskId(id));
        }
        assert_eq!(e.queued_len(), 0);
        assert_eq!(e.metrics().count(EventKind::Added), 0);
        assert_eq!(e.advance(0.0), NextWake::Idle);
        assert_eq!(e.advance(1e9), NextWake::Idle);
        assert!(completed_ids(&mut e).is_empty());
    }

    #[test]
    fn service_time_is_checked_before_priority() {
        let mut e = engine(1);
        let err = e.submit(task(1, 99, f64::NAN)).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidServiceTime { .. }));
    }

    #[test]
    fn full_i32_priority_range_is_usable() {
        let mut e = engine_with(1, i32::MIN, i32::MAX, RequeuePolicy::OwnLevel);
        e.submit(task(1, i32::MIN, 2.0)).unwrap();
        e.submit(task(2, i32::MAX, 1.0)).unwrap();

        assert_eq!(e.advance(0.0), NextWake::At(1.0));
        assert_eq!(running_id(&e, 0), Some(2));
        assert_eq!(e.advance(1.0), NextWake::At(3.0));
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(e.advance(3.0), NextWake::Idle);
        assert_eq!(completed_ids(&mut e), vec![2, 1]);
    }

    #[test]
    fn wide_range_with_nothing_queued_is_idle() {
        let mut e = engine_with(4, 0, 20_000_000, RequeuePolicy::IncomingLevel);
        for step in 0..1_000 {
            assert_eq!(e.advance(step as f64), NextWake::Idle);
        }
        assert!(e.is_quiescent());
    }

    // ── Scenario 5: two cores, three equal tasks ──────────────────────────────

    #[test]
    fn two_cores_fill_then_backfill() {
        let mut e = engine(2);
        e.submit(task(1, 5, 4.0)).unwrap();
        e.submit(task(2, 5, 6.0)).unwrap();
        e.submit(task(3, 5, 2.0)).unwrap();

        assert_eq!(e.advance(0.0), NextWake::At(4.0));
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(running_id(&e, 1), Some(2));
        assert_eq!(queued_ids(&e, 5), vec![3]);

        assert_eq!(e.advance(4.0), NextWake::At(6.0));
        assert_eq!(completed_ids(&mut e), vec![1]);
        assert_eq!(running_id(&e, 0), Some(3));
        assert_eq!(running_id(&e, 1), Some(2));
    }

    // ── Ordering properties ───────────────────────────────────────────────────

    #[test]
    fn equal_priority_never_preempts() {
        let mut e = engine(1);
        e.submit(task(1, 5, 10.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 5, 1.0)).unwrap();

        e.advance(1.0);
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(e.metrics().count(EventKind::Preempted), 0);
    }

    #[test]
    fn lower_priority_never_preempts() {
        let mut e = engine(1);
        e.submit(task(1, 5, 10.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 4, 1.0)).unwrap();

        assert_eq!(e.advance(2.0), NextWake::At(10.0));
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(queued_ids(&e, 4), vec![2]);
    }

    #[test]
    fn highest_level_is_served_first() {
        let mut e = engine(1);
        e.submit(task(1, 2, 1.0)).unwrap();
        e.submit(task(2, 9, 1.0)).unwrap();
        e.submit(task(3, 5, 1.0)).unwrap();

        e.advance(0.0);
        assert_eq!(running_id(&e, 0), Some(2));
        e.advance(1.0);
        assert_eq!(running_id(&e, 0), Some(3));
        e.advance(2.0);
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(completed_ids(&mut e), vec![2, 3]);
    }

    #[test]
    fn low_index_cores_are_filled_first() {
        let mut e = engine(3);
        e.submit(task(1, 5, 1.0)).unwrap();
        e.advance(0.0);
        assert_eq!(
            e.core_states(),
            vec![CoreState::Busy, CoreState::Idle, CoreState::Idle]
        );
    }

    #[test]
    fn lowest_index_lower_priority_core_is_preempted_first() {
        let mut e = engine_with(2, 1, 10, RequeuePolicy::OwnLevel);
        e.submit(task(1, 2, 10.0)).unwrap();
        e.submit(task(2, 2, 10.0)).unwrap();
        e.advance(0.0);

        e.submit(task(3, 8, 1.0)).unwrap();
        e.advance(1.0);
        assert_eq!(running_id(&e, 0), Some(3));
        assert_eq!(running_id(&e, 1), Some(2));
        assert_eq!(queued_ids(&e, 2), vec![1]);
    }

    #[test]
    fn idle_cores_are_filled_before_advance_returns() {
        let mut e = engine(4);
        for id in 1..=6 {
            e.submit(task(id, (id % 3) as i32 + 1, id as f64)).unwrap();
        }
        e.advance(0.0);
        assert!(e.core_states().iter().all(|s| *s == CoreState::Busy));
        assert_eq!(e.queued_len(), 2);
    }

    #[test]
    fn submit_alone_does_not_assign() {
        let mut e = engine(1);
        e.submit(task(1, 5, 1.0)).unwrap();
        assert_eq!(e.core_states(), vec![CoreState::Idle]);
        assert_eq!(e.metrics().count(EventKind::Running), 0);
    }

    // ── Completion and wake ───────────────────────────────────────────────────

    #[test]
    fn completion_fires_exactly_once() {
        let mut e = engine(2);
        e.submit(task(1, 5, 3.0)).unwrap();
        e.submit(task(2, 5, 7.0)).unwrap();
        e.advance(0.0);

        e.advance(3.0);
        e.advance(5.0);
        e.advance(7.0);
        e.advance(20.0);

        assert_eq!(completed_ids(&mut e), vec![1, 2]);
        assert_eq!(e.metrics().count(EventKind::Completed), 2);
    }

    #[test]
    fn completion_is_delivered_to_the_origin() {
        let mut e = engine(1);
        e.submit(task(4, 5, 1.0)).unwrap();
        e.advance(0.0);
        e.advance(1.5);

        let done = e.notifier_mut().drain();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].origin.name(), "src4");
        assert_eq!(done[0].at, 1.5);
        assert!(done[0].task.is_complete());
    }

    #[test]
    fn late_wake_still_completes() {
        let mut e = engine(1);
        e.submit(task(1, 5, 2.0)).unwrap();
        e.submit(task(2, 5, 2.0)).unwrap();
        e.advance(0.0);

        // Clock overshoots the wake time; overshoot is not credited to T2
        assert_eq!(e.advance(3.0), NextWake::At(5.0));
        assert_eq!(completed_ids(&mut e), vec![1]);
    }

    #[test]
    fn next_wake_is_minimum_over_busy_cores() {
        let mut e = engine(3);
        e.submit(task(1, 5, 8.0)).unwrap();
        e.submit(task(2, 5, 3.0)).unwrap();
        e.submit(task(3, 5, 5.0)).unwrap();
        assert_eq!(e.advance(1.0), NextWake::At(4.0));
    }

    #[test]
    fn clock_going_backwards_accounts_nothing() {
        let mut e = engine(1);
        e.submit(task(1, 5, 10.0)).unwrap();
        e.advance(5.0);
        assert_eq!(e.advance(2.0), NextWake::At(15.0));
        assert_eq!(e.last_time(), Some(5.0));
        assert!((e.running_on(0).unwrap().remaining() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn first_advance_sets_the_epoch() {
        let mut e = engine(1);
        assert_eq!(e.last_time(), None);
        e.submit(task(1, 5, 4.0)).unwrap();

        assert_eq!(e.advance(-10.0), NextWake::At(-6.0));
        assert_eq!(e.last_time(), Some(-10.0));
        assert_eq!(e.advance(-6.0), NextWake::Idle);
        assert_eq!(completed_ids(&mut e), vec![1]);
    }

    #[test]
    fn residue_below_clock_resolution_completes() {
        let mut e = engine(1);
        e.submit(task(1, 5, 0.1)).unwrap();
        e.advance(1e6);
        let wake = e.advance(1e6).time().unwrap();
        // 1e6 + 0.1 - 1e6 is not exactly 0.1; the residue must not stall the clock
        assert_eq!(e.advance(wake), NextWake::Idle);
        assert_eq!(completed_ids(&mut e), vec![1]);
    }

    #[test]
    fn zero_service_task_completes_on_next_advance() {
        let mut e = engine(1);
        e.submit(task(1, 5, 0.0)).unwrap();
        assert_eq!(e.advance(2.0), NextWake::At(2.0));
        assert_eq!(e.advance(2.0), NextWake::Idle);
        assert_eq!(completed_ids(&mut e), vec![1]);
    }

    // ── Requeue level ─────────────────────────────────────────────────────────

    /// Core 0 runs A(p3), core 1 runs C(p5); B(p7) arrives.
    fn cascade(requeue: RequeuePolicy) -> Engine {
        let mut e = engine_with(2, 1, 10, requeue);
        e.submit(task(1, 3, 10.0)).unwrap(); // A
        e.submit(task(3, 5, 10.0)).unwrap(); // C
        e.advance(0.0);
        assert_eq!(running_id(&e, 0), Some(3));
        assert_eq!(running_id(&e, 1), Some(1));
        e
    }

    #[test]
    fn displaced_task_is_requeued_at_the_incoming_level() {
        let mut e = engine(1);
        e.submit(task(1, 3, 20.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 7, 4.0)).unwrap();
        e.advance(5.0);

        // Requeued behind the level-7 head, not at its own level 3
        assert_eq!(queued_ids(&e, 7), vec![1]);
        assert!(queued_ids(&e, 3).is_empty());
        // Its own priority is unchanged
        assert_eq!(e.queued_at(7).next().unwrap().priority(), 3);
    }

    #[test]
    fn own_level_policy_requeues_at_own_priority() {
        let mut e = engine_with(1, 1, 10, RequeuePolicy::OwnLevel);
        e.submit(task(1, 3, 20.0)).unwrap();
        e.submit(task(4, 3, 1.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 7, 4.0)).unwrap();
        e.advance(5.0);

        // Head of level 3, ahead of T4 which arrived later
        assert_eq!(queued_ids(&e, 3), vec![1, 4]);
        assert!(queued_ids(&e, 7).is_empty());
    }

    #[test]
    fn incoming_level_requeue_jumps_ahead_of_same_level_waiters() {
        let mut e = engine(1);
        e.submit(task(1, 3, 20.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 7, 4.0)).unwrap();
        e.submit(task(5, 7, 4.0)).unwrap();
        e.advance(5.0);

        // T1 (priority 3) sits ahead of T5 (priority 7) in the level-7 queue
        assert_eq!(queued_ids(&e, 7), vec![1, 5]);

        // ...and runs to completion ahead of it once T2 finishes
        assert_eq!(e.advance(9.0), NextWake::At(24.0));
        assert_eq!(running_id(&e, 0), Some(1));
        assert_eq!(queued_ids(&e, 7), vec![5]);
    }

    #[test]
    fn incoming_level_requeue_cascades_across_cores() {
        let mut e = cascade(RequeuePolicy::IncomingLevel);
        // Level-7 pass: B displaces C on core 0, C is requeued at level 7
        // and then displaces A on core 1, which lands at level 7 as well.
        e.submit(task(2, 7, 10.0)).unwrap();
        e.advance(1.0);

        assert_eq!(running_id(&e, 0), Some(2));
        assert_eq!(running_id(&e, 1), Some(3));
        assert_eq!(queued_ids(&e, 7), vec![1]);
        assert_eq!(e.metrics().count(EventKind::Preempted), 2);
        e.check_invariants().unwrap();
    }

    #[test]
    fn own_level_requeue_cascades_by_real_priority() {
        let mut e = cascade(RequeuePolicy::OwnLevel);
        // C goes back to level 5, then displaces A on core 1 during the
        // level-5 pass; A ends up at the head of level 3.
        e.submit(task(2, 7, 10.0)).unwrap();
        e.advance(1.0);

        assert_eq!(running_id(&e, 0), Some(2));
        assert_eq!(running_id(&e, 1), Some(3));
        assert_eq!(queued_ids(&e, 3), vec![1]);
        assert!(queued_ids(&e, 7).is_empty());
        assert_eq!(e.metrics().count(EventKind::Preempted), 2);
        e.check_invariants().unwrap();
    }

    /// One core: A(p3) is displaced by B(p7) at 5, E(p5) arrives at 6, B
    /// finishes at 9.
    fn resume_after_preemption(requeue: RequeuePolicy) -> Engine {
        let mut e = engine_with(1, 1, 10, requeue);
        e.submit(task(1, 3, 20.0)).unwrap();
        e.advance(0.0);
        e.submit(task(2, 7, 4.0)).unwrap();
        e.advance(5.0);
        e.submit(task(6, 5, 1.0)).unwrap();
        e.advance(6.0);
        e.advance(9.0);
        e
    }

    #[test]
    fn incoming_level_requeue_runs_briefly_then_yields_again() {
        let e = resume_after_preemption(RequeuePolicy::IncomingLevel);

        // A is served from level 7, then displaced by E in the level-5 pass
        assert_eq!(running_id(&e, 0), Some(6));
        assert_eq!(queued_ids(&e, 5), vec![1]);
        let a_events: Vec<(EventKind, SimTime)> = e
            .metrics()
            .for_task(TaskId(1))
            .map(|ev| (ev.kind, ev.at))
            .collect();
        assert_eq!(
            &a_events[a_events.len() - 2..],
            &[(EventKind::Running, 9.0), (EventKind::Preempted, 9.0)]
        );
    }

    #[test]
    fn own_level_requeue_waits_at_its_own_level() {
        let e = resume_after_preemption(RequeuePolicy::OwnLevel);

        assert_eq!(running_id(&e, 0), Some(6));
        assert_eq!(queued_ids(&e, 3), vec![1]);
        assert_eq!(e.metrics().count(EventKind::Preempted), 1);
    }

    #[test]
    fn preemption_prefers_low_index_even_with_idle_core() {
        // One task on core 0, core 1 idle: the level walk reaches core 0 first
        let mut e = engine(2);
        e.submit(task(1, 3, 10.0)).unwrap();
        e.advance(0.0);

        e.submit(task(2, 7, 10.0)).unwrap();
        e.advance(1.0);

        assert_eq!(running_id(&e, 0), Some(2));
        // The displaced task migrates to the idle core in the same pass
        assert_eq!(running_id(&e, 1), Some(1));
        assert_eq!(e.queued_len(), 0);
    }

    #[test]
    fn own_level_requeue_onto_an_empty_level_still_reaches_the_idle_core() {
        let mut e = engine_with(2, 1, 10, RequeuePolicy::OwnLevel);
        e.submit(task(1, 3, 10.0)).unwrap();
        e.advance(0.0);

        // Level 3 is empty when the walk starts at 7
        e.submit(task(2, 7, 10.0)).unwrap();
        e.advance(1.0);

        assert_eq!(running_id(&e, 0), Some(2));
        assert_eq!(running_id(&e, 1), Some(1));
        assert_eq!(e.queued_len(), 0);
    }

    // ── Metrics ───────────────────────────────────────────────────────────────

    #[test]
    fn metrics_trace_a_preempted_task() {
        let mut e = engine(1);
        e.submit_at(task(1, 3, 20.0), 0.0).unwrap();
        e.advance(0.0);
        e.submit_at(task(2, 7, 4.0), 5.0).unwrap();
        e.advance(5.0);
        e.advance(9.0);
        e.advance(24.0);

        let kinds: Vec<(EventKind, SimTime)> = e
            .metrics()
            .for_task(TaskId(1))
            .map(|ev| (ev.kind, ev.at))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Added, 0.0),
                (EventKind::Running, 0.0),
                (EventKind::Preempted, 5.0),
                (EventKind::Running, 9.0),
                (EventKind::Completed, 24.0),
            ]
        );
        assert!(e.metrics().events().iter().all(|ev| ev.scheduler == "cpu"));
    }

    #[test]
    fn submit_stamps_metrics_with_last_advance_time() {
        let mut e = engine(1);
        e.advance(3.0);
        e.submit(task(1, 5, 1.0)).unwrap();
        assert_eq!(e.metrics().events()[0].at, 3.0);
    }

    #[test]
    fn closure_notifier_and_default_metrics() {
        let mut done = Vec::new();
        {
            let config = EngineConfig::default();
            let mut e = SchedulingEngine::new(&config, |_: &Origin, t: Task, now: SimTime| {
                done.push((t.id(), now));
            })
            .unwrap();
            e.submit(task(1, 50, 2.0)).unwrap();
            e.advance(0.0);
            e.advance(2.0);
        }
        assert_eq!(done, vec![(TaskId(1), 2.0)]);
    }

    // ── Invariants ────────────────────────────────────────────────────────────

    #[test]
    fn invariants_hold_through_a_busy_run() {
        let mut e = engine(3);
        let mut now = 0.0;
        for id in 1..=30u64 {
            e.submit(task(id, (id * 7 % 10) as i32 + 1, (id % 4 + 1) as f64))
                .unwrap();
            if let Some(t) = e.advance(now).time() {
                now = t.min(now + 0.5);
            } else {
                now += 0.5;
            }
            e.check_invariants().unwrap();
        }
        while let Some(t) = e.advance(now).time() {
            now = t;
            e.check_invariants().unwrap();
        }
        assert!(e.is_quiescent());
        assert_eq!(completed_ids(&mut e).len(), 30);
    }
}
