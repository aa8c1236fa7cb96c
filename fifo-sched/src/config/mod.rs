//! Engine topology and workload loading.
//!
//! [`EngineConfig`] fixes everything that stays constant for an engine's
//! lifetime: its logical name, core count, priority range and requeue policy.
//! [`Workload`] pairs an engine configuration with a list of task arrivals and
//! is loaded from YAML:
//!
//! ```yaml
//! scheduler:
//!   name: "ecu0.scheduler"
//!   cores: 2
//!   min_priority: 1
//!   max_priority: 99
//!   requeue: incoming_level     # or own_level
//! tasks:
//!   - origin: "camera"
//!     priority: 50
//!     service_time: 0.004
//!     arrival: 0.0
//!   - id: 7
//!     origin: "lidar"
//!     priority: 60
//!     service_time: 0.002
//!     arrival: 0.001
//! ```
//!
//! Every `scheduler` field is optional.  A task without `id` gets its position
//! in the list; without `origin`, `task<id>`; without `arrival`, `0.0`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scheduler::{PriorityRange, RequeuePolicy, SchedulerError};
use crate::task::{Origin, SimTime, Task, TaskId};

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Construction-time parameters of a [`SchedulingEngine`].
///
/// [`SchedulingEngine`]: crate::scheduler::SchedulingEngine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logical name reported with every metrics event.
    pub name: String,
    pub cores: usize,
    pub min_priority: i32,
    pub max_priority: i32,
    pub requeue: RequeuePolicy,
}

impl Default for EngineConfig {
    /// One core, priorities `1..=99`, literal incoming-level requeue.
    fn default() -> Self {
        let range = PriorityRange::default();
        Self {
            name: String::from("scheduler"),
            cores: 1,
            min_priority: range.min,
            max_priority: range.max,
            requeue: RequeuePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Check the configuration and return its priority range.
    ///
    /// # Errors
    /// [`SchedulerError::NoCores`] for `cores == 0`,
    /// [`SchedulerError::InvertedPriorityRange`] for `min > max`.
    pub fn validate(&self) -> Result<PriorityRange, SchedulerError> {
        if self.cores == 0 {
            return Err(SchedulerError::NoCores);
        }
        PriorityRange::new(self.min_priority, self.max_priority)
    }
}

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct WorkloadFile {
    #[serde(default)]
    scheduler: EngineConfig,
    #[serde(default)]
    tasks: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    id: Option<u64>,
    origin: Option<String>,
    priority: i32,
    service_time: SimTime,
    #[serde(default)]
    arrival: SimTime,
}

// ── Public data structures ────────────────────────────────────────────────────

/// One task arrival in a workload.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub origin: Origin,
    pub priority: i32,
    pub service_time: SimTime,
    pub arrival: SimTime,
}

impl TaskSpec {
    /// The task this arrival submits.
    pub fn to_task(&self) -> Task {
        Task::new(self.id, self.priority, self.service_time, self.origin.clone())
    }
}

/// An engine configuration plus the tasks to feed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub scheduler: EngineConfig,
    /// In file order; the simulation sorts by arrival.
    pub tasks: Vec<TaskSpec>,
}

impl Workload {
    /// Read and validate a workload file.
    ///
    /// # Errors
    /// Fails if the file cannot be read, is not valid YAML, or describes an
    /// unusable workload (see [`from_yaml_str`](Self::from_yaml_str)).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading workload from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open workload file: {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid workload file: {}", path.display()))
    }

    /// Parse and validate a workload from YAML text.
    ///
    /// # Errors
    /// * malformed YAML or missing `priority` / `service_time`;
    /// * an engine configuration rejected by [`EngineConfig::validate`];
    /// * a task priority outside the configured range;
    /// * a service time that is not a positive finite number;
    /// * an arrival time that is negative or not finite;
    /// * two tasks with the same id.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: WorkloadFile =
            serde_yaml::from_str(content).context("Failed to parse workload YAML")?;

        let range = file.scheduler.validate()?;

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(file.tasks.len());
        for (index, entry) in file.tasks.into_iter().enumerate() {
            let id = TaskId(entry.id.unwrap_or(index as u64));
            if !seen.insert(id) {
                bail!("duplicate task id {id}");
            }
            ensure!(
                range.contains(entry.priority),
                "task {id} has priority {} outside [{}, {}]",
                entry.priority,
                range.min,
                range.max
            );
            ensure!(
                entry.service_time.is_finite() && entry.service_time > 0.0,
                "task {id} has non-positive service time {}",
                entry.service_time
            );
            ensure!(
                entry.arrival.is_finite() && entry.arrival >= 0.0,
                "task {id} has invalid arrival time {}",
                entry.arrival
            );

            let origin = Origin::new(entry.origin.unwrap_or_else(|| format!("task{}", id.0)));
            debug!(
                "  Task: {} | origin: {} | priority: {} | service: {}s | arrival: {}s",
                id, origin, entry.priority, entry.service_time, entry.arrival,
            );

            tasks.push(TaskSpec {
                id,
                origin,
                priority: entry.priority,
                service_time: entry.service_time,
                arrival: entry.arrival,
            });
        }

        info!(
            scheduler = %file.scheduler.name,
            cores = file.scheduler.cores,
            task_count = tasks.len(),
            "Workload loaded"
        );

        Ok(Self {
            scheduler: file.scheduler,
            tasks,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
