/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! fifo-sched – preemptive multi-core SCHED_FIFO decision engine
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── task          – Task, TaskId, Origin, SimTime
//! ├── scheduler/    – SchedulingEngine (submit / advance / next wake)
//! │   ├── ladder    – per-priority FIFO queues
//! │   ├── cores     – fixed core array, assign / release
//! │   └── error     – SchedulerError, InvariantViolation
//! ├── notify        – completion delivery back to the origin
//! ├── metrics       – add / run / preempt / complete event sinks
//! ├── config/       – EngineConfig and YAML workload loading
//! └── sim/          – discrete-event clock driving one engine
//! ```

pub mod config;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod sim;
pub mod task;
