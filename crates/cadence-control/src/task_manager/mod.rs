// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Worker pool and dependency DAG.
//!
//! Every task performs cyclically. A cycle of a dependent task starts only after
//! each of its prerequisites finished a cycle, and a prerequisite does not start
//! its next cycle before its dependents consumed the last one. There is no
//! global barrier: a slow task delays the tasks linked to it, while unrelated
//! tasks keep running. Starter tasks open their cycles without waiting for
//! their prerequisites, which is how a dependency cycle gets going.

mod manager;
mod table;

pub use manager::TaskManager;
pub use table::{MAX_DEPENDENCIES, MAX_TASKS, MAX_TASK_LINKS};

use std::fmt;
use std::time::Duration;

/// Configuration for the [`TaskManager`].
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    /// Number of worker threads in the pool.
    pub worker_threads: usize,
    /// How long shutdown waits for in-flight tasks before halting.
    pub shutdown_timeout: Duration,
    /// How long an idle worker sleeps before re-checking for work.
    pub idle_wait: Duration,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 3,
            shutdown_timeout: Duration::from_secs(5),
            idle_wait: Duration::from_millis(1),
        }
    }
}

/// Identifies a registered task.
///
/// Slots are reused after unregistration; the generation makes a stale handle
/// to a reused slot invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    index: usize,
    generation: u32,
}

impl TaskHandle {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// What [`TaskManager::shut_down_task_threads`] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every worker acknowledged before the timeout.
    pub graceful: bool,
    /// Workers that acknowledged.
    pub workers_stopped: usize,
    /// Workers that were running.
    pub workers_total: usize,
    /// Tasks whose `shut_down` returned before the timeout.
    pub tasks_shut_down: usize,
}
