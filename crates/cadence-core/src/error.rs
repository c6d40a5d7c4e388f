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

//! Error types shared across the scheduling crates.
//!
//! Every error here is a synchronous capacity or validity failure. None of them
//! leaves partial state behind.

use thiserror::Error;

/// Errors raised by a work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A fixed-capacity queue has no free entry left.
    #[error("work queue is full (capacity {capacity})")]
    Full {
        /// The configured capacity.
        capacity: usize,
    },
}

/// Errors raised by a binding stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The stack already holds its maximum number of resources.
    #[error("{stage} stack is full (capacity {capacity})")]
    StackFull {
        /// Name of the stage ("light", "material", ...).
        stage: &'static str,
        /// The stage's fixed capacity.
        capacity: usize,
    },
}

/// Errors raised by the task manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The handle does not name a registered task (never issued, unregistered, or stale).
    #[error("invalid task handle {0}")]
    InvalidHandle(String),
    /// The task table is full.
    #[error("task table is full (capacity {capacity})")]
    TaskCapacityExceeded {
        /// The fixed task capacity.
        capacity: usize,
    },
    /// The dependency table is full.
    #[error("dependency table is full (capacity {capacity})")]
    DependencyCapacityExceeded {
        /// The fixed dependency capacity.
        capacity: usize,
    },
    /// The dependent task already depends on the maximum number of tasks.
    #[error("task '{task}' already has {capacity} dependencies")]
    DependencySlotsExceeded {
        /// Name of the dependent task.
        task: String,
        /// The per-task slot capacity.
        capacity: usize,
    },
    /// The prerequisite task already has the maximum number of dependents.
    #[error("task '{task}' already has {capacity} dependents")]
    DependentSlotsExceeded {
        /// Name of the prerequisite task.
        task: String,
        /// The per-task slot capacity.
        capacity: usize,
    },
    /// A task cannot depend on itself.
    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(String),
    /// The manager is shutting down and accepts no new work.
    #[error("task manager is shutting down")]
    ShuttingDown,
}
