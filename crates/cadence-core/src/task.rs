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

//! The contract between the task manager and the work it runs.

/// A cyclic unit of work run by the task manager.
///
/// `perform` is called once per cycle on a worker thread. A task is never
/// performed concurrently with itself.
pub trait Task: Send + Sync {
    /// Human-readable name, used in logs and errors.
    fn task_name(&self) -> &str;

    /// Higher values are picked first when several tasks are ready.
    fn task_priority(&self) -> f32 {
        0.5
    }

    /// Runs one cycle.
    fn perform(&self);

    /// Stops accepting work and releases everything the task holds.
    ///
    /// Called once when the task manager shuts down, possibly while `perform`
    /// runs on a worker thread. A `perform` in progress should return promptly.
    fn shut_down(&self);

    /// `true` while `perform` is executing.
    fn is_task_performing(&self) -> bool;

    /// `true` once `shut_down` completed.
    fn is_task_shut_down(&self) -> bool;
}
