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

//! # Cadence Data
//!
//! The data structures under the schedulers:
//!
//! - [`queue::WorkQueue`]: a priority-ordered queue of live objects with
//!   deferred, thread-safe insert/remove/pause requests.
//! - [`binding`]: fixed-capacity light/material/shader/texture stacks with
//!   content hashes for bind skipping.

pub mod binding;
pub mod queue;

pub use queue::{
    DetachedItem, ObjectKey, PendingRequest, QueueMode, ReconcileOutcome, Visit, WorkItem,
    WorkQueue,
};
