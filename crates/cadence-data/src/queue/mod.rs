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

//! The work queue shared by every scheduler.
//!
//! A [`WorkQueue`] is owned by one scheduler thread. That thread calls
//! [`WorkQueue::reconcile`] once per cycle and then walks the queue with
//! [`WorkQueue::for_each_eligible`]. Every other thread only appends
//! [`PendingRequest`]s, which take effect at the next reconcile.
//!
//! Two mutexes guard the queue: one for the items, one for the request list.
//! When both are needed the item lock is taken first.

mod item;
mod request;
mod work_queue;

pub use item::{DetachedItem, WorkItem};
pub use request::{PendingRequest, ReconcileOutcome};
pub use work_queue::WorkQueue;

use std::sync::Arc;

/// Identity of an enqueued object: the address of its shared allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(usize);

impl ObjectKey {
    /// The key of `object`.
    pub fn of<T: ?Sized>(object: &Arc<T>) -> Self {
        Self(Arc::as_ptr(object) as *const () as usize)
    }
}

/// Storage strategy of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Ordered by `(sort key, insertion sequence)`.
    #[default]
    Sorted,
    /// Insertion order, no reordering.
    List,
}

/// What a visitor wants done with the item it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Keep the item.
    Retain,
    /// Remove the item once the walk is over.
    Expire,
}
