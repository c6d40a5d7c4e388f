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

use super::{DetachedItem, ObjectKey};
use cadence_core::BaseId;
use std::sync::Arc;

/// A mutation submitted from any thread and applied at the next reconcile.
pub enum PendingRequest<T: ?Sized> {
    /// Insert the object, or re-arm its start reply if already present.
    Insert {
        /// The object.
        object: Arc<T>,
        /// Its base identity.
        base: BaseId,
        /// Sort key in sorted mode.
        sort_key: f32,
    },
    /// Remove the object.
    Remove(ObjectKey),
    /// Toggle the object's paused state.
    Pause(ObjectKey),
}

impl<T: ?Sized> PendingRequest<T> {
    /// The object this request is about.
    pub fn key(&self) -> ObjectKey {
        match self {
            PendingRequest::Insert { object, .. } => ObjectKey::of(object),
            PendingRequest::Remove(key) | PendingRequest::Pause(key) => *key,
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for PendingRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingRequest::Insert { base, sort_key, .. } => f
                .debug_struct("Insert")
                .field("key", &self.key())
                .field("base", base)
                .field("sort_key", sort_key)
                .finish(),
            PendingRequest::Remove(key) => f.debug_tuple("Remove").field(key).finish(),
            PendingRequest::Pause(key) => f.debug_tuple("Pause").field(key).finish(),
        }
    }
}

/// What a reconcile changed.
///
/// The owning scheduler turns `removed`, `paused` and `resumed` into stop,
/// pause and start replies.
pub struct ReconcileOutcome<T: ?Sized> {
    /// Newly inserted objects.
    pub inserted: usize,
    /// Inserts dropped because the queue was full.
    pub rejected: usize,
    /// Objects removed by request.
    pub removed: Vec<DetachedItem<T>>,
    /// Objects that became paused. Their API sources were released from the item.
    pub paused: Vec<DetachedItem<T>>,
    /// Objects that resumed; each gets a fresh start reply.
    pub resumed: usize,
}

impl<T: ?Sized> ReconcileOutcome<T> {
    pub(crate) fn empty() -> Self {
        Self {
            inserted: 0,
            rejected: 0,
            removed: Vec::new(),
            paused: Vec::new(),
            resumed: 0,
        }
    }

    /// `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
            && self.rejected == 0
            && self.removed.is_empty()
            && self.paused.is_empty()
            && self.resumed == 0
    }
}
