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

use super::ObjectKey;
use cadence_core::context::SourceId;
use cadence_core::frame::FrameNumber;
use cadence_core::BaseId;
use std::sync::Arc;

/// One live object in a [`WorkQueue`](super::WorkQueue).
pub struct WorkItem<T: ?Sized> {
    pub(crate) object: Arc<T>,
    pub(crate) key: ObjectKey,
    pub(crate) base: BaseId,
    pub(crate) sequence: u64,
    pub(crate) sort_key: f32,
    /// `None` until the first reconcile after a direct enqueue.
    pub(crate) eligible_from: Option<FrameNumber>,
    pub(crate) paused: bool,
    pub(crate) pending_start: bool,
    pub(crate) source: Option<SourceId>,
}

impl<T: ?Sized> WorkItem<T> {
    pub(crate) fn new(
        object: Arc<T>,
        base: BaseId,
        sequence: u64,
        sort_key: f32,
        eligible_from: Option<FrameNumber>,
        pending_start: bool,
    ) -> Self {
        let key = ObjectKey::of(&object);
        Self {
            object,
            key,
            base,
            sequence,
            sort_key,
            eligible_from,
            paused: false,
            pending_start,
            source: None,
        }
    }

    /// The scheduled object.
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// The object's queue identity.
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    /// The object's base identity at enqueue time.
    pub fn base(&self) -> BaseId {
        self.base
    }

    /// Insertion sequence number; breaks sort-key ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current sort key.
    pub fn sort_key(&self) -> f32 {
        self.sort_key
    }

    /// `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// `true` if the start reply has not been delivered yet.
    pub fn is_start_pending(&self) -> bool {
        self.pending_start
    }

    /// Consumes the pending start reply.
    pub fn take_start(&mut self) -> bool {
        std::mem::take(&mut self.pending_start)
    }

    /// The API source bound to this item, if any.
    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    /// Records the API source bound to this item.
    pub fn set_source(&mut self, source: SourceId) {
        self.source = Some(source);
    }

    /// Releases the recorded API source.
    pub fn take_source(&mut self) -> Option<SourceId> {
        self.source.take()
    }

    pub(crate) fn detach(self) -> DetachedItem<T> {
        DetachedItem {
            object: self.object,
            base: self.base,
            source: self.source,
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("key", &self.key)
            .field("base", &self.base)
            .field("sequence", &self.sequence)
            .field("sort_key", &self.sort_key)
            .field("eligible_from", &self.eligible_from)
            .field("paused", &self.paused)
            .field("pending_start", &self.pending_start)
            .finish()
    }
}

/// An object that left a queue (or was paused in it), with what it still held.
pub struct DetachedItem<T: ?Sized> {
    /// The object.
    pub object: Arc<T>,
    /// Its base identity.
    pub base: BaseId,
    /// The API source it held, to be returned to the pool.
    pub source: Option<SourceId>,
}
