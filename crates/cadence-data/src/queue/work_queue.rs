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

use super::{DetachedItem, ObjectKey, PendingRequest, QueueMode, ReconcileOutcome, Visit, WorkItem};
use cadence_core::frame::{frame_reached, FrameNumber};
use cadence_core::utils::lock_or_recover;
use cadence_core::{BaseId, QueueError};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

/// Tree key of the sorted mode: sort key first, insertion sequence second.
#[derive(Debug, Clone, Copy)]
struct OrderKey {
    sort_key: f32,
    sequence: u64,
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key
            .total_cmp(&other.sort_key)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}

enum Storage<T: ?Sized> {
    Sorted {
        tree: BTreeMap<OrderKey, WorkItem<T>>,
        index: HashMap<ObjectKey, OrderKey>,
    },
    List {
        items: Vec<WorkItem<T>>,
        index: HashSet<ObjectKey>,
    },
}

impl<T: ?Sized> Storage<T> {
    fn new(mode: QueueMode) -> Self {
        match mode {
            QueueMode::Sorted => Storage::Sorted {
                tree: BTreeMap::new(),
                index: HashMap::new(),
            },
            QueueMode::List => Storage::List {
                items: Vec::new(),
                index: HashSet::new(),
            },
        }
    }

    fn len(&self) -> usize {
        match self {
            Storage::Sorted { tree, .. } => tree.len(),
            Storage::List { items, .. } => items.len(),
        }
    }

    fn contains(&self, key: ObjectKey) -> bool {
        match self {
            Storage::Sorted { index, .. } => index.contains_key(&key),
            Storage::List { index, .. } => index.contains(&key),
        }
    }

    fn get_mut(&mut self, key: ObjectKey) -> Option<&mut WorkItem<T>> {
        match self {
            Storage::Sorted { tree, index } => {
                let order = *index.get(&key)?;
                tree.get_mut(&order)
            }
            Storage::List { items, index } => {
                if !index.contains(&key) {
                    return None;
                }
                items.iter_mut().find(|item| item.key == key)
            }
        }
    }

    fn insert(&mut self, item: WorkItem<T>) {
        match self {
            Storage::Sorted { tree, index } => {
                let order = OrderKey {
                    sort_key: item.sort_key,
                    sequence: item.sequence,
                };
                index.insert(item.key, order);
                tree.insert(order, item);
            }
            Storage::List { items, index } => {
                index.insert(item.key);
                items.push(item);
            }
        }
    }

    fn remove(&mut self, key: ObjectKey) -> Option<WorkItem<T>> {
        match self {
            Storage::Sorted { tree, index } => {
                let order = index.remove(&key)?;
                tree.remove(&order)
            }
            Storage::List { items, index } => {
                if !index.remove(&key) {
                    return None;
                }
                let position = items.iter().position(|item| item.key == key)?;
                Some(items.remove(position))
            }
        }
    }

    fn drain(&mut self) -> Vec<WorkItem<T>> {
        match self {
            Storage::Sorted { tree, index } => {
                index.clear();
                std::mem::take(tree).into_values().collect()
            }
            Storage::List { items, index } => {
                index.clear();
                std::mem::take(items)
            }
        }
    }

    fn for_each_mut(&mut self, mut f: impl FnMut(&mut WorkItem<T>)) {
        match self {
            Storage::Sorted { tree, .. } => tree.values_mut().for_each(&mut f),
            Storage::List { items, .. } => items.iter_mut().for_each(&mut f),
        }
    }
}

struct QueueState<T: ?Sized> {
    storage: Storage<T>,
    next_sequence: u64,
    /// Direct enqueues still waiting for a reconcile to fix their first frame.
    awaiting_frame: usize,
    /// Keys expired by the last non-persistent clear. A re-insert before the
    /// next reconcile continues the object without a new start reply.
    carried: HashSet<ObjectKey>,
}

impl<T: ?Sized> QueueState<T> {
    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// A priority-ordered queue of live objects with deferred mutation.
///
/// `T` is usually a trait object such as `dyn Renderable`.
pub struct WorkQueue<T: ?Sized> {
    name: String,
    mode: QueueMode,
    capacity: Option<usize>,
    state: Mutex<QueueState<T>>,
    requests: Mutex<Vec<PendingRequest<T>>>,
    has_requests: AtomicBool,
    depth: AtomicUsize,
}

impl<T: ?Sized> WorkQueue<T> {
    /// Creates an unbounded queue. `name` only appears in logs.
    pub fn new(name: impl Into<String>, mode: QueueMode) -> Self {
        Self {
            name: name.into(),
            mode,
            capacity: None,
            state: Mutex::new(QueueState {
                storage: Storage::new(mode),
                next_sequence: 0,
                awaiting_frame: 0,
                carried: HashSet::new(),
            }),
            requests: Mutex::new(Vec::new()),
            has_requests: AtomicBool::new(false),
            depth: AtomicUsize::new(0),
        }
    }

    /// Creates a queue that holds at most `capacity` objects.
    pub fn with_capacity(name: impl Into<String>, mode: QueueMode, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(name, mode)
        }
    }

    /// The queue's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage strategy.
    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// The fixed capacity, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of enqueued objects. Does not block.
    pub fn len(&self) -> usize {
        self.depth.load(AtomicOrdering::Acquire)
    }

    /// `true` when no object is enqueued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests waiting for the next reconcile.
    pub fn pending_len(&self) -> usize {
        lock_or_recover(&self.requests).len()
    }

    /// `true` if `object` is enqueued (pending requests are not considered).
    pub fn contains(&self, object: &Arc<T>) -> bool {
        lock_or_recover(&self.state)
            .storage
            .contains(ObjectKey::of(object))
    }

    /// Inserts `object` directly.
    ///
    /// Returns `Ok(false)` without inserting when the object is already
    /// enqueued; its start reply is re-armed instead. A new object becomes
    /// eligible on the frame passed to the next [`reconcile`](Self::reconcile).
    ///
    /// Must not be called from inside a [`for_each_eligible`](Self::for_each_eligible)
    /// visitor on the same queue.
    pub fn enqueue(&self, object: Arc<T>, base: BaseId, sort_key: f32) -> Result<bool, QueueError> {
        let mut state = lock_or_recover(&self.state);
        let key = ObjectKey::of(&object);
        if let Some(item) = state.storage.get_mut(key) {
            item.pending_start = true;
            return Ok(false);
        }
        if let Some(capacity) = self.capacity {
            if state.storage.len() >= capacity {
                log::warn!("Queue '{}' is full ({} objects).", self.name, capacity);
                return Err(QueueError::Full { capacity });
            }
        }

        let start = !state.carried.contains(&key);
        let sequence = state.next_sequence();
        state
            .storage
            .insert(WorkItem::new(object, base, sequence, sort_key, None, start));
        state.awaiting_frame += 1;
        self.depth.store(state.storage.len(), AtomicOrdering::Release);
        Ok(true)
    }

    /// Appends a request for the next reconcile. Never blocks on the item lock.
    pub fn request(&self, request: PendingRequest<T>) {
        let mut requests = lock_or_recover(&self.requests);
        requests.push(request);
        self.has_requests.store(true, AtomicOrdering::Release);
    }

    /// Requests insertion of `object`.
    pub fn request_insert(&self, object: Arc<T>, base: BaseId, sort_key: f32) {
        self.request(PendingRequest::Insert {
            object,
            base,
            sort_key,
        });
    }

    /// Requests removal of `object`.
    pub fn request_remove(&self, object: &Arc<T>) {
        self.request(PendingRequest::Remove(ObjectKey::of(object)));
    }

    /// Requests a pause toggle of `object`.
    pub fn request_pause(&self, object: &Arc<T>) {
        self.request(PendingRequest::Pause(ObjectKey::of(object)));
    }

    /// Applies every pending request in submission order.
    ///
    /// Objects inserted here, and objects enqueued directly since the last
    /// call, become eligible on `frame`. A remove that meets an insert from the
    /// same batch cancels it without any reply.
    pub fn reconcile(&self, frame: FrameNumber) -> ReconcileOutcome<T> {
        let mut state = lock_or_recover(&self.state);
        let mut outcome = ReconcileOutcome::empty();

        if state.awaiting_frame > 0 {
            state.storage.for_each_mut(|item| {
                if item.eligible_from.is_none() {
                    item.eligible_from = Some(frame);
                }
            });
            state.awaiting_frame = 0;
        }

        if self.has_requests.swap(false, AtomicOrdering::AcqRel) {
            let requests = std::mem::take(&mut *lock_or_recover(&self.requests));
            let mut fresh = HashSet::new();
            for request in requests {
                self.apply(&mut state, request, frame, &mut fresh, &mut outcome);
            }
        }

        if !state.carried.is_empty() {
            state.carried.clear();
        }
        self.depth.store(state.storage.len(), AtomicOrdering::Release);

        if !outcome.is_empty() {
            log::trace!(
                "Queue '{}' reconciled: +{} -{} paused {} resumed {} rejected {}",
                self.name,
                outcome.inserted,
                outcome.removed.len(),
                outcome.paused.len(),
                outcome.resumed,
                outcome.rejected
            );
        }
        outcome
    }

    fn apply(
        &self,
        state: &mut QueueState<T>,
        request: PendingRequest<T>,
        frame: FrameNumber,
        fresh: &mut HashSet<ObjectKey>,
        outcome: &mut ReconcileOutcome<T>,
    ) {
        match request {
            PendingRequest::Insert {
                object,
                base,
                sort_key,
            } => {
                let key = ObjectKey::of(&object);
                if let Some(item) = state.storage.get_mut(key) {
                    item.pending_start = true;
                    return;
                }
                if let Some(capacity) = self.capacity {
                    if state.storage.len() >= capacity {
                        log::warn!(
                            "Queue '{}' is full ({} objects); insert dropped.",
                            self.name,
                            capacity
                        );
                        outcome.rejected += 1;
                        return;
                    }
                }
                let start = !state.carried.contains(&key);
                let sequence = state.next_sequence();
                state.storage.insert(WorkItem::new(
                    object,
                    base,
                    sequence,
                    sort_key,
                    Some(frame),
                    start,
                ));
                fresh.insert(key);
                outcome.inserted += 1;
            }
            PendingRequest::Remove(key) => {
                if let Some(item) = state.storage.remove(key) {
                    if fresh.remove(&key) {
                        outcome.inserted -= 1;
                    } else {
                        outcome.removed.push(item.detach());
                    }
                }
            }
            PendingRequest::Pause(key) => {
                if let Some(item) = state.storage.get_mut(key) {
                    item.paused = !item.paused;
                    if item.paused {
                        outcome.paused.push(DetachedItem {
                            object: Arc::clone(&item.object),
                            base: item.base,
                            source: item.source.take(),
                        });
                    } else {
                        item.pending_start = true;
                        outcome.resumed += 1;
                    }
                }
            }
        }
    }

    /// Visits every unpaused item whose first frame has been reached, in queue order.
    ///
    /// Items the visitor expires are removed after the walk and returned.
    /// The visitor must not call back into this queue except through
    /// [`request`](Self::request) and its helpers.
    pub fn for_each_eligible<F>(&self, frame: FrameNumber, mut visit: F) -> Vec<DetachedItem<T>>
    where
        F: FnMut(&mut WorkItem<T>) -> Visit,
    {
        let mut state = lock_or_recover(&self.state);
        let mut expired = Vec::new();
        state.storage.for_each_mut(|item| {
            if item.paused {
                return;
            }
            match item.eligible_from {
                Some(from) if frame_reached(from, frame) => {}
                _ => return,
            }
            if visit(item) == Visit::Expire {
                expired.push(item.key);
            }
        });

        if expired.is_empty() {
            return Vec::new();
        }
        let removed: Vec<DetachedItem<T>> = expired
            .into_iter()
            .filter_map(|key| state.storage.remove(key))
            .map(WorkItem::detach)
            .collect();
        self.depth.store(state.storage.len(), AtomicOrdering::Release);
        removed
    }

    /// Recomputes every sort key in sorted mode. Insertion sequence still breaks ties.
    pub fn resort_by<F>(&self, mut key_of: F)
    where
        F: FnMut(&WorkItem<T>) -> f32,
    {
        let mut state = lock_or_recover(&self.state);
        if let Storage::Sorted { tree, index } = &mut state.storage {
            let items: Vec<WorkItem<T>> = std::mem::take(tree).into_values().collect();
            for mut item in items {
                item.sort_key = key_of(&item);
                let order = OrderKey {
                    sort_key: item.sort_key,
                    sequence: item.sequence,
                };
                index.insert(item.key, order);
                tree.insert(order, item);
            }
        }
    }

    /// Clears every item at the end of a non-persistent frame.
    ///
    /// An expired object inserted again before the next reconcile does not get
    /// a new start reply.
    pub fn expire_all(&self) -> Vec<DetachedItem<T>> {
        let mut state = lock_or_recover(&self.state);
        let items = state.storage.drain();
        state.awaiting_frame = 0;
        for item in &items {
            state.carried.insert(item.key);
        }
        self.depth.store(0, AtomicOrdering::Release);
        items.into_iter().map(WorkItem::detach).collect()
    }

    /// Clears the queue and every pending request. Used at shutdown.
    pub fn remove_all(&self) -> Vec<DetachedItem<T>> {
        let mut state = lock_or_recover(&self.state);
        {
            let mut requests = lock_or_recover(&self.requests);
            requests.clear();
            self.has_requests.store(false, AtomicOrdering::Release);
        }
        let items = state.storage.drain();
        state.awaiting_frame = 0;
        state.carried.clear();
        self.depth.store(0, AtomicOrdering::Release);
        items.into_iter().map(WorkItem::detach).collect()
    }
}

impl<T: ?Sized> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
