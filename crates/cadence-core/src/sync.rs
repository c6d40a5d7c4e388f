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

//! Dirty/clean flags with owner notification.
//!
//! A [`Validater`] marks a cached value (a bound camera, a pass modifier, a
//! transform) as needing to be recomputed or rebound. Its owner is held through
//! a [`Weak`] reference and notified on every state change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Callbacks delivered to the owner of a [`Validater`].
pub trait ValidationEvent: Send + Sync {
    /// The validater went from invalid to valid.
    fn did_validate(&self, _validater: &Validater) {}

    /// The validater went from valid to invalid.
    fn did_invalidate(&self, _validater: &Validater) {}
}

/// A thread-safe dirty/clean flag.
pub struct Validater {
    valid: AtomicBool,
    owner: Option<Weak<dyn ValidationEvent>>,
}

impl Validater {
    /// Creates an ownerless validater in the given state.
    pub fn new(valid: bool) -> Self {
        Self {
            valid: AtomicBool::new(valid),
            owner: None,
        }
    }

    /// Creates a validater that notifies `owner` on state changes.
    pub fn with_owner(valid: bool, owner: &Arc<dyn ValidationEvent>) -> Self {
        Self {
            valid: AtomicBool::new(valid),
            owner: Some(Arc::downgrade(owner)),
        }
    }

    /// `true` while the cached value is up to date.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Marks the cached value as up to date.
    pub fn validate(&self) {
        if !self.valid.swap(true, Ordering::AcqRel) {
            if let Some(owner) = self.owner() {
                owner.did_validate(self);
            }
        }
    }

    /// Marks the cached value as stale.
    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            if let Some(owner) = self.owner() {
                owner.did_invalidate(self);
            }
        }
    }

    /// Validates and reports whether the flag was invalid beforehand.
    pub fn take_invalidation(&self) -> bool {
        let was_invalid = !self.valid.swap(true, Ordering::AcqRel);
        if was_invalid {
            if let Some(owner) = self.owner() {
                owner.did_validate(self);
            }
        }
        was_invalid
    }

    fn owner(&self) -> Option<Arc<dyn ValidationEvent>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }
}

impl Default for Validater {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for Validater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validater")
            .field("valid", &self.is_valid())
            .field("has_owner", &self.owner.is_some())
            .finish()
    }
}
