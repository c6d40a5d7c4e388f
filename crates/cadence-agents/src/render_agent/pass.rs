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

use cadence_core::object::{Camera, Renderable, NEUTRAL_MODIFIER};
use cadence_core::sync::Validater;
use cadence_core::utils::{read_or_recover, write_or_recover};
use cadence_data::{QueueMode, WorkQueue};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

/// One render pass: its queue, camera and modifiers.
pub(crate) struct RenderPass {
    pub(crate) queue: WorkQueue<dyn Renderable>,
    camera: RwLock<Option<Arc<dyn Camera>>>,
    alpha: AtomicU8,
    shade: AtomicU8,
    opaque: AtomicBool,
    /// Invalidated when a modifier changes.
    sync: Validater,
}

impl RenderPass {
    pub(crate) fn new(index: usize, mode: QueueMode) -> Self {
        Self {
            queue: WorkQueue::new(format!("render pass {}", index + 1), mode),
            camera: RwLock::new(None),
            alpha: AtomicU8::new(NEUTRAL_MODIFIER),
            shade: AtomicU8::new(NEUTRAL_MODIFIER),
            opaque: AtomicBool::new(true),
            sync: Validater::new(true),
        }
    }

    pub(crate) fn camera(&self) -> Option<Arc<dyn Camera>> {
        read_or_recover(&self.camera).clone()
    }

    pub(crate) fn set_camera(&self, camera: Option<Arc<dyn Camera>>) {
        *write_or_recover(&self.camera) = camera;
    }

    pub(crate) fn alpha(&self) -> u8 {
        self.alpha.load(Ordering::Acquire)
    }

    pub(crate) fn shade(&self) -> u8 {
        self.shade.load(Ordering::Acquire)
    }

    pub(crate) fn set_alpha(&self, alpha: u8) {
        if self.alpha.swap(alpha, Ordering::AcqRel) != alpha {
            self.sync.invalidate();
        }
    }

    pub(crate) fn set_shade(&self, shade: u8) {
        if self.shade.swap(shade, Ordering::AcqRel) != shade {
            self.sync.invalidate();
        }
    }

    pub(crate) fn is_opaque(&self) -> bool {
        self.opaque.load(Ordering::Acquire)
    }

    pub(crate) fn set_opaque(&self, opaque: bool) {
        self.opaque.store(opaque, Ordering::Release);
    }

    /// `true` once after a modifier changed.
    pub(crate) fn take_invalidation(&self) -> bool {
        self.sync.take_invalidation()
    }
}
