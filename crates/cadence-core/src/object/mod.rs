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

//! Capability traits for objects the schedulers drive.
//!
//! Any type implementing one of these traits can be handed to the matching
//! scheduler. The scheduler holds a shared `Arc` to the object while it is
//! enqueued and calls back into it on the scheduler's own thread.

pub mod flags;

use crate::binding::StageBinding;
use crate::context::SourceId;
use crate::frame::{FrameNumber, FRAME_ALWAYS_PASS};
use crate::math::Vec3;
use crate::sync::Validater;
use std::sync::Arc;

pub use flags::{
    ActuatorFlags, ActuatorReply, InteractionFlags, InteractionReply, PlayFlags, PlayReply,
    RenderFlags, RenderReply, NEUTRAL_MODIFIER, RENDER_PASS_COUNT,
};

/// Identity of the shared resource behind an object.
///
/// Instances built from the same base (same mesh, same sound buffer) report the
/// same `BaseId`, which lets a scheduler skip rebinding between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseId(u64);

impl BaseId {
    /// Wraps an explicit identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Derives an identifier from the address of a shared allocation.
    pub fn of<T: ?Sized>(base: &Arc<T>) -> Self {
        Self(Arc::as_ptr(base) as *const () as usize as u64)
    }

    /// The raw identifier.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// An object the graphics renderer can draw.
pub trait Renderable: Send + Sync {
    /// Identity of the shared rendering base.
    fn base_id(&self) -> BaseId;

    /// Pass selection and other rendering flags.
    fn rendering_flags(&self) -> RenderFlags;

    /// The frame this object is scheduled to render on, or a frame sentinel.
    fn rendering_frame(&self) -> FrameNumber {
        FRAME_ALWAYS_PASS
    }

    /// Updates the frame this object is scheduled to render on.
    fn set_rendering_frame(&self, _frame: FrameNumber) {}

    /// World-space position used for back-to-front sorting.
    fn rendering_source(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// Binding stages pushed before this object renders.
    fn binding_stages(&self) -> Option<Arc<dyn StageBinding>> {
        None
    }

    /// Validater tracking the object's cached API state.
    fn rendering_sync(&self) -> Option<&Validater> {
        None
    }

    /// Renders the object.
    fn render(&self, reply: RenderReply);
}

/// An object the sound mixer can play.
pub trait Playable: Send + Sync {
    /// Identity of the shared playback base (e.g. a sound buffer).
    fn base_id(&self) -> BaseId;

    /// Priority class and playback flags.
    fn playback_flags(&self) -> PlayFlags;

    /// The frame this object is scheduled to play on, or a frame sentinel.
    fn playback_frame(&self) -> FrameNumber {
        FRAME_ALWAYS_PASS
    }

    /// Updates the frame this object is scheduled to play on.
    fn set_playback_frame(&self, _frame: FrameNumber) {}

    /// World-space position of the emitter.
    fn playback_source(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// The object's own gain.
    fn gain(&self) -> f32 {
        1.0
    }

    /// The object's own pitch.
    fn pitch(&self) -> f32 {
        1.0
    }

    /// Validater tracking the object's cached API state.
    fn playback_sync(&self) -> Option<&Validater> {
        None
    }

    /// Plays the object. `source` is the bound API source, absent when muted or released.
    fn play(&self, reply: PlayReply, source: Option<SourceId>);
}

/// An object advanced by the actuator stage of the physical actuator.
pub trait Actuator: Send + Sync {
    /// Identity of the shared actuation base.
    fn base_id(&self) -> BaseId;

    /// Throttle and direction flags.
    fn actuator_flags(&self) -> ActuatorFlags {
        ActuatorFlags::EMPTY
    }

    /// The frame this object is scheduled to update on, or a frame sentinel.
    fn actuation_frame(&self) -> FrameNumber {
        FRAME_ALWAYS_PASS
    }

    /// Advances the actuator by `delta_t` seconds.
    fn update(&self, delta_t: f32, reply: ActuatorReply);
}

/// An object advanced by the pre-pass and/or main-pass stages of the physical actuator.
pub trait Interactable: Send + Sync {
    /// Identity of the shared interaction base.
    fn base_id(&self) -> BaseId;

    /// Stage selection flags.
    fn interaction_flags(&self) -> InteractionFlags;

    /// The frame this object is scheduled to interact on, or a frame sentinel.
    fn interaction_frame(&self) -> FrameNumber {
        FRAME_ALWAYS_PASS
    }

    /// Updates the frame this object is scheduled to interact on.
    fn set_interaction_frame(&self, _frame: FrameNumber) {}

    /// Validater tracking the object's cached state.
    fn interaction_sync(&self) -> Option<&Validater> {
        None
    }

    /// Advances the object by `delta_t` seconds.
    fn interact(&self, delta_t: f32, reply: InteractionReply);
}

/// A viewpoint: a render pass camera or the sound listener.
pub trait Camera: Send + Sync {
    /// World-space position of the viewpoint.
    fn viewing_source(&self) -> Vec3;

    /// The frame the camera last updated its transform on.
    fn viewing_frame(&self) -> FrameNumber {
        FRAME_ALWAYS_PASS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_id_follows_allocation() {
        let a = Arc::new(7u32);
        let b = Arc::new(7u32);
        assert_eq!(BaseId::of(&a), BaseId::of(&a.clone()));
        assert_ne!(BaseId::of(&a), BaseId::of(&b));
        assert_eq!(BaseId::new(3).get(), 3);
    }
}
