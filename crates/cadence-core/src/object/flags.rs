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

//! Object flags and the reply words schedulers send back to objects.
//!
//! Reply words share one layout across schedulers: the low byte names the
//! queue (pass, priority class or stage) the call is made for, bits 8 to 15
//! carry the action, and the two high bytes carry modifier values stored as
//! percentages (`100` is neutral).

use crate::cadence_bitflags;

/// Number of render passes.
pub const RENDER_PASS_COUNT: usize = 8;

/// Shift of the first modifier byte in a reply word.
pub const LOW_MODIFIER_SHIFT: u32 = 16;

/// Shift of the second modifier byte in a reply word.
pub const HIGH_MODIFIER_SHIFT: u32 = 24;

/// The neutral modifier value (x1.00).
pub const NEUTRAL_MODIFIER: u8 = 100;

fn modifier_bits(low: u8, high: u8) -> u32 {
    (u32::from(low) << LOW_MODIFIER_SHIFT) | (u32::from(high) << HIGH_MODIFIER_SHIFT)
}

fn modifier_at(bits: u32, shift: u32) -> f32 {
    ((bits >> shift) & 0xff) as f32 / 100.0
}

cadence_bitflags! {
    /// Rendering flags declared by a renderable object.
    pub struct RenderFlags: u32 {
        /// Render pass 1.
        const PASS1 = 0x01;
        /// Render pass 2.
        const PASS2 = 0x02;
        /// Render pass 3.
        const PASS3 = 0x04;
        /// Render pass 4.
        const PASS4 = 0x08;
        /// Render pass 5.
        const PASS5 = 0x10;
        /// Render pass 6.
        const PASS6 = 0x20;
        /// Render pass 7.
        const PASS7 = 0x40;
        /// Render pass 8.
        const PASS8 = 0x80;
        /// Every render pass.
        const PASS_MASK = 0xff;
    }
}

impl RenderFlags {
    /// The flag of the zero-based pass `index`.
    pub const fn pass(index: usize) -> Self {
        Self::from_bits(1 << index)
    }
}

cadence_bitflags! {
    /// Reply word passed to [`Renderable::render`](crate::object::Renderable::render).
    pub struct RenderReply: u32 {
        /// The object is being rendered for the first time in this pass.
        const START = 0x0100;
        /// Regular rendering work for the indicated pass.
        const PASS = 0x0200;
        /// The object was paused in this pass.
        const PAUSE = 0x0400;
        /// The object left this pass.
        const STOP = 0x0800;
        /// Cached API state must be treated as invalid.
        const API_SYNC_INVALID = 0x2000;
        /// The previous object in the pass shared this object's base.
        const SAME_LAST_BASE = 0x4000;
        /// The cycle's time slice is exhausted.
        const HURRY = 0x8000;
    }
}

impl RenderReply {
    /// Builds a reply for `pass` with the pass's alpha and shade modifiers.
    pub fn for_pass(pass: RenderFlags, alpha: u8, shade: u8) -> Self {
        Self::from_bits(pass.bits() | modifier_bits(alpha, shade))
    }

    /// The pass this reply was issued for.
    pub fn pass_mask(&self) -> RenderFlags {
        RenderFlags::from_bits(self.bits() & 0xff)
    }

    /// Material alpha multiplier.
    pub fn alpha_modifier(&self) -> f32 {
        modifier_at(self.bits(), LOW_MODIFIER_SHIFT)
    }

    /// Material shade multiplier.
    pub fn shade_modifier(&self) -> f32 {
        modifier_at(self.bits(), HIGH_MODIFIER_SHIFT)
    }
}

cadence_bitflags! {
    /// Playback flags declared by a playable object.
    pub struct PlayFlags: u32 {
        /// Low priority queue.
        const LOW_PRIORITY = 0x0001;
        /// Medium priority queue.
        const MEDIUM_PRIORITY = 0x0002;
        /// High priority queue.
        const HIGH_PRIORITY = 0x0004;
        /// Music queue.
        const MUSIC = 0x0008;
        /// Every playback queue.
        const QUEUE_MASK = 0x00ff;
        /// The sound loops until stopped.
        const LOOPING = 0x0100;
        /// The sound pauses itself when it loses its source.
        const AUTO_PAUSE = 0x0200;
        /// Placed ahead of the other sounds of its queue.
        const PRIORITY = 0x0400;
        /// The sound tolerates waiting for a source.
        const CAN_WAIT = 0x0800;
        /// Only plays within its queue's reserved slots.
        const STRICT = 0x1000;
    }
}

cadence_bitflags! {
    /// Reply word passed to [`Playable::play`](crate::object::Playable::play).
    pub struct PlayReply: u32 {
        /// First playback call since enqueue.
        const START = 0x0100;
        /// Regular playback work.
        const PASS = 0x0200;
        /// Playback paused; any source was released.
        const PAUSE = 0x0400;
        /// Playback stopped; any source was released.
        const STOP = 0x0800;
        /// Cached API state must be treated as invalid.
        const API_SYNC_INVALID = 0x2000;
        /// The previous sound of the queue shared this object's base.
        const SAME_LAST_BASE = 0x4000;
        /// The cycle's time slice is exhausted.
        const HURRY = 0x8000;
    }
}

impl PlayReply {
    /// Builds a reply for `queue` with the queue's gain and pitch modifiers.
    pub fn for_queue(queue: PlayFlags, gain: u8, pitch: u8) -> Self {
        Self::from_bits(queue.masked(PlayFlags::QUEUE_MASK).bits() | modifier_bits(gain, pitch))
    }

    /// The queue this reply was issued for.
    pub fn queue_mask(&self) -> PlayFlags {
        PlayFlags::from_bits(self.bits() & 0xff)
    }

    /// Gain multiplier.
    pub fn gain_modifier(&self) -> f32 {
        modifier_at(self.bits(), LOW_MODIFIER_SHIFT)
    }

    /// Pitch multiplier.
    pub fn pitch_modifier(&self) -> f32 {
        modifier_at(self.bits(), HIGH_MODIFIER_SHIFT)
    }
}

cadence_bitflags! {
    /// Flags declared by an actuator object.
    pub struct ActuatorFlags: u32 {
        /// Updates run with negated delta time.
        const REVERSE = 0x0001;
        /// Loops on its last state until stopped.
        const LOOPING = 0x0002;
        /// 0.20x throttle.
        const THROTTLE20 = 0x1000;
        /// 0.25x throttle.
        const THROTTLE25 = 0x2000;
        /// 0.33x throttle.
        const THROTTLE33 = 0x3000;
        /// 0.50x throttle.
        const THROTTLE50 = 0x4000;
        /// 0.66x throttle.
        const THROTTLE66 = 0x5000;
        /// 0.75x throttle.
        const THROTTLE75 = 0x6000;
        /// 0.88x throttle.
        const THROTTLE88 = 0x7000;
        /// 1.25x throttle.
        const THROTTLE125 = 0x8000;
        /// 1.50x throttle.
        const THROTTLE150 = 0x9000;
        /// 2.00x throttle.
        const THROTTLE200 = 0xa000;
        /// 2.50x throttle.
        const THROTTLE250 = 0xb000;
        /// 3.00x throttle.
        const THROTTLE300 = 0xc000;
        /// 4.00x throttle.
        const THROTTLE400 = 0xd000;
        /// 5.00x throttle.
        const THROTTLE500 = 0xe000;
        /// The throttle nibble.
        const THROTTLE_MASK = 0xf000;
    }
}

impl ActuatorFlags {
    /// The per-object delta multiplier encoded in the throttle nibble, signed by `REVERSE`.
    pub fn delta_multiplier(&self) -> f32 {
        let throttle = match (self.bits() & Self::THROTTLE_MASK.bits()) >> 12 {
            0x1 => 0.20,
            0x2 => 0.25,
            0x3 => 0.33,
            0x4 => 0.50,
            0x5 => 0.66,
            0x6 => 0.75,
            0x7 => 0.88,
            0x8 => 1.25,
            0x9 => 1.50,
            0xa => 2.00,
            0xb => 2.50,
            0xc => 3.00,
            0xd => 4.00,
            0xe => 5.00,
            _ => 1.0,
        };
        if self.contains(Self::REVERSE) {
            -throttle
        } else {
            throttle
        }
    }
}

cadence_bitflags! {
    /// Reply word passed to [`Actuator::update`](crate::object::Actuator::update).
    pub struct ActuatorReply: u32 {
        /// First update since enqueue.
        const START = 0x0001;
        /// Regular update.
        const PASS = 0x0002;
        /// The actuator was paused.
        const PAUSE = 0x0004;
        /// The actuator was removed.
        const STOP = 0x0008;
    }
}

cadence_bitflags! {
    /// Interaction flags declared by an interactable object.
    pub struct InteractionFlags: u32 {
        /// Interacts in the pre-pass stage.
        const PREPASS = 0x0001;
        /// Interacts in the main-pass stage.
        const MAINPASS = 0x0004;
    }
}

cadence_bitflags! {
    /// Reply word passed to [`Interactable::interact`](crate::object::Interactable::interact).
    pub struct InteractionReply: u32 {
        /// First interaction since enqueue.
        const START = 0x0100;
        /// Regular interaction for the indicated stage.
        const PASS = 0x0200;
        /// The object was paused.
        const PAUSE = 0x0400;
        /// The object was removed.
        const STOP = 0x0800;
        /// Cached API state must be treated as invalid.
        const API_SYNC_INVALID = 0x2000;
        /// The previous object of the stage shared this object's base.
        const SAME_LAST_BASE = 0x4000;
        /// The cycle's time slice is exhausted.
        const HURRY = 0x8000;
    }
}

impl InteractionReply {
    /// Builds a reply for the given stage bits.
    pub fn for_stage(stage: InteractionFlags) -> Self {
        Self::from_bits(stage.bits() & 0xff)
    }

    /// The stage this reply was issued for.
    pub fn stage_mask(&self) -> InteractionFlags {
        InteractionFlags::from_bits(self.bits() & 0xff)
    }
}
