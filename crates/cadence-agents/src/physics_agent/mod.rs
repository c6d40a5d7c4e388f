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

//! The physical actuator.
//!
//! Advances every enqueued object by one measured delta time per cycle, across
//! three strictly sequential stages: pre-pass, actuator and main-pass. Values a
//! pre-pass object produces are visible to actuators in the same cycle, and
//! both are visible to main-pass objects.

mod agent;

pub use agent::{ActuatorConfig, ActuatorStats, PhyActuator};

use cadence_core::cadence_bitflags;
use cadence_data::QueueMode;

/// Longest delta time distributed in one cycle, in seconds.
pub const MAX_DELTA_T: f32 = 0.5;

/// Shortest delta time distributed in one cycle, in seconds.
pub const MIN_DELTA_T: f32 = 0.0;

/// One of the three update stages, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorStage {
    Prepass,
    Actuator,
    Mainpass,
}

impl ActuatorStage {
    /// Every stage, pre-pass first.
    pub const ALL: [ActuatorStage; 3] = [
        ActuatorStage::Prepass,
        ActuatorStage::Actuator,
        ActuatorStage::Mainpass,
    ];
}

cadence_bitflags! {
    /// How the actuator stores and retires its objects.
    pub struct ActuatorMode: u32 {
        /// Insertion-ordered queues; a cycle only runs after [`PhyActuator::update_finish`].
        const IMMEDIATE = 0x0001;
        /// Sorted queues.
        const DEFERRED = 0x0002;
        /// Objects stay enqueued until removed.
        const PERSISTENT = 0x0100;
        /// Objects whose frame is stale are retired after their update.
        const FRAMECHECK = 0x0200;
    }
}

impl ActuatorMode {
    /// `DEFERRED | PERSISTENT | FRAMECHECK`.
    pub const DEFAULT: Self = Self::from_bits(0x0302);

    fn queue_mode(&self) -> QueueMode {
        if self.contains(Self::IMMEDIATE) {
            QueueMode::List
        } else {
            QueueMode::Sorted
        }
    }
}

/// The delta handed to objects for a measured wall-clock delta of `raw` seconds.
///
/// `raw` is clamped to `[MIN_DELTA_T, MAX_DELTA_T]` before the throttle applies.
/// A non-finite measurement counts as no time at all.
pub fn clamp_delta(raw: f32, throttle: f32) -> f32 {
    let raw = if raw.is_nan() { MIN_DELTA_T } else { raw };
    raw.clamp(MIN_DELTA_T, MAX_DELTA_T) * throttle
}
