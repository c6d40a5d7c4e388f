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

//! The sound mixer.
//!
//! Playable objects are sorted into four priority classes that share a limited
//! pool of sound sources. Each cycle the mixer decides which objects keep, gain
//! or lose a source, always serving music first and low priority last.

mod agent;
pub mod allocation;

pub use agent::{MixerConfig, MixerStats, SndMixer};

use cadence_core::cadence_bitflags;
use cadence_core::object::PlayFlags;

/// Number of priority classes.
pub const SOUND_QUEUE_COUNT: usize = 4;

/// A priority class, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundQueue {
    Music,
    High,
    Medium,
    Low,
}

impl SoundQueue {
    /// Every class, music first.
    pub const ALL: [SoundQueue; SOUND_QUEUE_COUNT] = [
        SoundQueue::Music,
        SoundQueue::High,
        SoundQueue::Medium,
        SoundQueue::Low,
    ];

    /// Position in processing order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The class selected by `flags`. Objects naming no class play at medium priority.
    pub fn from_flags(flags: PlayFlags) -> Self {
        if flags.contains(PlayFlags::MUSIC) {
            SoundQueue::Music
        } else if flags.contains(PlayFlags::HIGH_PRIORITY) {
            SoundQueue::High
        } else if flags.contains(PlayFlags::LOW_PRIORITY) {
            SoundQueue::Low
        } else {
            SoundQueue::Medium
        }
    }

    /// The queue bit carried in replies.
    pub fn flag(self) -> PlayFlags {
        match self {
            SoundQueue::Music => PlayFlags::MUSIC,
            SoundQueue::High => PlayFlags::HIGH_PRIORITY,
            SoundQueue::Medium => PlayFlags::MEDIUM_PRIORITY,
            SoundQueue::Low => PlayFlags::LOW_PRIORITY,
        }
    }
}

cadence_bitflags! {
    /// How the mixer stores objects and splits its sources.
    pub struct MixerMode: u32 {
        const IMMEDIATE = 0x0001;
        const DEFERRED = 0x0002;
        /// One music source; the rest split 50% / 35% / 15%.
        const RESERVE_1_50_35_15 = 0x0010;
        /// One music source; the rest split evenly.
        const RESERVE_1_33_33_33 = 0x0020;
        /// Two music sources; the rest split 50% / 35% / 15%.
        const RESERVE_2_50_35_15 = 0x0040;
        /// Two music sources; the rest split evenly.
        const RESERVE_2_33_33_33 = 0x0080;
        const PERSISTENT = 0x0100;
        const FRAMECHECK = 0x0200;
    }
}

impl MixerMode {
    /// `DEFERRED | RESERVE_1_50_35_15 | PERSISTENT | FRAMECHECK`.
    pub const DEFAULT: Self = Self::from_bits(0x0312);

    /// Sources set aside for music.
    pub fn music_reservation(&self) -> usize {
        if self.intersects(Self::RESERVE_2_50_35_15 | Self::RESERVE_2_33_33_33) {
            2
        } else {
            1
        }
    }

    /// Relative shares of high, medium and low.
    pub fn split_weights(&self) -> [usize; 3] {
        if self.intersects(Self::RESERVE_1_33_33_33 | Self::RESERVE_2_33_33_33) {
            [1, 1, 1]
        } else {
            [50, 35, 15]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_routing() {
        assert_eq!(
            SoundQueue::from_flags(PlayFlags::MUSIC | PlayFlags::LOOPING),
            SoundQueue::Music
        );
        assert_eq!(SoundQueue::from_flags(PlayFlags::HIGH_PRIORITY), SoundQueue::High);
        assert_eq!(SoundQueue::from_flags(PlayFlags::LOW_PRIORITY), SoundQueue::Low);
        assert_eq!(SoundQueue::from_flags(PlayFlags::EMPTY), SoundQueue::Medium);
    }

    #[test]
    fn test_default_mode_reserves_one_music_source() {
        assert_eq!(MixerMode::DEFAULT.music_reservation(), 1);
        assert_eq!(MixerMode::DEFAULT.split_weights(), [50, 35, 15]);
        assert!(MixerMode::DEFAULT.contains(MixerMode::PERSISTENT | MixerMode::FRAMECHECK));
    }
}
