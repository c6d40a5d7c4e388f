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

//! Source slot allocation across the four priority classes.

use super::{MixerMode, SoundQueue, SOUND_QUEUE_COUNT};

/// Slots set aside for each queue, in [`SoundQueue`] order.
pub type Reservation = [usize; SOUND_QUEUE_COUNT];

/// Splits `budget` sources between the queues according to `mode`.
///
/// Music takes its fixed reservation first. The rest is divided between high,
/// medium and low by percentage, rounding with the largest-remainder method;
/// equal remainders favour the higher priority queue.
pub fn reserve_slots(mode: MixerMode, budget: usize) -> Reservation {
    let music = mode.music_reservation().min(budget);
    let remaining = budget - music;
    let weights = mode.split_weights();
    let total: usize = weights.iter().sum();

    let mut shares = [0usize; 3];
    let mut remainders = [0usize; 3];
    for (i, weight) in weights.iter().enumerate() {
        shares[i] = remaining * weight / total;
        remainders[i] = remaining * weight % total;
    }

    let mut leftover = remaining - shares.iter().sum::<usize>();
    let mut order = [0usize, 1, 2];
    // Stable sort keeps higher priority first among equal remainders.
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]));
    for &i in order.iter().cycle() {
        if leftover == 0 {
            break;
        }
        shares[i] += 1;
        leftover -= 1;
    }

    [music, shares[0], shares[1], shares[2]]
}

/// Per-cycle slot accounting.
///
/// Each queue is guaranteed `min(demand, reserved)` slots. Whatever no
/// guarantee uses forms a floating pool shared by every non-strict item.
#[derive(Debug, Clone)]
pub struct SlotBook {
    guaranteed: Reservation,
    used: Reservation,
    floating: usize,
}

impl SlotBook {
    /// Opens the book for one cycle.
    pub fn new(budget: usize, reserved: Reservation, demand: Reservation) -> Self {
        let mut guaranteed = [0; SOUND_QUEUE_COUNT];
        for i in 0..SOUND_QUEUE_COUNT {
            guaranteed[i] = demand[i].min(reserved[i]);
        }
        let floating = budget.saturating_sub(guaranteed.iter().sum());
        Self {
            guaranteed,
            used: [0; SOUND_QUEUE_COUNT],
            floating,
        }
    }

    /// Takes a slot for an item of `queue`. Strict items never use the floating pool.
    pub fn take(&mut self, queue: SoundQueue, strict: bool) -> bool {
        let q = queue.index();
        if self.used[q] < self.guaranteed[q] {
            self.used[q] += 1;
            true
        } else if !strict && self.floating > 0 {
            self.floating -= 1;
            true
        } else {
            false
        }
    }

    /// Slots still free in the floating pool.
    pub fn floating(&self) -> usize {
        self.floating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_of_ten_sources() {
        // 9 left after music: 4.5 / 3.15 / 1.35 -> 4, 3, 1 plus one to high (0.5 is largest).
        assert_eq!(reserve_slots(MixerMode::DEFAULT, 10), [1, 5, 3, 1]);
    }

    #[test]
    fn test_even_split_ties_go_to_higher_priority() {
        let mode = MixerMode::RESERVE_2_33_33_33 | MixerMode::DEFERRED;
        // 6 left: 2 each, nothing over.
        assert_eq!(reserve_slots(mode, 8), [2, 2, 2, 2]);
        // 5 left: 1 each, two leftovers to high then medium.
        assert_eq!(reserve_slots(mode, 7), [2, 2, 2, 1]);
    }

    #[test]
    fn test_budget_smaller_than_music_reservation() {
        let mode = MixerMode::RESERVE_2_50_35_15;
        assert_eq!(reserve_slots(mode, 1), [1, 0, 0, 0]);
        assert_eq!(reserve_slots(mode, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_reservation_sums_to_budget() {
        for budget in 0..40 {
            let slots = reserve_slots(MixerMode::DEFAULT, budget);
            assert_eq!(slots.iter().sum::<usize>(), budget);
        }
    }

    #[test]
    fn test_unused_guarantees_float_to_non_strict_items() {
        // Budget 4: music 1, high 2, medium 1, low 0. Only two high items want to play.
        let mut book = SlotBook::new(4, [1, 2, 1, 0], [0, 3, 0, 1]);
        assert_eq!(book.floating(), 2);
        assert!(book.take(SoundQueue::High, false));
        assert!(book.take(SoundQueue::High, false));
        assert!(book.take(SoundQueue::High, false));
        assert!(!book.take(SoundQueue::Low, true));
        assert!(book.take(SoundQueue::Low, false));
        assert!(!book.take(SoundQueue::Low, false));
    }
}
