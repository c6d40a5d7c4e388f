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

//! Frame numbering.
//!
//! Frame numbers are 16-bit and wrap. Two values are reserved as sentinels that
//! an object may store in place of a real frame number:
//!
//! - [`FRAME_ALWAYS_PASS`]: the object is eligible on every frame.
//! - [`FRAME_ALWAYS_FAIL`]: the object should be dropped by a frame check.
//!
//! A [`FrameCounter`] never yields either sentinel.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

/// A wrapping 16-bit frame number.
pub type FrameNumber = u16;

/// Sentinel: eligible on every frame.
pub const FRAME_ALWAYS_PASS: FrameNumber = 0x0000;

/// Sentinel: never eligible; removed by a frame check.
pub const FRAME_ALWAYS_FAIL: FrameNumber = 0xffff;

/// Returns `true` if `a` happened strictly before `b`, accounting for wrap-around.
pub fn frame_is_before(a: FrameNumber, b: FrameNumber) -> bool {
    (a.wrapping_sub(b) as i16) < 0
}

/// Returns `true` once `current` has reached `target`.
pub fn frame_reached(target: FrameNumber, current: FrameNumber) -> bool {
    !frame_is_before(current, target)
}

/// Returns the frame after `frame`, skipping both sentinels.
pub fn next_frame(frame: FrameNumber) -> FrameNumber {
    let mut next = frame.wrapping_add(1);
    while next == FRAME_ALWAYS_PASS || next == FRAME_ALWAYS_FAIL {
        next = next.wrapping_add(1);
    }
    next
}

/// Outcome of comparing an object's own frame number against a scheduler's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCheck {
    /// Process the object this frame.
    Eligible,
    /// Leave the object enqueued but do not process it this frame.
    Skip,
    /// The object is done; remove it.
    Expired,
}

/// Compares `object_frame` against the scheduler's `current` frame.
pub fn check_frame(object_frame: FrameNumber, current: FrameNumber) -> FrameCheck {
    match object_frame {
        FRAME_ALWAYS_PASS => FrameCheck::Eligible,
        FRAME_ALWAYS_FAIL => FrameCheck::Expired,
        f if f == current => FrameCheck::Eligible,
        f if frame_is_before(f, current) => FrameCheck::Expired,
        _ => FrameCheck::Skip,
    }
}

/// A thread-safe monotonically advancing frame counter.
#[derive(Debug)]
pub struct FrameCounter {
    value: AtomicU16,
}

impl FrameCounter {
    /// Creates a counter positioned on frame 1.
    pub const fn new() -> Self {
        Self {
            value: AtomicU16::new(1),
        }
    }

    /// The current frame.
    pub fn current(&self) -> FrameNumber {
        self.value.load(Ordering::Acquire)
    }

    /// Advances by one frame and returns the new value.
    pub fn advance(&self) -> FrameNumber {
        let previous = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |f| Some(next_frame(f)))
            .unwrap_or_else(|f| f);
        next_frame(previous)
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A per-cycle time allowance.
///
/// Schedulers start one slice per cycle. Once it is exhausted, replies carry a
/// hurry flag so objects may cut optional work.
#[derive(Debug, Clone, Copy)]
pub struct TimeSlice {
    started: Instant,
    budget: Option<Duration>,
}

impl TimeSlice {
    /// Starts a slice. `None` means unlimited.
    pub fn start(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// `true` once the elapsed time exceeds the budget.
    pub fn is_exhausted(&self) -> bool {
        self.budget
            .map(|budget| self.started.elapsed() > budget)
            .unwrap_or(false)
    }

    /// Time spent since the slice started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
