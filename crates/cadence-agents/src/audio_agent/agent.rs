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

//! Defines the SndMixer, the scheduler that hands sound sources to playable objects.

use super::allocation::{reserve_slots, SlotBook};
use super::{MixerMode, SoundQueue, SOUND_QUEUE_COUNT};
use cadence_core::context::{SoundContext, SourceId, SourceParams};
use cadence_core::frame::{check_frame, FrameCheck, TimeSlice};
use cadence_core::math::Vec3;
use cadence_core::object::{Camera, PlayFlags, PlayReply, Playable, NEUTRAL_MODIFIER};
use cadence_core::task::Task;
use cadence_core::utils::lock_or_recover;
use cadence_core::{FrameCounter, FrameNumber};
use cadence_data::{QueueMode, Visit, WorkQueue};
use cadence_telemetry::metrics::registry::{CounterHandle, GaugeHandle, MetricsRegistry};
use cadence_telemetry::{MetricsResult, ScopedGaugeTimer};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for the [`SndMixer`].
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Storage, retirement and reservation mode.
    pub mode: MixerMode,
    /// Upper bound on simultaneously bound sources. The context limit also applies.
    pub source_budget: usize,
    /// Per-cycle time allowance; replies carry `HURRY` once it runs out.
    pub time_slice: Option<Duration>,
    /// Task priority under the task manager.
    pub priority: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            mode: MixerMode::DEFAULT,
            source_budget: 16,
            time_slice: None,
            priority: 0.5,
        }
    }
}

/// Counts from the last completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerStats {
    /// Objects played with a bound source.
    pub played: usize,
    /// Eligible objects left without a source.
    pub skipped: usize,
    /// Eligible objects silenced by mute.
    pub muted: usize,
    /// Objects retired by the frame check.
    pub expired: usize,
}

struct MixerMetrics {
    played: CounterHandle,
    skipped: CounterHandle,
    queued: GaugeHandle,
    cycle_time_ms: GaugeHandle,
}

impl MixerMetrics {
    fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            played: registry.register_counter("mixer", "played", "Objects played")?,
            skipped: registry.register_counter(
                "mixer",
                "skipped",
                "Objects left without a source",
            )?,
            queued: registry.register_gauge(
                "mixer",
                "queued",
                "Objects enqueued across all classes",
                "count",
            )?,
            cycle_time_ms: registry.register_gauge(
                "mixer",
                "cycle_time_ms",
                "Time spent in one mix cycle",
                "ms",
            )?,
        })
    }
}

#[derive(Default)]
struct ListenerState {
    current: Option<Arc<dyn Camera>>,
    /// A swap requested since the last cycle.
    pending: Option<Option<Arc<dyn Camera>>>,
}

/// The sound mixer.
pub struct SndMixer {
    config: MixerConfig,
    context: Arc<dyn SoundContext>,
    queues: Vec<WorkQueue<dyn Playable>>,
    gain: [AtomicU8; SOUND_QUEUE_COUNT],
    pitch: [AtomicU8; SOUND_QUEUE_COUNT],
    muted: AtomicBool,
    listener: Mutex<ListenerState>,
    playback: FrameCounter,
    finish_requested: AtomicBool,
    performing: AtomicBool,
    shut_down: AtomicBool,
    cycle: Mutex<()>,
    stats: Mutex<MixerStats>,
    metrics: Option<MixerMetrics>,
}

impl SndMixer {
    /// Creates a mixer playing through `context`.
    pub fn new(config: MixerConfig, context: Arc<dyn SoundContext>) -> Self {
        let queue_mode = if config.mode.contains(MixerMode::IMMEDIATE) {
            QueueMode::List
        } else {
            QueueMode::Sorted
        };
        let queues = SoundQueue::ALL
            .iter()
            .map(|queue| WorkQueue::new(format!("{:?} sounds", queue), queue_mode))
            .collect();
        Self {
            config,
            context,
            queues,
            gain: std::array::from_fn(|_| AtomicU8::new(NEUTRAL_MODIFIER)),
            pitch: std::array::from_fn(|_| AtomicU8::new(NEUTRAL_MODIFIER)),
            muted: AtomicBool::new(false),
            listener: Mutex::new(ListenerState::default()),
            playback: FrameCounter::new(),
            finish_requested: AtomicBool::new(false),
            performing: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            cycle: Mutex::new(()),
            stats: Mutex::new(MixerStats::default()),
            metrics: None,
        }
    }

    /// Attaches a metrics registry to the mixer for observability.
    pub fn with_telemetry(mut self, registry: &MetricsRegistry) -> Self {
        match MixerMetrics::register(registry) {
            Ok(metrics) => self.metrics = Some(metrics),
            Err(e) => log::warn!("SndMixer telemetry disabled: {}", e),
        }
        self
    }

    /// The configuration the mixer was built with.
    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Requests insertion of `object` into the queue of its priority class.
    ///
    /// Objects flagged `PRIORITY` go to the front of their queue.
    pub fn play_object(&self, object: Arc<dyn Playable>) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        let flags = object.playback_flags();
        let queue = SoundQueue::from_flags(flags);
        let sort_key = if flags.contains(PlayFlags::PRIORITY) {
            -1.0
        } else {
            0.0
        };
        let base = object.base_id();
        self.queues[queue.index()].request_insert(object, base, sort_key);
        true
    }

    /// Requests removal of `object`. It receives a `STOP` reply and its source is returned.
    pub fn remove_object(&self, object: &Arc<dyn Playable>) {
        for queue in &self.queues {
            queue.request_remove(object);
        }
    }

    /// Requests a pause toggle of `object`.
    pub fn pause_object(&self, object: &Arc<dyn Playable>) {
        for queue in &self.queues {
            queue.request_pause(object);
        }
    }

    /// Lets the next cycle run in immediate mode.
    pub fn play_finish(&self) {
        self.finish_requested.store(true, Ordering::Release);
    }

    /// Replaces the listener at the start of the next cycle.
    pub fn set_listener_camera(&self, camera: Option<Arc<dyn Camera>>) {
        lock_or_recover(&self.listener).pending = Some(camera);
    }

    /// The most recently requested listener.
    pub fn listener_camera(&self) -> Option<Arc<dyn Camera>> {
        let state = lock_or_recover(&self.listener);
        match &state.pending {
            Some(pending) => pending.clone(),
            None => state.current.clone(),
        }
    }

    /// Sets the gain modifier of `queue`, as a percentage.
    pub fn set_gain_modifier(&self, queue: SoundQueue, gain: u8) {
        self.gain[queue.index()].store(gain, Ordering::Release);
    }

    /// Sets the pitch modifier of `queue`, as a percentage.
    pub fn set_pitch_modifier(&self, queue: SoundQueue, pitch: u8) {
        self.pitch[queue.index()].store(pitch, Ordering::Release);
    }

    pub fn gain_modifier(&self, queue: SoundQueue) -> u8 {
        self.gain[queue.index()].load(Ordering::Acquire)
    }

    pub fn pitch_modifier(&self, queue: SoundQueue) -> u8 {
        self.pitch[queue.index()].load(Ordering::Acquire)
    }

    /// Silences everything. Queues keep their objects.
    pub fn set_mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Current playback frame.
    pub fn playback_frame(&self) -> FrameNumber {
        self.playback.current()
    }

    /// Number of objects enqueued in `queue`.
    pub fn queue_depth(&self, queue: SoundQueue) -> usize {
        self.queues[queue.index()].len()
    }

    /// Counts from the last completed cycle.
    pub fn last_cycle_stats(&self) -> MixerStats {
        *lock_or_recover(&self.stats)
    }

    fn release(&self, source: Option<SourceId>) {
        if let Some(source) = source {
            self.context.unbind_source(source);
            self.context.return_source(source);
        }
    }

    /// Applies a pending listener swap and pushes the listener position.
    fn update_listener(&self) -> Vec3 {
        let listener = {
            let mut state = lock_or_recover(&self.listener);
            if let Some(pending) = state.pending.take() {
                state.current = pending;
            }
            state.current.clone()
        };
        match listener {
            Some(camera) => {
                let position = camera.viewing_source();
                self.context.set_listener(position);
                position
            }
            None => Vec3::ZERO,
        }
    }

    fn base_reply(&self, queue: SoundQueue) -> PlayReply {
        PlayReply::for_queue(
            queue.flag(),
            self.gain_modifier(queue),
            self.pitch_modifier(queue),
        )
    }

    fn run_cycle(&self) {
        let _timer = ScopedGaugeTimer::new(self.metrics.as_ref().map(|m| &m.cycle_time_ms));
        let mode = self.config.mode;
        let frame = self.playback.advance();
        let slice = TimeSlice::start(self.config.time_slice);
        let listener = self.update_listener();
        let frame_check = mode.contains(MixerMode::FRAMECHECK);
        let muted = self.is_muted();
        let mut stats = MixerStats::default();

        let budget = self.config.source_budget.min(self.context.source_limit());
        let reserved = reserve_slots(mode, budget);

        for queue in SoundQueue::ALL {
            let base_reply = self.base_reply(queue);
            let outcome = self.queues[queue.index()].reconcile(frame);
            for removed in outcome.removed {
                self.release(removed.source);
                removed.object.play(base_reply | PlayReply::STOP, None);
            }
            for paused in outcome.paused {
                self.release(paused.source);
                paused.object.play(base_reply | PlayReply::PAUSE, None);
            }
        }

        // Demand: eligible objects per class, after retiring stale ones.
        let mut demand = [0usize; SOUND_QUEUE_COUNT];
        for queue in SoundQueue::ALL {
            let q = queue.index();
            let expired = self.queues[q].for_each_eligible(frame, |item| {
                if frame_check {
                    match check_frame(item.object().playback_frame(), frame) {
                        FrameCheck::Eligible => {}
                        FrameCheck::Expired => return Visit::Expire,
                        FrameCheck::Skip => {
                            self.release(item.take_source());
                            return Visit::Retain;
                        }
                    }
                }
                demand[q] += 1;
                Visit::Retain
            });
            let stop = self.base_reply(queue) | PlayReply::STOP;
            for gone in expired {
                self.release(gone.source);
                gone.object.play(stop, None);
                stats.expired += 1;
            }
        }

        let mut book = SlotBook::new(budget, reserved, demand);
        for queue in SoundQueue::ALL {
            let base_reply = self.base_reply(queue);
            let gain = base_reply.gain_modifier();
            let pitch = base_reply.pitch_modifier();
            let mut last_base = None;

            self.queues[queue.index()].for_each_eligible(frame, |item| {
                let object = Arc::clone(item.object());
                if frame_check && check_frame(object.playback_frame(), frame) != FrameCheck::Eligible
                {
                    return Visit::Retain;
                }
                if muted {
                    self.release(item.take_source());
                    stats.muted += 1;
                    return Visit::Retain;
                }

                let flags = object.playback_flags();
                if !book.take(queue, flags.contains(PlayFlags::STRICT)) {
                    if let Some(source) = item.take_source() {
                        self.release(Some(source));
                        object.play(base_reply | PlayReply::PAUSE, None);
                    }
                    stats.skipped += 1;
                    return Visit::Retain;
                }

                let source = match item.source() {
                    Some(source) => source,
                    None => match self.context.request_source() {
                        Some(source) => {
                            item.set_source(source);
                            source
                        }
                        None => {
                            log::debug!("Sound context ran out of sources.");
                            stats.skipped += 1;
                            return Visit::Retain;
                        }
                    },
                };
                let params = SourceParams {
                    gain: object.gain() * gain,
                    pitch: object.pitch() * pitch,
                    position: object.playback_source() - listener,
                    looping: flags.contains(PlayFlags::LOOPING),
                };
                self.context.bind_source(source, &params);

                let mut reply = base_reply | PlayReply::PASS;
                if item.take_start() {
                    reply |= PlayReply::START;
                }
                if last_base == Some(item.base()) {
                    reply |= PlayReply::SAME_LAST_BASE;
                }
                last_base = Some(item.base());
                if object
                    .playback_sync()
                    .map(|sync| sync.take_invalidation())
                    .unwrap_or(false)
                {
                    reply |= PlayReply::API_SYNC_INVALID;
                }
                if slice.is_exhausted() {
                    reply |= PlayReply::HURRY;
                }

                object.play(reply, Some(source));
                stats.played += 1;
                Visit::Retain
            });
        }

        if !mode.contains(MixerMode::PERSISTENT) {
            for queue in &self.queues {
                for item in queue.expire_all() {
                    self.release(item.source);
                }
            }
        }

        log::trace!(
            "Mix frame {}: {} played, {} skipped, {} muted (budget {})",
            frame,
            stats.played,
            stats.skipped,
            stats.muted,
            budget
        );
        if let Some(metrics) = &self.metrics {
            let _ = metrics.played.increment_by(stats.played as u64);
            let _ = metrics.skipped.increment_by(stats.skipped as u64);
            let queued: usize = self.queues.iter().map(WorkQueue::len).sum();
            let _ = metrics.queued.set(queued as f64);
        }
        *lock_or_recover(&self.stats) = stats;
    }
}

impl Task for SndMixer {
    fn task_name(&self) -> &str {
        "snd-mixer"
    }

    fn task_priority(&self) -> f32 {
        self.config.priority
    }

    fn perform(&self) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        if self.config.mode.contains(MixerMode::IMMEDIATE)
            && !self.finish_requested.swap(false, Ordering::AcqRel)
        {
            return;
        }
        let _cycle = lock_or_recover(&self.cycle);
        self.performing.store(true, Ordering::Release);
        self.run_cycle();
        self.performing.store(false, Ordering::Release);
    }

    fn shut_down(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _cycle = lock_or_recover(&self.cycle);
        for queue in SoundQueue::ALL {
            let stop = self.base_reply(queue) | PlayReply::STOP;
            for item in self.queues[queue.index()].remove_all() {
                self.release(item.source);
                item.object.play(stop, None);
            }
        }
        log::info!("SndMixer shut down.");
    }

    fn is_task_performing(&self) -> bool {
        self.performing.load(Ordering::Acquire)
    }

    fn is_task_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}
