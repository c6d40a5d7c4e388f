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

//! Defines the PhyActuator, the scheduler that advances objects by measured time.

use super::{clamp_delta, ActuatorMode, ActuatorStage, MAX_DELTA_T};
use cadence_core::frame::{check_frame, FrameCheck, TimeSlice};
use cadence_core::object::{
    Actuator, ActuatorReply, Interactable, InteractionFlags, InteractionReply,
};
use cadence_core::task::Task;
use cadence_core::utils::lock_or_recover;
use cadence_core::{BaseId, FrameCounter, FrameNumber};
use cadence_data::{DetachedItem, Visit, WorkQueue};
use cadence_telemetry::metrics::registry::{CounterHandle, GaugeHandle, MetricsRegistry};
use cadence_telemetry::{MetricsResult, ScopedGaugeTimer};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Configuration for the [`PhyActuator`].
#[derive(Debug, Clone)]
pub struct ActuatorConfig {
    /// Storage and retirement mode.
    pub mode: ActuatorMode,
    /// Per-cycle time allowance; interaction replies carry `HURRY` once it runs out.
    pub time_slice: Option<Duration>,
    /// Task priority under the task manager.
    pub priority: f32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            mode: ActuatorMode::DEFAULT,
            time_slice: None,
            priority: 0.55,
        }
    }
}

/// Counts from the last completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorStats {
    /// The delta handed to every object.
    pub delta_t: f32,
    /// Pre-pass interactions.
    pub prepass: usize,
    /// Actuator updates.
    pub actuated: usize,
    /// Main-pass interactions.
    pub mainpass: usize,
    /// Objects retired by the frame check.
    pub expired: usize,
}

struct ActuatorMetrics {
    updates: CounterHandle,
    delta_t: GaugeHandle,
    cycle_time_ms: GaugeHandle,
}

impl ActuatorMetrics {
    fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            updates: registry.register_counter(
                "actuator",
                "updates",
                "Update and interaction calls",
            )?,
            delta_t: registry.register_gauge(
                "actuator",
                "delta_t",
                "Delta time distributed in the last cycle",
                "s",
            )?,
            cycle_time_ms: registry.register_gauge(
                "actuator",
                "cycle_time_ms",
                "Time spent in one actuation cycle",
                "ms",
            )?,
        })
    }
}

/// The physical actuator.
pub struct PhyActuator {
    config: ActuatorConfig,
    prepass: WorkQueue<dyn Interactable>,
    actuators: WorkQueue<dyn Actuator>,
    mainpass: WorkQueue<dyn Interactable>,
    /// `f32` bits of the master throttle.
    throttle: AtomicU32,
    interaction: FrameCounter,
    first_cycle: AtomicBool,
    last_tick: Mutex<Option<Instant>>,
    finish_requested: AtomicBool,
    performing: AtomicBool,
    shut_down: AtomicBool,
    cycle: Mutex<()>,
    stats: Mutex<ActuatorStats>,
    metrics: Option<ActuatorMetrics>,
}

impl PhyActuator {
    pub fn new(config: ActuatorConfig) -> Self {
        let queue_mode = config.mode.queue_mode();
        Self {
            prepass: WorkQueue::new("pre-pass", queue_mode),
            actuators: WorkQueue::new("actuator", queue_mode),
            mainpass: WorkQueue::new("main-pass", queue_mode),
            config,
            throttle: AtomicU32::new(1.0f32.to_bits()),
            interaction: FrameCounter::new(),
            first_cycle: AtomicBool::new(true),
            last_tick: Mutex::new(None),
            finish_requested: AtomicBool::new(false),
            performing: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            cycle: Mutex::new(()),
            stats: Mutex::new(ActuatorStats::default()),
            metrics: None,
        }
    }

    /// Attaches a metrics registry to the actuator for observability.
    pub fn with_telemetry(mut self, registry: &MetricsRegistry) -> Self {
        match ActuatorMetrics::register(registry) {
            Ok(metrics) => self.metrics = Some(metrics),
            Err(e) => log::warn!("PhyActuator telemetry disabled: {}", e),
        }
        self
    }

    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    /// Requests insertion of `object` into the actuator stage.
    pub fn actuate_object(&self, object: Arc<dyn Actuator>) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        let base = object.base_id();
        self.actuators.request_insert(object, base, 0.0);
        true
    }

    /// Requests insertion of `object` into the stages its flags select.
    ///
    /// Returns `false` if the flags select neither stage.
    pub fn interact_object(&self, object: Arc<dyn Interactable>) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        let flags = object.interaction_flags();
        let base = object.base_id();
        let mut routed = false;
        if flags.contains(InteractionFlags::PREPASS) {
            self.prepass.request_insert(Arc::clone(&object), base, 0.0);
            routed = true;
        }
        if flags.contains(InteractionFlags::MAINPASS) {
            self.mainpass.request_insert(object, base, 0.0);
            routed = true;
        }
        if !routed {
            log::warn!("Interactable {:?} selects no interaction stage.", base);
        }
        routed
    }

    /// Requests removal of `object`. It receives a final `STOP` update.
    pub fn remove_actuator(&self, object: &Arc<dyn Actuator>) {
        self.actuators.request_remove(object);
    }

    /// Requests removal of `object` from both interaction stages.
    pub fn remove_interactable(&self, object: &Arc<dyn Interactable>) {
        self.prepass.request_remove(object);
        self.mainpass.request_remove(object);
    }

    /// Requests a pause toggle of `object`.
    pub fn pause_actuator(&self, object: &Arc<dyn Actuator>) {
        self.actuators.request_pause(object);
    }

    /// Requests a pause toggle of `object` in both interaction stages.
    pub fn pause_interactable(&self, object: &Arc<dyn Interactable>) {
        self.prepass.request_pause(object);
        self.mainpass.request_pause(object);
    }

    /// Lets the next cycle run in immediate mode.
    pub fn update_finish(&self) {
        self.finish_requested.store(true, Ordering::Release);
    }

    /// Sets the multiplier applied to every clamped delta.
    ///
    /// Negative or non-finite values are ignored.
    pub fn set_master_throttle(&self, throttle: f32) {
        if !throttle.is_finite() || throttle < 0.0 {
            log::warn!("Ignoring invalid master throttle {}.", throttle);
            return;
        }
        self.throttle.store(throttle.to_bits(), Ordering::Release);
    }

    pub fn master_throttle(&self) -> f32 {
        f32::from_bits(self.throttle.load(Ordering::Acquire))
    }

    /// Current interaction frame.
    pub fn interaction_frame(&self) -> FrameNumber {
        self.interaction.current()
    }

    /// Number of objects enqueued in `stage`.
    pub fn queue_depth(&self, stage: ActuatorStage) -> usize {
        match stage {
            ActuatorStage::Prepass => self.prepass.len(),
            ActuatorStage::Actuator => self.actuators.len(),
            ActuatorStage::Mainpass => self.mainpass.len(),
        }
    }

    /// Counts from the last completed cycle.
    pub fn last_cycle_stats(&self) -> ActuatorStats {
        *lock_or_recover(&self.stats)
    }

    /// Runs one cycle with an explicitly measured delta of `raw_dt` seconds.
    ///
    /// The first cycle after construction distributes a delta of zero.
    pub fn advance(&self, raw_dt: f32) -> ActuatorStats {
        let _cycle = lock_or_recover(&self.cycle);
        self.run_cycle(raw_dt);
        self.last_cycle_stats()
    }

    fn measure(&self) -> f32 {
        let now = Instant::now();
        let last = lock_or_recover(&self.last_tick).replace(now);
        last.map_or(0.0, |last| now.duration_since(last).as_secs_f32())
    }

    fn run_cycle(&self, raw_dt: f32) {
        let _timer = ScopedGaugeTimer::new(self.metrics.as_ref().map(|m| &m.cycle_time_ms));
        let mode = self.config.mode;
        let frame = self.interaction.advance();
        let slice = TimeSlice::start(self.config.time_slice);
        let frame_check = mode.contains(ActuatorMode::FRAMECHECK);

        let delta_t = if self.first_cycle.swap(false, Ordering::AcqRel) {
            0.0
        } else {
            clamp_delta(raw_dt, self.master_throttle())
        };
        if raw_dt > MAX_DELTA_T {
            log::debug!("Clamped delta time {:.3}s to {:.3}s.", raw_dt, MAX_DELTA_T);
        }
        let mut stats = ActuatorStats {
            delta_t,
            ..Default::default()
        };

        self.reconcile_interactables(&self.prepass, InteractionFlags::PREPASS, frame);
        let outcome = self.actuators.reconcile(frame);
        for removed in outcome.removed {
            removed.object.update(0.0, ActuatorReply::STOP);
        }
        for paused in outcome.paused {
            paused.object.update(0.0, ActuatorReply::PAUSE);
        }
        self.reconcile_interactables(&self.mainpass, InteractionFlags::MAINPASS, frame);

        stats.prepass = self.interact_stage(
            &self.prepass,
            InteractionFlags::PREPASS,
            frame,
            delta_t,
            &slice,
            &mut stats.expired,
        );

        let mut actuated = 0;
        let expired = self.actuators.for_each_eligible(frame, |item| {
            let object = Arc::clone(item.object());
            let mut reply = ActuatorReply::PASS;
            if item.take_start() {
                reply |= ActuatorReply::START;
            }
            object.update(delta_t, reply);
            actuated += 1;
            if frame_check && check_frame(object.actuation_frame(), frame) == FrameCheck::Expired {
                Visit::Expire
            } else {
                Visit::Retain
            }
        });
        for gone in expired {
            gone.object.update(0.0, ActuatorReply::STOP);
            stats.expired += 1;
        }
        stats.actuated = actuated;

        stats.mainpass = self.interact_stage(
            &self.mainpass,
            InteractionFlags::MAINPASS,
            frame,
            delta_t,
            &slice,
            &mut stats.expired,
        );

        if !mode.contains(ActuatorMode::PERSISTENT) {
            self.prepass.expire_all();
            self.actuators.expire_all();
            self.mainpass.expire_all();
        }

        log::trace!(
            "Actuation frame {}: dt {:.4}s, {} pre-pass, {} actuated, {} main-pass",
            frame,
            delta_t,
            stats.prepass,
            stats.actuated,
            stats.mainpass
        );
        if let Some(metrics) = &self.metrics {
            let updates = stats.prepass + stats.actuated + stats.mainpass;
            let _ = metrics.updates.increment_by(updates as u64);
            let _ = metrics.delta_t.set(delta_t as f64);
        }
        *lock_or_recover(&self.stats) = stats;
    }

    fn reconcile_interactables(
        &self,
        queue: &WorkQueue<dyn Interactable>,
        stage: InteractionFlags,
        frame: FrameNumber,
    ) {
        let outcome = queue.reconcile(frame);
        Self::stop_all(outcome.removed, stage, InteractionReply::STOP);
        Self::stop_all(outcome.paused, stage, InteractionReply::PAUSE);
    }

    fn stop_all(
        items: Vec<DetachedItem<dyn Interactable>>,
        stage: InteractionFlags,
        reply: InteractionReply,
    ) {
        for item in items {
            item.object.interact(0.0, InteractionReply::for_stage(stage) | reply);
        }
    }

    /// Runs one interaction stage and returns how many objects it advanced.
    ///
    /// The frame check runs after the interaction, so an object retired this
    /// frame still gets its last update.
    fn interact_stage(
        &self,
        queue: &WorkQueue<dyn Interactable>,
        stage: InteractionFlags,
        frame: FrameNumber,
        delta_t: f32,
        slice: &TimeSlice,
        expired_count: &mut usize,
    ) -> usize {
        let frame_check = self.config.mode.contains(ActuatorMode::FRAMECHECK);
        let base_reply = InteractionReply::for_stage(stage);
        let mut last_base: Option<BaseId> = None;
        let mut count = 0;

        let expired = queue.for_each_eligible(frame, |item| {
            let object = Arc::clone(item.object());
            let mut reply = base_reply | InteractionReply::PASS;
            if item.take_start() {
                reply |= InteractionReply::START;
            }
            if last_base == Some(item.base()) {
                reply |= InteractionReply::SAME_LAST_BASE;
            }
            last_base = Some(item.base());
            if object
                .interaction_sync()
                .map(|sync| sync.take_invalidation())
                .unwrap_or(false)
            {
                reply |= InteractionReply::API_SYNC_INVALID;
            }
            if slice.is_exhausted() {
                reply |= InteractionReply::HURRY;
            }
            object.interact(delta_t, reply);
            count += 1;
            if frame_check
                && check_frame(object.interaction_frame(), frame) == FrameCheck::Expired
            {
                Visit::Expire
            } else {
                Visit::Retain
            }
        });
        *expired_count += expired.len();
        Self::stop_all(expired, stage, InteractionReply::STOP);
        count
    }
}

impl Task for PhyActuator {
    fn task_name(&self) -> &str {
        "phy-actuator"
    }

    fn task_priority(&self) -> f32 {
        self.config.priority
    }

    fn perform(&self) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        if self.config.mode.contains(ActuatorMode::IMMEDIATE)
            && !self.finish_requested.swap(false, Ordering::AcqRel)
        {
            return;
        }
        let _cycle = lock_or_recover(&self.cycle);
        self.performing.store(true, Ordering::Release);
        let raw_dt = self.measure();
        self.run_cycle(raw_dt);
        self.performing.store(false, Ordering::Release);
    }

    fn shut_down(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _cycle = lock_or_recover(&self.cycle);
        Self::stop_all(
            self.prepass.remove_all(),
            InteractionFlags::PREPASS,
            InteractionReply::STOP,
        );
        for item in self.actuators.remove_all() {
            item.object.update(0.0, ActuatorReply::STOP);
        }
        Self::stop_all(
            self.mainpass.remove_all(),
            InteractionFlags::MAINPASS,
            InteractionReply::STOP,
        );
        log::info!("PhyActuator shut down.");
    }

    fn is_task_performing(&self) -> bool {
        self.performing.load(Ordering::Acquire)
    }

    fn is_task_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Default for PhyActuator {
    fn default() -> Self {
        Self::new(ActuatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cadence_core::FRAME_ALWAYS_PASS;
    use std::sync::atomic::AtomicU16;

    struct Spring {
        base: BaseId,
        frame: AtomicU16,
        updates: Mutex<Vec<(f32, ActuatorReply)>>,
    }

    impl Spring {
        fn new(base: u64) -> Arc<Self> {
            Arc::new(Self {
                base: BaseId::new(base),
                frame: AtomicU16::new(FRAME_ALWAYS_PASS),
                updates: Mutex::new(Vec::new()),
            })
        }
    }

    impl Actuator for Spring {
        fn base_id(&self) -> BaseId {
            self.base
        }

        fn actuation_frame(&self) -> FrameNumber {
            self.frame.load(Ordering::SeqCst)
        }

        fn update(&self, delta_t: f32, reply: ActuatorReply) {
            self.updates.lock().unwrap().push((delta_t, reply));
        }
    }

    #[test]
    fn test_first_cycle_distributes_zero() {
        let actuator = PhyActuator::default();
        let spring = Spring::new(1);
        actuator.actuate_object(spring.clone());

        let first = actuator.advance(0.1);
        assert_relative_eq!(first.delta_t, 0.0);
        let second = actuator.advance(0.1);
        assert_relative_eq!(second.delta_t, 0.1);

        let updates = spring.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].1.contains(ActuatorReply::START | ActuatorReply::PASS));
        assert!(!updates[1].1.contains(ActuatorReply::START));
    }

    #[test]
    fn test_master_throttle_scales_clamped_delta() {
        let actuator = PhyActuator::default();
        actuator.advance(0.0);
        actuator.set_master_throttle(2.0);
        assert_relative_eq!(actuator.advance(2.0).delta_t, 1.0);

        actuator.set_master_throttle(-1.0);
        assert_relative_eq!(actuator.master_throttle(), 2.0);
    }

    #[test]
    fn test_pause_toggles_updates() {
        let actuator = PhyActuator::default();
        let spring = Spring::new(1);
        let handle: Arc<dyn Actuator> = spring.clone();
        actuator.actuate_object(handle.clone());
        actuator.advance(0.0);

        actuator.pause_actuator(&handle);
        let stats = actuator.advance(0.01);
        assert_eq!(stats.actuated, 0);

        actuator.pause_actuator(&handle);
        let stats = actuator.advance(0.01);
        assert_eq!(stats.actuated, 1);

        let updates = spring.updates.lock().unwrap();
        assert!(updates[1].1.contains(ActuatorReply::PAUSE));
        assert!(updates[2].1.contains(ActuatorReply::START));
    }

    #[test]
    fn test_shut_down_stops_everything() {
        let actuator = PhyActuator::default();
        let spring = Spring::new(1);
        actuator.actuate_object(spring.clone());
        actuator.advance(0.0);
        actuator.shut_down();

        assert!(actuator.is_task_shut_down());
        assert_eq!(actuator.queue_depth(ActuatorStage::Actuator), 0);
        let updates = spring.updates.lock().unwrap();
        assert_eq!(updates.last().map(|u| u.1), Some(ActuatorReply::STOP));
        assert!(!actuator.actuate_object(spring.clone()));
    }
}
