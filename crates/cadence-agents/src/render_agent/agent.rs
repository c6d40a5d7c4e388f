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

//! Defines the GfxRenderer, the scheduler that drives every render pass.

use super::pass::RenderPass;
use cadence_core::binding::StageBinding;
use cadence_core::cadence_bitflags;
use cadence_core::context::GraphicsContext;
use cadence_core::frame::{check_frame, FrameCheck, TimeSlice};
use cadence_core::math::Vec3;
use cadence_core::object::{Camera, RenderFlags, RenderReply, Renderable, RENDER_PASS_COUNT};
use cadence_core::task::Task;
use cadence_core::utils::lock_or_recover;
use cadence_core::{BaseId, FrameCounter, FrameNumber};
use cadence_data::{DetachedItem, QueueMode, Visit};
use cadence_telemetry::metrics::registry::{CounterHandle, GaugeHandle, MetricsRegistry};
use cadence_telemetry::{MetricsResult, ScopedGaugeTimer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

cadence_bitflags! {
    /// How the renderer stores and retires its objects.
    pub struct RenderMode: u32 {
        /// Insertion-ordered queues; a cycle only runs after [`GfxRenderer::render_finish`].
        const IMMEDIATE = 0x0001;
        /// Sorted queues.
        const DEFERRED = 0x0002;
        /// Objects stay enqueued until removed.
        const PERSISTENT = 0x0100;
        /// Objects whose rendering frame is stale are retired.
        const FRAMECHECK = 0x0200;
    }
}

impl RenderMode {
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

/// Configuration for the [`GfxRenderer`].
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Storage and retirement mode.
    pub mode: RenderMode,
    /// Per-cycle time allowance; replies carry `HURRY` once it runs out.
    pub time_slice: Option<Duration>,
    /// Task priority under the task manager.
    pub priority: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::DEFAULT,
            time_slice: None,
            priority: 0.75,
        }
    }
}

/// Counts from the last completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Render calls made.
    pub rendered: usize,
    /// Times a binding stage set was bound.
    pub stage_binds: usize,
    /// Objects retired by the frame check.
    pub expired: usize,
}

/// Holds telemetry handles for the renderer.
struct RenderMetrics {
    rendered: CounterHandle,
    stage_binds: CounterHandle,
    expired: CounterHandle,
    queued: GaugeHandle,
    cycle_time_ms: GaugeHandle,
}

impl RenderMetrics {
    fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            rendered: registry.register_counter("renderer", "rendered", "Render calls made")?,
            stage_binds: registry.register_counter(
                "renderer",
                "stage_binds",
                "Binding stage sets bound",
            )?,
            expired: registry.register_counter(
                "renderer",
                "expired",
                "Objects retired by the frame check",
            )?,
            queued: registry.register_gauge(
                "renderer",
                "queued",
                "Objects enqueued across all passes",
                "count",
            )?,
            cycle_time_ms: registry.register_gauge(
                "renderer",
                "cycle_time_ms",
                "Time spent in one render cycle",
                "ms",
            )?,
        })
    }
}

/// The graphics renderer.
///
/// Public methods are safe to call from any thread; queue changes they request
/// take effect at the start of the next cycle.
pub struct GfxRenderer {
    config: RendererConfig,
    context: Arc<dyn GraphicsContext>,
    passes: Vec<RenderPass>,
    illumination: FrameCounter,
    rendering: FrameCounter,
    finish_requested: AtomicBool,
    performing: AtomicBool,
    shut_down: AtomicBool,
    /// Serializes cycles and shutdown.
    cycle: Mutex<()>,
    stats: Mutex<RenderStats>,
    metrics: Option<RenderMetrics>,
}

impl GfxRenderer {
    /// Creates a renderer drawing through `context`.
    pub fn new(config: RendererConfig, context: Arc<dyn GraphicsContext>) -> Self {
        let queue_mode = config.mode.queue_mode();
        let passes = (0..RENDER_PASS_COUNT)
            .map(|index| RenderPass::new(index, queue_mode))
            .collect();
        Self {
            config,
            context,
            passes,
            illumination: FrameCounter::new(),
            rendering: FrameCounter::new(),
            finish_requested: AtomicBool::new(false),
            performing: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            cycle: Mutex::new(()),
            stats: Mutex::new(RenderStats::default()),
            metrics: None,
        }
    }

    /// Attaches a metrics registry to the renderer for observability.
    pub fn with_telemetry(mut self, registry: &MetricsRegistry) -> Self {
        match RenderMetrics::register(registry) {
            Ok(metrics) => self.metrics = Some(metrics),
            Err(e) => log::warn!("GfxRenderer telemetry disabled: {}", e),
        }
        self
    }

    /// The configuration the renderer was built with.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn pass(&self, pass: usize) -> Option<&RenderPass> {
        let found = self.passes.get(pass);
        if found.is_none() {
            log::warn!("Render pass index {} out of range.", pass);
        }
        found
    }

    /// Requests insertion of `object` into every pass its flags select.
    ///
    /// Returns `false` if no pass is selected or the renderer is shut down.
    pub fn render_object(&self, object: Arc<dyn Renderable>) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        let flags = object.rendering_flags().masked(RenderFlags::PASS_MASK);
        let base = object.base_id();
        let mut any = false;
        for (index, pass) in self.passes.iter().enumerate() {
            if flags.intersects(RenderFlags::pass(index)) {
                pass.queue.request_insert(Arc::clone(&object), base, 0.0);
                any = true;
            }
        }
        any
    }

    /// Requests removal of `object` from every pass. It receives a `STOP` reply.
    pub fn remove_object(&self, object: &Arc<dyn Renderable>) {
        for pass in &self.passes {
            pass.queue.request_remove(object);
        }
    }

    /// Requests a pause toggle of `object` in every pass holding it.
    pub fn pause_object(&self, object: &Arc<dyn Renderable>) {
        for pass in &self.passes {
            pass.queue.request_pause(object);
        }
    }

    /// Lets the next cycle run in immediate mode.
    pub fn render_finish(&self) {
        self.finish_requested.store(true, Ordering::Release);
    }

    /// Sets the camera bound at the start of `pass` (zero-based).
    pub fn set_rendering_camera(&self, pass: usize, camera: Option<Arc<dyn Camera>>) {
        if let Some(pass) = self.pass(pass) {
            pass.set_camera(camera);
        }
    }

    /// The camera of `pass`.
    pub fn rendering_camera(&self, pass: usize) -> Option<Arc<dyn Camera>> {
        self.pass(pass).and_then(RenderPass::camera)
    }

    /// Sets the alpha modifier of `pass`, as a percentage.
    pub fn set_alpha_modifier(&self, pass: usize, alpha: u8) {
        if let Some(pass) = self.pass(pass) {
            pass.set_alpha(alpha);
        }
    }

    /// Sets the shade modifier of `pass`, as a percentage.
    pub fn set_shade_modifier(&self, pass: usize, shade: u8) {
        if let Some(pass) = self.pass(pass) {
            pass.set_shade(shade);
        }
    }

    /// The alpha modifier of `pass`.
    pub fn alpha_modifier(&self, pass: usize) -> Option<u8> {
        self.pass(pass).map(RenderPass::alpha)
    }

    /// The shade modifier of `pass`.
    pub fn shade_modifier(&self, pass: usize) -> Option<u8> {
        self.pass(pass).map(RenderPass::shade)
    }

    /// Marks `pass` as opaque (no depth sorting) or translucent (back to front).
    pub fn set_pass_opaque(&self, pass: usize, opaque: bool) {
        if let Some(pass) = self.pass(pass) {
            pass.set_opaque(opaque);
        }
    }

    /// Current illumination frame.
    pub fn illumination_frame(&self) -> FrameNumber {
        self.illumination.current()
    }

    /// Current rendering frame.
    pub fn rendering_frame(&self) -> FrameNumber {
        self.rendering.current()
    }

    /// Number of objects enqueued in `pass`.
    pub fn queue_depth(&self, pass: usize) -> usize {
        self.pass(pass).map(|pass| pass.queue.len()).unwrap_or(0)
    }

    /// Counts from the last completed cycle.
    pub fn last_cycle_stats(&self) -> RenderStats {
        *lock_or_recover(&self.stats)
    }

    fn run_cycle(&self) {
        let _timer = ScopedGaugeTimer::new(self.metrics.as_ref().map(|m| &m.cycle_time_ms));
        let mode = self.config.mode;
        self.illumination.advance();
        let frame = self.rendering.advance();
        let slice = TimeSlice::start(self.config.time_slice);
        let mut stats = RenderStats::default();

        for (index, pass) in self.passes.iter().enumerate() {
            let flag = RenderFlags::pass(index);
            let base_reply = RenderReply::for_pass(flag, pass.alpha(), pass.shade());

            let outcome = pass.queue.reconcile(frame);
            for removed in outcome.removed {
                removed.object.render(base_reply | RenderReply::STOP);
            }
            for paused in outcome.paused {
                paused.object.render(base_reply | RenderReply::PAUSE);
            }

            let camera = pass.camera();
            if let Some(camera) = &camera {
                self.context.bind_camera(index, camera.as_ref());
            }
            if pass.queue.is_empty() {
                continue;
            }

            let sync_invalid = pass.take_invalidation();
            if mode.queue_mode() == QueueMode::Sorted && !pass.is_opaque() {
                let eye = camera
                    .as_ref()
                    .map(|camera| camera.viewing_source())
                    .unwrap_or(Vec3::ZERO);
                pass.queue
                    .resort_by(|item| -item.object().rendering_source().distance_squared(eye));
            }

            self.context.begin_pass(index);
            let mut last_base: Option<BaseId> = None;
            let mut bound: Option<(u64, Arc<dyn StageBinding>)> = None;
            let frame_check = mode.contains(RenderMode::FRAMECHECK);

            pass.queue.for_each_eligible(frame, |item| {
                let object = Arc::clone(item.object());
                if frame_check {
                    match check_frame(object.rendering_frame(), frame) {
                        FrameCheck::Eligible => {}
                        FrameCheck::Skip => return Visit::Retain,
                        FrameCheck::Expired => {
                            object.render(base_reply | RenderReply::STOP);
                            stats.expired += 1;
                            return Visit::Expire;
                        }
                    }
                }

                let mut reply = base_reply | RenderReply::PASS;
                if item.take_start() {
                    reply |= RenderReply::START;
                }

                let base = item.base();
                if last_base == Some(base) {
                    reply |= RenderReply::SAME_LAST_BASE;
                }
                if let Some(stages) = object.binding_stages() {
                    let hash = stages.stack_hash();
                    let reuse = last_base == Some(base)
                        && bound.as_ref().map(|(h, _)| *h == hash).unwrap_or(false);
                    if !reuse {
                        if let Some((_, previous)) = bound.take() {
                            previous.unbind_stages();
                        }
                        stages.bind_stages();
                        stats.stage_binds += 1;
                        bound = Some((hash, stages));
                    }
                }
                last_base = Some(base);

                let object_invalid = object
                    .rendering_sync()
                    .map(|sync| sync.take_invalidation())
                    .unwrap_or(false);
                if sync_invalid || object_invalid {
                    reply |= RenderReply::API_SYNC_INVALID;
                }
                if slice.is_exhausted() {
                    reply |= RenderReply::HURRY;
                }

                object.render(reply);
                stats.rendered += 1;
                Visit::Retain
            });

            if let Some((_, stages)) = bound {
                stages.unbind_stages();
            }
            self.context.end_pass(index);
        }

        if !mode.contains(RenderMode::PERSISTENT) {
            for pass in &self.passes {
                pass.queue.expire_all();
            }
        }

        log::trace!(
            "Render frame {}: {} rendered, {} binds, {} expired",
            frame,
            stats.rendered,
            stats.stage_binds,
            stats.expired
        );
        self.publish(&stats);
        *lock_or_recover(&self.stats) = stats;
    }

    fn publish(&self, stats: &RenderStats) {
        if let Some(metrics) = &self.metrics {
            let _ = metrics.rendered.increment_by(stats.rendered as u64);
            let _ = metrics.stage_binds.increment_by(stats.stage_binds as u64);
            let _ = metrics.expired.increment_by(stats.expired as u64);
            let queued: usize = self.passes.iter().map(|pass| pass.queue.len()).sum();
            let _ = metrics.queued.set(queued as f64);
        }
    }

    fn stop_all(index: usize, pass: &RenderPass, removed: Vec<DetachedItem<dyn Renderable>>) {
        let reply = RenderReply::for_pass(RenderFlags::pass(index), pass.alpha(), pass.shade())
            | RenderReply::STOP;
        for item in removed {
            item.object.render(reply);
        }
    }
}

impl Task for GfxRenderer {
    fn task_name(&self) -> &str {
        "gfx-renderer"
    }

    fn task_priority(&self) -> f32 {
        self.config.priority
    }

    fn perform(&self) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        if self.config.mode.contains(RenderMode::IMMEDIATE)
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
        for (index, pass) in self.passes.iter().enumerate() {
            Self::stop_all(index, pass, pass.queue.remove_all());
        }
        log::info!("GfxRenderer shut down.");
    }

    fn is_task_performing(&self) -> bool {
        self.performing.load(Ordering::Acquire)
    }

    fn is_task_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullContext;

    impl GraphicsContext for NullContext {
        fn bind_camera(&self, _pass: usize, _camera: &dyn Camera) {}
    }

    #[test]
    fn test_default_mode_is_deferred_persistent_framecheck() {
        let mode = RenderMode::DEFAULT;
        assert!(mode.contains(RenderMode::DEFERRED | RenderMode::PERSISTENT));
        assert!(mode.contains(RenderMode::FRAMECHECK));
        assert!(!mode.contains(RenderMode::IMMEDIATE));
        assert_eq!(mode.queue_mode(), QueueMode::Sorted);
    }

    #[test]
    fn test_modifier_change_is_visible_and_out_of_range_pass_is_ignored() {
        let renderer = GfxRenderer::new(RendererConfig::default(), Arc::new(NullContext));
        renderer.set_alpha_modifier(2, 40);
        assert_eq!(renderer.alpha_modifier(2), Some(40));
        assert_eq!(renderer.shade_modifier(2), Some(100));
        renderer.set_alpha_modifier(RENDER_PASS_COUNT, 40);
        assert_eq!(renderer.alpha_modifier(RENDER_PASS_COUNT), None);
    }

    #[test]
    fn test_frame_counters_advance_once_per_cycle() {
        let renderer = GfxRenderer::new(RendererConfig::default(), Arc::new(NullContext));
        let before = renderer.rendering_frame();
        renderer.perform();
        renderer.perform();
        assert_eq!(renderer.rendering_frame(), before + 2);
        assert_eq!(renderer.illumination_frame(), before + 2);
    }

    #[test]
    fn test_immediate_mode_waits_for_finish() {
        let config = RendererConfig {
            mode: RenderMode::IMMEDIATE | RenderMode::PERSISTENT,
            ..Default::default()
        };
        let renderer = GfxRenderer::new(config, Arc::new(NullContext));
        let before = renderer.rendering_frame();
        renderer.perform();
        assert_eq!(renderer.rendering_frame(), before);
        renderer.render_finish();
        renderer.perform();
        assert_eq!(renderer.rendering_frame(), before + 1);
    }
}
