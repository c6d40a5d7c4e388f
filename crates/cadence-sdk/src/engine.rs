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

//! Assembles the schedulers and runs them under the task manager.

use crate::config::EngineConfig;
use anyhow::{Context, Result};
use cadence_agents::audio_agent::SndMixer;
use cadence_agents::physics_agent::PhyActuator;
use cadence_agents::render_agent::GfxRenderer;
use cadence_control::{ShutdownReport, TaskHandle, TaskManager};
use cadence_core::context::{GraphicsContext, SoundContext};
use cadence_core::task::Task;
use cadence_telemetry::MetricsRegistry;
use std::sync::Arc;

/// A running engine: the three schedulers registered with a task manager.
///
/// The actuator runs first in every cycle; the renderer and the mixer follow
/// it, so objects are drawn and heard where the actuator last put them.
pub struct Engine {
    renderer: Arc<GfxRenderer>,
    mixer: Arc<SndMixer>,
    actuator: Arc<PhyActuator>,
    renderer_task: TaskHandle,
    mixer_task: TaskHandle,
    actuator_task: TaskHandle,
    metrics: Arc<MetricsRegistry>,
    tasks: TaskManager,
}

impl Engine {
    /// Builds the schedulers described by `config` and starts the worker pool.
    pub fn new(
        config: &EngineConfig,
        graphics: Arc<dyn GraphicsContext>,
        sound: Arc<dyn SoundContext>,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsRegistry::new());

        let renderer =
            Arc::new(GfxRenderer::new(config.renderer_config(), graphics).with_telemetry(&metrics));
        let mixer = Arc::new(SndMixer::new(config.mixer_config(), sound).with_telemetry(&metrics));
        let actuator =
            Arc::new(PhyActuator::new(config.actuator_config()).with_telemetry(&metrics));
        actuator.set_master_throttle(config.actuator.master_throttle);

        let tasks = TaskManager::new(config.task_manager_config());
        let actuator_task = tasks
            .register_task(actuator.clone() as Arc<dyn Task>)
            .context("Failed to register the physical actuator")?;
        let renderer_task = tasks
            .register_task(renderer.clone() as Arc<dyn Task>)
            .context("Failed to register the graphics renderer")?;
        let mixer_task = tasks
            .register_task(mixer.clone() as Arc<dyn Task>)
            .context("Failed to register the sound mixer")?;
        tasks
            .register_dependency(renderer_task, actuator_task)
            .context("Failed to order the renderer after the actuator")?;
        tasks
            .register_dependency(mixer_task, actuator_task)
            .context("Failed to order the mixer after the actuator")?;

        log::info!(
            "Engine started with {} worker threads.",
            config.tasks.worker_threads
        );
        Ok(Self {
            renderer,
            mixer,
            actuator,
            renderer_task,
            mixer_task,
            actuator_task,
            metrics,
            tasks,
        })
    }

    pub fn renderer(&self) -> &Arc<GfxRenderer> {
        &self.renderer
    }

    pub fn mixer(&self) -> &Arc<SndMixer> {
        &self.mixer
    }

    pub fn actuator(&self) -> &Arc<PhyActuator> {
        &self.actuator
    }

    /// The task manager, for hosts that register tasks of their own.
    pub fn task_manager(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn renderer_task(&self) -> TaskHandle {
        self.renderer_task
    }

    pub fn mixer_task(&self) -> TaskHandle {
        self.mixer_task
    }

    pub fn actuator_task(&self) -> TaskHandle {
        self.actuator_task
    }

    /// Stops the worker pool and shuts every idle scheduler down.
    ///
    /// Calling it again returns the first report. Dropping the engine shuts
    /// down the same way.
    pub fn shut_down(&self) -> ShutdownReport {
        self.tasks.shut_down_task_threads()
    }
}
