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

//! Engine configuration, loaded from RON.

use anyhow::{Context, Result};
use cadence_agents::audio_agent::{MixerConfig, MixerMode};
use cadence_agents::physics_agent::{ActuatorConfig, ActuatorMode};
use cadence_agents::render_agent::{RenderMode, RendererConfig};
use cadence_control::TaskManagerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MODE_IMMEDIATE: u32 = 0x0001;
const MODE_DEFERRED: u32 = 0x0002;
const MODE_PERSISTENT: u32 = 0x0100;
const MODE_FRAMECHECK: u32 = 0x0200;

/// Mode options shared by the three schedulers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Insertion-ordered queues and host-driven cycles instead of sorted queues.
    pub immediate: bool,
    /// Objects stay enqueued until removed.
    pub persistent: bool,
    /// Objects with stale frame numbers are retired.
    pub frame_check: bool,
    /// Task priority. The scheduler default applies when unset.
    pub priority: Option<f32>,
    /// Per-cycle time allowance in milliseconds.
    pub time_slice_ms: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            immediate: false,
            persistent: true,
            frame_check: true,
            priority: None,
            time_slice_ms: None,
        }
    }
}

impl ScheduleConfig {
    fn mode_bits(&self) -> u32 {
        let mut bits = if self.immediate {
            MODE_IMMEDIATE
        } else {
            MODE_DEFERRED
        };
        if self.persistent {
            bits |= MODE_PERSISTENT;
        }
        if self.frame_check {
            bits |= MODE_FRAMECHECK;
        }
        bits
    }

    fn time_slice(&self) -> Option<Duration> {
        self.time_slice_ms.map(Duration::from_millis)
    }
}

/// How the mixer splits its sources between priority classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceReservation {
    /// One music source; the rest split 50% / 35% / 15%.
    #[default]
    OneMusicWeighted,
    /// One music source; the rest split evenly.
    OneMusicEven,
    /// Two music sources; the rest split 50% / 35% / 15%.
    TwoMusicWeighted,
    /// Two music sources; the rest split evenly.
    TwoMusicEven,
}

impl SourceReservation {
    fn mode(self) -> MixerMode {
        match self {
            SourceReservation::OneMusicWeighted => MixerMode::RESERVE_1_50_35_15,
            SourceReservation::OneMusicEven => MixerMode::RESERVE_1_33_33_33,
            SourceReservation::TwoMusicWeighted => MixerMode::RESERVE_2_50_35_15,
            SourceReservation::TwoMusicEven => MixerMode::RESERVE_2_33_33_33,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSection {
    pub schedule: ScheduleConfig,
    /// Upper bound on simultaneously bound sources.
    pub source_budget: usize,
    pub reservation: SourceReservation,
}

impl Default for MixerSection {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            source_budget: MixerConfig::default().source_budget,
            reservation: SourceReservation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorSection {
    pub schedule: ScheduleConfig,
    /// Multiplier applied to every clamped delta time.
    pub master_throttle: f32,
}

impl Default for ActuatorSection {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            master_throttle: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSection {
    /// Number of worker threads.
    pub worker_threads: usize,
    /// How long shutdown waits for in-flight tasks.
    pub shutdown_timeout_ms: u64,
    /// How long an idle worker sleeps before re-checking for work.
    pub idle_wait_ms: u64,
}

impl Default for TaskSection {
    fn default() -> Self {
        let defaults = TaskManagerConfig::default();
        Self {
            worker_threads: defaults.worker_threads,
            shutdown_timeout_ms: defaults.shutdown_timeout.as_millis() as u64,
            idle_wait_ms: defaults.idle_wait.as_millis() as u64,
        }
    }
}

/// Everything needed to assemble an [`Engine`](crate::Engine).
///
/// Every field has a default, so a configuration file only needs to name what
/// it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tasks: TaskSection,
    pub renderer: ScheduleConfig,
    pub mixer: MixerSection,
    pub actuator: ActuatorSection,
}

impl EngineConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).context("Failed to parse engine configuration")
    }

    /// Reads and parses a RON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine configuration {}", path.display()))?;
        let config = Self::from_ron_str(&text)
            .with_context(|| format!("Invalid engine configuration in {}", path.display()))?;
        log::info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).context("Failed to serialize engine configuration")
    }

    /// Writes the configuration to `path` as pretty RON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_ron_string()?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write engine configuration {}", path.display()))
    }

    pub fn task_manager_config(&self) -> TaskManagerConfig {
        TaskManagerConfig {
            worker_threads: self.tasks.worker_threads,
            shutdown_timeout: Duration::from_millis(self.tasks.shutdown_timeout_ms),
            idle_wait: Duration::from_millis(self.tasks.idle_wait_ms),
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        let defaults = RendererConfig::default();
        RendererConfig {
            mode: RenderMode::from_bits(self.renderer.mode_bits()),
            time_slice: self.renderer.time_slice(),
            priority: self.renderer.priority.unwrap_or(defaults.priority),
        }
    }

    pub fn mixer_config(&self) -> MixerConfig {
        let defaults = MixerConfig::default();
        let schedule = &self.mixer.schedule;
        MixerConfig {
            mode: MixerMode::from_bits(schedule.mode_bits()) | self.mixer.reservation.mode(),
            source_budget: self.mixer.source_budget,
            time_slice: schedule.time_slice(),
            priority: schedule.priority.unwrap_or(defaults.priority),
        }
    }

    pub fn actuator_config(&self) -> ActuatorConfig {
        let defaults = ActuatorConfig::default();
        let schedule = &self.actuator.schedule;
        ActuatorConfig {
            mode: ActuatorMode::from_bits(schedule.mode_bits()),
            time_slice: schedule.time_slice(),
            priority: schedule.priority.unwrap_or(defaults.priority),
        }
    }
}
