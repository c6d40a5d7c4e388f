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

//! The public-facing SDK of the Cadence scheduling core.
//!
//! Hosts describe the engine in an [`EngineConfig`] (usually loaded from a RON
//! file), hand it their graphics and sound backends, and get back an
//! [`Engine`] whose renderer, mixer and actuator already run under the task
//! manager.

mod config;
mod engine;

pub use config::{
    ActuatorSection, EngineConfig, MixerSection, ScheduleConfig, SourceReservation, TaskSection,
};
pub use engine::Engine;

pub mod prelude {
    pub use cadence_agents::audio_agent::{MixerConfig, SndMixer, SoundQueue};
    pub use cadence_agents::physics_agent::{ActuatorConfig, ActuatorStage, PhyActuator};
    pub use cadence_agents::render_agent::{GfxRenderer, RendererConfig};
    pub use cadence_control::{ShutdownReport, TaskHandle, TaskManager};
    pub use cadence_core::binding::{Light, Material, Shader, StageBinding, Texture};
    pub use cadence_core::context::{GraphicsContext, SoundContext, SourceId, SourceParams};
    pub use cadence_core::math::Vec3;
    pub use cadence_core::object::{
        Actuator, ActuatorFlags, ActuatorReply, BaseId, Camera, Interactable, InteractionFlags,
        InteractionReply, PlayFlags, PlayReply, Playable, RenderFlags, RenderReply, Renderable,
    };
    pub use cadence_core::task::Task;
    pub use cadence_data::binding::BindingStages;

    pub use crate::{Engine, EngineConfig};
}
