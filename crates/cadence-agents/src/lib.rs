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

//! # Cadence Agents
//!
//! The three frame schedulers of the engine. Each one owns a family of
//! [`WorkQueue`](cadence_data::WorkQueue)s and runs as a
//! [`Task`](cadence_core::task::Task) under the task manager.
//!
//! - [`render_agent::GfxRenderer`]: eight render passes, bind skipping,
//!   back-to-front sorting of translucent passes.
//! - [`audio_agent::SndMixer`]: four priority classes sharing a budget of
//!   sound sources.
//! - [`physics_agent::PhyActuator`]: pre-pass, actuator and main-pass stages
//!   driven by a clamped delta time.

pub mod audio_agent;
pub mod physics_agent;
pub mod render_agent;

pub use audio_agent::{MixerConfig, MixerMode, SndMixer, SoundQueue};
pub use physics_agent::{ActuatorConfig, ActuatorMode, PhyActuator};
pub use render_agent::{GfxRenderer, RenderMode, RendererConfig};
