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

//! Graphics and sound API contexts consumed by the schedulers.
//!
//! Concrete backends implement these traits; the schedulers call into them but
//! never manage the backend's own resource pools.

use crate::math::Vec3;
use crate::object::Camera;

/// The graphics API as seen by the renderer.
pub trait GraphicsContext: Send + Sync {
    /// Makes `camera` the active camera for the zero-based `pass`.
    fn bind_camera(&self, pass: usize, camera: &dyn Camera);

    /// Called before any object of `pass` renders.
    fn begin_pass(&self, _pass: usize) {}

    /// Called after every object of `pass` rendered.
    fn end_pass(&self, _pass: usize) {}
}

/// Identifier of a pooled sound source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

/// Parameters pushed to a sound source before playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceParams {
    /// Effective gain (object gain times queue modifier).
    pub gain: f32,
    /// Effective pitch (object pitch times queue modifier).
    pub pitch: f32,
    /// Emitter position relative to the listener.
    pub position: Vec3,
    /// The source loops.
    pub looping: bool,
}

/// The sound API as seen by the mixer.
pub trait SoundContext: Send + Sync {
    /// Maximum number of simultaneously bound sources the backend supports.
    fn source_limit(&self) -> usize;

    /// Takes a source from the backend pool.
    fn request_source(&self) -> Option<SourceId>;

    /// Gives a source back to the backend pool.
    fn return_source(&self, source: SourceId);

    /// Applies `params` to `source`.
    fn bind_source(&self, source: SourceId, params: &SourceParams);

    /// Detaches whatever is playing on `source`.
    fn unbind_source(&self, _source: SourceId) {}

    /// Moves the listener.
    fn set_listener(&self, position: Vec3);
}
