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

//! The graphics renderer.
//!
//! Objects register into up to eight render passes. Each cycle the renderer
//! walks the passes in order, binds the pass camera, and renders every eligible
//! object. Consecutive objects sharing a base and an identical binding stage
//! hash reuse the API state of the previous one.

mod agent;
mod pass;

pub use agent::{GfxRenderer, RenderMode, RenderStats, RendererConfig};
