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

//! Binding stage stacks.
//!
//! Every renderable object points at a set of stacks (lights, materials,
//! shaders, textures). Stacks are shared between objects through
//! `Arc<RwLock<_>>`, and each one keeps a hash of its contents so the renderer
//! can tell when two consecutive objects need the same API state.

mod light;
mod stack;
mod stages;

pub use light::{LightStack, MAX_LIGHTS};
pub use stack::{
    MaterialStack, ResourceStack, ShaderStack, TextureStack, MAX_MATERIALS, MAX_SHADERS,
    MAX_TEXTURES,
};
pub use stages::BindingStages;

use cadence_core::binding::ResourceId;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// Hashes an ordered list of resource ids. The empty stack hashes to 0.
pub(crate) fn hash_resources(ids: impl IntoIterator<Item = ResourceId>) -> u64 {
    let mut hasher = DefaultHasher::new();
    let mut count = 0u64;
    for id in ids {
        hasher.write_u64(id);
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    hasher.write_u64(count);
    hasher.finish()
}
