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

use super::{LightStack, MaterialStack, ShaderStack, TextureStack};
use cadence_core::binding::StageBinding;
use cadence_core::utils::read_or_recover;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::{Arc, RwLock};

/// The stacks one renderable binds before it draws.
///
/// Every stack is optional and may be shared with other objects.
#[derive(Debug, Default, Clone)]
pub struct BindingStages {
    lights: Option<Arc<RwLock<LightStack>>>,
    materials: Option<Arc<RwLock<MaterialStack>>>,
    shaders: Option<Arc<RwLock<ShaderStack>>>,
    textures: Option<Arc<RwLock<TextureStack>>>,
}

impl BindingStages {
    /// No stacks at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lights(mut self, lights: Arc<RwLock<LightStack>>) -> Self {
        self.lights = Some(lights);
        self
    }

    pub fn with_materials(mut self, materials: Arc<RwLock<MaterialStack>>) -> Self {
        self.materials = Some(materials);
        self
    }

    pub fn with_shaders(mut self, shaders: Arc<RwLock<ShaderStack>>) -> Self {
        self.shaders = Some(shaders);
        self
    }

    pub fn with_textures(mut self, textures: Arc<RwLock<TextureStack>>) -> Self {
        self.textures = Some(textures);
        self
    }

    pub fn lights(&self) -> Option<&Arc<RwLock<LightStack>>> {
        self.lights.as_ref()
    }

    pub fn materials(&self) -> Option<&Arc<RwLock<MaterialStack>>> {
        self.materials.as_ref()
    }

    pub fn shaders(&self) -> Option<&Arc<RwLock<ShaderStack>>> {
        self.shaders.as_ref()
    }

    pub fn textures(&self) -> Option<&Arc<RwLock<TextureStack>>> {
        self.textures.as_ref()
    }
}

impl StageBinding for BindingStages {
    fn stack_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let mut any = false;
        let mut mix = |hash: Option<u64>| {
            let hash = hash.unwrap_or(0);
            any |= hash != 0;
            hasher.write_u64(hash);
        };
        mix(self.lights.as_ref().map(|s| read_or_recover(s).stack_hash()));
        mix(self.materials.as_ref().map(|s| read_or_recover(s).stack_hash()));
        mix(self.shaders.as_ref().map(|s| read_or_recover(s).stack_hash()));
        mix(self.textures.as_ref().map(|s| read_or_recover(s).stack_hash()));
        if any {
            hasher.finish()
        } else {
            0
        }
    }

    fn bind_stages(&self) -> usize {
        let mut bound = 0;
        if let Some(shaders) = &self.shaders {
            bound += read_or_recover(shaders).bind_all();
        }
        if let Some(lights) = &self.lights {
            bound += read_or_recover(lights).bind_all();
        }
        if let Some(materials) = &self.materials {
            bound += read_or_recover(materials).bind_all();
        }
        if let Some(textures) = &self.textures {
            bound += read_or_recover(textures).bind_all();
        }
        bound
    }

    fn unbind_stages(&self) {
        if let Some(textures) = &self.textures {
            read_or_recover(textures).unbind_all();
        }
        if let Some(materials) = &self.materials {
            read_or_recover(materials).unbind_all();
        }
        if let Some(lights) = &self.lights {
            read_or_recover(lights).unbind_all();
        }
        if let Some(shaders) = &self.shaders {
            read_or_recover(shaders).unbind_all();
        }
    }

    fn is_opaque(&self) -> bool {
        let materials = self
            .materials
            .as_ref()
            .map(|s| read_or_recover(s).is_opaque())
            .unwrap_or(true);
        let textures = self
            .textures
            .as_ref()
            .map(|s| read_or_recover(s).is_opaque())
            .unwrap_or(true);
        materials && textures
    }
}
