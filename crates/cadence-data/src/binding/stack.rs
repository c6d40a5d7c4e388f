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

use super::hash_resources;
use cadence_core::binding::{BindableResource, Material, Shader, Texture};
use cadence_core::BindingError;
use smallvec::SmallVec;
use std::sync::Arc;

/// Capacity of a material stack.
pub const MAX_MATERIALS: usize = 1;
/// Capacity of a shader stack.
pub const MAX_SHADERS: usize = 2;
/// Capacity of a texture stack.
pub const MAX_TEXTURES: usize = 2;

/// A fixed-capacity ordered stack of bindable resources.
pub struct ResourceStack<R: ?Sized, const N: usize> {
    stage: &'static str,
    items: SmallVec<[Arc<R>; N]>,
    hash: u64,
}

/// Materials bound before an object renders.
pub type MaterialStack = ResourceStack<dyn Material, MAX_MATERIALS>;
/// Shader programs bound before an object renders.
pub type ShaderStack = ResourceStack<dyn Shader, MAX_SHADERS>;
/// Textures bound before an object renders.
pub type TextureStack = ResourceStack<dyn Texture, MAX_TEXTURES>;

impl<R: ?Sized + BindableResource, const N: usize> ResourceStack<R, N> {
    /// Creates an empty stack. `stage` names it in errors.
    pub fn with_stage(stage: &'static str) -> Self {
        Self {
            stage,
            items: SmallVec::new(),
            hash: 0,
        }
    }

    /// The stage name.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Appends `resource`. Pushing a resource already on the stack is a no-op.
    pub fn push(&mut self, resource: Arc<R>) -> Result<(), BindingError> {
        if self.items.iter().any(|item| Arc::ptr_eq(item, &resource)) {
            return Ok(());
        }
        if self.items.len() >= N {
            return Err(BindingError::StackFull {
                stage: self.stage,
                capacity: N,
            });
        }
        self.items.push(resource);
        self.rehash();
        Ok(())
    }

    /// Removes and returns the top resource.
    pub fn pop(&mut self) -> Option<Arc<R>> {
        let popped = self.items.pop();
        if popped.is_some() {
            self.rehash();
        }
        popped
    }

    /// Removes every resource.
    pub fn clear(&mut self) {
        self.items.clear();
        self.hash = 0;
    }

    /// Number of resources on the stack.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The resources, bottom first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<R>> {
        self.items.iter()
    }

    /// Hash of the current contents.
    pub fn stack_hash(&self) -> u64 {
        self.hash
    }

    /// Binds every resource to its slot, bottom first. Returns how many were bound.
    pub fn bind_all(&self) -> usize {
        for (slot, item) in self.items.iter().enumerate() {
            item.bind(slot);
        }
        self.items.len()
    }

    /// Unbinds every resource, top first.
    pub fn unbind_all(&self) {
        for (slot, item) in self.items.iter().enumerate().rev() {
            item.unbind(slot);
        }
    }

    fn rehash(&mut self) {
        self.hash = hash_resources(self.items.iter().map(|item| item.resource_id()));
    }
}

impl<const N: usize> ResourceStack<dyn Material, N> {
    /// Creates an empty material stack.
    pub fn new() -> Self {
        Self::with_stage("material")
    }

    /// `false` if any material blends.
    pub fn is_opaque(&self) -> bool {
        self.items.iter().all(|material| material.is_opaque())
    }
}

impl<const N: usize> ResourceStack<dyn Shader, N> {
    /// Creates an empty shader stack.
    pub fn new() -> Self {
        Self::with_stage("shader")
    }
}

impl<const N: usize> ResourceStack<dyn Texture, N> {
    /// Creates an empty texture stack.
    pub fn new() -> Self {
        Self::with_stage("texture")
    }

    /// `false` if any texture carries transparency.
    pub fn is_opaque(&self) -> bool {
        self.items.iter().all(|texture| texture.is_opaque())
    }
}

impl<R: ?Sized, const N: usize> std::fmt::Debug for ResourceStack<R, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStack")
            .field("stage", &self.stage)
            .field("len", &self.items.len())
            .field("capacity", &N)
            .field("hash", &self.hash)
            .finish()
    }
}
