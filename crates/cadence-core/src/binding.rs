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

//! Bindable resources and the binding-stage contract used by the renderer.
//!
//! The low-level API calls live behind [`BindableResource::bind`]; this crate
//! only decides *when* they are issued.

use crate::math::Vec3;

/// Stable identifier of a bindable resource, used for stack hashing.
pub type ResourceId = u64;

/// A resource that can be bound to a numbered API slot.
pub trait BindableResource: Send + Sync {
    /// Stable identifier of the resource.
    fn resource_id(&self) -> ResourceId;

    /// Binds the resource to `slot`.
    fn bind(&self, slot: usize);

    /// Unbinds the resource from `slot`.
    fn unbind(&self, slot: usize);
}

/// A light source.
pub trait Light: BindableResource {
    /// World-space position of the light.
    fn illumination_source(&self) -> Vec3;
}

/// A surface material.
pub trait Material: BindableResource {
    /// `false` when the material blends with what is behind it.
    fn is_opaque(&self) -> bool {
        true
    }
}

/// A shader program.
pub trait Shader: BindableResource {}

/// A texture.
pub trait Texture: BindableResource {
    /// `false` when the texture carries transparency.
    fn is_opaque(&self) -> bool {
        true
    }
}

/// The set of stacks an object pushes before rendering.
///
/// Two objects whose stages report the same [`stack_hash`](Self::stack_hash)
/// bind identical API state.
pub trait StageBinding: Send + Sync {
    /// Hash of the current contents of every stack.
    fn stack_hash(&self) -> u64;

    /// Issues the API bind calls for every stack. Returns the number of resources bound.
    fn bind_stages(&self) -> usize;

    /// Issues the matching unbind calls.
    fn unbind_stages(&self);

    /// `false` when any bound material or texture is translucent.
    fn is_opaque(&self) -> bool;
}
