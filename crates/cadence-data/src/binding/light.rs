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
use cadence_core::binding::Light;
use cadence_core::frame::FrameNumber;
use cadence_core::math::Vec3;
use cadence_core::BindingError;
use smallvec::SmallVec;
use std::sync::Arc;

/// Capacity of a light stack.
pub const MAX_LIGHTS: usize = 5;

struct LitEntry {
    light: Arc<dyn Light>,
    frame: FrameNumber,
    distance_sq: f32,
}

/// The lights affecting an object, refreshed once per illumination frame.
///
/// Lights added during an older illumination frame are dropped the first time
/// a light is added for a newer one. When the stack is full and a sort origin is
/// given, a closer light replaces the farthest one.
pub struct LightStack {
    entries: SmallVec<[LitEntry; MAX_LIGHTS]>,
    frame: Option<FrameNumber>,
    hash: u64,
}

impl LightStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
            frame: None,
            hash: 0,
        }
    }

    /// Adds `light` for illumination `frame`.
    ///
    /// Returns `Ok(true)` if the stack changed. With a full stack and no
    /// `sort_origin`, the light is rejected with [`BindingError::StackFull`].
    pub fn add_light(
        &mut self,
        light: Arc<dyn Light>,
        frame: FrameNumber,
        sort_origin: Option<Vec3>,
    ) -> Result<bool, BindingError> {
        if self.frame != Some(frame) {
            self.entries.retain(|entry| entry.frame == frame);
            self.frame = Some(frame);
        }

        let distance_sq = sort_origin
            .map(|origin| light.illumination_source().distance_squared(origin))
            .unwrap_or(0.0);

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| Arc::ptr_eq(&entry.light, &light))
        {
            entry.frame = frame;
            entry.distance_sq = distance_sq;
            return Ok(false);
        }

        let entry = LitEntry {
            light,
            frame,
            distance_sq,
        };
        if self.entries.len() < MAX_LIGHTS {
            self.entries.push(entry);
            self.rehash();
            return Ok(true);
        }
        if sort_origin.is_none() {
            return Err(BindingError::StackFull {
                stage: "light",
                capacity: MAX_LIGHTS,
            });
        }

        let farthest = self
            .entries
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.distance_sq.total_cmp(&b.distance_sq))
            .map(|(index, entry)| (index, entry.distance_sq));
        match farthest {
            Some((index, far)) if entry.distance_sq < far => {
                self.entries[index] = entry;
                self.rehash();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drops every light.
    pub fn remove_all_lights(&mut self) {
        self.entries.clear();
        self.frame = None;
        self.hash = 0;
    }

    /// Number of lights current with illumination `frame`.
    pub fn light_count(&self, frame: FrameNumber) -> usize {
        self.entries.iter().filter(|entry| entry.frame == frame).count()
    }

    /// Number of lights held, current or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no light is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the current contents.
    pub fn stack_hash(&self) -> u64 {
        self.hash
    }

    /// Binds every light to its slot. Returns how many were bound.
    pub fn bind_all(&self) -> usize {
        for (slot, entry) in self.entries.iter().enumerate() {
            entry.light.bind(slot);
        }
        self.entries.len()
    }

    /// Unbinds every light, last slot first.
    pub fn unbind_all(&self) {
        for (slot, entry) in self.entries.iter().enumerate().rev() {
            entry.light.unbind(slot);
        }
    }

    fn rehash(&mut self) {
        self.hash = hash_resources(self.entries.iter().map(|entry| entry.light.resource_id()));
    }
}

impl Default for LightStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LightStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightStack")
            .field("len", &self.entries.len())
            .field("frame", &self.frame)
            .field("hash", &self.hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::binding::{BindableResource, ResourceId};

    struct PointLight {
        id: ResourceId,
        position: Vec3,
    }

    impl BindableResource for PointLight {
        fn resource_id(&self) -> ResourceId {
            self.id
        }
        fn bind(&self, _slot: usize) {}
        fn unbind(&self, _slot: usize) {}
    }

    impl Light for PointLight {
        fn illumination_source(&self) -> Vec3 {
            self.position
        }
    }

    fn light(id: ResourceId, x: f32) -> Arc<dyn Light> {
        Arc::new(PointLight {
            id,
            position: Vec3::new(x, 0.0, 0.0),
        })
    }

    #[test]
    fn test_full_stack_replaces_farthest_light() {
        let mut stack = LightStack::new();
        for id in 1..=5 {
            assert_eq!(
                stack.add_light(light(id, id as f32 * 10.0), 1, Some(Vec3::ZERO)),
                Ok(true)
            );
        }
        let before = stack.stack_hash();

        // Farther than everything held: ignored.
        assert_eq!(stack.add_light(light(6, 100.0), 1, Some(Vec3::ZERO)), Ok(false));
        assert_eq!(stack.stack_hash(), before);

        // Closer than the light at 50: replaces it.
        assert_eq!(stack.add_light(light(7, 1.0), 1, Some(Vec3::ZERO)), Ok(true));
        assert_eq!(stack.len(), MAX_LIGHTS);
        assert_ne!(stack.stack_hash(), before);
    }

    #[test]
    fn test_full_stack_without_origin_is_an_error() {
        let mut stack = LightStack::new();
        for id in 1..=5 {
            stack.add_light(light(id, 0.0), 1, None).unwrap();
        }
        assert_eq!(
            stack.add_light(light(6, 0.0), 1, None),
            Err(BindingError::StackFull {
                stage: "light",
                capacity: MAX_LIGHTS
            })
        );
        assert_eq!(stack.len(), MAX_LIGHTS);
    }

    #[test]
    fn test_new_illumination_frame_drops_stale_lights() {
        let mut stack = LightStack::new();
        let kept = light(1, 0.0);
        stack.add_light(kept.clone(), 1, None).unwrap();
        stack.add_light(light(2, 0.0), 1, None).unwrap();
        assert_eq!(stack.light_count(1), 2);

        stack.add_light(kept, 2, None).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.light_count(2), 1);
        assert_eq!(stack.light_count(1), 0);
    }
}
