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

use cadence_agents::audio_agent::{MixerConfig, SndMixer, SoundQueue};
use cadence_core::context::{SoundContext, SourceId, SourceParams};
use cadence_core::math::Vec3;
use cadence_core::object::{Camera, PlayFlags, PlayReply, Playable};
use cadence_core::task::Task;
use cadence_core::{BaseId, FrameNumber, FRAME_ALWAYS_FAIL, FRAME_ALWAYS_PASS};
use cadence_telemetry::{MetricId, MetricsRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

/// A backend with a fixed pool of sources.
struct SourcePool {
    limit: usize,
    free: Mutex<Vec<SourceId>>,
    bound: Mutex<HashMap<SourceId, SourceParams>>,
    listener: Mutex<Option<Vec3>>,
}

impl SourcePool {
    fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit,
            free: Mutex::new((0..limit as u32).rev().map(SourceId).collect()),
            bound: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
        })
    }

    fn in_use(&self) -> usize {
        self.limit - self.free.lock().unwrap().len()
    }

    fn params(&self, source: SourceId) -> Option<SourceParams> {
        self.bound.lock().unwrap().get(&source).copied()
    }
}

impl SoundContext for SourcePool {
    fn source_limit(&self) -> usize {
        self.limit
    }

    fn request_source(&self) -> Option<SourceId> {
        self.free.lock().unwrap().pop()
    }

    fn return_source(&self, source: SourceId) {
        self.free.lock().unwrap().push(source);
    }

    fn bind_source(&self, source: SourceId, params: &SourceParams) {
        self.bound.lock().unwrap().insert(source, *params);
    }

    fn unbind_source(&self, source: SourceId) {
        self.bound.lock().unwrap().remove(&source);
    }

    fn set_listener(&self, position: Vec3) {
        *self.listener.lock().unwrap() = Some(position);
    }
}

struct Ear(Vec3);

impl Camera for Ear {
    fn viewing_source(&self) -> Vec3 {
        self.0
    }
}

struct Voice {
    base: BaseId,
    flags: PlayFlags,
    frame: AtomicU16,
    position: Vec3,
    replies: Mutex<Vec<(PlayReply, Option<SourceId>)>>,
}

impl Voice {
    fn new(base: u64, flags: PlayFlags) -> Arc<Self> {
        Self::at(base, flags, Vec3::ZERO)
    }

    fn at(base: u64, flags: PlayFlags, position: Vec3) -> Arc<Self> {
        Arc::new(Self {
            base: BaseId::new(base),
            flags,
            frame: AtomicU16::new(FRAME_ALWAYS_PASS),
            position,
            replies: Mutex::new(Vec::new()),
        })
    }

    fn last(&self) -> Option<(PlayReply, Option<SourceId>)> {
        self.replies.lock().unwrap().last().copied()
    }

    fn plays(&self) -> usize {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .filter(|(reply, _)| reply.contains(PlayReply::PASS))
            .count()
    }
}

impl Playable for Voice {
    fn base_id(&self) -> BaseId {
        self.base
    }

    fn playback_flags(&self) -> PlayFlags {
        self.flags
    }

    fn playback_frame(&self) -> FrameNumber {
        self.frame.load(Ordering::SeqCst)
    }

    fn playback_source(&self) -> Vec3 {
        self.position
    }

    fn gain(&self) -> f32 {
        0.8
    }

    fn play(&self, reply: PlayReply, source: Option<SourceId>) {
        self.replies.lock().unwrap().push((reply, source));
    }
}

fn mixer(budget: usize, pool: &Arc<SourcePool>) -> SndMixer {
    cadence_telemetry::logging::init_for_tests();
    let config = MixerConfig {
        source_budget: budget,
        ..Default::default()
    };
    SndMixer::new(config, pool.clone())
}

#[test]
fn test_budget_of_two_serves_music_and_one_high_voice() {
    let pool = SourcePool::new(8);
    let mixer = mixer(2, &pool);
    let music = Voice::new(1, PlayFlags::MUSIC | PlayFlags::LOOPING);
    let highs: Vec<_> = (0..3).map(|i| Voice::new(10 + i, PlayFlags::HIGH_PRIORITY)).collect();

    mixer.play_object(music.clone());
    for high in &highs {
        mixer.play_object(high.clone());
    }
    mixer.perform();

    let stats = mixer.last_cycle_stats();
    assert_eq!(stats.played, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(pool.in_use(), 2);
    assert_eq!(music.plays(), 1);
    assert_eq!(highs[0].plays(), 1);
    assert_eq!(highs[1].plays(), 0);
    assert_eq!(highs[2].plays(), 0);
    assert_eq!(mixer.queue_depth(SoundQueue::Music), 1);
    assert_eq!(mixer.queue_depth(SoundQueue::High), 3);

    let (reply, source) = music.last().unwrap();
    assert!(reply.contains(PlayReply::START | PlayReply::PASS));
    assert!(reply.queue_mask().contains(PlayFlags::MUSIC));
    let params = pool.params(source.unwrap()).unwrap();
    assert!(params.looping);
}

#[test]
fn test_context_limit_caps_the_budget() {
    let pool = SourcePool::new(1);
    let mixer = mixer(16, &pool);
    let a = Voice::new(1, PlayFlags::MEDIUM_PRIORITY);
    let b = Voice::new(2, PlayFlags::MEDIUM_PRIORITY);
    mixer.play_object(a.clone());
    mixer.play_object(b.clone());
    mixer.perform();

    let stats = mixer.last_cycle_stats();
    assert_eq!(stats.played, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn test_losing_allotment_pauses_and_returns_source() {
    let pool = SourcePool::new(8);
    let mixer = mixer(2, &pool);
    let first = Voice::new(1, PlayFlags::HIGH_PRIORITY);
    let second = Voice::new(2, PlayFlags::HIGH_PRIORITY);
    mixer.play_object(first.clone());
    mixer.play_object(second.clone());
    mixer.perform();
    // The unused music reservation floats to the second voice.
    assert_eq!(mixer.last_cycle_stats().played, 2);

    let music = Voice::new(3, PlayFlags::MUSIC);
    mixer.play_object(music.clone());
    mixer.perform();

    assert_eq!(music.plays(), 1);
    assert_eq!(first.plays(), 2);
    assert_eq!(second.plays(), 1);
    let (reply, source) = second.last().unwrap();
    assert!(reply.contains(PlayReply::PAUSE));
    assert_eq!(source, None);
    assert_eq!(pool.in_use(), 2);
}

#[test]
fn test_strict_voice_never_borrows_floating_slots() {
    let pool = SourcePool::new(8);
    let mixer = mixer(2, &pool);
    let first = Voice::new(1, PlayFlags::HIGH_PRIORITY);
    let strict = Voice::new(2, PlayFlags::HIGH_PRIORITY | PlayFlags::STRICT);
    mixer.play_object(first.clone());
    mixer.play_object(strict.clone());
    mixer.perform();

    assert_eq!(first.plays(), 1);
    assert_eq!(strict.plays(), 0);
    assert_eq!(mixer.last_cycle_stats().skipped, 1);
}

#[test]
fn test_priority_voice_goes_first() {
    let pool = SourcePool::new(8);
    let mixer = mixer(2, &pool);
    let plain = Voice::new(1, PlayFlags::LOW_PRIORITY | PlayFlags::STRICT);
    let urgent = Voice::new(2, PlayFlags::LOW_PRIORITY | PlayFlags::STRICT | PlayFlags::PRIORITY);
    mixer.play_object(plain.clone());
    mixer.play_object(urgent.clone());
    mixer.perform();

    // Budget 2 leaves one reserved slot for high and none for low.
    assert_eq!(plain.plays(), 0);
    assert_eq!(urgent.plays(), 0);

    let mixer = self::mixer(10, &pool);
    let plain = Voice::new(3, PlayFlags::LOW_PRIORITY | PlayFlags::STRICT);
    let urgent = Voice::new(4, PlayFlags::LOW_PRIORITY | PlayFlags::STRICT | PlayFlags::PRIORITY);
    mixer.play_object(plain.clone());
    mixer.play_object(urgent.clone());
    mixer.perform();

    // Budget 10 reserves a single low slot.
    assert_eq!(urgent.plays(), 1);
    assert_eq!(plain.plays(), 0);
}

#[test]
fn test_mute_releases_sources_and_keeps_queues() {
    let pool = SourcePool::new(8);
    let mixer = mixer(4, &pool);
    let voice = Voice::new(1, PlayFlags::MEDIUM_PRIORITY);
    mixer.set_mute(true);
    mixer.play_object(voice.clone());
    mixer.perform();

    assert!(mixer.is_muted());
    assert_eq!(mixer.last_cycle_stats().muted, 1);
    assert_eq!(voice.plays(), 0);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(mixer.queue_depth(SoundQueue::Medium), 1);

    mixer.set_mute(false);
    mixer.perform();
    let (reply, source) = voice.last().unwrap();
    // The start reply was not spent while muted.
    assert!(reply.contains(PlayReply::START));
    assert!(source.is_some());
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn test_sources_are_positioned_relative_to_listener() {
    let pool = SourcePool::new(8);
    let mixer = mixer(4, &pool);
    mixer.set_listener_camera(Some(Arc::new(Ear(Vec3::new(1.0, 0.0, 0.0)))));
    mixer.set_gain_modifier(SoundQueue::Medium, 50);
    let voice = Voice::at(1, PlayFlags::MEDIUM_PRIORITY, Vec3::new(4.0, 2.0, 0.0));
    mixer.play_object(voice.clone());
    mixer.perform();

    assert_eq!(*pool.listener.lock().unwrap(), Some(Vec3::new(1.0, 0.0, 0.0)));
    let (reply, source) = voice.last().unwrap();
    let params = pool.params(source.unwrap()).unwrap();
    assert_eq!(params.position, Vec3::new(3.0, 2.0, 0.0));
    assert!((params.gain - 0.4).abs() < 1e-6);
    assert!((params.pitch - 1.0).abs() < 1e-6);
    assert!((reply.gain_modifier() - 0.5).abs() < 1e-6);
    assert!(mixer.listener_camera().is_some());
}

#[test]
fn test_removed_and_expired_voices_return_sources() {
    let pool = SourcePool::new(8);
    let mixer = mixer(4, &pool);
    let kept = Voice::new(1, PlayFlags::HIGH_PRIORITY);
    let removed = Voice::new(2, PlayFlags::HIGH_PRIORITY);
    let dying = Voice::new(3, PlayFlags::HIGH_PRIORITY);
    let handle: Arc<dyn Playable> = removed.clone();
    mixer.play_object(kept.clone());
    mixer.play_object(handle.clone());
    mixer.play_object(dying.clone());
    mixer.perform();
    assert_eq!(pool.in_use(), 3);

    mixer.remove_object(&handle);
    dying.frame.store(FRAME_ALWAYS_FAIL, Ordering::SeqCst);
    mixer.perform();

    assert_eq!(mixer.last_cycle_stats().expired, 1);
    assert_eq!(mixer.queue_depth(SoundQueue::High), 1);
    assert_eq!(pool.in_use(), 1);
    assert!(removed.last().unwrap().0.contains(PlayReply::STOP));
    assert!(dying.last().unwrap().0.contains(PlayReply::STOP));
}

#[test]
fn test_shut_down_stops_every_voice() {
    let pool = SourcePool::new(8);
    let mixer = mixer(4, &pool);
    let voice = Voice::new(1, PlayFlags::MUSIC);
    mixer.play_object(voice.clone());
    mixer.perform();
    mixer.shut_down();

    assert_eq!(pool.in_use(), 0);
    assert!(voice.last().unwrap().0.contains(PlayReply::STOP));
    assert!(!mixer.play_object(voice.clone()));
}

#[test]
fn test_telemetry_counts_played_and_skipped_voices() {
    let pool = SourcePool::new(8);
    let registry = MetricsRegistry::new();
    let config = MixerConfig {
        source_budget: 1,
        ..Default::default()
    };
    let mixer = SndMixer::new(config, pool.clone()).with_telemetry(&registry);
    mixer.play_object(Voice::new(1, PlayFlags::MUSIC));
    mixer.play_object(Voice::new(2, PlayFlags::MUSIC | PlayFlags::STRICT));
    mixer.perform();
    mixer.perform();

    assert_eq!(registry.namespace_metrics("mixer").len(), 4);
    let played = registry.get_metric(&MetricId::new("mixer", "played")).unwrap();
    assert_eq!(played.value.as_counter(), Some(2));
    let skipped = registry.get_metric(&MetricId::new("mixer", "skipped")).unwrap();
    assert_eq!(skipped.value.as_counter(), Some(2));
    let queued = registry.get_metric(&MetricId::new("mixer", "queued")).unwrap();
    assert_eq!(queued.value.as_gauge(), Some(2.0));
}
