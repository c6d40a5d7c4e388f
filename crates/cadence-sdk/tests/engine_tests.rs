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

use cadence_core::context::{GraphicsContext, SoundContext, SourceId, SourceParams};
use cadence_core::math::Vec3;
use cadence_core::object::{
    Actuator, ActuatorReply, BaseId, Camera, RenderFlags, RenderReply, Renderable,
};
use cadence_sdk::{Engine, EngineConfig};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type Journal = Arc<Mutex<Vec<&'static str>>>;

struct NullGraphics;

impl GraphicsContext for NullGraphics {
    fn bind_camera(&self, _pass: usize, _camera: &dyn Camera) {}
}

struct NullSound;

impl SoundContext for NullSound {
    fn source_limit(&self) -> usize {
        0
    }

    fn request_source(&self) -> Option<SourceId> {
        None
    }

    fn return_source(&self, _source: SourceId) {}

    fn bind_source(&self, _source: SourceId, _params: &SourceParams) {}

    fn set_listener(&self, _position: Vec3) {}
}

struct Mesh {
    journal: Journal,
    replies: Mutex<Vec<RenderReply>>,
}

impl Renderable for Mesh {
    fn base_id(&self) -> BaseId {
        BaseId::new(1)
    }

    fn rendering_flags(&self) -> RenderFlags {
        RenderFlags::PASS1
    }

    fn render(&self, reply: RenderReply) {
        if reply.contains(RenderReply::PASS) {
            self.journal.lock().unwrap().push("gfx");
        }
        self.replies.lock().unwrap().push(reply);
    }
}

struct Spring {
    journal: Journal,
}

impl Actuator for Spring {
    fn base_id(&self) -> BaseId {
        BaseId::new(2)
    }

    fn update(&self, _delta_t: f32, reply: ActuatorReply) {
        if reply.contains(ActuatorReply::PASS) {
            self.journal.lock().unwrap().push("act");
        }
    }
}

fn engine(config: &EngineConfig) -> Engine {
    cadence_telemetry::logging::init_for_tests();
    Engine::new(config, Arc::new(NullGraphics), Arc::new(NullSound)).unwrap()
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn test_engine_registers_schedulers_in_order() {
    let engine = engine(&EngineConfig::default());
    let tasks = engine.task_manager();

    assert_eq!(tasks.task_count(), 3);
    assert_eq!(tasks.dependency_count(), 2);
    let order = tasks.execution_order().unwrap();
    assert_eq!(order[0], engine.actuator_task());
    assert_eq!(tasks.task_name(engine.renderer_task()).as_deref(), Some("gfx-renderer"));
    assert_eq!(tasks.task_name(engine.mixer_task()).as_deref(), Some("snd-mixer"));
    assert!(engine.shut_down().graceful);
}

#[test]
fn test_actuator_runs_before_renderer_every_round() {
    let engine = engine(&EngineConfig::default());
    let journal = Journal::default();
    engine.actuator().actuate_object(Arc::new(Spring {
        journal: journal.clone(),
    }));
    engine.renderer().render_object(Arc::new(Mesh {
        journal: journal.clone(),
        replies: Mutex::new(Vec::new()),
    }));

    assert!(wait_until(|| journal.lock().unwrap().len() >= 40));
    engine.shut_down();

    let journal = journal.lock().unwrap();
    // Skip the rounds before both objects were enqueued.
    let start = journal
        .windows(2)
        .position(|pair| pair == ["act", "gfx"])
        .unwrap();
    for pair in journal[start..].chunks_exact(2) {
        assert_eq!(pair, ["act", "gfx"]);
    }
}

#[test]
fn test_shut_down_stops_enqueued_objects() {
    let engine = engine(&EngineConfig::default());
    let journal = Journal::default();
    let mesh = Arc::new(Mesh {
        journal: journal.clone(),
        replies: Mutex::new(Vec::new()),
    });
    engine.renderer().render_object(mesh.clone());
    assert!(wait_until(|| !journal.lock().unwrap().is_empty()));

    let report = engine.shut_down();
    assert!(report.graceful);
    assert_eq!(report.tasks_shut_down, 3);
    let replies = mesh.replies.lock().unwrap();
    assert!(replies.last().unwrap().contains(RenderReply::STOP));
    assert_eq!(engine.shut_down(), report);
}

#[test]
fn test_engine_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "(tasks: (worker_threads: 2), actuator: (master_throttle: 0.25), mixer: (source_budget: 6))"
    )
    .unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    let engine = engine(&config);
    assert_eq!(engine.task_manager().config().worker_threads, 2);
    assert_eq!(engine.actuator().master_throttle(), 0.25);
    assert_eq!(engine.mixer().config().source_budget, 6);
    assert!(engine.shut_down().graceful);
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.ron");
    let mut config = EngineConfig::default();
    config.renderer.time_slice_ms = Some(8);
    config.save(&path).unwrap();

    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}

#[test]
fn test_missing_config_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.ron");
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.ron"));
}
