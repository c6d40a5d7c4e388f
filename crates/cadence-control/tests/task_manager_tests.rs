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

use cadence_control::{TaskManager, TaskManagerConfig};
use cadence_core::task::Task;
use cadence_core::TaskError;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

struct Recorder {
    name: &'static str,
    priority: f32,
    log: Arc<Mutex<Vec<&'static str>>>,
    armed: Arc<AtomicBool>,
    performing: AtomicBool,
    shut_down: AtomicBool,
}

impl Recorder {
    fn new(name: &'static str, priority: f32, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Self::gated(name, priority, log, &Arc::new(AtomicBool::new(true)))
    }

    /// Records nothing until `armed` is set.
    fn gated(
        name: &'static str,
        priority: f32,
        log: &Arc<Mutex<Vec<&'static str>>>,
        armed: &Arc<AtomicBool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            log: Arc::clone(log),
            armed: Arc::clone(armed),
            performing: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Task for Recorder {
    fn task_name(&self) -> &str {
        self.name
    }
    fn task_priority(&self) -> f32 {
        self.priority
    }
    fn perform(&self) {
        self.performing.store(true, Ordering::SeqCst);
        if self.armed.load(Ordering::SeqCst) {
            self.log.lock().unwrap().push(self.name);
        }
        self.performing.store(false, Ordering::SeqCst);
    }
    fn shut_down(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
    fn is_task_performing(&self) -> bool {
        self.performing.load(Ordering::SeqCst)
    }
    fn is_task_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// A link in a chain. At the start of every perform it notes how many cycles
/// its upstream stage is ahead of it.
struct Stage {
    name: &'static str,
    priority: f32,
    upstream: Option<Arc<Stage>>,
    armed: Arc<AtomicBool>,
    runs: AtomicI64,
    leads: Mutex<Vec<i64>>,
}

impl Stage {
    fn new(
        name: &'static str,
        priority: f32,
        upstream: Option<&Arc<Stage>>,
        armed: &Arc<AtomicBool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            upstream: upstream.cloned(),
            armed: Arc::clone(armed),
            runs: AtomicI64::new(0),
            leads: Mutex::new(Vec::new()),
        })
    }

    fn runs(&self) -> i64 {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Task for Stage {
    fn task_name(&self) -> &str {
        self.name
    }
    fn task_priority(&self) -> f32 {
        self.priority
    }
    fn perform(&self) {
        if let (true, Some(upstream)) = (self.armed.load(Ordering::SeqCst), &self.upstream) {
            self.leads
                .lock()
                .unwrap()
                .push(upstream.runs() - self.runs());
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
    fn shut_down(&self) {}
    fn is_task_performing(&self) -> bool {
        false
    }
    fn is_task_shut_down(&self) -> bool {
        false
    }
}

#[test]
fn test_dependency_chain_runs_in_order_every_cycle() {
    cadence_telemetry::logging::init_for_tests();
    let armed = Arc::new(AtomicBool::new(false));
    let manager = TaskManager::default();

    // Priorities favour the end of the chain; dependencies must still win.
    let s1 = Stage::new("t1", 0.1, None, &armed);
    let s2 = Stage::new("t2", 0.5, Some(&s1), &armed);
    let s3 = Stage::new("t3", 0.9, Some(&s2), &armed);
    let t1 = manager.register_task(s1.clone()).unwrap();
    let t2 = manager.register_task(s2.clone()).unwrap();
    let t3 = manager.register_task(s3.clone()).unwrap();
    manager.register_dependency(t2, t1).unwrap();
    manager.register_dependency(t3, t2).unwrap();

    // Let the cycles that were in flight while the edges were added finish.
    let settled = s1.runs() + 3;
    assert!(wait_until(|| s1.runs() >= settled));
    armed.store(true, Ordering::SeqCst);

    assert!(wait_until(|| s3.leads.lock().unwrap().len() >= 20));
    assert!(manager.shut_down_task_threads().graceful);

    // Each stage starts exactly one cycle behind its upstream, every time.
    for stage in [&s2, &s3] {
        let leads = stage.leads.lock().unwrap();
        assert!(leads.iter().all(|&lead| lead == leads[0]), "{}: {:?}", stage.name, leads);
    }
}

#[test]
fn test_execution_order_follows_dependencies() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::default();
    let a = manager.register_task(Recorder::new("a", 0.5, &log)).unwrap();
    let b = manager.register_task(Recorder::new("b", 0.5, &log)).unwrap();
    let c = manager.register_task(Recorder::new("c", 0.5, &log)).unwrap();
    manager.register_dependency(a, c).unwrap();
    manager.register_dependency(a, b).unwrap();
    manager.register_dependency(a, b).unwrap();

    assert_eq!(manager.dependency_count(), 2);
    assert_eq!(manager.execution_order().unwrap(), vec![b, c, a]);

    manager.register_dependency(c, a).unwrap();
    let cycle = manager.execution_order().unwrap_err();
    assert_eq!(cycle.unresolved.len(), 2);
}

#[test]
fn test_disabled_task_is_skipped_but_does_not_block() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::default();
    let a = manager.register_task(Recorder::new("a", 0.5, &log)).unwrap();
    let b = manager.register_task(Recorder::new("b", 0.5, &log)).unwrap();
    manager.disable_task(a).unwrap();
    manager.register_dependency(b, a).unwrap();
    log.lock().unwrap().clear();

    assert!(wait_until(|| log.lock().unwrap().len() >= 5));
    assert!(!manager.is_task_enabled(a).unwrap());
    manager.shut_down_task_threads();

    let log = log.lock().unwrap();
    assert!(log.iter().skip(1).all(|&name| name == "b"));
}

#[test]
fn test_temporary_task_performs_exactly_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::default();
    manager.register_task(Recorder::new("steady", 0.5, &log)).unwrap();
    manager
        .register_temporary_task(Recorder::new("once", 0.5, &log))
        .unwrap();

    assert!(wait_until(|| {
        log.lock().unwrap().iter().filter(|&&n| n == "steady").count() >= 5
    }));
    manager.shut_down_task_threads();

    let once = log.lock().unwrap().iter().filter(|&&n| n == "once").count();
    assert_eq!(once, 1);
}

#[test]
fn test_invalid_and_self_dependencies_are_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::default();
    let a = manager.register_task(Recorder::new("a", 0.5, &log)).unwrap();
    let b = manager.register_task(Recorder::new("b", 0.5, &log)).unwrap();

    assert_eq!(
        manager.register_dependency(a, a),
        Err(TaskError::SelfDependency("a".into()))
    );
    manager.unregister_task(b).unwrap();
    assert!(matches!(
        manager.register_dependency(a, b),
        Err(TaskError::InvalidHandle(_))
    ));
    assert_eq!(manager.dependency_count(), 0);
    assert_eq!(manager.task_count(), 1);
}

#[test]
fn test_unregister_all_using_removes_every_registration() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = TaskManager::default();
    let shared: Arc<dyn Task> = Recorder::new("shared", 0.5, &log);
    manager.register_task(Arc::clone(&shared)).unwrap();
    manager.register_task(Arc::clone(&shared)).unwrap();
    manager.register_task(Recorder::new("other", 0.5, &log)).unwrap();

    assert_eq!(manager.unregister_all_tasks_using(&shared), 2);
    assert_eq!(manager.task_count(), 1);
}

struct Stuck {
    entered: AtomicBool,
    calls: AtomicUsize,
}

impl Task for Stuck {
    fn task_name(&self) -> &str {
        "stuck"
    }
    fn perform(&self) {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(500));
        }
    }
    fn shut_down(&self) {}
    fn is_task_performing(&self) -> bool {
        false
    }
    fn is_task_shut_down(&self) -> bool {
        false
    }
}

#[test]
fn test_shutdown_times_out_on_a_stuck_task() {
    let manager = TaskManager::new(TaskManagerConfig {
        shutdown_timeout: Duration::from_millis(50),
        ..Default::default()
    });
    let stuck = Arc::new(Stuck {
        entered: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });
    manager.register_task(stuck.clone()).unwrap();
    assert!(wait_until(|| stuck.entered.load(Ordering::SeqCst)));

    let report = manager.shut_down_task_threads();
    assert!(!report.graceful);
    assert_eq!(report.workers_total, 3);
    assert_eq!(report.workers_stopped, 2);
    // The stuck task was still told; it just never returned in time.
    assert_eq!(report.tasks_shut_down, 1);
    assert_eq!(manager.task_count(), 0);
}

/// Performs until told to shut down.
struct Draining {
    entered: AtomicBool,
    stop: AtomicBool,
}

impl Task for Draining {
    fn task_name(&self) -> &str {
        "draining"
    }
    fn perform(&self) {
        self.entered.store(true, Ordering::SeqCst);
        while !self.stop.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    }
    fn shut_down(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
    fn is_task_performing(&self) -> bool {
        false
    }
    fn is_task_shut_down(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[test]
fn test_shutdown_tells_a_performing_task_to_drain() {
    let manager = TaskManager::new(TaskManagerConfig {
        shutdown_timeout: Duration::from_secs(2),
        ..Default::default()
    });
    let draining = Arc::new(Draining {
        entered: AtomicBool::new(false),
        stop: AtomicBool::new(false),
    });
    manager.register_task(draining.clone()).unwrap();
    assert!(wait_until(|| draining.entered.load(Ordering::SeqCst)));

    let report = manager.shut_down_task_threads();
    assert!(draining.is_task_shut_down());
    assert!(report.graceful);
    assert_eq!(report.workers_stopped, 3);
    assert_eq!(report.tasks_shut_down, 1);
}

/// Sleeps for `pause` on every perform.
struct Paced {
    name: &'static str,
    pause: Duration,
    runs: AtomicUsize,
}

impl Paced {
    fn new(name: &'static str, pause: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            pause,
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Task for Paced {
    fn task_name(&self) -> &str {
        self.name
    }
    fn perform(&self) {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
    fn shut_down(&self) {}
    fn is_task_performing(&self) -> bool {
        false
    }
    fn is_task_shut_down(&self) -> bool {
        false
    }
}

#[test]
fn test_slow_task_does_not_hold_back_an_unrelated_one() {
    let manager = TaskManager::default();
    let slow = Paced::new("slow", Duration::from_millis(200));
    let fast = Paced::new("fast", Duration::from_millis(1));
    manager.register_task(slow.clone()).unwrap();
    manager.register_task(fast.clone()).unwrap();

    assert!(wait_until(|| fast.runs() >= 50));
    let slow_runs = slow.runs();
    assert!(manager.shut_down_task_threads().graceful);
    assert!(slow_runs <= 5, "slow ran {slow_runs} times");
}

#[test]
fn test_starter_keeps_a_dependency_cycle_moving() {
    let manager = TaskManager::default();
    let lead = Paced::new("lead", Duration::ZERO);
    let follow = Paced::new("follow", Duration::ZERO);
    let lead_task = manager.register_starter_task(lead.clone()).unwrap();
    let follow_task = manager.register_task(follow.clone()).unwrap();
    manager.register_dependency(lead_task, follow_task).unwrap();
    manager.register_dependency(follow_task, lead_task).unwrap();
    assert!(manager.execution_order().is_err());

    let (lead_from, follow_from) = (lead.runs(), follow.runs());
    assert!(wait_until(|| {
        lead.runs() >= lead_from + 20 && follow.runs() >= follow_from + 20
    }));
    assert!(manager.shut_down_task_threads().graceful);
}

#[test]
fn test_jump_start_frees_a_cycle() {
    let manager = TaskManager::default();
    let a = Paced::new("a", Duration::ZERO);
    let b = Paced::new("b", Duration::ZERO);
    let free = Paced::new("free", Duration::ZERO);
    let a_task = manager.register_task(a.clone()).unwrap();
    let b_task = manager.register_task(b.clone()).unwrap();
    manager.register_task(free.clone()).unwrap();
    manager.register_dependency(a_task, b_task).unwrap();
    manager.register_dependency(b_task, a_task).unwrap();

    // Unrelated tasks keep running whatever the cycle does.
    let free_from = free.runs();
    assert!(wait_until(|| free.runs() >= free_from + 50));

    manager.jump_start_task(a_task).unwrap();
    let (a_from, b_from) = (a.runs(), b.runs());
    assert!(wait_until(|| a.runs() >= a_from + 20 && b.runs() >= b_from + 20));

    manager.unregister_task(b_task).unwrap();
    assert!(matches!(
        manager.jump_start_task(b_task),
        Err(TaskError::InvalidHandle(_))
    ));
    manager.shut_down_task_threads();
}
