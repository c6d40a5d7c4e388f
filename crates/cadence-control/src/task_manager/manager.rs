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

use super::table::{Registration, TaskTable};
use super::{ShutdownReport, TaskHandle, TaskManagerConfig};
use cadence_core::graph::{topological_sort, CycleError};
use cadence_core::task::Task;
use cadence_core::utils::lock_or_recover;
use cadence_core::TaskError;
use crossbeam_channel::{Receiver, Sender};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_MANAGER: Cell<u64> = const { Cell::new(0) };
}

struct Shared {
    id: u64,
    table: Mutex<TaskTable>,
    wake: Condvar,
    shutting_down: AtomicBool,
    idle_wait: Duration,
}

/// Runs registered [`Task`]s on a worker pool in dependency order.
pub struct TaskManager {
    config: TaskManagerConfig,
    shared: Arc<Shared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    exit_rx: Receiver<usize>,
    report: Mutex<Option<ShutdownReport>>,
}

impl TaskManager {
    /// Creates the manager and starts its worker threads.
    pub fn new(config: TaskManagerConfig) -> Self {
        let shared = Arc::new(Shared {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            table: Mutex::new(TaskTable::new()),
            wake: Condvar::new(),
            shutting_down: AtomicBool::new(false),
            idle_wait: config.idle_wait,
        });
        let (exit_tx, exit_rx) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(config.worker_threads);
        for worker in 0..config.worker_threads {
            let shared = Arc::clone(&shared);
            let exit_tx = exit_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("cadence-task-{worker}"))
                .spawn(move || worker_loop(shared, worker, exit_tx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => log::error!("Failed to spawn task worker {}: {}", worker, err),
            }
        }
        log::info!("Task manager started with {} worker threads.", workers.len());

        Self {
            config,
            shared,
            workers: Mutex::new(workers),
            exit_rx,
            report: Mutex::new(None),
        }
    }

    /// The configuration the manager was built with.
    pub fn config(&self) -> &TaskManagerConfig {
        &self.config
    }

    fn table(&self) -> std::sync::MutexGuard<'_, TaskTable> {
        lock_or_recover(&self.shared.table)
    }

    fn ensure_running(&self) -> Result<(), TaskError> {
        if self.is_shutting_down() {
            Err(TaskError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    /// Registers `task` to perform cyclically.
    pub fn register_task(&self, task: Arc<dyn Task>) -> Result<TaskHandle, TaskError> {
        self.register(task, Registration::Cyclic)
    }

    /// Registers `task` with starter status.
    ///
    /// A starter opens each cycle without waiting for its prerequisites. They
    /// still wait for it to consume their results, so they follow its pace.
    /// One starter on a dependency cycle is enough to get the cycle moving.
    pub fn register_starter_task(&self, task: Arc<dyn Task>) -> Result<TaskHandle, TaskError> {
        self.register(task, Registration::Starter)
    }

    /// Registers `task` to perform once, then unregisters it.
    pub fn register_temporary_task(&self, task: Arc<dyn Task>) -> Result<TaskHandle, TaskError> {
        self.register(task, Registration::Temporary)
    }

    fn register(
        &self,
        task: Arc<dyn Task>,
        registration: Registration,
    ) -> Result<TaskHandle, TaskError> {
        self.ensure_running()?;
        let name = task.task_name().to_string();
        let handle = self.table().insert(task, registration)?;
        self.shared.wake.notify_all();
        log::info!("Task '{}' registered as {}.", name, handle);
        Ok(handle)
    }

    /// Makes every cycle of `task` wait for a fresh cycle of `depends_on`.
    ///
    /// `depends_on` in turn waits for `task` to consume its previous cycle, so
    /// linked tasks advance together while unrelated tasks keep their own pace.
    /// Registering an existing edge is a no-op. An edge that closes a cycle is
    /// accepted with a warning: the tasks on the cycle stall, and their
    /// prerequisites stall one cycle later, until one of them is given starter
    /// status with [`jump_start_task`](Self::jump_start_task).
    pub fn register_dependency(
        &self,
        task: TaskHandle,
        depends_on: TaskHandle,
    ) -> Result<(), TaskError> {
        self.ensure_running()?;
        let mut table = self.table();
        if table.add_dependency(task, depends_on)? {
            let order = topological_sort(table.handles(), table.edges());
            if let Err(cycle) = order {
                log::warn!("Dependency {} -> {} closes a cycle: {}", task, depends_on, cycle);
            }
        }
        Ok(())
    }

    /// Gives a registered task starter status.
    pub fn jump_start_task(&self, handle: TaskHandle) -> Result<(), TaskError> {
        self.table().jump_start(handle)?;
        self.shared.wake.notify_all();
        log::debug!("Task {} jump-started.", handle);
        Ok(())
    }

    /// Unregisters a task. A task in the middle of a perform is removed when it returns.
    pub fn unregister_task(&self, handle: TaskHandle) -> Result<(), TaskError> {
        self.table().unregister(handle)?;
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Unregisters every task.
    pub fn unregister_all_tasks(&self) {
        self.table().unregister_all();
        self.shared.wake.notify_all();
    }

    /// Unregisters every registration of `task`. Returns how many were found.
    pub fn unregister_all_tasks_using(&self, task: &Arc<dyn Task>) -> usize {
        let count = self.table().unregister_all_using(task);
        self.shared.wake.notify_all();
        count
    }

    pub fn enable_task(&self, handle: TaskHandle) -> Result<(), TaskError> {
        self.table().set_enabled(handle, true)?;
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn disable_task(&self, handle: TaskHandle) -> Result<(), TaskError> {
        self.table().set_enabled(handle, false)?;
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn enable_all_tasks(&self) {
        self.table().set_all_enabled(true);
        self.shared.wake.notify_all();
    }

    pub fn disable_all_tasks(&self) {
        self.table().set_all_enabled(false);
        self.shared.wake.notify_all();
    }

    pub fn is_task_enabled(&self, handle: TaskHandle) -> Result<bool, TaskError> {
        self.table().is_enabled(handle)
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.table().task_count()
    }

    /// Number of registered dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.table().dependency_count()
    }

    /// Number of rounds started so far. A round ends once every task that is
    /// ready to perform has had a turn.
    pub fn round_count(&self) -> u64 {
        self.table().round()
    }

    /// Number of completed performs across all tasks.
    pub fn perform_count(&self) -> u64 {
        self.table().performs()
    }

    /// The order tasks run in, prerequisites first, ties by slot.
    pub fn execution_order(&self) -> Result<Vec<TaskHandle>, CycleError<TaskHandle>> {
        let table = self.table();
        topological_sort(table.handles(), table.edges())
    }

    /// Name of the task behind `handle`.
    pub fn task_name(&self, handle: TaskHandle) -> Option<String> {
        self.table().name_of(handle).map(str::to_string)
    }

    /// `true` once shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::Acquire)
    }

    /// `true` when called from one of this manager's workers.
    pub fn is_task_manager_thread(&self) -> bool {
        CURRENT_MANAGER.with(|current| current.get() == self.shared.id)
    }

    /// Stops the worker pool.
    ///
    /// Phase one stops scheduling and tells every registered task to shut down.
    /// A task that is mid-perform is expected to return promptly once told.
    /// Phase two waits up to the configured timeout for the workers to leave
    /// their run loops and for every task to finish shutting down. Workers
    /// still busy at the deadline are abandoned. Calling this again returns
    /// the first report.
    pub fn shut_down_task_threads(&self) -> ShutdownReport {
        let mut report_slot = lock_or_recover(&self.report);
        if let Some(report) = *report_slot {
            return report;
        }

        log::info!("Task manager shutting down.");
        self.shared.shutting_down.store(true, Ordering::Release);
        let tasks = {
            // Taking the lock orders the flag before any worker's next wait.
            let mut table = self.table();
            self.shared.wake.notify_all();
            table.drain_tasks()
        };
        let deadline = Instant::now() + self.config.shutdown_timeout;

        let tasks_total = tasks.len();
        let told = Arc::new(AtomicUsize::new(0));
        let (told_tx, told_rx) = crossbeam_channel::bounded(1);
        let signaller = {
            let told = Arc::clone(&told);
            let tasks = tasks.clone();
            thread::Builder::new()
                .name("cadence-task-shutdown".to_string())
                .spawn(move || {
                    for task in &tasks {
                        task.shut_down();
                        told.fetch_add(1, Ordering::AcqRel);
                    }
                    let _ = told_tx.send(());
                })
        };
        let signaller = match signaller {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!(
                    "Failed to spawn the shutdown thread ({}); shutting tasks down inline.",
                    err
                );
                for task in &tasks {
                    task.shut_down();
                    told.fetch_add(1, Ordering::AcqRel);
                }
                None
            }
        };

        let mut workers = std::mem::take(&mut *lock_or_recover(&self.workers));
        let workers_total = workers.len();
        let mut workers_stopped = 0;
        while workers_stopped < workers_total {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.exit_rx.recv_timeout(left) {
                Ok(_) => workers_stopped += 1,
                Err(_) => break,
            }
        }
        let tasks_done = match signaller {
            Some(handle) => {
                let left = deadline.saturating_duration_since(Instant::now());
                let done = told_rx.recv_timeout(left).is_ok();
                if done && handle.join().is_err() {
                    log::error!("The shutdown thread panicked.");
                }
                done
            }
            None => true,
        };
        let tasks_shut_down = told.load(Ordering::Acquire);
        let graceful = workers_stopped == workers_total && tasks_done;

        if workers_stopped == workers_total {
            for worker in workers.drain(..) {
                if worker.join().is_err() {
                    log::error!("A task worker panicked.");
                }
            }
        }
        if graceful {
            log::info!("Task manager stopped ({} tasks shut down).", tasks_shut_down);
        } else {
            log::error!(
                "Task manager halted after {:?}: {} of {} workers stopped, {} of {} tasks shut down.",
                self.config.shutdown_timeout,
                workers_stopped,
                workers_total,
                tasks_shut_down,
                tasks_total
            );
        }

        let report = ShutdownReport {
            graceful,
            workers_stopped,
            workers_total,
            tasks_shut_down,
        };
        *report_slot = Some(report);
        report
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(TaskManagerConfig::default())
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shut_down_task_threads();
    }
}

fn worker_loop(shared: Arc<Shared>, worker: usize, exit_tx: Sender<usize>) {
    CURRENT_MANAGER.with(|current| current.set(shared.id));
    log::debug!("Task worker {} started.", worker);

    while let Some((index, task)) = next_task(&shared) {
        log::trace!("Worker {} performing '{}'.", worker, task.task_name());
        task.perform();
        lock_or_recover(&shared.table).complete(index, true);
        shared.wake.notify_all();
    }

    log::debug!("Task worker {} stopped.", worker);
    let _ = exit_tx.send(worker);
}

fn next_task(shared: &Shared) -> Option<(usize, Arc<dyn Task>)> {
    let mut table = lock_or_recover(&shared.table);
    loop {
        if shared.shutting_down.load(Ordering::Acquire) {
            return None;
        }
        table.settle_disabled();
        if let Some(index) = table.pick_ready() {
            if let Some(task) = table.start(index) {
                return Some((index, task));
            }
        }
        table = shared
            .wake
            .wait_timeout(table, shared.idle_wait)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| PoisonError::into_inner(poisoned).0);
    }
}
