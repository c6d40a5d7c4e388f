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

use super::TaskHandle;
use cadence_core::task::Task;
use cadence_core::TaskError;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of registered tasks.
pub const MAX_TASKS: usize = 16;
/// Maximum number of dependency edges across all tasks.
pub const MAX_DEPENDENCIES: usize = 16;
/// Maximum number of dependencies, and of dependents, per task.
pub const MAX_TASK_LINKS: usize = 4;

/// How a task enters the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    Cyclic,
    Starter,
    Temporary,
}

/// A dependency edge, stored on the dependent side.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Prerequisite {
    pub(crate) index: usize,
    /// The prerequisite finished a cycle this task has not consumed yet.
    pub(crate) done: bool,
    /// Cleared when the edge was added while the prerequisite was performing.
    /// That perform does not count for this task.
    pub(crate) armed: bool,
}

pub(crate) struct TaskItem {
    pub(crate) task: Arc<dyn Task>,
    pub(crate) name: String,
    pub(crate) priority: f32,
    pub(crate) enabled: bool,
    pub(crate) temporary: bool,
    pub(crate) starter: bool,
    pub(crate) depends_on: SmallVec<[Prerequisite; MAX_TASK_LINKS]>,
    pub(crate) dependents: SmallVec<[usize; MAX_TASK_LINKS]>,
    pub(crate) running: bool,
    /// Round in which the task last started.
    pub(crate) turn: u64,
    pub(crate) unregister_pending: bool,
}

impl TaskItem {
    fn is_linked(&self) -> bool {
        !self.depends_on.is_empty() || !self.dependents.is_empty()
    }
}

/// The task and dependency tables. Always accessed under the manager's mutex.
///
/// There is no global barrier. A task may start when every prerequisite has
/// finished a cycle it has not consumed yet, and every dependent has consumed
/// its previous cycle. Linked tasks therefore advance in lock-step while
/// unrelated tasks run at their own pace. A starter skips the wait on its
/// prerequisites; they still wait for it, so they follow its pace.
/// Rounds only ration turns: a task that already started in the current round
/// yields to ready tasks that have not.
pub(crate) struct TaskTable {
    slots: Vec<Option<TaskItem>>,
    generations: Vec<u32>,
    dependency_count: usize,
    round: u64,
    performs: u64,
}

impl TaskTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: (0..MAX_TASKS).map(|_| None).collect(),
            generations: vec![0; MAX_TASKS],
            dependency_count: 0,
            round: 0,
            performs: 0,
        }
    }

    fn resolve(&self, handle: TaskHandle) -> Result<usize, TaskError> {
        let index = handle.index();
        match self.slots.get(index) {
            Some(Some(item))
                if self.generations[index] == handle.generation() && !item.unregister_pending =>
            {
                Ok(index)
            }
            _ => Err(TaskError::InvalidHandle(handle.to_string())),
        }
    }

    fn item(&self, index: usize) -> Option<&TaskItem> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn item_mut(&mut self, index: usize) -> Option<&mut TaskItem> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn handle_of(&self, index: usize) -> TaskHandle {
        TaskHandle::new(index, self.generations[index])
    }

    fn live(&self) -> impl Iterator<Item = (usize, &TaskItem)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|item| (index, item)))
            .filter(|(_, item)| !item.unregister_pending)
    }

    pub(crate) fn insert(
        &mut self,
        task: Arc<dyn Task>,
        registration: Registration,
    ) -> Result<TaskHandle, TaskError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(TaskError::TaskCapacityExceeded {
                capacity: MAX_TASKS,
            })?;
        let item = TaskItem {
            name: task.task_name().to_string(),
            priority: task.task_priority(),
            task,
            enabled: true,
            temporary: registration == Registration::Temporary,
            starter: registration == Registration::Starter,
            depends_on: SmallVec::new(),
            dependents: SmallVec::new(),
            running: false,
            turn: 0,
            unregister_pending: false,
        };
        self.slots[index] = Some(item);
        Ok(self.handle_of(index))
    }

    /// Makes `task` wait for `depends_on`. Returns `Ok(false)` if the edge already existed.
    pub(crate) fn add_dependency(
        &mut self,
        task: TaskHandle,
        depends_on: TaskHandle,
    ) -> Result<bool, TaskError> {
        let dependent = self.resolve(task)?;
        let prerequisite = self.resolve(depends_on)?;
        let (dependent_item, prerequisite_item) =
            match (self.item(dependent), self.item(prerequisite)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(TaskError::InvalidHandle(task.to_string())),
            };

        if dependent == prerequisite {
            return Err(TaskError::SelfDependency(dependent_item.name.clone()));
        }
        if dependent_item
            .depends_on
            .iter()
            .any(|link| link.index == prerequisite)
        {
            return Ok(false);
        }
        if self.dependency_count >= MAX_DEPENDENCIES {
            return Err(TaskError::DependencyCapacityExceeded {
                capacity: MAX_DEPENDENCIES,
            });
        }
        if dependent_item.depends_on.len() >= MAX_TASK_LINKS {
            return Err(TaskError::DependencySlotsExceeded {
                task: dependent_item.name.clone(),
                capacity: MAX_TASK_LINKS,
            });
        }
        if prerequisite_item.dependents.len() >= MAX_TASK_LINKS {
            return Err(TaskError::DependentSlotsExceeded {
                task: prerequisite_item.name.clone(),
                capacity: MAX_TASK_LINKS,
            });
        }

        let link = Prerequisite {
            index: prerequisite,
            done: false,
            armed: !prerequisite_item.running,
        };
        if let Some(item) = self.item_mut(prerequisite) {
            item.dependents.push(dependent);
        }
        if let Some(item) = self.item_mut(dependent) {
            item.depends_on.push(link);
        }
        self.dependency_count += 1;
        Ok(true)
    }

    /// Gives the task starter status: its cycles no longer wait for its prerequisites.
    pub(crate) fn jump_start(&mut self, handle: TaskHandle) -> Result<(), TaskError> {
        let index = self.resolve(handle)?;
        if let Some(item) = self.item_mut(index) {
            item.starter = true;
        }
        Ok(())
    }

    /// Unregisters `handle`, or defers it until the task's current perform returns.
    pub(crate) fn unregister(&mut self, handle: TaskHandle) -> Result<(), TaskError> {
        let index = self.resolve(handle)?;
        self.unregister_index(index);
        Ok(())
    }

    fn unregister_index(&mut self, index: usize) {
        match self.item_mut(index) {
            Some(item) if item.running => item.unregister_pending = true,
            Some(_) => self.remove(index),
            None => {}
        }
    }

    pub(crate) fn unregister_all(&mut self) {
        for index in 0..self.slots.len() {
            self.unregister_index(index);
        }
    }

    pub(crate) fn unregister_all_using(&mut self, task: &Arc<dyn Task>) -> usize {
        let matching: Vec<usize> = self
            .live()
            .filter(|(_, item)| Arc::ptr_eq(&item.task, task))
            .map(|(index, _)| index)
            .collect();
        for &index in &matching {
            self.unregister_index(index);
        }
        matching.len()
    }

    fn remove(&mut self, index: usize) {
        let Some(item) = self.slots[index].take() else {
            return;
        };
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.dependency_count -= item.depends_on.len() + item.dependents.len();

        for &dependent in &item.dependents {
            if let Some(other) = self.item_mut(dependent) {
                other.depends_on.retain(|link| link.index != index);
            }
        }
        for link in &item.depends_on {
            if let Some(other) = self.item_mut(link.index) {
                other.dependents.retain(|&mut i| i != index);
            }
        }
        log::debug!("Task '{}' unregistered.", item.name);
    }

    pub(crate) fn set_enabled(&mut self, handle: TaskHandle, enabled: bool) -> Result<(), TaskError> {
        let index = self.resolve(handle)?;
        if let Some(item) = self.item_mut(index) {
            item.enabled = enabled;
        }
        Ok(())
    }

    pub(crate) fn set_all_enabled(&mut self, enabled: bool) {
        for item in self.slots.iter_mut().flatten() {
            item.enabled = enabled;
        }
    }

    pub(crate) fn is_enabled(&self, handle: TaskHandle) -> Result<bool, TaskError> {
        let index = self.resolve(handle)?;
        Ok(self.item(index).map(|item| item.enabled).unwrap_or(false))
    }

    /// `true` when the task's prerequisites have fresh results and its
    /// dependents have consumed the previous ones. Starters skip the first check.
    fn can_start(&self, index: usize) -> bool {
        let Some(item) = self.item(index) else {
            return false;
        };
        if item.running || item.unregister_pending {
            return false;
        }
        if !item.starter && !item.depends_on.iter().all(|link| link.done) {
            return false;
        }
        item.dependents.iter().all(|&dependent| {
            self.item(dependent).map_or(true, |other| {
                other
                    .depends_on
                    .iter()
                    .all(|link| link.index != index || !link.done)
            })
        })
    }

    /// Completes disabled tasks that could start, without running them.
    /// Each task passes at most once per call. Returns how many passed.
    pub(crate) fn settle_disabled(&mut self) -> usize {
        let mut passed = [false; MAX_TASKS];
        let mut settled = 0;
        loop {
            let next = self
                .live()
                .find(|&(index, item)| {
                    !passed[index] && !item.enabled && item.is_linked() && self.can_start(index)
                })
                .map(|(index, _)| index);
            match next {
                Some(index) => {
                    passed[index] = true;
                    self.begin(index);
                    self.complete(index, false);
                    settled += 1;
                }
                None => return settled,
            }
        }
    }

    /// The ready task to run next: highest priority among those that have not
    /// had a turn this round, lowest slot first on ties. Starts a new round when
    /// every ready task already had its turn.
    pub(crate) fn pick_ready(&mut self) -> Option<usize> {
        let (best, any_ready) = self.best_ready();
        if best.is_none() && any_ready {
            self.round += 1;
            return self.best_ready().0;
        }
        best
    }

    fn best_ready(&self) -> (Option<usize>, bool) {
        let mut best: Option<(usize, f32)> = None;
        let mut any_ready = false;
        for (index, item) in self.live() {
            if !item.enabled || !self.can_start(index) {
                continue;
            }
            any_ready = true;
            if item.turn >= self.round {
                continue;
            }
            match best {
                Some((_, priority)) if item.priority <= priority => {}
                _ => best = Some((index, item.priority)),
            }
        }
        (best.map(|(index, _)| index), any_ready)
    }

    fn begin(&mut self, index: usize) {
        let round = self.round;
        if let Some(item) = self.item_mut(index) {
            item.running = true;
            item.turn = round;
        }
    }

    pub(crate) fn start(&mut self, index: usize) -> Option<Arc<dyn Task>> {
        self.begin(index);
        self.item(index).map(|item| Arc::clone(&item.task))
    }

    /// Ends the task's cycle: consumes its prerequisites' results and hands its
    /// own to its dependents.
    pub(crate) fn complete(&mut self, index: usize, performed: bool) {
        let Some(item) = self.item_mut(index) else {
            return;
        };
        item.running = false;
        for link in item.depends_on.iter_mut() {
            link.done = false;
        }
        let dependents = item.dependents.clone();
        let remove = item.unregister_pending || (item.temporary && performed);
        if performed {
            self.performs += 1;
        }
        for dependent in dependents {
            if let Some(other) = self.item_mut(dependent) {
                for link in other.depends_on.iter_mut().filter(|link| link.index == index) {
                    if link.armed {
                        link.done = true;
                    } else {
                        link.armed = true;
                    }
                }
            }
        }
        if remove {
            self.remove(index);
        }
    }

    pub(crate) fn round(&self) -> u64 {
        self.round
    }

    pub(crate) fn performs(&self) -> u64 {
        self.performs
    }

    pub(crate) fn task_count(&self) -> usize {
        self.live().count()
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.dependency_count
    }

    pub(crate) fn handles(&self) -> Vec<TaskHandle> {
        self.live().map(|(index, _)| self.handle_of(index)).collect()
    }

    /// Dependency edges as `(prerequisite, dependent)` pairs.
    pub(crate) fn edges(&self) -> Vec<(TaskHandle, TaskHandle)> {
        self.live()
            .flat_map(|(index, item)| {
                item.dependents
                    .iter()
                    .map(move |&dependent| (index, dependent))
            })
            .map(|(from, to)| (self.handle_of(from), self.handle_of(to)))
            .collect()
    }

    pub(crate) fn name_of(&self, handle: TaskHandle) -> Option<&str> {
        let index = self.resolve(handle).ok()?;
        self.item(index).map(|item| item.name.as_str())
    }

    /// Empties the table, returning each registered task once.
    pub(crate) fn drain_tasks(&mut self) -> Vec<Arc<dyn Task>> {
        let mut tasks: Vec<Arc<dyn Task>> = Vec::new();
        for index in 0..self.slots.len() {
            if let Some(item) = self.slots[index].take() {
                self.generations[index] = self.generations[index].wrapping_add(1);
                if !tasks.iter().any(|task| Arc::ptr_eq(task, &item.task)) {
                    tasks.push(item.task);
                }
            }
        }
        self.dependency_count = 0;
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str, f32);

    impl Task for Noop {
        fn task_name(&self) -> &str {
            self.0
        }
        fn task_priority(&self) -> f32 {
            self.1
        }
        fn perform(&self) {}
        fn shut_down(&self) {}
        fn is_task_performing(&self) -> bool {
            false
        }
        fn is_task_shut_down(&self) -> bool {
            false
        }
    }

    fn noop(name: &'static str, priority: f32) -> Arc<dyn Task> {
        Arc::new(Noop(name, priority))
    }

    fn cyclic(table: &mut TaskTable, name: &'static str, priority: f32) -> TaskHandle {
        table
            .insert(noop(name, priority), Registration::Cyclic)
            .unwrap()
    }

    /// Runs `performs` tasks one after another, as a single worker would.
    fn run(table: &mut TaskTable, performs: usize) -> Vec<usize> {
        let mut order = Vec::new();
        for _ in 0..performs {
            table.settle_disabled();
            let Some(index) = table.pick_ready() else {
                break;
            };
            table.start(index);
            table.complete(index, true);
            order.push(index);
        }
        order
    }

    #[test]
    fn test_each_ready_task_gets_one_turn_per_round_by_priority() {
        let mut table = TaskTable::new();
        cyclic(&mut table, "low", 0.1);
        cyclic(&mut table, "high-a", 0.9);
        cyclic(&mut table, "high-b", 0.9);
        assert_eq!(run(&mut table, 6), vec![1, 2, 0, 1, 2, 0]);
        assert_eq!(table.round(), 2);
    }

    #[test]
    fn test_dependencies_order_every_cycle() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.1);
        let b = cyclic(&mut table, "b", 0.9);
        table.add_dependency(b, a).unwrap();
        assert_eq!(run(&mut table, 6), vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_a_prerequisite_waits_for_its_dependent_to_consume() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.5);
        let b = cyclic(&mut table, "b", 0.5);
        let c = cyclic(&mut table, "c", 0.5);
        table.add_dependency(b, a).unwrap();
        table.add_dependency(c, b).unwrap();

        assert_eq!(table.pick_ready(), Some(0));
        table.start(0);
        table.complete(0, true);
        assert_eq!(table.pick_ready(), Some(1));
        table.start(1);
        // b is still performing: a must not produce again, c has nothing yet.
        assert_eq!(table.pick_ready(), None);

        table.complete(1, true);
        let first = table.pick_ready().unwrap();
        table.start(first);
        let second = table.pick_ready().unwrap();
        table.start(second);
        let mut both = [first, second];
        both.sort();
        assert_eq!(both, [0, 2]);
    }

    #[test]
    fn test_a_slow_task_does_not_hold_back_unrelated_tasks() {
        let mut table = TaskTable::new();
        cyclic(&mut table, "slow", 0.9);
        cyclic(&mut table, "fast", 0.1);

        assert_eq!(table.pick_ready(), Some(0));
        table.start(0);
        for _ in 0..5 {
            assert_eq!(table.pick_ready(), Some(1));
            table.start(1);
            table.complete(1, true);
        }
        table.complete(0, true);
        assert_eq!(table.performs(), 6);
    }

    #[test]
    fn test_a_cycle_stalls_until_jump_started() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.5);
        let b = cyclic(&mut table, "b", 0.5);
        cyclic(&mut table, "c", 0.5);
        table.add_dependency(a, b).unwrap();
        table.add_dependency(b, a).unwrap();

        assert_eq!(run(&mut table, 4), vec![2, 2, 2, 2]);

        table.jump_start(a).unwrap();
        let order = run(&mut table, 9);
        let linked: Vec<usize> = order.into_iter().filter(|&index| index != 2).collect();
        assert_eq!(linked[..6], [0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_a_starter_does_not_wait_for_its_prerequisites() {
        let mut table = TaskTable::new();
        let source = cyclic(&mut table, "source", 0.5);
        let lead = table
            .insert(noop("lead", 0.5), Registration::Starter)
            .unwrap();
        table.add_dependency(lead, source).unwrap();

        table.start(0);
        assert_eq!(table.pick_ready(), Some(1));
        table.start(1);
        table.complete(1, true);
        table.complete(0, true);

        // The source produced again; it waits until the lead consumed that.
        assert_eq!(table.pick_ready(), Some(1));
        table.start(1);
        assert_eq!(table.pick_ready(), None);
        table.complete(1, true);
        assert_eq!(table.pick_ready(), Some(0));
    }

    #[test]
    fn test_an_edge_added_mid_perform_waits_for_the_next_cycle() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.5);
        let b = cyclic(&mut table, "b", 0.5);
        table.start(0);
        table.add_dependency(b, a).unwrap();
        table.complete(0, true);

        assert_eq!(run(&mut table, 4), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_disabled_task_passes_through_without_running() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.5);
        let b = cyclic(&mut table, "b", 0.5);
        let c = cyclic(&mut table, "c", 0.5);
        table.add_dependency(b, a).unwrap();
        table.add_dependency(c, b).unwrap();
        table.set_enabled(b, false).unwrap();

        assert_eq!(run(&mut table, 4), vec![0, 2, 0, 2]);
        assert_eq!(table.performs(), 4);
    }

    #[test]
    fn test_capacity_errors_leave_tables_untouched() {
        let mut table = TaskTable::new();
        let hub = cyclic(&mut table, "hub", 0.5);
        let mut others = Vec::new();
        for _ in 0..MAX_TASK_LINKS {
            let other = cyclic(&mut table, "leaf", 0.5);
            table.add_dependency(hub, other).unwrap();
            others.push(other);
        }
        let extra = cyclic(&mut table, "extra", 0.5);
        assert_eq!(
            table.add_dependency(hub, extra),
            Err(TaskError::DependencySlotsExceeded {
                task: "hub".into(),
                capacity: MAX_TASK_LINKS
            })
        );
        assert_eq!(table.dependency_count(), MAX_TASK_LINKS);
        assert_eq!(table.add_dependency(hub, others[0]), Ok(false));
        assert!(matches!(
            table.add_dependency(hub, hub),
            Err(TaskError::SelfDependency(_))
        ));
    }

    #[test]
    fn test_task_capacity_is_sixteen() {
        let mut table = TaskTable::new();
        for _ in 0..MAX_TASKS {
            cyclic(&mut table, "t", 0.5);
        }
        assert_eq!(
            table.insert(noop("t", 0.5), Registration::Cyclic).err(),
            Some(TaskError::TaskCapacityExceeded {
                capacity: MAX_TASKS
            })
        );
    }

    #[test]
    fn test_stale_handle_is_rejected_after_slot_reuse() {
        let mut table = TaskTable::new();
        let first = cyclic(&mut table, "first", 0.5);
        table.unregister(first).unwrap();
        let second = cyclic(&mut table, "second", 0.5);

        assert_eq!(first.index(), second.index());
        assert!(matches!(
            table.set_enabled(first, false),
            Err(TaskError::InvalidHandle(_))
        ));
        assert!(matches!(
            table.jump_start(first),
            Err(TaskError::InvalidHandle(_))
        ));
        assert_eq!(table.name_of(second), Some("second"));
    }

    #[test]
    fn test_unregister_while_running_is_deferred() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.5);
        let index = table.pick_ready().unwrap();
        table.start(index);

        table.unregister(a).unwrap();
        assert_eq!(table.task_count(), 0);
        table.complete(index, true);
        assert!(table.item(index).is_none());
    }

    #[test]
    fn test_temporary_task_runs_once() {
        let mut table = TaskTable::new();
        table
            .insert(noop("once", 0.5), Registration::Temporary)
            .unwrap();
        cyclic(&mut table, "always", 0.5);

        assert_eq!(run(&mut table, 4), vec![0, 1, 1, 1]);
        assert_eq!(table.task_count(), 1);
    }

    #[test]
    fn test_removing_a_prerequisite_releases_its_dependents() {
        let mut table = TaskTable::new();
        let a = cyclic(&mut table, "a", 0.5);
        let b = cyclic(&mut table, "b", 0.5);
        table.add_dependency(b, a).unwrap();
        table.unregister(a).unwrap();

        assert_eq!(table.dependency_count(), 0);
        assert_eq!(run(&mut table, 2), vec![1, 1]);
    }
}
