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

//! Kahn's algorithm over a prerequisite graph.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;

/// The graph contains at least one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// Nodes that could not be ordered (every node on a cycle, plus everything behind one).
    pub unresolved: Vec<T>,
}

impl<T: fmt::Debug> fmt::Display for CycleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle among {:?}", self.unresolved)
    }
}

impl<T: fmt::Debug> std::error::Error for CycleError<T> {}

/// Orders `nodes` so that every prerequisite comes before its dependents.
///
/// `edges` are `(prerequisite, dependent)` pairs. Among nodes that are ready at
/// the same time, the one listed first in `nodes` comes first, so the result is
/// deterministic for a given input. Edges naming unknown nodes are ignored.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    let position: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); node_list.len()];
    let mut waiting = vec![0usize; node_list.len()];
    for (prerequisite, dependent) in edges {
        if let (Some(&from), Some(&to)) = (position.get(&prerequisite), position.get(&dependent)) {
            dependents[from].push(to);
            waiting[to] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..node_list.len()).filter(|&i| waiting[i] == 0).collect();
    let mut order = Vec::with_capacity(node_list.len());
    while let Some(next) = ready.pop_first() {
        order.push(node_list[next]);
        for &dependent in &dependents[next] {
            waiting[dependent] -= 1;
            if waiting[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == node_list.len() {
        Ok(order)
    } else {
        let unresolved = (0..node_list.len())
            .filter(|&i| waiting[i] > 0)
            .map(|i| node_list[i])
            .collect();
        Err(CycleError { unresolved })
    }
}
