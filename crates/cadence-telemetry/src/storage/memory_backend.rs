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

use crate::metrics::{Metric, MetricId, MetricsError, MetricsResult};
use crate::storage::backend::MetricsBackend;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory metrics backend over an `RwLock<HashMap>`.
///
/// Reads take the shared lock; updates take the exclusive lock for the
/// duration of a single metric mutation.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: RwLock<HashMap<MetricId, Metric>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics of one namespace.
    pub fn metrics_in_namespace(&self, namespace: &str) -> Vec<Metric> {
        self.storage
            .read()
            .map(|storage| {
                storage
                    .values()
                    .filter(|metric| metric.id.namespace == namespace)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn poisoned() -> MetricsError {
    MetricsError::StorageError("metrics lock poisoned".to_string())
}

impl MetricsBackend for InMemoryBackend {
    fn put_metric(&self, metric: Metric) -> MetricsResult<()> {
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        storage.insert(metric.id.clone(), metric);
        Ok(())
    }

    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        storage
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    fn update_metric(
        &self,
        id: &MetricId,
        update: &mut dyn FnMut(&mut Metric) -> MetricsResult<()>,
    ) -> MetricsResult<()> {
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        update(metric)
    }

    fn contains_metric(&self, id: &MetricId) -> bool {
        self.storage
            .read()
            .map(|storage| storage.contains_key(id))
            .unwrap_or(false)
    }

    fn list_all_metrics(&self) -> Vec<Metric> {
        self.storage
            .read()
            .map(|storage| storage.values().cloned().collect())
            .unwrap_or_default()
    }

    fn metric_count(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }
}
