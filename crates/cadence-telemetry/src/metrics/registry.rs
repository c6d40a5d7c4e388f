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

//! Registry for managing metrics.

use crate::metrics::{Metric, MetricId, MetricType, MetricsError, MetricsResult};
use crate::storage::{InMemoryBackend, MetricsBackend};
use std::sync::Arc;

/// Central registry for scheduler metrics.
///
/// Registering a metric returns a cheap, cloneable handle that the owning
/// scheduler keeps and updates once per cycle.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    backend: Arc<dyn MetricsBackend>,
}

impl MetricsRegistry {
    /// Creates a registry over an [`InMemoryBackend`].
    pub fn new() -> Self {
        Self {
            backend: Arc::new(InMemoryBackend::new()),
        }
    }

    /// Creates a registry over a custom backend.
    pub fn with_backend(backend: Arc<dyn MetricsBackend>) -> Self {
        Self { backend }
    }

    /// Registers (or resets) a counter.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> MetricsResult<CounterHandle> {
        let id = MetricId::new(namespace, name);
        self.backend.put_metric(Metric::counter(id.clone(), description))?;
        Ok(CounterHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    /// Registers (or resets) a gauge.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> MetricsResult<GaugeHandle> {
        self.register_gauge_with_labels(namespace, name, description, unit, Vec::new())
    }

    /// Registers (or resets) a labelled gauge.
    pub fn register_gauge_with_labels(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        labels: Vec<(String, String)>,
    ) -> MetricsResult<GaugeHandle> {
        let id = labels
            .into_iter()
            .fold(MetricId::new(namespace, name), |id, (k, v)| id.with_label(k, v));
        self.backend
            .put_metric(Metric::gauge(id.clone(), description, unit))?;
        Ok(GaugeHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    /// Fetches a copy of a metric.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.backend.get_metric(id)
    }

    /// `true` if the metric is registered.
    pub fn contains_metric(&self, id: &MetricId) -> bool {
        self.backend.contains_metric(id)
    }

    /// Metrics registered under `namespace`.
    pub fn namespace_metrics(&self, namespace: &str) -> Vec<Metric> {
        self.backend
            .list_all_metrics()
            .into_iter()
            .filter(|metric| metric.id.namespace == namespace)
            .collect()
    }

    /// Number of registered metrics.
    pub fn metric_count(&self) -> usize {
        self.backend.metric_count()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered counter.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl CounterHandle {
    /// Adds one.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.backend.increment_counter(&self.id, 1)
    }

    /// Adds `amount`.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        self.backend.increment_counter(&self.id, amount)
    }

    /// Current value.
    pub fn get(&self) -> MetricsResult<u64> {
        let metric = self.backend.get_metric(&self.id)?;
        metric.value.as_counter().ok_or(MetricsError::TypeMismatch {
            expected: MetricType::Counter,
            found: metric.value.metric_type(),
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle to a registered gauge.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl GaugeHandle {
    /// Overwrites the value.
    pub fn set(&self, value: f64) -> MetricsResult<()> {
        self.backend.set_gauge(&self.id, value)
    }

    /// Current value.
    pub fn get(&self) -> MetricsResult<f64> {
        let metric = self.backend.get_metric(&self.id)?;
        metric.value.as_gauge().ok_or(MetricsError::TypeMismatch {
            expected: MetricType::Gauge,
            found: metric.value.metric_type(),
        })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}
