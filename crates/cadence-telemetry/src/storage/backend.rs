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

//! The storage interface behind [`MetricsRegistry`](crate::MetricsRegistry).

use crate::metrics::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::fmt::Debug;

/// A thread-safe metric store.
pub trait MetricsBackend: Send + Sync + Debug + 'static {
    /// Inserts or replaces a metric.
    fn put_metric(&self, metric: Metric) -> MetricsResult<()>;

    /// Fetches a copy of a metric.
    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric>;

    /// Applies `update` to a stored metric in place.
    fn update_metric(
        &self,
        id: &MetricId,
        update: &mut dyn FnMut(&mut Metric) -> MetricsResult<()>,
    ) -> MetricsResult<()>;

    /// `true` if a metric with this id exists.
    fn contains_metric(&self, id: &MetricId) -> bool;

    /// Copies of every stored metric.
    fn list_all_metrics(&self) -> Vec<Metric>;

    /// Number of stored metrics.
    fn metric_count(&self) -> usize;

    /// Adds `delta` to a counter and returns the new value.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut result = 0;
        self.update_metric(id, &mut |metric| match metric.value {
            MetricValue::Counter(ref mut value) => {
                *value = value.saturating_add(delta);
                result = *value;
                metric.touch();
                Ok(())
            }
            other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: other.metric_type(),
            }),
        })?;
        Ok(result)
    }

    /// Overwrites a gauge.
    fn set_gauge(&self, id: &MetricId, value: f64) -> MetricsResult<()> {
        self.update_metric(id, &mut |metric| match metric.value {
            MetricValue::Gauge(ref mut current) => {
                *current = value;
                metric.touch();
                Ok(())
            }
            other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Gauge,
                found: other.metric_type(),
            }),
        })
    }
}
