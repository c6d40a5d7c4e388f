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

//! Metric identifiers, values and errors.

pub mod registry;

use std::fmt::{self, Display};
use std::time::Instant;
use thiserror::Error;

/// Identifies a metric by namespace, name and sorted labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricId {
    /// The subsystem publishing the metric (e.g. "renderer", "mixer").
    pub namespace: String,
    /// The metric name (e.g. "stage_binds").
    pub name: String,
    /// Sorted key-value labels.
    pub labels: Vec<(String, String)>,
}

impl MetricId {
    /// Creates an unlabelled id.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Adds a label; labels stay sorted by key.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self.labels.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)?;
        if !self.labels.is_empty() {
            let labels: Vec<String> = self.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "[{}]", labels.join(","))?;
        }
        Ok(())
    }
}

/// The kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Monotonic count.
    Counter,
    /// Value that goes up and down.
    Gauge,
}

/// A metric's current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Counter value.
    Counter(u64),
    /// Gauge value.
    Gauge(f64),
}

impl MetricValue {
    /// The kind of this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
        }
    }

    /// Counter value, if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            MetricValue::Gauge(_) => None,
        }
    }

    /// Gauge value, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            MetricValue::Counter(_) => None,
        }
    }
}

/// A stored metric.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Identifier.
    pub id: MetricId,
    /// Human-readable description.
    pub description: String,
    /// Unit of measurement.
    pub unit: String,
    /// Current value.
    pub value: MetricValue,
    /// Time of the last update.
    pub last_updated: Instant,
}

impl Metric {
    /// A counter starting at zero.
    pub fn counter(id: MetricId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            unit: "count".to_string(),
            value: MetricValue::Counter(0),
            last_updated: Instant::now(),
        }
    }

    /// A gauge starting at zero.
    pub fn gauge(id: MetricId, description: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Gauge(0.0),
            last_updated: Instant::now(),
        }
    }

    /// Refreshes `last_updated`.
    pub fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

/// Result alias for metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised by the metrics system.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// No metric with this id is registered.
    #[error("metric not found: {0}")]
    MetricNotFound(MetricId),
    /// The metric exists but has another type.
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Type required by the operation.
        expected: MetricType,
        /// Type of the stored metric.
        found: MetricType,
    },
    /// The backend failed.
    #[error("storage error: {0}")]
    StorageError(String),
}
