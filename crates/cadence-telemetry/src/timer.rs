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

//! RAII cycle timer.

use crate::metrics::registry::GaugeHandle;
use std::time::Instant;

/// Writes the elapsed milliseconds of a scope into a gauge when dropped.
///
/// A missing gauge makes the timer a no-op, so schedulers built without
/// telemetry can keep the same code path.
pub struct ScopedGaugeTimer<'a> {
    started: Instant,
    gauge: Option<&'a GaugeHandle>,
}

impl<'a> ScopedGaugeTimer<'a> {
    /// Starts timing.
    pub fn new(gauge: Option<&'a GaugeHandle>) -> Self {
        Self {
            started: Instant::now(),
            gauge,
        }
    }
}

impl Drop for ScopedGaugeTimer<'_> {
    fn drop(&mut self) {
        if let Some(gauge) = self.gauge {
            let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
            if let Err(e) = gauge.set(elapsed_ms) {
                log::warn!("[ScopedGaugeTimer] Failed to record {}: {}", gauge.id(), e);
            }
        }
    }
}
