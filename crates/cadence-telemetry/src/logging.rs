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

//! Logger setup.
//!
//! Library code only talks to the `log` facade. Hosts call [`init`] once; tests
//! call [`init_for_tests`] as often as they like.

use log::LevelFilter;

/// Installs an `env_logger` filtered by `RUST_LOG`, defaulting to `default_level`.
///
/// Returns `false` if a logger was already installed.
pub fn init(default_level: LevelFilter) -> bool {
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

/// Installs a test logger that writes through the test harness capture.
pub fn init_for_tests() {
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
