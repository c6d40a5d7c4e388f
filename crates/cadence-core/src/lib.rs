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

//! # Cadence Core
//!
//! Foundational crate containing the capability traits, frame counters, flag sets
//! and error types shared by every scheduler of the engine.

#![warn(missing_docs)]

pub mod binding;
pub mod context;
pub mod error;
pub mod frame;
pub mod graph;
pub mod math;
pub mod object;
pub mod sync;
pub mod task;
pub mod utils;

pub use error::{BindingError, QueueError, TaskError};
pub use frame::{FrameCounter, FrameNumber, FRAME_ALWAYS_FAIL, FRAME_ALWAYS_PASS};
pub use object::BaseId;
