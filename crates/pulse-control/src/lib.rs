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

//! # Pulse Control
//!
//! The cooperative frame scheduler. A [`ProcessController`] owns a
//! three-tier [`ProcessSchedule`] and a metrics recorder, and drives every
//! registered process through start, loop and stop phases.

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod instance;
pub mod schedule;
pub mod state;

pub use config::ControllerConfig;
pub use controller::ProcessController;
pub use error::{ControlError, ControlResult};
pub use instance::{Phase, ProcessInstance};
pub use schedule::{Cursor, ProcessSchedule};
pub use state::{ControlHandle, ControllerState};
