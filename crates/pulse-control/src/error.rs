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

//! Error types for the control crate.

use crate::state::ControllerState;
use thiserror::Error;

/// A specialized `Result` type for controller operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// An error raised by the controller or its configuration layer.
///
/// Process control signals are not errors; they are interpreted by the
/// controller. These variants only cover misuse and I/O.
#[derive(Debug, Error)]
pub enum ControlError {
    /// `run()` was called on a controller that has already run.
    #[error("controller has already run (state: {0:?})")]
    AlreadyRun(ControllerState),
    /// Reading or writing a configuration file failed.
    #[error("configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A configuration document could not be parsed or written.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
