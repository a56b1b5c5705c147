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

//! Controller configuration, loadable from JSON.

use crate::error::ControlResult;
use pulse_telemetry::DEFAULT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`ProcessController`](crate::ProcessController).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound on frames per second. `0` means uncapped.
    pub frame_cap: u32,
    /// Number of frames averaged by the metrics recorder.
    pub metrics_window: usize,
    /// Prefix for processes registered without a name; the id is appended.
    pub default_name_prefix: String,
    /// `log` target the controller writes under.
    pub log_target: String,
    /// Interval between metrics summaries logged at `info`, in seconds.
    /// `0` disables the summary.
    pub summary_interval_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            frame_cap: 0,
            metrics_window: DEFAULT_BUFFER_SIZE,
            default_name_prefix: "process_".to_owned(),
            log_target: "pulse::controller".to_owned(),
            summary_interval_secs: 10.0,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ControlResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ControlResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> ControlResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
