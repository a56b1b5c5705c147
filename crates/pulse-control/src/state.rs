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

//! The controller lifecycle and the shareable handle used to end it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of a [`ProcessController`](crate::ProcessController).
///
/// Ordered by progress: the state only ever moves forward, and `Killed`
/// absorbs everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum ControllerState {
    /// Built but not yet run.
    #[default]
    Ready = 0,
    /// Running the start phase.
    Starting = 1,
    /// Running loop frames.
    Running = 2,
    /// A stop was requested; the current frame finishes, then the stop phase runs.
    Stopping = 3,
    /// Shut down cleanly.
    Stopped = 4,
    /// Shut down forcibly; the stop phase was skipped.
    Killed = 5,
}

impl ControllerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ControllerState::Ready,
            1 => ControllerState::Starting,
            2 => ControllerState::Running,
            3 => ControllerState::Stopping,
            4 => ControllerState::Stopped,
            _ => ControllerState::Killed,
        }
    }

    /// Returns true once the controller can no longer run anything.
    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerState::Stopped | ControllerState::Killed)
    }
}

/// A cloneable handle onto a controller's state.
///
/// `run()` borrows the controller mutably for its whole duration; this handle
/// is how another thread (a window thread, a signal handler) asks it to end.
/// Requests are observed at the same points as process escalations.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    state: Arc<AtomicU8>,
}

impl ControlHandle {
    /// Creates a handle in the `Ready` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current controller state.
    #[inline]
    pub fn state(&self) -> ControllerState {
        ControllerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Requests a graceful stop. Does nothing if the state is already
    /// `Stopping` or beyond.
    pub fn stop(&self) -> bool {
        self.advance(ControllerState::Stopping)
    }

    /// Kills the controller unconditionally.
    pub fn kill(&self) {
        self.state
            .store(ControllerState::Killed as u8, Ordering::Release);
    }

    /// Moves the state forward to `to` unless it is already there or further.
    /// Returns true if the state changed.
    pub(crate) fn advance(&self, to: ControllerState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < to as u8).then_some(to as u8)
            })
            .is_ok()
    }
}
