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

//! The contract every schedulable unit of work implements, and the small
//! enums the controller reads to decide what happens to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// The signal a process reports back to the controller after each hook.
///
/// Variants are ordered by increasing severity; the controller compares them
/// with `<` when deciding whether a process runs this frame.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ControlState {
    /// The process wants to run normally.
    #[default]
    Ready,
    /// Do not run the process until it reports `Ready` again.
    SkipThisFrame,
    /// Ask the controller to stop gracefully. Needs [`Privilege::Low`].
    RequestStop,
    /// Ask the controller to halt immediately. Needs [`Privilege::High`],
    /// otherwise it is downgraded to a stop request.
    RequestKill,
    /// Remove this process from the schedule.
    RemoveSelf,
}

/// Authority level deciding whether a process may stop or kill the controller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Privilege {
    /// May only skip frames or remove itself.
    #[default]
    None,
    /// May request a graceful stop.
    Low,
    /// May kill the controller.
    High,
}

impl Privilege {
    /// Returns true if a stop request from this privilege level is honoured.
    #[inline]
    pub fn may_stop(self) -> bool {
        self >= Privilege::Low
    }

    /// Returns true if a kill request from this privilege level is honoured.
    #[inline]
    pub fn may_kill(self) -> bool {
        self >= Privilege::High
    }
}

/// The execution tier of a process. Tiers always run Early, then Main, then Late.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Ordinal {
    /// Runs before everything else (input polling, clocks).
    Early,
    /// The default tier.
    #[default]
    Main,
    /// Runs after everything else (presentation, capture).
    Late,
}

impl Ordinal {
    /// All tiers in traversal order.
    pub const ALL: [Ordinal; 3] = [Ordinal::Early, Ordinal::Main, Ordinal::Late];

    /// Number of tiers.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this tier in [`Ordinal::ALL`].
    #[inline]
    pub fn tier_index(self) -> usize {
        match self {
            Ordinal::Early => 0,
            Ordinal::Main => 1,
            Ordinal::Late => 2,
        }
    }
}

/// Identifier handed out by the controller when a process is registered.
///
/// Ids increase monotonically and are never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of work driven by the controller once per frame.
///
/// Only [`Process::on_loop`] is mandatory. Hooks run synchronously on the
/// controller's thread; a hook that never returns stalls the whole loop.
pub trait Process: Send {
    /// Called once before the first loop frame.
    fn on_start(&mut self) {}

    /// Called once per frame while the controller is running.
    fn on_loop(&mut self);

    /// Called once during graceful shutdown. Not called after a kill.
    fn on_stop(&mut self) {}

    /// The signal the controller reads right after each hook.
    fn control_state(&self) -> ControlState {
        ControlState::Ready
    }
}

/// The owning handle a registrant keeps for its process.
///
/// The scheduler only stores a weak downgrade of it, so the unit lives exactly
/// as long as the registrant keeps this handle around.
pub type ProcessHandle = Arc<Mutex<dyn Process>>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Process for Idle {
        fn on_loop(&mut self) {}
    }

    #[test]
    fn test_control_state_severity_order() {
        assert!(ControlState::Ready < ControlState::SkipThisFrame);
        assert!(ControlState::SkipThisFrame < ControlState::RequestStop);
        assert!(ControlState::RequestStop < ControlState::RequestKill);
        assert!(ControlState::RequestKill < ControlState::RemoveSelf);
    }

    #[test]
    fn test_privilege_gates() {
        assert!(!Privilege::None.may_stop());
        assert!(!Privilege::None.may_kill());
        assert!(Privilege::Low.may_stop());
        assert!(!Privilege::Low.may_kill());
        assert!(Privilege::High.may_stop());
        assert!(Privilege::High.may_kill());
    }

    #[test]
    fn test_ordinal_tier_indices_follow_traversal_order() {
        for (i, ordinal) in Ordinal::ALL.iter().enumerate() {
            assert_eq!(ordinal.tier_index(), i);
        }
        assert_eq!(Ordinal::default(), Ordinal::Main);
    }

    #[test]
    fn test_default_hooks_report_ready() {
        let mut idle = Idle;
        idle.on_start();
        idle.on_loop();
        idle.on_stop();
        assert_eq!(idle.control_state(), ControlState::Ready);
    }

    #[test]
    fn test_process_id_display() {
        assert_eq!(ProcessId(7).to_string(), "#7");
    }
}
