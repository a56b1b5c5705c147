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

//! Scheduler-side metadata for a registered process.

use pulse_core::{ControlState, Ordinal, Privilege, Process, ProcessHandle, ProcessId};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

/// The lifecycle hook a frame applies to every process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// [`Process::on_start`].
    Start,
    /// [`Process::on_loop`].
    Loop,
    /// [`Process::on_stop`].
    Stop,
}

impl Phase {
    /// Calls the hook matching this phase on `process`.
    #[inline]
    pub fn invoke(self, process: &mut dyn Process) {
        match self {
            Phase::Start => process.on_start(),
            Phase::Loop => process.on_loop(),
            Phase::Stop => process.on_stop(),
        }
    }

    /// Returns true if a process's control state can hold it back in this
    /// phase. Start and stop reach every live process so setup and cleanup
    /// stay paired; only loop frames honour `SkipThisFrame` and above.
    #[inline]
    pub fn is_gated(self) -> bool {
        matches!(self, Phase::Loop)
    }
}

/// Locks a process, recovering the guard if a previous hook panicked.
pub(crate) fn lock_unit<'a>(
    unit: &'a Mutex<dyn Process + 'static>,
) -> MutexGuard<'a, dyn Process + 'static> {
    unit.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A registered process as the schedule sees it.
///
/// Holds fixed metadata and a weak reference to the unit. The registrant owns
/// the unit; once it drops its last handle the instance becomes dangling and
/// the controller removes it on its next visit.
pub struct ProcessInstance {
    id: ProcessId,
    name: String,
    privilege: Privilege,
    ordinal: Ordinal,
    unit: Weak<Mutex<dyn Process>>,
}

impl ProcessInstance {
    /// Wraps `unit`. When `name` is `None` or empty the name becomes
    /// `default_prefix` followed by the numeric id.
    pub fn new(
        id: ProcessId,
        unit: Weak<Mutex<dyn Process>>,
        privilege: Privilege,
        ordinal: Ordinal,
        name: Option<&str>,
        default_prefix: &str,
    ) -> Self {
        let name = match name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("{default_prefix}{}", id.0),
        };
        Self {
            id,
            name,
            privilege,
            ordinal,
            unit,
        }
    }

    /// The id assigned at registration.
    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// The human-readable name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The privilege assigned at registration.
    #[inline]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// The tier the instance runs in.
    #[inline]
    pub fn ordinal(&self) -> Ordinal {
        self.ordinal
    }

    /// Returns true while the registrant still holds the unit.
    pub fn is_alive(&self) -> bool {
        self.unit.strong_count() > 0
    }

    /// A strong handle to the unit for the duration of a call, if it still exists.
    pub fn upgrade(&self) -> Option<ProcessHandle> {
        self.unit.upgrade()
    }

    /// The unit's current control state, or `None` if it has been dropped.
    pub fn state(&self) -> Option<ControlState> {
        let unit = self.upgrade()?;
        let state = lock_unit(&unit).control_state();
        Some(state)
    }
}

impl fmt::Debug for ProcessInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessInstance")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("privilege", &self.privilege)
            .field("ordinal", &self.ordinal)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Phase>,
        state: ControlState,
    }

    impl Process for Recorder {
        fn on_start(&mut self) {
            self.calls.push(Phase::Start);
        }
        fn on_loop(&mut self) {
            self.calls.push(Phase::Loop);
        }
        fn on_stop(&mut self) {
            self.calls.push(Phase::Stop);
        }
        fn control_state(&self) -> ControlState {
            self.state
        }
    }

    fn instance_for(unit: &ProcessHandle, name: Option<&str>) -> ProcessInstance {
        ProcessInstance::new(
            ProcessId(3),
            Arc::downgrade(unit),
            Privilege::Low,
            Ordinal::Late,
            name,
            "process_",
        )
    }

    #[test]
    fn test_default_name_uses_prefix_and_id() {
        let unit: ProcessHandle = Arc::new(Mutex::new(Recorder::default()));
        assert_eq!(instance_for(&unit, None).name(), "process_3");
        assert_eq!(instance_for(&unit, Some("")).name(), "process_3");
        assert_eq!(instance_for(&unit, Some("window")).name(), "window");
    }

    #[test]
    fn test_state_forwards_to_unit() {
        let concrete = Arc::new(Mutex::new(Recorder::default()));
        let unit: ProcessHandle = concrete.clone();
        let instance = instance_for(&unit, None);

        assert_eq!(instance.state(), Some(ControlState::Ready));
        concrete.lock().unwrap().state = ControlState::RemoveSelf;
        assert_eq!(instance.state(), Some(ControlState::RemoveSelf));
    }

    #[test]
    fn test_dropped_unit_leaves_instance_dangling() {
        let unit: ProcessHandle = Arc::new(Mutex::new(Recorder::default()));
        let instance = instance_for(&unit, None);
        assert!(instance.is_alive());

        drop(unit);
        assert!(!instance.is_alive());
        assert!(instance.state().is_none());
        assert!(instance.upgrade().is_none());
    }

    #[test]
    fn test_only_loop_is_gated() {
        assert!(!Phase::Start.is_gated());
        assert!(Phase::Loop.is_gated());
        assert!(!Phase::Stop.is_gated());
    }

    #[test]
    fn test_lock_unit_recovers_from_poisoned_hook() {
        let concrete = Arc::new(Mutex::new(Recorder::default()));
        let unit: ProcessHandle = concrete.clone();

        let poisoner = unit.clone();
        let result = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("hook failed");
        })
        .join();
        assert!(result.is_err());
        assert!(unit.is_poisoned());

        Phase::Loop.invoke(&mut *lock_unit(&unit));
        assert_eq!(lock_unit(&unit).control_state(), ControlState::Ready);
        assert_eq!(
            concrete.lock().unwrap_or_else(PoisonError::into_inner).calls,
            vec![Phase::Loop]
        );
    }

    #[test]
    fn test_phase_invokes_matching_hook() {
        let concrete = Arc::new(Mutex::new(Recorder::default()));
        let unit: ProcessHandle = concrete.clone();
        for phase in [Phase::Start, Phase::Loop, Phase::Loop, Phase::Stop] {
            phase.invoke(&mut *lock_unit(&unit));
        }
        assert_eq!(
            concrete.lock().unwrap().calls,
            vec![Phase::Start, Phase::Loop, Phase::Loop, Phase::Stop]
        );
    }
}
