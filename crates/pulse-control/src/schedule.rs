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

//! The three-tier execution order and its removal-safe cursor.
//!
//! Instances live in one list per [`Ordinal`]. Traversal walks Early, then
//! Main, then Late, each in insertion order. The schedule keeps a single
//! cursor so an instance can be removed while the traversal is sitting on it:
//! the cursor moves to the successor first, then the instance is erased.

use crate::instance::ProcessInstance;
use pulse_core::{Ordinal, ProcessId};

/// A position in the schedule: a tier and an index inside it.
///
/// The cursor past the Late tier is the end sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    tier: usize,
    index: usize,
}

impl Cursor {
    const END: Cursor = Cursor {
        tier: Ordinal::COUNT,
        index: 0,
    };

    /// Returns true for the end sentinel.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.tier >= Ordinal::COUNT
    }

    /// The tier the cursor is in, `None` at the end.
    pub fn ordinal(&self) -> Option<Ordinal> {
        Ordinal::ALL.get(self.tier).copied()
    }

    /// Index inside the current tier.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ordered storage for process instances.
#[derive(Debug)]
pub struct ProcessSchedule {
    tiers: [Vec<ProcessInstance>; Ordinal::COUNT],
    cursor: Cursor,
}

impl ProcessSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self {
            tiers: Default::default(),
            cursor: Cursor::END,
        }
    }

    /// Appends `instance` to its tier.
    ///
    /// Returns false without storing anything if the instance's unit has
    /// already been dropped or its id is already scheduled. Never moves the
    /// cursor.
    pub fn add(&mut self, instance: ProcessInstance) -> bool {
        if !instance.is_alive() || self.contains(instance.id()) {
            return false;
        }
        self.tiers[instance.ordinal().tier_index()].push(instance);
        true
    }

    /// Removes the instance with `id`, returning it.
    ///
    /// If the cursor is on that instance it moves to the successor first. A
    /// cursor on any other instance keeps pointing at the same instance.
    pub fn remove(&mut self, id: ProcessId) -> Option<ProcessInstance> {
        let (tier, index) = self.position(id)?;
        let removed = self.tiers[tier].remove(index);

        if self.cursor.tier == tier {
            if index < self.cursor.index {
                self.cursor.index -= 1;
            } else if index == self.cursor.index {
                // The successor slid into this slot; it may also be past the tier end.
                self.cursor = self.settle(self.cursor);
            }
        }
        Some(removed)
    }

    /// Resets the cursor to the first instance in traversal order.
    pub fn begin(&mut self) -> Cursor {
        self.cursor = self.settle(Cursor { tier: 0, index: 0 });
        self.cursor
    }

    /// Advances the cursor by one, crossing into the next tier when needed.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Cursor {
        if !self.cursor.is_end() {
            self.cursor.index += 1;
            self.cursor = self.settle(self.cursor);
        }
        self.cursor
    }

    /// The end sentinel.
    #[inline]
    pub fn end(&self) -> Cursor {
        Cursor::END
    }

    /// The cursor's current position.
    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The instance under the cursor, `None` at the end.
    pub fn current(&self) -> Option<&ProcessInstance> {
        self.at(self.cursor)
    }

    /// The instance at `cursor`, if any.
    pub fn at(&self, cursor: Cursor) -> Option<&ProcessInstance> {
        self.tiers.get(cursor.tier)?.get(cursor.index)
    }

    /// First instance in traversal order.
    pub fn front(&self) -> Option<&ProcessInstance> {
        self.tiers.iter().find_map(|tier| tier.first())
    }

    /// Last instance in traversal order.
    pub fn back(&self) -> Option<&ProcessInstance> {
        self.tiers.iter().rev().find_map(|tier| tier.last())
    }

    /// Total number of instances over all tiers.
    pub fn len(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    /// Returns true if no instance is scheduled.
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(Vec::is_empty)
    }

    /// Looks up an instance by id.
    pub fn get(&self, id: ProcessId) -> Option<&ProcessInstance> {
        self.iter().find(|instance| instance.id() == id)
    }

    /// Returns true if an instance with `id` is scheduled.
    pub fn contains(&self, id: ProcessId) -> bool {
        self.position(id).is_some()
    }

    /// Iterates over all instances in traversal order without touching the cursor.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessInstance> {
        self.tiers.iter().flatten()
    }

    fn position(&self, id: ProcessId) -> Option<(usize, usize)> {
        self.tiers.iter().enumerate().find_map(|(tier, instances)| {
            instances
                .iter()
                .position(|instance| instance.id() == id)
                .map(|index| (tier, index))
        })
    }

    /// Moves `cursor` forward past exhausted tiers.
    fn settle(&self, mut cursor: Cursor) -> Cursor {
        while cursor.tier < Ordinal::COUNT && cursor.index >= self.tiers[cursor.tier].len() {
            cursor.tier += 1;
            cursor.index = 0;
        }
        if cursor.is_end() {
            Cursor::END
        } else {
            cursor
        }
    }
}

impl Default for ProcessSchedule {
    fn default() -> Self {
        Self::new()
    }
}
