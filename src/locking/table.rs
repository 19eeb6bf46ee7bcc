// Copyright 2025 dentsusoken
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

//! Per-resource lock table: one record stack per mode plus a FIFO wait queue.
//!
//! The table is a plain data structure. Callers serialize access through the
//! owning [`LockSet`](crate::locking::LockSet) mutex.

use crate::locking::mode::{LockMode, MODE_COUNT};
use crate::locking::owner::{Owner, OwnershipPolicy};
use std::collections::VecDeque;

/// Position of a blocked acquirer in the wait queue.
pub(crate) type Ticket = u64;

#[derive(Debug, Default)]
pub(crate) struct LockTable {
    // The last element of each stack is the head record. One record per grant,
    // so an owner appearing n times holds the mode n-deep.
    slots: [Vec<Owner>; MODE_COUNT],
    waiters: VecDeque<Ticket>,
    next_ticket: Ticket,
}

impl LockTable {
    pub(crate) fn can_grant(
        &self,
        mode: LockMode,
        owner: &Owner,
        policy: &dyn OwnershipPolicy,
    ) -> bool {
        if self.slot(mode).last().is_some_and(|head| head == owner) {
            return true;
        }

        mode.conflicts().iter().all(|conflicting| {
            self.slot(*conflicting)
                .iter()
                .all(|holder| policy.related(owner, holder))
        })
    }

    /// Pushes a record when the grant check passes. Never mutates otherwise.
    pub(crate) fn try_grant(
        &mut self,
        mode: LockMode,
        owner: &Owner,
        policy: &dyn OwnershipPolicy,
    ) -> bool {
        if !self.can_grant(mode, owner, policy) {
            return false;
        }
        self.slots[mode.index()].push(owner.clone());
        true
    }

    /// Removes the most recent record held by exactly `owner` under `mode`.
    pub(crate) fn release(&mut self, mode: LockMode, owner: &Owner) -> bool {
        let slot = &mut self.slots[mode.index()];
        match slot.iter().rposition(|holder| holder == owner) {
            Some(position) => {
                slot.remove(position);
                true
            }
            None => false,
        }
    }

    /// Removes every record held by `owner` or an owner related to it.
    pub(crate) fn drop_related(&mut self, owner: &Owner, policy: &dyn OwnershipPolicy) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            let before = slot.len();
            slot.retain(|holder| !policy.related(owner, holder));
            removed += before - slot.len();
        }
        removed
    }

    pub(crate) fn hold_count(&self, mode: LockMode, owner: &Owner) -> usize {
        self.slot(mode)
            .iter()
            .filter(|holder| *holder == owner)
            .count()
    }

    pub(crate) fn records(&self, mode: LockMode) -> &[Owner] {
        self.slot(mode)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }

    pub(crate) fn enqueue(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.waiters.push_back(ticket);
        ticket
    }

    pub(crate) fn is_head(&self, ticket: Ticket) -> bool {
        self.waiters.front() == Some(&ticket)
    }

    /// Removes `ticket` wherever it sits in the queue.
    pub(crate) fn dequeue(&mut self, ticket: Ticket) -> bool {
        match self.waiters.iter().position(|queued| *queued == ticket) {
            Some(position) => {
                self.waiters.remove(position);
                true
            }
            None => false,
        }
    }

    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    fn slot(&self, mode: LockMode) -> &Vec<Owner> {
        &self.slots[mode.index()]
    }
}
