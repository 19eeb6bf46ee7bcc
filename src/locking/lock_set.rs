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

//! The lock set engine.
//!
//! A [`LockSet`] guards one resource. Every mutation of its lock table, wait
//! queue and subordinate list happens under a single mutex; blocked acquirers
//! sleep on a condition variable tied to that mutex and are woken by broadcast.
//! After every wakeup a waiter proceeds only if it is at the head of the queue
//! *and* its grant check passes, which keeps grant order FIFO even though
//! wakeup order is not.

use crate::error::{LockError, Result};
use crate::locking::acquisition::LockAcquisitionRequest;
use crate::locking::mode::LockMode;
use crate::locking::owner::{Owner, OwnershipPolicy};
use crate::locking::table::{LockTable, Ticket};
use crate::locking::wait_observer::WaitTarget;
use log::{debug, info, trace};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

static NEXT_LOCK_SET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct LockSetState {
    table: LockTable,
    subordinates: Vec<Weak<LockSetInner>>,
}

#[derive(Debug)]
struct LockSetInner {
    id: u64,
    label: String,
    state: Mutex<LockSetState>,
    available: Condvar,
}

/// Shared handle to one resource's locks. Clones refer to the same lock set.
#[derive(Clone)]
pub struct LockSet {
    inner: Arc<LockSetInner>,
}

/// Per-mode view of a lock set, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeHolding {
    pub mode: LockMode,
    pub records: usize,
    pub owners: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockSetSnapshot {
    pub lock_set: String,
    pub held: Vec<ModeHolding>,
    pub waiters: usize,
    pub subordinates: usize,
}

impl LockSet {
    pub fn new() -> Self {
        let id = NEXT_LOCK_SET_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_id(id, format!("lock-set-{id}"))
    }

    pub fn named(label: impl Into<String>) -> Self {
        let id = NEXT_LOCK_SET_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_id(id, label.into())
    }

    /// Creates a subordinate of `parent`: dropping an owner's locks on the
    /// parent also drops them here.
    pub fn new_related(parent: &LockSet) -> Self {
        let child = Self::new();
        parent.register_subordinate(&child);
        child
    }

    pub fn named_related(label: impl Into<String>, parent: &LockSet) -> Self {
        let child = Self::named(label);
        parent.register_subordinate(&child);
        child
    }

    fn with_id(id: u64, label: String) -> Self {
        Self {
            inner: Arc::new(LockSetInner {
                id,
                label,
                state: Mutex::new(LockSetState::default()),
                available: Condvar::new(),
            }),
        }
    }

    fn register_subordinate(&self, child: &LockSet) {
        self.state()
            .subordinates
            .push(Arc::downgrade(&child.inner));
        debug!(
            "Registered '{}' as subordinate of '{}'",
            child.label(),
            self.label()
        );
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn same_as(&self, other: &LockSet) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Grants `mode` to `owner` if nothing unrelated conflicts. Never blocks and
    /// has no effect when it returns `false`.
    pub fn try_lock(&self, mode: LockMode, owner: &Owner, policy: &dyn OwnershipPolicy) -> bool {
        let granted = self.state().table.try_grant(mode, owner, policy);
        if granted {
            trace!("Granted {mode} on '{}' to {owner}", self.label());
        }
        granted
    }

    /// Blocks until `mode` is granted to `owner`. Waits forever.
    pub fn lock(&self, mode: LockMode, owner: &Owner, policy: &dyn OwnershipPolicy) -> Result<()> {
        self.lock_with(mode, owner, policy, LockAcquisitionRequest::unbounded())
    }

    /// Blocks until `mode` is granted, the request's budget runs out, or its
    /// cancellation token fires.
    ///
    /// On timeout or cancellation the caller's queue entry is removed and the
    /// remaining waiters are woken; the lock table is left as it was.
    pub fn lock_with(
        &self,
        mode: LockMode,
        owner: &Owner,
        policy: &dyn OwnershipPolicy,
        mut request: LockAcquisitionRequest<'_>,
    ) -> Result<()> {
        let mut state = self.state();
        if state.table.try_grant(mode, owner, policy) {
            trace!("Granted {mode} on '{}' to {owner}", self.label());
            return Ok(());
        }

        let ticket = state.table.enqueue();
        debug!(
            "{owner} queued for {mode} on '{}' behind {} waiter(s)",
            self.label(),
            state.table.waiter_count() - 1
        );
        request.record_wait_start(WaitTarget {
            lock_set: self.label().to_string(),
            mode,
            owner: owner.to_string(),
        });

        loop {
            if state.table.is_head(ticket) && state.table.try_grant(mode, owner, policy) {
                state.table.dequeue(ticket);
                let others_waiting = state.table.waiter_count() > 0;
                drop(state);
                if others_waiting {
                    // the next head may be compatible with this grant
                    self.inner.available.notify_all();
                }
                debug!(
                    "Granted {mode} on '{}' to {owner} after {:.3}s",
                    self.label(),
                    request.elapsed().as_secs_f64()
                );
                request.notify_acquired();
                return Ok(());
            }

            if request.is_cancelled() {
                self.abandon(state, ticket);
                info!(
                    "{owner} stopped waiting for {mode} on '{}': cancelled",
                    self.label()
                );
                request.notify_cancelled();
                return Err(LockError::Cancelled {
                    lock_set: self.label().to_string(),
                    mode: mode.to_string(),
                    owner: owner.to_string(),
                    waited_secs: request.elapsed().as_secs_f64(),
                });
            }

            let Some(slice) = request.next_wait_slice() else {
                self.abandon(state, ticket);
                info!(
                    "{owner} stopped waiting for {mode} on '{}': timeout {} elapsed",
                    self.label(),
                    request.timeout_value()
                );
                request.notify_timeout();
                return Err(LockError::Timeout {
                    lock_set: self.label().to_string(),
                    mode: mode.to_string(),
                    owner: owner.to_string(),
                    waited_secs: request.elapsed().as_secs_f64(),
                });
            };

            let (guard, wait) = self
                .inner
                .available
                .wait_timeout(state, slice)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
            if wait.timed_out() {
                request.record_retry();
            }
        }
    }

    fn abandon(&self, mut state: MutexGuard<'_, LockSetState>, ticket: Ticket) {
        state.table.dequeue(ticket);
        drop(state);
        // whoever was behind us may now be at the head
        self.inner.available.notify_all();
    }

    /// Releases one `mode` record held by exactly `owner`.
    pub fn unlock(&self, mode: LockMode, owner: &Owner) -> Result<()> {
        let mut state = self.state();
        if !state.table.release(mode, owner) {
            return Err(self.not_held(mode, owner));
        }
        let depth = state.table.hold_count(mode, owner);
        drop(state);

        self.inner.available.notify_all();
        trace!(
            "Released {mode} on '{}' for {owner} ({depth} still held)",
            self.label()
        );
        Ok(())
    }

    /// Moves `owner` from `old_mode` to `new_mode`, holding both in between.
    pub fn change_mode(
        &self,
        old_mode: LockMode,
        new_mode: LockMode,
        owner: &Owner,
        policy: &dyn OwnershipPolicy,
    ) -> Result<()> {
        self.change_mode_with(
            old_mode,
            new_mode,
            owner,
            policy,
            LockAcquisitionRequest::unbounded(),
        )
    }

    pub fn change_mode_with(
        &self,
        old_mode: LockMode,
        new_mode: LockMode,
        owner: &Owner,
        policy: &dyn OwnershipPolicy,
        request: LockAcquisitionRequest<'_>,
    ) -> Result<()> {
        if !self.holds(old_mode, owner) {
            return Err(self.not_held(old_mode, owner));
        }

        self.lock_with(new_mode, owner, policy, request)?;
        if let Err(err) = self.unlock(old_mode, owner) {
            // old record vanished while we waited (a concurrent drop); undo the new one
            if let Err(undo) = self.unlock(new_mode, owner) {
                debug!("Could not undo {new_mode} on '{}': {undo}", self.label());
            }
            return Err(err);
        }

        debug!(
            "Changed {owner} from {old_mode} to {new_mode} on '{}'",
            self.label()
        );
        Ok(())
    }

    /// Removes every record held by `owner` or a related owner, here and in every
    /// subordinate lock set. Safe to call when nothing is held.
    pub fn drop_locks(&self, owner: &Owner, policy: &dyn OwnershipPolicy) {
        let (removed, had_waiters, subordinates) = {
            let mut state = self.state();
            let removed = state.table.drop_related(owner, policy);
            state.subordinates.retain(|child| child.strong_count() > 0);
            let subordinates: Vec<LockSet> = state
                .subordinates
                .iter()
                .filter_map(Weak::upgrade)
                .map(|inner| LockSet { inner })
                .collect();
            (removed, state.table.waiter_count() > 0, subordinates)
        };

        if removed > 0 {
            debug!(
                "Dropped {removed} lock record(s) on '{}' for {owner}",
                self.label()
            );
        }

        for subordinate in &subordinates {
            subordinate.drop_locks(owner, policy);
        }

        if had_waiters {
            self.inner.available.notify_all();
        }
    }

    pub fn holds(&self, mode: LockMode, owner: &Owner) -> bool {
        self.hold_count(mode, owner) > 0
    }

    /// Reentrancy depth of `owner` under `mode`.
    pub fn hold_count(&self, mode: LockMode, owner: &Owner) -> usize {
        self.state().table.hold_count(mode, owner)
    }

    pub fn is_unlocked(&self) -> bool {
        self.state().table.is_empty()
    }

    pub fn waiter_count(&self) -> usize {
        self.state().table.waiter_count()
    }

    pub fn subordinate_count(&self) -> usize {
        self.state()
            .subordinates
            .iter()
            .filter(|child| child.strong_count() > 0)
            .count()
    }

    pub fn snapshot(&self) -> LockSetSnapshot {
        let state = self.state();
        let held = LockMode::ALL
            .into_iter()
            .filter_map(|mode| {
                let records = state.table.records(mode);
                (!records.is_empty()).then(|| ModeHolding {
                    mode,
                    records: records.len(),
                    owners: records.iter().map(ToString::to_string).collect(),
                })
            })
            .collect();

        LockSetSnapshot {
            lock_set: self.label().to_string(),
            held,
            waiters: state.table.waiter_count(),
            subordinates: state
                .subordinates
                .iter()
                .filter(|child| child.strong_count() > 0)
                .count(),
        }
    }

    fn not_held(&self, mode: LockMode, owner: &Owner) -> LockError {
        LockError::LockNotHeld {
            lock_set: self.label().to_string(),
            mode: mode.to_string(),
            owner: owner.to_string(),
        }
    }

    // Table mutations never panic halfway, so a poisoned mutex still guards a
    // consistent table.
    fn state(&self) -> MutexGuard<'_, LockSetState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LockSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for LockSet {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for LockSet {}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSet")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish_non_exhaustive()
    }
}
