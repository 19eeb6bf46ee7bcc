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

//! Non-transactional facade: the owner is implicit.
//!
//! Every call resolves its owner through [`IdentityPolicy::current_owner`],
//! which yields the transaction bound to the calling thread when bindings are
//! configured, and the calling thread otherwise. Acquisitions made for a bound
//! transaction enlist the lock set with it, so completing the transaction
//! releases them.

use crate::error::Result;
use crate::locking::acquisition::LockWaitOptions;
use crate::locking::coordinator::LockCoordinator;
use crate::locking::lock_set::LockSet;
use crate::locking::mode::LockMode;
use crate::locking::owner::{IdentityPolicy, Owner, OwnershipPolicy};
use crate::locking::scoped_guard::ScopedLockGuard;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ThreadLockSet {
    lock_set: LockSet,
    policy: Arc<IdentityPolicy>,
    wait: LockWaitOptions,
}

impl ThreadLockSet {
    pub fn create() -> Self {
        Self::new(LockSet::new(), Arc::new(IdentityPolicy::new()))
    }

    /// Creates a lock set subordinate to `parent`, sharing its policy.
    pub fn create_related(parent: &ThreadLockSet) -> Self {
        Self::new(
            LockSet::new_related(&parent.lock_set),
            Arc::clone(&parent.policy),
        )
        .with_wait_options(parent.wait.clone())
    }

    pub fn new(lock_set: LockSet, policy: Arc<IdentityPolicy>) -> Self {
        Self {
            lock_set,
            policy,
            wait: LockWaitOptions::default(),
        }
    }

    pub fn with_wait_options(mut self, wait: LockWaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn lock_set(&self) -> &LockSet {
        &self.lock_set
    }

    pub fn current_owner(&self) -> Owner {
        self.policy.current_owner()
    }

    pub fn lock(&self, mode: LockMode) -> Result<()> {
        let owner = self.acquiring_owner()?;
        self.lock_set
            .lock_with(mode, &owner, self.policy.as_ref(), self.wait.request())
    }

    /// Fails only when the bound transaction has already completed; a refused
    /// grant is `Ok(false)`.
    pub fn try_lock(&self, mode: LockMode) -> Result<bool> {
        let owner = self.acquiring_owner()?;
        Ok(self.lock_set.try_lock(mode, &owner, self.policy.as_ref()))
    }

    pub fn unlock(&self, mode: LockMode) -> Result<()> {
        self.lock_set.unlock(mode, &self.current_owner())
    }

    pub fn change_mode(&self, old_mode: LockMode, new_mode: LockMode) -> Result<()> {
        let owner = self.acquiring_owner()?;
        self.lock_set.change_mode_with(
            old_mode,
            new_mode,
            &owner,
            self.policy.as_ref(),
            self.wait.request(),
        )
    }

    pub fn drop_locks(&self) {
        self.lock_set
            .drop_locks(&self.current_owner(), self.policy.as_ref());
    }

    /// Acquires `mode` and returns a guard that releases it on drop.
    pub fn lock_guard(&self, mode: LockMode) -> Result<ScopedLockGuard> {
        let owner = self.acquiring_owner()?;
        self.lock_set
            .lock_with(mode, &owner, self.policy.as_ref(), self.wait.request())?;
        Ok(ScopedLockGuard::new(self.lock_set.clone(), mode, owner))
    }

    /// Coordinator for the calling thread's current owner.
    pub fn coordinator(&self) -> LockCoordinator {
        self.coordinator_for(self.current_owner())
    }

    pub fn coordinator_for(&self, owner: Owner) -> LockCoordinator {
        LockCoordinator::new(self.lock_set.clone(), owner, self.policy.clone())
    }

    // A bound transaction must be live, and it takes this lock set with it when
    // it completes.
    fn acquiring_owner(&self) -> Result<Owner> {
        match self.policy.current_transaction() {
            Some(transaction) => {
                transaction.enlist(&self.lock_set)?;
                Ok(transaction.owner())
            }
            None => Ok(Owner::current_thread()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockError;
    use crate::transaction::{ThreadBindings, Transaction};
    use std::thread;

    #[test]
    fn same_thread_is_reentrant() {
        let locks = ThreadLockSet::create();
        locks.lock(LockMode::Read).unwrap();
        assert!(locks.try_lock(LockMode::Write).unwrap());
        assert!(locks.try_lock(LockMode::Write).unwrap());

        locks.unlock(LockMode::Write).unwrap();
        locks.unlock(LockMode::Write).unwrap();
        locks.unlock(LockMode::Read).unwrap();
        assert!(locks.lock_set().is_unlocked());
        assert!(locks.unlock(LockMode::Read).unwrap_err().is_lock_not_held());
    }

    #[test]
    fn other_threads_are_excluded() {
        let locks = ThreadLockSet::create();
        locks.lock(LockMode::Write).unwrap();

        let other = locks.clone();
        let granted = thread::spawn(move || other.try_lock(LockMode::Read).unwrap())
            .join()
            .unwrap();
        assert!(!granted);
    }

    #[test]
    fn bound_transaction_owns_locks_across_threads() {
        let bindings = Arc::new(ThreadBindings::new());
        let locks = ThreadLockSet::new(
            LockSet::named("shared"),
            Arc::new(IdentityPolicy::with_bindings(bindings.clone())),
        );
        let tx = Transaction::begin();

        {
            let _bound = bindings.bind(tx.clone());
            locks.lock(LockMode::Write).unwrap();
        }

        let worker = {
            let locks = locks.clone();
            let bindings = bindings.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let _bound = bindings.bind(tx);
                locks.try_lock(LockMode::Write).unwrap()
            })
        };
        assert!(worker.join().unwrap());
        assert_eq!(locks.lock_set().hold_count(LockMode::Write, &tx.owner()), 2);

        // the unbound thread is a different owner
        assert!(!locks.try_lock(LockMode::Read).unwrap());
    }

    #[test]
    fn committing_bound_transaction_releases_facade_locks() {
        let bindings = Arc::new(ThreadBindings::new());
        let parent = ThreadLockSet::new(
            LockSet::named("table"),
            Arc::new(IdentityPolicy::with_bindings(bindings.clone())),
        );
        let child = ThreadLockSet::create_related(&parent);
        let other = ThreadLockSet::new(
            LockSet::named("index"),
            Arc::new(IdentityPolicy::with_bindings(bindings.clone())),
        );
        let tx = Transaction::begin();

        {
            let _bound = bindings.bind(tx.clone());
            parent.lock(LockMode::IntentionWrite).unwrap();
            child.lock(LockMode::Write).unwrap();
            assert!(other.try_lock(LockMode::Read).unwrap());
            other.lock(LockMode::Read).unwrap();
        }
        assert_eq!(tx.enlisted_count(), 3);

        tx.commit().unwrap();
        assert!(parent.lock_set().is_unlocked());
        assert!(child.lock_set().is_unlocked());
        assert!(other.lock_set().is_unlocked());
        assert!(parent.try_lock(LockMode::Write).unwrap());
    }

    #[test]
    fn completed_bound_transaction_cannot_acquire() {
        let bindings = Arc::new(ThreadBindings::new());
        let locks = ThreadLockSet::new(
            LockSet::new(),
            Arc::new(IdentityPolicy::with_bindings(bindings.clone())),
        );
        let tx = Transaction::begin();
        tx.rollback().unwrap();

        let _bound = bindings.bind(tx);
        assert!(matches!(
            locks.try_lock(LockMode::Read).unwrap_err(),
            LockError::InactiveTransaction { .. }
        ));
        assert!(matches!(
            locks.lock(LockMode::Write).unwrap_err(),
            LockError::InactiveTransaction { .. }
        ));
        assert!(locks.lock_guard(LockMode::Read).is_err());
        assert!(locks.lock_set().is_unlocked());
    }

    #[test]
    fn related_facade_cascades_drop() {
        let parent = ThreadLockSet::create();
        let child = ThreadLockSet::create_related(&parent);

        parent.lock(LockMode::IntentionWrite).unwrap();
        child.lock(LockMode::Write).unwrap();
        parent.coordinator().drop_locks();

        assert!(parent.lock_set().is_unlocked());
        assert!(child.lock_set().is_unlocked());
    }

    #[test]
    fn change_mode_upgrades_in_place() {
        let locks = ThreadLockSet::create();
        locks.lock(LockMode::Read).unwrap();
        locks.change_mode(LockMode::Read, LockMode::Upgrade).unwrap();
        locks.change_mode(LockMode::Upgrade, LockMode::Write).unwrap();

        let owner = locks.current_owner();
        assert!(locks.lock_set().holds(LockMode::Write, &owner));
        assert!(!locks.lock_set().holds(LockMode::Read, &owner));
    }

    #[test]
    fn lock_guard_releases() {
        let locks = ThreadLockSet::create();
        {
            let _guard = locks.lock_guard(LockMode::Upgrade).unwrap();
            assert!(locks.lock_set().holds(LockMode::Upgrade, &locks.current_owner()));
        }
        assert!(locks.lock_set().is_unlocked());
    }
}
