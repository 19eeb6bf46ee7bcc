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

//! Transactional facade: every call names the owning transaction.
//!
//! Subtransactions share locks with their ancestors and descendants. Any
//! acquisition enlists the lock set with the transaction, so completing the
//! transaction releases it.

use crate::error::{LockError, Result};
use crate::locking::acquisition::LockWaitOptions;
use crate::locking::coordinator::LockCoordinator;
use crate::locking::lock_set::LockSet;
use crate::locking::mode::LockMode;
use crate::locking::owner::TransactionHierarchyPolicy;
use crate::locking::scoped_guard::ScopedLockGuard;
use crate::transaction::Transaction;
use std::sync::Arc;

const POLICY: TransactionHierarchyPolicy = TransactionHierarchyPolicy;

#[derive(Debug, Clone)]
pub struct TransactionalLockSet {
    lock_set: LockSet,
    wait: LockWaitOptions,
}

impl TransactionalLockSet {
    pub fn create() -> Self {
        Self::new(LockSet::new())
    }

    pub fn create_related(parent: &TransactionalLockSet) -> Self {
        Self::new(LockSet::new_related(&parent.lock_set)).with_wait_options(parent.wait.clone())
    }

    pub fn new(lock_set: LockSet) -> Self {
        Self {
            lock_set,
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

    pub fn lock(&self, mode: LockMode, transaction: &Transaction) -> Result<()> {
        transaction.enlist(&self.lock_set)?;
        self.lock_set
            .lock_with(mode, &transaction.owner(), &POLICY, self.wait.request())
    }

    /// Fails only when `transaction` has already completed; a refused grant is
    /// `Ok(false)`.
    pub fn try_lock(&self, mode: LockMode, transaction: &Transaction) -> Result<bool> {
        transaction.enlist(&self.lock_set)?;
        Ok(self.lock_set.try_lock(mode, &transaction.owner(), &POLICY))
    }

    pub fn unlock(&self, mode: LockMode, transaction: &Transaction) -> Result<()> {
        self.lock_set.unlock(mode, &transaction.owner())
    }

    pub fn change_mode(
        &self,
        old_mode: LockMode,
        new_mode: LockMode,
        transaction: &Transaction,
    ) -> Result<()> {
        self.ensure_active(transaction)?;
        self.lock_set.change_mode_with(
            old_mode,
            new_mode,
            &transaction.owner(),
            &POLICY,
            self.wait.request(),
        )
    }

    /// Drops the locks of `transaction` and its whole hierarchy, here and in
    /// every subordinate lock set.
    pub fn drop_locks(&self, transaction: &Transaction) {
        self.lock_set.drop_locks(&transaction.owner(), &POLICY);
    }

    pub fn lock_guard(&self, mode: LockMode, transaction: &Transaction) -> Result<ScopedLockGuard> {
        self.lock(mode, transaction)?;
        Ok(ScopedLockGuard::new(
            self.lock_set.clone(),
            mode,
            transaction.owner(),
        ))
    }

    pub fn get_coordinator(&self, transaction: &Transaction) -> LockCoordinator {
        LockCoordinator::new(self.lock_set.clone(), transaction.owner(), Arc::new(POLICY))
    }

    fn ensure_active(&self, transaction: &Transaction) -> Result<()> {
        if transaction.is_active() {
            Ok(())
        } else {
            Err(LockError::InactiveTransaction {
                transaction: transaction.id().to_string(),
            })
        }
    }
}
