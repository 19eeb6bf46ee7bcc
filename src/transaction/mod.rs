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

//! Minimal transaction handles consumed by the lock manager.
//!
//! A transaction exposes its ancestry for the hierarchy ownership policy and
//! remembers every lock set it acquired locks on, so completing it releases
//! them exactly once.

pub mod binding;

pub use binding::{BoundTransaction, ThreadBindings};

use crate::error::{LockError, Result};
use crate::locking::lock_set::LockSet;
use crate::locking::owner::{Owner, TransactionHierarchyPolicy};
use log::debug;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a transaction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
    TimedOut,
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionOutcome::Committed => "committed",
            TransactionOutcome::RolledBack => "rolled back",
            TransactionOutcome::TimedOut => "timed out",
        };
        f.write_str(label)
    }
}

/// Lock-record view of a transaction: its id plus the ids of its ancestors.
///
/// Holds no reference to transaction state, so lock records never keep a
/// transaction alive.
#[derive(Debug, Clone)]
pub struct TransactionRef {
    id: TransactionId,
    // Nearest parent first.
    ancestors: Arc<[TransactionId]>,
}

impl TransactionRef {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_ancestor_of(&self, other: &TransactionRef) -> bool {
        other.ancestors.contains(&self.id)
    }

    /// Same transaction, an ancestor, or a descendant.
    pub fn is_related(&self, other: &TransactionRef) -> bool {
        self.id == other.id || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }
}

#[derive(Debug, Default)]
struct TransactionState {
    outcome: Option<TransactionOutcome>,
    enlisted: Vec<LockSet>,
}

#[derive(Debug)]
struct TransactionInner {
    reference: TransactionRef,
    parent: Option<Transaction>,
    state: Mutex<TransactionState>,
}

/// Cheaply clonable handle to a (possibly nested) transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl Transaction {
    /// Starts a top-level transaction.
    pub fn begin() -> Self {
        Self::with_parent(None, Arc::from(Vec::new()))
    }

    /// Starts a subtransaction related to this one and all of its ancestors.
    pub fn begin_child(&self) -> Self {
        let mut ancestors = Vec::with_capacity(self.reference().depth() + 1);
        ancestors.push(self.id());
        ancestors.extend_from_slice(&self.reference().ancestors);
        Self::with_parent(Some(self.clone()), Arc::from(ancestors))
    }

    fn with_parent(parent: Option<Transaction>, ancestors: Arc<[TransactionId]>) -> Self {
        let reference = TransactionRef {
            id: TransactionId::generate(),
            ancestors,
        };
        Self {
            inner: Arc::new(TransactionInner {
                reference,
                parent,
                state: Mutex::new(TransactionState::default()),
            }),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.inner.reference.id
    }

    pub fn reference(&self) -> &TransactionRef {
        &self.inner.reference
    }

    pub fn parent(&self) -> Option<&Transaction> {
        self.inner.parent.as_ref()
    }

    pub fn owner(&self) -> Owner {
        Owner::transaction(self)
    }

    pub fn is_related(&self, other: &Transaction) -> bool {
        self.reference().is_related(other.reference())
    }

    pub fn is_active(&self) -> bool {
        self.state().outcome.is_none()
    }

    pub fn outcome(&self) -> Option<TransactionOutcome> {
        self.state().outcome
    }

    pub fn enlisted_count(&self) -> usize {
        self.state().enlisted.len()
    }

    /// Records that this transaction touched `lock_set`. Fails once the
    /// transaction has completed.
    ///
    /// Enlisting and the grant that follows are two steps. If another thread
    /// completes the transaction in between, the record granted afterwards is
    /// not dropped by that completion. Callers must not complete a transaction
    /// while any of its threads are still acquiring locks.
    pub fn enlist(&self, lock_set: &LockSet) -> Result<()> {
        let mut state = self.state();
        if state.outcome.is_some() {
            return Err(LockError::InactiveTransaction {
                transaction: self.id().to_string(),
            });
        }
        if !state.enlisted.iter().any(|known| known.same_as(lock_set)) {
            state.enlisted.push(lock_set.clone());
        }
        Ok(())
    }

    /// Finishes the transaction and drops its locks, and those of its
    /// subtransactions, on every enlisted lock set and their subordinates.
    ///
    /// Must be called exactly once, after every acquisition on behalf of the
    /// transaction has returned; see [`Transaction::enlist`]. A second call
    /// fails with [`LockError::AlreadyCompleted`].
    pub fn complete(&self, outcome: TransactionOutcome) -> Result<()> {
        let enlisted = {
            let mut state = self.state();
            if state.outcome.is_some() {
                return Err(LockError::AlreadyCompleted {
                    transaction: self.id().to_string(),
                });
            }
            state.outcome = Some(outcome);
            std::mem::take(&mut state.enlisted)
        };

        let owner = self.owner();
        for lock_set in &enlisted {
            lock_set.drop_locks(&owner, &TransactionHierarchyPolicy);
        }
        debug!(
            "Transaction {} {outcome}; released locks on {} lock set(s)",
            self.id(),
            enlisted.len()
        );
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.complete(TransactionOutcome::Committed)
    }

    pub fn rollback(&self) -> Result<()> {
        self.complete(TransactionOutcome::RolledBack)
    }

    fn state(&self) -> MutexGuard<'_, TransactionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Transaction {}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transaction {}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::LockMode;

    #[test]
    fn child_knows_its_ancestry() {
        let root = Transaction::begin();
        let child = root.begin_child();
        let grandchild = child.begin_child();

        assert_eq!(grandchild.parent(), Some(&child));
        assert_eq!(grandchild.reference().depth(), 2);
        assert!(root.reference().is_ancestor_of(grandchild.reference()));
        assert!(!grandchild.reference().is_ancestor_of(root.reference()));
        assert!(grandchild.is_related(&root));
        assert!(root.is_related(&root));
    }

    #[test]
    fn siblings_are_unrelated() {
        let root = Transaction::begin();
        let left = root.begin_child();
        let right = root.begin_child();

        assert!(!left.is_related(&right));
        assert!(!root.is_related(&Transaction::begin()));
    }

    #[test]
    fn complete_releases_enlisted_locks_once() {
        let lock_set = LockSet::named("orders");
        let tx = Transaction::begin();
        let owner = tx.owner();

        tx.enlist(&lock_set).unwrap();
        tx.enlist(&lock_set).unwrap();
        assert_eq!(tx.enlisted_count(), 1);
        assert!(lock_set.try_lock(LockMode::Write, &owner, &TransactionHierarchyPolicy));

        tx.commit().unwrap();
        assert!(!tx.is_active());
        assert_eq!(tx.outcome(), Some(TransactionOutcome::Committed));
        assert!(!lock_set.holds(LockMode::Write, &owner));

        let err = tx.rollback().unwrap_err();
        assert!(matches!(err, LockError::AlreadyCompleted { .. }));
    }

    #[test]
    fn completed_transaction_cannot_enlist() {
        let tx = Transaction::begin();
        tx.complete(TransactionOutcome::TimedOut).unwrap();

        let err = tx.enlist(&LockSet::new()).unwrap_err();
        assert!(matches!(err, LockError::InactiveTransaction { .. }));
    }
}
