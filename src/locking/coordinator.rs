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

use crate::locking::lock_set::LockSet;
use crate::locking::owner::{Owner, OwnershipPolicy};
use std::fmt;
use std::sync::Arc;

/// Binds one lock set to one owner so the owner's locks can be dropped in bulk,
/// usually when the owning transaction completes.
#[derive(Clone)]
pub struct LockCoordinator {
    lock_set: LockSet,
    owner: Owner,
    policy: Arc<dyn OwnershipPolicy>,
}

impl LockCoordinator {
    pub fn new(lock_set: LockSet, owner: Owner, policy: Arc<dyn OwnershipPolicy>) -> Self {
        Self {
            lock_set,
            owner,
            policy,
        }
    }

    pub fn lock_set(&self) -> &LockSet {
        &self.lock_set
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Drops every lock held by the bound owner or a related owner, including
    /// in subordinate lock sets. Calling it again is harmless.
    pub fn drop_locks(&self) {
        self.lock_set.drop_locks(&self.owner, self.policy.as_ref());
    }
}

impl fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("lock_set", &self.lock_set)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::mode::LockMode;
    use crate::locking::owner::{IdentityPolicy, OwnerToken, TransactionHierarchyPolicy};
    use crate::transaction::Transaction;

    #[test]
    fn drop_locks_clears_owner_and_subordinates() {
        let parent = LockSet::named("warehouse");
        let child = LockSet::new_related(&parent);
        let owner = Owner::token(OwnerToken::new());
        let policy = Arc::new(IdentityPolicy::new());

        parent.lock(LockMode::IntentionWrite, &owner, policy.as_ref()).unwrap();
        child.lock(LockMode::Write, &owner, policy.as_ref()).unwrap();

        let coordinator = LockCoordinator::new(parent.clone(), owner.clone(), policy);
        coordinator.drop_locks();
        coordinator.drop_locks();

        assert!(parent.is_unlocked());
        assert!(child.is_unlocked());
        assert_eq!(coordinator.owner(), &owner);
        assert!(coordinator.lock_set().same_as(&parent));
    }

    #[test]
    fn hierarchy_coordinator_releases_children() {
        let lock_set = LockSet::new();
        let root = Transaction::begin();
        let child = root.begin_child();
        let policy = TransactionHierarchyPolicy;

        assert!(lock_set.try_lock(LockMode::Read, &root.owner(), &policy));
        assert!(lock_set.try_lock(LockMode::Write, &child.owner(), &policy));

        LockCoordinator::new(lock_set.clone(), root.owner(), Arc::new(policy)).drop_locks();
        assert!(lock_set.is_unlocked());
    }
}
