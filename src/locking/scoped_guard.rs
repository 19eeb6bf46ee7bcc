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

use crate::error::Result;
use crate::locking::lock_set::LockSet;
use crate::locking::mode::LockMode;
use crate::locking::owner::Owner;
use log::warn;

/// RAII guard that releases one lock record when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedLockGuard {
    lock_set: LockSet,
    mode: LockMode,
    owner: Owner,
    held: bool,
}

impl ScopedLockGuard {
    /// Wraps a record `owner` already holds under `mode`.
    pub fn new(lock_set: LockSet, mode: LockMode, owner: Owner) -> Self {
        Self {
            lock_set,
            mode,
            owner,
            held: true,
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn lock_set(&self) -> &LockSet {
        &self.lock_set
    }

    pub fn release(mut self) -> Result<()> {
        if std::mem::take(&mut self.held) {
            self.lock_set.unlock(self.mode, &self.owner)
        } else {
            Ok(())
        }
    }
}

impl Drop for ScopedLockGuard {
    fn drop(&mut self) {
        if std::mem::take(&mut self.held)
            && let Err(err) = self.lock_set.unlock(self.mode, &self.owner)
        {
            warn!(
                "Failed to release {} lock on '{}' for {}: {err}",
                self.mode,
                self.lock_set.label(),
                self.owner
            );
        }
    }
}
