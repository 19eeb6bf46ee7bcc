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

use crate::transaction::Transaction;
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Associates transactions with the threads running them.
///
/// Passed explicitly to [`IdentityPolicy`](crate::locking::IdentityPolicy) so the
/// implicit lock owner can be resolved without any process-wide registry.
#[derive(Debug, Default)]
pub struct ThreadBindings {
    bound: Mutex<HashMap<ThreadId, Transaction>>,
}

impl ThreadBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `transaction` to the calling thread until the returned guard drops.
    /// A binding that was already present is restored afterwards.
    pub fn bind(self: &Arc<Self>, transaction: Transaction) -> BoundTransaction {
        let thread = thread::current().id();
        trace!("Binding {transaction} to thread {thread:?}");
        let previous = self.bound().insert(thread, transaction);
        BoundTransaction {
            bindings: Arc::clone(self),
            thread,
            previous,
        }
    }

    /// Transaction bound to the calling thread, if any.
    pub fn current(&self) -> Option<Transaction> {
        self.bound().get(&thread::current().id()).cloned()
    }

    pub fn len(&self) -> usize {
        self.bound().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound().is_empty()
    }

    fn bound(&self) -> MutexGuard<'_, HashMap<ThreadId, Transaction>> {
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard returned by [`ThreadBindings::bind`].
#[derive(Debug)]
pub struct BoundTransaction {
    bindings: Arc<ThreadBindings>,
    thread: ThreadId,
    previous: Option<Transaction>,
}

impl Drop for BoundTransaction {
    fn drop(&mut self) {
        let mut bound = self.bindings.bound();
        match self.previous.take() {
            Some(previous) => {
                bound.insert(self.thread, previous);
            }
            None => {
                bound.remove(&self.thread);
            }
        }
    }
}
