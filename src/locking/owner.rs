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

//! Lock ownership identities and the policies that decide which owners may share
//! otherwise conflicting locks.

use crate::transaction::{ThreadBindings, Transaction, TransactionRef};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use uuid::Uuid;

/// Opaque identity handed out to callers that want to own locks independently of
/// threads and transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(Uuid);

impl OwnerToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OwnerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity on whose behalf a lock record is held.
#[derive(Debug, Clone)]
pub enum Owner {
    Thread(ThreadId),
    Token(OwnerToken),
    Transaction(TransactionRef),
}

impl Owner {
    pub fn current_thread() -> Self {
        Owner::Thread(thread::current().id())
    }

    pub fn transaction(transaction: &Transaction) -> Self {
        Owner::Transaction(transaction.reference().clone())
    }

    pub fn token(token: OwnerToken) -> Self {
        Owner::Token(token)
    }

    pub fn as_transaction(&self) -> Option<&TransactionRef> {
        match self {
            Owner::Transaction(reference) => Some(reference),
            _ => None,
        }
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Owner::Thread(a), Owner::Thread(b)) => a == b,
            (Owner::Token(a), Owner::Token(b)) => a == b,
            (Owner::Transaction(a), Owner::Transaction(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl Eq for Owner {}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Thread(id) => write!(f, "thread {id:?}"),
            Owner::Token(token) => write!(f, "token {token}"),
            Owner::Transaction(reference) => write!(f, "transaction {}", reference.id()),
        }
    }
}

/// Decides reentrancy: records held by a related owner never block a request.
///
/// `related` must be reflexive. It need not be transitive; the lock table checks
/// every conflicting record individually.
pub trait OwnershipPolicy: Send + Sync {
    fn related(&self, requester: &Owner, holder: &Owner) -> bool;

    /// Owner used when a caller does not name one explicitly.
    fn current_owner(&self) -> Owner;
}

/// Owners are related only when they are the same identity.
///
/// The implicit owner is the transaction bound to the calling thread, or the
/// thread itself when no binding exists.
#[derive(Debug, Clone, Default)]
pub struct IdentityPolicy {
    bindings: Option<Arc<ThreadBindings>>,
}

impl IdentityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(bindings: Arc<ThreadBindings>) -> Self {
        Self {
            bindings: Some(bindings),
        }
    }

    pub fn bindings(&self) -> Option<&Arc<ThreadBindings>> {
        self.bindings.as_ref()
    }

    /// Transaction bound to the calling thread, if bindings are configured.
    pub fn current_transaction(&self) -> Option<Transaction> {
        self.bindings.as_ref().and_then(|bindings| bindings.current())
    }
}

impl OwnershipPolicy for IdentityPolicy {
    fn related(&self, requester: &Owner, holder: &Owner) -> bool {
        requester == holder
    }

    fn current_owner(&self) -> Owner {
        self.current_transaction()
            .map(|transaction| Owner::transaction(&transaction))
            .unwrap_or_else(Owner::current_thread)
    }
}

/// Transactions are related to themselves, their ancestors and their descendants.
/// Non-transaction owners fall back to identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionHierarchyPolicy;

impl OwnershipPolicy for TransactionHierarchyPolicy {
    fn related(&self, requester: &Owner, holder: &Owner) -> bool {
        match (requester, holder) {
            (Owner::Transaction(a), Owner::Transaction(b)) => a.is_related(b),
            _ => requester == holder,
        }
    }

    fn current_owner(&self) -> Owner {
        Owner::current_thread()
    }
}
