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

//! Hierarchical multi-mode lock manager for a transaction-processing monitor.
//!
//! Lock sets guard individual resources under five modes (read, write,
//! upgrade and the two intention modes). Owners are threads, opaque tokens or
//! nested transactions, and an [`OwnershipPolicy`](locking::OwnershipPolicy)
//! decides which owners may share otherwise conflicting locks.

pub mod config;
pub mod error;
pub mod locking;
pub mod logging;
pub mod transaction;

pub use error::{LockError, Result};
pub use locking::{
    LockCoordinator, LockMode, LockSet, Owner, OwnershipPolicy, ThreadLockSet,
    TransactionalLockSet,
};
pub use transaction::{Transaction, TransactionOutcome};
