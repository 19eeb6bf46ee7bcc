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

pub mod acquisition;
pub mod cancellation;
pub mod coordinator;
pub mod lock_set;
pub mod mode;
pub mod owner;
pub mod scoped_guard;
mod table;
pub mod thread_lock_set;
pub mod timeout;
pub mod transactional;
pub mod wait_observer;

pub use acquisition::{LockAcquisitionRequest, LockTimeoutBudget, LockWaitOptions, PollingBackoff};
pub use cancellation::{CancellationToken, signal_token};
pub use coordinator::LockCoordinator;
pub use lock_set::{LockSet, LockSetSnapshot, ModeHolding};
pub use mode::LockMode;
pub use owner::{IdentityPolicy, Owner, OwnerToken, OwnershipPolicy, TransactionHierarchyPolicy};
pub use scoped_guard::ScopedLockGuard;
pub use thread_lock_set::ThreadLockSet;
pub use timeout::{
    LockTimeoutResolution, LockTimeoutResolver, LockTimeoutSource, LockTimeoutValue,
    parse_timeout_override,
};
pub use transactional::TransactionalLockSet;
pub use wait_observer::{LockWaitObserver, LoggingWaitObserver, NoopLockWaitObserver, WaitTarget};
