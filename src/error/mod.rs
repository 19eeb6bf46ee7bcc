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

use thiserror::Error;


#[derive(Error, Debug)]
pub enum LockError {
    #[error("Invalid lock mode: {0}")]
    InvalidMode(String),

    #[error("Lock set '{lock_set}' holds no {mode} lock for {owner}")]
    LockNotHeld {
        lock_set: String,
        mode: String,
        owner: String,
    },

    #[error("Transaction {transaction} has already completed and cannot own locks")]
    InactiveTransaction { transaction: String },

    #[error("Transaction {transaction} was already completed")]
    AlreadyCompleted { transaction: String },

    #[error("Cancelled waiting for {mode} lock on '{lock_set}' for {owner} after {waited_secs:.3}s")]
    Cancelled {
        lock_set: String,
        mode: String,
        owner: String,
        waited_secs: f64,
    },

    #[error("Timed out waiting for {mode} lock on '{lock_set}' for {owner} after {waited_secs:.3}s")]
    Timeout {
        lock_set: String,
        mode: String,
        owner: String,
        waited_secs: f64,
    },

    #[error("Invalid lock timeout: {0}")]
    InvalidTimeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LockError {
    /// Returns true for failures that leave the caller free to retry or clean up.
    ///
    /// Invalid modes and misuse of completed transactions are programmer errors
    /// and are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LockError::LockNotHeld { .. } | LockError::Cancelled { .. } | LockError::Timeout { .. }
        )
    }

    pub fn is_lock_not_held(&self) -> bool {
        matches!(self, LockError::LockNotHeld { .. })
    }
}

impl From<config::ConfigError> for LockError {
    fn from(err: config::ConfigError) -> Self {
        LockError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
