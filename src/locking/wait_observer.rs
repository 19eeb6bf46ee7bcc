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

//! Observer interfaces for lock wait instrumentation.
//!
//! Observers see only contended acquisitions: a request that is granted
//! immediately never reports a wait.

use crate::locking::mode::LockMode;
use crate::locking::timeout::LockTimeoutValue;
use log::{debug, info, trace};
use std::fmt;
use std::time::Duration;

/// Identifies what a blocked acquirer is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTarget {
    pub lock_set: String,
    pub mode: LockMode,
    pub owner: String,
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lock on '{}' for {}",
            self.mode, self.lock_set, self.owner
        )
    }
}

/// Observer hooks for lock wait events.
pub trait LockWaitObserver: Send + Sync {
    fn on_wait_start(&self, _target: &WaitTarget, _timeout: LockTimeoutValue) {}

    fn on_retry(
        &self,
        _target: &WaitTarget,
        _attempt: usize,
        _elapsed: Duration,
        _remaining: Option<Duration>,
    ) {
    }

    fn on_acquired(&self, _target: &WaitTarget, _waited: Duration) {}

    fn on_timeout(&self, _target: &WaitTarget, _waited: Duration) {}

    fn on_cancelled(&self, _target: &WaitTarget, _waited: Duration) {}
}

/// Observer implementation that performs no work.
#[derive(Debug, Default)]
pub struct NoopLockWaitObserver;

impl LockWaitObserver for NoopLockWaitObserver {}

/// Forwards wait events to the `log` facade.
#[derive(Debug, Default)]
pub struct LoggingWaitObserver;

impl LockWaitObserver for LoggingWaitObserver {
    fn on_wait_start(&self, target: &WaitTarget, timeout: LockTimeoutValue) {
        debug!("Waiting for {target} (timeout: {timeout})");
    }

    fn on_retry(
        &self,
        target: &WaitTarget,
        attempt: usize,
        elapsed: Duration,
        remaining: Option<Duration>,
    ) {
        let remaining_text = remaining
            .map(|value| format!(", ~{} remaining", format_duration(value)))
            .unwrap_or_default();
        trace!(
            "Still waiting for {target}: attempt {attempt}, elapsed {}{remaining_text}",
            format_duration(elapsed)
        );
    }

    fn on_acquired(&self, target: &WaitTarget, waited: Duration) {
        debug!("Acquired {target} after {}", format_duration(waited));
    }

    fn on_timeout(&self, target: &WaitTarget, waited: Duration) {
        info!("Gave up on {target} after {}", format_duration(waited));
    }

    fn on_cancelled(&self, target: &WaitTarget, waited: Duration) {
        info!(
            "Wait for {target} cancelled after {}",
            format_duration(waited)
        );
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
