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

use crate::locking::cancellation::CancellationToken;
use crate::locking::timeout::{LockTimeoutSource, LockTimeoutValue};
use crate::locking::wait_observer::{LockWaitObserver, WaitTarget};
use std::cmp;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Growing wait slices used while blocked on a lock set's condition variable.
///
/// A notification ends a slice early; the slice length only bounds how long a
/// cancellation or deadline can go unnoticed.
#[derive(Debug, Clone)]
pub struct PollingBackoff {
    initial: Duration,
    factor: u32,
    cap: Duration,
    current: Duration,
}

impl PollingBackoff {
    pub fn new(initial: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            initial,
            factor: cmp::max(factor, 1),
            cap,
            current: initial,
        }
    }

    /// Returns the current slice and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = cmp::min(self.current.saturating_mul(self.factor), self.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for PollingBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), 2, Duration::from_millis(1_100))
    }
}

/// Tracks elapsed and remaining time for a lock timeout budget.
#[derive(Debug, Clone)]
pub struct LockTimeoutBudget {
    value: LockTimeoutValue,
    started_at: Instant,
}

impl LockTimeoutBudget {
    pub fn new(value: LockTimeoutValue) -> Self {
        Self {
            value,
            started_at: Instant::now(),
        }
    }

    pub fn value(&self) -> LockTimeoutValue {
        self.value
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self.value {
            LockTimeoutValue::Infinite => None,
            LockTimeoutValue::Finite(limit) => Some(limit.saturating_sub(self.elapsed())),
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.value, LockTimeoutValue::Finite(limit) if self.elapsed() >= limit)
    }
}

/// Reusable wait settings a facade applies to every blocking acquisition.
#[derive(Clone, Default)]
pub struct LockWaitOptions {
    pub timeout: LockTimeoutValue,
    pub timeout_source: LockTimeoutSource,
    pub backoff: PollingBackoff,
    pub cancellation: CancellationToken,
    pub observer: Option<Arc<dyn LockWaitObserver>>,
}

impl LockWaitOptions {
    pub fn with_timeout(mut self, timeout: LockTimeoutValue) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_backoff(mut self, backoff: PollingBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LockWaitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Starts a fresh request; the timeout budget begins now.
    pub fn request(&self) -> LockAcquisitionRequest<'_> {
        LockAcquisitionRequest::new(self.timeout)
            .with_timeout_source(self.timeout_source)
            .with_backoff(self.backoff.clone())
            .with_cancellation(self.cancellation.clone())
            .with_observer(self.observer.as_deref())
    }
}

impl std::fmt::Debug for LockWaitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockWaitOptions")
            .field("timeout", &self.timeout)
            .field("timeout_source", &self.timeout_source)
            .field("backoff", &self.backoff)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Carries the configuration for a single blocking acquisition.
pub struct LockAcquisitionRequest<'a> {
    budget: LockTimeoutBudget,
    cancellation: CancellationToken,
    backoff: PollingBackoff,
    observer: Option<&'a dyn LockWaitObserver>,
    source: LockTimeoutSource,
    retries: usize,
    target: Option<WaitTarget>,
}

impl<'a> LockAcquisitionRequest<'a> {
    pub fn new(timeout: LockTimeoutValue) -> Self {
        Self {
            budget: LockTimeoutBudget::new(timeout),
            cancellation: CancellationToken::new(),
            backoff: PollingBackoff::default(),
            observer: None,
            source: LockTimeoutSource::Default,
            retries: 0,
            target: None,
        }
    }

    /// Waits forever and can never be cancelled.
    pub fn unbounded() -> Self {
        Self::new(LockTimeoutValue::Infinite)
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_backoff(mut self, backoff: PollingBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeout_source(mut self, source: LockTimeoutSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn LockWaitObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn budget(&self) -> &LockTimeoutBudget {
        &self.budget
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn elapsed(&self) -> Duration {
        self.budget.elapsed()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.budget.remaining()
    }

    pub fn timeout_value(&self) -> LockTimeoutValue {
        self.budget.value()
    }

    pub fn timeout_source(&self) -> LockTimeoutSource {
        self.source
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Length of the next condvar wait, or `None` once the budget is spent.
    pub fn next_wait_slice(&mut self) -> Option<Duration> {
        let remaining = self.remaining();
        let mut slice = self.backoff.next_delay();
        if let Some(remaining_budget) = remaining {
            slice = cmp::min(slice, remaining_budget);
            if slice.is_zero() {
                return None;
            }
        }
        Some(slice)
    }

    pub fn record_wait_start(&mut self, target: WaitTarget) {
        if self.target.is_some() {
            return;
        }
        if let Some(observer) = self.observer {
            observer.on_wait_start(&target, self.timeout_value());
        }
        self.target = Some(target);
    }

    pub fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
        if let (Some(observer), Some(target)) = (self.observer, self.target.as_ref()) {
            observer.on_retry(target, self.retries, self.elapsed(), self.remaining());
        }
    }

    pub fn notify_acquired(&self) {
        if let (Some(observer), Some(target)) = (self.observer, self.target.as_ref()) {
            observer.on_acquired(target, self.elapsed());
        }
    }

    pub fn notify_timeout(&self) {
        if let (Some(observer), Some(target)) = (self.observer, self.target.as_ref()) {
            observer.on_timeout(target, self.elapsed());
        }
    }

    pub fn notify_cancelled(&self) {
        if let (Some(observer), Some(target)) = (self.observer, self.target.as_ref()) {
            observer.on_cancelled(target, self.elapsed());
        }
    }
}
