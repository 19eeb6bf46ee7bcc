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

use log::warn;
use signal_hook::SigId;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared flag a blocked `lock` polls between wait slices.
///
/// Clones observe the same flag, so one clone can be handed to a waiter and
/// another kept by whoever decides to abandon the wait.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

struct SignalRegistration {
    token: CancellationToken,
    _ids: Vec<SigId>,
}

impl SignalRegistration {
    fn install() -> Self {
        let token = CancellationToken::new();
        let mut ids = Vec::new();

        for signal in [SIGINT, SIGTERM] {
            match flag::register(signal, Arc::clone(&token.cancelled)) {
                Ok(id) => ids.push(id),
                Err(err) => warn!("Could not watch signal {signal} for lock cancellation: {err}"),
            }
        }

        Self { token, _ids: ids }
    }
}

static SIGNAL_REGISTRATION: OnceLock<SignalRegistration> = OnceLock::new();

/// Token that flips once SIGINT or SIGTERM arrives. Handlers are installed on
/// first use and shared by every caller.
pub fn signal_token() -> CancellationToken {
    SIGNAL_REGISTRATION
        .get_or_init(SignalRegistration::install)
        .token
        .clone()
}
