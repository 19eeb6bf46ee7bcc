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

use crate::error::LockError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access intent requested on a lock set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    Read,
    Write,
    Upgrade,
    IntentionRead,
    IntentionWrite,
}

pub(crate) const MODE_COUNT: usize = 5;

use self::LockMode::{IntentionRead, IntentionWrite, Read, Upgrade, Write};

/// Modes that may not be held by unrelated owners while the indexed mode is granted.
///
/// Indexed by [`LockMode::index`]. The relation is symmetric even though each mode
/// only consults its own row.
const CONFLICTS: [&[LockMode]; MODE_COUNT] = [
    // Read
    &[Write, IntentionWrite],
    // Write
    &[Write, IntentionWrite, Upgrade, Read, IntentionRead],
    // Upgrade
    &[Write, IntentionWrite, Upgrade],
    // IntentionRead
    &[Write],
    // IntentionWrite
    &[Write, Upgrade, Read],
];

impl LockMode {
    pub const ALL: [LockMode; MODE_COUNT] = [Read, Write, Upgrade, IntentionRead, IntentionWrite];

    /// Dense slot index used by the lock table.
    pub const fn index(self) -> usize {
        match self {
            Read => 0,
            Write => 1,
            Upgrade => 2,
            IntentionRead => 3,
            IntentionWrite => 4,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, LockError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| LockError::InvalidMode(format!("index {index} is out of range 0..4")))
    }

    pub fn conflicts(self) -> &'static [LockMode] {
        CONFLICTS[self.index()]
    }

    pub fn conflicts_with(self, other: LockMode) -> bool {
        self.conflicts().contains(&other)
    }

    pub fn name(self) -> &'static str {
        match self {
            Read => "read",
            Write => "write",
            Upgrade => "upgrade",
            IntentionRead => "intention_read",
            IntentionWrite => "intention_write",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockMode {
    type Err = LockError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == normalized)
            .ok_or_else(|| LockError::InvalidMode(format!("unknown mode '{}'", value.trim())))
    }
}

impl TryFrom<u8> for LockMode {
    type Error = LockError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(usize::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_round_trip() {
        for (position, mode) in LockMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), position);
            assert_eq!(LockMode::from_index(position).unwrap(), *mode);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = LockMode::from_index(5).unwrap_err();
        assert!(matches!(err, LockError::InvalidMode(_)));
        assert!(LockMode::try_from(9u8).is_err());
    }

    #[test]
    fn conflict_relation_is_symmetric() {
        for a in LockMode::ALL {
            for b in LockMode::ALL {
                assert_eq!(
                    a.conflicts_with(b),
                    b.conflicts_with(a),
                    "{a} vs {b} should agree"
                );
            }
        }
    }

    #[test]
    fn write_conflicts_with_everything() {
        for mode in LockMode::ALL {
            assert!(Write.conflicts_with(mode));
        }
    }

    #[test]
    fn upgrade_conflicts_with_itself_but_not_read() {
        assert!(Upgrade.conflicts_with(Upgrade));
        assert!(!Upgrade.conflicts_with(Read));
        assert!(!Read.conflicts_with(Read));
        assert!(!IntentionRead.conflicts_with(IntentionWrite));
    }

    #[test]
    fn parses_external_names() {
        assert_eq!("read".parse::<LockMode>().unwrap(), Read);
        assert_eq!("Intention-Write".parse::<LockMode>().unwrap(), IntentionWrite);
        assert_eq!(" upgrade ".parse::<LockMode>().unwrap(), Upgrade);
        let err = "exclusive".parse::<LockMode>().unwrap_err();
        assert!(err.to_string().contains("exclusive"));
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(IntentionRead.to_string(), "intention_read");
        assert_eq!(Write.to_string(), "write");
    }
}
